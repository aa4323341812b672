use crate::error::CodecError;

/// Core trait for occupancy codecs.
///
/// Every strategy turns a flat buffer of counts into bytes and back. The
/// decoded buffer must be identical to the one that was encoded, including
/// its length.
pub trait Codec {
    fn encode(&self, values: &[u32]) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, data: &[u8]) -> Result<Vec<u32>, CodecError>;
}
