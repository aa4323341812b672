use super::ZSTD_LEVEL;
use crate::error::CodecError;
use crate::strategies::Unpacked;
use crate::traits::Codec;

/// Strategy: [`Unpacked`] layout compressed with Zstd.
///
/// Occupancy matrices are dominated by zeros and small repeated counts, so
/// even a fast compression level shrinks them considerably.
pub struct UnpackedZ;

impl Codec for UnpackedZ {
    fn encode(&self, values: &[u32]) -> Result<Vec<u8>, CodecError> {
        let raw = Unpacked.encode(values)?;
        zstd::bulk::compress(&raw, ZSTD_LEVEL)
            .map_err(|e| CodecError::Encode(format!("Zstd compression failed: {e}")))
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u32>, CodecError> {
        let raw = zstd::stream::decode_all(std::io::Cursor::new(data))
            .map_err(|e| CodecError::Decode(format!("Zstd decompression failed: {e}")))?;
        Unpacked.decode(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compresses_mostly_zero_buffer() {
        let mut values = vec![0u32; 10_000];
        values[17] = 1;
        values[9_000] = 3;
        let encoded = UnpackedZ.encode(&values).unwrap();
        assert!(encoded.len() < values.len());
        assert_eq!(UnpackedZ.decode(&encoded).unwrap(), values);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(UnpackedZ.decode(&[1, 2, 3, 4, 5]).is_err());
    }
}
