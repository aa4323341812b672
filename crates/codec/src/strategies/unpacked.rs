use crate::error::CodecError;
use crate::traits::Codec;
use crate::utils::{push_words, read_header, read_words, write_header};

/// Strategy: length header followed by every count as a little-endian `u32`.
pub struct Unpacked;

impl Codec for Unpacked {
    fn encode(&self, values: &[u32]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(8 + values.len() * 4);
        write_header(&mut out, values.len());
        push_words(&mut out, values.iter().copied());
        Ok(out)
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u32>, CodecError> {
        let (len, body) = read_header(data)?;
        let values = read_words(body)?;
        if values.len() != len {
            return Err(CodecError::Corruption(format!(
                "header says {len} values, body holds {}",
                values.len()
            )));
        }
        Ok(values)
    }
}
