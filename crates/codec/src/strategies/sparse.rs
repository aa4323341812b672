use super::ZSTD_LEVEL;
use crate::error::CodecError;
use crate::traits::Codec;
use crate::utils::{push_words, read_header, read_words, write_header};

/// Strategy: only non-zero entries, as `(index, value)` word pairs, then Zstd.
///
/// Most patches hold a single lineage, so a patches × lineages matrix has
/// roughly one non-zero entry per row and the pair list is far shorter than
/// the dense buffer. Highly regular layouts can still compress better with
/// `UnpackedZ`; the benchmark reports sizes for both.
pub struct SparseZ;

impl Codec for SparseZ {
    fn encode(&self, values: &[u32]) -> Result<Vec<u8>, CodecError> {
        if values.len() > u32::MAX as usize {
            return Err(CodecError::Encode(format!(
                "buffer of {} values cannot be indexed with u32",
                values.len()
            )));
        }
        let mut raw = Vec::new();
        write_header(&mut raw, values.len());
        push_words(
            &mut raw,
            values
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v != 0)
                .flat_map(|(i, &v)| [i as u32, v]),
        );
        zstd::bulk::compress(&raw, ZSTD_LEVEL)
            .map_err(|e| CodecError::Encode(format!("Zstd compression failed: {e}")))
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u32>, CodecError> {
        let raw = zstd::stream::decode_all(std::io::Cursor::new(data))
            .map_err(|e| CodecError::Decode(format!("Zstd decompression failed: {e}")))?;
        let (len, body) = read_header(&raw)?;
        if len > u32::MAX as usize {
            return Err(CodecError::Corruption(format!(
                "header length {len} exceeds the u32 index space"
            )));
        }
        let words = read_words(body)?;
        if words.len() % 2 != 0 {
            return Err(CodecError::Corruption("dangling index without value".into()));
        }

        let mut values = Vec::new();
        values.try_reserve_exact(len).map_err(|e| {
            CodecError::Corruption(format!("cannot allocate {len} values: {e}"))
        })?;
        values.resize(len, 0u32);
        for pair in words.chunks_exact(2) {
            let idx = pair[0] as usize;
            let slot = values.get_mut(idx).ok_or_else(|| {
                CodecError::Corruption(format!("index {idx} outside buffer of {len}"))
            })?;
            *slot = pair[1];
        }
        Ok(values)
    }
}
