use crate::error::CodecError;

/// Size of the length header written in front of every payload.
pub const HEADER_LEN: usize = 8;

/// Prepend the element count as a little-endian `u64`.
pub fn write_header(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u64).to_le_bytes());
}

/// Split a payload into its element count and the remaining body.
pub fn read_header(data: &[u8]) -> Result<(usize, &[u8]), CodecError> {
    if data.len() < HEADER_LEN {
        return Err(CodecError::Decode("Payload too short for header".into()));
    }
    let mut len_bytes = [0u8; HEADER_LEN];
    len_bytes.copy_from_slice(&data[..HEADER_LEN]);
    Ok((u64::from_le_bytes(len_bytes) as usize, &data[HEADER_LEN..]))
}

/// Append `values` as little-endian `u32` words.
pub fn push_words(out: &mut Vec<u8>, values: impl IntoIterator<Item = u32>) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Read little-endian `u32` words; the body length must be a multiple of 4.
pub fn read_words(body: &[u8]) -> Result<Vec<u32>, CodecError> {
    if body.len() % 4 != 0 {
        return Err(CodecError::Corruption(format!(
            "body length {} is not a multiple of 4",
            body.len()
        )));
    }
    Ok(body
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}
