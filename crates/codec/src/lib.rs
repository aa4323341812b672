//! Occupancy-matrix encoding library.
//!
//! Provides strategies for storing flat `u32` count buffers (population
//! snapshots) compactly in a database blob.

mod error;
mod strategies;
mod traits;
mod utils;

pub use error::CodecError as Error;
pub use error::CodecError;
pub use strategies::{SparseZ, Unpacked, UnpackedZ};
pub use traits::Codec;

use serde::{Deserialize, Serialize};

/// Strategies for encoding occupancy buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodecStrategy {
    /// Raw little-endian words.
    Unpacked,
    /// Raw words compressed with Zstd.
    UnpackedZ,
    /// Non-zero `(index, value)` pairs compressed with Zstd.
    #[default]
    SparseZ,
}

impl CodecStrategy {
    /// Encode using the selected strategy.
    pub fn encode(&self, values: &[u32]) -> Result<Vec<u8>, CodecError> {
        match self {
            CodecStrategy::Unpacked => Unpacked.encode(values),
            CodecStrategy::UnpackedZ => UnpackedZ.encode(values),
            CodecStrategy::SparseZ => SparseZ.encode(values),
        }
    }

    /// Decode using the selected strategy.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<u32>, CodecError> {
        match self {
            CodecStrategy::Unpacked => Unpacked.decode(data),
            CodecStrategy::UnpackedZ => UnpackedZ.decode(data),
            CodecStrategy::SparseZ => SparseZ.decode(data),
        }
    }
}

impl std::fmt::Display for CodecStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unpacked => write!(f, "unpacked"),
            Self::UnpackedZ => write!(f, "unpacked-z"),
            Self::SparseZ => write!(f, "sparse-z"),
        }
    }
}

impl std::str::FromStr for CodecStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpacked" => Ok(Self::Unpacked),
            "unpacked-z" | "zstd" => Ok(Self::UnpackedZ),
            "sparse-z" | "sparse" => Ok(Self::SparseZ),
            _ => Err(format!(
                "Unknown codec strategy: {s}. Available: unpacked, unpacked-z, sparse-z"
            )),
        }
    }
}

impl Codec for CodecStrategy {
    fn encode(&self, values: &[u32]) -> Result<Vec<u8>, CodecError> {
        CodecStrategy::encode(self, values)
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u32>, CodecError> {
        CodecStrategy::decode(self, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategies_agree() {
        let values = vec![0, 0, 4, 1, 0, 0, 0, 9, 0, 1];
        for strategy in [
            CodecStrategy::Unpacked,
            CodecStrategy::UnpackedZ,
            CodecStrategy::SparseZ,
        ] {
            let encoded = strategy.encode(&values).unwrap();
            assert_eq!(strategy.decode(&encoded).unwrap(), values, "{strategy}");
        }
    }

    #[test]
    fn test_parse_names() {
        for strategy in [
            CodecStrategy::Unpacked,
            CodecStrategy::UnpackedZ,
            CodecStrategy::SparseZ,
        ] {
            assert_eq!(strategy.to_string().parse::<CodecStrategy>(), Ok(strategy));
        }
        assert!("bitpacked".parse::<CodecStrategy>().is_err());
    }
}
