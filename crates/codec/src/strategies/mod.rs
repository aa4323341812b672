mod sparse;
mod unpacked;
mod zstd;

pub use sparse::SparseZ;
pub use unpacked::Unpacked;
pub use zstd::UnpackedZ;

/// Zstd level shared by the compressed strategies.
pub(crate) const ZSTD_LEVEL: i32 = 3;
