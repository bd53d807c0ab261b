#![warn(clippy::all)]

//! Precomputed lookup tables for the ASTC texture format: block size
//! descriptors binding block modes to decimation tables, plus the
//! procedural partition tables, built bit-exact to the ASTC specification.

use thiserror::Error;

mod block_mode;
mod decimation;
mod descriptor;
mod partition;
mod percentile;
mod quant;
mod rand;

pub use block_mode::{decode_block_mode_2d, decode_block_mode_3d, Mode2d, Mode3d};
pub use decimation::DecimationTable;
pub use descriptor::{BlockMode, BlockSizeDescriptor, DecimationMode};
pub use partition::{select_partition, PartitionInfo};
pub use percentile::PercentileTable;
pub use quant::{ise_sequence_bitcount, WEIGHT_QUANT_LEVELS};

/// Largest block footprint is 6x6x6.
pub const MAX_TEXELS_PER_BLOCK: usize = 216;

pub const MAX_WEIGHTS_PER_BLOCK: usize = 64;

pub const MIN_WEIGHT_BITS_PER_BLOCK: u32 = 24;

pub const MAX_WEIGHT_BITS_PER_BLOCK: u32 = 96;

/// Number of 11-bit block mode indices.
pub const MAX_WEIGHT_MODES: usize = 2048;

/// Upper bound on distinct weight grids for any single block size.
pub const MAX_DECIMATION_MODES: usize = 87;

/// Partition pattern seeds per partition count.
pub const PARTITION_COUNT: usize = 1024;

pub const MAX_KMEANS_TEXELS: usize = 64;

/// Per-texel decimation coefficients always sum to this.
pub const TEXEL_WEIGHT_SUM: u32 = 16;

/// Table rows are padded to a multiple of this many lanes so SIMD
/// consumers can over-fetch without loop tails.
pub const SIMD_WIDTH: usize = 8;

pub(crate) fn round_up_to_simd_multiple(count: usize) -> usize {
    (count + SIMD_WIDTH - 1) / SIMD_WIDTH * SIMD_WIDTH
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported block size {0}x{1}x{2}")]
    BadBlockSize(u32, u32, u32),

    #[error("out of memory while allocating a decimation table")]
    OutOfMemory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simd_rounding() {
        assert_eq!(round_up_to_simd_multiple(0), 0);
        assert_eq!(round_up_to_simd_multiple(1), SIMD_WIDTH);
        assert_eq!(round_up_to_simd_multiple(SIMD_WIDTH), SIMD_WIDTH);
        assert_eq!(round_up_to_simd_multiple(SIMD_WIDTH + 1), 2 * SIMD_WIDTH);
        assert_eq!(
            round_up_to_simd_multiple(MAX_TEXELS_PER_BLOCK),
            MAX_TEXELS_PER_BLOCK
        );
    }

    #[test]
    fn test_bad_block_size() {
        assert!(matches!(
            BlockSizeDescriptor::new(3, 4, 1, false, 1.0, &PercentileTable::flat()),
            Err(Error::BadBlockSize(3, 4, 1))
        ));
        assert!(matches!(
            BlockSizeDescriptor::new(13, 12, 1, false, 1.0, &PercentileTable::flat()),
            Err(Error::BadBlockSize(13, 12, 1))
        ));
        assert!(matches!(
            BlockSizeDescriptor::new(4, 4, 2, false, 1.0, &PercentileTable::flat()),
            Err(Error::BadBlockSize(4, 4, 2))
        ));
        assert!(matches!(
            BlockSizeDescriptor::new(6, 6, 7, false, 1.0, &PercentileTable::flat()),
            Err(Error::BadBlockSize(6, 6, 7))
        ));
    }
}
