use bytemuck::Zeroable;
use log::debug;

use crate::descriptor::BlockSizeDescriptor;
use crate::{round_up_to_simd_multiple, MAX_TEXELS_PER_BLOCK, PARTITION_COUNT};

/// One texel-to-partition assignment for a (partition count, seed) pair.
///
/// `partition_of_texel` stores the hash output verbatim; it is part of
/// the decoder interop surface and must not be relabelled. Canonical
/// relabelling exists only inside the dedup fingerprints.
/// `partition_count == 0` marks an entry the encoder skips: either the
/// hash left partition 0 empty, or the pattern duplicates an earlier
/// seed in the same table.
#[derive(Clone, PartialEq, Zeroable)]
pub struct PartitionInfo {
    pub partition_count: u8,
    pub partition_texel_count: [u8; 4],
    pub partition_of_texel: [u8; MAX_TEXELS_PER_BLOCK],
    pub texels_of_partition: [[u8; MAX_TEXELS_PER_BLOCK]; 4],
    /// Per partition, a bitmask over the descriptor's k-means texels.
    pub coverage_bitmaps: [u64; 4],
}

/// The ASTC partition hash. The exact operation sequence is part of the
/// format; every step below is normative.
pub(crate) fn hash52(mut inp: u32) -> u32 {
    inp ^= inp >> 15;

    // (2^4 + 1) * (2^7 + 1) * (2^17 - 1)
    inp = inp.wrapping_mul(0xEEDE0891);
    inp ^= inp >> 5;
    inp = inp.wrapping_add(inp << 16);
    inp ^= inp >> 7;
    inp ^= inp >> 3;
    inp ^= inp << 6;
    inp ^= inp >> 17;
    inp
}

/// Partition index of one texel. Bit-exact with the ASTC specification's
/// procedural partitioning.
pub fn select_partition(
    seed: u32,
    x: u32,
    y: u32,
    z: u32,
    partition_count: u32,
    small_block: bool,
) -> u8 {
    // Small blocks get biased coordinates for a better distribution
    let (x, y, z) = if small_block {
        (x << 1, y << 1, z << 1)
    } else {
        (x, y, z)
    };

    let seed = seed + (partition_count - 1) * 1024;

    let rnum = hash52(seed);

    let mut seed1 = (rnum & 0xF) as u8;
    let mut seed2 = ((rnum >> 4) & 0xF) as u8;
    let mut seed3 = ((rnum >> 8) & 0xF) as u8;
    let mut seed4 = ((rnum >> 12) & 0xF) as u8;
    let mut seed5 = ((rnum >> 16) & 0xF) as u8;
    let mut seed6 = ((rnum >> 20) & 0xF) as u8;
    let mut seed7 = ((rnum >> 24) & 0xF) as u8;
    let mut seed8 = ((rnum >> 28) & 0xF) as u8;
    let mut seed9 = ((rnum >> 18) & 0xF) as u8;
    let mut seed10 = ((rnum >> 22) & 0xF) as u8;
    let mut seed11 = ((rnum >> 26) & 0xF) as u8;
    let mut seed12 = (((rnum >> 30) | (rnum << 2)) & 0xF) as u8;

    // Square the seeds to bias their distribution towards lower values
    seed1 = seed1.wrapping_mul(seed1);
    seed2 = seed2.wrapping_mul(seed2);
    seed3 = seed3.wrapping_mul(seed3);
    seed4 = seed4.wrapping_mul(seed4);
    seed5 = seed5.wrapping_mul(seed5);
    seed6 = seed6.wrapping_mul(seed6);
    seed7 = seed7.wrapping_mul(seed7);
    seed8 = seed8.wrapping_mul(seed8);
    seed9 = seed9.wrapping_mul(seed9);
    seed10 = seed10.wrapping_mul(seed10);
    seed11 = seed11.wrapping_mul(seed11);
    seed12 = seed12.wrapping_mul(seed12);

    let (sh1, sh2) = if seed & 1 != 0 {
        (
            if seed & 2 != 0 { 4 } else { 5 },
            if partition_count == 3 { 6 } else { 5 },
        )
    } else {
        (
            if partition_count == 3 { 6 } else { 5 },
            if seed & 2 != 0 { 4 } else { 5 },
        )
    };
    let sh3 = if seed & 0x10 != 0 { sh1 } else { sh2 };

    seed1 >>= sh1;
    seed2 >>= sh2;
    seed3 >>= sh1;
    seed4 >>= sh2;
    seed5 >>= sh1;
    seed6 >>= sh2;
    seed7 >>= sh1;
    seed8 >>= sh2;

    seed9 >>= sh3;
    seed10 >>= sh3;
    seed11 >>= sh3;
    seed12 >>= sh3;

    let mut a = (seed1 as u32 * x + seed2 as u32 * y + seed11 as u32 * z + (rnum >> 14)) & 0x3F;
    let mut b = (seed3 as u32 * x + seed4 as u32 * y + seed12 as u32 * z + (rnum >> 10)) & 0x3F;
    let mut c = (seed5 as u32 * x + seed6 as u32 * y + seed9 as u32 * z + (rnum >> 6)) & 0x3F;
    let mut d = (seed7 as u32 * x + seed8 as u32 * y + seed10 as u32 * z + (rnum >> 2)) & 0x3F;

    // Mask off candidates beyond the requested partition count
    if partition_count <= 3 {
        d = 0;
    }
    if partition_count <= 2 {
        c = 0;
    }
    if partition_count <= 1 {
        b = 0;
    }

    if a >= b && a >= c && a >= d {
        0
    } else if b >= c && b >= d {
        1
    } else if c >= d {
        2
    } else {
        3
    }
}

/// Pack a partitioning into 2 bits per texel, relabelled by order of first
/// appearance so that equivalent patterns compare equal regardless of the
/// raw labels the hash produced.
fn canonical_partitioning(texel_count: usize, partition_of_texel: &[u8], pattern: &mut [u64; 7]) {
    *pattern = [0; 7];

    let mut mapped_index = [None::<u64>; 4];
    let mut map_count = 0;

    for (i, &part) in partition_of_texel.iter().take(texel_count).enumerate() {
        let mapped = *mapped_index[part as usize].get_or_insert_with(|| {
            let fresh = map_count;
            map_count += 1;
            fresh
        });
        pattern[i >> 5] |= mapped << (2 * (i & 0x1F));
    }
}

/// Mark entries whose canonical pattern already appeared at a lower seed.
/// The first occurrence stays valid; the encoder only needs to try each
/// distinct pattern once.
fn remove_duplicate_partitionings(texel_count: usize, partitions: &mut [PartitionInfo]) -> usize {
    let mut patterns = vec![[0u64; 7]; partitions.len()];
    for (info, pattern) in partitions.iter().zip(patterns.iter_mut()) {
        canonical_partitioning(texel_count, &info.partition_of_texel, pattern);
    }

    let mut removed = 0;
    for i in 0..partitions.len() {
        for j in 0..i {
            if patterns[i] == patterns[j] {
                partitions[i].partition_count = 0;
                removed += 1;
                break;
            }
        }
    }
    removed
}

/// Build one partition info entry. The hash output is stored verbatim.
fn generate_partition_info(
    bsd: &BlockSizeDescriptor,
    partition_count: u32,
    seed: u32,
    info: &mut PartitionInfo,
) {
    let small_block = bsd.texel_count < 32;

    let mut counts = [0usize; 4];

    let mut texel = 0usize;
    for z in 0..bsd.zdim {
        for y in 0..bsd.ydim {
            for x in 0..bsd.xdim {
                let part = select_partition(
                    seed,
                    x as u32,
                    y as u32,
                    z as u32,
                    partition_count,
                    small_block,
                ) as usize;

                info.texels_of_partition[part][counts[part]] = texel as u8;
                counts[part] += 1;
                info.partition_of_texel[texel] = part as u8;
                texel += 1;
            }
        }
    }

    // Fill each list's tail so SIMD loops can over-fetch
    for part in 0..partition_count as usize {
        let count = counts[part];
        for j in count..round_up_to_simd_multiple(count) {
            info.texels_of_partition[part][j] = info.texels_of_partition[part][count - 1];
        }
    }

    // The hash may leave partitions empty; the first empty slot caps the
    // usable count, and an empty partition 0 makes the entry unusable
    info.partition_count = if counts[0] == 0 {
        0
    } else if counts[1] == 0 {
        1
    } else if counts[2] == 0 {
        2
    } else if counts[3] == 0 {
        3
    } else {
        4
    };

    for part in 0..4 {
        info.partition_texel_count[part] = counts[part] as u8;
        info.coverage_bitmaps[part] = 0;
    }

    for (i, &texel) in bsd.kmeans_texels[..bsd.kmeans_texel_count].iter().enumerate() {
        let part = info.partition_of_texel[texel as usize] as usize;
        info.coverage_bitmaps[part] |= 1 << i;
    }
}

/// Populate the descriptor's four partition tables: 1024 seeds each for
/// 2, 3 and 4 partitions, then the single 1-partition entry. Requires the
/// k-means texels to be assigned already (coverage bitmaps index them).
pub(crate) fn init_partition_tables(bsd: &mut BlockSizeDescriptor) {
    let mut partitions = std::mem::take(&mut bsd.partitions);

    let (tab2, rest) = partitions.split_at_mut(PARTITION_COUNT);
    let (tab3, rest) = rest.split_at_mut(PARTITION_COUNT);
    let (tab4, tab1) = rest.split_at_mut(PARTITION_COUNT);

    generate_partition_info(bsd, 1, 0, &mut tab1[0]);
    for seed in 0..PARTITION_COUNT as u32 {
        generate_partition_info(bsd, 2, seed, &mut tab2[seed as usize]);
        generate_partition_info(bsd, 3, seed, &mut tab3[seed as usize]);
        generate_partition_info(bsd, 4, seed, &mut tab4[seed as usize]);
    }

    let removed2 = remove_duplicate_partitionings(bsd.texel_count, tab2);
    let removed3 = remove_duplicate_partitionings(bsd.texel_count, tab3);
    let removed4 = remove_duplicate_partitionings(bsd.texel_count, tab4);

    debug!(
        "partition tables for {}x{}x{}: {}/{}/{} duplicate seeds removed",
        bsd.xdim, bsd.ydim, bsd.zdim, removed2, removed3, removed4
    );

    bsd.partitions = partitions;
}
