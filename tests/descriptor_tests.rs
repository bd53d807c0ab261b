#![warn(clippy::all)]

use astc_tables::{
    ise_sequence_bitcount, BlockSizeDescriptor, PercentileTable, MAX_WEIGHTS_PER_BLOCK,
    MAX_WEIGHT_BITS_PER_BLOCK, MIN_WEIGHT_BITS_PER_BLOCK, SIMD_WIDTH, TEXEL_WEIGHT_SUM,
};

use std::collections::HashSet;

fn build(x: u32, y: u32, z: u32) -> BlockSizeDescriptor {
    BlockSizeDescriptor::new(x, y, z, false, 1.0, &PercentileTable::flat()).unwrap()
}

#[test]
fn test_4x4_descriptor() {
    let bsd = build(4, 4, 1);

    assert_eq!(bsd.texel_count, 16);
    assert_eq!(bsd.kmeans_texel_count, 16);
    assert_eq!(bsd.block_modes.len(), 145);
    assert_eq!(bsd.decimation_mode_count, 9);

    // The full-resolution 4x4 weight grid must be among the decimation modes
    assert!(bsd
        .decimation_tables
        .iter()
        .any(|dt| dt.weight_x == 4 && dt.weight_y == 4 && dt.weight_z == 1));

    let single = &bsd.partition_table(1)[0];
    assert_eq!(single.partition_count, 1);
    assert_eq!(single.partition_texel_count, [16, 0, 0, 0]);
    assert_eq!(single.partition_of_texel[..16], [0; 16]);
    assert_eq!(single.coverage_bitmaps[0], 0xFFFF);
}

#[test]
fn test_block_mode_counts() {
    for (dims, modes, decimations) in [
        ((4, 4, 1), 145, 9),
        ((5, 5, 1), 255, 16),
        ((6, 6, 1), 370, 25),
        ((8, 8, 1), 555, 49),
        ((10, 10, 1), 687, 71),
        ((12, 12, 1), 775, 87),
        ((4, 4, 4), 301, 27),
        ((6, 6, 6), 562, 78),
    ] {
        let bsd = build(dims.0, dims.1, dims.2);
        assert_eq!(bsd.block_modes.len(), modes, "modes for {:?}", dims);
        assert_eq!(
            bsd.decimation_mode_count, decimations,
            "decimation modes for {:?}",
            dims
        );
    }
}

#[test]
fn test_packed_modes_satisfy_filter() {
    for dims in [(4, 4, 1), (6, 5, 1), (10, 8, 1), (12, 12, 1), (5, 5, 5)] {
        let bsd = build(dims.0, dims.1, dims.2);
        for bm in &bsd.block_modes {
            let dt = bsd.decimation_table(bm.decimation_mode as usize);
            assert!(dt.weight_x as usize <= bsd.xdim);
            assert!(dt.weight_y as usize <= bsd.ydim);
            assert!(dt.weight_z as usize <= bsd.zdim);

            let planes = if bm.is_dual_plane { 2 } else { 1 };
            let weight_count = dt.weight_count as usize * planes;
            assert!(weight_count <= MAX_WEIGHTS_PER_BLOCK);

            let bits = ise_sequence_bitcount(weight_count as u32, bm.quant_mode);
            assert!((MIN_WEIGHT_BITS_PER_BLOCK..=MAX_WEIGHT_BITS_PER_BLOCK).contains(&bits));

            // The bound decimation mode must support the plane layout
            let dm = &bsd.decimation_modes[bm.decimation_mode as usize];
            let maxprec = if bm.is_dual_plane {
                dm.maxprec_2planes
            } else {
                dm.maxprec_1plane
            };
            assert!(maxprec.unwrap() >= bm.quant_mode);
        }
    }
}

#[test]
fn test_weight_sums_for_every_decimation_mode() {
    for dims in [(4, 4, 1), (8, 8, 1), (12, 12, 1), (6, 6, 6)] {
        let bsd = build(dims.0, dims.1, dims.2);
        for dt in &bsd.decimation_tables {
            for texel in 0..dt.texel_count as usize {
                let sum: u32 = (0..4)
                    .map(|slot| dt.texel_weights_int_4t[slot][texel] as u32)
                    .sum();
                assert_eq!(sum, TEXEL_WEIGHT_SUM);
            }
        }
    }
}

#[test]
fn test_partition_table_consistency() {
    for dims in [(4, 4, 1), (6, 6, 1), (4, 4, 4)] {
        let bsd = build(dims.0, dims.1, dims.2);
        for pc in 1..=4usize {
            for info in bsd.partition_table(pc) {
                // Labels never exceed the requested partition count, and
                // every texel is assigned, valid entry or not
                for &part in &info.partition_of_texel[..bsd.texel_count] {
                    assert!((part as usize) < pc);
                }
                let total: usize = info
                    .partition_texel_count
                    .iter()
                    .map(|&c| c as usize)
                    .sum();
                assert_eq!(total, bsd.texel_count);

                // Partition lists match the per-texel assignment
                for p in 0..4 {
                    for j in 0..info.partition_texel_count[p] as usize {
                        let texel = info.texels_of_partition[p][j] as usize;
                        assert_eq!(info.partition_of_texel[texel] as usize, p);
                    }
                }

                // The stored count is capped by the first empty partition
                let count = info.partition_count as usize;
                assert!(count <= pc);
                for p in 0..count {
                    assert_ne!(info.partition_texel_count[p], 0);
                }
                if count > 0 && count < 4 {
                    assert_eq!(info.partition_texel_count[count], 0);
                }

                // A full entry accounts for the whole block within its
                // first pc partitions
                if count == pc {
                    let used: usize = info.partition_texel_count[..pc]
                        .iter()
                        .map(|&c| c as usize)
                        .sum();
                    assert_eq!(used, bsd.texel_count);
                }
            }
        }
    }
}

#[test]
fn test_partition_dedup() {
    // Hash collisions at this block size always produce duplicates
    let bsd = build(4, 4, 1);
    assert_eq!(invalid_count(&bsd, 2), 586);
    assert_eq!(invalid_count(&bsd, 3), 583);
    assert_eq!(invalid_count(&bsd, 4), 330);

    let bsd = build(6, 6, 1);
    assert_eq!(invalid_count(&bsd, 2), 502);
    assert_eq!(invalid_count(&bsd, 3), 524);
    assert_eq!(invalid_count(&bsd, 4), 317);
}

fn invalid_count(bsd: &BlockSizeDescriptor, pc: usize) -> usize {
    bsd.partition_table(pc)
        .iter()
        .filter(|info| info.partition_count == 0)
        .count()
}

// Relabel a partitioning by order of first appearance, so patterns
// compare equal independent of the raw labels the hash produced
fn canonical_key(labels: &[u8]) -> Vec<u8> {
    let mut remap = [None::<u8>; 4];
    let mut next = 0;
    labels
        .iter()
        .map(|&part| {
            *remap[part as usize].get_or_insert_with(|| {
                let fresh = next;
                next += 1;
                fresh
            })
        })
        .collect()
}

#[test]
fn test_no_duplicate_patterns_survive() {
    for dims in [(4, 4, 1), (6, 6, 1)] {
        let bsd = build(dims.0, dims.1, dims.2);
        for pc in 2..=4usize {
            let mut seen = HashSet::new();
            for info in bsd.partition_table(pc) {
                if info.partition_count == 0 {
                    continue;
                }
                let key = canonical_key(&info.partition_of_texel[..bsd.texel_count]);
                assert!(seen.insert(key), "duplicate pattern left valid");
            }
        }
    }
}

#[test]
fn test_known_partition_entries() {
    let bsd = build(4, 4, 1);

    let info = &bsd.partition_table(2)[23];
    assert_eq!(info.partition_count, 2);
    assert_eq!(
        info.partition_of_texel[..16],
        [1, 0, 0, 0, 0, 0, 1, 1, 0, 1, 1, 1, 1, 1, 1, 0]
    );
    assert_eq!(info.partition_texel_count, [7, 9, 0, 0]);

    let info = &bsd.partition_table(3)[3];
    assert_eq!(info.partition_count, 3);
    assert_eq!(
        info.partition_of_texel[..16],
        [1, 1, 1, 1, 1, 1, 1, 2, 1, 1, 0, 2, 1, 0, 0, 2]
    );
    assert_eq!(info.partition_texel_count, [3, 10, 3, 0]);

    // Seed 6 collides with seed 0 and is marked invalid
    assert_eq!(bsd.partition_table(2)[6].partition_count, 0);
    assert_ne!(bsd.partition_table(2)[0].partition_count, 0);

    // A seed whose hash degenerates keeps the count it actually produced
    let bsd = build(6, 6, 1);
    let info = &bsd.partition_table(2)[0];
    assert_eq!(info.partition_count, 1);
    assert_eq!(info.partition_texel_count, [36, 0, 0, 0]);
}

#[test]
fn test_coverage_bitmaps_partition_the_kmeans_texels() {
    for dims in [(4, 4, 1), (8, 8, 1), (12, 12, 1), (6, 6, 6)] {
        let bsd = build(dims.0, dims.1, dims.2);
        let all: u64 = if bsd.kmeans_texel_count == 64 {
            u64::MAX
        } else {
            (1 << bsd.kmeans_texel_count) - 1
        };
        for pc in 1..=4usize {
            for info in bsd.partition_table(pc) {
                if info.partition_count == 0 {
                    continue;
                }
                let mut union = 0u64;
                let mut overlap = false;
                for &bits in &info.coverage_bitmaps {
                    overlap |= union & bits != 0;
                    union |= bits;
                }
                assert!(!overlap);
                assert_eq!(union, all);
            }
        }
    }
}

#[test]
fn test_simd_padding_of_partition_lists() {
    let bsd = build(6, 6, 1);
    for pc in 2..=4usize {
        for info in bsd.partition_table(pc) {
            // Padding is applied to every requested partition, including
            // on entries later marked invalid
            for p in 0..pc {
                let count = info.partition_texel_count[p] as usize;
                if count == 0 {
                    continue;
                }
                let padded = (count + SIMD_WIDTH - 1) / SIMD_WIDTH * SIMD_WIDTH;
                for j in count..padded {
                    assert_eq!(
                        info.texels_of_partition[p][j],
                        info.texels_of_partition[p][count - 1]
                    );
                }
            }
        }
    }
}

#[test]
fn test_rebuild_is_byte_identical() {
    let first = build(5, 5, 1);
    drop(build(5, 5, 1));
    let second = build(5, 5, 1);
    assert!(first == second);

    let first = build(4, 4, 4);
    let second = build(4, 4, 4);
    assert!(first == second);
}

#[test]
fn test_3d_descriptor() {
    let bsd = build(6, 6, 6);

    assert_eq!(bsd.texel_count, 216);
    assert_eq!(bsd.kmeans_texel_count, 64);
    assert_eq!(
        &bsd.kmeans_texels[..16],
        &[22, 100, 5, 200, 146, 138, 39, 195, 82, 34, 92, 105, 41, 106, 59, 37]
    );

    // 3D has no percentile heuristic; everything referenced is always on
    for bm in &bsd.block_modes {
        assert!(bm.percentile_hit && bm.percentile_always);
    }
    for dm in &bsd.decimation_modes[..bsd.decimation_mode_count] {
        assert!(dm.percentile_hit && dm.percentile_always);
    }

    let info = &bsd.partition_table(4)[2];
    assert_eq!(info.partition_count, 4);
    assert_eq!(info.partition_texel_count, [72, 11, 48, 85]);

    // A hash pattern that leaves partition 0 empty is unusable
    let info = &bsd.partition_table(4)[500];
    assert_eq!(info.partition_count, 0);
    assert_eq!(info.partition_texel_count, [0, 160, 0, 56]);
}
