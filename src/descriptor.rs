use bytemuck::Zeroable;
use log::debug;

use crate::block_mode::{decode_block_mode_2d, decode_block_mode_3d};
use crate::decimation::{init_decimation_table_2d, init_decimation_table_3d, DecimationTable};
use crate::partition::{init_partition_tables, PartitionInfo};
use crate::percentile::PercentileTable;
use crate::quant::ise_sequence_bitcount;
use crate::rand::Rand128;
use crate::{
    Error, MAX_DECIMATION_MODES, MAX_KMEANS_TEXELS, MAX_TEXELS_PER_BLOCK, MAX_WEIGHTS_PER_BLOCK,
    MAX_WEIGHT_BITS_PER_BLOCK, MAX_WEIGHT_MODES, MIN_WEIGHT_BITS_PER_BLOCK, PARTITION_COUNT,
};

/// One interned weight grid shared by all block modes that use it.
/// `maxprec_*` is the highest quant mode whose weight ISE cost fits the
/// block budget, or `None` when that plane layout is unusable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecimationMode {
    pub maxprec_1plane: Option<u8>,
    pub maxprec_2planes: Option<u8>,
    pub percentile_hit: bool,
    pub percentile_always: bool,
}

impl DecimationMode {
    const UNUSED: Self = Self {
        maxprec_1plane: None,
        maxprec_2planes: None,
        percentile_hit: false,
        percentile_always: false,
    };
}

/// One packed block mode: a legal 11-bit mode index bound to its
/// decimation mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockMode {
    pub mode_index: u16,
    pub decimation_mode: u8,
    pub quant_mode: u8,
    pub is_dual_plane: bool,
    pub percentile_hit: bool,
    pub percentile_always: bool,
}

/// Every table the codec needs for one block footprint: packed block
/// modes, their decimation tables, the four partition tables and the
/// k-means texel sample. Built once per context, immutable afterwards.
#[derive(PartialEq)]
pub struct BlockSizeDescriptor {
    pub xdim: usize,
    pub ydim: usize,
    pub zdim: usize,
    pub texel_count: usize,

    pub decimation_mode_count: usize,
    pub decimation_modes: [DecimationMode; MAX_DECIMATION_MODES],
    /// Decimation tables, indexed by decimation mode.
    pub decimation_tables: Vec<Box<DecimationTable>>,

    pub block_modes: Vec<BlockMode>,
    /// Maps an 11-bit mode index to its slot in `block_modes`, or `None`
    /// if the mode is illegal or was filtered out.
    pub block_mode_packed_index: [Option<u16>; MAX_WEIGHT_MODES],

    pub kmeans_texel_count: usize,
    pub kmeans_texels: [u8; MAX_KMEANS_TEXELS],

    /// Partition tables, concatenated {2-seeds, 3-seeds, 4-seeds, single}.
    pub partitions: Vec<PartitionInfo>,
}

impl BlockSizeDescriptor {
    /// Build the descriptor for one block footprint.
    ///
    /// 2D blocks accept x,y in [4,12] with z = 1; 3D blocks accept
    /// x,y,z in [3,6]. `mode_cutoff` in [0,1] filters 2D block modes by
    /// their percentile rank when `can_omit_modes` allows it; 3D blocks
    /// keep every legal mode.
    pub fn new(
        x_texels: u32,
        y_texels: u32,
        z_texels: u32,
        can_omit_modes: bool,
        mode_cutoff: f32,
        percentiles: &PercentileTable,
    ) -> Result<Self, Error> {
        let mut bsd = if z_texels > 1 {
            let valid = (3..=6).contains(&x_texels)
                && (3..=6).contains(&y_texels)
                && (3..=6).contains(&z_texels);
            if !valid {
                return Err(Error::BadBlockSize(x_texels, y_texels, z_texels));
            }
            construct_3d(x_texels as usize, y_texels as usize, z_texels as usize)?
        } else {
            let valid =
                (4..=12).contains(&x_texels) && (4..=12).contains(&y_texels) && z_texels == 1;
            if !valid {
                return Err(Error::BadBlockSize(x_texels, y_texels, z_texels));
            }
            construct_2d(
                x_texels as usize,
                y_texels as usize,
                can_omit_modes,
                mode_cutoff,
                percentiles,
            )?
        };

        bsd.partitions = vec![PartitionInfo::zeroed(); 3 * PARTITION_COUNT + 1];
        init_partition_tables(&mut bsd);

        Ok(bsd)
    }

    /// The 1024-entry table for 2..4 partitions, or the single-entry
    /// 1-partition table.
    pub fn partition_table(&self, partition_count: usize) -> &[PartitionInfo] {
        match partition_count {
            1 => &self.partitions[3 * PARTITION_COUNT..],
            2 => &self.partitions[..PARTITION_COUNT],
            3 => &self.partitions[PARTITION_COUNT..2 * PARTITION_COUNT],
            4 => &self.partitions[2 * PARTITION_COUNT..3 * PARTITION_COUNT],
            _ => panic!("partition count out of range: {}", partition_count),
        }
    }

    pub fn block_mode(&self, mode_index: u16) -> Option<&BlockMode> {
        self.block_mode_packed_index[mode_index as usize]
            .map(|packed| &self.block_modes[packed as usize])
    }

    pub fn decimation_table(&self, decimation_mode: usize) -> &DecimationTable {
        &self.decimation_tables[decimation_mode]
    }

    fn empty(xdim: usize, ydim: usize, zdim: usize) -> Self {
        Self {
            xdim,
            ydim,
            zdim,
            texel_count: xdim * ydim * zdim,
            decimation_mode_count: 0,
            decimation_modes: [DecimationMode::UNUSED; MAX_DECIMATION_MODES],
            decimation_tables: Vec::new(),
            block_modes: Vec::new(),
            block_mode_packed_index: [None; MAX_WEIGHT_MODES],
            kmeans_texel_count: 0,
            kmeans_texels: [0; MAX_KMEANS_TEXELS],
            partitions: Vec::new(),
        }
    }
}

/// Highest quant mode whose ISE cost for `weight_count` weights fits the
/// per-block weight bit budget.
fn max_weight_precision(weight_count: usize) -> Option<u8> {
    let mut maxprec = None;
    for quant_mode in 0..12u8 {
        let bits = ise_sequence_bitcount(weight_count as u32, quant_mode);
        if (MIN_WEIGHT_BITS_PER_BLOCK..=MAX_WEIGHT_BITS_PER_BLOCK).contains(&bits) {
            maxprec = Some(quant_mode);
        }
    }
    maxprec
}

fn new_decimation_mode(
    weight_count: usize,
    table: Box<DecimationTable>,
    bsd: &mut BlockSizeDescriptor,
) -> u8 {
    let dm_index = bsd.decimation_mode_count;

    let maxprec_1plane = max_weight_precision(weight_count);
    let maxprec_2planes = if 2 * weight_count <= MAX_WEIGHTS_PER_BLOCK {
        max_weight_precision(2 * weight_count)
    } else {
        None
    };

    bsd.decimation_modes[dm_index] = DecimationMode {
        maxprec_1plane,
        maxprec_2planes,
        percentile_hit: false,
        percentile_always: false,
    };
    bsd.decimation_tables.push(table);
    bsd.decimation_mode_count += 1;

    dm_index as u8
}

fn construct_dt_entry_2d(
    x_texels: usize,
    y_texels: usize,
    x_weights: usize,
    y_weights: usize,
    bsd: &mut BlockSizeDescriptor,
) -> Result<u8, Error> {
    let weight_count = x_weights * y_weights;
    assert!(weight_count <= MAX_WEIGHTS_PER_BLOCK);

    let mut table = bytemuck::try_zeroed_box::<DecimationTable>().map_err(|_| Error::OutOfMemory)?;
    init_decimation_table_2d(x_texels, y_texels, x_weights, y_weights, &mut table);

    let dm_index = new_decimation_mode(weight_count, table, bsd);

    // The grid was interned from a valid block mode, so at least one
    // plane layout has a feasible quant level
    let dm = &bsd.decimation_modes[dm_index as usize];
    assert!(dm.maxprec_1plane.is_some() || dm.maxprec_2planes.is_some());

    Ok(dm_index)
}

fn construct_2d(
    x_texels: usize,
    y_texels: usize,
    can_omit_modes: bool,
    mode_cutoff: f32,
    percentiles: &PercentileTable,
) -> Result<BlockSizeDescriptor, Error> {
    // Remap table from a weight grid to its packed decimation mode,
    // indexed by [y_weights * 16 + x_weights]
    const MAX_DMI: usize = 12 * 16 + 12;
    let mut decimation_mode_index = [None::<u8>; MAX_DMI];

    let mut bsd = BlockSizeDescriptor::empty(x_texels, y_texels, 1);

    for mode_index in 0..MAX_WEIGHT_MODES {
        let percentile = percentiles.get(mode_index);
        let selected = percentile <= mode_cutoff || !can_omit_modes;

        // A compressor never uses more weights per axis than the block
        // has texels; it would waste bits, so such modes are skipped even
        // though the format technically permits them
        let mode = match decode_block_mode_2d(mode_index as u16) {
            Some(m) if selected && m.x_weights <= x_texels && m.y_weights <= y_texels => m,
            _ => continue,
        };

        let grid_slot = mode.y_weights * 16 + mode.x_weights;
        let decimation_mode = match decimation_mode_index[grid_slot] {
            Some(dm) => dm,
            None => {
                let dm =
                    construct_dt_entry_2d(x_texels, y_texels, mode.x_weights, mode.y_weights, &mut bsd)?;
                decimation_mode_index[grid_slot] = Some(dm);
                dm
            }
        };

        // Flatten the heuristic into flags on both the block mode and its
        // decimation mode
        let percentile_hit = percentile <= mode_cutoff;
        let percentile_always = percentile == 0.0;
        let dm = &mut bsd.decimation_modes[decimation_mode as usize];
        dm.percentile_hit |= percentile_hit;
        dm.percentile_always |= percentile_always;

        let packed_idx = bsd.block_modes.len() as u16;
        bsd.block_modes.push(BlockMode {
            mode_index: mode_index as u16,
            decimation_mode,
            quant_mode: mode.quant_mode,
            is_dual_plane: mode.is_dual_plane,
            percentile_hit,
            percentile_always,
        });
        bsd.block_mode_packed_index[mode_index] = Some(packed_idx);
    }

    debug!(
        "2d block {}x{}: {} block modes, {} decimation modes",
        x_texels,
        y_texels,
        bsd.block_modes.len(),
        bsd.decimation_mode_count
    );

    assign_kmeans_texels(&mut bsd);

    Ok(bsd)
}

fn construct_3d(
    x_texels: usize,
    y_texels: usize,
    z_texels: usize,
) -> Result<BlockSizeDescriptor, Error> {
    // Remap table indexed by [z_weights * 64 + y_weights * 8 + x_weights]
    const MAX_DMI: usize = 6 * 64 + 6 * 8 + 6;
    let mut decimation_mode_index = [None::<u8>; MAX_DMI];

    let mut bsd = BlockSizeDescriptor::empty(x_texels, y_texels, z_texels);

    // Unlike 2D, every usable weight grid is built up front
    for x_weights in 2..=x_texels {
        for y_weights in 2..=y_texels {
            for z_weights in 2..=z_texels {
                let weight_count = x_weights * y_weights * z_weights;
                if weight_count > MAX_WEIGHTS_PER_BLOCK {
                    continue;
                }

                let mut table =
                    bytemuck::try_zeroed_box::<DecimationTable>().map_err(|_| Error::OutOfMemory)?;
                init_decimation_table_3d(
                    x_texels, y_texels, z_texels, x_weights, y_weights, z_weights, &mut table,
                );

                let dm = new_decimation_mode(weight_count, table, &mut bsd);
                decimation_mode_index[z_weights * 64 + y_weights * 8 + x_weights] = Some(dm);
            }
        }
    }

    for mode_index in 0..MAX_WEIGHT_MODES {
        let mode = match decode_block_mode_3d(mode_index as u16) {
            Some(m)
                if m.x_weights <= x_texels
                    && m.y_weights <= y_texels
                    && m.z_weights <= z_texels =>
            {
                m
            }
            _ => continue,
        };

        let grid_slot = mode.z_weights * 64 + mode.y_weights * 8 + mode.x_weights;
        let decimation_mode = match decimation_mode_index[grid_slot] {
            Some(dm) => dm,
            None => unreachable!(),
        };

        // No percentile table exists for 3D, so every mode stays enabled
        let dm = &mut bsd.decimation_modes[decimation_mode as usize];
        dm.percentile_hit = true;
        dm.percentile_always = true;

        let packed_idx = bsd.block_modes.len() as u16;
        bsd.block_modes.push(BlockMode {
            mode_index: mode_index as u16,
            decimation_mode,
            quant_mode: mode.quant_mode,
            is_dual_plane: mode.is_dual_plane,
            percentile_hit: true,
            percentile_always: true,
        });
        bsd.block_mode_packed_index[mode_index] = Some(packed_idx);
    }

    debug!(
        "3d block {}x{}x{}: {} block modes, {} decimation modes",
        x_texels,
        y_texels,
        z_texels,
        bsd.block_modes.len(),
        bsd.decimation_mode_count
    );

    assign_kmeans_texels(&mut bsd);

    Ok(bsd)
}

/// Pick the texels used as k-means clustering representatives: the whole
/// block when it fits, otherwise a fixed pseudo-random sample without
/// replacement.
fn assign_kmeans_texels(bsd: &mut BlockSizeDescriptor) {
    if bsd.texel_count <= MAX_KMEANS_TEXELS {
        for i in 0..bsd.texel_count {
            bsd.kmeans_texels[i] = i as u8;
        }
        bsd.kmeans_texel_count = bsd.texel_count;
        return;
    }

    let mut rng = Rand128::new();
    let mut seen = [false; MAX_TEXELS_PER_BLOCK];

    let mut picked = 0;
    while picked < MAX_KMEANS_TEXELS {
        let texel = (rng.next() as u32 as usize) % bsd.texel_count;
        if !seen[texel] {
            bsd.kmeans_texels[picked] = texel as u8;
            seen[texel] = true;
            picked += 1;
        }
    }

    bsd.kmeans_texel_count = MAX_KMEANS_TEXELS;
}
