use bytemuck::Zeroable;

use crate::{
    round_up_to_simd_multiple, MAX_TEXELS_PER_BLOCK, MAX_WEIGHTS_PER_BLOCK, TEXEL_WEIGHT_SUM,
};

/// Precomputed interpolation from a quantized weight grid to per-texel
/// weights, stored both ways round.
///
/// The forward map gives each texel its up-to-4 contributing grid weights
/// and integer coefficients (summing to [`TEXEL_WEIGHT_SUM`]); the reverse
/// map gives each weight the texels it touches. Both are stored transposed
/// (slot-major) and padded to [`crate::SIMD_WIDTH`] lanes so gathers can
/// over-fetch: padded texel identities repeat the last valid lane, padded
/// coefficients are zero.
#[derive(PartialEq, Zeroable)]
#[repr(align(32))]
pub struct DecimationTable {
    pub texel_count: u32,
    pub weight_count: u32,
    pub weight_x: u32,
    pub weight_y: u32,
    pub weight_z: u32,

    pub texel_weight_count: [u8; MAX_TEXELS_PER_BLOCK],
    pub texel_weights_4t: [[u8; MAX_TEXELS_PER_BLOCK]; 4],
    pub texel_weights_int_4t: [[u8; MAX_TEXELS_PER_BLOCK]; 4],
    pub texel_weights_float_4t: [[f32; MAX_TEXELS_PER_BLOCK]; 4],

    pub weight_texel_count: [u8; MAX_WEIGHTS_PER_BLOCK],
    pub weight_texel: [[u8; MAX_WEIGHTS_PER_BLOCK]; MAX_TEXELS_PER_BLOCK],
    pub weights_flt: [[f32; MAX_WEIGHTS_PER_BLOCK]; MAX_TEXELS_PER_BLOCK],

    // Per (weight, touched texel): all four weights touching that texel,
    // slot 0 swapped to be the identity weight. Lets the encoder fetch a
    // texel's whole weight neighbourhood branch-free once it reached the
    // texel through a weight.
    pub texel_weights_texel: [[[u8; 4]; MAX_TEXELS_PER_BLOCK]; MAX_WEIGHTS_PER_BLOCK],
    pub texel_weights_float_texel: [[[f32; 4]; MAX_TEXELS_PER_BLOCK]; MAX_WEIGHTS_PER_BLOCK],
}

/// Scratch accumulator for texel/weight contributions, gathered in texel
/// order before being laid out into the transposed table arrays.
struct Contributions {
    weight_count_of_texel: [u8; MAX_TEXELS_PER_BLOCK],
    grid_weights_of_texel: [[u8; 4]; MAX_TEXELS_PER_BLOCK],
    weights_of_texel: [[u8; 4]; MAX_TEXELS_PER_BLOCK],

    texel_count_of_weight: [u8; MAX_WEIGHTS_PER_BLOCK],
    texels_of_weight: [[u8; MAX_TEXELS_PER_BLOCK]; MAX_WEIGHTS_PER_BLOCK],
    texel_weights_of_weight: [[u8; MAX_TEXELS_PER_BLOCK]; MAX_WEIGHTS_PER_BLOCK],
    max_texel_count_of_weight: u8,
}

impl Contributions {
    fn new() -> Self {
        Self {
            weight_count_of_texel: [0; MAX_TEXELS_PER_BLOCK],
            grid_weights_of_texel: [[0; 4]; MAX_TEXELS_PER_BLOCK],
            weights_of_texel: [[0; 4]; MAX_TEXELS_PER_BLOCK],
            texel_count_of_weight: [0; MAX_WEIGHTS_PER_BLOCK],
            texels_of_weight: [[0; MAX_TEXELS_PER_BLOCK]; MAX_WEIGHTS_PER_BLOCK],
            texel_weights_of_weight: [[0; MAX_TEXELS_PER_BLOCK]; MAX_WEIGHTS_PER_BLOCK],
            max_texel_count_of_weight: 0,
        }
    }

    fn add(&mut self, texel: usize, grid_weights: [usize; 4], weights: [i32; 4]) {
        for i in 0..4 {
            if weights[i] != 0 {
                let w = grid_weights[i];
                let tslot = self.weight_count_of_texel[texel] as usize;
                self.grid_weights_of_texel[texel][tslot] = w as u8;
                self.weights_of_texel[texel][tslot] = weights[i] as u8;
                self.weight_count_of_texel[texel] += 1;

                let wslot = self.texel_count_of_weight[w] as usize;
                self.texels_of_weight[w][wslot] = texel as u8;
                self.texel_weights_of_weight[w][wslot] = weights[i] as u8;
                self.texel_count_of_weight[w] += 1;
                self.max_texel_count_of_weight = self
                    .max_texel_count_of_weight
                    .max(self.texel_count_of_weight[w]);
            }
        }
    }
}

/// Fixed-point position of a texel on the weight grid, split into the
/// integer cell and the 4-bit fraction. The constants come from the ASTC
/// specification and must not be altered.
fn grid_position(texel_dim: usize, weight_dim: usize, coord: usize) -> (usize, usize) {
    let pos = (((1024 + texel_dim / 2) / (texel_dim - 1)) * coord * (weight_dim - 1) + 32) >> 6;
    (pos >> 4, pos & 0xF)
}

fn fill_tables(contribs: &Contributions, texel_count: usize, weight_count: usize, dt: &mut DecimationTable) {
    for i in 0..texel_count {
        let count = contribs.weight_count_of_texel[i] as usize;
        dt.texel_weight_count[i] = count as u8;

        // Zero all 4 slots so SIMD code can rely on inactive lanes
        for j in 0..4 {
            dt.texel_weights_int_4t[j][i] = 0;
            dt.texel_weights_float_4t[j][i] = 0.0;
            dt.texel_weights_4t[j][i] = 0;
        }

        for j in 0..count {
            let w = contribs.weights_of_texel[i][j];
            dt.texel_weights_int_4t[j][i] = w;
            dt.texel_weights_float_4t[j][i] = f32::from(w) * (1.0 / TEXEL_WEIGHT_SUM as f32);
            dt.texel_weights_4t[j][i] = contribs.grid_weights_of_texel[i][j];
        }
    }

    let max_texel_count = contribs.max_texel_count_of_weight as usize;

    for i in 0..weight_count {
        let texel_count_wt = contribs.texel_count_of_weight[i] as usize;
        dt.weight_texel_count[i] = texel_count_wt as u8;

        for j in 0..texel_count_wt {
            let texel = contribs.texels_of_weight[i][j] as usize;

            dt.weight_texel[j][i] = texel as u8;
            dt.weights_flt[j][i] = f32::from(contribs.texel_weights_of_weight[i][j]);

            // One of the four weights touching this texel is weight i
            // itself; swap it into slot 0 so consumers get the identity
            // lane at a fixed position.
            let mut swap_idx = 0;
            for k in 0..4 {
                let tw = dt.texel_weights_4t[k][texel];
                let twf = dt.texel_weights_float_4t[k][texel];
                if tw as usize == i && twf != 0.0 {
                    swap_idx = k;
                }
                dt.texel_weights_texel[i][j][k] = tw;
                dt.texel_weights_float_texel[i][j][k] = twf;
            }

            if swap_idx != 0 {
                dt.texel_weights_texel[i][j].swap(0, swap_idx);
                dt.texel_weights_float_texel[i][j].swap(0, swap_idx);
            }
        }

        // Pad to the widest weight with the last valid texel index so
        // over-fetching gathers stay in bounds
        let last_texel = dt.weight_texel[texel_count_wt - 1][i];
        for j in texel_count_wt..max_texel_count {
            dt.weight_texel[j][i] = last_texel;
            dt.weights_flt[j][i] = 0.0;
        }
    }

    let texel_count_simd = round_up_to_simd_multiple(texel_count);
    for i in texel_count..texel_count_simd {
        dt.texel_weight_count[i] = 0;

        for j in 0..4 {
            dt.texel_weights_float_4t[j][i] = 0.0;
            dt.texel_weights_4t[j][i] = 0;
            dt.texel_weights_int_4t[j][i] = 0;
        }
    }

    let last_texel_count_wt = contribs.texel_count_of_weight[weight_count - 1] as usize;
    let last_texel = dt.weight_texel[last_texel_count_wt - 1][weight_count - 1];

    let weight_count_simd = round_up_to_simd_multiple(weight_count);
    for i in weight_count..weight_count_simd {
        dt.weight_texel_count[i] = 0;

        for j in 0..max_texel_count {
            dt.weight_texel[j][i] = last_texel;
            dt.weights_flt[j][i] = 0.0;
        }
    }

    dt.texel_count = texel_count as u32;
    dt.weight_count = weight_count as u32;
}

pub(crate) fn init_decimation_table_2d(
    x_texels: usize,
    y_texels: usize,
    x_weights: usize,
    y_weights: usize,
    dt: &mut DecimationTable,
) {
    let texel_count = x_texels * y_texels;
    let weight_count = x_weights * y_weights;

    let mut contribs = Contributions::new();

    for y in 0..y_texels {
        for x in 0..x_texels {
            let texel = y * x_texels + x;

            let (x_int, x_frac) = grid_position(x_texels, x_weights, x);
            let (y_int, y_frac) = grid_position(y_texels, y_weights, y);

            let base = x_int + y_int * x_weights;
            let grid_weights = [base, base + 1, base + x_weights, base + x_weights + 1];

            // Truncated-precision bilinear interpolation
            let prod = (x_frac * y_frac) as i32;
            let w3 = (prod + 8) >> 4;
            let w1 = x_frac as i32 - w3;
            let w2 = y_frac as i32 - w3;
            let w0 = 16 - x_frac as i32 - y_frac as i32 + w3;

            contribs.add(texel, grid_weights, [w0, w1, w2, w3]);
        }
    }

    fill_tables(&contribs, texel_count, weight_count, dt);

    dt.weight_x = x_weights as u32;
    dt.weight_y = y_weights as u32;
    dt.weight_z = 1;
}

pub(crate) fn init_decimation_table_3d(
    x_texels: usize,
    y_texels: usize,
    z_texels: usize,
    x_weights: usize,
    y_weights: usize,
    z_weights: usize,
    dt: &mut DecimationTable,
) {
    let texel_count = x_texels * y_texels * z_texels;
    let weight_count = x_weights * y_weights * z_weights;

    let mut contribs = Contributions::new();

    for z in 0..z_texels {
        for y in 0..y_texels {
            for x in 0..x_texels {
                let texel = (z * y_texels + y) * x_texels + x;

                let (x_int, x_frac) = grid_position(x_texels, x_weights, x);
                let (y_int, y_frac) = grid_position(y_texels, y_weights, y);
                let (z_int, z_frac) = grid_position(z_texels, z_weights, z);

                let base = (z_int * y_weights + y_int) * x_weights + x_int;
                let corner = ((z_int + 1) * y_weights + (y_int + 1)) * x_weights + (x_int + 1);

                // Simplex interpolation: the ordering of the fractions
                // picks one of six tetrahedra within the grid cell
                let fs = x_frac as i32;
                let ft = y_frac as i32;
                let fp = z_frac as i32;

                let case =
                    ((fs > ft) as usize) << 2 | ((ft > fp) as usize) << 1 | (fs > fp) as usize;
                let n = x_weights;
                let nm = x_weights * y_weights;

                let (s1, s2, w0, w1, w2, w3) = match case {
                    7 => (1, n, 16 - fs, fs - ft, ft - fp, fp),
                    3 => (n, 1, 16 - ft, ft - fs, fs - fp, fp),
                    5 => (1, nm, 16 - fs, fs - fp, fp - ft, ft),
                    4 => (nm, 1, 16 - fp, fp - fs, fs - ft, ft),
                    2 => (n, nm, 16 - ft, ft - fp, fp - fs, fs),
                    _ => (nm, n, 16 - fp, fp - ft, ft - fs, fs),
                };

                let grid_weights = [base, base + s1, base + s1 + s2, corner];

                contribs.add(texel, grid_weights, [w0, w1, w2, w3]);
            }
        }
    }

    fill_tables(&contribs, texel_count, weight_count, dt);

    dt.weight_x = x_weights as u32;
    dt.weight_y = y_weights as u32;
    dt.weight_z = z_weights as u32;
}
