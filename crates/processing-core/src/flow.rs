//! Dense optical flow by polynomial expansion.
//!
//! Every pixel neighbourhood of both frames is approximated by a quadratic
//! polynomial `f(p) = pᵀAp + bᵀp + c`. A pure translation `d` between the
//! frames changes `b` by `-2Ad`, so `d` can be solved from the two
//! expansions. The solve is averaged over a window, refined iteratively, and
//! run coarse-to-fine over an image pyramid so that large motions are caught
//! at low resolution and sharpened at full resolution.
//!
//! # Algorithm
//!
//! 1. **Pyramid**: Gaussian-smooth and downscale both frames `levels - 1` times
//!    by `pyr_scale`.
//! 2. **Expansion**: weighted least-squares fit of `(A, b)` per pixel over a
//!    `poly_n × poly_n` neighbourhood with Gaussian weights (`poly_sigma`).
//! 3. **Update**: per pixel, compare the first frame's expansion with the
//!    second frame's expansion sampled at the current displacement estimate.
//! 4. **Solve**: box-average the normal equations over `win_size` and solve the
//!    2×2 system for a new displacement. Repeat `iterations` times.
//! 5. **Propagate**: upscale the displacement to the next finer level.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, LumaA};
use imageproc::filter::{gaussian_blur_f32, separable_filter_equal};
use visage_common::FlowConfig;

/// Levels smaller than this (either side, pixels) are not built.
const MIN_LEVEL_SIDE: u32 = 16;

/// Regularizer added to the 2×2 determinant; keeps flat regions at zero.
const SOLVE_EPSILON: f32 = 1e-3;

/// Pyramid levels hold intensities in `[0, 1]`; `imageops::resize` clamps
/// float pixels to that range. Expansion works in 8-bit units.
const INTENSITY_RANGE: f32 = 255.0;

/// Single-channel float image.
type Plane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Two-channel displacement image, `[dx, dy]` per pixel.
type Displacement = ImageBuffer<LumaA<f32>, Vec<f32>>;

/// Per-pixel displacement field, row-major, `[dx, dy]` in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    width: usize,
    height: usize,
    vectors: Vec<[f32; 2]>,
}

impl FlowField {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Displacement at a pixel, if inside the field.
    pub fn get(&self, x: usize, y: usize) -> Option<[f32; 2]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.vectors[y * self.width + x])
    }

    pub fn vectors(&self) -> &[[f32; 2]] {
        &self.vectors
    }

    /// Euclidean norm of every vector.
    pub fn magnitudes(&self) -> impl Iterator<Item = f64> + '_ {
        self.vectors
            .iter()
            .map(|[dx, dy]| (*dx as f64).hypot(*dy as f64))
    }

    /// Mean displacement `(dx, dy)` over the whole field.
    pub fn mean_vector(&self) -> (f64, f64) {
        if self.vectors.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.vectors.len() as f64;
        let (sx, sy) = self
            .vectors
            .iter()
            .fold((0.0, 0.0), |(sx, sy), [dx, dy]| {
                (sx + *dx as f64, sy + *dy as f64)
            });
        (sx / n, sy / n)
    }
}

/// Compute the dense flow from `prev` to `curr`.
///
/// Both images must have the same, non-zero dimensions; callers check this.
pub fn dense_flow(prev: &GrayImage, curr: &GrayImage, config: &FlowConfig) -> FlowField {
    let prev_pyramid = build_pyramid(&to_plane(prev), config);
    let curr_pyramid = build_pyramid(&to_plane(curr), config);
    let basis = PolyBasis::new(config.poly_n, config.poly_sigma);
    let window = box_kernel(config.win_size);

    let mut flow: Option<Displacement> = None;

    for level in (0..prev_pyramid.len()).rev() {
        let p1 = &prev_pyramid[level];
        let p2 = &curr_pyramid[level];
        let (w, h) = p1.dimensions();

        let mut current = match flow.take() {
            None => Displacement::new(w, h),
            Some(coarse) => upscale(&coarse, w, h),
        };

        let e1 = basis.expand(p1);
        let e2 = basis.expand(p2);

        for _ in 0..config.iterations {
            let normal = update_matrices(&e1, &e2, &current);
            let averaged = match &window {
                Some(kernel) => {
                    normal.map(|plane| separable_filter_equal(&plane, kernel.as_slice()))
                }
                None => normal,
            };
            solve_flow(&averaged, &mut current);
        }

        flow = Some(current);
    }

    let (width, height) = (prev.width() as usize, prev.height() as usize);
    let vectors = match flow {
        Some(field) => field.pixels().map(|LumaA([dx, dy])| [*dx, *dy]).collect(),
        None => vec![[0.0, 0.0]; width * height],
    };

    FlowField {
        width,
        height,
        vectors,
    }
}

fn to_plane(image: &GrayImage) -> Plane {
    Plane::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[0] as f32 / INTENSITY_RANGE])
    })
}

fn build_pyramid(base: &Plane, config: &FlowConfig) -> Vec<Plane> {
    let mut levels = vec![base.clone()];
    for i in 1..config.levels {
        let scale = config.pyr_scale.powi(i as i32);
        let w = (base.width() as f64 * scale).round() as u32;
        let h = (base.height() as f64 * scale).round() as u32;
        if w < MIN_LEVEL_SIDE || h < MIN_LEVEL_SIDE {
            break;
        }
        let sigma = (((1.0 / scale - 1.0) * 0.5) as f32).max(0.3);
        let smoothed = gaussian_blur_f32(base, sigma);
        levels.push(imageops::resize(&smoothed, w, h, FilterType::Triangle));
    }
    levels
}

/// Normalized `size × size` averaging kernel (size rounded up to odd);
/// `None` when the window is a single pixel.
fn box_kernel(size: usize) -> Option<Vec<f32>> {
    let side = (size / 2) * 2 + 1;
    (side > 1).then(|| vec![1.0 / side as f32; side])
}

/// Bilinear upscale of a coarse displacement, rescaling the vectors to the
/// finer grid. Pixel centres are aligned.
fn upscale(coarse: &Displacement, width: u32, height: u32) -> Displacement {
    let sx = width as f32 / coarse.width() as f32;
    let sy = height as f32 / coarse.height() as f32;
    let max_x = (coarse.width() - 1) as f32;
    let max_y = (coarse.height() - 1) as f32;

    Displacement::from_fn(width, height, |x, y| {
        let src_x = ((x as f32 + 0.5) / sx - 0.5).clamp(0.0, max_x);
        let src_y = ((y as f32 + 0.5) / sy - 0.5).clamp(0.0, max_y);
        let LumaA([dx, dy]) =
            imageops::interpolate_bilinear(coarse, src_x, src_y).unwrap_or(LumaA([0.0, 0.0]));
        LumaA([dx * sx, dy * sy])
    })
}

/// Bilinear sample at a fractional position, clamped to the borders.
fn sample(plane: &Plane, x: f32, y: f32) -> f32 {
    let x = x.clamp(0.0, (plane.width() - 1) as f32);
    let y = y.clamp(0.0, (plane.height() - 1) as f32);
    imageops::interpolate_bilinear(plane, x, y)
        .map(|Luma([v])| v)
        .unwrap_or(0.0)
}

/// Expansion coefficients of one image: `[bx, by, axx, ayy, axy]`.
type Expansion = [Plane; 5];

/// Per-pixel normal equations: `[g11, g12, g22, h1, h2]`.
type NormalEquations = [Plane; 5];

fn update_matrices(e1: &Expansion, e2: &Expansion, flow: &Displacement) -> NormalEquations {
    let (w, h) = flow.dimensions();
    let mut out: NormalEquations = std::array::from_fn(|_| Plane::new(w, h));

    for (x, y, LumaA([dx, dy])) in flow.enumerate_pixels() {
        let (dx, dy) = (*dx, *dy);
        let sx = x as f32 + dx;
        let sy = y as f32 + dy;
        let at = |plane: &Plane| plane.get_pixel(x, y)[0];

        let b1x = at(&e1[0]);
        let b1y = at(&e1[1]);
        let b2x = sample(&e2[0], sx, sy);
        let b2y = sample(&e2[1], sx, sy);

        let axx = (at(&e1[2]) + sample(&e2[2], sx, sy)) * 0.5;
        let ayy = (at(&e1[3]) + sample(&e2[3], sx, sy)) * 0.5;
        let axy = (at(&e1[4]) + sample(&e2[4], sx, sy)) * 0.5;

        let dbx = -0.5 * (b2x - b1x) + axx * dx + axy * dy;
        let dby = -0.5 * (b2y - b1y) + axy * dx + ayy * dy;

        let terms = [
            axx * axx + axy * axy,
            axy * (axx + ayy),
            axy * axy + ayy * ayy,
            axx * dbx + axy * dby,
            axy * dbx + ayy * dby,
        ];
        for (plane, value) in out.iter_mut().zip(terms) {
            plane.put_pixel(x, y, Luma([value]));
        }
    }

    out
}

fn solve_flow(normal: &NormalEquations, flow: &mut Displacement) {
    for (x, y, pixel) in flow.enumerate_pixels_mut() {
        let [g11, g12, g22, h1, h2] = std::array::from_fn(|k| normal[k].get_pixel(x, y)[0]);

        let inv_det = 1.0 / (g11 * g22 - g12 * g12 + SOLVE_EPSILON);
        *pixel = LumaA([
            (g22 * h1 - g12 * h2) * inv_det,
            (g11 * h2 - g12 * h1) * inv_det,
        ]);
    }
}

/// Weighted least-squares projection onto `{1, x, y, x², y², xy}`.
struct PolyBasis {
    radius: i64,
    /// One kernel per coefficient `[bx, by, axx, ayy, axy]`, row-major over
    /// the `(2r+1)²` neighbourhood.
    kernels: [Vec<f32>; 5],
}

impl PolyBasis {
    fn new(poly_n: usize, sigma: f64) -> Self {
        let radius = (poly_n / 2).max(1) as i64;
        let side = (2 * radius + 1) as usize;

        let mut samples = Vec::with_capacity(side * side);
        let mut gram = [[0.0_f64; 6]; 6];
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let (fx, fy) = (dx as f64, dy as f64);
                let weight = (-(fx * fx + fy * fy) / (2.0 * sigma * sigma)).exp();
                let basis = [1.0, fx, fy, fx * fx, fy * fy, fx * fy];
                for (r, row) in gram.iter_mut().enumerate() {
                    for (c, cell) in row.iter_mut().enumerate() {
                        *cell += weight * basis[r] * basis[c];
                    }
                }
                samples.push((weight, basis));
            }
        }

        let inverse = invert6(gram);

        // Coefficient order in the basis: 1 = bx, 2 = by, 3 = x², 4 = y², 5 = xy.
        // A is symmetric, so its off-diagonal entry is half the xy coefficient.
        // Intensities are rescaled to 8-bit units here.
        let kernels = std::array::from_fn(|k| {
            let coeff = k + 1;
            let half = if coeff == 5 { 0.5 } else { 1.0 };
            samples
                .iter()
                .map(|(weight, basis)| {
                    let projected: f64 = (0..6).map(|j| inverse[coeff][j] * basis[j]).sum();
                    (projected * weight * half) as f32 * INTENSITY_RANGE
                })
                .collect()
        });

        Self { radius, kernels }
    }

    fn expand(&self, plane: &Plane) -> Expansion {
        let (w, h) = plane.dimensions();
        let (max_x, max_y) = (w as i64 - 1, h as i64 - 1);
        let r = self.radius;

        let mut out: Expansion = std::array::from_fn(|_| Plane::new(w, h));
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0_f32; 5];
                let mut k = 0;
                for dy in -r..=r {
                    for dx in -r..=r {
                        let px = (x as i64 + dx).clamp(0, max_x) as u32;
                        let py = (y as i64 + dy).clamp(0, max_y) as u32;
                        let v = plane.get_pixel(px, py)[0];
                        for (c, kernel) in self.kernels.iter().enumerate() {
                            acc[c] += kernel[k] * v;
                        }
                        k += 1;
                    }
                }
                for (target, value) in out.iter_mut().zip(acc) {
                    target.put_pixel(x, y, Luma([value]));
                }
            }
        }

        out
    }
}

/// Gauss-Jordan inverse of a symmetric positive-definite 6×6 matrix.
fn invert6(m: [[f64; 6]; 6]) -> [[f64; 6]; 6] {
    let mut a = m;
    let mut inv = [[0.0_f64; 6]; 6];
    for (i, row) in inv.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for col in 0..6 {
        let pivot_row = (col..6)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .unwrap_or(col);
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in 0..6 {
            a[col][j] /= pivot;
            inv[col][j] /= pivot;
        }

        for row in 0..6 {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..6 {
                a[row][j] -= factor * a[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }

    inv
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Smooth, textured test pattern; `shift` moves it right by whole pixels.
    fn pattern(width: u32, height: u32, shift: f32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let fx = x as f32 - shift;
            let fy = y as f32;
            let v = 128.0 + 60.0 * (fx * 0.35).sin() * (fy * 0.25).cos() + 40.0 * (fy * 0.4).sin();
            Luma([v.clamp(0.0, 255.0) as u8])
        })
    }

    #[test]
    fn test_identical_frames_have_zero_flow() {
        let frame = pattern(48, 40, 0.0);
        let flow = dense_flow(&frame, &frame, &FlowConfig::default());
        assert_eq!(flow.width(), 48);
        assert_eq!(flow.height(), 40);
        assert!(flow.magnitudes().all(|m| m == 0.0));
    }

    #[test]
    fn test_rightward_shift_gives_positive_dx() {
        let prev = pattern(64, 48, 0.0);
        let curr = pattern(64, 48, 2.0);
        let flow = dense_flow(&prev, &curr, &FlowConfig::default());

        let (mean_dx, mean_dy) = flow.mean_vector();
        assert!(mean_dx > 0.5, "mean dx = {mean_dx}");
        assert!(mean_dx.abs() > mean_dy.abs());
    }

    #[test]
    fn test_field_matches_input_dimensions_on_tiny_frames() {
        // Too small for any pyramid level beyond the first.
        let prev = pattern(9, 7, 0.0);
        let curr = pattern(9, 7, 1.0);
        let flow = dense_flow(&prev, &curr, &FlowConfig::default());
        assert_eq!(flow.vectors().len(), 63);
        assert!(flow.get(8, 6).is_some());
        assert!(flow.get(9, 0).is_none());
    }

    #[test]
    fn test_poly_basis_recovers_quadratic() {
        // f(x, y) = 2x² + 3y² + xy + 4x - y, in 8-bit units
        let plane = Plane::from_fn(11, 11, |x, y| {
            let x = x as f32 - 5.0;
            let y = y as f32 - 5.0;
            let f = 2.0 * x * x + 3.0 * y * y + x * y + 4.0 * x - y;
            Luma([f / INTENSITY_RANGE])
        });
        let basis = PolyBasis::new(5, 1.2);
        let e = basis.expand(&plane);
        let centre = |p: &Plane| p.get_pixel(5, 5)[0];
        assert!((centre(&e[0]) - 4.0).abs() < 1e-3);
        assert!((centre(&e[1]) + 1.0).abs() < 1e-3);
        assert!((centre(&e[2]) - 2.0).abs() < 1e-3);
        assert!((centre(&e[3]) - 3.0).abs() < 1e-3);
        assert!((centre(&e[4]) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_upscale_doubles_vectors() {
        let coarse = Displacement::from_pixel(8, 6, LumaA([1.5, -0.5]));
        let fine = upscale(&coarse, 16, 12);
        assert_eq!(fine.dimensions(), (16, 12));
        for LumaA([dx, dy]) in fine.pixels() {
            assert!((dx - 3.0).abs() < 1e-5);
            assert!((dy + 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_pyramid_levels_stay_in_range() {
        let base = to_plane(&pattern(64, 48, 0.0));
        let levels = build_pyramid(&base, &FlowConfig::default());
        assert!(levels.len() > 1);
        assert_eq!(levels[1].dimensions(), (32, 24));
        assert!(levels
            .iter()
            .all(|level| level.pixels().all(|Luma([v])| (0.0..=1.0).contains(v))));
    }

    #[test]
    fn test_invert6_identity() {
        let mut m = [[0.0; 6]; 6];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 2.0;
        }
        let inv = invert6(m);
        for (i, row) in inv.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                let expected = if i == j { 0.5 } else { 0.0 };
                assert!((v - expected).abs() < 1e-12);
            }
        }
    }
}
