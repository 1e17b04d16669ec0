//! Perceptual pixel diff.
//!
//! Colours are compared in YIQ space, which weights luma over chroma the way
//! the eye does. A pixel differs when its squared YIQ distance exceeds
//! `MAX_YIQ_DELTA * threshold^2`. Pixels that look like anti-aliasing on
//! either side (a brightness extreme among their neighbours, next to a flat
//! region in both images) are excluded unless `include_aa` is set.
//!
//! Semi-transparent pixels are blended against white before comparison, so
//! transparent padding compares equal to a white page.

use super::types::{CompareError, CompareResult};

/// Largest possible squared YIQ distance between two colours
const MAX_YIQ_DELTA: f64 = 35215.0;

/// Parameters of the perceptual diff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Per-pixel matching threshold in 0..=1; smaller is stricter
    pub threshold: f64,
    /// Count anti-aliased pixels as differences
    pub include_aa: bool,
    /// Opacity of the faded original drawn under unchanged pixels
    pub alpha: f64,
    /// Colour for anti-aliased pixels
    pub aa_color: [u8; 3],
    /// Colour for differing pixels where the current image is brighter or equal
    pub diff_color: [u8; 3],
    /// Colour for differing pixels where the baseline is brighter
    pub diff_color_alt: Option<[u8; 3]>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            include_aa: false,
            alpha: 0.3,
            aa_color: [255, 255, 0],
            diff_color: [255, 0, 0],
            diff_color_alt: Some([0, 255, 0]),
        }
    }
}

/// Diff two RGBA buffers of identical `width` x `height`.
///
/// Writes a visualisation into `output` (same length as the inputs) and
/// returns the number of differing pixels.
pub fn pixelmatch(
    baseline: &[u8],
    current: &[u8],
    output: &mut [u8],
    width: u32,
    height: u32,
    options: &DiffOptions,
) -> CompareResult<u64> {
    let len = width as usize * height as usize * 4;
    if baseline.len() != len || current.len() != len || output.len() != len {
        return Err(CompareError::Dimensions(format!(
            "expected {} bytes for {}x{}, got baseline {}, current {}, output {}",
            len,
            width,
            height,
            baseline.len(),
            current.len(),
            output.len()
        )));
    }

    let base = Raster::new(baseline, width, height);
    let curr = Raster::new(current, width, height);

    if baseline == current {
        for pos in (0..len).step_by(4) {
            draw_gray_pixel(baseline, pos, options.alpha, output);
        }
        return Ok(0);
    }

    let max_delta = MAX_YIQ_DELTA * options.threshold * options.threshold;
    let mut diff = 0u64;

    for y in 0..height {
        for x in 0..width {
            let pos = base.offset(x, y);
            let delta = color_delta(baseline, current, pos, pos, false);

            if delta.abs() > max_delta {
                let aa = !options.include_aa
                    && (base.antialiased(x, y, &curr) || curr.antialiased(x, y, &base));
                if aa {
                    draw_pixel(output, pos, options.aa_color);
                } else {
                    let color = match options.diff_color_alt {
                        Some(alt) if delta < 0.0 => alt,
                        _ => options.diff_color,
                    };
                    draw_pixel(output, pos, color);
                    diff += 1;
                }
            } else {
                draw_gray_pixel(baseline, pos, options.alpha, output);
            }
        }
    }

    Ok(diff)
}

/// Borrowed RGBA buffer with its dimensions
#[derive(Clone, Copy)]
struct Raster<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> Raster<'a> {
    fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Neighbourhood of (x, y) clamped to the raster, plus whether it touches an edge
    fn window(&self, x: u32, y: u32) -> (u32, u32, u32, u32, bool) {
        let x0 = x.saturating_sub(1);
        let y0 = y.saturating_sub(1);
        let x2 = (x + 1).min(self.width - 1);
        let y2 = (y + 1).min(self.height - 1);
        let on_edge = x == x0 || x == x2 || y == y0 || y == y2;
        (x0, y0, x2, y2, on_edge)
    }

    /// Whether (x, y) looks like an anti-aliased edge pixel in this raster
    fn antialiased(&self, x: u32, y: u32, other: &Raster<'_>) -> bool {
        let (x0, y0, x2, y2, on_edge) = self.window(x, y);
        let pos = self.offset(x, y);
        let mut zeroes = usize::from(on_edge);
        let mut min = 0.0;
        let mut max = 0.0;
        let mut min_at = (0, 0);
        let mut max_at = (0, 0);

        for nx in x0..=x2 {
            for ny in y0..=y2 {
                if nx == x && ny == y {
                    continue;
                }
                let delta = color_delta(self.data, self.data, pos, self.offset(nx, ny), true);
                if delta == 0.0 {
                    zeroes += 1;
                    if zeroes > 2 {
                        return false;
                    }
                } else if delta < min {
                    min = delta;
                    min_at = (nx, ny);
                } else if delta > max {
                    max = delta;
                    max_at = (nx, ny);
                }
            }
        }

        // No darker or no brighter neighbour: not an edge between two tones
        if min == 0.0 || max == 0.0 {
            return false;
        }

        (self.has_many_siblings(min_at.0, min_at.1) && other.has_many_siblings(min_at.0, min_at.1))
            || (self.has_many_siblings(max_at.0, max_at.1)
                && other.has_many_siblings(max_at.0, max_at.1))
    }

    /// Whether (x, y) has more than two identical neighbours
    fn has_many_siblings(&self, x: u32, y: u32) -> bool {
        let (x0, y0, x2, y2, on_edge) = self.window(x, y);
        let pos = self.offset(x, y);
        let pixel = &self.data[pos..pos + 4];
        let mut zeroes = usize::from(on_edge);

        for nx in x0..=x2 {
            for ny in y0..=y2 {
                if nx == x && ny == y {
                    continue;
                }
                let other = self.offset(nx, ny);
                if pixel == &self.data[other..other + 4] {
                    zeroes += 1;
                }
                if zeroes > 2 {
                    return true;
                }
            }
        }
        false
    }
}

/// Squared YIQ distance between pixel `k` of `a` and pixel `m` of `b`.
///
/// The sign is negative when `a` is brighter. With `y_only`, returns the
/// signed luma difference instead.
fn color_delta(a: &[u8], b: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    let (pa, pb) = (&a[k..k + 4], &b[m..m + 4]);
    if pa == pb {
        return 0.0;
    }

    let [r1, g1, b1] = blend_white(pa);
    let [r2, g2, b2] = blend_white(pb);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;

    if y1 > y2 { -delta } else { delta }
}

fn blend_white(px: &[u8]) -> [f64; 3] {
    let (r, g, b, a) = (f64::from(px[0]), f64::from(px[1]), f64::from(px[2]), px[3]);
    if a == 255 {
        return [r, g, b];
    }
    let alpha = f64::from(a) / 255.0;
    [blend(r, alpha), blend(g, alpha), blend(b, alpha)]
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}

fn blend(c: f64, alpha: f64) -> f64 {
    255.0 + (c - 255.0) * alpha
}

fn draw_pixel(output: &mut [u8], pos: usize, [r, g, b]: [u8; 3]) {
    output[pos..pos + 4].copy_from_slice(&[r, g, b, 255]);
}

fn draw_gray_pixel(img: &[u8], pos: usize, alpha: f64, output: &mut [u8]) {
    let luma = rgb2y(f64::from(img[pos]), f64::from(img[pos + 1]), f64::from(img[pos + 2]));
    let val = blend(luma, alpha * f64::from(img[pos + 3]) / 255.0) as u8;
    draw_pixel(output, pos, [val, val, val]);
}
