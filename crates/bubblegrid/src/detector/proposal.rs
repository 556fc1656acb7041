//! Gradient-voting circle center proposals.
//!
//! Every pixel with a strong gradient casts votes along both gradient
//! directions at distances in `[r_min, r_max]`. Circle outlines and filled
//! disks produce accumulator peaks at their centers because the boundary
//! gradients converge radially.

use image::{GrayImage, ImageBuffer, Luma};

/// Circle proposal controls.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircleProposalConfig {
    /// Minimum bubble radius (pixels).
    pub r_min: f32,
    /// Maximum bubble radius (pixels).
    pub r_max: f32,
    /// Gaussian sigma applied to the inverted mask before taking gradients.
    pub blur_sigma: f32,
    /// Gradient magnitude threshold (fraction of max gradient).
    pub grad_threshold: f32,
    /// NMS radius for peak extraction (pixels).
    pub nms_radius: f32,
    /// Minimum accumulator value for a proposal (fraction of max).
    pub min_vote_frac: f32,
    /// Gaussian sigma for accumulator smoothing.
    pub accum_sigma: f32,
    /// Optional cap on number of proposals returned (after score sorting).
    #[serde(default)]
    pub max_candidates: Option<usize>,
}

impl Default for CircleProposalConfig {
    fn default() -> Self {
        Self {
            r_min: 10.0,
            r_max: 30.0,
            blur_sigma: 1.1,
            grad_threshold: 0.1,
            nms_radius: 8.0,
            min_vote_frac: 0.1,
            accum_sigma: 1.5,
            max_candidates: None,
        }
    }
}

/// A proposed circle center with its vote score.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Proposal {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// Scharr gradients of the voting image, kept for radius estimation.
pub(crate) struct GradientField {
    pub width: usize,
    pub height: usize,
    pub gx: Vec<f32>,
    pub gy: Vec<f32>,
    pub max_mag: f32,
}

impl GradientField {
    /// Invert and smooth the binary mask, then take Scharr gradients.
    pub fn from_mask(mask: &GrayImage, blur_sigma: f32) -> Self {
        let mut inverted = mask.clone();
        image::imageops::invert(&mut inverted);
        let smoothed = if blur_sigma > 0.0 {
            imageproc::filter::gaussian_blur_f32(&inverted, blur_sigma)
        } else {
            inverted
        };
        let gx_img = imageproc::gradients::horizontal_scharr(&smoothed);
        let gy_img = imageproc::gradients::vertical_scharr(&smoothed);
        let gx: Vec<f32> = gx_img.as_raw().iter().map(|&v| v as f32).collect();
        let gy: Vec<f32> = gy_img.as_raw().iter().map(|&v| v as f32).collect();
        let max_mag = gx
            .iter()
            .zip(&gy)
            .map(|(a, b)| a * a + b * b)
            .fold(0.0f32, f32::max)
            .sqrt();
        Self {
            width: mask.width() as usize,
            height: mask.height() as usize,
            gx,
            gy,
            max_mag,
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> (f32, f32) {
        let idx = y * self.width + x;
        (self.gx[idx], self.gy[idx])
    }
}

/// Deposit a weighted vote into the accumulator using bilinear interpolation.
#[inline]
fn bilinear_add_in_bounds(accum: &mut [f32], stride: usize, x: f32, y: f32, weight: f32) {
    let x0 = x as usize;
    let y0 = y as usize;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let base = y0 * stride + x0;
    accum[base] += weight * (1.0 - fx) * (1.0 - fy);
    accum[base + 1] += weight * fx * (1.0 - fy);
    accum[base + stride] += weight * (1.0 - fx) * fy;
    accum[base + stride + 1] += weight * fx * fy;
}

/// Candidate bubble centers sorted by score (highest first).
pub(crate) fn find_proposals(field: &GradientField, config: &CircleProposalConfig) -> Vec<Proposal> {
    let (w, h) = (field.width, field.height);
    if w < 4 || h < 4 || config.r_max < config.r_min {
        return Vec::new();
    }
    if field.max_mag < 1e-6 {
        return Vec::new();
    }
    let threshold = config.grad_threshold * field.max_mag;
    let threshold_sq = threshold * threshold;

    let mut radii = Vec::new();
    let mut r = config.r_min;
    while r <= config.r_max {
        radii.push(r);
        r += 1.0;
    }

    let stride = w;
    let mut accum = vec![0.0f32; w * h];
    let x_limit = (w - 1) as f32;
    let y_limit = (h - 1) as f32;

    for y in 0..h {
        let yf = y as f32;
        for x in 0..w {
            let (gxv, gyv) = field.at(x, y);
            let mag_sq = gxv * gxv + gyv * gyv;
            if mag_sq < threshold_sq {
                continue;
            }
            let mag = mag_sq.sqrt();
            let dx = gxv / mag;
            let dy = gyv / mag;
            let xf = x as f32;

            for &r in &radii {
                let vx = xf + dx * r;
                let vy = yf + dy * r;
                if vx >= 0.0 && vx < x_limit && vy >= 0.0 && vy < y_limit {
                    bilinear_add_in_bounds(&mut accum, stride, vx, vy, mag);
                }
                let vx = xf - dx * r;
                let vy = yf - dy * r;
                if vx >= 0.0 && vx < x_limit && vy >= 0.0 && vy < y_limit {
                    bilinear_add_in_bounds(&mut accum, stride, vx, vy, mag);
                }
            }
        }
    }

    let Some(accum_img) = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(w as u32, h as u32, accum)
    else {
        return Vec::new();
    };
    let smoothed = imageproc::filter::gaussian_blur_f32(&accum_img, config.accum_sigma);
    let data = smoothed.as_raw();
    let max_val = data.iter().cloned().fold(0.0f32, f32::max);
    if max_val < 1e-6 {
        return Vec::new();
    }
    let vote_threshold = config.min_vote_frac * max_val;

    let nms_r = config.nms_radius.ceil() as i32;
    let nms_r_sq = config.nms_radius * config.nms_radius;
    let mut nms_offsets = Vec::new();
    for dy in -nms_r..=nms_r {
        for dx in -nms_r..=nms_r {
            if (dx == 0 && dy == 0) || (dx * dx + dy * dy) as f32 > nms_r_sq {
                continue;
            }
            nms_offsets.push(dy as isize * stride as isize + dx as isize);
        }
    }

    let mut proposals = Vec::new();
    for y in nms_r..(h as i32 - nms_r) {
        for x in nms_r..(w as i32 - nms_r) {
            let idx = y as usize * stride + x as usize;
            let val = data[idx];
            if val < vote_threshold {
                continue;
            }
            let is_max = nms_offsets.iter().all(|&off| {
                let nidx = idx.wrapping_add_signed(off);
                !(data[nidx] > val || (data[nidx] == val && nidx < idx))
            });
            if is_max {
                proposals.push(Proposal {
                    x: x as f32,
                    y: y as f32,
                    score: val,
                });
            }
        }
    }

    proposals.sort_by(|a, b| b.score.total_cmp(&a.score));
    if let Some(max_candidates) = config.max_candidates {
        proposals.truncate(max_candidates);
    }
    tracing::debug!("proposals: {} peaks above {:.1}", proposals.len(), vote_threshold);
    proposals
}
