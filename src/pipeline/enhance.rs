//! Image enhancement ahead of OCR.
//!
//! Fixed chain, no knobs: grayscale → 3×3 median → CLAHE (clip 2.0, 8×8
//! tiles) → 3×3 sharpen. Output dimensions always equal input dimensions.
//!
//! CLAHE pads partial tiles with a reflect-101 border; the sharpen step uses
//! imageproc's edge-replicating border.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::{filter3x3, median_filter};

/// CLAHE clip limit, relative to a flat histogram.
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// CLAHE tile grid (tiles per axis).
pub const CLAHE_TILES: u32 = 8;

const BINS: usize = 256;

/// Run the full enhancement chain.
pub fn enhance(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return gray;
    }
    let denoised = median_filter(&gray, 1, 1);
    let equalised = clahe(&denoised, CLAHE_CLIP_LIMIT, CLAHE_TILES, CLAHE_TILES);
    sharpen(&equalised)
}

/// Contrast-limited adaptive histogram equalisation.
///
/// Images whose sides are not a multiple of the grid are virtually padded
/// with a reflect-101 border for the histograms.
pub fn clahe(src: &GrayImage, clip_limit: f32, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return src.clone();
    }
    let tiles_x = tiles_x.max(1) as usize;
    let tiles_y = tiles_y.max(1) as usize;
    let tile_w = (width as usize).div_ceil(tiles_x);
    let tile_h = (height as usize).div_ceil(tiles_y);
    let tile_area = tile_w * tile_h;

    let clip = if clip_limit > 0.0 {
        ((clip_limit * tile_area as f32 / BINS as f32) as usize).max(1)
    } else {
        usize::MAX
    };
    let lut_scale = 255.0 / tile_area as f32;

    let mut luts = vec![[0u8; BINS]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut hist = [0usize; BINS];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let sy = reflect101(y as i64, height as i64);
                for x in tx * tile_w..(tx + 1) * tile_w {
                    let sx = reflect101(x as i64, width as i64);
                    hist[src.get_pixel(sx, sy)[0] as usize] += 1;
                }
            }
            clip_histogram(&mut hist, clip);

            let lut = &mut luts[ty * tiles_x + tx];
            let mut sum = 0usize;
            for (bin, count) in hist.iter().enumerate() {
                sum += count;
                lut[bin] = (sum as f32 * lut_scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    let x_weights: Vec<(usize, usize, f32)> = (0..width as usize)
        .map(|x| neighbours(x as f32 * inv_tw - 0.5, tiles_x))
        .collect();

    GrayImage::from_fn(width, height, |x, y| {
        let (ty1, ty2, ya) = neighbours(y as f32 * inv_th - 0.5, tiles_y);
        let (tx1, tx2, xa) = x_weights[x as usize];
        let v = src.get_pixel(x, y)[0] as usize;

        let top = luts[ty1 * tiles_x + tx1][v] as f32 * (1.0 - xa)
            + luts[ty1 * tiles_x + tx2][v] as f32 * xa;
        let bottom = luts[ty2 * tiles_x + tx1][v] as f32 * (1.0 - xa)
            + luts[ty2 * tiles_x + tx2][v] as f32 * xa;
        let value = top * (1.0 - ya) + bottom * ya;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// The two tile indices around a fractional tile coordinate and the weight
/// of the second one.
fn neighbours(t: f32, tiles: usize) -> (usize, usize, f32) {
    let t1 = t.floor();
    let weight = t - t1;
    let lo = (t1 as i64).max(0) as usize;
    let hi = ((t1 as i64 + 1).max(0) as usize).min(tiles - 1);
    (lo.min(tiles - 1), hi, weight)
}

/// Clip every bin at `clip` and spread the excess back over all bins.
fn clip_histogram(hist: &mut [usize; BINS], clip: usize) {
    let mut excess = 0usize;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }
    if excess == 0 {
        return;
    }

    let batch = excess / BINS;
    let mut residual = excess - batch * BINS;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        let mut bin = 0;
        while bin < BINS && residual > 0 {
            hist[bin] += 1;
            residual -= 1;
            bin += step;
        }
    }
}

/// Sharpening kernel: centre 9, eight neighbours −1.
pub const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

/// 3×3 sharpening convolution, clamped to `0..=255`. Edge pixels repeat.
pub fn sharpen(src: &GrayImage) -> GrayImage {
    filter3x3::<_, i32, u8>(src, &SHARPEN_KERNEL)
}

/// Reflect-101 border index (`gfedcb|abcdefgh|gfedcba`).
fn reflect101(i: i64, len: i64) -> u32 {
    if len <= 1 {
        return 0;
    }
    let mut i = i;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * len - 2 - i;
        } else {
            return i as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_dimensions_preserved() {
        for (w, h) in [(1, 1), (7, 3), (64, 48), (101, 33)] {
            let img = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
                Rgb([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8])
            }));
            let out = enhance(&img);
            assert_eq!(out.dimensions(), (w, h));
        }
    }

    #[test]
    fn test_uniform_image_stays_uniform() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 40, Luma([128])));
        let out = enhance(&img);
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_sharpen_flat_is_identity() {
        let img = GrayImage::from_pixel(5, 5, Luma([42]));
        assert_eq!(sharpen(&img), img);
    }

    #[test]
    fn test_sharpen_boosts_edge() {
        let img = GrayImage::from_fn(6, 1, |x, _| Luma([if x < 3 { 50 } else { 200 }]));
        let out = sharpen(&img);
        assert!(out.get_pixel(2, 0)[0] < 50);
        assert_eq!(out.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn test_sharpen_clamps_to_byte_range() {
        let img = GrayImage::from_fn(3, 3, |x, y| Luma([if (x, y) == (1, 1) { 250 } else { 10 }]));
        let out = sharpen(&img);
        assert_eq!(out.get_pixel(1, 1)[0], 255);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_clip_histogram_conserves_mass() {
        let mut hist = [0usize; BINS];
        hist[10] = 1000;
        hist[20] = 5;
        clip_histogram(&mut hist, 16);
        assert_eq!(hist.iter().sum::<usize>(), 1005);
        assert!(hist[10] <= 16 + 1000 / BINS + 1);
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        let img = GrayImage::from_fn(64, 64, |x, _| Luma([100 + (x % 2) as u8 * 10]));
        let out = clahe(&img, CLAHE_CLIP_LIMIT, CLAHE_TILES, CLAHE_TILES);
        let min = out.pixels().map(|p| p[0]).min().unwrap();
        let max = out.pixels().map(|p| p[0]).max().unwrap();
        assert!(max - min > 10, "range {min}..{max}");
    }

    #[test]
    fn test_reflect101() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(2, 5), 2);
        assert_eq!(reflect101(3, 1), 0);
    }
}
