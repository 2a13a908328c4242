// convolution.rs — Sequential (CPU reference) convolution engine.
//
// For every output pixel (x, y):
//
//   out[y][x] = Σ  in[clamp(y+ky)][clamp(x+kx)] * filter[ky+half][kx+half]
//              ky,kx ∈ [-half, +half]
//
// BORDER HANDLING: Clamp (replicate edge pixels). Out-of-bounds neighborhood
// coordinates saturate to [0, dim-1] — never wrap, never zero-pad. The
// OpenCL kernel (kernels/conv2d.cl) applies the identical policy; the two
// engines are only comparable because of it.
//
// Accumulation is in f32, and the final value saturates to [0, 255] and
// truncates (Pixel::from_f32 for u8). O(width * height * k²), one thread,
// deterministic, no I/O beyond the optional progress callback.

use crate::filter::Filter;
use crate::image::{Image, Pixel};

/// Convolve `image` with `filter` on the CPU. Clamp-to-edge borders,
/// f32 accumulation, saturating/truncating u8 output.
pub fn convolve_sequential(image: &Image<u8>, filter: &Filter) -> Image<u8> {
    convolve_sequential_with_progress(image, filter, |_| {})
}

/// Same as [`convolve_sequential`], reporting coarse progress.
///
/// `progress` is invoked with a percentage at every 10% row milestone
/// (10, 20, ..., 100), strictly increasing, always ending at 100. The
/// callback is purely observational — it cannot alter the computation.
pub fn convolve_sequential_with_progress<F>(
    image: &Image<u8>,
    filter: &Filter,
    mut progress: F,
) -> Image<u8>
where
    F: FnMut(u32),
{
    let w = image.width();
    let h = image.height();
    let half = filter.half() as isize;

    let mut out = Image::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let mut next_milestone = 10u32;

    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for ky in -half..=half {
                for kx in -half..=half {
                    // Clamp to edge: saturate the neighbor coordinate.
                    let sy = (y as isize + ky).clamp(0, h as isize - 1) as usize;
                    let sx = (x as isize + kx).clamp(0, w as isize - 1) as usize;
                    acc += image.get(sx, sy).to_f32() * filter.at(kx, ky);
                }
            }
            out.set(x, y, u8::from_f32(acc));
        }

        // Small images can cross several milestones in one row, so loop.
        let pct = ((y + 1) * 100 / h) as u32;
        while next_milestone <= pct {
            progress(next_milestone);
            next_milestone += 10;
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    fn ramp_4x4() -> Image<u8> {
        // [ 0  1  2  3]
        // [ 4  5  6  7]
        // [ 8  9 10 11]
        // [12 13 14 15]
        Image::from_vec(4, 4, (0u8..16).collect())
    }

    #[test]
    fn identity_filter_is_exact() {
        let img = ramp_4x4();
        for k in [1, 3, 5] {
            let out = convolve_sequential(&img, &Filter::identity(k).unwrap());
            assert_eq!(out.as_slice(), img.as_slice(), "k={k}");
        }
    }

    #[test]
    fn box_blur_corner_oracles() {
        // 3×3 box blur on the 4×4 ramp, hand-computed with clamped borders.
        //
        // Corner (0,0) neighborhood (replicated): 0 0 1 / 0 0 1 / 4 4 5,
        // sum = 15, 15/9 = 1.67 → truncates to 1.
        //
        // Corner (3,3) neighborhood: 10 11 11 / 14 15 15 / 14 15 15,
        // sum = 120, 120/9 = 13.33 → 13.
        let out = convolve_sequential(&ramp_4x4(), &Filter::box_blur(3).unwrap());
        assert_eq!(out.get(0, 0), 1);
        assert_eq!(out.get(3, 3), 13);
    }

    #[test]
    fn one_by_one_image_degenerate_clamp() {
        // Every neighborhood coordinate clamps to (0,0): the single input
        // pixel is replicated across the entire kernel footprint, so the
        // output is pixel * weight_sum. For the identity that is exact.
        let img = Image::from_vec(1, 1, vec![200u8]);
        let out = convolve_sequential(&img, &Filter::identity(5).unwrap());
        assert_eq!(out.get(0, 0), 200);

        // Box blur sums k² copies of pixel/k² — within one level of the
        // input (1/k² is not exactly representable, and we truncate).
        let out = convolve_sequential(&img, &Filter::box_blur(3).unwrap());
        let diff = (out.get(0, 0) as i16 - 200).abs();
        assert!(diff <= 1, "got {}", out.get(0, 0));
    }

    #[test]
    fn constant_image_stays_constant_under_box_blur() {
        let img = Image::from_vec(8, 6, vec![128u8; 48]);
        let out = convolve_sequential(&img, &Filter::box_blur(5).unwrap());
        for (i, &p) in out.as_slice().iter().enumerate() {
            let diff = (p as i16 - 128).abs();
            assert!(diff <= 1, "pixel {i} = {p}");
        }
    }

    #[test]
    fn border_clamps_instead_of_wrapping() {
        // Single bright pixel at the left edge; a filter weighted entirely
        // to the LEFT column reads the clamped edge copy, not the far side.
        //
        //   [255 0 0]      filter: [0 0 0]
        //   [  0 0 0]              [1 0 0]
        //   [  0 0 0]              [0 0 0]
        let mut img = Image::new(3, 3);
        img.set(0, 0, 255);
        let mut weights = vec![0.0f32; 9];
        weights[3] = 1.0; // (kx=-1, ky=0)
        let f = Filter::new(3, weights).unwrap();

        let out = convolve_sequential(&img, &f);
        // At (0,0) the left neighbor clamps back onto (0,0) itself.
        assert_eq!(out.get(0, 0), 255);
        // At (1,0) the left neighbor is the bright pixel.
        assert_eq!(out.get(1, 0), 255);
        // At (2,0) the left neighbor is dark — no wraparound to column 0.
        assert_eq!(out.get(2, 0), 0);
    }

    #[test]
    fn negative_results_saturate_to_zero() {
        // An all-negative filter on a bright image must clamp at 0, not wrap.
        let img = Image::from_vec(2, 2, vec![200u8; 4]);
        let f = Filter::new(1, vec![-1.0]).unwrap();
        let out = convolve_sequential(&img, &f);
        assert_eq!(out.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn bright_results_saturate_to_255() {
        let img = Image::from_vec(2, 2, vec![200u8; 4]);
        let f = Filter::new(1, vec![2.0]).unwrap();
        let out = convolve_sequential(&img, &f);
        assert_eq!(out.as_slice(), &[255, 255, 255, 255]);
    }

    #[test]
    fn progress_milestones_are_complete_and_increasing() {
        let img = Image::from_vec(4, 40, vec![7u8; 160]);
        let mut seen = Vec::new();
        let _ = convolve_sequential_with_progress(&img, &Filter::box_blur(3).unwrap(), |pct| {
            seen.push(pct)
        });
        assert_eq!(seen, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn progress_fires_all_milestones_on_tiny_images() {
        // 2 rows: row 1 crosses 50%, row 2 crosses the rest.
        let img = Image::from_vec(3, 2, vec![0u8; 6]);
        let mut seen = Vec::new();
        let _ = convolve_sequential_with_progress(&img, &Filter::identity(1).unwrap(), |pct| {
            seen.push(pct)
        });
        assert_eq!(seen, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn progress_callback_does_not_alter_results() {
        let img = ramp_4x4();
        let f = Filter::box_blur(3).unwrap();
        let silent = convolve_sequential(&img, &f);
        let observed = convolve_sequential_with_progress(&img, &f, |_| {});
        assert_eq!(silent.as_slice(), observed.as_slice());
    }

    #[test]
    fn deterministic_across_runs() {
        let img = ramp_4x4();
        let f = Filter::gaussian(3, 0.8).unwrap();
        let a = convolve_sequential(&img, &f);
        let b = convolve_sequential(&img, &f);
        assert_eq!(a.as_slice(), b.as_slice());
    }
}
