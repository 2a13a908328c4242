// filter.rs — Square convolution filter with validated construction.
//
// A filter is a k×k matrix of f32 weights, flattened row-major, with k odd
// and >= 1. The odd-size requirement is load-bearing: both engines address
// neighborhoods as [-half, +half] around the output pixel with
// half = k / 2, which is only symmetric for odd k.
//
// Validation happens once, at construction. Raw weight vectors that are
// empty, even-sized, or of the wrong length are rejected here, so neither
// engine ever sees a malformed filter — there is no later point where a
// bad size could silently truncate the accumulation loop.

use thiserror::Error;

/// Errors from [`Filter`] construction.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    /// Filter side length must be odd and at least 1.
    #[error("filter size must be odd and >= 1 (got {0})")]
    NotOdd(usize),

    /// Weight vector length does not match the declared side length.
    #[error("expected {size}x{size} = {expected} weights, got {got}")]
    WeightCount {
        size: usize,
        expected: usize,
        got: usize,
    },

    /// Gaussian standard deviation must be positive and finite.
    #[error("gaussian sigma must be positive and finite (got {0})")]
    InvalidSigma(f32),
}

/// A square, odd-sized convolution filter. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    size: usize,
    weights: Vec<f32>,
}

impl Filter {
    /// Build a filter from a side length and row-major weights.
    pub fn new(size: usize, weights: Vec<f32>) -> Result<Self, FilterError> {
        if size == 0 || size % 2 == 0 {
            return Err(FilterError::NotOdd(size));
        }
        let expected = size * size;
        if weights.len() != expected {
            return Err(FilterError::WeightCount {
                size,
                expected,
                got: weights.len(),
            });
        }
        Ok(Filter { size, weights })
    }

    /// Uniform box blur: every weight is `1 / k²`, summing to ~1.
    pub fn box_blur(size: usize) -> Result<Self, FilterError> {
        if size == 0 || size % 2 == 0 {
            return Err(FilterError::NotOdd(size));
        }
        let w = 1.0 / (size * size) as f32;
        Ok(Filter {
            size,
            weights: vec![w; size * size],
        })
    }

    /// Identity: 1.0 at the center, 0.0 elsewhere. Convolving with this
    /// reproduces the input exactly — the sharpest cross-engine test there is.
    pub fn identity(size: usize) -> Result<Self, FilterError> {
        if size == 0 || size % 2 == 0 {
            return Err(FilterError::NotOdd(size));
        }
        let mut weights = vec![0.0f32; size * size];
        let half = size / 2;
        weights[half * size + half] = 1.0;
        Ok(Filter { size, weights })
    }

    /// Gaussian blur, normalized so the weights sum to 1.
    pub fn gaussian(size: usize, sigma: f32) -> Result<Self, FilterError> {
        if size == 0 || size % 2 == 0 {
            return Err(FilterError::NotOdd(size));
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(FilterError::InvalidSigma(sigma));
        }
        let half = (size / 2) as isize;
        let denom = 2.0 * sigma * sigma;
        let mut weights = Vec::with_capacity(size * size);
        let mut sum = 0.0f32;
        for ky in -half..=half {
            for kx in -half..=half {
                let w = (-((kx * kx + ky * ky) as f32) / denom).exp();
                weights.push(w);
                sum += w;
            }
        }
        for w in &mut weights {
            *w /= sum;
        }
        Ok(Filter { size, weights })
    }

    /// 3×3 sharpening filter (unsharp cross). Weights sum to 1.
    pub fn sharpen() -> Self {
        #[rustfmt::skip]
        let weights = vec![
             0.0, -1.0,  0.0,
            -1.0,  5.0, -1.0,
             0.0, -1.0,  0.0,
        ];
        Filter { size: 3, weights }
    }

    /// Side length `k`.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// `k / 2` — the neighborhood reach in each direction.
    #[inline]
    pub fn half(&self) -> usize {
        self.size / 2
    }

    /// Flattened row-major weights, length `k²`.
    #[inline]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Weight at kernel offset (kx, ky), each in `[-half, +half]`.
    #[inline]
    pub fn at(&self, kx: isize, ky: isize) -> f32 {
        let half = (self.size / 2) as isize;
        debug_assert!(kx.abs() <= half && ky.abs() <= half);
        self.weights[((ky + half) as usize) * self.size + (kx + half) as usize]
    }

    /// Sum of all weights. ~1.0 for normalized smoothing filters.
    pub fn weight_sum(&self) -> f32 {
        self.weights.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
