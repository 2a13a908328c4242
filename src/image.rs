// image.rs — Runtime-sized grayscale image container, generic over pixel type.
//
// Row-major, contiguous, no row padding: pixel (x, y) lives at index
// y * width + x. Dimensions are fixed at construction and immutable for the
// image's lifetime. Two pixel types matter here:
//
//   u8  — storage format (what the benchmark loads and saves)
//   f32 — arithmetic format (what both convolution engines accumulate in)
//
// The `Pixel` trait bridges the two. Note that `u8::from_f32` saturates to
// [0, 255] and then TRUNCATES rather than rounds — the device kernel's
// output passes through a plain `(uchar)` cast on the host, and the CPU
// reference must convert identically or the two engines drift apart by a
// full intensity level on exact halves.

use std::fmt;

// ---------------------------------------------------------------------------
// Pixel trait
// ---------------------------------------------------------------------------

/// Types that can serve as pixel values in an [`Image`].
pub trait Pixel: Copy + Default + Send + Sync + PartialOrd + 'static {
    /// Raw conversion to f32 (u8 42 → 42.0, not normalized).
    fn to_f32(self) -> f32;

    /// Conversion from f32, saturating to the type's valid range.
    fn from_f32(v: f32) -> Self;
}

impl Pixel for u8 {
    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    /// Saturate to [0, 255], then truncate. `as u8` on a clamped f32 drops
    /// the fractional part — the same conversion the OpenCL readback path
    /// applies, keeping the two engines comparable.
    #[inline]
    fn from_f32(v: f32) -> Self {
        v.clamp(0.0, 255.0) as u8
    }
}

impl Pixel for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}

// ---------------------------------------------------------------------------
// Image<T>
// ---------------------------------------------------------------------------

/// A 2D image with runtime dimensions, generic over pixel type `T`.
///
/// The backing buffer is exactly `width * height` elements, row-major,
/// unpadded. `as_slice()` therefore exposes the layout the OpenCL buffers
/// and the PNG encoder both expect, with no compaction step in between.
#[derive(Clone, PartialEq)]
pub struct Image<T: Pixel> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Pixel> Image<T> {
    /// Create a zero-initialized image with the given dimensions.
    pub fn new(width: usize, height: usize) -> Self {
        Image {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    /// Create an image from an existing pixel vector (row-major, unpadded).
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image {
            data,
            width,
            height,
        }
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total pixel count.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for zero-area images (width or height of 0).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read pixel (x, y).
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        assert!(x < self.width && y < self.height, "({x}, {y}) out of bounds");
        self.data[y * self.width + x]
    }

    /// Write pixel (x, y).
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        assert!(x < self.width && y < self.height, "({x}, {y}) out of bounds");
        self.data[y * self.width + x] = value;
    }

    /// The full pixel buffer, row-major.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Consume the image, returning the backing buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl Image<u8> {
    /// Convert to an f32 image with raw (unnormalized) values: 42 → 42.0.
    /// This is the host-side conversion the parallel dispatcher performs
    /// before uploading, and what the sequential engine reads through
    /// `Pixel::to_f32` on the fly.
    pub fn to_f32(&self) -> Image<f32> {
        Image {
            data: self.data.iter().map(|&p| p as f32).collect(),
            width: self.width,
            height: self.height,
        }
    }
}

impl<T: Pixel> fmt::Debug for Image<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image {{ {}x{} }}", self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
