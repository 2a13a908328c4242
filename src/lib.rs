// oclconv: OpenCL convolution benchmark library.
//
// Two interchangeable engines apply the same square odd-sized filter to a
// grayscale image under an identical clamp-to-edge border policy:
//
//   convolution::convolve_sequential  — single-threaded CPU reference
//   cl::dispatch::convolve_parallel   — one OpenCL work-item per pixel
//
// The CPU implementation is the authoritative reference — the parallel path
// is validated against it pixel-for-pixel (tests/test_parallel.rs). Both
// accumulate in f32 and saturate/truncate to u8, so outputs agree within one
// intensity level.

pub mod cl;
pub mod convolution;
pub mod filter;
pub mod image;
