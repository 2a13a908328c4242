// cl/mod.rs — OpenCL acceleration layer.
//
// This module provides the data-parallel counterpart of the CPU engine in
// `crate::convolution`. The CPU implementation remains the authoritative
// reference — the device kernel is validated against it pixel-for-pixel
// (tests/test_parallel.rs), because an argument-binding or indexing mistake
// in the dispatch protocol is not detectable at runtime, only by comparison.
//
// Layering:
//
//   policy    — pure, device-free platform ranking (prefer/deny lists)
//   device    — platform/device selection, context + profiling queue,
//               kernel-source compilation → DeviceHandle
//   dispatch  — per-call buffers, argument binding, 2-D launch, event
//               profiling, readback
//
// A `DeviceHandle` is expensive to create and cheap to reuse; hold one for
// the lifetime of the benchmark. It owns a single command queue and must
// not be used by more than one in-flight dispatch at a time.

pub mod device;
pub mod dispatch;
pub mod policy;

pub use device::{DeviceError, DeviceHandle, SelectedDevice};
pub use dispatch::{convolve_parallel, DispatchError};
pub use policy::{PlatformPolicy, Selection, SelectionKind};
