// cl/dispatch.rs — Parallel convolution dispatcher.
//
// One dispatch = one call-scoped set of device resources:
//
//   input buffer   read-only,  host copy-in at creation
//   output buffer  write-only, uninitialized
//   filter buffer  read-only,  host copy-in at creation
//   kernel object  entry point + bound arguments
//   profiling event
//
// All of them are owned by this invocation and dropped on every exit path —
// an argument-binding failure must not leak the buffers allocated two steps
// earlier. Nothing is cached across calls.
//
// ARGUMENT ORDER: input, output, filter, width, height, kernel_size. This
// must match the parameter list of `conv2d` in kernels/conv2d.cl. A
// mismatch compiles and runs; only the sequential-parity integration test
// catches it.
//
// The launch covers exactly width × height work-items (one per pixel);
// work-group shape is left to the runtime. The kernel computes in f32 and
// the host converts back with the same saturate/truncate rule as the
// sequential engine, so outputs agree within one intensity level.

use log::debug;
use ocl::enums::ProfilingInfo;
use ocl::flags::MemFlags;
use ocl::{Buffer, Event, Kernel};
use thiserror::Error;

use crate::cl::device::DeviceHandle;
use crate::filter::Filter;
use crate::image::{Image, Pixel};

/// Errors from one parallel dispatch. Every variant is fatal to the call;
/// resources acquired before the failure are released before returning.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Zero-area images have no work-items to launch.
    #[error("image has zero pixels ({width}x{height})")]
    EmptyImage { width: usize, height: usize },

    #[error("failed to allocate device buffer for {which}: {source}")]
    BufferAlloc {
        which: &'static str,
        source: ocl::Error,
    },

    /// Kernel creation / argument binding failed.
    #[error("failed to bind kernel arguments: {0}")]
    ArgumentBind(ocl::Error),

    /// Enqueue or completion-wait failure.
    #[error("kernel launch failed: {0}")]
    Launch(ocl::Error),

    #[error("profiling query failed: {0}")]
    Profiling(ocl::Error),

    /// Queue drain or device-to-host copy failure.
    #[error("result readback failed: {0}")]
    Readback(ocl::Error),
}

/// Convolve `image` with `filter` on the device behind `handle`.
///
/// Returns the output image and the device-reported kernel execution time
/// in milliseconds. That figure covers device compute only — host-side
/// transfers and launch overhead are excluded; time the whole call
/// externally for wall-clock numbers.
///
/// Blocking: the launch itself is asynchronous, but this function always
/// waits on the profiling event and drains the queue before returning.
pub fn convolve_parallel(
    handle: &DeviceHandle,
    image: &Image<u8>,
    filter: &Filter,
) -> Result<(Image<u8>, f64), DispatchError> {
    let width = image.width();
    let height = image.height();
    if image.is_empty() {
        return Err(DispatchError::EmptyImage { width, height });
    }
    let pixels = width * height;
    let k = filter.size();

    // 1. The device kernel operates in f32 for arithmetic parity with the
    //    sequential engine; convert host-side.
    let host_input = image.to_f32().into_vec();

    // 2. Device buffers. Each is released when it goes out of scope, so an
    //    error anywhere below cannot leak the ones already created.
    let queue = handle.queue();
    let d_input = Buffer::<f32>::builder()
        .queue(queue.clone())
        .flags(MemFlags::new().read_only().copy_host_ptr())
        .len(pixels)
        .copy_host_slice(&host_input)
        .build()
        .map_err(|source| DispatchError::BufferAlloc {
            which: "input image",
            source,
        })?;

    let d_output = Buffer::<f32>::builder()
        .queue(queue.clone())
        .flags(MemFlags::new().write_only())
        .len(pixels)
        .build()
        .map_err(|source| DispatchError::BufferAlloc {
            which: "output image",
            source,
        })?;

    let d_filter = Buffer::<f32>::builder()
        .queue(queue.clone())
        .flags(MemFlags::new().read_only().copy_host_ptr())
        .len(k * k)
        .copy_host_slice(filter.weights())
        .build()
        .map_err(|source| DispatchError::BufferAlloc {
            which: "filter weights",
            source,
        })?;

    // 3. Kernel object with arguments bound in the fixed order. The kernel
    //    is call-scoped like the buffers: ocl kernels carry their bound
    //    arguments, and sharing one across dispatches would be exactly the
    //    kind of hidden mutable state this crate avoids.
    let kernel = Kernel::builder()
        .program(handle.program())
        .name(handle.entry_point())
        .queue(queue.clone())
        .global_work_size([width, height])
        .arg(&d_input)
        .arg(&d_output)
        .arg(&d_filter)
        .arg(width as i32)
        .arg(height as i32)
        .arg(k as i32)
        .build()
        .map_err(DispatchError::ArgumentBind)?;

    // 4. Launch one work-item per pixel with a profiling event attached.
    //    Work-group shape is left to the runtime.
    let mut event = Event::empty();
    unsafe {
        kernel
            .cmd()
            .enew(&mut event)
            .enq()
            .map_err(DispatchError::Launch)?;
    }

    // 5. Block on the event, then read the device clock (ns resolution).
    event
        .wait_for()
        .map_err(|e| DispatchError::Launch(e.into()))?;
    let start_ns = event
        .profiling_info(ProfilingInfo::Start)
        .map_err(|e| DispatchError::Profiling(e.into()))?
        .time()
        .map_err(|e| DispatchError::Profiling(e.into()))?;
    let end_ns = event
        .profiling_info(ProfilingInfo::End)
        .map_err(|e| DispatchError::Profiling(e.into()))?
        .time()
        .map_err(|e| DispatchError::Profiling(e.into()))?;
    let elapsed_ms = (end_ns.saturating_sub(start_ns)) as f64 / 1.0e6;
    debug!("kernel executed in {elapsed_ms:.4} ms on the device clock");

    // 6. Drain the queue, then copy the output back.
    queue.finish().map_err(DispatchError::Readback)?;
    let mut host_output = vec![0.0f32; pixels];
    d_output
        .cmd()
        .queue(queue)
        .read(&mut host_output)
        .enq()
        .map_err(DispatchError::Readback)?;

    // 7. Same saturate/truncate conversion as the sequential engine.
    let out = Image::from_vec(
        width,
        height,
        host_output.into_iter().map(u8::from_f32).collect(),
    );

    // 8. Buffers, kernel, and event all drop here — and on every early
    //    return above.
    Ok((out, elapsed_ms))
}
