// cl/device.rs — Compute-device manager.
//
// Responsibilities:
//   - Enumerate OpenCL platforms and pick one via `PlatformPolicy`.
//   - Request a GPU-class device on that platform, falling back to a
//     CPU-class device when the platform exposes none.
//   - Build one context and one command queue with profiling enabled
//     (`CL_QUEUE_PROFILING_ENABLE` — the dispatcher reads per-launch
//     start/end timestamps from it later).
//   - Compile a `.cl` source file and validate the named entry point,
//     producing a ready-to-dispatch `DeviceHandle`.
//
// A misconfigured or absent accelerator is not a transient condition, so
// every failure here is fatal to the calling operation — no retries.
//
// All diagnostics (platform inventory, selected device identity, compute
// units, build outcome) go through the `log` facade; none of it is part of
// the functional contract.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use ocl::enums::{DeviceInfo, DeviceInfoResult, ProgramInfo};
use ocl::flags::{CommandQueueProperties, DeviceType};
use ocl::{Context, Device, Platform, Program, Queue};
use thiserror::Error;

use crate::cl::policy::PlatformPolicy;

/// UTF-8 byte-order mark. Some editors prepend it to `.cl` files; the
/// device compiler chokes on it, so it is stripped before submission.
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Errors from device selection, preparation, and program compilation.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No OpenCL platform is installed at all.
    #[error("no OpenCL platform available")]
    NoPlatform,

    /// The selected platform exposes neither a GPU-class nor a CPU-class
    /// device.
    #[error("no GPU or CPU device on platform `{platform}`")]
    NoDevice { platform: String },

    #[error("failed to create context on `{platform}`: {source}")]
    Context {
        platform: String,
        source: ocl::Error,
    },

    #[error("failed to create profiling command queue: {0}")]
    Queue(ocl::Error),

    #[error("cannot read kernel source `{path}`: {source}")]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("kernel source `{path}` is not valid UTF-8")]
    SourceEncoding { path: PathBuf },

    /// Carries the full compiler diagnostic text — a build failure is
    /// never surfaced without its log.
    #[error("kernel build failed:\n{log}")]
    Build { log: String },

    #[error("entry point `{name}` not found in program (available: {available})")]
    EntryPoint { name: String, available: String },
}

/// A selected and prepared device: platform, device, context, and a
/// profiling-enabled command queue. Compile a kernel source file with
/// [`SelectedDevice::compile`] to obtain a dispatchable [`DeviceHandle`].
pub struct SelectedDevice {
    device: Device,
    context: Context,
    queue: Queue,
    platform_name: String,
    device_name: String,
    compute_units: u32,
    degraded: bool,
}

impl SelectedDevice {
    /// Enumerate platforms, apply `policy`, and prepare the chosen device.
    ///
    /// Device class preference is GPU first, CPU second; the CPU fallback
    /// exists so the benchmark still runs (and logs a warning) on machines
    /// whose only OpenCL driver is CPU-hosted.
    pub fn select_and_prepare(policy: &PlatformPolicy) -> Result<Self, DeviceError> {
        let platforms = Platform::list();
        if platforms.is_empty() {
            return Err(DeviceError::NoPlatform);
        }

        let names: Vec<String> = platforms
            .iter()
            .map(|p| p.name().unwrap_or_else(|_| String::from("<unknown>")))
            .collect();
        for (i, name) in names.iter().enumerate() {
            info!("platform {i}: {name}");
        }

        // `names` is non-empty here, so `select` cannot return None.
        let selection = policy.select(&names).ok_or(DeviceError::NoPlatform)?;
        let platform = platforms[selection.index];
        let platform_name = names[selection.index].clone();
        if selection.is_degraded() {
            warn!(
                "only deny-listed platforms available; using `{platform_name}` \
                 (software/emulated — timings will not reflect real parallel hardware)"
            );
        } else {
            info!("selected platform: {platform_name}");
        }

        // GPU class first, CPU class second.
        let (device, class) = match Device::list(platform, Some(DeviceType::GPU)) {
            Ok(list) if !list.is_empty() => (list[0], "GPU"),
            _ => {
                warn!("no GPU-class device on `{platform_name}`, trying CPU class");
                match Device::list(platform, Some(DeviceType::CPU)) {
                    Ok(list) if !list.is_empty() => (list[0], "CPU"),
                    _ => {
                        return Err(DeviceError::NoDevice {
                            platform: platform_name,
                        })
                    }
                }
            }
        };

        let device_name = device.name().unwrap_or_else(|_| String::from("<unknown>"));
        let compute_units = match device.info(DeviceInfo::MaxComputeUnits) {
            Ok(DeviceInfoResult::MaxComputeUnits(n)) => n,
            _ => 0,
        };
        info!("selected device: {device_name} ({class}, {compute_units} compute units)");

        let context = Context::builder()
            .platform(platform)
            .devices(device)
            .build()
            .map_err(|source| DeviceError::Context {
                platform: platform_name.clone(),
                source,
            })?;

        let queue = Queue::new(
            &context,
            device,
            Some(CommandQueueProperties::PROFILING_ENABLE),
        )
        .map_err(DeviceError::Queue)?;

        Ok(SelectedDevice {
            device,
            context,
            queue,
            platform_name,
            device_name,
            compute_units,
            degraded: selection.is_degraded(),
        })
    }

    /// Compile the kernel source at `source_path` for this device and
    /// validate that `entry_point` exists in the resulting program.
    ///
    /// On a compiler failure the full build log is carried in
    /// [`DeviceError::Build`] — never a bare error code.
    pub fn compile(
        self,
        source_path: &Path,
        entry_point: &str,
    ) -> Result<DeviceHandle, DeviceError> {
        let src = read_kernel_source(source_path)?;
        info!(
            "compiling `{}` ({} bytes) for {}",
            source_path.display(),
            src.len(),
            self.device_name
        );

        // ocl folds the device build log into the error it returns, which
        // is exactly the diagnostic text the contract requires.
        let program = Program::builder()
            .devices(self.device)
            .src(src)
            .build(&self.context)
            .map_err(|e| DeviceError::Build { log: e.to_string() })?;

        // clGetProgramInfo(CL_PROGRAM_KERNEL_NAMES) returns the entry
        // points as a `;`-separated list.
        let available = program
            .info(ProgramInfo::KernelNames)
            .map(|r| r.to_string())
            .unwrap_or_default();
        if !available.split(';').any(|n| n.trim() == entry_point) {
            return Err(DeviceError::EntryPoint {
                name: entry_point.to_string(),
                available,
            });
        }
        info!("kernel `{entry_point}` compiled successfully");

        Ok(DeviceHandle {
            program,
            queue: self.queue,
            _context: self.context,
            entry_point: entry_point.to_string(),
            platform_name: self.platform_name,
            device_name: self.device_name,
            compute_units: self.compute_units,
            degraded: self.degraded,
        })
    }
}

/// A ready-to-dispatch compute handle: selected platform and device,
/// context, profiling command queue, compiled program, and one validated
/// entry point.
///
/// Create once via [`DeviceHandle::open`] (or the two-phase
/// `SelectedDevice::select_and_prepare` + `compile`), reuse for any number
/// of dispatches, release exactly once. The handle owns a single command
/// queue and is NOT safe for concurrent dispatch — serialize externally or
/// open one handle per thread.
///
/// # Field drop order
/// Rust drops struct fields in declaration order, so `program` is released
/// before `queue`, and `queue` before `_context` — the same teardown order
/// as an explicit clReleaseProgram / clReleaseCommandQueue /
/// clReleaseContext sequence.
#[derive(Debug)]
pub struct DeviceHandle {
    program: Program,
    queue: Queue,
    /// Keeps the compute context alive until `program` and `queue` are
    /// dropped. Never accessed directly — its sole purpose is ownership
    /// and drop order. Prefixed `_` to signal intent.
    _context: Context,
    entry_point: String,
    platform_name: String,
    device_name: String,
    compute_units: u32,
    degraded: bool,
}

impl DeviceHandle {
    /// One-shot convenience: select a device under `policy`, compile
    /// `source_path`, and validate `entry_point`.
    pub fn open(
        policy: &PlatformPolicy,
        source_path: &Path,
        entry_point: &str,
    ) -> Result<Self, DeviceError> {
        SelectedDevice::select_and_prepare(policy)?.compile(source_path, entry_point)
    }

    /// The compiled program containing the entry point.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The profiling-enabled command queue.
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Name of the validated kernel entry point.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Platform identity string, for diagnostics.
    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    /// Device identity string, for diagnostics.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Reported compute-unit count (0 if the query failed).
    pub fn compute_units(&self) -> u32 {
        self.compute_units
    }

    /// True when the platform was selected despite being deny-listed
    /// (software/emulated implementation — timings are not meaningful).
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Release the handle's resources (program, queue, context, in that
    /// order). Consuming `self` makes double-release unrepresentable;
    /// letting the handle fall out of scope is equivalent.
    pub fn release(self) {
        info!("releasing device handle for {}", self.device_name);
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} ({} CU, entry `{}`)",
            self.platform_name, self.device_name, self.compute_units, self.entry_point
        )
    }
}

/// Read a kernel source file in full, stripping a leading UTF-8 BOM if
/// present (the BOM is never treated as source content).
fn read_kernel_source(path: &Path) -> Result<String, DeviceError> {
    let bytes = fs::read(path).map_err(|source| DeviceError::SourceRead {
        path: path.to_path_buf(),
        source,
    })?;
    let body = if bytes.starts_with(&UTF8_BOM) {
        info!("stripping UTF-8 BOM from `{}`", path.display());
        &bytes[UTF8_BOM.len()..]
    } else {
        &bytes[..]
    };
    String::from_utf8(body.to_vec()).map_err(|_| DeviceError::SourceEncoding {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Source reading is pure file I/O — testable without any device.

    #[test]
    fn read_source_strips_bom() {
        let dir = std::env::temp_dir();
        let path = dir.join("oclconv_bom_test.cl");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(&UTF8_BOM).unwrap();
        f.write_all(b"__kernel void k() {}").unwrap();
        drop(f);

        let src = read_kernel_source(&path).unwrap();
        assert_eq!(src, "__kernel void k() {}");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn read_source_without_bom_is_verbatim() {
        let dir = std::env::temp_dir();
        let path = dir.join("oclconv_nobom_test.cl");
        fs::write(&path, "__kernel void k() {}").unwrap();

        let src = read_kernel_source(&path).unwrap();
        assert_eq!(src, "__kernel void k() {}");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_source_is_a_read_error() {
        let err = read_kernel_source(Path::new("/nonexistent/conv2d.cl")).unwrap_err();
        match err {
            DeviceError::SourceRead { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/conv2d.cl"));
            }
            other => panic!("expected SourceRead, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let dir = std::env::temp_dir();
        let path = dir.join("oclconv_badenc_test.cl");
        fs::write(&path, [0xC0u8, 0x80, 0xFF]).unwrap();

        let err = read_kernel_source(&path).unwrap_err();
        assert!(matches!(err, DeviceError::SourceEncoding { .. }));
        fs::remove_file(&path).ok();
    }
}
