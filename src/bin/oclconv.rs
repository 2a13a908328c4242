// bin/oclconv.rs — Benchmark driver: sequential CPU vs parallel OpenCL.
//
// Loads a grayscale image, convolves it with the selected filter on both
// engines, reports timings (CPU wall clock, device kernel time, transfer
// overhead, speedup) and the maximum per-pixel divergence, and saves both
// outputs as single-channel PNGs.
//
//   oclconv --input photo.png
//   oclconv --input photo.png --filter gaussian --size 5 --sigma 1.2
//   oclconv --input photo.png --cpu-only
//
// Set RUST_LOG=info to see platform/device selection and build diagnostics.

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use oclconv::cl::{convolve_parallel, DeviceHandle, PlatformPolicy};
use oclconv::convolution::convolve_sequential_with_progress;
use oclconv::filter::Filter;
use oclconv::image::Image;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterKind {
    /// Uniform box blur (1/k² everywhere).
    Blur,
    /// Gaussian blur (see --sigma).
    Gaussian,
    /// 3x3 sharpening cross.
    Sharpen,
    /// Pass-through (useful for validating the pipeline).
    Identity,
}

#[derive(Parser, Debug)]
#[command(name = "oclconv", about = "2-D convolution benchmark: CPU reference vs OpenCL")]
struct Args {
    /// Input image (any format the `image` crate decodes; forced to 8-bit grayscale).
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for the output PNGs.
    #[arg(short, long, default_value = "img_output")]
    output_dir: PathBuf,

    /// OpenCL kernel source file.
    #[arg(long, default_value = "kernels/conv2d.cl")]
    kernel: PathBuf,

    /// Convolution filter to apply.
    #[arg(short, long, value_enum, default_value_t = FilterKind::Blur)]
    filter: FilterKind,

    /// Filter side length (odd, >= 1). Ignored for --filter sharpen.
    #[arg(short, long, default_value_t = 3)]
    size: usize,

    /// Gaussian standard deviation.
    #[arg(long, default_value_t = 1.0)]
    sigma: f32,

    /// Skip the OpenCL phase entirely.
    #[arg(long)]
    cpu_only: bool,
}

fn build_filter(args: &Args) -> Result<Filter> {
    let f = match args.filter {
        FilterKind::Blur => Filter::box_blur(args.size)?,
        FilterKind::Gaussian => Filter::gaussian(args.size, args.sigma)?,
        FilterKind::Sharpen => Filter::sharpen(),
        FilterKind::Identity => Filter::identity(args.size)?,
    };
    Ok(f)
}

fn load_gray(path: &PathBuf) -> Result<Image<u8>> {
    let img = image::open(path)
        .with_context(|| format!("failed to load image `{}`", path.display()))?
        .to_luma8();
    let (w, h) = img.dimensions();
    Ok(Image::from_vec(w as usize, h as usize, img.into_raw()))
}

fn save_gray(path: &PathBuf, img: &Image<u8>) -> Result<()> {
    image::save_buffer(
        path,
        img.as_slice(),
        img.width() as u32,
        img.height() as u32,
        image::ExtendedColorType::L8,
    )
    .with_context(|| format!("failed to save `{}`", path.display()))?;
    println!("saved {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let filter = build_filter(&args)?;
    let input = load_gray(&args.input)?;
    println!(
        "image: {}x{} px, filter: {:?} {}x{}",
        input.width(),
        input.height(),
        args.filter,
        filter.size(),
        filter.size()
    );
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("cannot create `{}`", args.output_dir.display()))?;

    // --- Phase 1: sequential CPU reference ---
    println!("\n== sequential (CPU) ==");
    let t0 = Instant::now();
    let cpu_out = convolve_sequential_with_progress(&input, &filter, |pct| {
        print!("{pct}% ");
        std::io::stdout().flush().ok();
    });
    let cpu_ms = t0.elapsed().as_secs_f64() * 1000.0;
    println!("\ncpu time: {cpu_ms:.2} ms");
    save_gray(&args.output_dir.join("result_cpu.png"), &cpu_out)?;

    if args.cpu_only {
        return Ok(());
    }

    // --- Phase 2: parallel OpenCL ---
    println!("\n== parallel (OpenCL) ==");
    let handle = DeviceHandle::open(&PlatformPolicy::default(), &args.kernel, "conv2d")
        .context("failed to prepare OpenCL device")?;
    println!("device: {handle}");
    if handle.is_degraded() {
        println!("warning: software/emulated platform — timings are not meaningful");
    }

    let t0 = Instant::now();
    let (gpu_out, kernel_ms) =
        convolve_parallel(&handle, &input, &filter).context("parallel dispatch failed")?;
    let total_ms = t0.elapsed().as_secs_f64() * 1000.0;

    println!("total (host + transfers): {total_ms:.4} ms");
    println!("device kernel time:       {kernel_ms:.4} ms");
    println!("transfer/launch overhead: {:.4} ms", total_ms - kernel_ms);
    if kernel_ms > 0.0 {
        println!("speedup vs CPU (kernel-only): {:.2}x", cpu_ms / kernel_ms);
    }

    // Cross-engine check: both paths accumulate in f32 under the same
    // border policy, so anything above 1 level is a bug.
    let max_diff = cpu_out
        .as_slice()
        .iter()
        .zip(gpu_out.as_slice())
        .map(|(&a, &b)| (a as i16 - b as i16).unsigned_abs())
        .max()
        .unwrap_or(0);
    println!("max per-pixel divergence: {max_diff}");
    if max_diff > 1 {
        println!("warning: divergence exceeds float rounding tolerance");
    }

    save_gray(&args.output_dir.join("result_gpu.png"), &gpu_out)?;
    handle.release();
    Ok(())
}
