//! Kernel source emission.
//!
//! Builds one of the time-domain computations over positional arguments,
//! optimizes it under the configured policy and prints the rendered kernel.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use tessera_core::{CollectionProducer, CompilationStrategy, CompileOptions, ParallelProcess, Shape};
use tessera_time::{Stft, WindowType, fft, ifft, interpolate, multi_order_filter, window};

use super::common::{compile_options, load_config};

/// Computations whose kernels can be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KernelKind {
    /// Forward FFT of a `[size, 2]` complex argument
    Fft,
    /// Inverse FFT of a `[size, 2]` complex argument
    Ifft,
    /// Window of `size` points
    Window,
    /// Centered FIR filter of `size` taps over a `length`-sample series
    Filter,
    /// Linear interpolation of a `length`-sample series at `size` times
    Interpolate,
    /// STFT of a `length`-sample signal with `size`-point frames
    Stft,
}

#[derive(Args)]
pub struct EmitArgs {
    /// Computation to emit
    #[arg(value_enum)]
    kind: KernelKind,

    /// Transform, window or tap count
    #[arg(short, long, default_value = "16")]
    size: usize,

    /// Signal length for filter, interpolate and stft
    #[arg(short, long)]
    length: Option<usize>,

    /// STFT hop size (defaults to half the frame)
    #[arg(long)]
    hop: Option<usize>,

    /// Window function for window and stft
    #[arg(short, long, default_value = "hann")]
    window: WindowType,

    /// Override the configured compilation strategy (recursive, unrolled)
    #[arg(long)]
    strategy: Option<CompilationStrategy>,

    /// Write the source to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: EmitArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let options = compile_options(&config, args.strategy)?;
    let producer = build(&args, options)?.optimized(&config.to_policy())?;

    let Some(source) = producer.kernel_source()? else {
        anyhow::bail!("'{:?}' does not compile to a kernel", args.kind);
    };
    tracing::info!(
        kind = ?args.kind,
        strategy = %options.strategy,
        lines = source.lines().count(),
        "emitted kernel"
    );

    match &args.output {
        Some(path) => std::fs::write(path, &source)
            .map_err(|e| anyhow::anyhow!("failed to write '{}': {e}", path.display()))?,
        None => print!("{source}"),
    }
    Ok(())
}

fn build(args: &EmitArgs, options: CompileOptions) -> anyhow::Result<CollectionProducer> {
    let size = args.size;
    let length = args.length.unwrap_or(4 * size);
    let vector = |index, len| CollectionProducer::argument(index, Shape::vector(len));

    let producer = match args.kind {
        KernelKind::Fft | KernelKind::Ifft => {
            let input =
                CollectionProducer::argument(0, Shape::new([size, 2])).with_options(options);
            if args.kind == KernelKind::Fft {
                fft(size, &input)?
            } else {
                ifft(size, &input)?
            }
        }
        KernelKind::Window => window(args.window, size)?.with_options(options),
        KernelKind::Filter => {
            multi_order_filter(&vector(0, length).with_options(options), &vector(1, size))?
        }
        KernelKind::Interpolate => {
            interpolate(&vector(0, length).with_options(options), &vector(1, size), 1.0)?
        }
        KernelKind::Stft => {
            let hop = args.hop.unwrap_or((size / 2).max(1));
            let signal = vector(0, length).with_options(options);
            Stft::new(size, hop, args.window, &signal)?.producer().clone()
        }
    };
    Ok(producer)
}
