//! Commands that compile and run a computation on the host.

use std::path::Path;

use clap::Args;
use tessera_core::{
    CollectionProducer, CompilationStrategy, PackedCollection, ParallelProcess, Producer, Shape,
};
use tessera_time::{WindowType, fft, ifft, interleave, window};

use super::common::{compile_options, load_config};

#[derive(Args)]
pub struct FftArgs {
    /// Real samples, comma separated (length must be a power of two)
    #[arg(value_delimiter = ',', allow_negative_numbers = true, required = true)]
    samples: Vec<f64>,

    /// Treat samples as interleaved re,im pairs
    #[arg(long)]
    complex: bool,

    /// Run the inverse transform
    #[arg(short, long)]
    inverse: bool,

    /// Override the configured compilation strategy (recursive, unrolled)
    #[arg(long)]
    strategy: Option<CompilationStrategy>,
}

#[derive(Args)]
pub struct WindowArgs {
    /// Window function (hann, hamming, blackman, bartlett, flattop)
    window: WindowType,

    /// Number of points
    #[arg(short, long, default_value = "16")]
    size: usize,
}

pub fn run_fft(args: FftArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let options = compile_options(&config, args.strategy)?;

    let packed = if args.complex {
        if args.samples.len() % 2 != 0 {
            anyhow::bail!("complex input needs an even number of values");
        }
        PackedCollection::from_vec(
            Shape::new([args.samples.len() / 2, 2]),
            args.samples.clone(),
        )?
    } else {
        interleave(&args.samples)?
    };
    let size = packed.shape().count();

    let input = CollectionProducer::provider(packed).with_options(options);
    let transform = if args.inverse {
        ifft(size, &input)?
    } else {
        fft(size, &input)?
    };
    let out = transform.optimized(&config.to_policy())?.evaluate(&[])?;
    tracing::debug!(size, inverse = args.inverse, strategy = %options.strategy, "fft evaluated");

    println!("{:>6}  {:>14}  {:>14}  {:>14}", "bin", "re", "im", "magnitude");
    for (k, bin) in out.to_vec().chunks_exact(2).enumerate() {
        let (re, im) = (bin[0], bin[1]);
        println!("{k:>6}  {re:>14.6}  {im:>14.6}  {:>14.6}", re.hypot(im));
    }
    Ok(())
}

pub fn run_window(args: WindowArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let coefficients = window(args.window, args.size)?
        .with_options(config.compile_options()?)
        .evaluate(&[])?;

    println!("{} window, {} points", args.window, args.size);
    for (n, w) in coefficients.to_vec().iter().enumerate() {
        println!("{n:>6}  {w:.6}");
    }
    Ok(())
}
