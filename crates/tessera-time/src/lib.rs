//! Tessera Time - time-domain kernels built on tessera-core
//!
//! Each module contributes [`Computation`](tessera_core::Computation) nodes
//! that render to kernel source and run on the host executor:
//!
//! - [`window`] - Hann, Hamming, Blackman, Bartlett and flat-top windows
//! - [`fourier`] - batched radix-2/radix-4 FFT and inverse FFT
//! - [`filter`] - centered FIR filtering with shared or per-sample taps
//! - [`interpolate`] - linear interpolation of a sampled series
//! - [`series`] - capacity-bounded `(time, value)` series in shared memory
//! - [`stft`] - windowed, framed FFT
//! - [`timing`] - drift tracking against a target period
//!
//! ## Compilation strategies
//!
//! The FFT is recursive. With [`CompilationStrategy::Recursive`] the kernel
//! calls a generated recursive function; with
//! [`CompilationStrategy::Unrolled`] the recursion is expanded at compile time
//! into straight-line code. Both produce the same values.
//!
//! [`CompilationStrategy::Recursive`]: tessera_core::CompilationStrategy::Recursive
//! [`CompilationStrategy::Unrolled`]: tessera_core::CompilationStrategy::Unrolled
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{CollectionProducer, Producer};
//! use tessera_time::{fft, interleave};
//!
//! let signal = interleave(&[1.0, 0.0, 0.0, 0.0]).unwrap();
//! let spectrum = fft(4, &CollectionProducer::provider(signal)).unwrap();
//! let out = spectrum.evaluate(&[]).unwrap().to_vec();
//! assert_eq!(out, vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
//! ```

pub mod filter;
pub mod fourier;
pub mod interpolate;
pub mod series;
pub mod stft;
pub mod timing;
pub mod window;

pub use filter::{MultiOrderFilter, multi_order_filter};
pub use fourier::{FourierTransform, fft, ifft, interleave};
pub use interpolate::{Interpolate, interpolate};
pub use series::AcceleratedTimeSeries;
pub use stft::Stft;
pub use timing::TimingRegularizer;
pub use window::{WindowComputation, WindowType, window};
