//! Property-based tests for tessera-time.
//!
//! Random signals go through the kernel FFT and back, and the forward
//! transform is checked for linearity and Parseval's identity.

use proptest::prelude::*;
use tessera_core::{CollectionProducer, CompilationStrategy, CompileOptions, Producer};
use tessera_time::{AcceleratedTimeSeries, Stft, fft, ifft, interleave};

fn transform(values: &[f64], strategy: CompilationStrategy) -> Vec<f64> {
    let source = CollectionProducer::provider(interleave(values).unwrap())
        .with_options(CompileOptions::with_strategy(strategy));
    fft(values.len(), &source).unwrap().evaluate(&[]).unwrap().to_vec()
}

fn signal(log2: u32) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0f64..1.0, 1usize << log2)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// ifft(fft(x)) recovers x for every power-of-two size and strategy.
    #[test]
    fn fft_round_trip(
        values in (1u32..7).prop_flat_map(signal),
        unrolled in any::<bool>(),
    ) {
        let strategy = if unrolled {
            CompilationStrategy::Unrolled
        } else {
            CompilationStrategy::Recursive
        };
        let packed = interleave(&values).unwrap();
        let source = CollectionProducer::provider(packed.clone())
            .with_options(CompileOptions::with_strategy(strategy));
        let spectrum = fft(values.len(), &source).unwrap();
        let back = ifft(values.len(), &spectrum).unwrap().evaluate(&[]).unwrap();
        for (a, e) in back.to_vec().iter().zip(packed.to_vec()) {
            prop_assert!((a - e).abs() < 1e-9, "{} vs {}", a, e);
        }
    }

    /// Energy in the spectrum is `n` times the energy in the signal.
    #[test]
    fn parseval_holds(values in (1u32..7).prop_flat_map(signal)) {
        let n = values.len() as f64;
        let spectrum = transform(&values, CompilationStrategy::Recursive);
        let time_energy: f64 = values.iter().map(|x| x * x).sum();
        let frequency_energy: f64 = spectrum.iter().map(|x| x * x).sum();
        prop_assert!((frequency_energy - n * time_energy).abs() < 1e-8 * (1.0 + n * time_energy));
    }

    /// fft(a x + y) = a fft(x) + fft(y).
    #[test]
    fn fft_is_linear(
        pair in (1u32..6).prop_flat_map(|log2| (signal(log2), signal(log2))),
        scale in -4.0f64..4.0,
    ) {
        let (x, y) = pair;
        let mixed: Vec<f64> = x.iter().zip(&y).map(|(a, b)| scale * a + b).collect();
        let (fx, fy) = (
            transform(&x, CompilationStrategy::Unrolled),
            transform(&y, CompilationStrategy::Unrolled),
        );
        let fm = transform(&mixed, CompilationStrategy::Unrolled);
        for i in 0..fm.len() {
            prop_assert!((fm[i] - (scale * fx[i] + fy[i])).abs() < 1e-9);
        }
    }

    /// The frame count never reads past the end of the signal.
    #[test]
    fn stft_frames_fit_the_signal(len in 0usize..512, log2 in 1u32..7, hop in 1usize..64) {
        let fft_size = 1usize << log2;
        let frames = Stft::frame_count_for(len, fft_size, hop);
        if frames > 0 {
            prop_assert!((frames - 1) * hop + fft_size <= len);
            prop_assert!(frames * hop + fft_size > len);
        } else {
            prop_assert!(len < fft_size);
        }
    }

    /// Host interpolation stays within the values of the bracketing entries.
    #[test]
    fn series_interpolation_is_bounded(
        values in prop::collection::vec(-100.0f64..100.0, 2..32),
        at in 0.0f64..1.0,
    ) {
        let series = AcceleratedTimeSeries::new(values.len()).unwrap();
        for (i, v) in values.iter().enumerate() {
            series.add(i as f64, *v).unwrap();
        }
        let time = at * (values.len() - 1) as f64;
        let left = time.floor() as usize;
        let right = (left + 1).min(values.len() - 1);
        let (lo, hi) = (values[left].min(values[right]), values[left].max(values[right]));
        let value = series.value_at(time).unwrap();
        prop_assert!(value >= lo - 1e-9 && value <= hi + 1e-9);
    }
}
