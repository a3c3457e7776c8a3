//! Integration tests for tessera-time.
//!
//! Kernel outputs are checked against rustfft and direct host computations on
//! synthetic signals, under both compilation strategies where it matters.

use std::f64::consts::PI;

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use tessera_core::{
    CollectionProducer, CompilationStrategy, CompileOptions, Evaluable, OptimizationPolicy,
    PackedCollection, ParallelProcess, Producer, Shape,
};
use tessera_time::{
    AcceleratedTimeSeries, Stft, WindowType, fft, ifft, interleave, interpolate,
    multi_order_filter, window,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Deterministic test signal mixing two tones and a ramp.
fn signal(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let t = i as f64 / len as f64;
            (2.0 * PI * 3.0 * t).sin() + 0.5 * (2.0 * PI * 7.0 * t).cos() + 0.1 * t
        })
        .collect()
}

/// Forward FFT of interleaved complex data through rustfft.
fn reference_fft(interleaved: &[f64]) -> Vec<f64> {
    let mut buffer: Vec<Complex<f64>> = interleaved
        .chunks_exact(2)
        .map(|c| Complex::new(c[0], c[1]))
        .collect();
    FftPlanner::new()
        .plan_fft_forward(buffer.len())
        .process(&mut buffer);
    buffer.iter().flat_map(|c| [c.re, c.im]).collect()
}

fn assert_close(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < tolerance, "index {i}: {a} vs {e}");
    }
}

fn source(values: &[f64], strategy: CompilationStrategy) -> CollectionProducer {
    CollectionProducer::provider(interleave(values).unwrap())
        .with_options(CompileOptions::with_strategy(strategy))
}

// ---------------------------------------------------------------------------
// Fourier transform
// ---------------------------------------------------------------------------

#[test]
fn fft_matches_rustfft() {
    for strategy in CompilationStrategy::ALL {
        for size in [4, 8, 16, 64] {
            let x = signal(size);
            let out = fft(size, &source(&x, strategy))
                .unwrap()
                .evaluate(&[])
                .unwrap();
            let expected = reference_fft(&interleave(&x).unwrap().to_vec());
            assert_close(&out.to_vec(), &expected, 1e-9);
        }
    }
}

#[test]
fn fft_round_trip_recovers_signal() {
    for strategy in CompilationStrategy::ALL {
        for size in [4, 8, 16, 64] {
            let x = signal(size);
            let spectrum = fft(size, &source(&x, strategy)).unwrap();
            let back = ifft(size, &spectrum).unwrap().evaluate(&[]).unwrap();
            assert_close(&back.to_vec(), &interleave(&x).unwrap().to_vec(), 1e-9);
        }
    }
}

#[test]
fn strategies_agree() {
    let x = signal(32);
    let recursive = fft(32, &source(&x, CompilationStrategy::Recursive))
        .unwrap()
        .evaluate(&[])
        .unwrap();
    let unrolled = fft(32, &source(&x, CompilationStrategy::Unrolled))
        .unwrap()
        .evaluate(&[])
        .unwrap();
    assert_close(&recursive.to_vec(), &unrolled.to_vec(), 1e-9);
}

#[test]
fn batched_fft_transforms_each_block() {
    let x = signal(32);
    let out = fft(8, &source(&x, CompilationStrategy::Recursive))
        .unwrap()
        .evaluate(&[])
        .unwrap();
    assert_eq!(out.shape(), &Shape::new([4, 8, 2]));

    let packed = interleave(&x).unwrap().to_vec();
    let values = out.to_vec();
    for block in 0..4 {
        let expected = reference_fft(&packed[block * 16..(block + 1) * 16]);
        assert_close(&values[block * 16..(block + 1) * 16], &expected, 1e-9);
    }
}

#[test]
fn fft_of_argument_runs_per_call() {
    let input = CollectionProducer::argument(0, Shape::new([16, 2]));
    let spectrum = fft(16, &input).unwrap();
    let evaluable = spectrum.get().unwrap();
    for seed in 0..3 {
        let x: Vec<f64> = signal(16).iter().map(|v| v * (seed + 1) as f64).collect();
        let packed = interleave(&x).unwrap();
        let out = evaluable.evaluate(std::slice::from_ref(&packed)).unwrap();
        assert_close(&out.to_vec(), &reference_fft(&packed.to_vec()), 1e-9);
    }
}

#[test]
fn kernel_source_names_the_recursive_function() {
    let spectrum = fft(16, &source(&signal(16), CompilationStrategy::Recursive)).unwrap();
    let text = spectrum.kernel_source().unwrap().unwrap_or_default();
    assert!(text.contains("fft_radix_forward"));
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

#[test]
fn window_boundaries() {
    let size = 9;
    let hann = window(WindowType::Hann, size).unwrap().evaluate(&[]).unwrap().to_vec();
    assert!(hann[0].abs() < 1e-12 && hann[size - 1].abs() < 1e-12);
    assert!((hann[size / 2] - 1.0).abs() < 1e-12);

    let hamming = window(WindowType::Hamming, size).unwrap().evaluate(&[]).unwrap().to_vec();
    assert!((hamming[0] - 0.08).abs() < 1e-12);

    let blackman = window(WindowType::Blackman, size).unwrap().evaluate(&[]).unwrap().to_vec();
    assert!(blackman[0].abs() < 1e-12);
}

#[test]
fn every_window_matches_host_formula() {
    for kind in WindowType::ALL {
        let out = window(kind, 16).unwrap().evaluate(&[]).unwrap().to_vec();
        let expected: Vec<f64> = (0..16).map(|n| kind.coefficient(n, 16).unwrap()).collect();
        assert_close(&out, &expected, 1e-12);
    }
}

// ---------------------------------------------------------------------------
// STFT
// ---------------------------------------------------------------------------

#[test]
fn stft_matches_manual_framing() {
    let (fft_size, hop) = (8, 4);
    let x = signal(36);
    let producer = CollectionProducer::provider(PackedCollection::from_slice(&x));
    let stft = Stft::new(fft_size, hop, WindowType::Hann, &producer).unwrap();
    assert_eq!(stft.frame_count(), 8);

    let out = stft.evaluate(&[]).unwrap().to_vec();
    for frame in 0..stft.frame_count() {
        let framed: Vec<f64> = (0..fft_size)
            .map(|n| x[frame * hop + n] * WindowType::Hann.coefficient(n, fft_size).unwrap())
            .collect();
        let expected = reference_fft(&interleave(&framed).unwrap().to_vec());
        let span = frame * fft_size * 2..(frame + 1) * fft_size * 2;
        assert_close(&out[span], &expected, 1e-9);
    }
}

#[test]
fn stft_survives_optimization() {
    let x = signal(64);
    let producer = CollectionProducer::provider(PackedCollection::from_slice(&x));
    let stft = Stft::new(16, 8, WindowType::Blackman, &producer).unwrap();
    let direct = stft.evaluate(&[]).unwrap();
    let optimized = stft
        .producer()
        .optimized(&OptimizationPolicy::default())
        .unwrap()
        .evaluate(&[])
        .unwrap();
    assert_close(&optimized.to_vec(), &direct.to_vec(), 1e-12);
}

// ---------------------------------------------------------------------------
// Filter, interpolation and series
// ---------------------------------------------------------------------------

#[test]
fn filtered_series_can_be_interpolated() {
    let x: Vec<f64> = (0..8).map(|i| (i * i) as f64).collect();
    let series = CollectionProducer::provider(PackedCollection::from_slice(&x));
    let taps = CollectionProducer::provider(PackedCollection::from_slice(&[0.25, 0.5, 0.25]));
    let smoothed = multi_order_filter(&series, &taps).unwrap();

    let times = CollectionProducer::argument(0, Shape::vector(3));
    let sampled = interpolate(&smoothed, &times, 1.0).unwrap();
    let out = sampled
        .evaluate(&[PackedCollection::from_slice(&[1.0, 2.5, 6.0])])
        .unwrap()
        .to_vec();

    let host: Vec<f64> = (0..8)
        .map(|k| {
            let at = |i: usize| x.get(i).copied().unwrap_or(0.0);
            let before = if k == 0 { 0.0 } else { at(k - 1) };
            0.25 * before + 0.5 * at(k) + 0.25 * at(k + 1)
        })
        .collect();
    let expected = [host[1], (host[2] + host[3]) / 2.0, host[6]];
    assert_close(&out, &expected, 1e-12);
}

#[test]
fn series_kernel_tracks_host_after_purge() {
    let series = AcceleratedTimeSeries::new(16).unwrap();
    for i in 0..10 {
        series.add(i as f64, (i * 3) as f64).unwrap();
    }
    series.purge(4.5).unwrap();

    let times = CollectionProducer::variable_argument(0, 1).unwrap();
    let kernel = series.value_at_kernel(&times);
    let probe = [3.0, 4.0, 4.5, 8.25, 9.0, 12.0];
    let out = kernel
        .evaluate(&[PackedCollection::from_slice(&probe)])
        .unwrap()
        .to_vec();
    let expected: Vec<f64> = probe
        .iter()
        .map(|&t| series.value_at(t).unwrap_or(0.0))
        .collect();
    assert_close(&out, &expected, 1e-12);
    assert_eq!(series.value_at(3.0), None);
}
