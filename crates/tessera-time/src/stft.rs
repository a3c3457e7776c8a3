//! Short-time Fourier transform.
//!
//! Two kernels: a framing kernel that cuts the signal into overlapping frames,
//! multiplies each by the window (inlined, never materialized) and packs the
//! result as complex values, followed by one batched [`FourierTransform`]
//! over every frame.

use std::sync::Arc;

use tessera_core::{
    CollectionProducer, Computation, Error, EvaluableRef, Expression, InputAccess, NodeRef,
    PackedCollection, Producer, Result, Shape,
};

use crate::fourier::FourierTransform;
use crate::window::{WindowComputation, WindowType};

/// Windowed frames of a signal as `[frames, fft_size, 2]` complex values.
#[derive(Debug, Clone)]
struct Frames {
    signal: NodeRef,
    window: WindowComputation,
    hop: usize,
    frames: usize,
}

impl Frames {
    fn fft_size(&self) -> usize {
        self.window.size()
    }
}

impl Computation for Frames {
    fn name(&self) -> String {
        "stft_frames".into()
    }

    fn shape(&self) -> Shape {
        Shape::new([self.frames, self.fft_size(), 2])
    }

    fn inputs(&self) -> Vec<NodeRef> {
        vec![Arc::clone(&self.signal)]
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        let signal = inputs
            .into_iter()
            .next()
            .unwrap_or_else(|| Arc::clone(&self.signal));
        Arc::new(Self {
            signal,
            ..self.clone()
        })
    }

    fn aggregation_count(&self) -> u64 {
        self.fft_size() as u64
    }

    fn is_traversable(&self) -> bool {
        true
    }

    fn value_at(&self, index: &Expression, inputs: &[InputAccess]) -> Result<Expression> {
        let signal = inputs
            .first()
            .ok_or_else(|| Error::execution("stft framing has no signal input"))?;
        let item = 2 * self.fft_size();
        let length = self.signal.shape().size();

        let frame = index.clone() / item;
        let within = index.clone() % item;
        let sample = within.clone() / 2;
        let position = frame * self.hop + sample.clone();
        let clamped = position.clone().min(length.saturating_sub(1));
        let windowed = signal.value_at(&clamped)? * self.window.coefficient_at(&sample);

        Ok(Expression::conditional(
            (within % 2).equal(0).and(position.less_than(length)),
            windowed,
            0.0,
        ))
    }
}

/// STFT of a fixed-length signal.
#[derive(Debug, Clone)]
pub struct Stft {
    fft_size: usize,
    hop: usize,
    window: WindowType,
    frame_count: usize,
    producer: CollectionProducer,
}

impl Stft {
    /// Frames of `fft_size` samples every `hop` samples, each windowed and
    /// transformed.
    ///
    /// `fft_size` must be a power of two of at least 2, `hop` positive and the
    /// signal of fixed length.
    pub fn new(
        fft_size: usize,
        hop: usize,
        window: WindowType,
        signal: &CollectionProducer,
    ) -> Result<Self> {
        if fft_size < 2 || !fft_size.is_power_of_two() {
            return Err(Error::validation(
                "stft",
                format!("fft size must be a power of two >= 2, got {fft_size}"),
            ));
        }
        if hop == 0 {
            return Err(Error::validation("stft", "hop size must be positive"));
        }
        let node = Arc::clone(signal.node());
        if !node.is_fixed_count() {
            return Err(Error::validation(
                "stft",
                format!("signal '{}' must have a fixed length", node.name()),
            ));
        }

        let frame_count = Self::frame_count_for(node.shape().size(), fft_size, hop);
        let frames = Frames {
            signal: node,
            window: WindowComputation::new(window, fft_size)?,
            hop,
            frames: frame_count,
        };
        let transform = FourierTransform::new(fft_size, false, Arc::new(frames))?;
        tracing::debug!("stft: fft={fft_size} hop={hop} window={window} frames={frame_count}");

        Ok(Self {
            fft_size,
            hop,
            window,
            frame_count,
            producer: CollectionProducer::from_node(Arc::new(transform))
                .with_options(*signal.options()),
        })
    }

    /// Frames in a signal of `len` samples: `(len - fft_size) / hop + 1`, or
    /// 0 when the signal is shorter than one frame.
    pub fn frame_count_for(len: usize, fft_size: usize, hop: usize) -> usize {
        if len < fft_size || hop == 0 {
            0
        } else {
            (len - fft_size) / hop + 1
        }
    }

    /// Points per frame.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Samples between frame starts.
    pub fn hop(&self) -> usize {
        self.hop
    }

    /// The window applied to each frame.
    pub fn window(&self) -> WindowType {
        self.window
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// `[frames, fft_size, 2]`.
    pub fn output_shape(&self) -> Shape {
        Shape::new([self.frame_count, self.fft_size, 2])
    }

    /// The underlying computation tree.
    pub fn producer(&self) -> &CollectionProducer {
        &self.producer
    }
}

impl Producer<PackedCollection> for Stft {
    fn get(&self) -> Result<EvaluableRef<PackedCollection>> {
        self.producer.get()
    }

    fn destroy(&self) {
        self.producer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count() {
        assert_eq!(Stft::frame_count_for(16, 8, 4), 3);
        assert_eq!(Stft::frame_count_for(8, 8, 4), 1);
        assert_eq!(Stft::frame_count_for(7, 8, 4), 0);
    }

    #[test]
    fn test_validation() {
        let signal = CollectionProducer::argument(0, Shape::vector(32));
        assert!(Stft::new(12, 4, WindowType::Hann, &signal).unwrap_err().is_validation());
        assert!(Stft::new(8, 0, WindowType::Hann, &signal).unwrap_err().is_validation());
        let variable = CollectionProducer::variable_argument(0, 1).unwrap();
        assert!(Stft::new(8, 4, WindowType::Hann, &variable).is_err());
    }

    #[test]
    fn test_dc_signal_peaks_at_bin_zero() {
        let signal = CollectionProducer::provider(PackedCollection::from_slice(&[1.0; 16]));
        let stft = Stft::new(8, 4, WindowType::Bartlett, &signal).unwrap();
        assert_eq!(stft.output_shape(), Shape::new([3, 8, 2]));

        let out = stft.evaluate(&[]).unwrap().to_vec();
        let window_sum: f64 = (0..8)
            .map(|n| WindowType::Bartlett.coefficient(n, 8).unwrap())
            .sum();
        for frame in 0..3 {
            let bin0 = out[frame * 16];
            assert!((bin0 - window_sum).abs() < 1e-9, "frame {frame}: {bin0}");
            assert!(out[frame * 16 + 1].abs() < 1e-9);
        }
    }

    #[test]
    fn test_short_signal_has_no_frames() {
        let signal = CollectionProducer::provider(PackedCollection::from_slice(&[1.0; 4]));
        let stft = Stft::new(8, 2, WindowType::Hann, &signal).unwrap();
        assert_eq!(stft.frame_count(), 0);
        assert!(stft.evaluate(&[]).unwrap().is_empty());
    }
}
