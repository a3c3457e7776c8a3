//! Window function coefficients as a kernel computation.
//!
//! All windows are symmetric and use `N - 1` as the denominator, so the first
//! and last coefficients of a Hann window are exactly zero. Windows have no
//! inputs and are traversable: a consumer such as STFT framing inlines the
//! window formula instead of reading a precomputed buffer.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tessera_core::{
    CollectionProducer, Computation, Error, Expression, InputAccess, NodeRef, Result, Shape,
};

/// Supported window functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowType {
    /// `0.5 * (1 - cos(2πn / (N-1)))`
    Hann,
    /// `0.54 - 0.46 * cos(2πn / (N-1))`
    Hamming,
    /// `0.42 - 0.5 * cos(2πn / (N-1)) + 0.08 * cos(4πn / (N-1))`
    Blackman,
    /// Triangular: `1 - |2n / (N-1) - 1|`
    Bartlett,
    /// Five-term flat-top window for amplitude-accurate measurement.
    Flattop,
}

/// Flat-top cosine series coefficients `a0..a4`.
const FLATTOP: [f64; 5] = [0.21557895, 0.41663158, 0.277263158, 0.083578947, 0.006947368];

impl WindowType {
    /// Every supported window.
    pub const ALL: [Self; 5] = [
        Self::Hann,
        Self::Hamming,
        Self::Blackman,
        Self::Bartlett,
        Self::Flattop,
    ];

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hann => "hann",
            Self::Hamming => "hamming",
            Self::Blackman => "blackman",
            Self::Bartlett => "bartlett",
            Self::Flattop => "flattop",
        }
    }

    /// Fails unless a window of `size` points is defined.
    fn check_size(self, size: usize) -> Result<()> {
        if size < 2 {
            return Err(Error::validation(
                "window size",
                format!("{self} window needs at least 2 points, got {size}"),
            ));
        }
        Ok(())
    }

    /// Coefficient `n` of a window of `size` points, computed on the host.
    ///
    /// Fails if `size < 2` or `n` is not below `size`.
    pub fn coefficient(self, n: usize, size: usize) -> Result<f64> {
        self.check_size(size)?;
        if n >= size {
            return Err(Error::validation(
                "window index",
                format!("index {n} is outside a {size}-point {self} window"),
            ));
        }
        let denominator = (size - 1) as f64;
        let n = n as f64;
        let cosine = |k: f64| (k * PI * n / denominator).cos();
        Ok(match self {
            Self::Hann => 0.5 * (1.0 - cosine(2.0)),
            Self::Hamming => 0.54 - 0.46 * cosine(2.0),
            Self::Blackman => 0.42 - 0.5 * cosine(2.0) + 0.08 * cosine(4.0),
            Self::Bartlett => 1.0 - (2.0 * n / denominator - 1.0).abs(),
            Self::Flattop => {
                FLATTOP[0] - FLATTOP[1] * cosine(2.0) + FLATTOP[2] * cosine(4.0)
                    - FLATTOP[3] * cosine(6.0)
                    + FLATTOP[4] * cosine(8.0)
            }
        })
    }

    /// Kernel expression for coefficient `n` of a window of `size` points.
    fn expression(self, n: &Expression, size: usize) -> Expression {
        let denominator = (size - 1) as f64;
        let n = n.clone().to_double();
        let cosine = |k: f64| (Expression::double(k * PI) * n.clone() / denominator).cos();
        match self {
            Self::Hann => Expression::double(0.5) * (Expression::double(1.0) - cosine(2.0)),
            Self::Hamming => Expression::double(0.54) - Expression::double(0.46) * cosine(2.0),
            Self::Blackman => {
                Expression::double(0.42) - Expression::double(0.5) * cosine(2.0)
                    + Expression::double(0.08) * cosine(4.0)
            }
            Self::Bartlett => {
                Expression::double(1.0)
                    - (Expression::double(2.0) * n / denominator - 1.0).abs()
            }
            Self::Flattop => {
                Expression::double(FLATTOP[0]) - Expression::double(FLATTOP[1]) * cosine(2.0)
                    + Expression::double(FLATTOP[2]) * cosine(4.0)
                    - Expression::double(FLATTOP[3]) * cosine(6.0)
                    + Expression::double(FLATTOP[4]) * cosine(8.0)
            }
        }
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|w| w.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::validation("window type", format!("unknown window '{s}'")))
    }
}

/// Window coefficients of a fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowComputation {
    window: WindowType,
    size: usize,
}

impl WindowComputation {
    /// A window of `size` points. Fails if `size < 2`.
    pub fn new(window: WindowType, size: usize) -> Result<Self> {
        window.check_size(size)?;
        Ok(Self { window, size })
    }

    /// The window function.
    pub fn window_type(&self) -> WindowType {
        self.window
    }

    /// Number of coefficients.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Kernel expression for coefficient `n`.
    pub fn coefficient_at(&self, n: &Expression) -> Expression {
        self.window.expression(n, self.size)
    }

    /// The window as a producer.
    pub fn producer(self) -> CollectionProducer {
        CollectionProducer::from_node(Arc::new(self))
    }
}

impl Computation for WindowComputation {
    fn name(&self) -> String {
        format!("window_{}", self.window)
    }

    fn shape(&self) -> Shape {
        Shape::vector(self.size)
    }

    fn inputs(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    fn generate(&self, _inputs: Vec<NodeRef>) -> NodeRef {
        Arc::new(*self)
    }

    fn is_traversable(&self) -> bool {
        true
    }

    fn value_at(&self, index: &Expression, _inputs: &[InputAccess]) -> Result<Expression> {
        Ok(self.coefficient_at(index))
    }
}

/// Producer of `size` coefficients of `window`.
pub fn window(window: WindowType, size: usize) -> Result<CollectionProducer> {
    Ok(WindowComputation::new(window, size)?.producer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Producer;

    fn evaluate(window: WindowType, size: usize) -> Vec<f64> {
        super::window(window, size)
            .unwrap()
            .evaluate(&[])
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_hann_endpoints_and_peak() {
        let w = evaluate(WindowType::Hann, 9);
        assert!(w[0].abs() < 1e-12);
        assert!(w[8].abs() < 1e-12);
        assert!((w[4] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_matches_host_formula() {
        for window in WindowType::ALL {
            let w = evaluate(window, 16);
            for (n, value) in w.iter().enumerate() {
                let expected = window.coefficient(n, 16).unwrap();
                assert!(
                    (value - expected).abs() < 1e-12,
                    "{window} coefficient {n}: {value} vs {expected}"
                );
            }
        }
    }

    #[test]
    fn test_windows_are_symmetric() {
        for window in WindowType::ALL {
            let w = evaluate(window, 11);
            for n in 0..11 {
                assert!((w[n] - w[10 - n]).abs() < 1e-12, "{window} at {n}");
            }
        }
    }

    #[test]
    fn test_bartlett_is_triangular() {
        let w = evaluate(WindowType::Bartlett, 5);
        assert_eq!(w, vec![0.0, 0.5, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_size_below_two_rejected() {
        assert!(WindowComputation::new(WindowType::Hann, 1).unwrap_err().is_validation());
        assert!(WindowComputation::new(WindowType::Hann, 0).is_err());
    }

    #[test]
    fn test_host_coefficient_checks_size_and_index() {
        for window in WindowType::ALL {
            assert!(window.coefficient(0, 0).unwrap_err().is_validation());
            assert!(window.coefficient(0, 1).unwrap_err().is_validation());
            assert!(window.coefficient(4, 4).unwrap_err().is_validation());
            assert!(window.coefficient(1, 2).unwrap().is_finite());
        }
        assert_eq!(WindowType::Bartlett.coefficient(0, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("HANN".parse::<WindowType>().unwrap(), WindowType::Hann);
        assert_eq!("flattop".parse::<WindowType>().unwrap(), WindowType::Flattop);
        assert!("kaiser".parse::<WindowType>().unwrap_err().is_validation());
    }
}
