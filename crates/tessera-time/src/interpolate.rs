//! Linear interpolation of a sampled series at arbitrary times.

use std::sync::Arc;

use tessera_core::{
    Cases, CollectionProducer, Computation, Error, Expression, KernelIo, KernelStructureContext,
    NodeRef, Result, Scope, Shape,
};

/// Reads `series` at position `time * rate` for every element of `time`.
///
/// Positions between samples are interpolated linearly; positions before the
/// first or after the last sample read as 0.
#[derive(Debug, Clone)]
pub struct Interpolate {
    series: NodeRef,
    time: NodeRef,
    rate: f64,
}

impl Interpolate {
    /// Interpolates `series`, sampled at `rate` samples per time unit.
    pub fn new(series: NodeRef, time: NodeRef, rate: f64) -> Result<Self> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::validation(
                "interpolate",
                format!("rate must be positive and finite, got {rate}"),
            ));
        }
        if series.shape().size() == 0 {
            return Err(Error::validation("interpolate", "series is empty"));
        }
        Ok(Self { series, time, rate })
    }

    /// Samples per time unit.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Computation for Interpolate {
    fn name(&self) -> String {
        "interpolate".into()
    }

    fn shape(&self) -> Shape {
        self.time.shape()
    }

    fn inputs(&self) -> Vec<NodeRef> {
        vec![Arc::clone(&self.series), Arc::clone(&self.time)]
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        let mut inputs = inputs.into_iter();
        Arc::new(Self {
            series: inputs.next().unwrap_or_else(|| Arc::clone(&self.series)),
            time: inputs.next().unwrap_or_else(|| Arc::clone(&self.time)),
            rate: self.rate,
        })
    }

    fn dynamic_source(&self) -> Option<(usize, usize)> {
        self.time.dynamic_source()
    }

    fn aggregation_count(&self) -> u64 {
        2
    }

    fn requires_array_inputs(&self) -> bool {
        true
    }

    fn scope(&self, ctx: &KernelStructureContext, io: &KernelIo) -> Result<Scope> {
        let (series, time) = (io.array(0)?, io.array(1)?);
        let kernel = ctx.kernel_index();
        let mut scope = Scope::new("interpolate");
        let position = scope.declare(
            "position",
            Expression::load(time, kernel.clone()) * self.rate,
        );
        let left = scope.declare("left", position.clone().floor().to_integer());
        let fraction = scope.declare("fraction", position.clone() - left.clone().to_double());
        let last = scope.declare("last", Expression::length(series) - 1);
        let result = scope.declare("result", 0.0);

        let mut between = Scope::new("between");
        let a = Expression::load(series, left.clone());
        let b = Expression::load(series, left.clone() + 1);
        between.assign("result", a.clone() + fraction * (b - a));

        let mut at_end = Scope::new("at_end");
        at_end.assign("result", Expression::load(series, last.clone()));

        scope.cases(
            Cases::new()
                .case(
                    position
                        .clone()
                        .greater_or_equal(0.0)
                        .and(left.clone().less_than(last.clone())),
                    between,
                )
                .case(position.equal(last.to_double()), at_end),
        );
        scope.store(io.output.clone(), kernel, result);
        Ok(scope)
    }
}

/// Interpolates `series` (sampled at `rate`) at each value of `time`.
pub fn interpolate(
    series: &CollectionProducer,
    time: &CollectionProducer,
    rate: f64,
) -> Result<CollectionProducer> {
    let node = Interpolate::new(Arc::clone(series.node()), Arc::clone(time.node()), rate)?;
    Ok(CollectionProducer::from_node(Arc::new(node)).with_options(*series.options()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{PackedCollection, Producer};

    fn run(series: &[f64], times: &[f64], rate: f64) -> Vec<f64> {
        let s = CollectionProducer::provider(PackedCollection::from_slice(series));
        let t = CollectionProducer::argument(0, Shape::vector(times.len()));
        interpolate(&s, &t, rate)
            .unwrap()
            .evaluate(&[PackedCollection::from_slice(times)])
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_midpoints() {
        let out = run(&[0.0, 10.0, 20.0], &[0.0, 0.5, 1.25, 2.0], 1.0);
        assert_eq!(out, vec![0.0, 5.0, 12.5, 20.0]);
    }

    #[test]
    fn test_rate_scales_time() {
        let out = run(&[0.0, 1.0, 4.0, 9.0], &[0.5, 1.0], 2.0);
        assert_eq!(out, vec![1.0, 4.0]);
    }

    #[test]
    fn test_outside_is_zero() {
        let out = run(&[3.0, 4.0], &[-0.5, 1.5, 7.0], 1.0);
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_variable_time_count() {
        let s = CollectionProducer::provider(PackedCollection::from_slice(&[0.0, 2.0]));
        let t = CollectionProducer::variable_argument(0, 1).unwrap();
        let y = interpolate(&s, &t, 1.0).unwrap();
        let out = y
            .evaluate(&[PackedCollection::from_slice(&[0.25, 0.5, 0.75])])
            .unwrap();
        assert_eq!(out.to_vec(), vec![0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_rejects_bad_rate() {
        let s = CollectionProducer::provider(PackedCollection::from_slice(&[1.0]));
        let t = CollectionProducer::argument(0, Shape::vector(1));
        assert!(interpolate(&s, &t, 0.0).unwrap_err().is_validation());
        assert!(interpolate(&s, &t, f64::NAN).unwrap_err().is_validation());
    }
}
