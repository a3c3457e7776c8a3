//! Centered FIR filtering of a series.

use std::sync::Arc;

use tessera_core::{
    Cases, CollectionProducer, Computation, Error, Expression, ExpressionType,
    KernelIo, KernelStructureContext, NodeRef, Repeated, Result, Scope, Shape,
};

/// FIR filter of order `coefficients - 1`, centered on each output sample.
///
/// Output sample `k` is `sum(series[k + i - order/2] * c[i])` for
/// `i in 0..=order`, skipping taps that fall outside the series. Coefficients
/// are either shared (`[order + 1]`) or given per output sample
/// (`[len, order + 1]`).
#[derive(Debug, Clone)]
pub struct MultiOrderFilter {
    series: NodeRef,
    coefficients: NodeRef,
    order: usize,
    per_sample: bool,
}

impl MultiOrderFilter {
    /// Filters `series` with `coefficients`.
    ///
    /// Fails if either input has at most one element, or if per-sample
    /// coefficients do not have one row per series element.
    pub fn new(series: NodeRef, coefficients: NodeRef) -> Result<Self> {
        let series_shape = series.shape();
        let coefficient_shape = coefficients.shape();
        if series_shape.size() <= 1 {
            return Err(Error::validation(
                "multi-order filter",
                format!("series '{}' needs more than one element", series.name()),
            ));
        }
        if coefficient_shape.size() <= 1 {
            return Err(Error::validation(
                "multi-order filter",
                format!(
                    "coefficients '{}' need more than one element",
                    coefficients.name()
                ),
            ));
        }
        let per_sample = coefficient_shape.dims().len() > 1;
        let taps = if per_sample {
            if coefficient_shape.count() != series_shape.size() {
                return Err(Error::validation(
                    "multi-order filter",
                    format!(
                        "{} coefficient rows for {} series elements",
                        coefficient_shape.count(),
                        series_shape.size()
                    ),
                ));
            }
            coefficient_shape.item_size()
        } else {
            coefficient_shape.size()
        };
        Ok(Self {
            series,
            coefficients,
            order: taps - 1,
            per_sample,
        })
    }

    /// Filter order (taps - 1).
    pub fn order(&self) -> usize {
        self.order
    }
}

impl Computation for MultiOrderFilter {
    fn name(&self) -> String {
        "multi_order_filter".into()
    }

    fn shape(&self) -> Shape {
        Shape::vector(self.series.shape().size())
    }

    fn inputs(&self) -> Vec<NodeRef> {
        vec![Arc::clone(&self.series), Arc::clone(&self.coefficients)]
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        let mut inputs = inputs.into_iter();
        Arc::new(Self {
            series: inputs.next().unwrap_or_else(|| Arc::clone(&self.series)),
            coefficients: inputs
                .next()
                .unwrap_or_else(|| Arc::clone(&self.coefficients)),
            ..self.clone()
        })
    }

    fn aggregation_count(&self) -> u64 {
        self.order as u64 + 1
    }

    fn requires_array_inputs(&self) -> bool {
        true
    }

    fn scope(&self, ctx: &KernelStructureContext, io: &KernelIo) -> Result<Scope> {
        let (series, coefficients) = (io.array(0)?, io.array(1)?);
        let kernel = ctx.kernel_index();
        let i = Expression::var("i", ExpressionType::Integer);
        let mut scope = Scope::new("multi_order_filter");
        let result = scope.declare("result", 0.0);

        let mut tap = Scope::new("tap");
        let index = tap.declare(
            "index",
            kernel.clone() + i.clone() - (self.order / 2) as i64,
        );
        let coefficient = if self.per_sample {
            Expression::load(coefficients, kernel.clone() * (self.order + 1) + i)
        } else {
            Expression::load(coefficients, i)
        };
        let mut accumulate = Scope::new("accumulate");
        accumulate.assign(
            "result",
            result.clone() + Expression::load(series, index.clone()) * coefficient,
        );
        tap.cases(Cases::new().case(
            index
                .clone()
                .greater_or_equal(0)
                .and(index.less_than(Expression::length(series))),
            accumulate,
        ));
        scope.repeat(Repeated::range("i", self.order + 1, tap));
        scope.store(io.output.clone(), kernel, result);
        Ok(scope)
    }
}

/// Filters `series` with shared or per-sample `coefficients`.
pub fn multi_order_filter(
    series: &CollectionProducer,
    coefficients: &CollectionProducer,
) -> Result<CollectionProducer> {
    let node = MultiOrderFilter::new(
        Arc::clone(series.node()),
        Arc::clone(coefficients.node()),
    )?;
    Ok(CollectionProducer::from_node(Arc::new(node)).with_options(*series.options()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{PackedCollection, Producer};

    fn provider(values: &[f64]) -> CollectionProducer {
        CollectionProducer::provider(PackedCollection::from_slice(values))
    }

    #[test]
    fn test_moving_average() {
        let series = provider(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let taps = provider(&[1.0 / 3.0; 3]);
        let out = multi_order_filter(&series, &taps)
            .unwrap()
            .evaluate(&[])
            .unwrap()
            .to_vec();
        let expected = [1.0, 2.0, 3.0, 4.0, 3.0];
        for (a, e) in out.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{a} vs {e}");
        }
    }

    #[test]
    fn test_identity_taps() {
        let series = provider(&[0.5, -1.0, 2.0, 7.0]);
        let taps = provider(&[0.0, 1.0, 0.0]);
        let out = multi_order_filter(&series, &taps).unwrap().evaluate(&[]).unwrap();
        assert_eq!(out.to_vec(), vec![0.5, -1.0, 2.0, 7.0]);
    }

    #[test]
    fn test_per_sample_coefficients() {
        let series = provider(&[1.0, 2.0, 3.0]);
        let rows = PackedCollection::from_vec(
            Shape::new([3, 2]),
            vec![1.0, 0.0, 0.0, 1.0, 2.0, 2.0],
        )
        .unwrap();
        let out = multi_order_filter(&series, &CollectionProducer::provider(rows))
            .unwrap()
            .evaluate(&[])
            .unwrap();
        // order 1, centered at i - 0: taps at k and k + 1
        assert_eq!(out.to_vec(), vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn test_rejects_single_elements() {
        let one = provider(&[1.0]);
        let two = provider(&[1.0, 2.0]);
        assert!(multi_order_filter(&one, &two).unwrap_err().is_validation());
        assert!(multi_order_filter(&two, &one).unwrap_err().is_validation());
    }
}
