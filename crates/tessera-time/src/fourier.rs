//! Batched complex Fourier transforms lowered to kernels.
//!
//! Input and output are interleaved complex collections of shape
//! `[count, size, 2]`; each of the `count` transforms runs in its own lane.
//! The transform is a decimation-in-time Cooley-Tukey recursion that takes a
//! radix-4 step whenever the current length is divisible by 4 and a radix-2
//! step otherwise.
//!
//! How the recursion reaches the kernel depends on the compile strategy:
//!
//! - [`CompilationStrategy::Recursive`] emits one self-recursive function
//!   taking the sub-transform length as a runtime parameter.
//! - [`CompilationStrategy::Unrolled`] expands the recursion while building the
//!   scope, producing nested straight-line blocks for the given size.
//!
//! The inverse transform scales by `1/N` in a separate pass over the lane's
//! output once the butterflies are done.

use std::f64::consts::PI;
use std::sync::Arc;

use tessera_core::{
    CallArgument, Cases, CollectionProducer, CompilationStrategy, Computation, Error, Expression,
    ExpressionType, KernelIo, KernelStructureContext, NodeRef, PackedCollection, Repeated, Result,
    Scope, Shape,
};

const FORWARD_FUNCTION: &str = "fft_radix_forward";
const INVERSE_FUNCTION: &str = "fft_radix_inverse";

/// `count` complex transforms of `size` points each.
#[derive(Debug, Clone)]
pub struct FourierTransform {
    input: NodeRef,
    count: usize,
    size: usize,
    inverse: bool,
}

impl FourierTransform {
    /// Transforms `input`, which holds interleaved complex values.
    ///
    /// `size` must be a power of two of at least 2. A fixed-count input must
    /// hold a whole number of `size`-point transforms; a variable-count input
    /// must have `2 * size` elements per group.
    pub fn new(size: usize, inverse: bool, input: NodeRef) -> Result<Self> {
        if size < 2 || !size.is_power_of_two() {
            return Err(Error::validation(
                "fourier transform",
                format!("size must be a power of two >= 2, got {size}"),
            ));
        }
        let shape = input.shape();
        let item = 2 * size;
        let count = if input.is_fixed_count() {
            if shape.size() % item != 0 {
                return Err(Error::validation(
                    "fourier transform",
                    format!(
                        "input '{}' {} is not a whole number of {size}-point transforms",
                        input.name(),
                        shape
                    ),
                ));
            }
            shape.size() / item
        } else {
            if shape.item_size() != item {
                return Err(Error::validation(
                    "fourier transform",
                    format!(
                        "variable input '{}' has {} elements per group, expected {item}",
                        input.name(),
                        shape.item_size()
                    ),
                ));
            }
            shape.count()
        };
        Ok(Self {
            input,
            count,
            size,
            inverse,
        })
    }

    /// Number of transforms (nominal for variable-count inputs).
    pub fn count(&self) -> usize {
        self.count
    }

    /// Points per transform.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this is the inverse transform.
    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    fn sign(&self) -> f64 {
        if self.inverse { 1.0 } else { -1.0 }
    }
}

/// Butterfly combination of sub-transforms already placed in `output`.
///
/// Offsets and lengths are in complex elements.
struct Butterfly<'a> {
    output: &'a str,
    offset: Expression,
    m: Expression,
    n: Expression,
    sign: f64,
}

impl Butterfly<'_> {
    fn load(&self, index: &Expression, part: i64) -> Expression {
        Expression::load(self.output, index.clone() * 2 + part)
    }

    fn store(&self, scope: &mut Scope, index: &Expression, re: Expression, im: Expression) {
        scope.store(self.output, index.clone() * 2, re);
        scope.store(self.output, index.clone() * 2 + 1, im);
    }

    fn angle(&self, k: &Expression) -> Expression {
        Expression::double(self.sign * 2.0 * PI) * k.clone().to_double()
            / self.n.clone().to_double()
    }

    /// `(re, im)` of `output[index] * e^(i * angle * q)`, declared under `name`.
    fn twiddled(
        &self,
        body: &mut Scope,
        name: &str,
        index: &Expression,
        angle: &Expression,
        q: f64,
    ) -> (Expression, Expression) {
        let wr = (angle.clone() * q).cos();
        let wi = (angle.clone() * q).sin();
        let xr = body.declare(format!("{name}_xr"), self.load(index, 0));
        let xi = body.declare(format!("{name}_xi"), self.load(index, 1));
        let re = body.declare(
            format!("{name}_r"),
            wr.clone() * xr.clone() - wi.clone() * xi.clone(),
        );
        let im = body.declare(format!("{name}_i"), wr * xi + wi * xr);
        (re, im)
    }

    fn radix2(&self) -> Repeated {
        let k = Expression::var("k", ExpressionType::Integer);
        let mut body = Scope::new("radix2");
        let angle = body.declare("angle", self.angle(&k));
        let top = body.declare("top", self.offset.clone() + k.clone());
        let bottom = body.declare("bottom", top.clone() + self.m.clone());
        let (tr, ti) = self.twiddled(&mut body, "b", &bottom, &angle, 1.0);
        let ar = body.declare("ar", self.load(&top, 0));
        let ai = body.declare("ai", self.load(&top, 1));
        self.store(&mut body, &top, ar.clone() + tr.clone(), ai.clone() + ti.clone());
        self.store(&mut body, &bottom, ar - tr, ai - ti);
        Repeated::range("k", self.m.clone(), body)
    }

    fn radix4(&self) -> Repeated {
        let k = Expression::var("k", ExpressionType::Integer);
        let s = self.sign;
        let mut body = Scope::new("radix4");
        let angle = body.declare("angle", self.angle(&k));
        let i0 = body.declare("i0", self.offset.clone() + k.clone());
        let i1 = body.declare("i1", i0.clone() + self.m.clone());
        let i2 = body.declare("i2", i1.clone() + self.m.clone());
        let i3 = body.declare("i3", i2.clone() + self.m.clone());
        let b0r = body.declare("b0_r", self.load(&i0, 0));
        let b0i = body.declare("b0_i", self.load(&i0, 1));
        let (b1r, b1i) = self.twiddled(&mut body, "b1", &i1, &angle, 1.0);
        let (b2r, b2i) = self.twiddled(&mut body, "b2", &i2, &angle, 2.0);
        let (b3r, b3i) = self.twiddled(&mut body, "b3", &i3, &angle, 3.0);

        // X[k + q*m] = sum_j (s*i)^(j*q) * b_j
        let x0r = b0r.clone() + b1r.clone() + b2r.clone() + b3r.clone();
        let x0i = b0i.clone() + b1i.clone() + b2i.clone() + b3i.clone();
        let x1r = b0r.clone() - b1i.clone() * s - b2r.clone() + b3i.clone() * s;
        let x1i = b0i.clone() + b1r.clone() * s - b2i.clone() - b3r.clone() * s;
        let x2r = b0r.clone() - b1r.clone() + b2r.clone() - b3r.clone();
        let x2i = b0i.clone() - b1i.clone() + b2i.clone() - b3i.clone();
        let x3r = b0r - b2r + b1i * s - b3i * s;
        let x3i = b0i - b2i - b1r * s + b3r * s;
        self.store(&mut body, &i0, x0r, x0i);
        self.store(&mut body, &i1, x1r, x1i);
        self.store(&mut body, &i2, x2r, x2i);
        self.store(&mut body, &i3, x3r, x3i);
        Repeated::range("k", self.m.clone(), body)
    }
}

fn copy_complex(scope: &mut Scope, input: &str, output: &str, from: &Expression, to: &Expression) {
    for part in 0..2i64 {
        scope.store(
            output,
            to.clone() * 2 + part,
            Expression::load(input, from.clone() * 2 + part),
        );
    }
}

/// The self-recursive transform function.
///
/// `fft(input, output, in_offset, stride, out_offset, n)` writes the
/// transform of `input[in_offset + j * stride]`, `j < n`, to
/// `output[out_offset..out_offset + n]`.
fn recursive_function(name: &str, sign: f64) -> Scope {
    let mut function = Scope::new(name);
    function.array_parameter("input");
    function.array_parameter("output");
    let in_offset = function.integer_parameter("in_offset");
    let stride = function.integer_parameter("stride");
    let out_offset = function.integer_parameter("out_offset");
    let n = function.integer_parameter("n");

    let recurse = |scope: &mut Scope,
                   from: Expression,
                   step: Expression,
                   to: Expression,
                   m: &Expression| {
        scope.call(
            name,
            vec![
                CallArgument::Array("input".into()),
                CallArgument::Array("output".into()),
                CallArgument::Value(from),
                CallArgument::Value(step),
                CallArgument::Value(to),
                CallArgument::Value(m.clone()),
            ],
        );
    };

    let mut leaf = Scope::new("leaf");
    copy_complex(&mut leaf, "input", "output", &in_offset, &out_offset);

    let mut radix4 = Scope::new("split4");
    let m = radix4.declare("m", n.clone() / 4);
    for j in 0..4i64 {
        recurse(
            &mut radix4,
            in_offset.clone() + stride.clone() * j,
            stride.clone() * 4,
            out_offset.clone() + m.clone() * j,
            &m,
        );
    }
    radix4.repeat(
        Butterfly {
            output: "output",
            offset: out_offset.clone(),
            m: m.clone(),
            n: n.clone(),
            sign,
        }
        .radix4(),
    );

    let mut radix2 = Scope::new("split2");
    let m = radix2.declare("m", n.clone() / 2);
    recurse(
        &mut radix2,
        in_offset.clone(),
        stride.clone() * 2,
        out_offset.clone(),
        &m,
    );
    recurse(
        &mut radix2,
        in_offset + stride.clone(),
        stride * 2,
        out_offset.clone() + m.clone(),
        &m,
    );
    radix2.repeat(
        Butterfly {
            output: "output",
            offset: out_offset,
            m,
            n: n.clone(),
            sign,
        }
        .radix2(),
    );

    function.cases(
        Cases::new()
            .case(n.clone().equal(1), leaf)
            .case((n % 4).equal(0), radix4)
            .otherwise(radix2),
    );
    function
}

/// Emits the recursion for a compile-time length `n` as nested blocks.
fn unrolled(
    scope: &mut Scope,
    io: (&str, &str),
    in_offset: &Expression,
    stride: usize,
    out_offset: &Expression,
    n: usize,
    sign: f64,
) {
    let (input, output) = io;
    if n == 1 {
        copy_complex(scope, input, output, in_offset, out_offset);
        return;
    }
    let radix = if n % 4 == 0 { 4 } else { 2 };
    let m = n / radix;
    for j in 0..radix {
        let mut stage = Scope::new(format!("stage_{n}_{j}"));
        unrolled(
            &mut stage,
            io,
            &(in_offset.clone() + stride * j),
            stride * radix,
            &(out_offset.clone() + m * j),
            m,
            sign,
        );
        scope.block(stage);
    }
    let butterfly = Butterfly {
        output,
        offset: out_offset.clone(),
        m: Expression::from(m),
        n: Expression::from(n),
        sign,
    };
    scope.repeat(if radix == 4 {
        butterfly.radix4()
    } else {
        butterfly.radix2()
    });
}

impl Computation for FourierTransform {
    fn name(&self) -> String {
        if self.inverse { "ifft" } else { "fft" }.into()
    }

    fn shape(&self) -> Shape {
        Shape::new([self.count, self.size, 2])
    }

    fn inputs(&self) -> Vec<NodeRef> {
        vec![Arc::clone(&self.input)]
    }

    fn generate(&self, inputs: Vec<NodeRef>) -> NodeRef {
        let input = inputs
            .into_iter()
            .next()
            .unwrap_or_else(|| Arc::clone(&self.input));
        Arc::new(Self {
            input,
            ..self.clone()
        })
    }

    fn aggregation_count(&self) -> u64 {
        self.size as u64
    }

    fn requires_array_inputs(&self) -> bool {
        true
    }

    fn scope(&self, ctx: &KernelStructureContext, io: &KernelIo) -> Result<Scope> {
        let input = io.array(0)?;
        let output = io.output.as_str();
        let mut scope = Scope::new(self.name());
        let base = scope.declare("base", ctx.kernel_index() * self.size);

        match ctx.strategy() {
            CompilationStrategy::Recursive => {
                let name = if self.inverse {
                    INVERSE_FUNCTION
                } else {
                    FORWARD_FUNCTION
                };
                scope.require(recursive_function(name, self.sign()));
                scope.call(
                    name,
                    vec![
                        CallArgument::Array(input.to_string()),
                        CallArgument::Array(output.to_string()),
                        CallArgument::Value(base.clone()),
                        CallArgument::Value(Expression::integer(1)),
                        CallArgument::Value(base.clone()),
                        CallArgument::Value(Expression::from(self.size)),
                    ],
                );
            }
            CompilationStrategy::Unrolled => {
                unrolled(
                    &mut scope,
                    (input, output),
                    &base,
                    1,
                    &base,
                    self.size,
                    self.sign(),
                );
            }
        }

        if self.inverse {
            let j = Expression::var("j", ExpressionType::Integer);
            let index = base * 2 + j;
            let mut body = Scope::new("normalize");
            body.store(
                output,
                index.clone(),
                Expression::load(output, index) / self.size as f64,
            );
            scope.repeat(Repeated::range("j", 2 * self.size, body));
        }

        tracing::debug!(
            "fourier: {} size={} strategy={} statements={}",
            self.name(),
            self.size,
            ctx.strategy().as_str(),
            scope.statement_count()
        );
        Ok(scope)
    }
}

fn transform(size: usize, inverse: bool, input: &CollectionProducer) -> Result<CollectionProducer> {
    let node = FourierTransform::new(size, inverse, Arc::clone(input.node()))?;
    Ok(CollectionProducer::from_node(Arc::new(node)).with_options(*input.options()))
}

/// Forward transform of `input` in `size`-point blocks.
pub fn fft(size: usize, input: &CollectionProducer) -> Result<CollectionProducer> {
    transform(size, false, input)
}

/// Inverse transform of `input` in `size`-point blocks, scaled by `1/size`.
pub fn ifft(size: usize, input: &CollectionProducer) -> Result<CollectionProducer> {
    transform(size, true, input)
}

/// Packs real samples as `[len, 2]` complex values with zero imaginary parts.
pub fn interleave(real: &[f64]) -> Result<PackedCollection> {
    let data = real.iter().flat_map(|&x| [x, 0.0]).collect();
    PackedCollection::from_vec(Shape::new([real.len(), 2]), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{CompileOptions, Producer};

    fn dft(input: &[f64], sign: f64) -> Vec<f64> {
        let n = input.len() / 2;
        let mut out = vec![0.0; input.len()];
        for k in 0..n {
            for j in 0..n {
                let angle = sign * 2.0 * PI * (j * k) as f64 / n as f64;
                let (re, im) = (input[2 * j], input[2 * j + 1]);
                out[2 * k] += re * angle.cos() - im * angle.sin();
                out[2 * k + 1] += re * angle.sin() + im * angle.cos();
            }
        }
        out
    }

    fn signal(n: usize) -> Vec<f64> {
        (0..2 * n).map(|i| ((i * 7 % 11) as f64 - 5.0) / 3.0).collect()
    }

    fn run(size: usize, strategy: CompilationStrategy, data: &[f64]) -> Vec<f64> {
        let x = CollectionProducer::argument(0, Shape::new([size, 2]))
            .with_options(CompileOptions::with_strategy(strategy));
        let out = fft(size, &x).unwrap();
        let input = PackedCollection::from_vec(Shape::new([size, 2]), data.to_vec()).unwrap();
        out.evaluate(&[input]).unwrap().to_vec()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < 1e-9, "element {i}: {a} vs {e}");
        }
    }

    #[test]
    fn test_matches_direct_dft() {
        for size in [2, 4, 8, 32] {
            let data = signal(size);
            let expected = dft(&data, -1.0);
            for strategy in CompilationStrategy::ALL {
                assert_close(&run(size, strategy, &data), &expected);
            }
        }
    }

    #[test]
    fn test_impulse_is_flat() {
        let mut data = vec![0.0; 16];
        data[0] = 1.0;
        let out = run(8, CompilationStrategy::Recursive, &data);
        for k in 0..8 {
            assert!((out[2 * k] - 1.0).abs() < 1e-12);
            assert!(out[2 * k + 1].abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_bad_sizes() {
        let x = CollectionProducer::argument(0, Shape::new([6, 2]));
        assert!(fft(6, &x).unwrap_err().is_validation());
        assert!(fft(1, &x).unwrap_err().is_validation());
        assert!(fft(4, &x).unwrap_err().is_validation());
    }

    #[test]
    fn test_batched_shape() {
        let x = CollectionProducer::argument(0, Shape::new([3, 8, 2]));
        let y = fft(8, &x).unwrap();
        assert_eq!(y.shape(), Shape::new([3, 8, 2]));
    }

    #[test]
    fn test_recursive_source_defines_function() {
        let x = CollectionProducer::argument(0, Shape::new([8, 2]));
        let source = fft(8, &x).unwrap().kernel_source().unwrap().unwrap();
        assert!(source.contains(FORWARD_FUNCTION));
        let unrolled = fft(8, &x.with_options(CompileOptions::with_strategy(
            CompilationStrategy::Unrolled,
        )))
        .unwrap()
        .kernel_source()
        .unwrap()
        .unwrap();
        assert!(!unrolled.contains(FORWARD_FUNCTION));
    }

    #[test]
    fn test_interleave() {
        let packed = interleave(&[1.0, 2.0]).unwrap();
        assert_eq!(packed.shape(), &Shape::new([2, 2]));
        assert_eq!(packed.to_vec(), vec![1.0, 0.0, 2.0, 0.0]);
    }
}
