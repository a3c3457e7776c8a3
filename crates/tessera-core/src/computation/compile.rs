//! Compiling computation trees into evaluables.
//!
//! Each non-inlined node becomes one kernel. The kernel's array parameters are
//! the output followed by one slot per distinct non-inlined input; a slot is
//! filled from an evaluation argument, a fixed collection or the result of a
//! nested compiled computation. Slots are deduplicated by node identity within
//! a kernel, and every evaluation carries a result memo that nested and
//! isolated kernels share, so a shared subtree or producer runs once per
//! evaluation no matter how often, or under how many kernels, it is used.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::collect::{PackedCollection, Shape};
use crate::error::{Error, Result};
use crate::kernel::{
    CompileOptions, Kernel, KernelCompiler, KernelSizing, KernelStructureContext,
};
use crate::relation::{Evaluable, EvaluableRef, Multiple};
use crate::scope::{Parameter, ParameterKind};

use super::{Binding, Computation, InputAccess, KernelIo, NodeRef, identifier, node_id};

const OUTPUT: &str = "output";

fn slot_name(slot: usize) -> String {
    format!("arg{slot}")
}

/// Expected length of one positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgumentSpec {
    Fixed(usize),
    Variable(usize),
}

/// Positional arguments a tree reads, gathered over every node.
#[derive(Debug, Clone, Default)]
struct Signature {
    count: usize,
    specs: BTreeMap<usize, ArgumentSpec>,
}

impl Signature {
    fn collect(root: &NodeRef) -> Result<Self> {
        let mut signature = Self::default();
        let mut seen = HashSet::new();
        let mut stack = vec![Arc::clone(root)];
        while let Some(node) = stack.pop() {
            if !seen.insert(node_id(&node)) {
                continue;
            }
            if let Binding::Input(index) = node.binding() {
                let spec = if node.is_fixed_count() {
                    ArgumentSpec::Fixed(node.shape().size())
                } else {
                    ArgumentSpec::Variable(node.shape().item_size())
                };
                if let Some(existing) = signature.specs.insert(index, spec) {
                    if existing != spec {
                        return Err(Error::validation(
                            "arguments",
                            format!("argument {index} is used as both {existing:?} and {spec:?}"),
                        ));
                    }
                }
                signature.count = signature.count.max(index + 1);
            }
            stack.extend(node.inputs());
        }
        Ok(signature)
    }

    fn check(&self, args: &[PackedCollection]) -> Result<()> {
        if args.len() != self.count {
            return Err(Error::ArgumentCount {
                expected: self.count,
                actual: args.len(),
            });
        }
        for (&index, spec) in &self.specs {
            let actual = args[index].len();
            match *spec {
                ArgumentSpec::Fixed(expected) if actual != expected => {
                    return Err(Error::ArgumentSize {
                        index,
                        expected,
                        actual,
                    });
                }
                ArgumentSpec::Variable(item) if actual % item != 0 => {
                    return Err(Error::ArgumentSize {
                        index,
                        expected: (actual / item + 1) * item,
                        actual,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn argument(args: &[PackedCollection], index: usize) -> Result<&PackedCollection> {
    args.get(index).ok_or(Error::ArgumentCount {
        expected: index + 1,
        actual: args.len(),
    })
}

/// Values produced so far in one evaluation, keyed by node identity.
type Results = HashMap<usize, PackedCollection>;

/// Identity under which a node's value is memoized.
///
/// An isolation wrapper computes exactly what it wraps, so both share a key.
fn result_key(node: &NodeRef) -> usize {
    match node.binding() {
        Binding::Isolated(inner) => node_id(&inner),
        _ => node_id(node),
    }
}

/// Where a kernel slot's buffer comes from.
enum SlotSource {
    Input(usize),
    Provider(PackedCollection),
    Producer {
        key: usize,
        evaluable: EvaluableRef<PackedCollection>,
    },
    Nested {
        key: usize,
        compiled: Box<CompiledComputation>,
    },
}

impl SlotSource {
    fn buffer(&self, args: &[PackedCollection], results: &mut Results) -> Result<Vec<f64>> {
        match self {
            Self::Input(index) => Ok(argument(args, *index)?.to_vec()),
            Self::Provider(value) => Ok(value.to_vec()),
            Self::Producer { key, evaluable } => {
                if let Some(done) = results.get(key) {
                    return Ok(done.to_vec());
                }
                let value = evaluable.evaluate(args)?;
                let buffer = value.to_vec();
                results.insert(*key, value);
                Ok(buffer)
            }
            Self::Nested { key, compiled } => {
                if let Some(done) = results.get(key) {
                    return Ok(done.to_vec());
                }
                let value = compiled.run(args, results)?;
                let buffer = value.to_vec();
                results.insert(*key, value);
                Ok(buffer)
            }
        }
    }
}

struct SlotTable<'a> {
    options: &'a CompileOptions,
    sources: Vec<SlotSource>,
    slots: HashMap<usize, usize>,
}

impl SlotTable<'_> {
    fn access(&mut self, node: &NodeRef, parent_requires_arrays: bool) -> Result<InputAccess> {
        if !parent_requires_arrays
            && node.is_traversable()
            && matches!(node.binding(), Binding::Computed)
        {
            let arrays = node.requires_array_inputs();
            let inputs = node
                .inputs()
                .iter()
                .map(|input| self.access(input, arrays))
                .collect::<Result<Vec<_>>>()?;
            return Ok(InputAccess::Inline {
                node: Arc::clone(node),
                inputs,
            });
        }

        let id = node_id(node);
        if let Some(&slot) = self.slots.get(&id) {
            return Ok(InputAccess::Array {
                name: slot_name(slot),
            });
        }
        let source = match node.binding() {
            Binding::Input(index) => SlotSource::Input(index),
            Binding::Data(value) => SlotSource::Provider(value),
            Binding::Producer(producer) => SlotSource::Producer {
                key: result_key(node),
                evaluable: producer.get()?,
            },
            Binding::Isolated(_) | Binding::Computed => SlotSource::Nested {
                key: result_key(node),
                compiled: Box::new(CompiledComputation::nested(node, self.options)?),
            },
        };
        let slot = self.sources.len();
        self.sources.push(source);
        self.slots.insert(id, slot);
        Ok(InputAccess::Array {
            name: slot_name(slot),
        })
    }
}

/// A kernel plus everything needed to launch it.
struct Launch {
    kernel: Kernel,
    sources: Vec<SlotSource>,
    sizing: KernelSizing,
    shape: Shape,
}

impl Launch {
    fn build(node: &NodeRef, options: &CompileOptions) -> Result<Self> {
        let mut table = SlotTable {
            options,
            sources: Vec::new(),
            slots: HashMap::new(),
        };
        let arrays = node.requires_array_inputs();
        let inputs = node
            .inputs()
            .iter()
            .map(|input| table.access(input, arrays))
            .collect::<Result<Vec<_>>>()?;

        let shape = node.shape();
        let sizing = if node.is_fixed_count() {
            KernelSizing::Fixed(shape.count())
        } else {
            let (argument, item_size) = node.dynamic_source().ok_or_else(|| {
                Error::validation(
                    node.name(),
                    "variable count without an argument to size it from",
                )
            })?;
            KernelSizing::Variable {
                argument,
                item_size,
            }
        };

        let ctx = KernelStructureContext::new(*options, sizing);
        let io = KernelIo {
            output: OUTPUT.into(),
            inputs,
        };
        let mut scope = node.scope(&ctx, &io)?;
        scope.set_name(format!("{}_kernel", identifier(&node.name())));
        let mut parameters = vec![Parameter {
            name: OUTPUT.into(),
            kind: ParameterKind::Array,
        }];
        parameters.extend((0..table.sources.len()).map(|slot| Parameter {
            name: slot_name(slot),
            kind: ParameterKind::Array,
        }));
        scope.set_parameters(parameters);

        let kernel = KernelCompiler::new(*options).compile(&scope)?;
        tracing::debug!(
            "compile: '{}' {} -> {} slots, {:?}",
            node.name(),
            shape,
            table.sources.len(),
            sizing
        );
        Ok(Self {
            kernel,
            sources: table.sources,
            sizing,
            shape,
        })
    }

    fn run(&self, args: &[PackedCollection], results: &mut Results) -> Result<PackedCollection> {
        let (lanes, shape) = match self.sizing {
            KernelSizing::Fixed(lanes) => (lanes, self.shape.clone()),
            KernelSizing::Variable {
                argument: index,
                item_size,
            } => {
                let lanes = argument(args, index)?.len() / item_size;
                (lanes, self.shape.with_count(lanes))
            }
        };
        let inputs = self
            .sources
            .iter()
            .map(|source| source.buffer(args, results))
            .collect::<Result<Vec<_>>>()?;
        let output = self.kernel.execute(vec![0.0; shape.size()], inputs, lanes)?;
        PackedCollection::from_vec(shape, output)
    }
}

enum Body {
    Input(usize),
    Fixed(PackedCollection),
    Evaluable(EvaluableRef<PackedCollection>),
    Kernel(Box<Launch>),
}

impl Body {
    fn build(node: &NodeRef, options: &CompileOptions) -> Result<Self> {
        Ok(match node.binding() {
            Binding::Input(index) => Self::Input(index),
            Binding::Data(value) => Self::Fixed(value),
            Binding::Producer(producer) => Self::Evaluable(producer.get()?),
            Binding::Isolated(inner) => Self::build(&inner, options)?,
            Binding::Computed => Self::Kernel(Box::new(Launch::build(node, options)?)),
        })
    }
}

/// A compiled computation tree.
pub(crate) struct CompiledComputation {
    name: String,
    shape: Shape,
    fixed: bool,
    signature: Option<Signature>,
    body: Body,
}

impl CompiledComputation {
    /// Compiles `root` as a top-level evaluable that checks its arguments.
    pub(crate) fn root(root: &NodeRef, options: &CompileOptions) -> Result<Self> {
        let signature = Signature::collect(root)?;
        let mut compiled = Self::nested(root, options)?;
        tracing::debug!(
            "compile: '{}' ready, {} arguments",
            compiled.name,
            signature.count
        );
        compiled.signature = Some(signature);
        Ok(compiled)
    }

    fn nested(node: &NodeRef, options: &CompileOptions) -> Result<Self> {
        Ok(Self {
            name: node.name(),
            shape: node.shape(),
            fixed: node.is_fixed_count(),
            signature: None,
            body: Body::build(node, options)?,
        })
    }

    fn run(&self, args: &[PackedCollection], results: &mut Results) -> Result<PackedCollection> {
        match &self.body {
            Body::Input(index) => Ok(argument(args, *index)?.clone()),
            Body::Fixed(value) => Ok(value.clone()),
            Body::Evaluable(evaluable) => evaluable.evaluate(args),
            Body::Kernel(launch) => launch.run(args, results),
        }
    }

    /// Rendered kernel source, if the root compiled to a kernel.
    pub(crate) fn source(&self) -> Option<&str> {
        match &self.body {
            Body::Kernel(launch) => Some(launch.kernel.source()),
            _ => None,
        }
    }
}

impl Evaluable<PackedCollection> for CompiledComputation {
    fn evaluate(&self, args: &[PackedCollection]) -> Result<PackedCollection> {
        if let Some(signature) = &self.signature {
            signature.check(args)?;
        }
        self.run(args, &mut Results::new())
    }

    fn create_destination(&self, size: usize) -> Result<Multiple<PackedCollection>> {
        if !self.fixed {
            return Err(Error::unsupported(format!(
                "create_destination on variable-count '{}'",
                self.name
            )));
        }
        let whole = PackedCollection::new(self.shape.batched(size));
        let item = self.shape.size();
        let views = (0..size)
            .map(|i| whole.range(i * item, self.shape.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Multiple::new(views))
    }
}

/// Writes the results of `inner` into a caller-supplied collection.
pub(crate) struct IntoDestination {
    inner: EvaluableRef<PackedCollection>,
    destination: PackedCollection,
}

impl IntoDestination {
    pub(crate) fn new(inner: EvaluableRef<PackedCollection>, destination: PackedCollection) -> Self {
        Self { inner, destination }
    }
}

impl Evaluable<PackedCollection> for IntoDestination {
    fn evaluate(&self, args: &[PackedCollection]) -> Result<PackedCollection> {
        let result = self.inner.evaluate(args)?;
        self.destination.write(&result.to_vec())?;
        Ok(self.destination.clone())
    }

    fn create_destination(&self, size: usize) -> Result<Multiple<PackedCollection>> {
        self.inner.create_destination(size)
    }
}
