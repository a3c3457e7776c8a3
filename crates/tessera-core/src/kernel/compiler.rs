//! Turning an entry scope into an executable kernel.

use std::fmt;

use crate::error::{Error, Result};
use crate::scope::{CLanguageWriter, CodePrintWriter, ParameterKind, Scope};

use super::context::CompileOptions;
use super::program::Program;

/// Compiles kernel scopes with a fixed set of options.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelCompiler {
    options: CompileOptions,
}

impl KernelCompiler {
    /// Compiler using `options`.
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Options this compiler applies.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compiles `entry` and every function it requires.
    ///
    /// The entry scope's parameters must all be arrays: the first is the
    /// output, the rest are inputs in order.
    pub fn compile(&self, entry: &Scope) -> Result<Kernel> {
        if entry.parameters().is_empty() {
            return Err(Error::validation(
                "kernel",
                format!("'{}' has no output parameter", entry.name()),
            ));
        }
        if let Some(p) = entry
            .parameters()
            .iter()
            .find(|p| p.kind != ParameterKind::Array)
        {
            return Err(Error::validation(
                "kernel",
                format!("entry parameter '{}' of '{}' is not an array", p.name, entry.name()),
            ));
        }

        let functions = entry.required_functions();
        let program = Program::lower(entry, &functions)?;
        let source = CLanguageWriter::new().print_program(entry);

        tracing::debug!(
            "kernel_compile: '{}' with {} functions, {} statements ({})",
            entry.name(),
            functions.len(),
            entry.statement_count(),
            self.options.strategy
        );

        Ok(Kernel {
            name: entry.name().to_string(),
            source,
            function_count: functions.len() + 1,
            program,
            max_call_depth: self.options.max_call_depth,
        })
    }
}

/// A compiled kernel: rendered source plus the lowered program that the host
/// executor runs.
#[derive(Clone)]
pub struct Kernel {
    name: String,
    source: String,
    function_count: usize,
    program: Program,
    max_call_depth: usize,
}

impl Kernel {
    /// Entry function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rendered kernel source, required functions first.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of functions in the kernel, the entry included.
    pub fn function_count(&self) -> usize {
        self.function_count
    }

    /// Number of input arrays the kernel expects.
    pub fn input_count(&self) -> usize {
        self.program.entry_arrays() - 1
    }

    /// Runs `lanes` lanes writing into `output`, returning it.
    pub fn execute(&self, output: Vec<f64>, inputs: Vec<Vec<f64>>, lanes: usize) -> Result<Vec<f64>> {
        let mut buffers = Vec::with_capacity(inputs.len() + 1);
        buffers.push(output);
        buffers.extend(inputs);
        let mut heap = self.program.run(buffers, lanes, self.max_call_depth)?;
        Ok(heap.swap_remove(0))
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.name)
            .field("functions", &self.function_count)
            .field("inputs", &self.input_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{CallArgument, Expression};

    fn offset_kernel() -> Scope {
        let mut add = Scope::new("add_one");
        add.array_parameter("out");
        add.array_parameter("src");
        let i = add.integer_parameter("i");
        add.store("out", i.clone(), Expression::load("src", i) + 1.0);

        let mut k = Scope::new("offset");
        k.array_parameter("output");
        k.array_parameter("input");
        k.call(
            "add_one",
            vec![
                CallArgument::Array("output".into()),
                CallArgument::Array("input".into()),
                CallArgument::Value(Expression::kernel_index()),
            ],
        );
        k.require(add);
        k
    }

    #[test]
    fn test_compile_and_execute() {
        let kernel = KernelCompiler::default().compile(&offset_kernel()).unwrap();
        assert_eq!(kernel.name(), "offset");
        assert_eq!(kernel.function_count(), 2);
        assert_eq!(kernel.input_count(), 1);
        assert!(kernel.source().contains("__kernel void offset("));
        let out = kernel
            .execute(vec![0.0; 3], vec![vec![1.0, 2.0, 3.0]], 3)
            .unwrap();
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_rejects_scalar_entry_parameter() {
        let mut k = Scope::new("k");
        k.array_parameter("output");
        k.integer_parameter("n");
        assert!(KernelCompiler::default().compile(&k).unwrap_err().is_validation());
    }

    #[test]
    fn test_rejects_missing_output() {
        assert!(KernelCompiler::default().compile(&Scope::new("k")).is_err());
    }
}
