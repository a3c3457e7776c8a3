//! Rendering scopes to kernel source.

use std::fmt::Write as _;

use super::expression::{BinaryOp, Expression, ExpressionType, UnaryOp};
use super::statement::{CallArgument, Parameter, ParameterKind, Scope, Statement};

/// Renders IR into the source text of some kernel language.
///
/// Implementations supply the per-construct syntax. The provided
/// [`print_program`](CodePrintWriter::print_program) fixes the emission
/// order so that every required function precedes its callers.
pub trait CodePrintWriter {
    /// Emits a helper function.
    fn print_function(&mut self, scope: &Scope);

    /// Emits the kernel entry point.
    fn print_kernel(&mut self, scope: &Scope);

    /// Takes the accumulated source.
    fn finish(&mut self) -> String;

    /// Emits every required function of `entry`, then `entry` itself.
    fn print_program(&mut self, entry: &Scope) -> String {
        for function in entry.required_functions() {
            self.print_function(function);
        }
        self.print_kernel(entry);
        self.finish()
    }
}

/// Writer for a C-family kernel language (OpenCL C flavored).
///
/// Array parameters carry an extra `<name>_len` integer so that
/// [`Expression::Length`] has something to render to.
#[derive(Debug, Default)]
pub struct CLanguageWriter {
    out: String,
    indent: usize,
}

impl CLanguageWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn signature(parameters: &[Parameter]) -> String {
        let mut parts = Vec::new();
        for p in parameters {
            match p.kind {
                ParameterKind::Array => {
                    parts.push(format!("__global double *{}", p.name));
                    parts.push(format!("const int {}_len", p.name));
                }
                ParameterKind::Integer => parts.push(format!("const int {}", p.name)),
                ParameterKind::Double => parts.push(format!("const double {}", p.name)),
            }
        }
        parts.join(", ")
    }

    fn body(&mut self, scope: &Scope) {
        for statement in scope.statements() {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Declare { name, ty, value } => {
                let text = format!("{} {name} = {};", c_type(*ty), render(value));
                self.line(&text);
            }
            Statement::Assign { name, value } => {
                self.line(&format!("{name} = {};", render(value)));
            }
            Statement::Store {
                array,
                index,
                value,
            } => {
                self.line(&format!("{array}[{}] = {};", render(index), render(value)));
            }
            Statement::DeclareArray { name, size } => {
                let size = render(size);
                self.line(&format!("double {name}[{size}] = {{0}};"));
                self.line(&format!("const int {name}_len = {size};"));
            }
            Statement::Call {
                function,
                arguments,
            } => {
                let args: Vec<String> = arguments
                    .iter()
                    .map(|a| match a {
                        CallArgument::Array(name) => format!("{name}, {name}_len"),
                        CallArgument::Value(e) => render(e),
                    })
                    .collect();
                self.line(&format!("{function}({});", args.join(", ")));
            }
            Statement::Block(scope) => {
                self.line("{");
                self.indent += 1;
                self.body(scope);
                self.indent -= 1;
                self.line("}");
            }
            Statement::Cases(cases) => {
                for (i, (condition, scope)) in cases.branches().iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "} else if" };
                    self.line(&format!("{keyword} ({}) {{", render(condition)));
                    self.indent += 1;
                    self.body(scope);
                    self.indent -= 1;
                }
                match (cases.branches().is_empty(), cases.default_branch()) {
                    (true, Some(scope)) => {
                        self.line("{");
                        self.indent += 1;
                        self.body(scope);
                        self.indent -= 1;
                        self.line("}");
                    }
                    (false, Some(scope)) => {
                        self.line("} else {");
                        self.indent += 1;
                        self.body(scope);
                        self.indent -= 1;
                        self.line("}");
                    }
                    (false, None) => self.line("}"),
                    (true, None) => {}
                }
            }
            Statement::Repeated(r) => {
                self.line(&format!(
                    "for (int {i} = {}; {}; {i} += {}) {{",
                    render(&r.initial),
                    render(&r.condition),
                    render(&r.interval),
                    i = r.index
                ));
                self.indent += 1;
                self.body(&r.body);
                self.indent -= 1;
                self.line("}");
            }
        }
    }
}

impl CodePrintWriter for CLanguageWriter {
    fn print_function(&mut self, scope: &Scope) {
        let header = format!(
            "void {}({}) {{",
            scope.name(),
            Self::signature(scope.parameters())
        );
        self.line(&header);
        self.indent += 1;
        self.body(scope);
        self.indent -= 1;
        self.line("}");
        self.line("");
    }

    fn print_kernel(&mut self, scope: &Scope) {
        let header = format!(
            "__kernel void {}({}) {{",
            scope.name(),
            Self::signature(scope.parameters())
        );
        self.line(&header);
        self.indent += 1;
        self.line("const int kernel_index = get_global_id(0);");
        self.body(scope);
        self.indent -= 1;
        self.line("}");
    }

    fn finish(&mut self) -> String {
        std::mem::take(&mut self.out)
    }
}

fn c_type(ty: ExpressionType) -> &'static str {
    match ty {
        ExpressionType::Double => "double",
        ExpressionType::Integer => "int",
        ExpressionType::Boolean => "bool",
    }
}

/// Renders an expression in C syntax.
pub fn render(expression: &Expression) -> String {
    let mut out = String::new();
    render_into(expression, &mut out);
    out
}

fn render_into(expression: &Expression, out: &mut String) {
    match expression {
        Expression::Double(v) => {
            if v.is_nan() {
                out.push_str("NAN");
            } else if v.is_infinite() {
                out.push_str(if *v > 0.0 { "INFINITY" } else { "-INFINITY" });
            } else {
                let _ = write!(out, "{v:?}");
            }
        }
        Expression::Integer(v) => {
            let _ = write!(out, "{v}");
        }
        Expression::Boolean(v) => out.push_str(if *v { "true" } else { "false" }),
        Expression::Variable { name, .. } => out.push_str(name),
        Expression::KernelIndex => out.push_str("kernel_index"),
        Expression::Load { array, index } => {
            out.push_str(array);
            out.push('[');
            render_into(index, out);
            out.push(']');
        }
        Expression::Length(array) => {
            let _ = write!(out, "{array}_len");
        }
        Expression::Unary { op, operand } => {
            let integer = operand.ty() == ExpressionType::Integer;
            let prefix = match op {
                UnaryOp::Neg => "-(",
                UnaryOp::Not => "!(",
                UnaryOp::Abs if integer => "abs(",
                UnaryOp::Abs => "fabs(",
                UnaryOp::Floor => "floor(",
                UnaryOp::Sqrt => "sqrt(",
                UnaryOp::Exp => "exp(",
                UnaryOp::Sin => "sin(",
                UnaryOp::Cos => "cos(",
                UnaryOp::ToDouble => "(double) (",
                UnaryOp::ToInteger => "(int) (",
            };
            out.push_str(prefix);
            render_into(operand, out);
            out.push(')');
        }
        Expression::Binary { op, left, right } => {
            let integer =
                left.ty() == ExpressionType::Integer && right.ty() == ExpressionType::Integer;
            let function = match op {
                BinaryOp::Mod if !integer => Some("fmod"),
                BinaryOp::Min if integer => Some("min"),
                BinaryOp::Min => Some("fmin"),
                BinaryOp::Max if integer => Some("max"),
                BinaryOp::Max => Some("fmax"),
                _ => None,
            };
            if let Some(function) = function {
                out.push_str(function);
                out.push('(');
                render_into(left, out);
                out.push_str(", ");
                render_into(right, out);
                out.push(')');
                return;
            }
            let symbol = match op {
                BinaryOp::Add => "+",
                BinaryOp::Sub => "-",
                BinaryOp::Mul => "*",
                BinaryOp::Div => "/",
                BinaryOp::Mod => "%",
                BinaryOp::Eq => "==",
                BinaryOp::Ne => "!=",
                BinaryOp::Lt => "<",
                BinaryOp::Le => "<=",
                BinaryOp::Gt => ">",
                BinaryOp::Ge => ">=",
                BinaryOp::And => "&&",
                BinaryOp::Or => "||",
                BinaryOp::Min | BinaryOp::Max => unreachable!("rendered as functions"),
            };
            out.push('(');
            render_into(left, out);
            let _ = write!(out, " {symbol} ");
            render_into(right, out);
            out.push(')');
        }
        Expression::Conditional {
            condition,
            then,
            otherwise,
        } => {
            out.push('(');
            render_into(condition, out);
            out.push_str(" ? ");
            render_into(then, out);
            out.push_str(" : ");
            render_into(otherwise, out);
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Cases, Repeated};

    #[test]
    fn test_render_expression() {
        let k = Expression::kernel_index();
        let e = Expression::load("input", k.clone() * 2) + 1.5;
        assert_eq!(render(&e), "(input[(kernel_index * 2)] + 1.5)");
        assert_eq!(render(&Expression::double(2.0)), "2.0");
        assert_eq!(render(&k.clone().to_double().cos()), "cos((double) (kernel_index))");
        assert_eq!(render(&(k % 4)), "(kernel_index % 4)");
    }

    #[test]
    fn test_required_functions_precede_kernel() {
        let mut helper = Scope::new("helper");
        helper.array_parameter("out");
        let n = helper.integer_parameter("n");
        helper.store("out", 0, n.to_double());

        let mut kernel = Scope::new("entry");
        kernel.array_parameter("output");
        kernel.call(
            "helper",
            vec![
                CallArgument::Array("output".into()),
                CallArgument::Value(Expression::integer(3)),
            ],
        );
        kernel.require(helper);

        let source = CLanguageWriter::new().print_program(&kernel);
        let helper_at = source.find("void helper(").unwrap();
        let kernel_at = source.find("__kernel void entry(").unwrap();
        assert!(helper_at < kernel_at);
        assert!(source.contains("helper(output, output_len, 3);"));
    }

    #[test]
    fn test_control_constructs() {
        let mut body = Scope::new("body");
        body.store("output", Expression::var("i", ExpressionType::Integer), 0.0);
        let mut then = Scope::new("then");
        then.assign("x", 1.0);
        let mut kernel = Scope::new("k");
        kernel.declare("x", 0.0);
        kernel.cases(
            Cases::new()
                .case(Expression::kernel_index().less_than(2), then)
                .otherwise(Scope::new("else")),
        );
        kernel.repeat(Repeated::range("i", 4, body));

        let source = CLanguageWriter::new().print_program(&kernel);
        assert!(source.contains("if ((kernel_index < 2)) {"));
        assert!(source.contains("} else {"));
        assert!(source.contains("for (int i = 0; (i < 4); i += 1) {"));
    }
}
