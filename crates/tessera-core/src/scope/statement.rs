//! Statements, control constructs and scopes.

use std::collections::HashSet;

use super::expression::{Expression, ExpressionType};

/// Kind of a function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// Array of doubles, passed by reference.
    Array,
    /// Integer scalar.
    Integer,
    /// Double scalar.
    Double,
}

impl ParameterKind {
    /// Expression type of a scalar parameter.
    pub fn scalar_type(self) -> Option<ExpressionType> {
        match self {
            Self::Array => None,
            Self::Integer => Some(ExpressionType::Integer),
            Self::Double => Some(ExpressionType::Double),
        }
    }
}

/// A named function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Parameter kind.
    pub kind: ParameterKind,
}

/// An argument of a [`Statement::Call`].
#[derive(Debug, Clone, PartialEq)]
pub enum CallArgument {
    /// An array visible at the call site.
    Array(String),
    /// A scalar value.
    Value(Expression),
}

/// Ordered guarded branches with an optional default.
///
/// The first branch whose guard holds runs; if none does, the default runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cases {
    branches: Vec<(Expression, Scope)>,
    otherwise: Option<Scope>,
}

impl Cases {
    /// Empty case list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a guarded branch.
    pub fn case(mut self, condition: Expression, body: Scope) -> Self {
        self.branches.push((condition, body));
        self
    }

    /// Sets the default branch.
    pub fn otherwise(mut self, body: Scope) -> Self {
        self.otherwise = Some(body);
        self
    }

    /// Guarded branches, in order.
    pub fn branches(&self) -> &[(Expression, Scope)] {
        &self.branches
    }

    /// The default branch.
    pub fn default_branch(&self) -> Option<&Scope> {
        self.otherwise.as_ref()
    }
}

/// Bounded iteration: `for (index = initial; condition; index += interval)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Repeated {
    /// Integer loop variable, visible in `condition` and `body`.
    pub index: String,
    /// Initial index value.
    pub initial: Expression,
    /// Continuation condition.
    pub condition: Expression,
    /// Step added to the index after each iteration.
    pub interval: Expression,
    /// Loop body.
    pub body: Scope,
}

impl Repeated {
    /// `for (index = 0; index < limit; index++)`.
    pub fn range(index: impl Into<String>, limit: impl Into<Expression>, body: Scope) -> Self {
        let index = index.into();
        let condition = Expression::var(index.clone(), ExpressionType::Integer).less_than(limit);
        Self {
            index,
            initial: Expression::Integer(0),
            condition,
            interval: Expression::Integer(1),
            body,
        }
    }

    /// The loop variable as an expression.
    pub fn variable(&self) -> Expression {
        Expression::var(self.index.clone(), ExpressionType::Integer)
    }
}

/// One statement of a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Declares and initializes a scalar variable.
    Declare {
        /// Variable name.
        name: String,
        /// Variable type.
        ty: ExpressionType,
        /// Initial value.
        value: Expression,
    },
    /// Reassigns a declared variable.
    Assign {
        /// Variable name.
        name: String,
        /// New value.
        value: Expression,
    },
    /// Writes an array element.
    Store {
        /// Array name.
        array: String,
        /// Element index.
        index: Expression,
        /// Stored value.
        value: Expression,
    },
    /// Declares a zero-filled local array.
    DeclareArray {
        /// Array name.
        name: String,
        /// Element count.
        size: Expression,
    },
    /// Calls a function defined by a required scope.
    Call {
        /// Callee name.
        function: String,
        /// Positional arguments.
        arguments: Vec<CallArgument>,
    },
    /// A nested block with its own variable scope.
    Block(Scope),
    /// Conditional branches.
    Cases(Cases),
    /// Bounded iteration.
    Repeated(Box<Repeated>),
}

/// Kernel IR: an ordered list of statements plus the functions they call.
///
/// A scope used as a function has a name and parameters. Scopes listed by
/// [`require`](Scope::require) are emitted as callable functions before the
/// scope that calls them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scope {
    name: String,
    parameters: Vec<Parameter>,
    statements: Vec<Statement>,
    required: Vec<Scope>,
}

impl Scope {
    /// Empty scope.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Name of the scope (the function name when emitted as a function).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the scope.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Declared parameters.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Statements in execution order.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Directly required scopes.
    pub fn required(&self) -> &[Scope] {
        &self.required
    }

    /// Appends an array parameter.
    pub fn array_parameter(&mut self, name: impl Into<String>) {
        self.parameters.push(Parameter {
            name: name.into(),
            kind: ParameterKind::Array,
        });
    }

    /// Appends an integer parameter and returns a reference to it.
    pub fn integer_parameter(&mut self, name: impl Into<String>) -> Expression {
        let name = name.into();
        self.parameters.push(Parameter {
            name: name.clone(),
            kind: ParameterKind::Integer,
        });
        Expression::var(name, ExpressionType::Integer)
    }

    /// Appends a double parameter and returns a reference to it.
    pub fn double_parameter(&mut self, name: impl Into<String>) -> Expression {
        let name = name.into();
        self.parameters.push(Parameter {
            name: name.clone(),
            kind: ParameterKind::Double,
        });
        Expression::var(name, ExpressionType::Double)
    }

    /// Replaces the parameter list.
    pub fn set_parameters(&mut self, parameters: Vec<Parameter>) {
        self.parameters = parameters;
    }

    /// Appends a statement.
    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// Declares a variable initialized to `value` and returns a reference to it.
    pub fn declare(&mut self, name: impl Into<String>, value: impl Into<Expression>) -> Expression {
        let name = name.into();
        let value = value.into();
        let ty = value.ty();
        self.statements.push(Statement::Declare {
            name: name.clone(),
            ty,
            value,
        });
        Expression::var(name, ty)
    }

    /// Declares a variable of an explicit type.
    pub fn declare_typed(
        &mut self,
        name: impl Into<String>,
        ty: ExpressionType,
        value: impl Into<Expression>,
    ) -> Expression {
        let name = name.into();
        self.statements.push(Statement::Declare {
            name: name.clone(),
            ty,
            value: value.into(),
        });
        Expression::var(name, ty)
    }

    /// Assigns to a declared variable.
    pub fn assign(&mut self, name: impl Into<String>, value: impl Into<Expression>) {
        self.statements.push(Statement::Assign {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Writes `array[index] = value`.
    pub fn store(
        &mut self,
        array: impl Into<String>,
        index: impl Into<Expression>,
        value: impl Into<Expression>,
    ) {
        self.statements.push(Statement::Store {
            array: array.into(),
            index: index.into(),
            value: value.into(),
        });
    }

    /// Declares a local array of `size` doubles.
    pub fn declare_array(&mut self, name: impl Into<String>, size: impl Into<Expression>) {
        self.statements.push(Statement::DeclareArray {
            name: name.into(),
            size: size.into(),
        });
    }

    /// Calls `function`.
    pub fn call(&mut self, function: impl Into<String>, arguments: Vec<CallArgument>) {
        self.statements.push(Statement::Call {
            function: function.into(),
            arguments,
        });
    }

    /// Appends conditional branches.
    pub fn cases(&mut self, cases: Cases) {
        self.statements.push(Statement::Cases(cases));
    }

    /// Appends a loop.
    pub fn repeat(&mut self, repeated: Repeated) {
        self.statements.push(Statement::Repeated(Box::new(repeated)));
    }

    /// Appends a nested block.
    pub fn block(&mut self, scope: Scope) {
        self.statements.push(Statement::Block(scope));
    }

    /// Registers a function this scope calls.
    ///
    /// A scope already required under the same name is not added again.
    pub fn require(&mut self, scope: Scope) {
        if !self.required.iter().any(|r| r.name == scope.name) {
            self.required.push(scope);
        }
    }

    /// Every function reachable through `require`, callees before callers.
    ///
    /// Scopes nested in blocks, branches and loops contribute their required
    /// scopes too. Functions are deduplicated by name; the first definition
    /// wins.
    pub fn required_functions(&self) -> Vec<&Scope> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_required(&mut seen, &mut out);
        out
    }

    fn collect_required<'a>(&'a self, seen: &mut HashSet<&'a str>, out: &mut Vec<&'a Scope>) {
        for required in &self.required {
            if seen.insert(required.name.as_str()) {
                required.collect_required(seen, out);
                out.push(required);
            }
        }
        for nested in self.nested_scopes() {
            nested.collect_required(seen, out);
        }
    }

    /// Scopes embedded in this scope's statements.
    pub fn nested_scopes(&self) -> Vec<&Scope> {
        let mut out = Vec::new();
        for statement in &self.statements {
            match statement {
                Statement::Block(scope) => out.push(scope),
                Statement::Cases(cases) => {
                    out.extend(cases.branches.iter().map(|(_, s)| s));
                    out.extend(cases.otherwise.iter());
                }
                Statement::Repeated(r) => out.push(&r.body),
                _ => {}
            }
        }
        out
    }

    /// Number of statements including those in nested scopes.
    pub fn statement_count(&self) -> usize {
        self.statements.len()
            + self
                .nested_scopes()
                .iter()
                .map(|s| s.statement_count())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str, requires: &[Scope]) -> Scope {
        let mut s = Scope::new(name);
        for r in requires {
            s.require(r.clone());
        }
        s
    }

    #[test]
    fn test_required_functions_callees_first() {
        let leaf = function("leaf", &[]);
        let mid = function("mid", &[leaf.clone()]);
        let root = function("root", &[mid, leaf]);
        let names: Vec<&str> = root.required_functions().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["leaf", "mid"]);
    }

    #[test]
    fn test_required_in_nested_scope() {
        let helper = function("helper", &[]);
        let mut body = Scope::new("body");
        body.require(helper);
        let mut root = Scope::new("root");
        root.repeat(Repeated::range("i", 4, body));
        assert_eq!(root.required_functions().len(), 1);
        assert_eq!(root.statement_count(), 1);
    }

    #[test]
    fn test_declare_infers_type() {
        let mut s = Scope::new("s");
        let x = s.declare("x", Expression::integer(1) + Expression::kernel_index());
        assert_eq!(x.ty(), ExpressionType::Integer);
        let y = s.declare("y", x * 0.5);
        assert_eq!(y.ty(), ExpressionType::Double);
        assert_eq!(s.statements().len(), 2);
    }

    #[test]
    fn test_require_deduplicates() {
        let mut s = Scope::new("s");
        s.require(Scope::new("f"));
        s.require(Scope::new("f"));
        assert_eq!(s.required().len(), 1);
    }
}
