//! Slot-resolved kernel programs and the host executor.
//!
//! Lowering replaces every name in the IR with a slot index: scalars index a
//! per-call frame, arrays index the frame's array table, which points into a
//! shared heap of buffers. Heap entry 0 is the kernel output, entries 1.. are
//! the kernel's array arguments, later entries are local arrays. Locals are
//! released when the call (or lane) that allocated them returns.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::scope::{
    BinaryOp, CallArgument, Expression, ExpressionType, ParameterKind, Scope, Statement, UnaryOp,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Double(f64),
    Integer(i64),
    Boolean(bool),
}

impl Value {
    fn as_f64(self) -> f64 {
        match self {
            Self::Double(v) => v,
            Self::Integer(v) => v as f64,
            Self::Boolean(v) => f64::from(u8::from(v)),
        }
    }

    fn as_i64(self) -> i64 {
        match self {
            Self::Double(v) => v as i64,
            Self::Integer(v) => v,
            Self::Boolean(v) => i64::from(v),
        }
    }

    fn as_bool(self) -> bool {
        match self {
            Self::Double(v) => v != 0.0,
            Self::Integer(v) => v != 0,
            Self::Boolean(v) => v,
        }
    }

    fn coerce(self, ty: ExpressionType) -> Self {
        match ty {
            ExpressionType::Double => Self::Double(self.as_f64()),
            ExpressionType::Integer => Self::Integer(self.as_i64()),
            ExpressionType::Boolean => Self::Boolean(self.as_bool()),
        }
    }
}

#[derive(Debug, Clone)]
enum LExpr {
    Const(Value),
    Local(usize),
    KernelIndex,
    Load(usize, Box<LExpr>),
    Length(usize),
    Unary(UnaryOp, Box<LExpr>),
    Binary(BinaryOp, Box<LExpr>, Box<LExpr>),
    Conditional(Box<LExpr>, Box<LExpr>, Box<LExpr>),
}

#[derive(Debug, Clone)]
enum LArg {
    Array(usize),
    Value(LExpr),
}

#[derive(Debug, Clone)]
enum Op {
    Set {
        slot: usize,
        ty: ExpressionType,
        value: LExpr,
    },
    Store {
        array: usize,
        index: LExpr,
        value: LExpr,
    },
    Alloc {
        array: usize,
        len: LExpr,
    },
    Call {
        function: usize,
        args: Vec<LArg>,
    },
    Cases {
        branches: Vec<(LExpr, Vec<Op>)>,
        otherwise: Vec<Op>,
    },
    Repeat {
        index: usize,
        initial: LExpr,
        condition: LExpr,
        interval: LExpr,
        body: Vec<Op>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Symbol {
    Scalar(usize, ExpressionType),
    Array(usize),
}

#[derive(Debug, Clone)]
struct Function {
    name: String,
    params: Vec<Symbol>,
    scalar_slots: usize,
    array_slots: usize,
    array_names: Vec<String>,
    body: Vec<Op>,
}

/// A lowered kernel: the entry function and every function it calls.
#[derive(Debug, Clone)]
pub struct Program {
    functions: Vec<Function>,
    entry: usize,
}

impl Program {
    /// Lowers `entry` and the `functions` it requires.
    ///
    /// Every call must name one of the supplied functions (or `entry`).
    /// Functions may call themselves.
    pub fn lower(entry: &Scope, functions: &[&Scope]) -> Result<Self> {
        let mut signatures: HashMap<String, (usize, Vec<ParameterKind>)> = HashMap::new();
        for (index, scope) in functions.iter().chain(std::iter::once(&entry)).enumerate() {
            let kinds = scope.parameters().iter().map(|p| p.kind).collect();
            if signatures
                .insert(scope.name().to_string(), (index, kinds))
                .is_some()
            {
                return Err(Error::validation(
                    "kernel",
                    format!("function '{}' is defined twice", scope.name()),
                ));
            }
        }

        let mut lowered = Vec::with_capacity(functions.len() + 1);
        for scope in functions.iter().chain(std::iter::once(&entry)) {
            lowered.push(FunctionLowering::new(&signatures).lower(scope)?);
        }
        Ok(Self {
            entry: lowered.len() - 1,
            functions: lowered,
        })
    }

    /// Number of array parameters of the entry function.
    pub fn entry_arrays(&self) -> usize {
        self.functions[self.entry].params.len()
    }

    /// Runs `lanes` lanes of the entry function.
    ///
    /// `buffers[i]` binds the entry function's `i`-th array parameter. Lanes
    /// run sequentially in index order.
    pub fn run(&self, buffers: Vec<Vec<f64>>, lanes: usize, max_depth: usize) -> Result<Vec<Vec<f64>>> {
        let entry = &self.functions[self.entry];
        if buffers.len() != entry.params.len() {
            return Err(Error::ArgumentCount {
                expected: entry.params.len(),
                actual: buffers.len(),
            });
        }
        let base = buffers.len();
        let mut machine = Machine {
            program: self,
            heap: buffers,
            depth: 0,
            max_depth,
        };
        for lane in 0..lanes {
            let mut frame = Frame::new(entry);
            for (position, symbol) in entry.params.iter().enumerate() {
                if let Symbol::Array(slot) = symbol {
                    frame.arrays[*slot] = Some(position);
                }
            }
            machine.exec(entry, &entry.body, &mut frame, lane as i64)?;
            machine.heap.truncate(base);
        }
        Ok(machine.heap)
    }
}

struct FunctionLowering<'a> {
    signatures: &'a HashMap<String, (usize, Vec<ParameterKind>)>,
    names: Vec<(String, Symbol)>,
    scalar_slots: usize,
    array_names: Vec<String>,
    function: String,
}

impl<'a> FunctionLowering<'a> {
    fn new(signatures: &'a HashMap<String, (usize, Vec<ParameterKind>)>) -> Self {
        Self {
            signatures,
            names: Vec::new(),
            scalar_slots: 0,
            array_names: Vec::new(),
            function: String::new(),
        }
    }

    fn lower(mut self, scope: &Scope) -> Result<Function> {
        self.function = scope.name().to_string();
        let mut params = Vec::with_capacity(scope.parameters().len());
        for p in scope.parameters() {
            let symbol = match p.kind.scalar_type() {
                Some(ty) => Symbol::Scalar(self.scalar(&p.name, ty), ty),
                None => Symbol::Array(self.array(&p.name)),
            };
            params.push(symbol);
        }
        let body = self.block(scope)?;
        Ok(Function {
            name: self.function,
            params,
            scalar_slots: self.scalar_slots,
            array_slots: self.array_names.len(),
            array_names: self.array_names,
            body,
        })
    }

    fn scalar(&mut self, name: &str, ty: ExpressionType) -> usize {
        let slot = self.scalar_slots;
        self.scalar_slots += 1;
        self.names.push((name.to_string(), Symbol::Scalar(slot, ty)));
        slot
    }

    fn array(&mut self, name: &str) -> usize {
        let slot = self.array_names.len();
        self.array_names.push(name.to_string());
        self.names.push((name.to_string(), Symbol::Array(slot)));
        slot
    }

    fn lookup(&self, name: &str) -> Result<Symbol> {
        self.names
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, s)| *s)
            .ok_or_else(|| Error::UndefinedSymbol(format!("{} in '{}'", name, self.function)))
    }

    fn lookup_scalar(&self, name: &str) -> Result<(usize, ExpressionType)> {
        match self.lookup(name)? {
            Symbol::Scalar(slot, ty) => Ok((slot, ty)),
            Symbol::Array(_) => Err(Error::UndefinedSymbol(format!(
                "{name} is an array, not a scalar, in '{}'",
                self.function
            ))),
        }
    }

    fn lookup_array(&self, name: &str) -> Result<usize> {
        match self.lookup(name)? {
            Symbol::Array(slot) => Ok(slot),
            Symbol::Scalar(..) => Err(Error::UndefinedSymbol(format!(
                "{name} is a scalar, not an array, in '{}'",
                self.function
            ))),
        }
    }

    fn block(&mut self, scope: &Scope) -> Result<Vec<Op>> {
        let mark = self.names.len();
        let mut ops = Vec::with_capacity(scope.statements().len());
        for statement in scope.statements() {
            self.statement(statement, &mut ops)?;
        }
        self.names.truncate(mark);
        Ok(ops)
    }

    fn statement(&mut self, statement: &Statement, ops: &mut Vec<Op>) -> Result<()> {
        match statement {
            Statement::Declare { name, ty, value } => {
                let value = self.expression(value)?;
                let slot = self.scalar(name, *ty);
                ops.push(Op::Set {
                    slot,
                    ty: *ty,
                    value,
                });
            }
            Statement::Assign { name, value } => {
                let value = self.expression(value)?;
                let (slot, ty) = self.lookup_scalar(name)?;
                ops.push(Op::Set { slot, ty, value });
            }
            Statement::Store {
                array,
                index,
                value,
            } => {
                ops.push(Op::Store {
                    array: self.lookup_array(array)?,
                    index: self.expression(index)?,
                    value: self.expression(value)?,
                });
            }
            Statement::DeclareArray { name, size } => {
                let len = self.expression(size)?;
                let array = self.array(name);
                ops.push(Op::Alloc { array, len });
            }
            Statement::Call {
                function,
                arguments,
            } => ops.push(self.call(function, arguments)?),
            Statement::Block(scope) => ops.extend(self.block(scope)?),
            Statement::Cases(cases) => {
                let mut branches = Vec::with_capacity(cases.branches().len());
                for (condition, scope) in cases.branches() {
                    branches.push((self.expression(condition)?, self.block(scope)?));
                }
                let otherwise = match cases.default_branch() {
                    Some(scope) => self.block(scope)?,
                    None => Vec::new(),
                };
                ops.push(Op::Cases {
                    branches,
                    otherwise,
                });
            }
            Statement::Repeated(r) => {
                let initial = self.expression(&r.initial)?;
                let mark = self.names.len();
                let index = self.scalar(&r.index, ExpressionType::Integer);
                let condition = self.expression(&r.condition)?;
                let interval = self.expression(&r.interval)?;
                let body = self.block(&r.body)?;
                self.names.truncate(mark);
                ops.push(Op::Repeat {
                    index,
                    initial,
                    condition,
                    interval,
                    body,
                });
            }
        }
        Ok(())
    }

    fn call(&self, function: &str, arguments: &[CallArgument]) -> Result<Op> {
        let (index, kinds) = self
            .signatures
            .get(function)
            .ok_or_else(|| Error::UndefinedFunction(function.to_string()))?;
        if kinds.len() != arguments.len() {
            return Err(Error::InvalidCall {
                function: function.to_string(),
                reason: format!("expected {} arguments, got {}", kinds.len(), arguments.len()),
            });
        }
        let mut args = Vec::with_capacity(arguments.len());
        for (position, (kind, argument)) in kinds.iter().zip(arguments).enumerate() {
            let arg = match (kind, argument) {
                (ParameterKind::Array, CallArgument::Array(name)) => {
                    LArg::Array(self.lookup_array(name)?)
                }
                (ParameterKind::Integer | ParameterKind::Double, CallArgument::Value(e)) => {
                    LArg::Value(self.expression(e)?)
                }
                _ => {
                    return Err(Error::InvalidCall {
                        function: function.to_string(),
                        reason: format!("argument {position} does not match a {kind:?} parameter"),
                    });
                }
            };
            args.push(arg);
        }
        Ok(Op::Call {
            function: *index,
            args,
        })
    }

    fn expression(&self, expression: &Expression) -> Result<LExpr> {
        Ok(match expression {
            Expression::Double(v) => LExpr::Const(Value::Double(*v)),
            Expression::Integer(v) => LExpr::Const(Value::Integer(*v)),
            Expression::Boolean(v) => LExpr::Const(Value::Boolean(*v)),
            Expression::Variable { name, .. } => LExpr::Local(self.lookup_scalar(name)?.0),
            Expression::KernelIndex => LExpr::KernelIndex,
            Expression::Load { array, index } => {
                LExpr::Load(self.lookup_array(array)?, Box::new(self.expression(index)?))
            }
            Expression::Length(array) => LExpr::Length(self.lookup_array(array)?),
            Expression::Unary { op, operand } => {
                LExpr::Unary(*op, Box::new(self.expression(operand)?))
            }
            Expression::Binary { op, left, right } => LExpr::Binary(
                *op,
                Box::new(self.expression(left)?),
                Box::new(self.expression(right)?),
            ),
            Expression::Conditional {
                condition,
                then,
                otherwise,
            } => LExpr::Conditional(
                Box::new(self.expression(condition)?),
                Box::new(self.expression(then)?),
                Box::new(self.expression(otherwise)?),
            ),
        })
    }
}

struct Frame {
    scalars: Vec<Value>,
    arrays: Vec<Option<usize>>,
}

impl Frame {
    fn new(function: &Function) -> Self {
        Self {
            scalars: vec![Value::Integer(0); function.scalar_slots],
            arrays: vec![None; function.array_slots],
        }
    }
}

struct Machine<'p> {
    program: &'p Program,
    heap: Vec<Vec<f64>>,
    depth: usize,
    max_depth: usize,
}

impl<'p> Machine<'p> {
    fn buffer(&self, function: &Function, frame: &Frame, array: usize) -> Result<usize> {
        frame.arrays[array].ok_or_else(|| {
            Error::execution(format!(
                "array '{}' used before allocation in '{}'",
                function.array_names[array], function.name
            ))
        })
    }

    fn element_index(
        &self,
        function: &Function,
        array: usize,
        buffer: usize,
        index: Value,
    ) -> Result<usize> {
        let i = index.as_i64();
        let len = self.heap[buffer].len();
        if i < 0 || i as usize >= len {
            return Err(Error::execution(format!(
                "index {i} out of bounds for array '{}' of length {len} in '{}'",
                function.array_names[array], function.name
            )));
        }
        Ok(i as usize)
    }

    fn exec(&mut self, function: &'p Function, ops: &'p [Op], frame: &mut Frame, lane: i64) -> Result<()> {
        for op in ops {
            match op {
                Op::Set { slot, ty, value } => {
                    frame.scalars[*slot] = self.eval(function, value, frame, lane)?.coerce(*ty);
                }
                Op::Store {
                    array,
                    index,
                    value,
                } => {
                    let buffer = self.buffer(function, frame, *array)?;
                    let index = self.eval(function, index, frame, lane)?;
                    let i = self.element_index(function, *array, buffer, index)?;
                    let v = self.eval(function, value, frame, lane)?.as_f64();
                    self.heap[buffer][i] = v;
                }
                Op::Alloc { array, len } => {
                    let len = self.eval(function, len, frame, lane)?.as_i64();
                    let len = usize::try_from(len).map_err(|_| {
                        Error::execution(format!("negative array size {len} in '{}'", function.name))
                    })?;
                    match frame.arrays[*array] {
                        // Re-entering a loop body reuses the local buffer.
                        Some(buffer) => {
                            self.heap[buffer].clear();
                            self.heap[buffer].resize(len, 0.0);
                        }
                        None => {
                            self.heap.push(vec![0.0; len]);
                            frame.arrays[*array] = Some(self.heap.len() - 1);
                        }
                    }
                }
                Op::Call { function: callee, args } => {
                    self.call(function, *callee, args, frame, lane)?;
                }
                Op::Cases {
                    branches,
                    otherwise,
                } => {
                    let mut taken = false;
                    for (condition, body) in branches {
                        if self.eval(function, condition, frame, lane)?.as_bool() {
                            self.exec(function, body, frame, lane)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        self.exec(function, otherwise, frame, lane)?;
                    }
                }
                Op::Repeat {
                    index,
                    initial,
                    condition,
                    interval,
                    body,
                } => {
                    frame.scalars[*index] =
                        Value::Integer(self.eval(function, initial, frame, lane)?.as_i64());
                    while self.eval(function, condition, frame, lane)?.as_bool() {
                        self.exec(function, body, frame, lane)?;
                        let step = self.eval(function, interval, frame, lane)?.as_i64();
                        let current = frame.scalars[*index].as_i64();
                        frame.scalars[*index] = Value::Integer(current + step);
                    }
                }
            }
        }
        Ok(())
    }

    fn call(
        &mut self,
        caller: &'p Function,
        callee: usize,
        args: &'p [LArg],
        frame: &Frame,
        lane: i64,
    ) -> Result<()> {
        let program = self.program;
        let target = &program.functions[callee];
        if self.depth >= self.max_depth {
            return Err(Error::execution(format!(
                "call depth limit {} exceeded calling '{}'",
                self.max_depth, target.name
            )));
        }

        let mut callee_frame = Frame::new(target);
        for (symbol, arg) in target.params.iter().zip(args) {
            match (symbol, arg) {
                (Symbol::Array(slot), LArg::Array(array)) => {
                    callee_frame.arrays[*slot] = Some(self.buffer(caller, frame, *array)?);
                }
                (Symbol::Scalar(slot, ty), LArg::Value(value)) => {
                    callee_frame.scalars[*slot] = self.eval(caller, value, frame, lane)?.coerce(*ty);
                }
                _ => {
                    return Err(Error::InvalidCall {
                        function: target.name.clone(),
                        reason: "argument kind mismatch".into(),
                    });
                }
            }
        }

        let mark = self.heap.len();
        self.depth += 1;
        let result = self.exec(target, &target.body, &mut callee_frame, lane);
        self.depth -= 1;
        self.heap.truncate(mark);
        result
    }

    fn eval(&self, function: &Function, expr: &LExpr, frame: &Frame, lane: i64) -> Result<Value> {
        Ok(match expr {
            LExpr::Const(v) => *v,
            LExpr::Local(slot) => frame.scalars[*slot],
            LExpr::KernelIndex => Value::Integer(lane),
            LExpr::Load(array, index) => {
                let buffer = self.buffer(function, frame, *array)?;
                let index = self.eval(function, index, frame, lane)?;
                let i = self.element_index(function, *array, buffer, index)?;
                Value::Double(self.heap[buffer][i])
            }
            LExpr::Length(array) => {
                let buffer = self.buffer(function, frame, *array)?;
                Value::Integer(self.heap[buffer].len() as i64)
            }
            LExpr::Unary(op, operand) => {
                let v = self.eval(function, operand, frame, lane)?;
                match op {
                    UnaryOp::Neg => match v {
                        Value::Integer(i) => Value::Integer(i.wrapping_neg()),
                        other => Value::Double(-other.as_f64()),
                    },
                    UnaryOp::Not => Value::Boolean(!v.as_bool()),
                    UnaryOp::Abs => match v {
                        Value::Integer(i) => Value::Integer(i.wrapping_abs()),
                        other => Value::Double(other.as_f64().abs()),
                    },
                    UnaryOp::Floor => Value::Double(v.as_f64().floor()),
                    UnaryOp::Sqrt => Value::Double(v.as_f64().sqrt()),
                    UnaryOp::Exp => Value::Double(v.as_f64().exp()),
                    UnaryOp::Sin => Value::Double(v.as_f64().sin()),
                    UnaryOp::Cos => Value::Double(v.as_f64().cos()),
                    UnaryOp::ToDouble => Value::Double(v.as_f64()),
                    UnaryOp::ToInteger => Value::Integer(v.as_i64()),
                }
            }
            LExpr::Binary(op, left, right) => {
                let l = self.eval(function, left, frame, lane)?;
                match op {
                    BinaryOp::And if !l.as_bool() => return Ok(Value::Boolean(false)),
                    BinaryOp::Or if l.as_bool() => return Ok(Value::Boolean(true)),
                    _ => {}
                }
                let r = self.eval(function, right, frame, lane)?;
                binary(*op, l, r).map_err(|message| {
                    Error::execution(format!("{message} in '{}'", function.name))
                })?
            }
            LExpr::Conditional(condition, then, otherwise) => {
                if self.eval(function, condition, frame, lane)?.as_bool() {
                    self.eval(function, then, frame, lane)?
                } else {
                    self.eval(function, otherwise, frame, lane)?
                }
            }
        })
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> std::result::Result<Value, &'static str> {
    if let (Value::Integer(a), Value::Integer(b)) = (l, r) {
        return Ok(match op {
            BinaryOp::Add => Value::Integer(a.wrapping_add(b)),
            BinaryOp::Sub => Value::Integer(a.wrapping_sub(b)),
            BinaryOp::Mul => Value::Integer(a.wrapping_mul(b)),
            BinaryOp::Div => Value::Integer(a.checked_div(b).ok_or("integer division by zero or overflow")?),
            BinaryOp::Mod => Value::Integer(a.checked_rem(b).ok_or("integer remainder by zero or overflow")?),
            BinaryOp::Min => Value::Integer(a.min(b)),
            BinaryOp::Max => Value::Integer(a.max(b)),
            BinaryOp::Eq => Value::Boolean(a == b),
            BinaryOp::Ne => Value::Boolean(a != b),
            BinaryOp::Lt => Value::Boolean(a < b),
            BinaryOp::Le => Value::Boolean(a <= b),
            BinaryOp::Gt => Value::Boolean(a > b),
            BinaryOp::Ge => Value::Boolean(a >= b),
            BinaryOp::And => Value::Boolean(a != 0 && b != 0),
            BinaryOp::Or => Value::Boolean(a != 0 || b != 0),
        });
    }
    let (a, b) = (l.as_f64(), r.as_f64());
    Ok(match op {
        BinaryOp::Add => Value::Double(a + b),
        BinaryOp::Sub => Value::Double(a - b),
        BinaryOp::Mul => Value::Double(a * b),
        BinaryOp::Div => Value::Double(a / b),
        BinaryOp::Mod => Value::Double(a % b),
        BinaryOp::Min => Value::Double(a.min(b)),
        BinaryOp::Max => Value::Double(a.max(b)),
        BinaryOp::Eq => Value::Boolean(a == b),
        BinaryOp::Ne => Value::Boolean(a != b),
        BinaryOp::Lt => Value::Boolean(a < b),
        BinaryOp::Le => Value::Boolean(a <= b),
        BinaryOp::Gt => Value::Boolean(a > b),
        BinaryOp::Ge => Value::Boolean(a >= b),
        BinaryOp::And => Value::Boolean(l.as_bool() && r.as_bool()),
        BinaryOp::Or => Value::Boolean(l.as_bool() || r.as_bool()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Cases, Repeated};

    fn square_kernel() -> Scope {
        let mut k = Scope::new("square");
        k.array_parameter("output");
        k.array_parameter("input");
        let x = k.declare("x", Expression::load("input", Expression::kernel_index()));
        k.store("output", Expression::kernel_index(), x.clone() * x);
        k
    }

    #[test]
    fn test_run_lanes() {
        let program = Program::lower(&square_kernel(), &[]).unwrap();
        let heap = program
            .run(vec![vec![0.0; 3], vec![1.0, 2.0, 3.0]], 3, 8)
            .unwrap();
        assert_eq!(heap[0], vec![1.0, 4.0, 9.0]);
    }

    #[test]
    fn test_out_of_bounds_store_names_array() {
        let program = Program::lower(&square_kernel(), &[]).unwrap();
        let err = program
            .run(vec![vec![0.0; 2], vec![1.0, 2.0, 3.0]], 3, 8)
            .unwrap_err();
        assert!(err.to_string().contains("output"), "{err}");
    }

    #[test]
    fn test_undefined_symbol() {
        let mut k = Scope::new("k");
        k.array_parameter("output");
        k.store("output", 0, Expression::var("missing", ExpressionType::Double));
        let err = Program::lower(&k, &[]).unwrap_err();
        assert!(matches!(err, Error::UndefinedSymbol(_)));
    }

    #[test]
    fn test_undefined_function() {
        let mut k = Scope::new("k");
        k.call("nowhere", vec![]);
        assert!(matches!(
            Program::lower(&k, &[]).unwrap_err(),
            Error::UndefinedFunction(_)
        ));
    }

    #[test]
    fn test_call_kind_mismatch() {
        let mut f = Scope::new("f");
        f.array_parameter("a");
        let mut k = Scope::new("k");
        k.call("f", vec![CallArgument::Value(Expression::integer(1))]);
        assert!(matches!(
            Program::lower(&k, &[&f]).unwrap_err(),
            Error::InvalidCall { .. }
        ));
    }

    #[test]
    fn test_recursive_function() {
        // fill(out, n): out[n - 1] = n; fill(out, n - 1) while n > 0
        let mut fill = Scope::new("fill");
        fill.array_parameter("out");
        let n = fill.integer_parameter("n");
        let mut body = Scope::new("body");
        body.store("out", n.clone() - 1, n.clone().to_double());
        body.call(
            "fill",
            vec![
                CallArgument::Array("out".into()),
                CallArgument::Value(n.clone() - 1),
            ],
        );
        fill.cases(Cases::new().case(n.greater_than(0), body));

        let mut k = Scope::new("k");
        k.array_parameter("output");
        k.call(
            "fill",
            vec![
                CallArgument::Array("output".into()),
                CallArgument::Value(Expression::integer(4)),
            ],
        );
        let program = Program::lower(&k, &[&fill]).unwrap();
        let heap = program.run(vec![vec![0.0; 4]], 1, 16).unwrap();
        assert_eq!(heap[0], vec![1.0, 2.0, 3.0, 4.0]);

        let err = program.run(vec![vec![0.0; 4]], 1, 2).unwrap_err();
        assert!(err.to_string().contains("depth"), "{err}");
    }

    #[test]
    fn test_local_array_and_loop() {
        let mut body = Scope::new("body");
        let i = Expression::var("i", ExpressionType::Integer);
        body.store("tmp", i.clone(), i.clone().to_double() * 2.0);
        let mut sum_body = Scope::new("sum_body");
        sum_body.assign("acc", Expression::var("acc", ExpressionType::Double) + Expression::load("tmp", i));

        let mut k = Scope::new("k");
        k.array_parameter("output");
        k.declare_array("tmp", 4);
        k.repeat(Repeated::range("i", Expression::length("tmp"), body));
        let acc = k.declare("acc", 0.0);
        k.repeat(Repeated::range("i", 4, sum_body));
        k.store("output", Expression::kernel_index(), acc);

        let program = Program::lower(&k, &[]).unwrap();
        let heap = program.run(vec![vec![0.0; 2]], 2, 4).unwrap();
        assert_eq!(heap.len(), 1);
        assert_eq!(heap[0], vec![12.0, 12.0]);
    }

    #[test]
    fn test_integer_division_by_zero() {
        let mut k = Scope::new("k");
        k.array_parameter("output");
        let zero = k.declare_typed("zero", ExpressionType::Integer, 0);
        k.store("output", 0, (Expression::integer(1) / zero).to_double());
        let program = Program::lower(&k, &[]).unwrap();
        assert!(program.run(vec![vec![0.0]], 1, 4).is_err());
    }
}
