//! Expressions and instructions of a kernel.
//!
//! Expressions are plain trees. They are `Eq + Hash` (floating point constants compare by bit
//! pattern) because call nodes are used as keys when recording which specialization a call
//! resolved to.
use crate::common::Result;
use crate::kernel::Kernel;
use crate::types::{ElementType, ScalarKind};

use smallvec::{smallvec, SmallVec};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

pub type TypeTuple = SmallVec<[ElementType; 2]>;

#[derive(Clone, Debug)]
pub enum Constant {
    Int {
        value: i128,
        sized: Option<ScalarKind>,
    },
    Float {
        value: f64,
        sized: Option<ScalarKind>,
    },
    Complex {
        re: f64,
        im: f64,
        sized: Option<ScalarKind>,
    },
}

impl Constant {
    fn key(&self) -> (u8, i128, u64, u64, Option<ScalarKind>) {
        match *self {
            Constant::Int { value, sized } => (0, value, 0, 0, sized),
            Constant::Float { value, sized } => (1, 0, value.to_bits(), 0, sized),
            Constant::Complex { re, im, sized } => (2, 0, re.to_bits(), im.to_bits(), sized),
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Constant::Int { value, .. } => Some(*value),
            Constant::Float { .. } | Constant::Complex { .. } => None,
        }
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Constant) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FunctionRef {
    /// A name with an entry in the callables table.
    Resolved(String),
    /// A bare name; only the kernel's function manglers can make sense of it.
    Name(String),
}

impl FunctionRef {
    pub fn name(&self) -> &str {
        match self {
            FunctionRef::Resolved(s) | FunctionRef::Name(s) => s.as_str(),
        }
    }
    pub fn is_resolved(&self) -> bool {
        matches!(self, FunctionRef::Resolved(_))
    }
}

/// A call, with or without keyword arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Call {
    pub function: FunctionRef,
    pub params: Vec<Expr>,
    pub kw_params: Vec<(String, Expr)>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShiftDir {
    Left,
    Right,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HwAxis {
    Group(u8),
    Local(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReductionOp {
    Sum,
    Product,
    Max,
    Min,
    ArgMax,
    ArgMin,
    SegmentedSum,
    SegmentedProduct,
}

impl ReductionOp {
    pub fn arg_count(&self) -> usize {
        use ReductionOp::*;
        match self {
            Sum | Product | Max | Min => 1,
            ArgMax | ArgMin | SegmentedSum | SegmentedProduct => 2,
        }
    }

    pub fn is_tuple_typed(&self) -> bool {
        self.arg_count() > 1
    }

    pub fn name(&self) -> &'static str {
        use ReductionOp::*;
        match self {
            Sum => "sum",
            Product => "product",
            Max => "max",
            Min => "min",
            ArgMax => "argmax",
            ArgMin => "argmin",
            SegmentedSum => "segmented(sum)",
            SegmentedProduct => "segmented(product)",
        }
    }

    /// Types of the reduction's results given the types of its (inner) arguments.
    pub fn result_types(&self, _kernel: &Kernel, args: &[ElementType]) -> Result<TypeTuple> {
        use ReductionOp::*;
        if args.len() != self.arg_count() {
            return err!(
                "reduction {} expects {} argument types, got {}",
                self.name(),
                self.arg_count(),
                args.len()
            );
        }
        Ok(match self {
            Sum | Product | Max | Min => smallvec![args[0].clone()],
            // (value, index) and (value, segment flag) respectively
            ArgMax | ArgMin | SegmentedSum | SegmentedProduct => {
                if !args[1].is_integral() {
                    return type_err!(
                        "second argument of {} must be integral, got {}",
                        self.name(),
                        args[1]
                    );
                }
                smallvec![args[0].clone(), args[1].clone()]
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReductionBody {
    Single(Box<Expr>),
    Tuple(Vec<Expr>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reduction {
    pub op: ReductionOp,
    pub inames: Vec<String>,
    pub body: ReductionBody,
}

impl Reduction {
    pub fn is_tuple_typed(&self) -> bool {
        self.op.is_tuple_typed()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    Constant(Constant),
    Variable(String),
    Sum(Vec<Expr>),
    Product(Vec<Expr>),
    Quotient(Box<Expr>, Box<Expr>),
    FloorDiv(Box<Expr>, Box<Expr>),
    Remainder(Box<Expr>, Box<Expr>),
    Power(Box<Expr>, Box<Expr>),
    Bitwise(BitOp, Vec<Expr>),
    Shift(ShiftDir, Box<Expr>, Box<Expr>),
    Comparison(CmpOp, Box<Expr>, Box<Expr>),
    LogicalNot(Box<Expr>),
    LogicalAnd(Vec<Expr>),
    LogicalOr(Vec<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Min(Vec<Expr>),
    Max(Vec<Expr>),
    Subscript(Box<Expr>, Vec<Expr>),
    LinearSubscript(Box<Expr>, Box<Expr>),
    Lookup(Box<Expr>, String),
    TypeCast(ElementType, Box<Expr>),
    Call(Call),
    Reduction(Reduction),
    /// A view `[inames]: a[..]` of an array, passed to callees.
    SubArrayRef {
        swept_inames: Vec<String>,
        subscript: Box<Expr>,
    },
    HwIndex(HwAxis),
}

// Constructors, mostly for authoring kernels by hand.
impl Expr {
    pub fn int(value: i128) -> Expr {
        Expr::Constant(Constant::Int { value, sized: None })
    }
    pub fn sized_int(value: i128, ty: ScalarKind) -> Expr {
        Expr::Constant(Constant::Int {
            value,
            sized: Some(ty),
        })
    }
    pub fn float(value: f64) -> Expr {
        Expr::Constant(Constant::Float { value, sized: None })
    }
    pub fn sized_float(value: f64, ty: ScalarKind) -> Expr {
        Expr::Constant(Constant::Float {
            value,
            sized: Some(ty),
        })
    }
    pub fn complex(re: f64, im: f64) -> Expr {
        Expr::Constant(Constant::Complex { re, im, sized: None })
    }
    pub fn var(name: &str) -> Expr {
        Expr::Variable(name.into())
    }
    pub fn sub(name: &str, index: Vec<Expr>) -> Expr {
        Expr::Subscript(Box::new(Expr::var(name)), index)
    }
    pub fn sum(children: Vec<Expr>) -> Expr {
        Expr::Sum(children)
    }
    pub fn product(children: Vec<Expr>) -> Expr {
        Expr::Product(children)
    }
    pub fn quotient(num: Expr, den: Expr) -> Expr {
        Expr::Quotient(Box::new(num), Box::new(den))
    }
    pub fn cmp(op: CmpOp, l: Expr, r: Expr) -> Expr {
        Expr::Comparison(op, Box::new(l), Box::new(r))
    }
    pub fn lookup(agg: Expr, field: &str) -> Expr {
        Expr::Lookup(Box::new(agg), field.into())
    }
    pub fn cast(ty: ElementType, e: Expr) -> Expr {
        Expr::TypeCast(ty, Box::new(e))
    }
    /// A call to an entry of the callables table.
    pub fn call(func: &str, params: Vec<Expr>) -> Expr {
        Expr::Call(Call {
            function: FunctionRef::Resolved(func.into()),
            params,
            kw_params: Vec::new(),
        })
    }
    pub fn call_kw(func: &str, params: Vec<Expr>, kw_params: Vec<(&str, Expr)>) -> Expr {
        Expr::Call(Call {
            function: FunctionRef::Resolved(func.into()),
            params,
            kw_params: kw_params
                .into_iter()
                .map(|(k, v)| (String::from(k), v))
                .collect(),
        })
    }
    /// A call to a bare name, which is also how substitution rules are invoked.
    pub fn call_name(func: &str, params: Vec<Expr>) -> Expr {
        Expr::Call(Call {
            function: FunctionRef::Name(func.into()),
            params,
            kw_params: Vec::new(),
        })
    }
    pub fn reduce(op: ReductionOp, inames: &[&str], body: Expr) -> Expr {
        Expr::Reduction(Reduction {
            op,
            inames: inames.iter().map(|s| String::from(*s)).collect(),
            body: ReductionBody::Single(Box::new(body)),
        })
    }
    pub fn reduce_tuple(op: ReductionOp, inames: &[&str], body: Vec<Expr>) -> Expr {
        Expr::Reduction(Reduction {
            op,
            inames: inames.iter().map(|s| String::from(*s)).collect(),
            body: ReductionBody::Tuple(body),
        })
    }

    /// Small integer literals get special treatment in sums and products.
    pub(crate) fn small_int_literal(&self, threshold: i128) -> bool {
        match self {
            Expr::Constant(Constant::Int { value, .. }) => value.unsigned_abs() < threshold as u128,
            _ => false,
        }
    }

    /// Rebuild this node with `f` applied to each direct child expression.
    pub fn map_children(&self, mut f: impl FnMut(&Expr) -> Expr) -> Expr {
        fn all(cs: &[Expr], f: &mut dyn FnMut(&Expr) -> Expr) -> Vec<Expr> {
            cs.iter().map(|c| f(c)).collect()
        }
        match self {
            Expr::Constant(_) | Expr::Variable(_) | Expr::HwIndex(_) => self.clone(),
            Expr::Sum(cs) => Expr::Sum(all(cs, &mut f)),
            Expr::Product(cs) => Expr::Product(all(cs, &mut f)),
            Expr::Quotient(l, r) => Expr::Quotient(Box::new(f(l)), Box::new(f(r))),
            Expr::FloorDiv(l, r) => Expr::FloorDiv(Box::new(f(l)), Box::new(f(r))),
            Expr::Remainder(l, r) => Expr::Remainder(Box::new(f(l)), Box::new(f(r))),
            Expr::Power(l, r) => Expr::Power(Box::new(f(l)), Box::new(f(r))),
            Expr::Bitwise(op, cs) => Expr::Bitwise(*op, all(cs, &mut f)),
            Expr::Shift(dir, l, r) => Expr::Shift(*dir, Box::new(f(l)), Box::new(f(r))),
            Expr::Comparison(op, l, r) => Expr::Comparison(*op, Box::new(f(l)), Box::new(f(r))),
            Expr::LogicalNot(c) => Expr::LogicalNot(Box::new(f(c))),
            Expr::LogicalAnd(cs) => Expr::LogicalAnd(all(cs, &mut f)),
            Expr::LogicalOr(cs) => Expr::LogicalOr(all(cs, &mut f)),
            Expr::If(c, t, e) => Expr::If(Box::new(f(c)), Box::new(f(t)), Box::new(f(e))),
            Expr::Min(cs) => Expr::Min(all(cs, &mut f)),
            Expr::Max(cs) => Expr::Max(all(cs, &mut f)),
            Expr::Subscript(agg, idx) => {
                let agg = Box::new(f(agg));
                Expr::Subscript(agg, all(idx, &mut f))
            }
            Expr::LinearSubscript(agg, idx) => {
                Expr::LinearSubscript(Box::new(f(agg)), Box::new(f(idx)))
            }
            Expr::Lookup(agg, field) => Expr::Lookup(Box::new(f(agg)), field.clone()),
            Expr::TypeCast(ty, c) => Expr::TypeCast(ty.clone(), Box::new(f(c))),
            Expr::Call(call) => Expr::Call(Call {
                function: call.function.clone(),
                params: all(&call.params, &mut f),
                kw_params: call
                    .kw_params
                    .iter()
                    .map(|(k, v)| (k.clone(), f(v)))
                    .collect(),
            }),
            Expr::Reduction(red) => Expr::Reduction(Reduction {
                op: red.op,
                inames: red.inames.clone(),
                body: match &red.body {
                    ReductionBody::Single(e) => ReductionBody::Single(Box::new(f(e))),
                    ReductionBody::Tuple(es) => ReductionBody::Tuple(all(es, &mut f)),
                },
            }),
            Expr::SubArrayRef {
                swept_inames,
                subscript,
            } => Expr::SubArrayRef {
                swept_inames: swept_inames.clone(),
                subscript: Box::new(f(subscript)),
            },
        }
    }

    /// Visit each direct child expression.
    pub fn for_each_child(&self, mut f: impl FnMut(&Expr)) {
        match self {
            Expr::Constant(_) | Expr::Variable(_) | Expr::HwIndex(_) => {}
            Expr::Sum(cs)
            | Expr::Product(cs)
            | Expr::Bitwise(_, cs)
            | Expr::LogicalAnd(cs)
            | Expr::LogicalOr(cs)
            | Expr::Min(cs)
            | Expr::Max(cs) => cs.iter().for_each(f),
            Expr::Quotient(l, r)
            | Expr::FloorDiv(l, r)
            | Expr::Remainder(l, r)
            | Expr::Power(l, r)
            | Expr::Shift(_, l, r)
            | Expr::Comparison(_, l, r)
            | Expr::LinearSubscript(l, r) => {
                f(l);
                f(r);
            }
            Expr::LogicalNot(c) | Expr::Lookup(c, _) | Expr::TypeCast(_, c) => f(c),
            Expr::If(c, t, e) => {
                f(c);
                f(t);
                f(e);
            }
            Expr::Subscript(agg, idx) => {
                f(agg);
                idx.iter().for_each(f);
            }
            Expr::Call(call) => {
                call.params.iter().for_each(&mut f);
                call.kw_params.iter().for_each(|(_, v)| f(v));
            }
            Expr::Reduction(red) => match &red.body {
                ReductionBody::Single(e) => f(e),
                ReductionBody::Tuple(es) => es.iter().for_each(f),
            },
            Expr::SubArrayRef { subscript, .. } => f(subscript),
        }
    }

    /// Like `map_children`, stopping at the first error.
    pub fn try_map_children(&self, mut f: impl FnMut(&Expr) -> Result<Expr>) -> Result<Expr> {
        let mut error = None;
        let res = self.map_children(|c| match f(c) {
            Ok(e) => e,
            Err(e) => {
                error.get_or_insert(e);
                c.clone()
            }
        });
        match error {
            Some(e) => Err(e),
            None => Ok(res),
        }
    }

    /// Visit every call node in this expression, outermost first.
    pub fn for_each_call(&self, f: &mut impl FnMut(&Call)) {
        if let Expr::Call(call) = self {
            f(call);
        }
        self.for_each_child(|c| c.for_each_call(&mut *f));
    }

    /// Names of all variables referenced by this expression. Function names are not included.
    pub fn dependency_names(&self) -> BTreeSet<String> {
        fn rec(e: &Expr, out: &mut BTreeSet<String>) {
            if let Expr::Variable(name) = e {
                out.insert(name.clone());
            }
            e.for_each_child(|c| rec(c, out));
        }
        let mut res = BTreeSet::new();
        rec(self, &mut res);
        res
    }

    /// Replace every occurrence of the named variables with `with`.
    pub(crate) fn replace_vars(&self, names: &[String], with: &Expr) -> Expr {
        match self {
            Expr::Variable(v) if names.contains(v) => with.clone(),
            _ => self.map_children(|c| c.replace_vars(names, with)),
        }
    }

    /// For a sub-array view, the subscript at which the view starts (swept inames at zero).
    pub fn begin_subscript(&self) -> Option<Expr> {
        match self {
            Expr::SubArrayRef {
                swept_inames,
                subscript,
            } => Some(subscript.replace_vars(swept_inames, &Expr::int(0))),
            _ => None,
        }
    }
}

/// The shapes an assignment target can take.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Assignee {
    Var(String),
    Subscript(String, Vec<Expr>),
    LinearSubscript(String, Box<Expr>),
    Lookup(Box<Assignee>, String),
    SubArray {
        swept_inames: Vec<String>,
        name: String,
        index: Vec<Expr>,
    },
}

impl Assignee {
    pub fn var_name(&self) -> &str {
        match self {
            Assignee::Var(name)
            | Assignee::Subscript(name, _)
            | Assignee::LinearSubscript(name, _)
            | Assignee::SubArray { name, .. } => name.as_str(),
            Assignee::Lookup(inner, _) => inner.var_name(),
        }
    }

    fn for_each_index(&self, f: &mut impl FnMut(&Expr)) {
        match self {
            Assignee::Var(_) => {}
            Assignee::Subscript(_, idx) | Assignee::SubArray { index: idx, .. } => {
                idx.iter().for_each(f)
            }
            Assignee::LinearSubscript(_, idx) => f(idx),
            Assignee::Lookup(inner, _) => inner.for_each_index(f),
        }
    }

    fn map_index(&self, f: &mut impl FnMut(&Expr) -> Expr) -> Assignee {
        match self {
            Assignee::Var(_) => self.clone(),
            Assignee::Subscript(name, idx) => {
                Assignee::Subscript(name.clone(), idx.iter().map(|e| f(e)).collect())
            }
            Assignee::LinearSubscript(name, idx) => {
                Assignee::LinearSubscript(name.clone(), Box::new(f(idx)))
            }
            Assignee::Lookup(inner, field) => {
                Assignee::Lookup(Box::new(inner.map_index(f)), field.clone())
            }
            Assignee::SubArray {
                swept_inames,
                name,
                index,
            } => Assignee::SubArray {
                swept_inames: swept_inames.clone(),
                name: name.clone(),
                index: index.iter().map(|e| f(e)).collect(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InstructionKind {
    Assignment {
        assignee: Assignee,
        expression: Expr,
    },
    /// An assignment of a (possibly tuple-valued) call or reduction to several targets.
    CallAssign {
        assignees: Vec<Assignee>,
        expression: Expr,
    },
    Barrier,
    NoOp,
    /// Opaque target code. Its reads and writes are declared, not derived.
    Foreign {
        code: String,
        reads: Vec<String>,
        writes: Vec<String>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub id: String,
    pub kind: InstructionKind,
}

impl Instruction {
    pub fn assign(id: &str, assignee: Assignee, expression: Expr) -> Instruction {
        Instruction {
            id: id.into(),
            kind: InstructionKind::Assignment {
                assignee,
                expression,
            },
        }
    }

    pub fn call_assign(id: &str, assignees: Vec<Assignee>, expression: Expr) -> Instruction {
        Instruction {
            id: id.into(),
            kind: InstructionKind::CallAssign {
                assignees,
                expression,
            },
        }
    }

    pub fn assignees(&self) -> &[Assignee] {
        match &self.kind {
            InstructionKind::Assignment { assignee, .. } => std::slice::from_ref(assignee),
            InstructionKind::CallAssign { assignees, .. } => &assignees[..],
            InstructionKind::Barrier | InstructionKind::NoOp | InstructionKind::Foreign { .. } => {
                &[]
            }
        }
    }

    pub fn expression(&self) -> Option<&Expr> {
        match &self.kind {
            InstructionKind::Assignment { expression, .. }
            | InstructionKind::CallAssign { expression, .. } => Some(expression),
            InstructionKind::Barrier | InstructionKind::NoOp | InstructionKind::Foreign { .. } => {
                None
            }
        }
    }

    /// Instructions that carry no typed data flow; type inference skips them.
    pub fn is_data_oblivious(&self) -> bool {
        self.expression().is_none()
    }

    pub fn write_names(&self) -> Vec<&str> {
        match &self.kind {
            InstructionKind::Foreign { writes, .. } => writes.iter().map(|s| s.as_str()).collect(),
            _ => self.assignees().iter().map(Assignee::var_name).collect(),
        }
    }

    pub fn read_dependency_names(&self) -> BTreeSet<String> {
        match &self.kind {
            InstructionKind::Foreign { reads, .. } => reads.iter().cloned().collect(),
            _ => {
                let mut res = self
                    .expression()
                    .map(Expr::dependency_names)
                    .unwrap_or_default();
                for a in self.assignees() {
                    a.for_each_index(&mut |e| res.extend(e.dependency_names()));
                }
                res
            }
        }
    }

    /// The instruction's expression followed by its assignee indices.
    pub fn for_each_expression(&self, mut f: impl FnMut(&Expr)) {
        if let Some(e) = self.expression() {
            f(e);
        }
        for a in self.assignees() {
            a.for_each_index(&mut f);
        }
    }

    pub fn try_map_expressions(
        &self,
        mut f: impl FnMut(&Expr) -> Result<Expr>,
    ) -> Result<Instruction> {
        let mut error = None;
        let res = self.map_expressions(|e| match f(e) {
            Ok(e) => e,
            Err(e) => {
                error.get_or_insert(e);
                Expr::int(0)
            }
        });
        match error {
            Some(e) => Err(e),
            None => Ok(res),
        }
    }

    /// Rebuild the instruction with `f` applied to its expression and to every assignee index.
    pub fn map_expressions(&self, mut f: impl FnMut(&Expr) -> Expr) -> Instruction {
        let kind = match &self.kind {
            InstructionKind::Assignment {
                assignee,
                expression,
            } => InstructionKind::Assignment {
                assignee: assignee.map_index(&mut f),
                expression: f(expression),
            },
            InstructionKind::CallAssign {
                assignees,
                expression,
            } => InstructionKind::CallAssign {
                assignees: assignees.iter().map(|a| a.map_index(&mut f)).collect(),
                expression: f(expression),
            },
            other => other.clone(),
        };
        Instruction {
            id: self.id.clone(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_constants_hash_by_bits() {
        use hashbrown::HashSet;
        let mut s = HashSet::new();
        s.insert(Expr::float(1.5));
        s.insert(Expr::float(1.5));
        s.insert(Expr::float(f64::NAN));
        s.insert(Expr::float(f64::NAN));
        assert_eq!(s.len(), 2);
        assert_ne!(Expr::float(1.0), Expr::int(1));
    }

    #[test]
    fn dependencies_skip_function_names() {
        let e = Expr::call(
            "f",
            vec![Expr::sub("x", vec![Expr::var("i")]), Expr::var("y")],
        );
        let deps: Vec<_> = e.dependency_names().into_iter().collect();
        assert_eq!(deps, vec!["i", "x", "y"]);
    }

    #[test]
    fn assignee_names() {
        let a = Assignee::Lookup(
            Box::new(Assignee::Subscript("out".into(), vec![Expr::var("j")])),
            "x".into(),
        );
        assert_eq!(a.var_name(), "out");
        let insn = Instruction::assign("w", a, Expr::var("v"));
        let deps: Vec<_> = insn.read_dependency_names().into_iter().collect();
        assert_eq!(deps, vec!["j", "v"]);
        assert_eq!(insn.write_names(), vec!["out"]);
    }

    #[test]
    fn begin_subscript_zeroes_swept_inames() {
        let view = Expr::SubArrayRef {
            swept_inames: vec!["j".into()],
            subscript: Box::new(Expr::sub("a", vec![Expr::var("i"), Expr::var("j")])),
        };
        assert_eq!(
            view.begin_subscript(),
            Some(Expr::sub("a", vec![Expr::var("i"), Expr::int(0)]))
        );
    }

    #[test]
    fn small_int_literals() {
        assert!(Expr::int(-1023).small_int_literal(1024));
        assert!(!Expr::int(1024).small_int_literal(1024));
        assert!(Expr::sized_int(1, ScalarKind::Int64).small_int_literal(1024));
        assert!(!Expr::sized_int(-4096, ScalarKind::Int16).small_int_literal(1024));
        assert!(!Expr::int(i128::MIN).small_int_literal(1024));
        assert!(!Expr::float(1.0).small_int_literal(1024));
    }
}
