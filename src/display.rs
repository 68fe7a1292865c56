//! `Display` impls, used for diagnostics and debug logging.
use crate::ast::{
    Assignee, BitOp, Call, CmpOp, Constant, Expr, FunctionRef, HwAxis, Instruction,
    InstructionKind, ReductionBody, ShiftDir,
};
use crate::callables::{ArgId, Callable, CallableKind};
use crate::kernel::{Dtype, Kernel, Variable};
use crate::types::{ElementType, ScalarKind};
use std::fmt::{self, Display, Formatter};

fn write_list(f: &mut Formatter, os: &[impl Display], sep: &str) -> fmt::Result {
    for (i, o) in os.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", o)?;
    }
    Ok(())
}

fn write_func(f: &mut Formatter, func: impl Display, os: &[impl Display]) -> fmt::Result {
    write!(f, "{}(", func)?;
    write_list(f, os, ", ")?;
    write!(f, ")")
}

fn write_infix(f: &mut Formatter, op: &str, os: &[impl Display]) -> fmt::Result {
    write!(f, "(")?;
    write_list(f, os, &format!(" {} ", op))?;
    write!(f, ")")
}

impl Display for ScalarKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ElementType::Scalar(s) => write!(f, "{}", s),
            ElementType::Struct { name, .. } => write!(f, "{}", name),
            ElementType::Opaque(name) => write!(f, "opaque {}", name),
        }
    }
}

impl Display for Dtype {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Dtype::Unknown => write!(f, "<unknown>"),
            Dtype::Auto => write!(f, "auto"),
            Dtype::Known(t) => write!(f, "{}", t),
        }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Constant::Int { value, sized: None } => write!(f, "{}", value),
            Constant::Int {
                value,
                sized: Some(s),
            } => write!(f, "{}({})", s, value),
            Constant::Float { value, sized: None } => write!(f, "{:?}", value),
            Constant::Float {
                value,
                sized: Some(s),
            } => write!(f, "{}({:?})", s, value),
            Constant::Complex { re, im, sized } => {
                if let Some(s) = sized {
                    write!(f, "{}", s)?;
                }
                write!(f, "({:?}{:+?}j)", re, im)
            }
        }
    }
}

impl Display for FunctionRef {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            FunctionRef::Resolved(name) => write!(f, "{}", name),
            // bare names stand out in diagnostics
            FunctionRef::Name(name) => write!(f, "{}?", name),
        }
    }
}

struct Kw<'a>(&'a str, &'a Expr);

impl<'a> Display for Kw<'a> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}={}", self.0, self.1)
    }
}

impl Display for Call {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.kw_params.is_empty() {
            return write_func(f, &self.function, &self.params);
        }
        let kws: Vec<Kw> = self.kw_params.iter().map(|(k, v)| Kw(k, v)).collect();
        write!(f, "{}(", self.function)?;
        if !self.params.is_empty() {
            write_list(f, &self.params, ", ")?;
            write!(f, ", ")?;
        }
        write_list(f, &kws, ", ")?;
        write!(f, ")")
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Expr::Constant(c) => write!(f, "{}", c),
            Expr::Variable(v) => write!(f, "{}", v),
            Expr::Sum(cs) => write_infix(f, "+", cs),
            Expr::Product(cs) => write_infix(f, "*", cs),
            Expr::Quotient(l, r) => write!(f, "({} / {})", l, r),
            Expr::FloorDiv(l, r) => write!(f, "({} // {})", l, r),
            Expr::Remainder(l, r) => write!(f, "({} % {})", l, r),
            Expr::Power(l, r) => write!(f, "({} ** {})", l, r),
            Expr::Bitwise(op, cs) => {
                let op = match op {
                    BitOp::And => "&",
                    BitOp::Or => "|",
                    BitOp::Xor => "^",
                };
                write_infix(f, op, cs)
            }
            Expr::Shift(dir, l, r) => {
                let op = match dir {
                    ShiftDir::Left => "<<",
                    ShiftDir::Right => ">>",
                };
                write!(f, "({} {} {})", l, op, r)
            }
            Expr::Comparison(op, l, r) => {
                let op = match op {
                    CmpOp::Eq => "==",
                    CmpOp::Ne => "!=",
                    CmpOp::Lt => "<",
                    CmpOp::Le => "<=",
                    CmpOp::Gt => ">",
                    CmpOp::Ge => ">=",
                };
                write!(f, "({} {} {})", l, op, r)
            }
            Expr::LogicalNot(c) => write!(f, "!{}", c),
            Expr::LogicalAnd(cs) => write_infix(f, "&&", cs),
            Expr::LogicalOr(cs) => write_infix(f, "||", cs),
            Expr::If(c, t, e) => write!(f, "if({}, {}, {})", c, t, e),
            Expr::Min(cs) => write_func(f, "min", cs),
            Expr::Max(cs) => write_func(f, "max", cs),
            Expr::Subscript(agg, idx) => {
                write!(f, "{}[", agg)?;
                write_list(f, idx, ", ")?;
                write!(f, "]")
            }
            Expr::LinearSubscript(agg, idx) => write!(f, "{}[[{}]]", agg, idx),
            Expr::Lookup(agg, field) => write!(f, "{}.{}", agg, field),
            Expr::TypeCast(ty, c) => write!(f, "{}({})", ty, c),
            Expr::Call(call) => write!(f, "{}", call),
            Expr::Reduction(red) => {
                write!(f, "{}([", red.op.name())?;
                write_list(f, &red.inames, ", ")?;
                write!(f, "], ")?;
                match &red.body {
                    ReductionBody::Single(e) => write!(f, "{}", e)?,
                    ReductionBody::Tuple(es) => write_func(f, "", es)?,
                }
                write!(f, ")")
            }
            Expr::SubArrayRef {
                swept_inames,
                subscript,
            } => {
                write!(f, "[")?;
                write_list(f, swept_inames, ", ")?;
                write!(f, "]: {}", subscript)
            }
            Expr::HwIndex(HwAxis::Group(i)) => write!(f, "gid({})", i),
            Expr::HwIndex(HwAxis::Local(i)) => write!(f, "lid({})", i),
        }
    }
}

impl Display for Assignee {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Assignee::Var(v) => write!(f, "{}", v),
            Assignee::Subscript(v, idx) => {
                write!(f, "{}[", v)?;
                write_list(f, idx, ", ")?;
                write!(f, "]")
            }
            Assignee::LinearSubscript(v, idx) => write!(f, "{}[[{}]]", v, idx),
            Assignee::Lookup(inner, field) => write!(f, "{}.{}", inner, field),
            Assignee::SubArray {
                swept_inames,
                name,
                index,
            } => {
                write!(f, "[")?;
                write_list(f, swept_inames, ", ")?;
                write!(f, "]: {}[", name)?;
                write_list(f, index, ", ")?;
                write!(f, "]")
            }
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: ", self.id)?;
        match &self.kind {
            InstructionKind::Assignment {
                assignee,
                expression,
            } => write!(f, "{} = {}", assignee, expression),
            InstructionKind::CallAssign {
                assignees,
                expression,
            } => {
                write_list(f, assignees, ", ")?;
                write!(f, " = {}", expression)
            }
            InstructionKind::Barrier => write!(f, "barrier"),
            InstructionKind::NoOp => write!(f, "nop"),
            InstructionKind::Foreign { code, .. } => write!(f, "{{{}}}", code),
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.dtype)?;
        if self.is_output() {
            write!(f, " (out)")?;
        }
        Ok(())
    }
}

impl Display for Kernel {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "kernel {}", self.name)?;
        write!(f, "  args: ")?;
        write_list(f, &self.args, ", ")?;
        writeln!(f)?;
        if !self.temporaries.is_empty() {
            write!(f, "  temporaries: ")?;
            write_list(f, &self.temporaries, ", ")?;
            writeln!(f)?;
        }
        for rule in self.substitutions.values() {
            write!(f, "  ")?;
            write_func(f, &rule.name, &rule.arguments)?;
            writeln!(f, " := {}", rule.expression)?;
        }
        for insn in &self.instructions {
            writeln!(f, "  {}", insn)?;
        }
        Ok(())
    }
}

impl Display for ArgId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ArgId::Pos(i) => write!(f, "{}", i),
            ArgId::Kw(k) => write!(f, "{}", k),
        }
    }
}

impl Display for Callable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.kind {
            CallableKind::Builtin(_) => write!(f, "{}", self.name)?,
            CallableKind::Mangled { target_name, .. } => {
                write!(f, "{} ({})", self.name, target_name)?
            }
            CallableKind::Kernel(_) => write!(f, "kernel {}", self.name)?,
        }
        let arg_types = match &self.arg_types {
            Some(at) => at,
            None => return write!(f, ": <generic>"),
        };
        let (rets, args): (Vec<_>, Vec<_>) = arg_types
            .iter()
            .partition(|(id, _)| matches!(id, ArgId::Pos(i) if *i < 0));
        let args: Vec<String> = args
            .into_iter()
            .map(|(id, ty)| match id {
                ArgId::Kw(k) => format!("{}={}", k, ty),
                ArgId::Pos(_) => ty.to_string(),
            })
            .collect();
        // return slots sort from -1 downward, i.e. in reverse
        let rets: Vec<&ElementType> = rets.into_iter().rev().map(|(_, ty)| ty).collect();
        write!(f, ": ")?;
        write_func(f, "", &args)?;
        write!(f, " -> ")?;
        write_func(f, "", &rets)
    }
}
