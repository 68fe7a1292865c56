//! Statically declared functions and the defaults for a C-like target.
//!
//! `Function` is the set of math builtins that know how to specialize themselves for concrete
//! argument types; they back the resolved-overload callables. The manglers at the bottom are the
//! legacy path: a bare function or constant name is matched against the target's libm spelling.
use crate::ast::TypeTuple;
use crate::common::Result;
use crate::kernel::{FunctionMangler, Kernel, MangleResult, SymbolMangler};
use crate::types::{promote, ElementType, ScalarKind, FLOAT64};

use smallvec::smallvec;
use std::convert::TryFrom;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    Abs,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Log10,
    Floor,
    Ceil,
    Pow,
    Fmod,
    Min,
    Max,
    Real,
    Imag,
    Conj,
}

static_map!(
    FUNCTIONS<&'static str, Function>,
    ["abs", Function::Abs],
    ["sqrt", Function::Sqrt],
    ["sin", Function::Sin],
    ["cos", Function::Cos],
    ["tan", Function::Tan],
    ["exp", Function::Exp],
    ["log", Function::Log],
    ["log10", Function::Log10],
    ["floor", Function::Floor],
    ["ceil", Function::Ceil],
    ["pow", Function::Pow],
    ["fmod", Function::Fmod],
    ["min", Function::Min],
    ["max", Function::Max],
    ["real", Function::Real],
    ["imag", Function::Imag],
    ["conj", Function::Conj]
);

impl<'a> TryFrom<&'a str> for Function {
    type Error = (); // error means not found
    fn try_from(value: &'a str) -> std::result::Result<Function, ()> {
        match FUNCTIONS.get(value) {
            Some(v) => Ok(*v),
            None => Err(()),
        }
    }
}

impl Function {
    pub fn name(&self) -> &'static str {
        use Function::*;
        match self {
            Abs => "abs",
            Sqrt => "sqrt",
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            Exp => "exp",
            Log => "log",
            Log10 => "log10",
            Floor => "floor",
            Ceil => "ceil",
            Pow => "pow",
            Fmod => "fmod",
            Min => "min",
            Max => "max",
            Real => "real",
            Imag => "imag",
            Conj => "conj",
        }
    }

    pub fn arity(&self) -> usize {
        use Function::*;
        match self {
            Pow | Fmod | Min | Max => 2,
            Abs | Sqrt | Sin | Cos | Tan | Exp | Log | Log10 | Floor | Ceil | Real | Imag
            | Conj => 1,
        }
    }

    /// The argument types this function is called at and its result type, given the types of
    /// the incoming arguments. `None` if some incoming type is not known yet.
    pub(crate) fn specialize(
        &self,
        incoming: &[Option<ElementType>],
    ) -> Result<Option<(TypeTuple, ElementType)>> {
        use Function::*;
        if incoming.len() != self.arity() {
            return err!(
                "function {} expects {} arguments, got {}",
                self.name(),
                self.arity(),
                incoming.len()
            );
        }
        let known: TypeTuple = match incoming.iter().cloned().collect::<Option<_>>() {
            Some(k) => k,
            None => return Ok(None),
        };
        let mut common = known[0].clone();
        for t in &known[1..] {
            common = promote(&common, t)?;
        }
        let s = match common.scalar() {
            Some(s) if s != ScalarKind::Bool => s,
            _ => {
                return type_err!(
                    "{} is not supported for arguments of type '{}'",
                    self.name(),
                    common
                )
            }
        };
        let res: ElementType = match self {
            Sqrt | Sin | Cos | Tan | Exp | Log | Log10 | Pow => {
                if s.is_integral() {
                    FLOAT64
                } else {
                    common.clone()
                }
            }
            Floor | Ceil | Fmod => {
                if s.is_complex() {
                    return type_err!("{} is not defined for complex type '{}'", self.name(), common);
                }
                if s.is_integral() {
                    FLOAT64
                } else {
                    common.clone()
                }
            }
            Min | Max => {
                if s.is_complex() {
                    return type_err!("{} is not defined for complex type '{}'", self.name(), common);
                }
                common.clone()
            }
            Abs | Real | Imag => s.real_part().into(),
            Conj => common.clone(),
        };
        // arguments are passed at the type the computation happens in
        let arg = match self {
            Abs | Real | Imag | Conj | Min | Max => common,
            _ => res.clone(),
        };
        Ok(Some((smallvec![arg; self.arity()], res)))
    }
}

static_map!(
    SYMBOLS<&'static str, ScalarKind>,
    ["M_PI", ScalarKind::Float64],
    ["M_E", ScalarKind::Float64],
    ["M_SQRT2", ScalarKind::Float64],
    ["M_LN2", ScalarKind::Float64],
    ["HUGE_VAL", ScalarKind::Float64],
    ["DBL_MAX", ScalarKind::Float64],
    ["DBL_EPSILON", ScalarKind::Float64],
    ["INFINITY", ScalarKind::Float32],
    ["NAN", ScalarKind::Float32],
    ["FLT_MAX", ScalarKind::Float32],
    ["FLT_EPSILON", ScalarKind::Float32],
    ["INT_MAX", ScalarKind::Int32],
    ["INT_MIN", ScalarKind::Int32]
);

fn c_symbol_mangler(_kernel: &Kernel, name: &str) -> Option<(ElementType, String)> {
    SYMBOLS.get(name).map(|s| ((*s).into(), String::from(name)))
}

const UNARY_LIBM: &[&str] = &[
    "fabs", "sqrt", "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "exp",
    "log", "log10", "floor", "ceil", "trunc",
];
const BINARY_LIBM: &[&str] = &["pow", "fmod", "fmin", "fmax", "atan2"];

/// libm functions on real floating point arguments; single precision gets the `f` suffix.
fn c_math_mangler(_kernel: &Kernel, name: &str, args: &[ElementType]) -> Option<MangleResult> {
    let arity = if UNARY_LIBM.contains(&name) {
        1
    } else if BINARY_LIBM.contains(&name) {
        2
    } else {
        return None;
    };
    if args.len() != arity || !args.iter().all(|a| a.scalar().map_or(false, ScalarKind::is_float)) {
        return None;
    }
    let mut ty = args[0].clone();
    for a in &args[1..] {
        ty = promote(&ty, a).ok()?;
    }
    let target_name = match ty.scalar()? {
        ScalarKind::Float32 => format!("{}f", name),
        _ => String::from(name),
    };
    Some(MangleResult {
        target_name,
        arg_types: smallvec![ty.clone(); arity],
        result_types: smallvec![ty],
    })
}

pub fn default_symbol_manglers() -> Vec<SymbolMangler> {
    vec![SymbolMangler {
        name: "c_symbols",
        f: c_symbol_mangler,
    }]
}

pub fn default_function_manglers() -> Vec<FunctionMangler> {
    vec![FunctionMangler {
        name: "c_math",
        f: c_math_mangler,
    }]
}
