//! Kernels: variables, instructions and the per-kernel configuration inference consults.
use crate::ast::{Call, Expr, FunctionRef, Instruction, TypeTuple};
use crate::builtins;
use crate::types::{ElementType, INT32};

use hashbrown::HashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// What is known about a variable's type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Dtype {
    /// To be inferred.
    Unknown,
    /// Explicitly deferred by the author. Never a known type; inference treats it like
    /// `Unknown`.
    Auto,
    Known(ElementType),
}

impl Dtype {
    pub fn known(&self) -> Option<&ElementType> {
        match self {
            Dtype::Known(t) => Some(t),
            Dtype::Unknown | Dtype::Auto => None,
        }
    }
    pub fn is_known(&self) -> bool {
        self.known().is_some()
    }
}

impl From<ElementType> for Dtype {
    fn from(t: ElementType) -> Dtype {
        Dtype::Known(t)
    }
}

impl From<Option<ElementType>> for Dtype {
    fn from(t: Option<ElementType>) -> Dtype {
        t.map_or(Dtype::Unknown, Dtype::Known)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VarKind {
    Argument { is_output: bool },
    Temporary,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub dtype: Dtype,
    pub kind: VarKind,
}

impl Variable {
    pub fn with_dtype(&self, dtype: Dtype) -> Variable {
        Variable {
            dtype,
            ..self.clone()
        }
    }
    pub fn is_output(&self) -> bool {
        matches!(self.kind, VarKind::Argument { is_output: true })
    }
}

/// A local macro: `name(arguments) := expression`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubstitutionRule {
    pub name: String,
    pub arguments: Vec<String>,
    pub expression: Expr,
}

/// Target-specific named constants: returns the constant's type and its spelling on the target.
#[derive(Copy, Clone)]
pub struct SymbolMangler {
    pub name: &'static str,
    pub f: fn(&Kernel, &str) -> Option<(ElementType, String)>,
}

/// The outcome of matching a bare function name against fully-known argument types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MangleResult {
    pub target_name: String,
    pub arg_types: TypeTuple,
    pub result_types: TypeTuple,
}

/// Legacy pattern matching for functions that are not in the callables table.
#[derive(Copy, Clone)]
pub struct FunctionMangler {
    pub name: &'static str,
    pub f: fn(&Kernel, &str, &[ElementType]) -> Option<MangleResult>,
}

// Manglers are identified by name; comparing the function pointers themselves is not reliable.
macro_rules! mangler_by_name {
    ($t:ident) => {
        impl PartialEq for $t {
            fn eq(&self, other: &$t) -> bool {
                self.name == other.name
            }
        }
        impl Eq for $t {}
        impl std::hash::Hash for $t {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.name.hash(state)
            }
        }
        impl fmt::Debug for $t {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", stringify!($t), self.name)
            }
        }
    };
}

mangler_by_name!(SymbolMangler);
mangler_by_name!(FunctionMangler);

#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    pub name: String,
    pub args: Vec<Variable>,
    pub temporaries: Vec<Variable>,
    pub instructions: Vec<Instruction>,
    pub inames: BTreeSet<String>,
    /// Loop-bound parameters. They are typed at `index_type`.
    pub params: BTreeSet<String>,
    pub index_type: ElementType,
    pub substitutions: BTreeMap<String, SubstitutionRule>,
    pub symbol_manglers: Vec<SymbolMangler>,
    pub function_manglers: Vec<FunctionMangler>,
}

impl Kernel {
    /// An empty kernel for the default C-like target.
    pub fn new(name: &str) -> Kernel {
        Kernel {
            name: name.into(),
            args: Vec::new(),
            temporaries: Vec::new(),
            instructions: Vec::new(),
            inames: Default::default(),
            params: Default::default(),
            index_type: INT32,
            substitutions: Default::default(),
            symbol_manglers: builtins::default_symbol_manglers(),
            function_manglers: builtins::default_function_manglers(),
        }
    }

    pub fn arg(mut self, name: &str, dtype: impl Into<Dtype>) -> Kernel {
        self.args.push(Variable {
            name: name.into(),
            dtype: dtype.into(),
            kind: VarKind::Argument { is_output: false },
        });
        self
    }

    pub fn out_arg(mut self, name: &str, dtype: impl Into<Dtype>) -> Kernel {
        self.args.push(Variable {
            name: name.into(),
            dtype: dtype.into(),
            kind: VarKind::Argument { is_output: true },
        });
        self
    }

    pub fn temp(mut self, name: &str, dtype: impl Into<Dtype>) -> Kernel {
        self.temporaries.push(Variable {
            name: name.into(),
            dtype: dtype.into(),
            kind: VarKind::Temporary,
        });
        self
    }

    pub fn iname(mut self, name: &str) -> Kernel {
        self.inames.insert(name.into());
        self
    }

    /// Declare a loop-bound parameter, passed as an (input) argument.
    pub fn param(mut self, name: &str, dtype: impl Into<Dtype>) -> Kernel {
        self.params.insert(name.into());
        self.arg(name, dtype)
    }

    pub fn insn(mut self, insn: Instruction) -> Kernel {
        self.instructions.push(insn);
        self
    }

    pub fn subst(mut self, name: &str, arguments: &[&str], expression: Expr) -> Kernel {
        self.substitutions.insert(
            name.into(),
            SubstitutionRule {
                name: name.into(),
                arguments: arguments.iter().map(|s| String::from(*s)).collect(),
                expression,
            },
        );
        self
    }

    pub fn with_index_type(mut self, ty: ElementType) -> Kernel {
        self.index_type = ty;
        self
    }

    pub fn is_iname(&self, name: &str) -> bool {
        self.inames.contains(name)
    }

    /// Arguments and temporaries, arguments first.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> + '_ {
        self.args.iter().chain(self.temporaries.iter())
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables().find(|v| v.name == name)
    }

    pub fn input_args(&self) -> impl Iterator<Item = &Variable> + '_ {
        self.args.iter().filter(|a| !a.is_output())
    }

    pub fn output_args(&self) -> impl Iterator<Item = &Variable> + '_ {
        self.args.iter().filter(|a| a.is_output())
    }

    pub fn insn_by_id(&self, id: &str) -> Option<&Instruction> {
        self.instructions.iter().find(|i| i.id == id)
    }

    /// Variable name to the ids of the instructions writing it, in program order.
    pub fn writer_map(&self) -> HashMap<String, Vec<String>> {
        let mut res = HashMap::<String, Vec<String>>::new();
        for insn in &self.instructions {
            for name in insn.write_names() {
                let writers = res.entry(name.into()).or_insert_with(Vec::new);
                if !writers.contains(&insn.id) {
                    writers.push(insn.id.clone());
                }
            }
        }
        res
    }

    pub fn mangle_symbol(&self, name: &str) -> Option<(ElementType, String)> {
        self.symbol_manglers.iter().find_map(|m| (m.f)(self, name))
    }

    /// Names of the callables-table entries called from this kernel.
    pub fn called_functions(&self) -> BTreeSet<String> {
        let mut res = BTreeSet::new();
        let mut visit = |c: &Call| {
            if let FunctionRef::Resolved(name) = &c.function {
                res.insert(name.clone());
            }
        };
        for insn in &self.instructions {
            insn.for_each_expression(|e| e.for_each_call(&mut visit));
        }
        for rule in self.substitutions.values() {
            rule.expression.for_each_call(&mut visit);
        }
        res
    }

    /// A copy of this kernel with `var` replacing the variable of the same name.
    pub fn with_variable(&self, var: Variable) -> Kernel {
        let mut res = self.clone();
        if let Some(slot) = res
            .args
            .iter_mut()
            .chain(res.temporaries.iter_mut())
            .find(|v| v.name == var.name)
        {
            *slot = var;
        }
        res
    }

    /// A copy of this kernel with the given types filled in.
    pub fn with_types<'a>(&self, types: impl IntoIterator<Item = (&'a String, &'a ElementType)>) -> Kernel {
        let mut res = self.clone();
        for (name, ty) in types {
            if let Some(slot) = res
                .args
                .iter_mut()
                .chain(res.temporaries.iter_mut())
                .find(|v| &v.name == name)
            {
                slot.dtype = Dtype::Known(ty.clone());
            }
        }
        res
    }

    pub fn with_instructions(&self, instructions: Vec<Instruction>) -> Kernel {
        Kernel {
            instructions,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Assignee;
    use crate::types::{FLOAT32, FLOAT64};

    fn sample() -> Kernel {
        Kernel::new("sample")
            .arg("x", FLOAT32)
            .out_arg("y", Dtype::Unknown)
            .temp("t", Dtype::Auto)
            .iname("i")
            .insn(Instruction::assign(
                "t0",
                Assignee::Var("t".into()),
                Expr::sub("x", vec![Expr::var("i")]),
            ))
            .insn(Instruction::assign(
                "y0",
                Assignee::Subscript("y".into(), vec![Expr::var("i")]),
                Expr::var("t"),
            ))
            .insn(Instruction::assign(
                "y1",
                Assignee::Subscript("y".into(), vec![Expr::int(0)]),
                Expr::int(0),
            ))
    }

    #[test]
    fn writers_in_program_order() {
        let k = sample();
        let wm = k.writer_map();
        assert_eq!(wm["y"], vec!["y0", "y1"]);
        assert_eq!(wm["t"], vec!["t0"]);
        assert!(wm.get("x").is_none());
    }

    #[test]
    fn auto_is_not_known() {
        let k = sample();
        assert!(!k.variable("t").unwrap().dtype.is_known());
        assert_eq!(k.variable("x").unwrap().dtype.known(), Some(&FLOAT32));
    }

    #[test]
    fn copy_on_write_updates() {
        let k = sample();
        let y = k.variable("y").unwrap().with_dtype(Dtype::Known(FLOAT64));
        let k2 = k.with_variable(y);
        assert_eq!(k2.variable("y").unwrap().dtype, Dtype::Known(FLOAT64));
        assert_eq!(k.variable("y").unwrap().dtype, Dtype::Unknown);
        assert_eq!(k2.output_args().count(), 1);
        assert_eq!(k2.input_args().map(|a| a.name.as_str()).collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn named_constants() {
        let k = sample();
        assert_eq!(k.mangle_symbol("M_PI").map(|(t, _)| t), Some(FLOAT64));
        assert_eq!(k.mangle_symbol("x"), None);
    }
}
