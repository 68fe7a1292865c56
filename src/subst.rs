//! Expansion of substitution rules.
//!
//! A rule is invoked like a function whose name is not otherwise resolved. Expansion is
//! capture-free: the rule's arguments are replaced simultaneously, after the actual parameters
//! are themselves expanded.
use crate::ast::{Call, Expr, FunctionRef};
use crate::common::Result;
use crate::kernel::{Kernel, SubstitutionRule};

use hashbrown::HashMap;
use std::collections::BTreeMap;

/// Rules expanding into themselves are rejected once nesting gets this deep.
const MAX_EXPANSION_DEPTH: usize = 64;

pub struct SubstitutionExpander<'a> {
    rules: &'a BTreeMap<String, SubstitutionRule>,
}

impl<'a> SubstitutionExpander<'a> {
    pub fn new(rules: &'a BTreeMap<String, SubstitutionRule>) -> Self {
        SubstitutionExpander { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rule `e` invokes, if it is a rule invocation.
    pub fn invocation<'b>(&self, e: &'b Expr) -> Option<(&'a SubstitutionRule, &'b Call)> {
        match e {
            Expr::Call(call) => match &call.function {
                FunctionRef::Name(name) if call.kw_params.is_empty() => {
                    self.rules.get(name).map(|r| (r, call))
                }
                FunctionRef::Name(_) | FunctionRef::Resolved(_) => None,
            },
            _ => None,
        }
    }

    pub fn expand(&self, e: &Expr) -> Result<Expr> {
        self.expand_at(e, 0)
    }

    fn expand_at(&self, e: &Expr, depth: usize) -> Result<Expr> {
        let (rule, call) = match self.invocation(e) {
            Some(inv) => inv,
            None => return e.try_map_children(|c| self.expand_at(c, depth)),
        };
        if depth >= MAX_EXPANSION_DEPTH {
            return err!("substitution rule '{}' expands into itself", rule.name);
        }
        if call.params.len() != rule.arguments.len() {
            return err!(
                "substitution rule '{}' takes {} arguments, got {}",
                rule.name,
                rule.arguments.len(),
                call.params.len()
            );
        }
        let params = call
            .params
            .iter()
            .map(|p| self.expand_at(p, depth))
            .collect::<Result<Vec<_>>>()?;
        let bound: HashMap<&str, &Expr> = rule
            .arguments
            .iter()
            .map(String::as_str)
            .zip(params.iter())
            .collect();
        self.expand_at(&substitute(&rule.expression, &bound), depth + 1)
    }
}

fn substitute(e: &Expr, bound: &HashMap<&str, &Expr>) -> Expr {
    match e {
        Expr::Variable(v) => match bound.get(v.as_str()) {
            Some(with) => (*with).clone(),
            None => e.clone(),
        },
        // a reduction's inames shadow rule arguments of the same name
        Expr::Reduction(red) if red.inames.iter().any(|i| bound.contains_key(i.as_str())) => {
            let inner: HashMap<&str, &Expr> = bound
                .iter()
                .filter(|(k, _)| !red.inames.iter().any(|i| i.as_str() == **k))
                .map(|(k, v)| (*k, *v))
                .collect();
            e.map_children(|c| substitute(c, &inner))
        }
        _ => e.map_children(|c| substitute(c, bound)),
    }
}

/// A copy of `kernel` with every rule invocation expanded and no rules left.
pub fn expand_kernel(kernel: &Kernel) -> Result<Kernel> {
    if kernel.substitutions.is_empty() {
        return Ok(kernel.clone());
    }
    let expander = SubstitutionExpander::new(&kernel.substitutions);
    let instructions = kernel
        .instructions
        .iter()
        .map(|insn| insn.try_map_expressions(|e| expander.expand(e)))
        .collect::<Result<Vec<_>>>()?;
    let mut res = kernel.with_instructions(instructions);
    res.substitutions.clear();
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Assignee, Instruction, ReductionOp};

    fn rules() -> Kernel {
        Kernel::new("k")
            .subst(
                "sq",
                &["a"],
                Expr::product(vec![Expr::var("a"), Expr::var("a")]),
            )
            .subst(
                "norm2",
                &["a", "b"],
                Expr::sum(vec![
                    Expr::call_name("sq", vec![Expr::var("a")]),
                    Expr::call_name("sq", vec![Expr::var("b")]),
                ]),
            )
            .subst("forever", &["a"], Expr::call_name("forever", vec![Expr::var("a")]))
    }

    #[test]
    fn nested_rules() {
        let k = rules();
        let ex = SubstitutionExpander::new(&k.substitutions);
        let e = Expr::call_name("norm2", vec![Expr::var("x"), Expr::int(2)]);
        assert_eq!(
            ex.expand(&e).unwrap(),
            Expr::sum(vec![
                Expr::product(vec![Expr::var("x"), Expr::var("x")]),
                Expr::product(vec![Expr::int(2), Expr::int(2)]),
            ])
        );
    }

    #[test]
    fn arguments_are_replaced_simultaneously() {
        let k = Kernel::new("k").subst(
            "swap",
            &["a", "b"],
            Expr::quotient(Expr::var("b"), Expr::var("a")),
        );
        let ex = SubstitutionExpander::new(&k.substitutions);
        let e = Expr::call_name("swap", vec![Expr::var("b"), Expr::var("a")]);
        assert_eq!(
            ex.expand(&e).unwrap(),
            Expr::quotient(Expr::var("a"), Expr::var("b"))
        );
    }

    #[test]
    fn reduction_inames_shadow_arguments() {
        let k = Kernel::new("k").subst(
            "total",
            &["j", "a"],
            Expr::sum(vec![
                Expr::var("j"),
                Expr::reduce(
                    ReductionOp::Sum,
                    &["j"],
                    Expr::sub("a", vec![Expr::var("j")]),
                ),
            ]),
        );
        let ex = SubstitutionExpander::new(&k.substitutions);
        let e = Expr::call_name("total", vec![Expr::int(3), Expr::var("x")]);
        assert_eq!(
            ex.expand(&e).unwrap(),
            Expr::sum(vec![
                Expr::int(3),
                Expr::reduce(
                    ReductionOp::Sum,
                    &["j"],
                    Expr::sub("x", vec![Expr::var("j")]),
                ),
            ])
        );
    }

    #[test]
    fn other_calls_are_left_alone() {
        let k = rules();
        let ex = SubstitutionExpander::new(&k.substitutions);
        let e = Expr::call("sin", vec![Expr::call_name("sq", vec![Expr::var("x")])]);
        assert_eq!(
            ex.expand(&e).unwrap(),
            Expr::call(
                "sin",
                vec![Expr::product(vec![Expr::var("x"), Expr::var("x")])]
            )
        );
        let e = Expr::call_name("fabs", vec![Expr::var("x")]);
        assert_eq!(ex.expand(&e).unwrap(), e);
    }

    #[test]
    fn bad_invocations() {
        let k = rules();
        let ex = SubstitutionExpander::new(&k.substitutions);
        assert!(ex
            .expand(&Expr::call_name("sq", vec![Expr::var("x"), Expr::var("y")]))
            .is_err());
        assert!(ex
            .expand(&Expr::call_name("forever", vec![Expr::var("x")]))
            .is_err());
    }

    #[test]
    fn kernel_expansion() {
        let k = rules().insn(Instruction::assign(
            "a",
            Assignee::Var("y".into()),
            Expr::call_name("sq", vec![Expr::var("x")]),
        ));
        let k2 = expand_kernel(&k).unwrap();
        assert!(k2.substitutions.is_empty());
        assert_eq!(
            k2.instructions[0].expression(),
            Some(&Expr::product(vec![Expr::var("x"), Expr::var("x")]))
        );
        // the input is left as it was
        assert_eq!(k.substitutions.len(), 3);
    }
}
