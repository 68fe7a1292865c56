//! Rewriting call sites after inference.
use crate::ast::{Call, Expr, FunctionRef};
use crate::callables::CallablesTable;
use crate::common::Result;
use crate::kernel::Kernel;
use crate::subst::SubstitutionExpander;

use hashbrown::HashMap;

/// Points every recorded call node at the specialization it resolved to.
///
/// Inference runs on the kernel with substitution rules expanded, so a call written as
/// `f(rule(x))` was recorded in its expanded form. Each call is looked up literally first and
/// then expanded. A rule invocation whose expansion contains renamed calls is inlined, since the
/// rule body is shared between call sites that may resolve differently.
pub(crate) struct CallRenamer<'a> {
    renames: &'a HashMap<Call, String>,
    expander: SubstitutionExpander<'a>,
}

impl<'a> CallRenamer<'a> {
    pub(crate) fn new(kernel: &'a Kernel, renames: &'a HashMap<Call, String>) -> Self {
        CallRenamer {
            renames,
            expander: SubstitutionExpander::new(&kernel.substitutions),
        }
    }

    fn lookup(&self, call: &Call) -> Result<Option<&'a String>> {
        if let Some(name) = self.renames.get(call) {
            return Ok(Some(name));
        }
        if self.expander.is_empty() {
            return Ok(None);
        }
        match self.expander.expand(&Expr::Call(call.clone()))? {
            Expr::Call(expanded) => Ok(self.renames.get(&expanded)),
            _ => Ok(None),
        }
    }

    fn has_renamed_call(&self, e: &Expr) -> bool {
        let mut found = false;
        e.for_each_call(&mut |c| found |= self.renames.contains_key(c));
        found
    }

    pub(crate) fn rename(&self, e: &Expr) -> Result<Expr> {
        let call = match e {
            Expr::Call(call) => call,
            _ => return e.try_map_children(|c| self.rename(c)),
        };
        if self.expander.invocation(e).is_some() {
            let expanded = self.expander.expand(e)?;
            if self.has_renamed_call(&expanded) {
                return self.rename(&expanded);
            }
            return Ok(e.clone());
        }
        if let Some(new_name) = self.lookup(call)? {
            let params = call
                .params
                .iter()
                .map(|p| self.rename(p))
                .collect::<Result<Vec<_>>>()?;
            let kw_params = call
                .kw_params
                .iter()
                .map(|(k, p)| Ok((k.clone(), self.rename(p)?)))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Expr::Call(Call {
                function: FunctionRef::Resolved(new_name.clone()),
                params,
                kw_params,
            }));
        }
        e.try_map_children(|c| self.rename(c))
    }
}

/// A copy of `kernel` with each call in `renames` pointing at its new name.
pub fn change_call_names(kernel: &Kernel, renames: &HashMap<Call, String>) -> Result<Kernel> {
    if renames.is_empty() {
        return Ok(kernel.clone());
    }
    let renamer = CallRenamer::new(kernel, renames);
    let instructions = kernel
        .instructions
        .iter()
        .map(|insn| insn.try_map_expressions(|e| renamer.rename(e)))
        .collect::<Result<Vec<_>>>()?;
    Ok(kernel.with_instructions(instructions))
}

/// Mark calls to bare names that have an entry in `table` as resolved. Substitution rules
/// shadow table entries.
pub fn resolve_known_functions(kernel: &Kernel, table: &CallablesTable) -> Kernel {
    fn resolve(e: &Expr, kernel: &Kernel, table: &CallablesTable) -> Expr {
        let res = e.map_children(|c| resolve(c, kernel, table));
        match res {
            Expr::Call(Call {
                function: FunctionRef::Name(name),
                params,
                kw_params,
            }) if table.contains(&name) && !kernel.substitutions.contains_key(&name) => {
                Expr::Call(Call {
                    function: FunctionRef::Resolved(name),
                    params,
                    kw_params,
                })
            }
            other => other,
        }
    }
    let instructions = kernel
        .instructions
        .iter()
        .map(|insn| insn.map_expressions(|e| resolve(e, kernel, table)))
        .collect();
    let mut res = kernel.with_instructions(instructions);
    for rule in res.substitutions.values_mut() {
        rule.expression = resolve(&rule.expression, kernel, table);
    }
    res
}
