//! Checks run on the result of inference when every type is expected to be known.
use crate::ast::FunctionRef;
use crate::callables::CallablesTable;
use crate::common::Result;
use crate::kernel::Kernel;
use crate::subst;

/// Every call must name an entry of `table`. Calls to bare names that no function mangler
/// matched are still in the tree at this point and are reported here.
pub fn check_functions_are_resolved(kernel: &Kernel, table: &CallablesTable) -> Result<()> {
    let expanded = subst::expand_kernel(kernel)?;
    for insn in &expanded.instructions {
        let mut bad = None;
        insn.for_each_expression(|e| {
            e.for_each_call(&mut |c| {
                if bad.is_some() {
                    return;
                }
                match &c.function {
                    FunctionRef::Name(name) => bad = Some(format!("unknown function '{}'", name)),
                    FunctionRef::Resolved(name) if !table.contains(name) => {
                        bad = Some(format!("function '{}' is not in the callables table", name))
                    }
                    FunctionRef::Resolved(_) => {}
                }
            })
        });
        if let Some(msg) = bad {
            return err!("{} (in instruction '{}' of '{}')", msg, insn.id, kernel.name);
        }
    }
    Ok(())
}

pub fn check_variables_typed(kernel: &Kernel) -> Result<()> {
    match kernel.variables().find(|v| !v.dtype.is_known()) {
        Some(v) => type_err!("could not determine type of '{}' in '{}'", v.name, kernel.name),
        None => Ok(()),
    }
}
