//! The fixed-point driver for type inference.
//!
//! Inference computes a type for every variable declared without one. Variables are visited
//! one strongly connected component of the dependency graph at a time, dependencies first.
//! Within a component, each variable's writers are evaluated under the types found so far until
//! a full pass over the component changes nothing. A variable whose writers cannot be evaluated
//! twice in a row is given up on.
use crate::ast::{Call, Expr, Instruction, InstructionKind, Reduction, TypeTuple};
use crate::callables::{Callable, CallableKind, CallablesTable};
use crate::check;
use crate::common::Result;
use crate::dataflow::DepGraph;
use crate::infer::{Env, Findings, TypeEvaluator};
use crate::kernel::{Dtype, Kernel};
use crate::rewrite;
use crate::subst;
use crate::types::{combine, ElementType};

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use log::debug;
use smallvec::{smallvec, SmallVec};
use std::collections::VecDeque;
use std::time::Instant;

/// A set of kernels calling one another, with `entry` as the one to start from.
#[derive(Clone, Debug)]
pub struct Program {
    pub entry: String,
    pub callables: CallablesTable,
}

/// Infer the types of `kernel`'s untyped variables.
///
/// Returns the typed kernel, with every call resolved during inference pointing at its
/// specialization, and the extended callables table. With `expect_completion`, a variable whose
/// type cannot be determined is an error; without it, such variables are left untyped.
pub fn infer_unknown_types(
    kernel: &Kernel,
    table: &CallablesTable,
    expect_completion: bool,
) -> Result<(Kernel, CallablesTable)> {
    let (table, cp) = table.clone().begin_edit();
    let (kernel, table) = infer_unknown_types_for_kernel(kernel, table, expect_completion)?;
    let table = if cp.is_outermost() {
        table.retain_reachable(kernel.called_functions())
    } else {
        table
    };
    let table = table.commit_edit(cp)?;
    Ok((kernel, table))
}

/// Run inference on the entry kernel of `program` and store the typed kernel back in its place.
pub fn infer_program(program: &Program, expect_completion: bool) -> Result<Program> {
    let entry = match program.callables.get(&program.entry) {
        Some(c) => c,
        None => return err!("entry point '{}' is not in the callables table", program.entry),
    };
    let kernel = match entry.subkernel() {
        Some(k) => k,
        None => return err!("entry point '{}' is not a kernel", program.entry),
    };
    let (typed, table) = infer_unknown_types(kernel, &program.callables, expect_completion)?;
    let entry = Callable {
        kind: CallableKind::Kernel(Box::new(typed)),
        ..entry.clone()
    };
    Ok(Program {
        entry: program.entry.clone(),
        callables: table.insert(&program.entry, entry),
    })
}

/// Inference on a single kernel, within an edit transaction the caller has opened.
pub fn infer_unknown_types_for_kernel(
    kernel: &Kernel,
    table: CallablesTable,
    expect_completion: bool,
) -> Result<(Kernel, CallablesTable)> {
    if !table.in_edit_mode() {
        return err!(
            "inference on '{}' must run inside an edit transaction of the callables table",
            kernel.name
        );
    }
    let start = Instant::now();
    let expanded = subst::expand_kernel(kernel)?;

    let mut env = Env::new();
    let mut names = Vec::new();
    for var in expanded
        .temporaries
        .iter()
        .chain(expanded.args.iter())
        .filter(|v| !v.dtype.is_known())
    {
        if expanded.params.contains(&var.name) {
            env.insert(var.name.clone(), expanded.index_type.clone());
        } else {
            names.push(var.name.clone());
        }
    }

    let mut table = table;
    let mut renames = HashMap::new();
    if !names.is_empty() {
        debug!(
            "{}: inferring types of {}",
            kernel.name,
            names.iter().join(", ")
        );
        let graph = DepGraph::new(&expanded, &names);
        let writers = expanded.writer_map();
        for scc in graph.sccs() {
            let driver = SccDriver {
                kernel: &expanded,
                writers: &writers,
                env: &mut env,
                table,
                renames: &mut renames,
            };
            table = driver.run(&scc, &graph, expect_completion)?;
        }
    }

    // Calls in instructions whose targets were typed already were never evaluated above.
    for insn in expanded
        .instructions
        .iter()
        .filter(|i| !i.is_data_oblivious())
    {
        let mut ev = TypeEvaluator::new(&expanded, &env, table.clone());
        match eval_instruction(&mut ev, insn) {
            Ok(()) => {
                let (t, found) = ev.finish();
                table = t;
                renames.extend(found.renames);
            }
            Err(e) if e.is_transient() => {}
            Err(e) => return Err(e),
        }
    }

    let typed = kernel.with_types(env.iter());
    let typed = rewrite::change_call_names(&typed, &renames)?;
    if expect_completion {
        check::check_functions_are_resolved(&typed, &table)?;
        check::check_variables_typed(&typed)?;
    }
    debug!(
        "{}: type inference took {:.2} ms",
        kernel.name,
        start.elapsed().as_secs_f64() * 1e3
    );
    Ok((typed, table))
}

fn eval_instruction(ev: &mut TypeEvaluator, insn: &Instruction) -> Result<()> {
    match &insn.kind {
        InstructionKind::CallAssign {
            assignees,
            expression,
        } if assignees.len() > 1 => ev.eval_tuple(expression).map(|_| ()),
        _ => match insn.expression() {
            Some(e) => ev.eval(e).map(|_| ()),
            None => Ok(()),
        },
    }
}

struct SccDriver<'a> {
    kernel: &'a Kernel,
    writers: &'a HashMap<String, Vec<String>>,
    env: &'a mut Env,
    table: CallablesTable,
    renames: &'a mut HashMap<Call, String>,
}

impl<'a> SccDriver<'a> {
    fn run(
        mut self,
        scc: &[String],
        graph: &DepGraph,
        expect_completion: bool,
    ) -> Result<CallablesTable> {
        let kernel = self.kernel;
        debug!("{}: component {}", kernel.name, scc.iter().join(", "));
        // a lone variable that does not read itself is settled after one successful pass
        let one_pass = scc.len() == 1 && !graph.has_self_edge(&scc[0]);
        let mut queue: VecDeque<String> = scc.iter().cloned().collect();
        let mut failed = HashSet::new();
        let mut changed_during_pass = false;
        loop {
            let name = match queue.pop_front() {
                Some(name) => name,
                None if changed_during_pass && !one_pass => {
                    changed_during_pass = false;
                    queue.extend(scc.iter().cloned());
                    continue;
                }
                None => break,
            };
            debug!("{}: inferring type for {}", kernel.name, name);
            let (ty, table, found) =
                infer_var_type(kernel, self.env, self.writers, &name, self.table.clone())?;
            match ty {
                Some(ty) => {
                    self.table = table;
                    self.renames.extend(found.renames);
                    if self.env.get(&name) == Some(&ty) {
                        debug!("{}:   success (unchanged): {}", kernel.name, ty);
                        continue;
                    }
                    debug!(
                        "{}:   success (changed from {}): {}",
                        kernel.name,
                        self.env
                            .get(&name)
                            .map_or_else(|| String::from("unknown"), |t| t.to_string()),
                        ty
                    );
                    self.env.insert(name, ty);
                    changed_during_pass = true;
                    failed.clear();
                }
                None => {
                    debug!("{}:   failure", kernel.name);
                    if failed.contains(&name) {
                        if expect_completion {
                            let advice = if found.unknown_symbols.is_empty() {
                                String::new()
                            } else {
                                format!(
                                    " (need type of '{}'--check for missing arguments)",
                                    found.unknown_symbols.iter().join(", ")
                                )
                            };
                            return type_err!(
                                "could not determine type of '{}'{} in '{}'",
                                name,
                                advice,
                                kernel.name
                            );
                        }
                        break;
                    }
                    failed.insert(name.clone());
                    queue.push_back(name);
                }
            }
        }
        Ok(self.table)
    }
}

/// Evaluate every writer of `name` and combine the results. The type is `None` when no writer
/// produced one; the table and renames are only meaningful when it is `Some`.
fn infer_var_type(
    kernel: &Kernel,
    env: &Env,
    writers: &HashMap<String, Vec<String>>,
    name: &str,
    table: CallablesTable,
) -> Result<(Option<ElementType>, CallablesTable, Findings)> {
    let mut ev = TypeEvaluator::new(kernel, env, table);
    let mut results = Vec::new();
    let ids = writers.get(name).map(Vec::as_slice).unwrap_or(&[]);
    for insn in ids.iter().filter_map(|id| kernel.insn_by_id(id)) {
        match writer_type(&mut ev, insn, name) {
            Ok(ty) => {
                debug!(
                    "{}:   writer {}: {}",
                    kernel.name,
                    insn.id,
                    ty.as_ref()
                        .map_or_else(|| String::from("unknown"), |t| t.to_string())
                );
                results.push(ty);
            }
            Err(e) if e.is_transient() => {
                debug!("{}:   failed (dependency): {}", kernel.name, e.msg);
                let (table, found) = ev.finish();
                return Ok((None, table, found));
            }
            Err(e) => return Err(e),
        }
    }
    let ty = combine(&results)?;
    let (table, found) = ev.finish();
    Ok((ty, table, found))
}

/// The type a single writer instruction assigns to `name`.
fn writer_type(
    ev: &mut TypeEvaluator,
    insn: &Instruction,
    name: &str,
) -> Result<Option<ElementType>> {
    match &insn.kind {
        InstructionKind::CallAssign {
            assignees,
            expression,
        } if assignees.len() > 1 => {
            let tys = match ev.eval_tuple(expression)? {
                Some(tys) => tys,
                None => return Ok(None),
            };
            if tys.len() != assignees.len() {
                return err!(
                    "instruction '{}' assigns {} values to {} targets",
                    insn.id,
                    tys.len(),
                    assignees.len()
                );
            }
            Ok(assignees
                .iter()
                .zip(tys.into_iter())
                .find(|(a, _)| a.var_name() == name)
                .map(|(_, t)| t))
        }
        _ => match insn.expression() {
            Some(e) => ev.eval(e),
            // instructions with declared writes only
            None => Ok(None),
        },
    }
}

/// Argument and result types of a reduction, evaluated against the declared types of
/// `kernel`. With `unknown_types_ok`, types that are not known yet come back as
/// `Dtype::Auto`; otherwise they are an error.
pub fn infer_arg_and_reduction_types(
    kernel: &Kernel,
    reduction: &Reduction,
    table: &CallablesTable,
    unknown_types_ok: bool,
) -> Result<(SmallVec<[Dtype; 2]>, SmallVec<[Dtype; 2]>, CallablesTable)> {
    let (table, cp) = table.clone().begin_edit();
    let env = Env::new();
    let mut ev = TypeEvaluator::new(kernel, &env, table);
    let tuple = reduction.is_tuple_typed();
    let args: Option<TypeTuple> = match ev.reduction_args(reduction, tuple) {
        Ok(args) => args,
        Err(e) if e.is_transient() => None,
        Err(e) => return Err(e),
    };
    let (table, _) = ev.finish();
    let table = table.commit_edit(cp)?;
    match args {
        Some(args) => {
            let res = reduction.op.result_types(kernel, &args)?;
            Ok((
                args.into_iter().map(Dtype::Known).collect(),
                res.into_iter().map(Dtype::Known).collect(),
                table,
            ))
        }
        None if unknown_types_ok => {
            let n = reduction.op.arg_count();
            Ok((smallvec![Dtype::Auto; n], smallvec![Dtype::Auto; n], table))
        }
        None => type_err!(
            "failed to determine type of accumulator for reduction '{}'",
            Expr::Reduction(reduction.clone())
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Assignee, ReductionOp};
    use crate::common::ErrorKind;
    use crate::types::*;

    fn assign(id: &str, to: &str, e: Expr) -> Instruction {
        Instruction::assign(id, Assignee::Var(to.into()), e)
    }

    fn infer(k: &Kernel, complete: bool) -> Result<(Kernel, CallablesTable)> {
        infer_unknown_types(k, &CallablesTable::with_builtins(), complete)
    }

    fn dtype(k: &Kernel, name: &str) -> Dtype {
        k.variable(name).unwrap().dtype.clone()
    }

    #[test]
    fn straight_line() {
        let k = Kernel::new("k")
            .arg("x", FLOAT32)
            .out_arg("y", Dtype::Unknown)
            .temp("t", Dtype::Unknown)
            .temp("q", Dtype::Auto)
            .iname("i")
            .insn(assign("t", "t", Expr::sum(vec![Expr::var("x"), Expr::int(1)])))
            .insn(assign("q", "q", Expr::quotient(Expr::var("i"), Expr::int(2))))
            .insn(Instruction::assign(
                "y",
                Assignee::Subscript("y".into(), vec![Expr::var("i")]),
                Expr::product(vec![Expr::var("t"), Expr::var("q")]),
            ));
        let (typed, _) = infer(&k, true).unwrap();
        assert_eq!(dtype(&typed, "t"), Dtype::Known(FLOAT32));
        assert_eq!(dtype(&typed, "q"), Dtype::Known(FLOAT64));
        assert_eq!(dtype(&typed, "y"), Dtype::Known(FLOAT64));
        // the input is untouched
        assert_eq!(dtype(&k, "y"), Dtype::Unknown);
    }

    #[test]
    fn writers_are_combined() {
        let k = Kernel::new("k")
            .arg("a", INT8)
            .arg("b", UINT8)
            .temp("t", Dtype::Unknown)
            .insn(assign("t0", "t", Expr::var("a")))
            .insn(assign("t1", "t", Expr::var("b")));
        let (typed, _) = infer(&k, true).unwrap();
        assert_eq!(dtype(&typed, "t"), Dtype::Known(INT16));
    }

    #[test]
    fn parameters_take_the_index_type() {
        let k = Kernel::new("k")
            .param("n", Dtype::Unknown)
            .temp("t", Dtype::Unknown)
            .insn(assign("t", "t", Expr::var("n")))
            .with_index_type(INT64);
        let (typed, _) = infer(&k, true).unwrap();
        assert_eq!(dtype(&typed, "n"), Dtype::Known(INT64));
        assert_eq!(dtype(&typed, "t"), Dtype::Known(INT64));
    }

    #[test]
    fn tuple_assignments() {
        let k = Kernel::new("k")
            .arg("x", FLOAT64)
            .temp("m", Dtype::Unknown)
            .temp("at", Dtype::Unknown)
            .iname("j")
            .with_index_type(INT64)
            .insn(Instruction::call_assign(
                "am",
                vec![Assignee::Var("m".into()), Assignee::Var("at".into())],
                Expr::reduce_tuple(
                    ReductionOp::ArgMax,
                    &["j"],
                    vec![Expr::sub("x", vec![Expr::var("j")]), Expr::var("j")],
                ),
            ));
        let (typed, _) = infer(&k, true).unwrap();
        assert_eq!(dtype(&typed, "m"), Dtype::Known(FLOAT64));
        assert_eq!(dtype(&typed, "at"), Dtype::Known(INT64));
    }

    #[test]
    fn incomplete_results() {
        let k = Kernel::new("k")
            .arg("x", Dtype::Unknown)
            .temp("t", Dtype::Unknown)
            .insn(assign("t", "t", Expr::var("x")));
        let e = infer(&k, true).unwrap_err();
        assert_eq!(e.kind, ErrorKind::TypeInference);
        assert!(e.msg.contains("could not determine type of 'x'"));
        let (typed, _) = infer(&k, false).unwrap();
        assert_eq!(dtype(&typed, "t"), Dtype::Unknown);
    }

    #[test]
    fn needs_an_open_transaction() {
        let k = Kernel::new("k");
        assert!(infer_unknown_types_for_kernel(&k, CallablesTable::with_builtins(), true).is_err());
    }

    #[test]
    fn reduction_entry_point() {
        let k = Kernel::new("k")
            .arg("x", FLOAT32)
            .arg("u", Dtype::Unknown)
            .iname("j");
        let table = CallablesTable::with_builtins();
        let red = Reduction {
            op: ReductionOp::Max,
            inames: vec!["j".into()],
            body: crate::ast::ReductionBody::Single(Box::new(Expr::call(
                "sqrt",
                vec![Expr::sub("x", vec![Expr::var("j")])],
            ))),
        };
        let (args, res, table2) = infer_arg_and_reduction_types(&k, &red, &table, false).unwrap();
        assert_eq!(args.as_slice(), &[Dtype::Known(FLOAT32)]);
        assert_eq!(res.as_slice(), &[Dtype::Known(FLOAT32)]);
        assert!(table2.contains("sqrt_0"));
        assert_eq!(table2.committed_count(), table2.len());

        let red = Reduction {
            op: ReductionOp::Sum,
            inames: vec!["j".into()],
            body: crate::ast::ReductionBody::Single(Box::new(Expr::var("u"))),
        };
        let (args, res, _) = infer_arg_and_reduction_types(&k, &red, &table, true).unwrap();
        assert_eq!(args.as_slice(), &[Dtype::Auto]);
        assert_eq!(res.as_slice(), &[Dtype::Auto]);
        assert!(infer_arg_and_reduction_types(&k, &red, &table, false).is_err());
    }

    #[test]
    fn program_entry_is_replaced() {
        let k = Kernel::new("main")
            .arg("x", FLOAT64)
            .out_arg("y", Dtype::Unknown)
            .insn(assign("y", "y", Expr::call("sin", vec![Expr::var("x")])));
        let program = Program {
            entry: "main".into(),
            callables: CallablesTable::with_builtins().insert("main", Callable::kernel(k)),
        };
        let typed = infer_program(&program, true).unwrap();
        let main = typed.callables.get("main").unwrap().subkernel().unwrap();
        assert_eq!(dtype(main, "y"), Dtype::Known(FLOAT64));
        assert_eq!(
            main.instructions[0].expression(),
            Some(&Expr::call("sin_0", vec![Expr::var("x")]))
        );
        assert!(infer_program(
            &Program {
                entry: "sin".into(),
                callables: program.callables.clone()
            },
            true
        )
        .is_err());
    }
}
