//! Helpers for running inference on hand-built kernels, and an end-to-end test suite.
//!
//! Every kernel run through `run_inference` is inferred twice: the second run, on the typed
//! kernel and the extended table, must change nothing.
use crate::ast::{Assignee, Expr, Instruction};
use crate::callables::CallablesTable;
use crate::common::Result;
use crate::kernel::Kernel;
use crate::resolve::infer_unknown_types;

const _PRINT_DEBUG_INFO: bool = false;

pub(crate) fn assign(id: &str, to: &str, e: Expr) -> Instruction {
    Instruction::assign(id, Assignee::Var(to.into()), e)
}

pub(crate) fn assign_at(id: &str, to: &str, index: Vec<Expr>, e: Expr) -> Instruction {
    Instruction::assign(id, Assignee::Subscript(to.into(), index), e)
}

pub(crate) fn run_inference(
    kernel: &Kernel,
    table: &CallablesTable,
) -> Result<(Kernel, CallablesTable)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let (typed, table) = infer_unknown_types(kernel, table, true)?;
    if _PRINT_DEBUG_INFO {
        eprintln!("{}", typed);
        for (name, c) in table.iter() {
            eprintln!("  {} => {}", name, c);
        }
    }
    let (again, table2) = infer_unknown_types(&typed, &table, true)?;
    assert_eq!(typed, again, "second inference run changed the kernel");
    assert_eq!(table, table2, "second inference run changed the callables table");
    Ok((typed, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CmpOp, ReductionOp};
    use crate::common::ErrorKind;
    use crate::kernel::Dtype;
    use crate::types::*;

    macro_rules! test_inference {
        ($desc:ident, $kernel:expr, @types [ $($i:ident :: $ty:expr),* ]) => {
            test_inference!($desc, $kernel, @table CallablesTable::with_builtins(), @types [$($i :: $ty),*]);
        };
        ($desc:ident, $kernel:expr, @table $table:expr,
         @types [ $($i:ident :: $ty:expr),* ]) => {
            #[test]
            fn $desc() {
                let kernel: Kernel = $kernel;
                match run_inference(&kernel, &$table) {
                    Ok((typed, _)) => {
                        $(
                            assert_eq!(
                                typed.variable(stringify!($i)).map(|v| v.dtype.clone()),
                                Some(Dtype::Known($ty)),
                                "Expected {} to have type {}\n{}",
                                stringify!($i), $ty, typed,
                            );
                        )*
                    }
                    Err(e) => panic!("failed to infer types: {}\n{}", e, kernel),
                }
            }
        };
    }

    test_inference!(
        small_integers_do_not_widen,
        Kernel::new("k")
            .arg("x", FLOAT32)
            .temp("y", Dtype::Unknown)
            .temp("z", Dtype::Unknown)
            .insn(assign("y", "y", Expr::sum(vec![Expr::var("x"), Expr::int(1)])))
            .insn(assign("z", "z", Expr::sum(vec![Expr::int(1), Expr::int(2)]))),
        @types [y :: FLOAT32, z :: INT32]
    );

    test_inference!(
        division_is_true_division,
        Kernel::new("k")
            .arg("a", INT32)
            .arg("b", INT32)
            .out_arg("q", Dtype::Unknown)
            .insn(assign("q", "q", Expr::quotient(Expr::var("a"), Expr::var("b")))),
        @types [q :: FLOAT64]
    );

    test_inference!(
        int32_and_float32,
        Kernel::new("k")
            .arg("a", INT32)
            .arg("f", FLOAT32)
            .arg("l", INT64)
            .temp("p", Dtype::Unknown)
            .temp("w", Dtype::Unknown)
            .insn(assign("p", "p", Expr::product(vec![Expr::var("a"), Expr::var("f")])))
            .insn(assign("w", "w", Expr::product(vec![Expr::var("l"), Expr::var("f")]))),
        @types [p :: FLOAT32, w :: FLOAT64]
    );

    test_inference!(
        comparisons_are_int32,
        Kernel::new("k")
            .arg("a", FLOAT64)
            .temp("c", Dtype::Auto)
            .insn(assign("c", "c", Expr::cmp(CmpOp::Ge, Expr::var("a"), Expr::float(0.0)))),
        @types [c :: INT32]
    );

    test_inference!(
        mutual_recursion_with_a_seed,
        Kernel::new("k")
            .arg("x", FLOAT32)
            .temp("a", Dtype::Unknown)
            .temp("b", Dtype::Unknown)
            .insn(assign("a0", "a", Expr::var("x")))
            .insn(assign("a1", "a", Expr::var("b")))
            .insn(assign("b", "b", Expr::sum(vec![Expr::var("a"), Expr::int(1)]))),
        @types [a :: FLOAT32, b :: FLOAT32]
    );

    test_inference!(
        accumulator_widens,
        Kernel::new("k")
            .arg("x", FLOAT64)
            .temp("s", Dtype::Unknown)
            .iname("i")
            .insn(assign("s0", "s", Expr::int(0)))
            .insn(assign(
                "s1",
                "s",
                Expr::sum(vec![Expr::var("s"), Expr::sub("x", vec![Expr::var("i")])])
            )),
        @types [s :: FLOAT64]
    );

    test_inference!(
        chains_resolve_in_dependency_order,
        Kernel::new("k")
            .arg("x", UINT16)
            .out_arg("d", Dtype::Unknown)
            .temp("c", Dtype::Unknown)
            .temp("b", Dtype::Unknown)
            .iname("i")
            .insn(assign_at("d", "d", vec![Expr::var("i")], Expr::var("c")))
            .insn(assign("c", "c", Expr::product(vec![Expr::var("b"), Expr::var("b")])))
            .insn(assign("b", "b", Expr::sub("x", vec![Expr::var("i")]))),
        @types [b :: UINT16, c :: UINT16, d :: UINT16]
    );

    test_inference!(
        builtin_calls,
        Kernel::new("k")
            .arg("x", FLOAT32)
            .arg("n", INT16)
            .temp("s", Dtype::Unknown)
            .temp("r", Dtype::Unknown)
            .temp("m", Dtype::Unknown)
            .insn(assign("s", "s", Expr::call("sqrt", vec![Expr::var("x")])))
            .insn(assign("r", "r", Expr::call("sqrt", vec![Expr::var("n")])))
            .insn(assign(
                "m",
                "m",
                Expr::call("max", vec![Expr::var("n"), Expr::sized_int(3, ScalarKind::Int8)])
            )),
        @types [s :: FLOAT32, r :: FLOAT64, m :: INT16]
    );

    test_inference!(
        legacy_math_functions,
        Kernel::new("k")
            .arg("x", FLOAT32)
            .arg("d", FLOAT64)
            .temp("y", Dtype::Unknown)
            .temp("z", Dtype::Unknown)
            .insn(assign("y", "y", Expr::call_name("fabs", vec![Expr::var("x")])))
            .insn(assign(
                "z",
                "z",
                Expr::call_name("fmax", vec![Expr::var("x"), Expr::var("d")])
            )),
        @types [y :: FLOAT32, z :: FLOAT64]
    );

    test_inference!(
        named_constants,
        Kernel::new("k")
            .arg("x", FLOAT32)
            .temp("y", Dtype::Unknown)
            .insn(assign("y", "y", Expr::product(vec![Expr::var("x"), Expr::var("M_PI")]))),
        @types [y :: FLOAT64]
    );

    test_inference!(
        named_constants_shadow_arguments,
        Kernel::new("k")
            .arg("M_PI", INT8)
            .temp("y", Dtype::Unknown)
            .insn(assign("y", "y", Expr::var("M_PI"))),
        @types [y :: FLOAT64]
    );

    test_inference!(
        sized_literals_defer,
        Kernel::new("k")
            .arg("x", FLOAT32)
            .temp("y", Dtype::Unknown)
            .insn(assign(
                "y",
                "y",
                Expr::sum(vec![Expr::var("x"), Expr::sized_int(1, ScalarKind::Int64)])
            )),
        @types [y :: FLOAT32]
    );

    test_inference!(
        substitution_rules,
        Kernel::new("k")
            .arg("x", INT8)
            .arg("f", FLOAT32)
            .temp("y", Dtype::Unknown)
            .temp("z", Dtype::Unknown)
            .subst("sq", &["a"], Expr::product(vec![Expr::var("a"), Expr::var("a")]))
            .insn(assign("y", "y", Expr::call_name("sq", vec![Expr::var("x")])))
            .insn(assign(
                "z",
                "z",
                Expr::call("sin", vec![Expr::call_name("sq", vec![Expr::var("f")])])
            )),
        @types [y :: INT8, z :: FLOAT32]
    );

    test_inference!(
        vector_fields,
        Kernel::new("k")
            .arg("v", ElementType::vector(ScalarKind::Float64, 4))
            .temp("w", Dtype::Unknown)
            .temp("s", Dtype::Unknown)
            .insn(assign("w", "w", Expr::product(vec![Expr::var("v"), Expr::int(2)])))
            .insn(assign("s", "s", Expr::lookup(Expr::var("w"), "z"))),
        @types [w :: ElementType::vector(ScalarKind::Float64, 4), s :: FLOAT64]
    );

    test_inference!(
        reductions,
        Kernel::new("k")
            .arg("x", FLOAT32)
            .temp("total", Dtype::Unknown)
            .iname("j")
            .insn(assign(
                "total",
                "total",
                Expr::reduce(ReductionOp::Sum, &["j"], Expr::sub("x", vec![Expr::var("j")]))
            )),
        @types [total :: FLOAT32]
    );

    #[test]
    fn cycles_without_a_seed_fail() {
        let k = Kernel::new("k")
            .temp("a", Dtype::Unknown)
            .temp("b", Dtype::Unknown)
            .insn(assign("a", "a", Expr::var("b")))
            .insn(assign("b", "b", Expr::var("a")));
        let e = run_inference(&k, &CallablesTable::with_builtins()).unwrap_err();
        assert_eq!(e.kind, ErrorKind::TypeInference);
        assert!(e.msg.contains("could not determine type of 'a'"), "{}", e);
        assert!(e.msg.contains("need type of 'b'"), "{}", e);
        let (typed, _) = infer_unknown_types(&k, &CallablesTable::with_builtins(), false).unwrap();
        assert_eq!(typed.variable("a").unwrap().dtype, Dtype::Unknown);
    }

    #[test]
    fn unknown_functions_are_reported() {
        let k = Kernel::new("k")
            .arg("x", INT32)
            .out_arg("y", FLOAT32)
            .insn(assign("y", "y", Expr::call_name("frobnicate", vec![Expr::var("x")])));
        let e = run_inference(&k, &CallablesTable::with_builtins()).unwrap_err();
        assert!(e.msg.contains("unknown function 'frobnicate'"), "{}", e);
    }

    #[test]
    fn type_errors_propagate() {
        let k = Kernel::new("k")
            .arg("x", FLOAT32)
            .temp("y", Dtype::Unknown)
            .insn(assign("y", "y", Expr::sum(vec![Expr::var("x"), Expr::complex(0.0, 0.1)])));
        let e = run_inference(&k, &CallablesTable::with_builtins()).unwrap_err();
        assert_eq!(e.kind, ErrorKind::TypeInference);
        let k = Kernel::new("k")
            .arg("v", ElementType::vector(ScalarKind::Float32, 2))
            .temp("y", Dtype::Unknown)
            .insn(assign("y", "y", Expr::lookup(Expr::var("v"), "w")));
        let e = run_inference(&k, &CallablesTable::with_builtins()).unwrap_err();
        assert_eq!(e.kind, ErrorKind::Contract);
    }
}
