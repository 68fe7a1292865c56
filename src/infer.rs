//! The expression type evaluator.
//!
//! Evaluating an expression yields `Ok(None)` when nothing is known about its type yet (more
//! information may turn up on a later sweep), `Ok(Some(ty))` when it is determined, and an error
//! when the expression is inconsistent. The evaluator also resolves calls against the callables
//! table as it goes: each call that can be specialized is recorded together with the name its
//! specialization was stored under, so that the call site can be rewritten afterwards.
use crate::ast::{Call, Constant, Expr, FunctionRef, Reduction, ReductionBody, TypeTuple};
use crate::callables::{check_no_overwrite, ArgId, Callable, CallablesTable, IncomingTypes};
use crate::common::Result;
use crate::kernel::Kernel;
use crate::types::{combine, ElementType, ScalarKind, BOOL_REPR, COMPLEX64, FLOAT32, FLOAT64, INT_CONSTANT_LADDER};

use hashbrown::HashMap;
use itertools::Itertools;
use log::trace;
use smallvec::smallvec;
use std::collections::BTreeSet;
use std::convert::TryFrom;

/// Integer literals below this magnitude do not force promotion in sums and products.
pub(crate) const SMALL_INT_THRESHOLD: i128 = 1024;

/// Types found so far by the driver, overriding the kernel's declarations.
pub(crate) type Env = HashMap<String, ElementType>;

/// Side results of an evaluation, handed back to the driver to merge.
#[derive(Default, Debug)]
pub(crate) struct Findings {
    /// Variables whose (unknown) type was needed.
    pub unknown_symbols: BTreeSet<String>,
    /// Call nodes and the name of the specialization they resolved to.
    pub renames: HashMap<Call, String>,
}

pub(crate) struct TypeEvaluator<'a> {
    kernel: &'a Kernel,
    env: &'a Env,
    table: CallablesTable,
    found: Findings,
}

pub(crate) fn constant_type(c: &Constant) -> Result<ElementType> {
    match *c {
        Constant::Int { sized: Some(s), .. }
        | Constant::Float { sized: Some(s), .. }
        | Constant::Complex { sized: Some(s), .. } => Ok(s.into()),
        Constant::Int { value, sized: None } => {
            for s in INT_CONSTANT_LADDER.iter().cloned() {
                let fits = match s {
                    ScalarKind::Int32 => i32::try_from(value).is_ok(),
                    ScalarKind::Int64 => i64::try_from(value).is_ok(),
                    _ => false,
                };
                if fits {
                    return Ok(s.into());
                }
            }
            type_err!("integer constant '{}' too large", value)
        }
        // single precision unless asked otherwise
        Constant::Float { sized: None, .. } => Ok(FLOAT32),
        Constant::Complex { re, im, sized: None } => {
            if (re as f32) as f64 == re && (im as f32) as f64 == im {
                Ok(COMPLEX64)
            } else {
                type_err!(
                    "complex constant '{}' needs to be sized (as complex64 or complex128) for type inference",
                    c
                )
            }
        }
    }
}

impl<'a> TypeEvaluator<'a> {
    pub(crate) fn new(kernel: &'a Kernel, env: &'a Env, table: CallablesTable) -> Self {
        TypeEvaluator {
            kernel,
            env,
            table,
            found: Default::default(),
        }
    }

    pub(crate) fn finish(self) -> (CallablesTable, Findings) {
        (self.table, self.found)
    }

    /// Like `eval`, but an undetermined type is a (transient) error.
    pub(crate) fn eval_known(&mut self, e: &Expr) -> Result<ElementType> {
        match self.eval(e)? {
            Some(t) => Ok(t),
            None => dep_err!(
                "type of '{}' is not known yet (need type of: {})",
                e,
                self.found.unknown_symbols.iter().join(", ")
            ),
        }
    }

    pub(crate) fn eval(&mut self, e: &Expr) -> Result<Option<ElementType>> {
        match e {
            Expr::Constant(c) => constant_type(c).map(Some),
            Expr::Variable(name) => self.variable(name),
            Expr::Sum(cs) | Expr::Product(cs) => self.sum(cs),
            Expr::Quotient(n, d) => {
                let sets = [self.eval(n)?, self.eval(d)?];
                if sets.iter().flatten().all(ElementType::is_integral) {
                    // true division
                    Ok(Some(FLOAT64))
                } else {
                    combine(&sets)
                }
            }
            Expr::FloorDiv(l, r)
            | Expr::Remainder(l, r)
            | Expr::Power(l, r)
            | Expr::Shift(_, l, r) => {
                let sets = [self.eval(l)?, self.eval(r)?];
                combine(&sets)
            }
            Expr::Bitwise(_, cs) | Expr::Min(cs) | Expr::Max(cs) => {
                let sets = self.eval_all(cs)?;
                combine(&sets)
            }
            Expr::Comparison(_, l, r) => {
                self.eval(l)?;
                self.eval(r)?;
                Ok(Some(BOOL_REPR))
            }
            Expr::LogicalNot(c) => {
                self.eval(c)?;
                Ok(Some(BOOL_REPR))
            }
            Expr::LogicalAnd(cs) | Expr::LogicalOr(cs) => {
                self.eval_all(cs)?;
                Ok(Some(BOOL_REPR))
            }
            Expr::If(cond, then, els) => {
                self.eval(cond)?;
                let sets = [self.eval(then)?, self.eval(els)?];
                combine(&sets)
            }
            // index expressions do not contribute
            Expr::Subscript(agg, _) | Expr::LinearSubscript(agg, _) => self.eval(agg),
            Expr::Lookup(agg, field) => self.lookup(agg, field),
            Expr::TypeCast(ty, c) => {
                let sub = self.eval_known(c)?;
                if !sub.is_numeric() {
                    return err!("Can't cast a '{}' to '{}'", sub, ty);
                }
                Ok(Some(ty.clone()))
            }
            Expr::Call(call) => match self.call(call)? {
                Some(tys) => {
                    if tys.len() != 1 {
                        return err!(
                            "functions with more or fewer than one return value may only be used in direct assignments: '{}'",
                            e
                        );
                    }
                    Ok(tys.into_iter().next())
                }
                None => Ok(None),
            },
            Expr::Reduction(red) => {
                if red.is_tuple_typed() {
                    return err!(
                        "reductions with more or fewer than one return value may only be used in direct assignments: '{}'",
                        e
                    );
                }
                Ok(self.reduction(red, false)?.and_then(|tys| tys.into_iter().next()))
            }
            Expr::SubArrayRef { .. } => match e.begin_subscript() {
                Some(start) => self.eval(&start),
                None => Ok(None),
            },
            Expr::HwIndex(_) => Ok(Some(self.kernel.index_type.clone())),
        }
    }

    /// Types of a multiple-valued call or reduction, for assignments to several targets.
    pub(crate) fn eval_tuple(&mut self, e: &Expr) -> Result<Option<TypeTuple>> {
        match e {
            Expr::Call(call) => self.call(call),
            Expr::Reduction(red) => {
                if !red.is_tuple_typed() {
                    return err!(
                        "reduction '{}' has a single value but was used as a tuple",
                        e
                    );
                }
                self.reduction(red, true)
            }
            _ => err!("expression '{}' does not produce multiple values", e),
        }
    }

    fn eval_all(&mut self, cs: &[Expr]) -> Result<Vec<Option<ElementType>>> {
        cs.iter().map(|c| self.eval(c)).collect()
    }

    fn variable(&mut self, name: &str) -> Result<Option<ElementType>> {
        let kernel = self.kernel;
        if kernel.is_iname(name) {
            return Ok(Some(kernel.index_type.clone()));
        }
        // target symbols shadow arguments and temporaries of the same name
        if let Some((ty, _)) = kernel.mangle_symbol(name) {
            return Ok(Some(ty));
        }
        if let Some(ty) = self.env.get(name) {
            return Ok(Some(ty.clone()));
        }
        if let Some(var) = kernel.variable(name) {
            return match var.dtype.known() {
                Some(ty) => Ok(Some(ty.clone())),
                None => {
                    self.found.unknown_symbols.insert(name.into());
                    Ok(None)
                }
            };
        }
        if kernel.params.contains(name) {
            return Ok(Some(kernel.index_type.clone()));
        }
        type_err!("name not known in type inference: {}", name)
    }

    fn sum(&mut self, cs: &[Expr]) -> Result<Option<ElementType>> {
        let mut sets = Vec::with_capacity(cs.len());
        let mut small_ints = Vec::new();
        for c in cs {
            let ty = self.eval(c)?;
            if c.small_int_literal(SMALL_INT_THRESHOLD) {
                small_ints.push(ty);
            } else {
                sets.push(ty);
            }
        }
        if sets.iter().flatten().all(ElementType::is_integral) {
            sets.extend(small_ints);
        }
        combine(&sets)
    }

    fn lookup(&mut self, agg: &Expr, field: &str) -> Result<Option<ElementType>> {
        let agg_ty = match self.eval(agg)? {
            Some(t) => t,
            None => return Ok(None),
        };
        if !agg_ty.has_fields() {
            return err!(
                "cannot look up attribute '{}' in non-aggregate expression '{}'",
                field,
                agg
            );
        }
        match agg_ty.field(field) {
            Some(t) => Ok(Some(t.clone())),
            None => err!(
                "cannot look up attribute '{}' in aggregate expression '{}' of type '{}'",
                field,
                agg,
                agg_ty
            ),
        }
    }

    fn reduction(&mut self, red: &Reduction, tuple: bool) -> Result<Option<TypeTuple>> {
        match self.reduction_args(red, tuple)? {
            Some(args) => red.op.result_types(self.kernel, &args).map(Some),
            None => Ok(None),
        }
    }

    /// Types of the values a reduction folds over.
    pub(crate) fn reduction_args(&mut self, red: &Reduction, tuple: bool) -> Result<Option<TypeTuple>> {
        Ok(Some(match &red.body {
            ReductionBody::Tuple(es) => {
                let sets = self.eval_all(es)?;
                match sets.into_iter().collect::<Option<TypeTuple>>() {
                    Some(args) => args,
                    None => return Ok(None),
                }
            }
            ReductionBody::Single(body) if tuple => match &**body {
                Expr::Call(_) | Expr::Reduction(_) => match self.eval_tuple(body)? {
                    Some(args) => args,
                    None => return Ok(None),
                },
                _ => {
                    return err!(
                        "unknown reduction type for tuple reduction: '{}'",
                        body
                    )
                }
            },
            ReductionBody::Single(body) => match self.eval(body)? {
                Some(t) => smallvec![t],
                None => return Ok(None),
            },
        }))
    }

    fn call(&mut self, call: &Call) -> Result<Option<TypeTuple>> {
        let mut incoming = IncomingTypes::new();
        for (i, p) in call.params.iter().enumerate() {
            let ty = self.eval(p)?;
            incoming.insert(ArgId::Pos(i as i32), ty);
        }
        for (k, p) in call.kw_params.iter() {
            let ty = self.eval(p)?;
            incoming.insert(ArgId::Kw(k.clone()), ty);
        }
        match &call.function {
            FunctionRef::Resolved(name) => self.resolved_call(call, name, &incoming),
            FunctionRef::Name(name) => self.mangled_call(call, name, &incoming),
        }
    }

    fn resolved_call(
        &mut self,
        call: &Call,
        name: &str,
        incoming: &IncomingTypes,
    ) -> Result<Option<TypeTuple>> {
        let callable = match self.table.get(name) {
            Some(c) => c.clone(),
            None => return err!("function '{}' is not in the callables table", name),
        };
        check_no_overwrite(callable.arg_types.as_ref(), incoming)?;
        let table = std::mem::take(&mut self.table);
        let (specialized, table) = callable.with_types(incoming, self.kernel, table)?;
        let ret = match specialized.return_types() {
            Some(ret) => ret,
            // no rename yet: an unchanged callable would dedupe back to `name` anyway
            None => {
                self.table = table;
                return Ok(None);
            }
        };
        let (table, new_name) = table.with_callable(name, specialized)?;
        trace!(
            "{}: {} specialized as {} -> ({})",
            self.kernel.name,
            name,
            new_name,
            ret.iter().join(", ")
        );
        self.table = table;
        self.found.renames.insert(call.clone(), new_name);
        Ok(Some(ret))
    }

    /// Bare names go through the kernel's function manglers, and only once every positional
    /// argument type is known.
    fn mangled_call(
        &mut self,
        call: &Call,
        name: &str,
        incoming: &IncomingTypes,
    ) -> Result<Option<TypeTuple>> {
        let mut known = Vec::new();
        for (id, ty) in incoming.iter() {
            match (id, ty) {
                (ArgId::Pos(_), Some(ty)) => known.push(ty.clone()),
                (ArgId::Pos(_), None) => return Ok(None),
                (ArgId::Kw(_), _) => {}
            }
        }
        let kernel = self.kernel;
        let found = kernel
            .function_manglers
            .iter()
            .find_map(|m| (m.f)(kernel, name, &known).map(|res| (*m, res)));
        let (mangler, res) = match found {
            Some(found) => found,
            None => return Ok(None),
        };
        let ret = res.result_types.clone();
        let callable = Callable::mangled(name, mangler, res);
        let table = std::mem::take(&mut self.table);
        let (table, new_name) = table.with_added_callable(name, callable)?;
        trace!(
            "{}: {} matched by mangler {} as {}",
            kernel.name,
            name,
            mangler.name,
            new_name
        );
        self.table = table;
        self.found.renames.insert(call.clone(), new_name);
        Ok(Some(ret))
    }
}
