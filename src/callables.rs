//! Callable descriptors and the transactional table that holds them.
//!
//! The table is a value: every operation that extends it consumes it and hands back the new
//! version, so a caller that keeps the old value keeps an unmodified snapshot. Specializations
//! are only created in "edit mode". Edit transactions nest; only the outermost commit makes the
//! pending entries count as committed.
use crate::ast::TypeTuple;
use crate::builtins::{Function, FUNCTIONS};
use crate::common::{Result, WorkList};
use crate::kernel::{Dtype, FunctionMangler, Kernel, MangleResult};
use crate::resolve;
use crate::types::{can_cast_safely, ElementType, ScalarKind};

use hashbrown::HashSet;
use log::debug;
use std::collections::BTreeMap;

/// Identifies an argument of a call. Positional ids from 0 upward are inputs; the return
/// values occupy -1, -2, ...
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgId {
    Pos(i32),
    Kw(String),
}

impl ArgId {
    pub fn ret(i: usize) -> ArgId {
        ArgId::Pos(-(i as i32) - 1)
    }
}

pub type ArgTypes = BTreeMap<ArgId, ElementType>;

/// What a call site knows about its arguments.
pub type IncomingTypes = BTreeMap<ArgId, Option<ElementType>>;

/// Return slots in order -1, -2, ... up to the first gap.
pub fn return_types(arg_types: &ArgTypes) -> TypeTuple {
    (0..)
        .map(|i| arg_types.get(&ArgId::ret(i)))
        .take_while(Option::is_some)
        .flatten()
        .cloned()
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub enum CallableKind {
    /// A statically declared overload set.
    Builtin(Function),
    /// Produced by a function mangler for one fixed signature.
    Mangled {
        mangler: FunctionMangler,
        target_name: String,
    },
    /// A callee kernel; specializing it runs inference on it.
    Kernel(Box<Kernel>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Callable {
    /// The function's own name, which fresh specialization names are derived from.
    pub name: String,
    pub arg_types: Option<ArgTypes>,
    pub kind: CallableKind,
}

impl Callable {
    pub fn builtin(f: Function) -> Callable {
        Callable {
            name: f.name().into(),
            arg_types: None,
            kind: CallableKind::Builtin(f),
        }
    }

    pub fn kernel(k: Kernel) -> Callable {
        Callable {
            name: k.name.clone(),
            arg_types: None,
            kind: CallableKind::Kernel(Box::new(k)),
        }
    }

    /// The one-signature callable a function mangler matched.
    pub fn mangled(name: &str, mangler: FunctionMangler, m: MangleResult) -> Callable {
        let mut arg_types: ArgTypes = m
            .arg_types
            .into_iter()
            .enumerate()
            .map(|(i, t)| (ArgId::Pos(i as i32), t))
            .collect();
        for (i, t) in m.result_types.into_iter().enumerate() {
            arg_types.insert(ArgId::ret(i), t);
        }
        Callable {
            name: name.into(),
            arg_types: Some(arg_types),
            kind: CallableKind::Mangled {
                mangler,
                target_name: m.target_name,
            },
        }
    }

    /// `None` until the result types are known.
    pub fn return_types(&self) -> Option<TypeTuple> {
        let res = return_types(self.arg_types.as_ref()?);
        if res.is_empty() {
            None
        } else {
            Some(res)
        }
    }

    pub fn subkernel(&self) -> Option<&Kernel> {
        match &self.kind {
            CallableKind::Kernel(k) => Some(k),
            CallableKind::Builtin(_) | CallableKind::Mangled { .. } => None,
        }
    }

    /// Names of table entries this callable refers to.
    fn callees(&self) -> Vec<String> {
        match &self.kind {
            CallableKind::Kernel(k) => k.called_functions().into_iter().collect(),
            CallableKind::Builtin(_) | CallableKind::Mangled { .. } => Vec::new(),
        }
    }

    fn positional(&self, incoming: &IncomingTypes) -> Result<Vec<Option<ElementType>>> {
        let mut res = Vec::new();
        for (id, ty) in incoming.iter() {
            match id {
                ArgId::Pos(i) if *i >= 0 => {
                    let i = *i as usize;
                    if res.len() <= i {
                        res.resize(i + 1, None);
                    }
                    res[i] = ty.clone();
                }
                ArgId::Pos(_) => {}
                ArgId::Kw(k) => {
                    return err!("function '{}' does not take keyword argument '{}'", self.name, k)
                }
            }
        }
        Ok(res)
    }

    /// Specialize this callable for the incoming argument types. The result is unchanged
    /// (and so reports no return types if it was generic) when not enough is known.
    pub fn with_types(
        &self,
        incoming: &IncomingTypes,
        caller: &Kernel,
        table: CallablesTable,
    ) -> Result<(Callable, CallablesTable)> {
        match &self.kind {
            CallableKind::Builtin(f) => {
                let args = self.positional(incoming)?;
                let (arg_tys, res) = match f.specialize(&args)? {
                    Some(sig) => sig,
                    None => return Ok((self.clone(), table)),
                };
                let mut arg_types: ArgTypes = arg_tys
                    .into_iter()
                    .enumerate()
                    .map(|(i, t)| (ArgId::Pos(i as i32), t))
                    .collect();
                arg_types.insert(ArgId::ret(0), res);
                Ok((
                    Callable {
                        arg_types: Some(arg_types),
                        ..self.clone()
                    },
                    table,
                ))
            }
            CallableKind::Mangled { mangler, .. } => {
                let args = self.positional(incoming)?;
                let known: Vec<ElementType> = match args.into_iter().collect::<Option<Vec<_>>>() {
                    Some(k) => k,
                    None => return Ok((self.clone(), table)),
                };
                match (mangler.f)(caller, &self.name, &known) {
                    Some(m) => Ok((Callable::mangled(&self.name, *mangler, m), table)),
                    None => type_err!(
                        "no variant of '{}' takes arguments of type ({})",
                        self.name,
                        itertools::join(known.iter(), ", ")
                    ),
                }
            }
            CallableKind::Kernel(k) => self.specialize_kernel(k, incoming, table),
        }
    }

    fn specialize_kernel(
        &self,
        callee: &Kernel,
        incoming: &IncomingTypes,
        table: CallablesTable,
    ) -> Result<(Callable, CallablesTable)> {
        let inputs: Vec<String> = callee.input_args().map(|a| a.name.clone()).collect();
        let mut callee = callee.clone();
        for (id, ty) in incoming.iter() {
            let ty = match ty {
                Some(ty) => ty,
                None => continue,
            };
            let name = match id {
                ArgId::Pos(i) if *i >= 0 => match inputs.get(*i as usize) {
                    Some(name) => name.as_str(),
                    None => {
                        return err!(
                            "kernel '{}' takes {} arguments, got argument {}",
                            callee.name,
                            inputs.len(),
                            i
                        )
                    }
                },
                ArgId::Pos(_) => continue,
                ArgId::Kw(k) if inputs.contains(k) => k.as_str(),
                ArgId::Kw(k) => {
                    return err!("kernel '{}' has no input argument '{}'", callee.name, k)
                }
            };
            let var = match callee.variable(name) {
                Some(var) if !var.dtype.is_known() => var.with_dtype(Dtype::Known(ty.clone())),
                // a declared type wins; the caller's value is converted at the call
                _ => continue,
            };
            callee = callee.with_variable(var);
        }
        if callee.input_args().any(|a| !a.dtype.is_known()) {
            return Ok((self.clone(), table));
        }
        let (typed, table) = resolve::infer_unknown_types_for_kernel(&callee, table, true)?;
        let mut arg_types = ArgTypes::new();
        for (i, a) in typed.input_args().enumerate() {
            if let Some(t) = a.dtype.known() {
                arg_types.insert(ArgId::Pos(i as i32), t.clone());
            }
        }
        for (i, a) in typed.output_args().enumerate() {
            match a.dtype.known() {
                Some(t) => arg_types.insert(ArgId::ret(i), t.clone()),
                None => return err!("could not determine type of output '{}' of '{}'", a.name, typed.name),
            };
        }
        Ok((
            Callable {
                name: self.name.clone(),
                arg_types: Some(arg_types),
                kind: CallableKind::Kernel(Box::new(typed)),
            },
            table,
        ))
    }
}

/// Unsigned to signed of the same width is tolerated, as is any type that converts safely into
/// the one already recorded.
fn compatible_respecialization(old: &ElementType, new: &ElementType) -> bool {
    use ScalarKind::*;
    match (old.scalar(), new.scalar()) {
        (Some(UInt32), Some(Int32)) | (Some(UInt64), Some(Int64)) => true,
        _ => can_cast_safely(new, old),
    }
}

/// A callable that was specialized once keeps its contract: no call site may present a
/// different type for an argument it already has a type for.
pub fn check_no_overwrite(old: Option<&ArgTypes>, new: &IncomingTypes) -> Result<()> {
    let old = match old {
        Some(old) => old,
        None => return Ok(()),
    };
    for (id, ty) in new.iter() {
        let (prev, ty) = match (old.get(id), ty) {
            (Some(prev), Some(ty)) => (prev, ty),
            _ => continue,
        };
        if prev != ty && !compatible_respecialization(prev, ty) {
            return err!(
                "Overwriting a specialized function is illegal: argument {:?} has type '{}', call site passes '{}'",
                id,
                prev,
                ty
            );
        }
    }
    Ok(())
}

/// Where an edit transaction started.
#[derive(Debug)]
pub struct EditCheckpoint {
    depth: usize,
    committed_count: usize,
    pending_len: usize,
    saved: BTreeMap<String, Callable>,
}

impl EditCheckpoint {
    pub fn is_outermost(&self) -> bool {
        self.depth == 0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallablesTable {
    entries: BTreeMap<String, Callable>,
    /// Entries added in the current (outermost) transaction, in insertion order.
    pending: Vec<String>,
    committed_count: usize,
    edit_depth: usize,
}

impl CallablesTable {
    pub fn new() -> CallablesTable {
        Default::default()
    }

    /// A table with every builtin function registered under its own name.
    pub fn with_builtins() -> CallablesTable {
        let mut fs: Vec<Function> = FUNCTIONS.values().cloned().collect();
        fs.sort_by_key(|f| f.name());
        fs.into_iter()
            .fold(CallablesTable::new(), |t, f| t.insert(f.name(), Callable::builtin(f)))
    }

    pub fn get(&self, name: &str) -> Option<&Callable> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Callable)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn in_edit_mode(&self) -> bool {
        self.edit_depth > 0
    }

    pub fn committed_count(&self) -> usize {
        self.committed_count
    }

    /// Register (or replace) `callable` under exactly `name`.
    pub fn insert(mut self, name: &str, callable: Callable) -> CallablesTable {
        let fresh = self.entries.insert(name.into(), callable).is_none();
        if !self.in_edit_mode() {
            self.committed_count = self.entries.len();
        } else if fresh {
            self.pending.push(name.into());
        }
        self
    }

    /// Store a specialization of the table entry `function`. An identical callable that is
    /// already present is reused; otherwise the callable gets a fresh `<name>_<n>` name.
    pub fn with_callable(
        self,
        function: &str,
        callable: Callable,
    ) -> Result<(CallablesTable, String)> {
        if !self.contains(function) {
            return err!("unknown function '{}'", function);
        }
        let base = callable.name.clone();
        self.store(&base, callable)
    }

    /// Store a callable for a name that has no entry in the table (the mangler path).
    pub fn with_added_callable(
        self,
        function: &str,
        callable: Callable,
    ) -> Result<(CallablesTable, String)> {
        self.store(function, callable)
    }

    fn store(mut self, base: &str, callable: Callable) -> Result<(CallablesTable, String)> {
        if !self.in_edit_mode() {
            return err!(
                "cannot add a specialization of '{}' outside of edit mode",
                base
            );
        }
        if let Some((name, _)) = self.entries.iter().find(|(_, c)| **c == callable) {
            let name = name.clone();
            return Ok((self, name));
        }
        let mut i = 0;
        let name = loop {
            let candidate = format!("{}_{}", base, i);
            if !self.entries.contains_key(&candidate) {
                break candidate;
            }
            i += 1;
        };
        self.entries.insert(name.clone(), callable);
        self.pending.push(name.clone());
        Ok((self, name))
    }

    pub fn begin_edit(mut self) -> (CallablesTable, EditCheckpoint) {
        let cp = EditCheckpoint {
            depth: self.edit_depth,
            committed_count: self.committed_count,
            pending_len: self.pending.len(),
            saved: self.entries.clone(),
        };
        self.edit_depth += 1;
        (self, cp)
    }

    fn check_balanced(&self, cp: &EditCheckpoint) -> Result<()> {
        if self.edit_depth != cp.depth + 1 {
            return err!(
                "unbalanced edit mode: transaction opened at depth {}, closed at depth {}",
                cp.depth,
                self.edit_depth
            );
        }
        Ok(())
    }

    /// Close a transaction. Closing the outermost one commits everything pending.
    pub fn commit_edit(mut self, cp: EditCheckpoint) -> Result<CallablesTable> {
        self.check_balanced(&cp)?;
        self.edit_depth -= 1;
        if self.edit_depth == 0 {
            self.pending.clear();
            self.committed_count = self.entries.len();
        }
        Ok(self)
    }

    /// Close a transaction, dropping everything it added or replaced.
    pub fn discard_edit(mut self, cp: EditCheckpoint) -> Result<CallablesTable> {
        self.check_balanced(&cp)?;
        self.entries = cp.saved;
        self.pending.truncate(cp.pending_len);
        self.committed_count = cp.committed_count;
        self.edit_depth = cp.depth;
        Ok(self)
    }

    /// Drop pending entries that are not reachable from `roots` or from any committed entry.
    pub fn retain_reachable(mut self, roots: impl IntoIterator<Item = String>) -> CallablesTable {
        let pending: HashSet<String> = self.pending.iter().cloned().collect();
        let mut reached = HashSet::new();
        let mut wl = WorkList::default();
        wl.extend(roots.into_iter());
        wl.extend(
            self.entries
                .keys()
                .filter(|k| !pending.contains(*k))
                .cloned(),
        );
        while let Some(name) = wl.pop() {
            if !reached.insert(name.clone()) {
                continue;
            }
            if let Some(c) = self.entries.get(&name) {
                wl.extend(c.callees().into_iter().filter(|c| !reached.contains(c)));
            }
        }
        let before = self.entries.len();
        self.entries
            .retain(|name, _| !pending.contains(name) || reached.contains(name));
        self.pending.retain(|name| reached.contains(name));
        if before != self.entries.len() {
            debug!(
                "dropped {} unreferenced specializations",
                before - self.entries.len()
            );
        }
        self
    }
}
