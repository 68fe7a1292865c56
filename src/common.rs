//! This file contains common type definitions and utilities used in other parts of the project.
use hashbrown::HashSet;
use std::collections::VecDeque;
use std::hash::Hash;
pub(crate) type NumTy = u32;
pub(crate) type NodeIx = petgraph::graph::NodeIndex<NumTy>;
pub(crate) type Graph<V, E> = petgraph::Graph<V, E, petgraph::Directed, NumTy>;
pub type Result<T> = std::result::Result<T, CompileError>;

/// The three failure modes of inference.
///
/// `DependencyUnknown` is the only recoverable one: it means "some input type is not known yet"
/// and is absorbed by the fixed-point driver. `TypeInference` is a genuine type error inside an
/// expression, and `Contract` covers malformed kernels (bad field names, arity mismatches,
/// conflicting specializations).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    DependencyUnknown,
    TypeInference,
    Contract,
}

#[derive(Clone, Debug)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub msg: String,
}

impl CompileError {
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::DependencyUnknown
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for CompileError {}

macro_rules! error_of_kind {
    ($kind:ident, $head:expr) => {
        Err($crate::common::CompileError {
            kind: $crate::common::ErrorKind::$kind,
            msg: format!(concat!("[", file!(), ":", line!(), ":", column!(), "] ", $head)),
        })
    };
    ($kind:ident, $head:expr, $($t:expr),+) => {
        Err($crate::common::CompileError {
            kind: $crate::common::ErrorKind::$kind,
            msg: format!(
                concat!("[", file!(), ":", line!(), ":", column!(), "] ", $head),
                $($t),*
            ),
        })
    };
}

/// A malformed kernel or a violated contract. Never retried.
macro_rules! err {
    ($($t:tt)*) => { error_of_kind!(Contract, $($t)*) };
}

/// A genuine type error inside an expression.
macro_rules! type_err {
    ($($t:tt)*) => { error_of_kind!(TypeInference, $($t)*) };
}

/// Not enough is known yet; the driver will try again later.
macro_rules! dep_err {
    ($($t:tt)*) => { error_of_kind!(DependencyUnknown, $($t)*) };
}

macro_rules! static_map {
    ($name:ident<$kty:ty, $vty:ty>, $([$k:expr, $v:expr]),*) => {
        lazy_static::lazy_static! {
            pub(crate) static ref $name: hashbrown::HashMap<$kty,$vty> = {
                let mut m = hashbrown::HashMap::new();
                $(
                    m.insert($k, $v);
                )*
                m
            };
        }
    }
}

pub(crate) struct WorkList<T> {
    set: HashSet<T>,
    mem: VecDeque<T>,
}

impl<T: Hash + Eq> Default for WorkList<T> {
    fn default() -> WorkList<T> {
        WorkList {
            set: Default::default(),
            mem: Default::default(),
        }
    }
}

impl<T: Clone + Hash + Eq> WorkList<T> {
    pub(crate) fn insert(&mut self, t: T) {
        if self.set.insert(t.clone()) {
            self.mem.push_back(t)
        }
    }
    pub(crate) fn extend(&mut self, ts: impl Iterator<Item = T>) {
        for t in ts {
            self.insert(t);
        }
    }
    pub(crate) fn pop(&mut self) -> Option<T> {
        let next = self.mem.pop_front()?;
        let _was_there = self.set.remove(&next);
        debug_assert!(_was_there);
        Some(next)
    }
    pub(crate) fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_elems<T: Clone + Hash + Eq>(wl: &mut WorkList<T>) -> HashSet<T> {
        let mut res = HashSet::default();
        while let Some(e) = wl.pop() {
            assert!(res.insert(e));
        }
        res
    }

    #[test]
    fn worklist_elems() {
        let mut wl = WorkList::<i32>::default();
        for i in 0..10 {
            wl.insert(i);
        }
        assert_eq!(get_elems(&mut wl), (0i32..10).collect());
    }

    #[test]
    fn worklist_idempotent() {
        let mut wl = WorkList::<i32>::default();
        wl.extend(0..10);
        for i in 0..10 {
            wl.insert(i);
        }
        assert_eq!(get_elems(&mut wl), (0i32..10).collect());
    }

    #[test]
    fn worklist_fifo_and_reinsert() {
        let mut wl = WorkList::<&str>::default();
        wl.extend(vec!["a", "b"].into_iter());
        assert_eq!(wl.pop(), Some("a"));
        wl.insert("a");
        assert_eq!(wl.pop(), Some("b"));
        assert_eq!(wl.pop(), Some("a"));
        assert!(wl.is_empty());
    }

    #[test]
    fn error_kinds() {
        fn fails() -> Result<()> {
            dep_err!("need type of {}", "x")
        }
        let e = fails().unwrap_err();
        assert!(e.is_transient());
        assert!(e.msg.ends_with("need type of x"), "{}", e);
        let e: Result<()> = type_err!("bad");
        assert_eq!(e.unwrap_err().kind, ErrorKind::TypeInference);
        let e: Result<()> = err!("malformed");
        assert_eq!(e.unwrap_err().kind, ErrorKind::Contract);
    }
}
