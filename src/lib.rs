//! Type inference for array-expression kernels.
//!
//! Given a kernel whose variables are only partially typed, [`resolve::infer_unknown_types`]
//! computes element types for the rest and specializes every function the kernel calls for the
//! argument types it is called at. Specializations live in a [`callables::CallablesTable`],
//! which is threaded through inference as a value.
#[macro_use]
pub mod common;
pub mod ast;
pub mod builtins;
pub mod callables;
pub mod check;
pub(crate) mod dataflow;
mod display;
pub(crate) mod infer;
pub mod kernel;
pub mod resolve;
pub mod rewrite;
pub mod subst;
pub mod types;

#[cfg(test)]
mod harness;

pub use common::{CompileError, ErrorKind, Result};
pub use kernel::{Dtype, Kernel};
pub use resolve::{
    infer_arg_and_reduction_types, infer_program, infer_unknown_types,
    infer_unknown_types_for_kernel, Program,
};
pub use types::ElementType;
