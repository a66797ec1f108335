//! Host model for modelpath
//!
//! This crate contains the model the accessor cache works over: interned
//! names, type descriptors with member tokens, dynamic values, expression
//! trees and the slow-path interpreter. It does not cache anything; the
//! compiled-accessor cache lives in the `modelpath` crate.

pub mod error;
pub mod expr;
pub mod interner;
pub mod interpreter;
pub mod types;
pub mod value;

// Re-export commonly used items for convenience
pub use error::{ErrorKind, EvalError};
pub use expr::{BinaryOp, Expr, Lambda, Parameter};
pub use interner::Name;
pub use interpreter::{eval, eval_detached};
pub use types::{Member, MemberId, MemberKind, Method, Type, TypeDefinition, TypeId, TypeKind};
pub use value::{ArrayValue, Object, ObjectBuilder, Value};
