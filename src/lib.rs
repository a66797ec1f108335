//! modelpath - a structural cache of compiled member-chain accessors
//!
//! View code names model values with lambdas such as `m => m.Address.City`.
//! Interpreting such a lambda on every render is slow, and compiling it on
//! every render is slower still. This crate compiles each distinct member
//! chain once and shares the accessor between every lambda with the same
//! shape, however many separate expression trees describe it.
//!
//! ```ignore
//! use modelpath::process;
//! use modelpath_core::{Lambda, eval};
//!
//! let city = Lambda::build("m", &person, |m| m.member("Address")?.member("City"))?;
//! let value = match process(&city) {
//!     Some(accessor) => accessor.invoke(&model)?,
//!     None => Some(eval(&city, &model)?),
//! };
//! ```
//!
//! Chains propagate nulls: `None` comes back when any link on the way is
//! null (or an empty nullable) instead of an error. Shapes the cache cannot
//! compile (indexers, calls, operators) return `None` from [`process`] and
//! are left to the interpreter.

pub mod cache;
pub mod classify;
pub mod compile;
pub mod key;
pub mod text;

// Re-export commonly used items for convenience
pub use cache::{CacheConfig, CacheStats, ExpressionCompiler, global, process};
pub use classify::{Link, Shape, classify};
pub use compile::CompiledAccessor;
pub use key::{MemberChainKey, MemberChainKeyComparer, MemberToken};
pub use text::{ExpressionTextCache, expression_text};
