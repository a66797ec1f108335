//! Compiled accessors.
//!
//! An accessor evaluates one classified shape against a model value. Chain
//! accessors propagate nulls: the first link that yields null ends the
//! evaluation with `Ok(None)`.

use std::fmt;
use std::sync::Arc;

use modelpath_core::{EvalError, Member, Type, Value};

use crate::classify::Link;

/// Type alias for the accessor body.
pub type AccessorFn = dyn Fn(&Value) -> Result<Option<Value>, EvalError> + Send + Sync;

/// A compiled accessor: `model -> Option<value>`.
///
/// `Ok(None)` means "no value" (a null link on the way, or a null result).
/// Cheap to clone; clones share the compiled body.
#[derive(Clone)]
pub struct CompiledAccessor(Arc<AccessorFn>);

impl CompiledAccessor {
    fn new<F>(body: F) -> Self
    where
        F: Fn(&Value) -> Result<Option<Value>, EvalError> + Send + Sync + 'static,
    {
        CompiledAccessor(Arc::new(body))
    }

    #[inline]
    pub fn invoke(&self, model: &Value) -> Result<Option<Value>, EvalError> {
        (self.0)(model)
    }

    /// Whether both handles share one compiled body.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CompiledAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompiledAccessor({:p})", Arc::as_ptr(&self.0))
    }
}

fn present(value: Value) -> Option<Value> {
    if value.is_null() { None } else { Some(value) }
}

// ============================================================================
// Chains
// ============================================================================

/// Owned form of a link, closed over by the accessor.
struct Step {
    member: Member,
    /// Result may be null (reference or nullable type); checked after the read
    check_null: bool,
}

impl From<&Link<'_>> for Step {
    fn from(link: &Link<'_>) -> Self {
        let member = link.member();
        Step {
            member: member.clone(),
            check_null: member.ty().can_be_null(),
        }
    }
}

/// Compile `root => root.L1.L2...` with null propagation.
///
/// A `NullableUnwrap` link is always preceded by a null check on the
/// nullable it unwraps (the nullable type can be null), so `Value` is never
/// read off an empty nullable. Null checks are identity checks on
/// `Value::Null`; user equality operators never run.
pub fn chain(root: &Type, links: &[Link<'_>]) -> CompiledAccessor {
    let root = root.clone();
    let steps: Box<[Step]> = links.iter().map(Step::from).collect();
    CompiledAccessor::new(move |model| {
        if model.is_null() {
            if root.can_be_null() {
                return Ok(None);
            }
            return Err(EvalError::type_mismatch(format!(
                "null is not a valid {root}"
            )));
        }
        if !root.accepts(model) {
            return Err(EvalError::type_mismatch(format!(
                "accessor expects {root}, got {}",
                model.type_name()
            )));
        }
        let mut current = model.clone();
        for step in steps.iter() {
            current = step.member.read(&current)?;
            if step.check_null && current.is_null() {
                return Ok(None);
            }
        }
        // A value-typed getter may still hand back null
        Ok(present(current))
    })
}

// ============================================================================
// Uncached shapes
// ============================================================================

/// `m => constant`; ignores the model.
pub fn constant(value: &Value) -> CompiledAccessor {
    let value = present(value.clone());
    CompiledAccessor::new(move |_| Ok(value.clone()))
}

/// `m => Type.Static`; ignores the model.
pub fn static_member(member: &Member) -> CompiledAccessor {
    let member = member.clone();
    CompiledAccessor::new(move |_| member.read(&Value::Null).map(present))
}

/// `m => local`: reads the captured variable off its closure; ignores the model.
pub fn captured(member: &Member, closure: &Value) -> CompiledAccessor {
    let member = member.clone();
    let closure = closure.clone();
    CompiledAccessor::new(move |_| member.read(&closure).map(present))
}
