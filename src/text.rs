//! Field-name text for member-chain lambdas.
//!
//! `m => m.Address.City` names the field `"Address.City"`; the lambda's
//! parameter never appears in the text.

use std::sync::Arc;

use hashbrown::HashMap;
use modelpath_core::{EvalError, Expr, Lambda, Value, eval_detached};
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;
use tracing::trace;

use crate::classify::{Shape, classify};
use crate::key::StoredKey;

/// Render the dotted field name of `lambda`.
///
/// Every member read contributes its name, array reads contribute `[i]`.
/// The walk stops at the parameter, at a constant (a captured variable
/// contributes only its own name) and at anything that is not a member or
/// array read. When it stops anywhere but the parameter, a leading `model`
/// segment (any case) is dropped, so `m => Model.Name` renders `Name`.
///
/// An array index is evaluated on its own and must not refer to the model.
pub fn expression_text(lambda: &Lambda) -> Result<String, EvalError> {
    let mut segments: Vec<String> = Vec::new();
    let mut current = lambda.body();
    let rooted = loop {
        current = match current {
            Expr::Member {
                target: Some(target),
                member,
            } => {
                segments.push(format!(".{}", member.name()));
                &**target
            }
            Expr::Member {
                target: None,
                member,
            } => {
                segments.push(format!(".{}", member.name()));
                break false;
            }
            Expr::Index { target, index } => {
                let index = index_value(index).map_err(|e| e.with_expression(lambda))?;
                segments.push(format!("[{index}]"));
                &**target
            }
            Expr::Parameter(_) => break true,
            _ => break false,
        };
    };

    if !rooted
        && segments
            .last()
            .is_some_and(|first| first.eq_ignore_ascii_case(".model"))
    {
        segments.pop();
    }

    let text: String = segments.iter().rev().map(String::as_str).collect();
    Ok(text.strip_prefix('.').map(str::to_string).unwrap_or(text))
}

fn index_value(index: &Expr) -> Result<Value, EvalError> {
    if index.has_parameters() {
        return Err(EvalError::unsupported(format!(
            "index `{index}` depends on the model"
        )));
    }
    eval_detached(index)
}

/// Memoized [`expression_text`] for member chains.
///
/// Two lambdas share an entry when their bodies read the same members off
/// the same model type, whatever their parameters are called. Other shapes
/// are rendered on every call.
#[derive(Default)]
pub struct ExpressionTextCache {
    texts: RwLock<HashMap<StoredKey, Arc<str>, FxBuildHasher>>,
}

impl ExpressionTextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self, lambda: &Lambda) -> Result<Arc<str>, EvalError> {
        let Shape::Chain { key, .. } = classify(lambda) else {
            return expression_text(lambda).map(Arc::from);
        };

        if let Some(text) = self.texts.read().get(&key) {
            trace!(expression = %lambda, "expression text cache hit");
            return Ok(Arc::clone(text));
        }

        let text: Arc<str> = Arc::from(expression_text(lambda)?);
        let mut texts = self.texts.write();
        let text = texts
            .entry(StoredKey::from_lookup(&key))
            .or_insert(text);
        Ok(Arc::clone(text))
    }

    pub fn len(&self) -> usize {
        self.texts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.read().is_empty()
    }

    pub fn clear(&self) {
        self.texts.write().clear();
    }
}
