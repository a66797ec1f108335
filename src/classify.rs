//! Shape classification of lambda bodies.
//!
//! One pass over the body decides how an expression is served: from the
//! chain cache, compiled fresh, or not at all (the caller interprets it).

use modelpath_core::{Expr, Lambda, Member, Parameter, Value};
use smallvec::SmallVec;

use crate::key::MemberChainKey;

/// One member read of a chain.
#[derive(Debug, Clone, Copy)]
pub enum Link<'e> {
    /// Field or property of a class or struct
    Instance(&'e Member),
    /// `Nullable<T>.Value`; reached only after the nullable was checked
    NullableUnwrap(&'e Member),
}

impl<'e> Link<'e> {
    fn of(member: &'e Member) -> Self {
        if member.is_nullable_value() {
            Link::NullableUnwrap(member)
        } else {
            Link::Instance(member)
        }
    }

    pub fn member(&self) -> &'e Member {
        match self {
            Link::Instance(member) | Link::NullableUnwrap(member) => member,
        }
    }
}

pub type Links<'e> = SmallVec<[Link<'e>; 4]>;

#[derive(Debug)]
pub enum Shape<'e> {
    /// `m => 10`: compiled, not cached
    Constant(&'e Value),
    /// `m => Type.Static`: compiled, not cached
    StaticMember(&'e Member),
    /// `m => local`: compiled, not cached
    CapturedConstant {
        member: &'e Member,
        closure: &'e Value,
    },
    /// `m => m.A.B` (or `m => m`): cached by key. Links are root-first.
    Chain {
        key: MemberChainKey<'e>,
        links: Links<'e>,
    },
    /// Indexers, calls, operators, member access on captured variables
    Unsupported,
}

impl Shape<'_> {
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Shape::Chain { .. })
    }
}

pub fn classify(lambda: &Lambda) -> Shape<'_> {
    match lambda.body() {
        Expr::Constant { value, .. } => Shape::Constant(value),
        Expr::Member {
            target: None,
            member,
        } => Shape::StaticMember(member),
        Expr::Member {
            target: Some(target),
            member,
        } if !member.is_static() => match &**target {
            Expr::Constant { value, .. } => Shape::CapturedConstant {
                member,
                closure: value,
            },
            _ => chain(lambda.body(), lambda.parameter()),
        },
        Expr::Parameter(_) => chain(lambda.body(), lambda.parameter()),
        _ => Shape::Unsupported,
    }
}

/// Peel member reads off `body` until reaching the lambda's own parameter.
/// Anything else on the way (a constant, a static member, an indexer, a
/// call) makes the whole body unsupported.
fn chain<'e>(body: &'e Expr, parameter: &Parameter) -> Shape<'e> {
    let mut links = Links::new();
    let mut current = body;
    loop {
        match current {
            Expr::Parameter(p) if p.is(parameter) => break,
            Expr::Member {
                target: Some(target),
                member,
            } if !member.is_static() => {
                links.push(Link::of(member));
                current = &**target;
            }
            _ => return Shape::Unsupported,
        }
    }
    links.reverse();
    let key = MemberChainKey::borrowed(parameter.ty().id(), links.iter().map(|l| l.member()));
    Shape::Chain { key, links }
}
