//! Member chain keys and their structural comparer.
//!
//! A key identifies the *shape* of a member chain: the model type plus the
//! sequence of members read, in root-first order (`m => m.A.B.C` iterates
//! `A, B, C`). Keys built from unrelated expression trees over the same
//! members are equal.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use hashbrown::Equivalent;
use modelpath_core::{Member, MemberId, TypeId};
use rustc_hash::FxHasher;
use smallvec::SmallVec;

/// `(declaring type, member)` pair identifying one link of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberToken {
    declaring: TypeId,
    member: MemberId,
}

impl MemberToken {
    pub fn of(member: &Member) -> Self {
        MemberToken {
            declaring: member.declaring(),
            member: member.id(),
        }
    }

    pub fn declaring(&self) -> TypeId {
        self.declaring
    }

    pub fn member(&self) -> MemberId {
        self.member
    }
}

#[derive(Debug, Clone)]
enum Links<'e> {
    /// Members borrowed from the expression being classified
    Borrowed(SmallVec<[&'e Member; 4]>),
    /// Copied tokens; holds nothing from the expression tree
    Owned(Arc<[MemberToken]>),
}

/// Structural key of a member chain rooted at a model type.
///
/// Does not implement `Eq`; compare with [`MemberChainKeyComparer`].
#[derive(Debug, Clone)]
pub struct MemberChainKey<'e> {
    root: TypeId,
    links: Links<'e>,
}

impl<'e> MemberChainKey<'e> {
    /// Key over members borrowed from an expression, given root-first.
    pub fn borrowed(root: TypeId, members: impl IntoIterator<Item = &'e Member>) -> Self {
        MemberChainKey {
            root,
            links: Links::Borrowed(members.into_iter().collect()),
        }
    }

    pub fn root(&self) -> TypeId {
        self.root
    }

    pub fn len(&self) -> usize {
        match &self.links {
            Links::Borrowed(members) => members.len(),
            Links::Owned(tokens) => tokens.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn token(&self, index: usize) -> MemberToken {
        match &self.links {
            Links::Borrowed(members) => MemberToken::of(members[index]),
            Links::Owned(tokens) => tokens[index],
        }
    }

    /// Tokens in root-first order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = MemberToken> + '_ {
        (0..self.len()).map(move |i| self.token(i))
    }

    /// Whether the key owns its tokens (safe to store past the expression).
    pub fn is_cacheable(&self) -> bool {
        matches!(self.links, Links::Owned(_))
    }

    /// Copy the member tokens out so the key no longer borrows the tree.
    pub fn make_cacheable(&self) -> MemberChainKey<'static> {
        let links = match &self.links {
            Links::Owned(tokens) => Links::Owned(Arc::clone(tokens)),
            Links::Borrowed(_) => Links::Owned(self.iter().collect()),
        };
        MemberChainKey {
            root: self.root,
            links,
        }
    }
}

impl Hash for MemberChainKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        MemberChainKeyComparer.hash(self, state);
    }
}

// ============================================================================
// Comparer
// ============================================================================

/// Structural equality and hashing over chain keys.
///
/// Equal iff same root type, same length and the same member at every
/// position; a prefix is never equal to the longer chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberChainKeyComparer;

impl MemberChainKeyComparer {
    pub fn equals(&self, x: &MemberChainKey<'_>, y: &MemberChainKey<'_>) -> bool {
        x.root == y.root && x.len() == y.len() && x.iter().eq(y.iter())
    }

    /// Borrowed and owned forms of equal keys hash identically.
    pub fn hash<H: Hasher>(&self, key: &MemberChainKey<'_>, state: &mut H) {
        key.root.hash(state);
        state.write_usize(key.len());
        for token in key.iter() {
            token.hash(state);
        }
    }

    pub fn hash_one(&self, key: &MemberChainKey<'_>) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(key, &mut hasher);
        hasher.finish()
    }
}

/// Owned key as stored in the cache maps. Lookups use a borrowed
/// [`MemberChainKey`] through [`Equivalent`].
#[derive(Debug, Clone)]
pub(crate) struct StoredKey(MemberChainKey<'static>);

impl StoredKey {
    pub(crate) fn from_lookup(key: &MemberChainKey<'_>) -> Self {
        StoredKey(key.make_cacheable())
    }
}

impl PartialEq for StoredKey {
    fn eq(&self, other: &Self) -> bool {
        MemberChainKeyComparer.equals(&self.0, &other.0)
    }
}

impl Eq for StoredKey {}

impl Hash for StoredKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        MemberChainKeyComparer.hash(&self.0, state);
    }
}

impl Equivalent<StoredKey> for MemberChainKey<'_> {
    fn equivalent(&self, key: &StoredKey) -> bool {
        MemberChainKeyComparer.equals(self, &key.0)
    }
}
