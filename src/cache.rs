//! The accessor cache.
//!
//! Member chains are compiled once per structural key and the accessor is
//! shared by every later request for the same chain, whichever expression
//! tree it came from. Entries are never evicted: the number of distinct
//! chains an application's view models use is small and fixed.

use std::sync::atomic::{AtomicUsize, Ordering};

use hashbrown::HashMap;
use modelpath_core::Lambda;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace};

use crate::classify::{Link, Shape, classify};
use crate::compile::{self, CompiledAccessor};
use crate::key::{MemberChainKey, StoredKey};

/// Process-wide compiler behind [`process`]. Initialized on first use.
static GLOBAL: Lazy<ExpressionCompiler> = Lazy::new(ExpressionCompiler::new);

/// Compile `lambda` with the process-wide cache.
///
/// Returns `None` when the expression is not a member chain, constant,
/// static member or captured variable; the caller should then evaluate it
/// with [`modelpath_core::eval`].
pub fn process(lambda: &Lambda) -> Option<CompiledAccessor> {
    GLOBAL.process(lambda)
}

/// The process-wide compiler, for inspecting its statistics.
pub fn global() -> &'static ExpressionCompiler {
    &GLOBAL
}

/// Configuration for accessor caching.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Share compiled chain accessors by key. When off, every chain is
    /// compiled fresh and nothing is stored.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { enabled: true }
    }
}

/// Statistics about cache usage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Chain requests served from the cache
    pub hits: usize,
    /// Chain requests that compiled and published an accessor
    pub misses: usize,
    /// Accessors compiled without touching the cache
    pub uncached: usize,
    /// Expressions rejected (caller must interpret them)
    pub rejected: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    uncached: AtomicUsize,
    rejected: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

type ChainMap = HashMap<StoredKey, CompiledAccessor, FxBuildHasher>;

/// Memoizing compiler of member-chain accessors.
pub struct ExpressionCompiler {
    config: CacheConfig,
    chains: RwLock<ChainMap>,
    counters: Counters,
}

impl Default for ExpressionCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionCompiler {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        ExpressionCompiler {
            config,
            chains: RwLock::new(ChainMap::default()),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return an accessor for `lambda`, or `None` if it must be interpreted.
    ///
    /// Structurally identical chains yield the same accessor (see
    /// [`CompiledAccessor::ptr_eq`]) once the first one is compiled.
    pub fn process(&self, lambda: &Lambda) -> Option<CompiledAccessor> {
        match classify(lambda) {
            Shape::Chain { key, links } => Some(self.chain(lambda, &key, &links)),
            Shape::Constant(value) => Some(self.uncached(lambda, compile::constant(value))),
            Shape::StaticMember(member) => {
                Some(self.uncached(lambda, compile::static_member(member)))
            }
            Shape::CapturedConstant { member, closure } => {
                Some(self.uncached(lambda, compile::captured(member, closure)))
            }
            Shape::Unsupported => {
                Counters::bump(&self.counters.rejected);
                debug!(expression = %lambda, "not a member chain, falling back to interpretation");
                None
            }
        }
    }

    fn uncached(&self, lambda: &Lambda, accessor: CompiledAccessor) -> CompiledAccessor {
        Counters::bump(&self.counters.uncached);
        trace!(expression = %lambda, "compiled uncached accessor");
        accessor
    }

    fn chain(&self, lambda: &Lambda, key: &MemberChainKey<'_>, links: &[Link<'_>]) -> CompiledAccessor {
        let root = lambda.parameter().ty();
        if !self.config.enabled {
            return self.uncached(lambda, compile::chain(root, links));
        }

        let cached = self.chains.read().get(key).cloned();
        if let Some(accessor) = cached {
            Counters::bump(&self.counters.hits);
            trace!(expression = %lambda, "accessor cache hit");
            return accessor;
        }

        // Compile outside the lock; a racing compile of the same chain loses
        // to whichever accessor was published first.
        let compiled = compile::chain(root, links);
        let mut chains = self.chains.write();
        if let Some(published) = chains.get(key) {
            Counters::bump(&self.counters.hits);
            return published.clone();
        }
        chains.insert(StoredKey::from_lookup(key), compiled.clone());
        Counters::bump(&self.counters.misses);
        debug!(
            expression = %lambda,
            root = %root,
            depth = key.len(),
            entries = chains.len(),
            "cached new chain accessor"
        );
        compiled
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            uncached: self.counters.uncached.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Number of cached chain accessors.
    pub fn len(&self) -> usize {
        self.chains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.read().is_empty()
    }

    /// Drop every cached accessor. Accessors already handed out keep working.
    pub fn clear(&self) {
        self.chains.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelpath_core::{Expr, Type};

    fn model() -> Type {
        let model = Type::class("Model");
        model
            .define()
            .field("Name", &Type::string())
            .field("Next", &model)
            .finish()
            .unwrap()
    }

    fn next_name(model: &Type) -> Lambda {
        Lambda::build("m", model, |m| m.member("Next")?.member("Name")).unwrap()
    }

    #[test]
    fn test_cache_hit_on_equal_chain() {
        let compiler = ExpressionCompiler::new();
        let model = model();
        let first = compiler.process(&next_name(&model)).unwrap();
        let second = compiler.process(&next_name(&model)).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(compiler.len(), 1);
        let stats = compiler.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_cache_disabled() {
        let compiler = ExpressionCompiler::with_config(CacheConfig { enabled: false });
        let model = model();
        let first = compiler.process(&next_name(&model)).unwrap();
        let second = compiler.process(&next_name(&model)).unwrap();
        assert!(!first.ptr_eq(&second));
        assert!(compiler.is_empty());
        assert_eq!(compiler.stats().uncached, 2);
    }

    #[test]
    fn test_cache_clear() {
        let compiler = ExpressionCompiler::new();
        let model = model();
        let first = compiler.process(&next_name(&model)).unwrap();
        compiler.clear();
        assert!(compiler.is_empty());
        let second = compiler.process(&next_name(&model)).unwrap();
        assert!(!first.ptr_eq(&second));
        assert_eq!(compiler.stats().misses, 2);
    }

    #[test]
    fn test_uncached_shapes_do_not_populate_store() {
        let compiler = ExpressionCompiler::new();
        let lambda = Lambda::build("m", &model(), |_| Ok(Expr::constant(3))).unwrap();
        let a = compiler.process(&lambda).unwrap();
        let b = compiler.process(&lambda).unwrap();
        assert!(!a.ptr_eq(&b));
        assert!(compiler.is_empty());
        assert_eq!(compiler.stats().uncached, 2);
    }

    #[test]
    fn test_rejected_shapes_are_counted() {
        let compiler = ExpressionCompiler::new();
        let lambda = Lambda::build("m", &model(), |m| {
            Ok(Expr::binary(
                modelpath_core::BinaryOp::Equal,
                m.member("Name")?,
                Expr::constant("x"),
            ))
        })
        .unwrap();
        assert!(compiler.process(&lambda).is_none());
        assert_eq!(compiler.stats().rejected, 1);
    }

    #[test]
    fn test_default_config_enables_cache() {
        assert!(CacheConfig::default().enabled);
        assert!(ExpressionCompiler::default().config().enabled);
    }
}
