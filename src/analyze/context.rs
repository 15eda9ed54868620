//! Analysis context, traversal directives, and cancellation.
//!
//! # Invariants
//! - Contexts are immutable; descents derive new values.
//! - Directive combination is max-of-set with `SkipChildren` vetoing
//!   recursion and `Cancelled` dominating everything.
//! - The visited chain is per-stack: siblings never observe each other's
//!   entries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::InspectorConfig;
use crate::format::MatchContext;
use crate::rdf::LinkedNode;

/// Cooperative cancellation flag threaded through every descent.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Per-child decision returned by container collaborators.
///
/// Ordered by dominance for max-of-set combination.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TraversalDirective {
    #[default]
    None = 0,
    /// Recurse into the child's subtree.
    FollowChildren = 1,
    /// Recurse; children are independent and safe to fan out in parallel.
    BurstChildren = 2,
    /// Describe the child but do not recurse.
    SkipChildren = 3,
    /// Abandon the rest of the current level.
    SkipSiblings = 4,
    /// Unwind without further emission.
    Cancelled = 5,
}

impl TraversalDirective {
    /// Max-of-set combination: the more restrictive directive wins.
    #[inline]
    pub fn combine(self, other: TraversalDirective) -> TraversalDirective {
        self.max(other)
    }

    #[inline]
    pub fn descends(self) -> bool {
        matches!(self, Self::FollowChildren | Self::BurstChildren)
    }
}

struct VisitNode {
    reference_key: u64,
    data_key: Box<str>,
    parent: Option<Arc<VisitNode>>,
}

/// Immutable stack of `(reference_key, data_key)` pairs for cycle
/// avoidance. Pushing clones only an `Arc`.
#[derive(Clone, Default)]
pub struct VisitChain(Option<Arc<VisitNode>>);

impl VisitChain {
    pub fn root() -> Self {
        Self(None)
    }

    /// True when the pair is already on this stack.
    pub fn contains(&self, reference_key: u64, data_key: &str) -> bool {
        let mut cur = self.0.as_ref();
        while let Some(node) = cur {
            if node.reference_key == reference_key && node.data_key.as_ref() == data_key {
                return true;
            }
            cur = node.parent.as_ref();
        }
        false
    }

    /// Chain extended by one pair.
    pub fn push(&self, reference_key: u64, data_key: &str) -> VisitChain {
        VisitChain(Some(Arc::new(VisitNode {
            reference_key,
            data_key: Box::from(data_key),
            parent: self.0.clone(),
        })))
    }
}

/// Shared decompression budget for everything under one root entity.
pub struct RootBudget {
    decompressed: AtomicU64,
    cap: u64,
}

impl RootBudget {
    pub fn new(config: &InspectorConfig) -> Arc<Self> {
        Arc::new(Self {
            decompressed: AtomicU64::new(0),
            cap: config.max_total_decompressed_bytes_per_root,
        })
    }

    /// Charge decompressed output; `false` when the root cap is exceeded.
    /// The counter saturates instead of unwinding so later entries keep
    /// observing the exhausted state.
    pub fn charge(&self, bytes: u64) -> bool {
        let prev = self.decompressed.fetch_add(bytes, Ordering::AcqRel);
        prev.saturating_add(bytes) <= self.cap
    }

    /// Decompression headroom left under this root.
    pub fn remaining(&self) -> u64 {
        self.cap
            .saturating_sub(self.decompressed.load(Ordering::Acquire))
    }
}

/// Immutable analysis context threaded through recursive calls.
#[derive(Clone)]
pub struct AnalysisContext {
    /// Node of the enclosing entity, if any.
    pub parent: Option<LinkedNode>,
    /// Predicate the dispatcher emits from `parent` to this entity's node.
    pub link: Option<&'static str>,
    /// Primary node of the current entity, set for secondary analyzers.
    pub node: Option<LinkedNode>,
    /// Container nesting depth of the current entity.
    pub depth: u8,
    /// Match metadata shared across this attempt.
    pub match_ctx: MatchContext,
    /// Cycle-avoidance stack.
    pub visited: VisitChain,
    /// Per-root decompression budget.
    pub budget: Arc<RootBudget>,
    /// Cooperative cancellation.
    pub cancel: CancellationToken,
}

impl AnalysisContext {
    /// Root context for a top-level entity.
    pub fn root(path: impl Into<String>, config: &InspectorConfig, cancel: CancellationToken) -> Self {
        Self {
            parent: None,
            link: None,
            node: None,
            depth: 0,
            match_ctx: MatchContext::root(path),
            visited: VisitChain::root(),
            budget: RootBudget::new(config),
            cancel,
        }
    }

    /// Derive a context whose entity hangs under `parent` via `link`.
    pub fn with_parent_link(&self, parent: LinkedNode, link: &'static str) -> Self {
        let mut next = self.clone();
        next.parent = Some(parent);
        next.link = Some(link);
        next.node = None;
        next
    }

    /// Derive a context one path segment deeper.
    pub fn with_path(&self, segment: &str, parent_format: Option<&'static str>) -> Self {
        let mut next = self.clone();
        next.match_ctx = self.match_ctx.descend(segment, parent_format);
        next
    }

    /// Derive a context one container level deeper.
    pub fn deeper(&self) -> Self {
        let mut next = self.clone();
        next.depth = self.depth.saturating_add(1);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_combination_is_max_of_set() {
        use TraversalDirective::*;
        assert_eq!(None.combine(FollowChildren), FollowChildren);
        assert_eq!(FollowChildren.combine(SkipChildren), SkipChildren);
        assert_eq!(SkipChildren.combine(BurstChildren), SkipChildren);
        assert_eq!(SkipSiblings.combine(SkipChildren), SkipSiblings);
        assert_eq!(None.combine(Cancelled), Cancelled);
        assert!(BurstChildren.descends());
        assert!(!SkipChildren.descends());
    }

    #[test]
    fn visit_chain_is_per_stack() {
        let root = VisitChain::root();
        let a = root.push(1, "a");
        let b = root.push(1, "b");
        assert!(a.contains(1, "a"));
        assert!(!a.contains(1, "b"));
        assert!(!b.contains(1, "a"));
        let nested = a.push(2, "x");
        assert!(nested.contains(1, "a"));
        assert!(nested.contains(2, "x"));
        assert!(!nested.contains(2, "a"));
    }

    #[test]
    fn root_budget_saturates() {
        let cfg = InspectorConfig {
            max_total_decompressed_bytes_per_root: 100,
            max_member_buffer_bytes: 10,
            ..InspectorConfig::default()
        };
        let budget = RootBudget::new(&cfg);
        assert!(budget.charge(60));
        assert_eq!(budget.remaining(), 40);
        assert!(!budget.charge(50));
        assert!(!budget.charge(1));
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn cancellation_flag_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
