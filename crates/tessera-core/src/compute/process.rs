//! Rewritable process trees and the parallelism optimizer.
//!
//! [`ParallelProcess::optimize_parallel`] walks a tree bottom-up and decides,
//! per node, whether its children are inlined into the node's kernel or
//! isolated as independently dispatched kernels. Too many tiny kernels pay
//! dispatch overhead over and over; one giant kernel loses dispatch
//! granularity. The thresholds in [`ParallelismSettings`] encode the balance.

use std::collections::HashMap;

use crate::error::Result;
use crate::relation::{Countable, Tree, validate_acyclic};

use super::settings::{OptimizationPolicy, ParallelismSettings};

/// Ambient parallelism handed down during optimization.
///
/// Transient: derived per optimization step and dropped once the pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelProcessContext {
    depth: usize,
    parallelism: u64,
    aggregation_count: u64,
    fixed: bool,
}

impl ParallelProcessContext {
    /// Largest parallelism a context may carry.
    pub const MAX_PARALLELISM: u64 = i32::MAX as u64;

    /// The context at the root of an optimization pass.
    pub fn base() -> Self {
        Self {
            depth: 0,
            parallelism: 1,
            aggregation_count: 1,
            fixed: true,
        }
    }

    /// Context for the children of `process`.
    ///
    /// A node with at most one child does not change the branching factor and
    /// inherits `ctx`. A node under a context that already has more parallel
    /// groups (and at least the same aggregation) also inherits it. Otherwise
    /// the node starts a new context one level deeper carrying its own count.
    pub fn of<P: ParallelProcess>(ctx: &Self, process: &P) -> Self {
        if process.children().len() <= 1 {
            return *ctx;
        }

        let mut aggregation_count = process.aggregation_count();
        if ctx.parallelism > process.parallelism()
            && ctx.aggregation_count >= aggregation_count
            && (ctx.fixed || !process.is_fixed_count())
        {
            return *ctx;
        }
        aggregation_count = aggregation_count.max(ctx.aggregation_count);

        let mut parallelism = process.parallelism();
        if parallelism > Self::MAX_PARALLELISM {
            tracing::warn!(
                "optimize: parallelism {parallelism} of '{}' exceeds {}, clamping",
                process.node_name(),
                Self::MAX_PARALLELISM
            );
            parallelism = Self::MAX_PARALLELISM;
        }

        Self {
            depth: ctx.depth + 1,
            parallelism,
            aggregation_count,
            fixed: process.is_fixed_count(),
        }
    }

    /// Nesting depth of the context.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of parallel groups in the enclosing scope.
    pub fn parallelism(&self) -> u64 {
        self.parallelism
    }

    /// Largest aggregation seen along the path.
    pub fn aggregation_count(&self) -> u64 {
        self.aggregation_count
    }

    /// Whether the enclosing count is known at compile time.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }
}

impl Default for ParallelProcessContext {
    fn default() -> Self {
        Self::base()
    }
}

impl Countable for ParallelProcessContext {
    fn count(&self) -> u64 {
        self.parallelism
    }

    fn is_fixed_count(&self) -> bool {
        self.fixed
    }
}

/// Nodes already rewritten during one optimization pass, keyed by node id.
///
/// A node reachable through several parents is optimized (and isolated) once;
/// every parent receives the same rewritten node, so sharing survives the pass.
#[derive(Debug)]
pub struct Rewrites<P> {
    optimized: HashMap<usize, P>,
    isolated: HashMap<usize, P>,
}

impl<P> Default for Rewrites<P> {
    fn default() -> Self {
        Self {
            optimized: HashMap::new(),
            isolated: HashMap::new(),
        }
    }
}

impl<P: Process> Rewrites<P> {
    /// An empty memo for a fresh pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct nodes optimized so far.
    pub fn len(&self) -> usize {
        self.optimized.len()
    }

    /// Whether nothing has been optimized yet.
    pub fn is_empty(&self) -> bool {
        self.optimized.is_empty()
    }

    /// `node` optimized under `ctx`, reusing an earlier rewrite of the same node.
    pub fn optimize(
        &mut self,
        node: &P,
        ctx: &ParallelProcessContext,
        policy: &OptimizationPolicy,
    ) -> P {
        let id = node.node_id();
        if let Some(done) = self.optimized.get(&id) {
            return done.clone();
        }
        let done = node.optimize(ctx, policy, self);
        self.optimized.insert(id, done.clone());
        done
    }

    /// `node` isolated, reusing an earlier isolation of the same node.
    pub fn isolate(&mut self, node: &P) -> P {
        self.isolated
            .entry(node.node_id())
            .or_insert_with(|| node.isolate())
            .clone()
    }
}

/// A node of a rewritable computation tree.
///
/// Rewrites never mutate: [`optimize`](Process::optimize),
/// [`isolate`](Process::isolate) and [`generate`](Process::generate) return
/// new nodes. Optimizing must preserve the result of evaluating the node and
/// must be idempotent.
pub trait Process: Tree + Clone {
    /// Rewrites the subtree for the given context. The default is a no-op.
    ///
    /// Children go through `rewrites` so a shared child keeps one identity.
    fn optimize(
        &self,
        ctx: &ParallelProcessContext,
        policy: &OptimizationPolicy,
        rewrites: &mut Rewrites<Self>,
    ) -> Self {
        let _ = (ctx, policy, rewrites);
        self.clone()
    }

    /// Wraps the node so it compiles and runs as an independent kernel.
    ///
    /// Nodes that are already independent return themselves.
    fn isolate(&self) -> Self;

    /// Whether the node is an isolation boundary.
    fn is_isolated(&self) -> bool;

    /// An equivalent node with `children` in place of the current children.
    fn generate(&self, children: Vec<Self>) -> Self;
}

/// Outcome of the inline-or-isolate decision for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationDecision {
    /// Children share the node's iteration granularity.
    InlineMatchingCount,
    /// The enclosing context already covers the largest child.
    InlineContextual,
    /// The largest child is above the hard ceiling.
    InlineAboveCeiling,
    /// The largest child is above the target and the context is large enough.
    InlineNarrowMax,
    /// Every child compiles as its own kernel.
    Isolate,
}

impl IsolationDecision {
    /// Whether children are kept inline.
    pub fn is_inline(self) -> bool {
        !matches!(self, Self::Isolate)
    }
}

/// Applies the threshold rules, first match wins.
///
/// `own_count` is the node's parallelism, `context` the context derived for
/// its children and `child_counts` the parallelism of each optimized child.
pub fn isolation_decision(
    own_count: u64,
    context: &ParallelProcessContext,
    child_counts: &[u64],
    settings: &ParallelismSettings,
) -> IsolationDecision {
    let mut distinct: Vec<u64> = child_counts.iter().copied().filter(|&c| c > 0).collect();
    let total: u64 = distinct.iter().sum();
    distinct.sort_unstable();
    distinct.dedup();
    let max = distinct.last().copied().unwrap_or(0);

    if (distinct.len() <= 1 && total == own_count) || own_count >= max {
        return IsolationDecision::InlineMatchingCount;
    }

    if settings.enable_contextual_count && context.parallelism() >= max {
        return IsolationDecision::InlineContextual;
    }

    if max > settings.max_count {
        if own_count < settings.min_count && context.parallelism() < settings.min_count {
            tracing::warn!(
                "optimize: child count {max} exceeds ceiling {} but node count {own_count} \
                 and context count {} are below floor {}",
                settings.max_count,
                context.parallelism(),
                settings.min_count
            );
        }
        return IsolationDecision::InlineAboveCeiling;
    }

    if settings.enable_narrow_max
        && max > settings.target_count
        && context.parallelism() >= settings.min_count
    {
        return IsolationDecision::InlineNarrowMax;
    }

    IsolationDecision::Isolate
}

/// A process whose nodes carry data-parallel counts.
pub trait ParallelProcess: Process + Countable {
    /// Parallel groups the node dispatches. Defaults to its count.
    fn parallelism(&self) -> u64 {
        self.count()
    }

    /// How many input elements feed one output element.
    fn aggregation_count(&self) -> u64 {
        1
    }

    /// The optimizer.
    ///
    /// Leaves are returned as-is. Otherwise every child is optimized under
    /// [`ParallelProcessContext::of`], then explicit isolation targets (if
    /// any) or [`isolation_decision`] choose between keeping the optimized
    /// children and isolating them.
    fn optimize_parallel(
        &self,
        ctx: &ParallelProcessContext,
        policy: &OptimizationPolicy,
        rewrites: &mut Rewrites<Self>,
    ) -> Self {
        let children = self.children();
        if children.is_empty() {
            return self.clone();
        }

        let context = ParallelProcessContext::of(ctx, self);
        let optimized: Vec<Self> = children
            .iter()
            .map(|child| rewrites.optimize(child, &context, policy))
            .collect();

        if policy.has_explicit_targets() {
            let rewritten = optimized
                .into_iter()
                .map(|child| {
                    if policy.is_isolation_target(&child.node_name()) {
                        rewrites.isolate(&child)
                    } else {
                        child
                    }
                })
                .collect();
            return self.generate(rewritten);
        }

        let counts: Vec<u64> = optimized.iter().map(ParallelProcess::parallelism).collect();
        let decision = isolation_decision(self.parallelism(), &context, &counts, &policy.settings);

        if policy.log_optimization {
            tracing::trace!(
                "optimize: '{}' depth={} count={} context={} children={:?} -> {:?}",
                self.node_name(),
                context.depth(),
                self.parallelism(),
                context.parallelism(),
                counts,
                decision
            );
        }

        if decision.is_inline() {
            self.generate(optimized)
        } else {
            let isolated = optimized.iter().map(|child| rewrites.isolate(child)).collect();
            self.generate(isolated)
        }
    }

    /// Optimizes the tree from the base context after checking it is acyclic.
    fn optimized(&self, policy: &OptimizationPolicy) -> Result<Self> {
        validate_acyclic(self)?;
        let mut rewrites = Rewrites::new();
        let result = self.optimize(&ParallelProcessContext::base(), policy, &mut rewrites);
        tracing::debug!(
            "optimize: '{}' done, depth {}, {} nodes rewritten",
            result.node_name(),
            result.tree_depth(),
            rewrites.len()
        );
        Ok(result)
    }
}
