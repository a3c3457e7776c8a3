//! Delegation chains.
//!
//! A delegated value forwards to another value of the same kind. Chains are
//! resolved at query time by [`Delegated`], which must walk the chain with a
//! visited set because late binding can close a loop. [`DelegationArena`]
//! keeps delegation as an explicit edge list instead and refuses a looping
//! edge at insertion time.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// A value that forwards to a delegate of the same kind.
pub trait Delegated: Sized {
    /// The direct delegate, if any.
    fn delegate(&self) -> Option<Self>;

    /// Identity used to detect revisits while walking the chain.
    fn delegate_id(&self) -> usize;

    /// Label used in error messages.
    fn delegate_name(&self) -> String {
        format!("#{:x}", self.delegate_id())
    }

    /// Walks the chain and fails on the first revisited member.
    fn validate_delegate(&self) -> Result<()> {
        let mut visited = HashSet::new();
        visited.insert(self.delegate_id());
        let mut current = self.delegate();
        while let Some(next) = current {
            if !visited.insert(next.delegate_id()) {
                return Err(Error::CircularDelegation(next.delegate_name()));
            }
            current = next.delegate();
        }
        Ok(())
    }

    /// Number of delegation hops from this value to the end of the chain.
    fn delegate_depth(&self) -> Result<usize> {
        self.validate_delegate()?;
        let mut depth = 0;
        let mut current = self.delegate();
        while let Some(next) = current {
            depth += 1;
            current = next.delegate();
        }
        Ok(depth)
    }

    /// The last member of the chain (self when there is no delegate).
    fn root_delegate(&self) -> Result<Self>
    where
        Self: Clone,
    {
        self.validate_delegate()?;
        let mut current = self.clone();
        while let Some(next) = current.delegate() {
            current = next;
        }
        Ok(current)
    }
}

/// Handle to a member of a [`DelegationArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegateId(usize);

impl DelegateId {
    /// Position of the member in its arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arena of delegation chains with cycle rejection at edge insertion.
///
/// Each member has at most one delegate and it can be set only once, so the
/// chains form a forest whose roots are the members without a delegate. A
/// union-find over the trees answers "would this edge close a loop" in
/// near-constant time.
#[derive(Debug, Default, Clone)]
pub struct DelegationArena {
    names: Vec<String>,
    delegates: Vec<Option<DelegateId>>,
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DelegationArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member without a delegate.
    pub fn add(&mut self, name: impl Into<String>) -> DelegateId {
        let id = self.names.len();
        self.names.push(name.into());
        self.delegates.push(None);
        self.parent.push(id);
        self.rank.push(0);
        DelegateId(id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the arena has no members.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of a member.
    pub fn name(&self, id: DelegateId) -> &str {
        &self.names[id.0]
    }

    /// Makes `from` delegate to `to`.
    ///
    /// Fails if `from` already has a delegate or if the edge would close a
    /// loop.
    pub fn set_delegate(&mut self, from: DelegateId, to: DelegateId) -> Result<()> {
        if self.delegates[from.0].is_some() {
            return Err(Error::DelegateAlreadySet(self.names[from.0].clone()));
        }
        // `from` has no delegate, so it is the end of every chain in its set.
        // An edge into the same set would lead back to `from`.
        let (a, b) = (self.find(from.0), self.find(to.0));
        if a == b {
            return Err(Error::CircularDelegation(self.names[from.0].clone()));
        }
        self.union(a, b);
        self.delegates[from.0] = Some(to);
        Ok(())
    }

    /// Direct delegate of a member.
    pub fn delegate(&self, id: DelegateId) -> Option<DelegateId> {
        self.delegates[id.0]
    }

    /// Number of hops from `id` to the end of its chain.
    pub fn depth(&self, id: DelegateId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(next) = self.delegates[current.0] {
            depth += 1;
            current = next;
        }
        depth
    }

    /// The end of the chain starting at `id`.
    pub fn root(&self, id: DelegateId) -> DelegateId {
        let mut current = id;
        while let Some(next) = self.delegates[current.0] {
            current = next;
        }
        current
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        match self.rank[a].cmp(&self.rank[b]) {
            std::cmp::Ordering::Less => self.parent[a] = b,
            std::cmp::Ordering::Greater => self.parent[b] = a,
            std::cmp::Ordering::Equal => {
                self.parent[b] = a;
                self.rank[a] += 1;
            }
        }
    }
}
