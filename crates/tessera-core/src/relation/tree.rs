//! Tree traversal, countable nodes and cycle checks.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// A node in a computation graph, identified by reference.
pub trait Node {
    /// Stable identity of the node for the lifetime of the graph.
    ///
    /// Two handles to the same node return the same id.
    fn node_id(&self) -> usize;

    /// Human-readable label used in diagnostics.
    fn node_name(&self) -> String;
}

/// A node with ordered children of its own kind.
pub trait Parent<T> {
    /// Direct children, in order.
    fn children(&self) -> Vec<T>;
}

/// A node whose children are again trees of the same kind.
pub trait Tree: Parent<Self> + Node + Sized {
    /// Every node of the tree in depth-first pre-order.
    ///
    /// Assumes the tree is acyclic; run [`validate_acyclic`] first on
    /// untrusted input.
    fn all(&self) -> Vec<Self>
    where
        Self: Clone,
    {
        let mut out = vec![self.clone()];
        for child in self.children() {
            out.extend(child.all());
        }
        out
    }

    /// Depth of the deepest leaf, counting the root as 1.
    fn tree_depth(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(Tree::tree_depth)
            .max()
            .unwrap_or(0)
    }
}

/// Number of independent parallel groups a node represents.
pub trait Countable {
    /// Number of parallel groups.
    ///
    /// For a fixed-count node the value never changes between calls.
    fn count(&self) -> u64;

    /// Whether the count is known at compile time.
    ///
    /// Fixed counts allow a static kernel grid; variable counts size the grid
    /// from a runtime argument.
    fn is_fixed_count(&self) -> bool {
        true
    }
}

/// Rejects trees in which a node is its own ancestor.
///
/// Iterative DFS with an on-stack set, so arbitrarily deep or cyclic input
/// cannot overflow the call stack. Shared subtrees (a DAG) are accepted.
pub fn validate_acyclic<T: Tree + Clone>(root: &T) -> Result<()> {
    enum Visit<T> {
        Enter(T),
        Exit(usize),
    }

    let mut on_stack = HashSet::new();
    let mut done = HashSet::new();
    let mut work = vec![Visit::Enter(root.clone())];

    while let Some(visit) = work.pop() {
        match visit {
            Visit::Enter(node) => {
                let id = node.node_id();
                if on_stack.contains(&id) {
                    return Err(Error::CycleDetected(node.node_name()));
                }
                if done.contains(&id) {
                    continue;
                }
                on_stack.insert(id);
                work.push(Visit::Exit(id));
                for child in node.children().into_iter().rev() {
                    work.push(Visit::Enter(child));
                }
            }
            Visit::Exit(id) => {
                on_stack.remove(&id);
                done.insert(id);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone)]
    struct TestNode(Arc<(String, Mutex<Vec<TestNode>>)>);

    impl TestNode {
        fn new(name: &str) -> Self {
            Self(Arc::new((name.to_string(), Mutex::new(Vec::new()))))
        }

        fn push(&self, child: &TestNode) {
            self.0.1.lock().push(child.clone());
        }
    }

    impl Node for TestNode {
        fn node_id(&self) -> usize {
            Arc::as_ptr(&self.0) as usize
        }

        fn node_name(&self) -> String {
            self.0.0.clone()
        }
    }

    impl Parent<TestNode> for TestNode {
        fn children(&self) -> Vec<TestNode> {
            self.0.1.lock().clone()
        }
    }

    impl Tree for TestNode {}

    #[test]
    fn test_acyclic_tree_passes() {
        let root = TestNode::new("root");
        let a = TestNode::new("a");
        let b = TestNode::new("b");
        root.push(&a);
        root.push(&b);
        a.push(&b);
        assert!(validate_acyclic(&root).is_ok());
        assert_eq!(root.all().len(), 4);
        assert_eq!(root.tree_depth(), 3);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let root = TestNode::new("root");
        let a = TestNode::new("a");
        root.push(&a);
        a.push(&root);
        let err = validate_acyclic(&root).unwrap_err();
        assert!(matches!(err, Error::CycleDetected(_)));
    }
}
