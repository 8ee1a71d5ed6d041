// Ordered node list with positional access. Elements are retained while
// the list lives and released when it is dropped.

use crate::NodeRef;

#[derive(Debug, Default)]
pub struct NodeList {
    items: Vec<NodeRef>,
}

impl NodeList {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, node: NodeRef) {
        self.items.push(node);
    }

    /// Insert at `index`, shifting later elements. Out-of-range indices
    /// append.
    pub fn insert(&mut self, index: usize, node: NodeRef) {
        if index >= self.items.len() {
            self.items.push(node);
        } else {
            self.items.insert(index, node);
        }
    }

    /// Remove and return the element at `index`, shifting later elements.
    pub fn remove(&mut self, index: usize) -> Option<NodeRef> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&NodeRef> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeRef> {
        self.items.iter()
    }

    /// Retain every element under a new list; the nodes are shared.
    pub fn shallow_clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }

    /// Recursively copy every subtree; the result shares nothing with the
    /// original.
    pub fn deep_clone(&self) -> Self {
        Self {
            items: self.items.iter().map(|node| node.deep_clone()).collect(),
        }
    }
}

impl From<Vec<NodeRef>> for NodeList {
    fn from(items: Vec<NodeRef>) -> Self {
        Self { items }
    }
}

impl<'a> IntoIterator for &'a NodeList {
    type Item = &'a NodeRef;
    type IntoIter = std::slice::Iter<'a, NodeRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Expr, Literal, Node, SourceLocation};
    use std::sync::Arc;

    fn int(value: i64) -> NodeRef {
        Node::expr(
            Expr::Literal(Literal::Integer(value)),
            SourceLocation::unknown(),
        )
    }

    #[test]
    fn test_insert_remove_shift() {
        let mut list = NodeList::new();
        list.push(int(1));
        list.push(int(3));
        list.insert(1, int(2));

        assert_eq!(list.len(), 3);
        let removed = list.remove(0).expect("element");
        assert!(matches!(
            removed.as_expr(),
            Some(Expr::Literal(Literal::Integer(1)))
        ));
        assert_eq!(list.len(), 2);
        assert!(list.remove(5).is_none());
    }

    #[test]
    fn test_shallow_vs_deep_clone() {
        let node = int(9);
        let mut list = NodeList::new();
        list.push(node.clone());

        let shallow = list.shallow_clone();
        assert!(Arc::ptr_eq(&shallow.items[0], &node));

        let deep = list.deep_clone();
        assert!(!Arc::ptr_eq(&deep.items[0], &node));
        assert_eq!(Arc::strong_count(&deep.items[0]), 1);
    }
}
