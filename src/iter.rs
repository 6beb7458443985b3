//! Borrowing iterators over stored prefixes.

use crate::key::{self, BinKey};
use crate::radix::{NodeRef, RadixTree};
use crate::types::Prefix;

/// All live prefixes of one family, in ascending key order; within a key,
/// most specific first.
pub struct Prefixes<'a, V> {
    pub(crate) tree: &'a RadixTree<V>,
    pub(crate) cur: Option<NodeRef>,
}

impl<'a, V> Iterator for Prefixes<'a, V> {
    type Item = (Prefix, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(r) = self.cur {
            self.cur = self.tree.next_leaf(r);
            let n = self.tree.node(r);
            if !n.is_root()
                && !n.is_deleted()
                && let Some(v) = self.tree.value(r)
            {
                return Some((self.tree.prefix_of(r), v));
            }
        }
        None
    }
}

/// Live prefixes more specific than an anchor, walked in key order over the
/// two subtrees of the governing node.
pub struct More<'a, V> {
    pub(crate) tree: &'a RadixTree<V>,
    pub(crate) top: NodeRef,
    pub(crate) cur: Option<NodeRef>,
    /// Leaf-style bit ceiling: only leaves at or below match. Inclusive
    /// anchors raise it by one.
    pub(crate) maxb: i16,
    pub(crate) addr: BinKey,
    pub(crate) mask: BinKey,
}

impl<'a, V> Iterator for More<'a, V> {
    type Item = (Prefix, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(r) = self.cur {
            self.cur = self
                .tree
                .next_leaf(r)
                .filter(|&n| self.tree.in_subtree(n, self.top));
            let n = self.tree.node(r);
            if !n.is_root()
                && !n.is_deleted()
                && n.bit <= self.maxb
                && key::isin(&self.addr, &self.tree.leaf_key(r), Some(&self.mask))
                && let Some(v) = self.tree.value(r)
            {
                return Some((self.tree.prefix_of(r), v));
            }
        }
        None
    }
}

/// Live prefixes containing an anchor's network address, most specific
/// first, thresholded at the anchor's mask length.
pub struct Less<'a, V> {
    pub(crate) tree: &'a RadixTree<V>,
    pub(crate) cur: Option<NodeRef>,
    /// Longest mask length still yielded; -1 yields nothing.
    pub(crate) limit: i32,
}

impl<'a, V> Iterator for Less<'a, V> {
    type Item = (Prefix, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(r) = self.cur {
            self.cur = self.tree.lsm(r);
            if (self.tree.leaf_masklen(r) as i32) <= self.limit
                && let Some(v) = self.tree.value(r)
            {
                return Some((self.tree.prefix_of(r), v));
            }
        }
        None
    }
}
