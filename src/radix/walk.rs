//! In-order leaf stepping, sentinel dupedkeys included.

use super::node::NodeRef;
use super::tree::RadixTree;

impl<V> RadixTree<V> {
    /// Leftmost leaf of the subtree under `from` (which may be a leaf).
    pub(crate) fn leftmost_leaf(&self, from: NodeRef) -> NodeRef {
        let mut r = from;
        while !self.node(r).is_leaf() {
            let (l, _) = self.children(r);
            r = l;
        }
        r
    }

    /// First non-sentinel leaf in key order, or None on an empty tree.
    ///
    /// An explicit all-zeros prefix hangs off the left-end sentinel and is
    /// yielded first; an explicit all-ones host prefix hangs off the
    /// right-end sentinel and is yielded last.
    pub(crate) fn first_leaf(&self) -> Option<NodeRef> {
        let (top_left, _) = self.children(self.top);
        let rn = self.leftmost_leaf(top_left);

        // the left-end sentinel is the leftmost leaf; explicit 0/x entries
        // chain off it
        if let Some(d) = self.dupedkey(rn) {
            return Some(d);
        }

        let up = self.node(rn).parent;
        let (_, up_right) = self.children(up);
        let rn = self.leftmost_leaf(up_right);
        if self.node(rn).is_root() {
            // straight into the right-end marker: tree holds at most its
            // dupedkey
            return self.dupedkey(rn);
        }
        Some(rn)
    }

    /// The next leaf in key order after `rn`, dupedkey chains walked from
    /// most to least specific. Yields soft-deleted leaves too; callers
    /// filter.
    pub(crate) fn next_leaf(&self, rn: NodeRef) -> Option<NodeRef> {
        if !self.node(rn).is_leaf() {
            return Some(self.leftmost_leaf(rn));
        }

        // the right-end marker's dupedkey is the very last leaf; detect it
        // by the marker's length byte, never by its payload
        let parent = self.node(rn).parent;
        {
            let p = self.node(parent);
            if p.is_leaf() && p.is_root() && self.leaf_key(parent).len() == 0xFF {
                return None;
            }
        }

        // less specific sibling next
        if let Some(d) = self.dupedkey(rn) {
            return Some(d);
        }

        // back to the head of the chain, which holds the tree position
        let mut cur = rn;
        while self.node(self.node(cur).parent).is_leaf() {
            cur = self.node(cur).parent;
        }

        // climb while we are a right child, then cross over
        while !self.node(self.node(cur).parent).is_leaf() && self.is_right_child(cur) {
            cur = self.node(cur).parent;
        }
        let (_, right) = self.children(self.node(cur).parent);
        let next = self.leftmost_leaf(right);
        if self.node(next).is_root() {
            return self.dupedkey(next);
        }
        Some(next)
    }

    /// True iff `leaf` lies in the subtree rooted at `top` (dupedkey chains
    /// count as their head's position).
    pub(crate) fn in_subtree(&self, leaf: NodeRef, top: NodeRef) -> bool {
        let mut cur = leaf;
        loop {
            if cur == top {
                return true;
            }
            let p = self.node(cur).parent;
            if p == cur {
                return false; // ran into the treetop
            }
            cur = p;
        }
    }
}
