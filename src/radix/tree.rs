use hashbrown::HashMap as FastHashMap;

use super::node::{Arena, MaskRefCell, MaskRefId, MaskTarget, Node, NodeFlags, NodeKind, NodeRef};
use crate::key::{BinKey, KEY_OFFSET};
use crate::types::{Af, Prefix};

/// One path-compressed binary radix tree plus its parallel mask tree.
///
/// All nodes, of both trees, live in one slot arena; links are arena
/// indices. The key tree's head tests bit 8 (the first address bit, past
/// the length byte); the mask tree's head tests bit 0, since mask keys are
/// compared length byte included.
#[derive(Debug)]
pub(crate) struct RadixTree<V> {
    pub arena: Arena<V>,
    pub af: Af,
    // key tree head cells
    pub left_end: NodeRef,
    pub top: NodeRef,
    pub right_end: NodeRef,
    // mask tree head cells
    pub mask_left: NodeRef,
    pub mask_top: NodeRef,
    pub mask_right: NodeRef,
    /// Trimmed mask bytes -> interned mask leaf.
    pub(super) mask_index: FastHashMap<BinKey, NodeRef>,
}

impl<V> RadixTree<V> {
    pub fn new(af: Af) -> Self {
        let mut arena = Arena::new();

        let left_end = arena.alloc(Node::leaf(BinKey::zeros(), NodeRef(0)));
        let top = arena.alloc(Node::internal(
            KEY_OFFSET,
            NodeRef(0),
            left_end,
            NodeRef(0),
        ));
        let right_end = arena.alloc(Node::leaf(BinKey::ones(), top));
        Self::init_head(&mut arena, left_end, top, right_end, KEY_OFFSET);

        let mask_left = arena.alloc(Node::leaf(BinKey::zeros(), NodeRef(0)));
        let mask_top = arena.alloc(Node::internal(0, NodeRef(0), mask_left, NodeRef(0)));
        let mask_right = arena.alloc(Node::leaf(BinKey::ones(), mask_top));
        Self::init_head(&mut arena, mask_left, mask_top, mask_right, 0);

        Self {
            arena,
            af,
            left_end,
            top,
            right_end,
            mask_left,
            mask_top,
            mask_right,
            mask_index: FastHashMap::new(),
        }
    }

    fn init_head(
        arena: &mut Arena<V>,
        left: NodeRef,
        top: NodeRef,
        right: NodeRef,
        off: i16,
    ) {
        for r in [left, right] {
            let n = arena.node_mut(r);
            n.bit = -1 - off;
            n.flags = NodeFlags::ROOT | NodeFlags::ACTIVE;
            n.parent = top;
        }
        let t = arena.node_mut(top);
        t.flags = NodeFlags::ROOT | NodeFlags::ACTIVE;
        t.parent = top;
        if let NodeKind::Internal { right: r, .. } = &mut t.kind {
            *r = right;
        }
    }

    // -- node accessors ----------------------------------------------------

    #[inline(always)]
    pub fn node(&self, r: NodeRef) -> &Node<V> {
        self.arena.node(r)
    }

    #[inline(always)]
    pub fn node_mut(&mut self, r: NodeRef) -> &mut Node<V> {
        self.arena.node_mut(r)
    }

    #[inline]
    pub fn children(&self, r: NodeRef) -> (NodeRef, NodeRef) {
        match &self.node(r).kind {
            NodeKind::Internal { left, right, .. } => (*left, *right),
            NodeKind::Leaf { .. } => unreachable!("leaf has no children"),
        }
    }

    #[inline]
    pub fn set_child(&mut self, r: NodeRef, right_side: bool, child: NodeRef) {
        match &mut self.node_mut(r).kind {
            NodeKind::Internal { left, right, .. } => {
                if right_side {
                    *right = child;
                } else {
                    *left = child;
                }
            }
            NodeKind::Leaf { .. } => unreachable!("leaf has no children"),
        }
    }

    #[inline]
    pub fn replace_child(&mut self, parent: NodeRef, old: NodeRef, new: NodeRef) {
        let (l, _) = self.children(parent);
        self.set_child(parent, l != old, new);
    }

    /// The child of internal node `r` selected by `key`.
    #[inline]
    pub fn branch(&self, r: NodeRef, key: &BinKey) -> NodeRef {
        match &self.node(r).kind {
            NodeKind::Internal {
                offset,
                bmask,
                left,
                right,
            } => {
                if key.at(*offset as usize) & bmask != 0 {
                    *right
                } else {
                    *left
                }
            }
            NodeKind::Leaf { .. } => unreachable!("leaf has no branch"),
        }
    }

    #[inline]
    pub fn is_right_child(&self, r: NodeRef) -> bool {
        let p = self.node(r).parent;
        match &self.node(p).kind {
            NodeKind::Internal { right, .. } => *right == r,
            NodeKind::Leaf { .. } => false,
        }
    }

    #[inline]
    pub fn leaf_key(&self, r: NodeRef) -> BinKey {
        match &self.node(r).kind {
            NodeKind::Leaf { key, .. } => *key,
            NodeKind::Internal { .. } => unreachable!("internal node has no key"),
        }
    }

    #[inline]
    pub fn leaf_mask(&self, r: NodeRef) -> Option<NodeRef> {
        match &self.node(r).kind {
            NodeKind::Leaf { mask, .. } => *mask,
            NodeKind::Internal { .. } => unreachable!("internal node has no mask"),
        }
    }

    #[inline]
    pub fn dupedkey(&self, r: NodeRef) -> Option<NodeRef> {
        match &self.node(r).kind {
            NodeKind::Leaf { dupedkey, .. } => *dupedkey,
            NodeKind::Internal { .. } => unreachable!("internal node has no dupedkey"),
        }
    }

    #[inline]
    pub fn set_dupedkey(&mut self, r: NodeRef, d: Option<NodeRef>) {
        match &mut self.node_mut(r).kind {
            NodeKind::Leaf { dupedkey, .. } => *dupedkey = d,
            NodeKind::Internal { .. } => unreachable!("internal node has no dupedkey"),
        }
    }

    #[inline]
    pub fn value(&self, r: NodeRef) -> Option<&V> {
        match &self.node(r).kind {
            NodeKind::Leaf { value, .. } => value.as_ref(),
            NodeKind::Internal { .. } => None,
        }
    }

    #[inline]
    pub fn value_mut(&mut self, r: NodeRef) -> Option<&mut V> {
        match &mut self.node_mut(r).kind {
            NodeKind::Leaf { value, .. } => value.as_mut(),
            NodeKind::Internal { .. } => None,
        }
    }

    #[inline]
    pub fn take_value(&mut self, r: NodeRef) -> Option<V> {
        match &mut self.node_mut(r).kind {
            NodeKind::Leaf { value, .. } => value.take(),
            NodeKind::Internal { .. } => None,
        }
    }

    #[inline]
    pub fn put_value(&mut self, r: NodeRef, v: V) {
        match &mut self.node_mut(r).kind {
            NodeKind::Leaf { value, .. } => *value = Some(v),
            NodeKind::Internal { .. } => unreachable!("internal node has no value"),
        }
    }

    /// Effective mask length of a leaf, short-length convention included.
    #[inline]
    pub fn leaf_masklen(&self, r: NodeRef) -> u8 {
        match self.leaf_mask(r) {
            Some(m) => self.leaf_key(m).to_masklen(),
            None => self.af.max_masklen(),
        }
    }

    #[inline]
    pub fn prefix_of(&self, r: NodeRef) -> Prefix {
        Prefix::from_masked(self.leaf_key(r), self.leaf_masklen(r))
    }

    // -- descent primitives ------------------------------------------------

    /// Descends from `from` by the bits of `key`, ending on a leaf.
    pub fn search(&self, key: &BinKey, from: NodeRef) -> NodeRef {
        let mut r = from;
        while !self.node(r).is_leaf() {
            r = self.branch(r, key);
        }
        r
    }

    /// Descent guided by `key` under `mask`: a set bit only counts where
    /// the mask keeps it.
    pub fn search_masked(&self, key: &BinKey, from: NodeRef, mask: &BinKey) -> NodeRef {
        let mut r = from;
        loop {
            match &self.node(r).kind {
                NodeKind::Leaf { .. } => return r,
                NodeKind::Internal {
                    offset,
                    bmask,
                    left,
                    right,
                } => {
                    let off = *offset as usize;
                    r = if bmask & mask.at(off) != 0 && bmask & key.at(off) != 0 {
                        *right
                    } else {
                        *left
                    };
                }
            }
        }
    }
}

/// True iff mask `m` is strictly more specific than `n`: it keeps every bit
/// `n` keeps and at least one more. Honors short mask lengths.
pub(crate) fn refines(m: &BinKey, n: &BinKey) -> bool {
    let (lm, ln) = (m.len(), n.len());
    let lim = lm.min(ln);
    let mut equal = true;
    for i in 1..lim {
        if n.at(i) & !m.at(i) != 0 {
            return false;
        }
        if n.at(i) != m.at(i) {
            equal = false;
        }
    }
    for i in lim..ln {
        if n.at(i) != 0 {
            return false;
        }
    }
    for i in lim..lm {
        if m.at(i) != 0 {
            return true;
        }
    }
    !equal
}

/// Ordering tiebreak for masks that neither refine the other: longer
/// stored form first, then byte-wise dominance.
pub(crate) fn lexobetter(m: &BinKey, n: &BinKey) -> bool {
    if m.len() > n.len() {
        return true;
    }
    if m.len() == n.len() {
        for i in 1..m.len() {
            if m.at(i) > n.at(i) {
                return true;
            }
        }
    }
    false
}

/// Mask-reference cell for `leaf`, mirroring the leaf's flags and bit.
pub(crate) fn new_radix_mask<V>(
    arena: &mut Arena<V>,
    leaf: NodeRef,
    next: Option<MaskRefId>,
) -> MaskRefId {
    let (bit, flags, target) = {
        let n = arena.node(leaf);
        let target = if n.is_normal() {
            MaskTarget::Leaf(leaf)
        } else {
            match &n.kind {
                NodeKind::Leaf {
                    mask: Some(m), ..
                } => MaskTarget::Mask(*m),
                _ => unreachable!("mask annotation needs a masked leaf"),
            }
        };
        (n.bit, n.flags, target)
    };
    let id = arena.alloc_cell(MaskRefCell {
        bit,
        flags,
        refs: 0,
        target,
        next,
    });
    arena.node_mut(leaf).mklist = Some(id);
    id
}
