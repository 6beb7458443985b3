//! Insertion: key splice, dupedkey chains and mask-list maintenance.

use super::error::{RadixError, RadixResult};
use super::node::{MaskRefId, MaskTarget, Node, NodeFlags, NodeKind, NodeRef};
use super::tree::{RadixTree, lexobetter, new_radix_mask, refines};
use crate::key::BinKey;

impl<V> RadixTree<V> {
    #[inline]
    fn branch_is_right(&self, r: NodeRef, key: &BinKey) -> bool {
        match &self.node(r).kind {
            NodeKind::Internal { offset, bmask, .. } => {
                key.at(*offset as usize) & bmask != 0
            }
            NodeKind::Leaf { .. } => unreachable!("leaf has no branch"),
        }
    }

    /// Splices `v` into the tree under `top`, or reports the existing leaf
    /// when the key is already present. Returns `(leaf, key_was_duplicated)`.
    pub(super) fn insert_key(&mut self, v: BinKey, top: NodeRef) -> (NodeRef, bool) {
        let head_off = match &self.node(top).kind {
            NodeKind::Internal { offset, .. } => *offset as usize,
            NodeKind::Leaf { .. } => unreachable!("head is internal"),
        };
        let found = self.search(&v, top);
        let fkey = self.leaf_key(found);

        // first bit where v and the found key differ
        let mut diff = None;
        for i in head_off..v.len() {
            if v.at(i) != fkey.at(i) {
                diff = Some(i);
                break;
            }
        }
        let Some(di) = diff else {
            return (found, true);
        };
        let b = (di * 8) as i16 + (v.at(di) ^ fkey.at(di)).leading_zeros() as i16;

        // walk down to the compressed edge the new bit splits: p tests a bit
        // above b, its child x a bit at or below it (or is a leaf)
        let mut p = top;
        let mut x = self.branch(p, &v);
        loop {
            let xn = self.node(x);
            if xn.is_leaf() || xn.bit >= b {
                break;
            }
            p = x;
            x = self.branch(x, &v);
        }

        let leaf = self.arena.alloc(Node::leaf(v, p));
        let inner = self.arena.alloc(Node::internal(b, p, leaf, x));
        let p_right = self.branch_is_right(p, &v);
        self.set_child(p, p_right, inner);
        self.node_mut(x).parent = inner;
        if self.branch_is_right(inner, &v) {
            self.set_child(inner, false, x);
            self.set_child(inner, true, leaf);
        }
        self.node_mut(leaf).parent = inner;
        (leaf, false)
    }

    /// Interns a mask in the mask tree and returns its leaf. The /0 mask
    /// interns as the left mask sentinel. With `search_only`, absent masks
    /// yield None instead of being inserted.
    pub(super) fn addmask(&mut self, mask_full: &BinKey, search_only: bool) -> Option<NodeRef> {
        let trimmed = mask_full.trimmed();
        if trimmed.len() <= 1 {
            return Some(self.mask_left);
        }
        if let Some(&r) = self.mask_index.get(&trimmed) {
            return Some(r);
        }
        if search_only {
            return None;
        }
        let (leaf, duped) = self.insert_key(trimmed, self.mask_top);
        debug_assert!(!duped, "mask index missed an interned mask");
        let (bit, normal) = mask_bit(&trimmed);
        {
            let n = self.node_mut(leaf);
            n.bit = -1 - bit;
            if normal {
                n.flags |= NodeFlags::NORMAL;
            }
        }
        self.mask_index.insert(trimmed, leaf);
        Some(leaf)
    }

    /// Adds a network-masked key under its mask. Returns the new leaf with
    /// an empty value slot; the caller fills it. The exact (key, mask) pair
    /// being present already is an error and leaves the tree as found.
    pub(crate) fn add(&mut self, v: BinKey, mask_full: &BinKey) -> RadixResult<NodeRef> {
        let Some(mask_node) = self.addmask(mask_full, false) else {
            unreachable!("mask interning never fails outside search mode");
        };
        let mask_leaf_bit = self.node(mask_node).bit;
        let lift_bit = -1 - mask_leaf_bit;
        let mask_key = self.leaf_key(mask_node);

        let (mut tt, duped) = self.insert_key(v, self.top);
        let mut saved = tt;
        if duped {
            // find the chain position that keeps decreasing specificity
            let mut pred = tt;
            let mut cur = Some(tt);
            let mut before: Option<NodeRef> = None;
            while let Some(c) = cur {
                if self.leaf_mask(c) == Some(mask_node) {
                    return Err(RadixError::DuplicateEntry);
                }
                let breaks = match self.leaf_mask(c) {
                    Some(cm) => {
                        let ckey = self.leaf_key(cm);
                        mask_leaf_bit < self.node(c).bit
                            || refines(&mask_key, &ckey)
                            || lexobetter(&mask_key, &ckey)
                    }
                    None => false,
                };
                if breaks {
                    before = Some(c);
                    break;
                }
                pred = c;
                cur = self.dupedkey(c);
            }

            let new_leaf = self.arena.alloc(Node::leaf(v, pred));
            match before {
                Some(at) if at == saved => {
                    // new most-specific member takes the tree position
                    let parent = self.node(saved).parent;
                    self.set_dupedkey(new_leaf, Some(saved));
                    self.node_mut(new_leaf).parent = parent;
                    self.node_mut(saved).parent = new_leaf;
                    self.replace_child(parent, saved, new_leaf);
                    saved = new_leaf;
                }
                _ => {
                    let after = self.dupedkey(pred);
                    self.set_dupedkey(new_leaf, after);
                    self.set_dupedkey(pred, Some(new_leaf));
                    self.node_mut(new_leaf).parent = pred;
                    if let Some(a) = after {
                        self.node_mut(a).parent = new_leaf;
                    }
                }
            }
            tt = new_leaf;
        }

        // attach the mask identity
        {
            let normal = self.node(mask_node).flags & NodeFlags::NORMAL;
            let n = self.node_mut(tt);
            n.bit = mask_leaf_bit;
            n.flags |= normal;
            match &mut n.kind {
                NodeKind::Leaf { mask, .. } => *mask = Some(mask_node),
                NodeKind::Internal { .. } => unreachable!("fresh leaf"),
            }
        }

        let chain_parent = self.node(saved).parent;
        if !duped {
            self.promote_sibling_masks(chain_parent, saved);
        }

        // lift our annotation to the widest ancestor it covers
        if lift_bit > self.node(chain_parent).bit {
            return Ok(tt);
        }
        let ann_bit = self.node(tt).bit;
        let mut xa = chain_parent;
        let mut ta = self.node(chain_parent).parent;
        while lift_bit <= self.node(ta).bit && xa != self.top {
            xa = ta;
            ta = self.node(ta).parent;
        }

        let mut prev: Option<MaskRefId> = None;
        let mut cur = self.node(xa).mklist;
        while let Some(id) = cur {
            let (cbit, cnext) = {
                let c = self.arena.cell(id);
                (c.bit, c.next)
            };
            if cbit < ann_bit {
                prev = Some(id);
                cur = cnext;
                continue;
            }
            if cbit > ann_bit {
                break;
            }
            let other_mask = match self.arena.cell(id).target {
                MaskTarget::Leaf(l) => {
                    if self.node(tt).is_normal() {
                        // equal-length mask covering the same subtree would
                        // be this very entry; nothing to share
                        return Ok(tt);
                    }
                    match self.leaf_mask(l) {
                        Some(m) => m,
                        None => break,
                    }
                }
                MaskTarget::Mask(m) => m,
            };
            if other_mask == mask_node {
                self.arena.cell_mut(id).refs += 1;
                self.node_mut(tt).mklist = Some(id);
                return Ok(tt);
            }
            let okey = self.leaf_key(other_mask);
            if refines(&mask_key, &okey) || lexobetter(&mask_key, &okey) {
                break;
            }
            prev = Some(id);
            cur = cnext;
        }
        let id = new_radix_mask(&mut self.arena, tt, cur);
        match prev {
            None => self.node_mut(xa).mklist = Some(id),
            Some(p) => self.arena.cell_mut(p).next = Some(id),
        }
        Ok(tt)
    }

    /// A fresh internal node displaced a subtree downward; annotations on
    /// the displaced side that cover the new node's span move up onto it.
    fn promote_sibling_masks(&mut self, inner: NodeRef, new_leaf_pos: NodeRef) {
        let promote_bit = -1 - self.node(inner).bit;
        let (l, r) = self.children(inner);
        let x = if r == new_leaf_pos { l } else { r };

        if self.node(x).is_leaf() {
            // masked chain members wide enough for the new span get fresh
            // annotations, in chain order
            let mut tail: Option<MaskRefId> = None;
            let mut cur = Some(x);
            while let Some(c) = cur {
                let lift = self.leaf_mask(c).is_some()
                    && self.node(c).bit >= promote_bit
                    && self.node(c).mklist.is_none();
                if lift {
                    let id = new_radix_mask(&mut self.arena, c, None);
                    match tail {
                        None => self.node_mut(inner).mklist = Some(id),
                        Some(prev) => self.arena.cell_mut(prev).next = Some(id),
                    }
                    tail = Some(id);
                }
                cur = self.dupedkey(c);
            }
        } else if self.node(x).mklist.is_some() {
            // hand the wide tail of the sibling's list upward
            let mut prev: Option<MaskRefId> = None;
            let mut cur = self.node(x).mklist;
            while let Some(id) = cur {
                if self.arena.cell(id).bit >= promote_bit {
                    break;
                }
                prev = Some(id);
                cur = self.arena.cell(id).next;
            }
            if let Some(first) = cur {
                match prev {
                    None => self.node_mut(x).mklist = None,
                    Some(p) => self.arena.cell_mut(p).next = None,
                }
                self.node_mut(inner).mklist = Some(first);
            }
        }
    }
}

/// Bit index of a trimmed mask (first zero bit, length byte included) and
/// whether the mask is contiguous.
fn mask_bit(m: &BinKey) -> (i16, bool) {
    let l = m.len();
    let mut i = 1usize;
    while i < l && m.at(i) == 0xFF {
        i += 1;
    }
    if i == l {
        return ((l * 8) as i16, true);
    }
    let c = m.at(i);
    let ones = c.leading_ones() as i16;
    let contig = (c.wrapping_neg() & c) == c.wrapping_neg();
    ((i * 8) as i16 + ones, contig && i == l - 1)
}
