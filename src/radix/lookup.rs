//! Exact lookup, longest-prefix match with mask-list backtracking,
//! less-specific ascent and pair-leaf location.

use super::node::{MaskTarget, NodeRef};
use super::tree::RadixTree;
use crate::key::{self, BinKey, KEY_OFFSET};

impl<V> RadixTree<V> {
    /// Longest-prefix match for `v`, deleted leaves included. The caller
    /// decides how to treat deleted results; `lpm` below skips them.
    pub(crate) fn match_addr(&self, v: &BinKey) -> Option<NodeRef> {
        let t = self.search(v, self.top);
        let tkey = self.leaf_key(t);

        // limit the exact compare to the candidate's mask coverage: the
        // stored key is pre-masked, so agreement there is a genuine match
        let mut vlen = v.len();
        if let Some(m) = self.leaf_mask(t) {
            vlen = self.leaf_key(m).len();
        }
        let mut diff = None;
        for i in 1..vlen {
            if v.at(i) != tkey.at(i) {
                diff = Some(i);
                break;
            }
        }
        let Some(di) = diff else {
            // never hand out a sentinel; its dupedkey is the explicit entry
            if self.node(t).is_root() {
                return self.dupedkey(t);
            }
            return Some(t);
        };

        // bit where the query leaves the candidate, as a leaf-style bit
        let q_bit = -1 - ((di * 8) as i16 + (v.at(di) ^ tkey.at(di)).leading_zeros() as i16);

        // the dupedkey chain may still hold a wide enough prefix
        let saved = t;
        let mut cur = if self.leaf_mask(t).is_none() {
            self.dupedkey(t)
        } else {
            Some(t)
        };
        while let Some(c) = cur {
            if self.node(c).is_normal() {
                if q_bit <= self.node(c).bit {
                    return Some(c);
                }
            } else if let Some(cm) = self.leaf_mask(c) {
                let mkey = self.leaf_key(cm);
                if key::isin(v, &self.leaf_key(c), Some(&mkey)) {
                    return Some(c);
                }
            }
            cur = self.dupedkey(c);
        }

        // walk back up, scanning each ancestor's mask list
        let mut t = saved;
        loop {
            t = self.node(t).parent;
            let mut m = self.node(t).mklist;
            while let Some(id) = m {
                let cell = self.arena.cell(id);
                let (bit, next, target, normal) = (
                    cell.bit,
                    cell.next,
                    cell.target,
                    cell.flags.contains(super::node::NodeFlags::NORMAL),
                );
                match target {
                    MaskTarget::Leaf(leaf) if normal => {
                        if q_bit <= bit {
                            return Some(leaf);
                        }
                    }
                    MaskTarget::Leaf(_) => {}
                    MaskTarget::Mask(mask_node) => {
                        let mkey = self.leaf_key(mask_node);
                        let mut x = Some(self.search_masked(v, t, &mkey));
                        while let Some(xi) = x {
                            if self.leaf_mask(xi) == Some(mask_node) {
                                break;
                            }
                            x = self.dupedkey(xi);
                        }
                        if let Some(xi) = x
                            && key::isin(v, &self.leaf_key(xi), Some(&mkey))
                        {
                            return Some(xi);
                        }
                    }
                }
                m = next;
            }
            if t == self.top {
                break;
            }
        }
        None
    }

    /// Longest-prefix match skipping soft-deleted leaves.
    pub(crate) fn lpm(&self, v: &BinKey) -> Option<NodeRef> {
        let mut rn = self.match_addr(v);
        while let Some(r) = rn {
            if !self.node(r).is_deleted() {
                return Some(r);
            }
            rn = self.lsm(r);
        }
        None
    }

    /// Exact lookup by key and mask identity, deleted leaves included.
    pub(crate) fn exact(&self, v: &BinKey, mask_full: &BinKey) -> Option<NodeRef> {
        let mask_node = self.addmask_search(mask_full)?;
        let mut cur = self.match_addr(v);
        while let Some(c) = cur {
            if self.leaf_mask(c) == Some(mask_node) {
                return Some(c);
            }
            cur = self.dupedkey(c);
        }
        None
    }

    #[inline]
    pub(crate) fn addmask_search(&self, mask_full: &BinKey) -> Option<NodeRef> {
        let trimmed = mask_full.trimmed();
        if trimmed.len() <= 1 {
            return Some(self.mask_left);
        }
        self.mask_index.get(&trimmed).copied()
    }

    /// Next strictly-less-specific stored prefix containing `leaf`'s key.
    /// Skips soft-deleted leaves and never returns `leaf` itself.
    pub(crate) fn lsm(&self, leaf: NodeRef) -> Option<NodeRef> {
        if !self.node(leaf).is_leaf() {
            return None;
        }
        let anchor_bit = self.node(leaf).bit;
        let akey = self.leaf_key(leaf);

        // shorter masks sit further down this leaf's own chain
        let mut cur = Some(leaf);
        while let Some(c) = cur {
            if self.node(c).is_normal()
                && anchor_bit < self.node(c).bit
                && !self.node(c).is_deleted()
            {
                return Some(c);
            }
            cur = self.dupedkey(c);
        }

        // climb out of the chain, then scan ancestor mask lists upward;
        // the anchor's own annotation is excluded below, so the first
        // internal ancestor's list is safe to scan too
        let mut rn = leaf;
        while self.node(self.node(rn).parent).is_leaf() {
            rn = self.node(rn).parent;
        }
        let mut t = self.node(rn).parent;
        loop {
            let mut m = self.node(t).mklist;
            while let Some(id) = m {
                let cell = self.arena.cell(id);
                let (bit, next, target, normal) = (
                    cell.bit,
                    cell.next,
                    cell.target,
                    cell.flags.contains(super::node::NodeFlags::NORMAL),
                );
                match target {
                    MaskTarget::Leaf(cand) if normal => {
                        if anchor_bit <= bit
                            && cand != leaf
                            && !self.node(cand).is_deleted()
                        {
                            return Some(cand);
                        }
                    }
                    MaskTarget::Leaf(_) => {}
                    MaskTarget::Mask(mask_node) => {
                        let mkey = self.leaf_key(mask_node);
                        let mut x = Some(self.search_masked(&akey, t, &mkey));
                        while let Some(xi) = x {
                            if self.leaf_mask(xi) == Some(mask_node) {
                                break;
                            }
                            x = self.dupedkey(xi);
                        }
                        if let Some(xi) = x
                            && xi != leaf
                            && !self.node(xi).is_deleted()
                            && key::isin(&akey, &self.leaf_key(xi), Some(&mkey))
                        {
                            return Some(xi);
                        }
                    }
                }
                m = next;
            }
            if t == self.top {
                break;
            }
            t = self.node(t).parent;
        }
        None
    }

    /// The sibling prefix at the same mask length, when stored and live.
    pub(crate) fn pair_leaf(&self, oth: NodeRef) -> Option<NodeRef> {
        let o = self.node(oth);
        if !o.is_leaf() || o.is_deleted() {
            return None;
        }
        let okey = self.leaf_key(oth);
        let omask = self.leaf_key(self.leaf_mask(oth)?);
        let pairkey = key::pair(&okey, &omask).ok()?;

        // climb to the internal node governing both siblings
        let maxb = KEY_OFFSET + omask.to_masklen() as i16;
        let mut rn = oth;
        while self.node(rn).is_leaf() || self.node(rn).bit >= maxb {
            rn = self.node(rn).parent;
        }

        // descend by the computed sibling key
        let mut x = self.search(&pairkey, rn);
        if self.node(x).is_root() {
            x = self.dupedkey(x)?;
        }
        if key::cmp_keys(&pairkey, &self.leaf_key(x)) != Ok(std::cmp::Ordering::Equal) {
            return None;
        }

        // same mask length somewhere down the chain
        let mut cur = Some(x);
        while let Some(c) = cur {
            if self.node(c).bit == o.bit {
                break;
            }
            cur = self.dupedkey(c);
        }
        let found = cur?;
        if self.node(found).is_deleted() {
            return None;
        }
        Some(found)
    }
}
