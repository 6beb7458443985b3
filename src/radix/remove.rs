//! Deletion: annotation release, chain surgery and parent collapse.

use super::error::{RadixError, RadixResult};
use super::node::{MaskRefId, MaskTarget, NodeKind, NodeRef};
use crate::key::BinKey;

use super::tree::RadixTree;

impl<V> RadixTree<V> {
    /// Detaches the exact (key, mask) leaf and recycles its cells. Returns
    /// the stored key, the value slot and whether the leaf had been
    /// soft-deleted; `Ok(None)` when absent. The tree is left as found
    /// unless the leaf actually comes out.
    pub(crate) fn remove(
        &mut self,
        v: &BinKey,
        mask_full: &BinKey,
    ) -> RadixResult<Option<(BinKey, Option<V>, bool)>> {
        let saved = self.search(v, self.top);
        let skey = self.leaf_key(saved);
        for i in 1..v.len() {
            if v.at(i) != skey.at(i) {
                return Ok(None);
            }
        }

        // locate the chain member carrying this mask
        let Some(mask_node) = self.addmask_search(mask_full) else {
            return Ok(None);
        };
        let mut tt = saved;
        while self.leaf_mask(tt) != Some(mask_node) {
            match self.dupedkey(tt) {
                Some(d) => tt = d,
                None => return Ok(None),
            }
        }
        if self.node(tt).is_root() {
            return Ok(None);
        }

        self.release_annotation(tt, saved)?;

        // structural unlink
        let head_duped = self.dupedkey(saved);
        if head_duped.is_some() || tt != saved {
            if tt == saved {
                // the chain head leaves; the next member takes its place
                let promoted = match head_duped {
                    Some(d) => d,
                    None => unreachable!("chain head with members"),
                };
                let parent = self.node(tt).parent;
                self.node_mut(promoted).parent = parent;
                self.replace_child(parent, tt, promoted);
            } else {
                let mut pred = saved;
                while self.dupedkey(pred) != Some(tt) {
                    match self.dupedkey(pred) {
                        Some(d) => pred = d,
                        None => unreachable!("target sits on this chain"),
                    }
                }
                let after = self.dupedkey(tt);
                self.set_dupedkey(pred, after);
                if let Some(a) = after {
                    self.node_mut(a).parent = pred;
                }
            }
        } else {
            self.collapse_parent(tt);
        }

        let was_deleted = self.node(tt).is_deleted();
        let node = self.arena.free(tt);
        match node.kind {
            NodeKind::Leaf { key, value, .. } => Ok(Some((key, value, was_deleted))),
            NodeKind::Internal { .. } => unreachable!("detached node is a leaf"),
        }
    }

    /// Drops the leaf's mask annotation, honoring shared refcounts. Errors
    /// abort the deletion before any structural change.
    fn release_annotation(&mut self, tt: NodeRef, chain_head: NodeRef) -> RadixResult<()> {
        if self.leaf_mask(tt).is_none() {
            return Ok(());
        }
        let Some(saved_m) = self.node(tt).mklist else {
            return Ok(());
        };

        if self.node(tt).is_normal() {
            let c = self.arena.cell(saved_m);
            if c.target != MaskTarget::Leaf(tt) || c.refs > 0 {
                return Err(RadixError::InconsistentAnnotation);
            }
        } else {
            let target = self.arena.cell(saved_m).target;
            let owned = matches!(target, MaskTarget::Mask(m) if Some(m) == self.leaf_mask(tt));
            if !owned {
                return Ok(());
            }
            let c = self.arena.cell_mut(saved_m);
            c.refs -= 1;
            if c.refs >= 0 {
                return Ok(()); // other leaves still share the annotation
            }
        }

        // find the ancestor the annotation was lifted to and unlink it
        let b = -1 - self.node(tt).bit;
        let start = self.node(chain_head).parent;
        if b > self.node(start).bit {
            return Ok(()); // was never lifted
        }
        let mut xa = start;
        let mut ta = self.node(start).parent;
        while b <= self.node(ta).bit && xa != self.top {
            xa = ta;
            ta = self.node(ta).parent;
        }
        let mut prev: Option<MaskRefId> = None;
        let mut cur = self.node(xa).mklist;
        while let Some(id) = cur {
            let next = self.arena.cell(id).next;
            if id == saved_m {
                match prev {
                    None => self.node_mut(xa).mklist = next,
                    Some(p) => self.arena.cell_mut(p).next = next,
                }
                self.arena.free_cell(id);
                return Ok(());
            }
            prev = Some(id);
            cur = next;
        }
        if self.node(tt).is_normal() {
            // a dangling reference to us would outlive the leaf
            return Err(RadixError::InconsistentAnnotation);
        }
        Ok(())
    }

    /// `tt` is the sole leaf under its parent; the sibling takes the
    /// parent's place and inherits whatever annotations still apply.
    fn collapse_parent(&mut self, tt: NodeRef) {
        let t = self.node(tt).parent;
        let (l, r) = self.children(t);
        let x = if l == tt { r } else { l };
        let p = self.node(t).parent;
        self.replace_child(p, t, x);
        self.node_mut(x).parent = p;

        if let Some(tm) = self.node(t).mklist {
            if !self.node(x).is_leaf() {
                // the whole list still covers x's subtree; append it
                let mut tail: Option<MaskRefId> = None;
                let mut cur = self.node(x).mklist;
                while let Some(id) = cur {
                    tail = Some(id);
                    cur = self.arena.cell(id).next;
                }
                match tail {
                    None => self.node_mut(x).mklist = Some(tm),
                    Some(pr) => self.arena.cell_mut(pr).next = Some(tm),
                }
            } else {
                // annotations of sibling chain members come back home; both
                // lists run most-specific-first, so one pass suffices
                let mut m = Some(tm);
                let mut chain = Some(x);
                while let (Some(mi), Some(xi)) = (m, chain) {
                    if self.node(xi).mklist == Some(mi) {
                        let next_m = self.arena.cell(mi).next;
                        self.node_mut(xi).mklist = None;
                        let c = self.arena.cell_mut(mi);
                        c.refs -= 1;
                        if c.refs < 0 {
                            self.arena.free_cell(mi);
                        }
                        m = next_m;
                    }
                    chain = self.dupedkey(xi);
                }
            }
        }
        self.arena.free(t);
    }
}
