//! The dual-stack table: two radix trees, per-family counters, the purge
//! lifecycle and the node-traversal stack.

use smallvec::SmallVec;

use crate::errors::{Error, TableResult};
use crate::iter::{Less, More, Prefixes};
use crate::key::{self, BinKey, KEY_OFFSET};
use crate::radix::{MaskRefId, MaskTarget, NodeFlags, NodeRef, RadixTree};
use crate::types::{Af, Prefix, TableStats};

/// Disposal hook for departing values: overwritten, deleted or dropped with
/// the table. Called exactly once per value. Must not reenter the table; it
/// receives the value by move, so it cannot.
pub type PurgeFn<V> = Box<dyn FnMut(V) + Send>;

/// A dual-stack IP prefix table keyed by CIDR strings.
///
/// One radix tree per address family; the family is picked from the address
/// literal (a colon selects IPv6, anything else parses as IPv4, shorthand
/// included).
pub struct IpTable<V> {
    v4: RadixTree<V>,
    v6: RadixTree<V>,
    count4: usize,
    count6: usize,
    purge: Option<PurgeFn<V>>,
    frames: SmallVec<[Frame; 32]>,
    frames_af: Af,
    active_walks: usize,
}

impl<V> Default for IpTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IpTable<V> {
    pub fn new() -> Self {
        Self {
            v4: RadixTree::new(Af::V4),
            v6: RadixTree::new(Af::V6),
            count4: 0,
            count6: 0,
            purge: None,
            frames: SmallVec::new(),
            frames_af: Af::V4,
            active_walks: 0,
        }
    }

    /// A table that hands every departing value to `purge`.
    pub fn with_purge(purge: PurgeFn<V>) -> Self {
        let mut t = Self::new();
        t.purge = Some(purge);
        t
    }

    #[inline]
    fn tree(&self, af: Af) -> &RadixTree<V> {
        match af {
            Af::V4 => &self.v4,
            Af::V6 => &self.v6,
        }
    }

    #[inline]
    fn tree_mut(&mut self, af: Af) -> &mut RadixTree<V> {
        match af {
            Af::V4 => &mut self.v4,
            Af::V6 => &mut self.v6,
        }
    }

    #[inline]
    fn bump(&mut self, af: Af, up: bool) {
        let c = match af {
            Af::V4 => &mut self.count4,
            Af::V6 => &mut self.count6,
        };
        if up {
            *c += 1;
        } else {
            *c -= 1;
        }
    }

    #[inline]
    fn purge_value(&mut self, value: Option<V>) {
        if let Some(v) = value {
            match self.purge.as_mut() {
                Some(p) => p(v),
                None => drop(v),
            }
        }
    }

    #[inline]
    fn ensure_no_traversal(&self) -> TableResult<()> {
        if self.frames.is_empty() {
            Ok(())
        } else {
            Err(Error::TraversalActive)
        }
    }

    /// Parses a CIDR string into a network-masked key, its full-length mask
    /// and the effective mask length (host mask when absent).
    fn parse_pfx(s: &str) -> TableResult<(BinKey, BinKey, Af, u8)> {
        let (mut addr, masklen, af) = key::parse_cidr(s)?;
        let mask = BinKey::mask_by_len(masklen, af).map_err(Error::Key)?;
        addr.network(&mask).map_err(Error::Key)?;
        let masklen = if masklen < 0 {
            af.max_masklen()
        } else {
            masklen as u8
        };
        Ok((addr, mask, af, masklen))
    }

    // -- entry operations --------------------------------------------------

    /// Stores `value` under the prefix, masking the address first. An
    /// existing entry has its old value purged and replaced; a soft-deleted
    /// entry comes back to life.
    pub fn set(&mut self, s: &str, value: V) -> TableResult<()> {
        self.ensure_no_traversal()?;
        let (addr, mask, af, masklen) = Self::parse_pfx(s)?;
        tracing::event!(
            tracing::Level::TRACE,
            operation = "set",
            prefix = %s,
            masklen = masklen as u64
        );

        if let Some(leaf) = self.tree(af).exact(&addr, &mask) {
            let was_deleted = self.tree(af).node(leaf).is_deleted();
            let old = self.tree_mut(af).take_value(leaf);
            self.purge_value(old);
            let tree = self.tree_mut(af);
            tree.put_value(leaf, value);
            tree.node_mut(leaf).flags.remove(NodeFlags::DELETED);
            if was_deleted {
                self.bump(af, true);
            }
            return Ok(());
        }

        let leaf = self.tree_mut(af).add(addr, &mask)?;
        self.tree_mut(af).put_value(leaf, value);
        self.bump(af, true);
        Ok(())
    }

    /// Exact lookup. Soft-deleted entries read as absent.
    pub fn get(&self, s: &str) -> TableResult<Option<&V>> {
        let (addr, mask, af, _) = Self::parse_pfx(s)?;
        let tree = self.tree(af);
        Ok(tree
            .exact(&addr, &mask)
            .filter(|&r| !tree.node(r).is_deleted())
            .and_then(|r| tree.value(r)))
    }

    /// Exact lookup with a mutable value handle.
    pub fn get_mut(&mut self, s: &str) -> TableResult<Option<&mut V>> {
        let (addr, mask, af, _) = Self::parse_pfx(s)?;
        let tree = self.tree_mut(af);
        let leaf = tree
            .exact(&addr, &mask)
            .filter(|&r| !tree.node(r).is_deleted());
        Ok(leaf.and_then(|r| tree.value_mut(r)))
    }

    /// Removes the exact prefix. While a walk session is live the removal
    /// is soft: the leaf stays in place, flagged, its value purged. Absent
    /// and already-deleted prefixes report `NotFound`.
    pub fn delete(&mut self, s: &str) -> TableResult<()> {
        self.ensure_no_traversal()?;
        let (addr, mask, af, _) = Self::parse_pfx(s)?;
        tracing::event!(
            tracing::Level::TRACE,
            operation = "delete",
            prefix = %s,
            soft = self.active_walks > 0
        );

        if self.active_walks > 0 {
            let leaf = self
                .tree(af)
                .exact(&addr, &mask)
                .filter(|&r| !self.tree(af).node(r).is_deleted());
            let Some(leaf) = leaf else {
                return Err(Error::NotFound { prefix: s.into() });
            };
            let old = self.tree_mut(af).take_value(leaf);
            self.purge_value(old);
            self.tree_mut(af)
                .node_mut(leaf)
                .flags
                .insert(NodeFlags::DELETED);
            self.bump(af, false);
            return Ok(());
        }

        match self.tree_mut(af).remove(&addr, &mask)? {
            Some((_key, value, was_deleted)) => {
                self.purge_value(value);
                if was_deleted {
                    // logically gone already; this was only the collection
                    Err(Error::NotFound { prefix: s.into() })
                } else {
                    self.bump(af, false);
                    Ok(())
                }
            }
            None => Err(Error::NotFound { prefix: s.into() }),
        }
    }

    /// Hard-removes every soft-deleted leaf. Returns how many went.
    pub fn sweep(&mut self) -> TableResult<usize> {
        self.ensure_no_traversal()?;
        let mut collected = 0usize;
        for af in [Af::V4, Af::V6] {
            let mut doomed: Vec<(BinKey, u8)> = Vec::new();
            {
                let tree = self.tree(af);
                let mut cur = tree.first_leaf();
                while let Some(r) = cur {
                    if tree.node(r).is_deleted() {
                        doomed.push((tree.leaf_key(r), tree.leaf_masklen(r)));
                    }
                    cur = tree.next_leaf(r);
                }
            }
            for (key, masklen) in doomed {
                let mask = BinKey::mask_by_len(masklen as i32, af).map_err(Error::Key)?;
                if self.tree_mut(af).remove(&key, &mask)?.is_some() {
                    collected += 1;
                }
            }
        }
        Ok(collected)
    }

    // -- match operations --------------------------------------------------

    /// Longest-prefix match for an address; any `/len` suffix is ignored.
    pub fn lpm(&self, s: &str) -> TableResult<Option<(Prefix, &V)>> {
        let (addr, _, af) = key::parse_cidr(s)?;
        let tree = self.tree(af);
        Ok(tree
            .lpm(&addr)
            .and_then(|r| tree.value(r).map(|v| (tree.prefix_of(r), v))))
    }

    /// Least-specific match: the widest stored prefix containing the given
    /// prefix's network address whose mask is no longer than the query's.
    /// The query prefix itself qualifies when stored.
    pub fn lsm(&self, s: &str) -> TableResult<Option<(Prefix, &V)>> {
        let (addr, mask, af, masklen) = Self::parse_pfx(s)?;
        let tree = self.tree(af);
        let anchor = tree
            .exact(&addr, &mask)
            .filter(|&r| !tree.node(r).is_deleted());
        let mut rn = anchor.or_else(|| tree.lpm(&addr));

        // the less-specific chain shortens masks monotonically; its last
        // element is the widest covering prefix
        let mut widest = None;
        while let Some(r) = rn {
            widest = Some(r);
            rn = tree.lsm(r);
        }
        Ok(widest
            .filter(|&r| tree.leaf_masklen(r) <= masklen)
            .and_then(|r| tree.value(r).map(|v| (tree.prefix_of(r), v))))
    }

    /// The stored sibling block of the given prefix: same mask length, and
    /// together they tile the enclosing supernet one bit wider.
    pub fn pair(&self, s: &str) -> TableResult<Option<(Prefix, &V)>> {
        let (addr, mask, af, _) = Self::parse_pfx(s)?;
        let tree = self.tree(af);
        let anchor = tree
            .exact(&addr, &mask)
            .filter(|&r| !tree.node(r).is_deleted());
        Ok(anchor
            .and_then(|r| tree.pair_leaf(r))
            .and_then(|r| tree.value(r).map(|v| (tree.prefix_of(r), v))))
    }

    // -- enumeration -------------------------------------------------------

    /// Live prefixes of one family in ascending key order; within a key,
    /// most specific first.
    pub fn prefixes(&self, af: Af) -> Prefixes<'_, V> {
        let tree = self.tree(af);
        Prefixes {
            tree,
            cur: tree.first_leaf(),
        }
    }

    /// Runs `f` over every live prefix, IPv4 first, then IPv6.
    pub fn walk<F: FnMut(Prefix, &V)>(&self, mut f: F) {
        for af in [Af::V4, Af::V6] {
            for (p, v) in self.prefixes(af) {
                f(p, v);
            }
        }
    }

    /// Prefixes more specific than the anchor, in key order. The anchor
    /// itself only appears when `inclusive` is set.
    pub fn more(&self, s: &str, inclusive: bool) -> TableResult<More<'_, V>> {
        let (addr, mask, af, masklen) = Self::parse_pfx(s)?;
        let tree = self.tree(af);

        // leaf-style bit ceiling; the explicit /0 leaf sits at bit -1, all
        // other leaves at -1 - (offset + masklen)
        let mut maxb: i16 = if inclusive { 0 } else { -1 };
        maxb = if masklen == 0 {
            maxb - 1
        } else {
            maxb - 1 - KEY_OFFSET - masklen as i16
        };

        // governing node: deepest ancestor still testing a bit inside the
        // anchor prefix
        let descent = tree.search(&addr, tree.top);
        let mut top = tree.node(descent).parent;
        while tree.node(top).bit > masklen as i16 + KEY_OFFSET {
            if tree.node(top).is_root() {
                break;
            }
            top = tree.node(top).parent;
        }

        Ok(More {
            tree,
            top,
            cur: Some(tree.leftmost_leaf(top)),
            maxb,
            addr,
            mask,
        })
    }

    /// Prefixes wider than the anchor containing its network address, most
    /// specific first. The anchor itself only appears when `inclusive` is
    /// set.
    pub fn less(&self, s: &str, inclusive: bool) -> TableResult<Less<'_, V>> {
        let (addr, _, af, masklen) = Self::parse_pfx(s)?;
        let tree = self.tree(af);
        let limit = masklen as i32 - if inclusive { 0 } else { 1 };
        let cur = if limit < 0 { None } else { tree.lpm(&addr) };
        Ok(Less { tree, cur, limit })
    }

    /// Opens a walk session: leaf stepping plus mutation, with deletes
    /// degraded to soft deletes for the session's lifetime.
    pub fn walk_session(&mut self, af: Af) -> WalkSession<'_, V> {
        self.active_walks += 1;
        WalkSession {
            table: self,
            af,
            cur: None,
            started: false,
        }
    }

    // -- counters ----------------------------------------------------------

    #[inline]
    pub fn count_v4(&self) -> usize {
        self.count4
    }

    #[inline]
    pub fn count_v6(&self) -> usize {
        self.count6
    }

    /// Total number of live entries across both families.
    #[inline]
    pub fn len(&self) -> usize {
        self.count4 + self.count6
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn stats(&self) -> TableStats {
        TableStats {
            count4: self.count4,
            count6: self.count6,
        }
    }

    // -- node traversal ----------------------------------------------------

    /// Resets the traversal stack onto one family's tree head.
    pub fn first_node(&mut self, af: Af) {
        self.frames.clear();
        self.frames_af = af;
        self.frames.push(Frame::NodeHead);
    }

    /// Pops the next frame, pushes its progeny and describes the popped
    /// node. Parents always come out before their descendants; sentinels
    /// are never pushed as children.
    pub fn next_node(&mut self) -> Option<NodeView> {
        let frame = self.frames.pop()?;
        let af = self.frames_af;
        let tree = match af {
            Af::V4 => &self.v4,
            Af::V6 => &self.v6,
        };
        let mut push: SmallVec<[Frame; 6]> = SmallVec::new();

        let view = match frame {
            Frame::NodeHead => {
                push.push(Frame::MaskHead);
                if let Some(d) = tree.dupedkey(tree.left_end) {
                    push.push(Frame::Node(d));
                }
                if let Some(d) = tree.dupedkey(tree.right_end) {
                    push.push(Frame::Node(d));
                }
                let (l, r) = tree.children(tree.top);
                if !tree.node(r).is_root() {
                    push.push(Frame::Node(r));
                }
                if !tree.node(l).is_root() {
                    push.push(Frame::Node(l));
                }
                if let Some(m) = tree.node(tree.top).mklist {
                    push.push(Frame::MaskRef(m));
                }
                NodeView::head(FrameKind::NodeHead, tree.node(tree.top).bit)
            }
            Frame::MaskHead => {
                let (l, r) = tree.children(tree.mask_top);
                if !tree.node(r).is_root() {
                    push.push(Frame::MaskNode(r));
                }
                if !tree.node(l).is_root() {
                    push.push(Frame::MaskNode(l));
                }
                NodeView::head(FrameKind::MaskHead, tree.node(tree.mask_top).bit)
            }
            Frame::Node(r) => {
                let n = tree.node(r);
                if n.is_leaf() {
                    if let Some(d) = tree.dupedkey(r) {
                        push.push(Frame::Node(d));
                    }
                } else {
                    if let Some(m) = n.mklist {
                        push.push(Frame::MaskRef(m));
                    }
                    let (l, rt) = tree.children(r);
                    if !tree.node(rt).is_root() {
                        push.push(Frame::Node(rt));
                    }
                    if !tree.node(l).is_root() {
                        push.push(Frame::Node(l));
                    }
                }
                NodeView::node(tree, r, af, FrameKind::Node)
            }
            Frame::MaskNode(r) => {
                let n = tree.node(r);
                if !n.is_leaf() {
                    let (l, rt) = tree.children(r);
                    if !tree.node(rt).is_root() {
                        push.push(Frame::MaskNode(rt));
                    }
                    if !tree.node(l).is_root() {
                        push.push(Frame::MaskNode(l));
                    }
                }
                NodeView::node(tree, r, af, FrameKind::MaskNode)
            }
            Frame::MaskRef(id) => {
                let cell = tree.arena.cell(id);
                if let Some(next) = cell.next {
                    push.push(Frame::MaskRef(next));
                }
                let mask_key = match cell.target {
                    MaskTarget::Leaf(l) => tree.leaf_mask(l).map(|m| tree.leaf_key(m)),
                    MaskTarget::Mask(m) => Some(tree.leaf_key(m)),
                };
                NodeView {
                    kind: FrameKind::MaskRef,
                    bit: cell.bit,
                    leaf: false,
                    root: false,
                    normal: cell.flags.contains(NodeFlags::NORMAL),
                    deleted: false,
                    prefix: mask_key.map(|k| k.to_addr_string(af)),
                    masklen: mask_key.map(|k| k.to_masklen()),
                    refs: Some(cell.refs),
                }
            }
        };

        self.frames.extend(push);
        Some(view)
    }
}

impl<V> Drop for IpTable<V> {
    fn drop(&mut self) {
        // the arena drain visits every slot, so the sentinel dupedkey
        // chains at both ends are covered
        if self.purge.is_some() {
            let mut values = self.v4.arena.drain_values();
            values.append(&mut self.v6.arena.drain_values());
            for v in values {
                self.purge_value(Some(v));
            }
        }
    }
}

// -- walk sessions ---------------------------------------------------------

/// One leaf as seen by a walk session: soft-deleted leaves are reported,
/// flagged, so the session can collect or resurrect them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafView {
    pub prefix: Prefix,
    pub deleted: bool,
}

/// A registered iteration over one family's leaves that keeps table
/// mutation legal: deletes made through (or under) a live session are soft,
/// so the cursor never dangles.
pub struct WalkSession<'t, V> {
    table: &'t mut IpTable<V>,
    af: Af,
    cur: Option<NodeRef>,
    started: bool,
}

impl<'t, V> WalkSession<'t, V> {
    /// Steps to the next leaf in key order, deleted leaves included.
    pub fn next_prefix(&mut self) -> Option<LeafView> {
        let tree = self.table.tree(self.af);
        let next = if self.started {
            self.cur.and_then(|c| tree.next_leaf(c))
        } else {
            self.started = true;
            tree.first_leaf()
        };
        self.cur = next;
        next.map(|r| LeafView {
            prefix: tree.prefix_of(r),
            deleted: tree.node(r).is_deleted(),
        })
    }

    /// Soft-deletes a prefix; the leaf stays in place for the cursor.
    pub fn delete(&mut self, s: &str) -> TableResult<()> {
        self.table.delete(s)
    }

    pub fn set(&mut self, s: &str, value: V) -> TableResult<()> {
        self.table.set(s, value)
    }

    pub fn get(&self, s: &str) -> TableResult<Option<&V>> {
        self.table.get(s)
    }

    pub fn lpm(&self, s: &str) -> TableResult<Option<(Prefix, &V)>> {
        self.table.lpm(s)
    }
}

impl<V> Drop for WalkSession<'_, V> {
    fn drop(&mut self) {
        self.table.active_walks -= 1;
    }
}

// -- node traversal frames -------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    NodeHead,
    MaskHead,
    Node(NodeRef),
    MaskNode(NodeRef),
    MaskRef(MaskRefId),
}

/// Frame taxonomy for the node traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    NodeHead,
    MaskHead,
    Node,
    MaskNode,
    MaskRef,
}

/// Owned diagnostic view of one traversal frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    pub kind: FrameKind,
    pub bit: i16,
    pub leaf: bool,
    pub root: bool,
    pub normal: bool,
    pub deleted: bool,
    /// Leaves: the stored address (or mask bytes for mask frames).
    pub prefix: Option<String>,
    pub masklen: Option<u8>,
    /// Extra reference count, mask-reference frames only.
    pub refs: Option<i32>,
}

impl NodeView {
    fn head(kind: FrameKind, bit: i16) -> Self {
        Self {
            kind,
            bit,
            leaf: false,
            root: true,
            normal: false,
            deleted: false,
            prefix: None,
            masklen: None,
            refs: None,
        }
    }

    fn node<V>(tree: &RadixTree<V>, r: NodeRef, af: Af, kind: FrameKind) -> Self {
        let n = tree.node(r);
        let (prefix, masklen) = if n.is_leaf() && !n.is_root() {
            let masklen = if kind == FrameKind::MaskNode {
                // a mask leaf is its own mask
                tree.leaf_key(r).to_masklen()
            } else {
                tree.leaf_masklen(r)
            };
            (Some(tree.leaf_key(r).to_addr_string(af)), Some(masklen))
        } else {
            (None, None)
        };
        Self {
            kind,
            bit: n.bit,
            leaf: n.is_leaf(),
            root: n.is_root(),
            normal: n.is_normal(),
            deleted: n.is_deleted(),
            prefix,
            masklen,
            refs: None,
        }
    }
}
