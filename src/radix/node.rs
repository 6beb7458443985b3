use bitflags::bitflags;

use crate::key::BinKey;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u8 {
        /// Head-owned sentinel cell; never detached, never user-visible.
        const ROOT = 0b0001;
        /// Leaf carries a contiguous mask; its subtree annotations can be
        /// checked by bit position alone.
        const NORMAL = 0b0010;
        /// Attached to a tree.
        const ACTIVE = 0b0100;
        /// Soft-deleted: structurally live, logically absent.
        const DELETED = 0b1000;
    }
}

/// Index of a node cell in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeRef(pub(crate) u32);

/// Index of a mask-reference cell in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MaskRefId(pub(crate) u32);

#[derive(Debug)]
pub(crate) struct Node<V> {
    /// Internal nodes: the bit position tested, counted from the start of
    /// the key buffer. Leaves: `-1 - (key offset + mask length)`.
    pub bit: i16,
    pub flags: NodeFlags,
    pub parent: NodeRef,
    /// Internal nodes: head of the mask-reference list for the subtree.
    /// Leaves: back-reference to their own annotation, if lifted.
    pub mklist: Option<MaskRefId>,
    pub kind: NodeKind<V>,
}

#[derive(Debug)]
pub(crate) enum NodeKind<V> {
    Internal {
        /// Byte index selected by this node's test.
        offset: u8,
        /// Bit mask applied to the selected byte.
        bmask: u8,
        left: NodeRef,
        right: NodeRef,
    },
    Leaf {
        key: BinKey,
        /// Interned mask identity: a leaf in the mask tree. None only on
        /// sentinels.
        mask: Option<NodeRef>,
        /// Next leaf sharing this key, with a shorter mask.
        dupedkey: Option<NodeRef>,
        /// The user value. None on sentinels, mask leaves and soft-deleted
        /// leaves.
        value: Option<V>,
    },
}

impl<V> Node<V> {
    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.bit < 0
    }

    #[inline(always)]
    pub fn is_root(&self) -> bool {
        self.flags.contains(NodeFlags::ROOT)
    }

    #[inline(always)]
    pub fn is_normal(&self) -> bool {
        self.flags.contains(NodeFlags::NORMAL)
    }

    #[inline(always)]
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(NodeFlags::DELETED)
    }

    pub fn leaf(key: BinKey, parent: NodeRef) -> Self {
        Self {
            bit: -1,
            flags: NodeFlags::ACTIVE,
            parent,
            mklist: None,
            kind: NodeKind::Leaf {
                key,
                mask: None,
                dupedkey: None,
                value: None,
            },
        }
    }

    pub fn internal(bit: i16, parent: NodeRef, left: NodeRef, right: NodeRef) -> Self {
        Self {
            bit,
            flags: NodeFlags::ACTIVE,
            parent,
            mklist: None,
            kind: NodeKind::Internal {
                offset: (bit >> 3) as u8,
                bmask: 0x80 >> (bit & 7),
                left,
                right,
            },
        }
    }
}

/// What a mask-reference cell points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MaskTarget {
    /// A NORMAL leaf annotated on an ancestor.
    Leaf(NodeRef),
    /// A mask-tree leaf, for non-contiguous or /0 masks.
    Mask(NodeRef),
}

#[derive(Debug)]
pub(crate) struct MaskRefCell {
    pub bit: i16,
    pub flags: NodeFlags,
    /// Extra references beyond the first; the cell is dropped when a
    /// decrement takes this below zero.
    pub refs: i32,
    pub target: MaskTarget,
    pub next: Option<MaskRefId>,
}

/// Slot arena holding every node and mask-reference cell of one tree.
/// Freed slots are recycled through free lists, so a `NodeRef` stays valid
/// for as long as its node is attached.
#[derive(Debug, Default)]
pub(crate) struct Arena<V> {
    nodes: Vec<Option<Node<V>>>,
    free_nodes: Vec<NodeRef>,
    cells: Vec<Option<MaskRefCell>>,
    free_cells: Vec<MaskRefId>,
}

impl<V> Arena<V> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(64),
            free_nodes: Vec::new(),
            cells: Vec::new(),
            free_cells: Vec::new(),
        }
    }

    pub fn alloc(&mut self, node: Node<V>) -> NodeRef {
        if let Some(r) = self.free_nodes.pop() {
            self.nodes[r.0 as usize] = Some(node);
            r
        } else {
            self.nodes.push(Some(node));
            NodeRef((self.nodes.len() - 1) as u32)
        }
    }

    pub fn free(&mut self, r: NodeRef) -> Node<V> {
        let node = self.nodes[r.0 as usize].take();
        self.free_nodes.push(r);
        match node {
            Some(n) => n,
            None => unreachable!("double free of node slot"),
        }
    }

    #[inline(always)]
    pub fn node(&self, r: NodeRef) -> &Node<V> {
        match self.nodes[r.0 as usize].as_ref() {
            Some(n) => n,
            None => unreachable!("stale node ref"),
        }
    }

    #[inline(always)]
    pub fn node_mut(&mut self, r: NodeRef) -> &mut Node<V> {
        match self.nodes[r.0 as usize].as_mut() {
            Some(n) => n,
            None => unreachable!("stale node ref"),
        }
    }

    pub fn alloc_cell(&mut self, cell: MaskRefCell) -> MaskRefId {
        if let Some(id) = self.free_cells.pop() {
            self.cells[id.0 as usize] = Some(cell);
            id
        } else {
            self.cells.push(Some(cell));
            MaskRefId((self.cells.len() - 1) as u32)
        }
    }

    pub fn free_cell(&mut self, id: MaskRefId) {
        self.cells[id.0 as usize] = None;
        self.free_cells.push(id);
    }

    #[inline(always)]
    pub fn cell(&self, id: MaskRefId) -> &MaskRefCell {
        match self.cells[id.0 as usize].as_ref() {
            Some(c) => c,
            None => unreachable!("stale mask ref"),
        }
    }

    #[inline(always)]
    pub fn cell_mut(&mut self, id: MaskRefId) -> &mut MaskRefCell {
        match self.cells[id.0 as usize].as_mut() {
            Some(c) => c,
            None => unreachable!("stale mask ref"),
        }
    }

    /// Takes every remaining user value out of the arena. Used on table
    /// teardown; visits every slot, so sentinel dupedkeys cannot be missed.
    pub fn drain_values(&mut self) -> Vec<V> {
        let mut out = Vec::new();
        for slot in self.nodes.iter_mut() {
            if let Some(Node {
                kind: NodeKind::Leaf { value, .. },
                ..
            }) = slot.as_mut()
                && let Some(v) = value.take()
            {
                out.push(v);
            }
        }
        out
    }
}
