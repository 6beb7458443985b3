//! `cidrtree` is a dual-stack IP prefix table: IPv4 and IPv6 CIDR blocks
//! mapped to opaque values, with exact lookup, longest-prefix match,
//! less-specific match, pair-block location and ordered enumeration.
//!
//! Storage is one path-compressed binary radix tree per address family,
//! threaded with a parallel mask tree for backtracking, the shape the BSD
//! networking stack made canonical. Nodes live in an index arena, so the
//! delete path never wrestles with shared ownership.
//!
//! ```
//! use cidrtree::IpTable;
//!
//! let mut t = IpTable::new();
//! t.set("10.0.0.0/8", 1).unwrap();
//! t.set("10.10.0.0/16", 2).unwrap();
//!
//! let (prefix, v) = t.lpm("10.10.10.1").unwrap().expect("covered");
//! assert_eq!(prefix.to_string(), "10.10.0.0/16");
//! assert_eq!(*v, 2);
//! ```

pub mod errors;
pub mod iter;
pub mod key;
mod radix;
mod table;
pub mod types;

pub use errors::{Error, TableResult};
pub use iter::{Less, More, Prefixes};
pub use key::{BinKey, KeyError};
pub use radix::RadixError;
pub use table::{FrameKind, IpTable, LeafView, NodeView, PurgeFn, WalkSession};
pub use types::{Af, Prefix, TableStats};

use std::sync::Arc;

use parking_lot::RwLock;

/// A cloneable handle sharing one table between threads: any number of
/// concurrent readers, one writer at a time.
///
/// Read closures must not call back into the handle; the lock is not
/// reentrant.
pub struct SharedIpTable<V> {
    inner: Arc<RwLock<IpTable<V>>>,
}

impl<V> Clone for SharedIpTable<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for SharedIpTable<V> {
    fn default() -> Self {
        Self::new(IpTable::new())
    }
}

impl<V> SharedIpTable<V> {
    pub fn new(table: IpTable<V>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    /// Runs `f` under the read lock, alongside other readers.
    pub fn read<R>(&self, f: impl FnOnce(&IpTable<V>) -> R) -> R {
        f(&self.inner.read())
    }

    /// Runs `f` under the write lock, excluding everyone else.
    pub fn write<R>(&self, f: impl FnOnce(&mut IpTable<V>) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn set(&self, s: &str, value: V) -> TableResult<()> {
        self.inner.write().set(s, value)
    }

    pub fn delete(&self, s: &str) -> TableResult<()> {
        self.inner.write().delete(s)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
