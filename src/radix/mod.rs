//! Path-compressed binary radix trees with parallel mask trees, one per
//! address family. All structure lives in a slot arena; links are indices,
//! so the delete path never juggles ownership across nodes.

mod error;
pub(crate) mod node;
mod insert;
mod lookup;
mod remove;
mod tree;
mod walk;

pub use error::RadixError;
pub(crate) use node::{MaskRefId, MaskTarget, NodeFlags, NodeRef};
pub(crate) use tree::RadixTree;
