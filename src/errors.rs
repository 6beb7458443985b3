use thiserror::Error;

use crate::key::KeyError;
use crate::radix::RadixError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Radix(#[from] RadixError),
    #[error("no entry for prefix '{prefix}'")]
    NotFound { prefix: String },
    #[error("node traversal in progress; restart it after mutating the table")]
    TraversalActive,
}

pub type TableResult<T> = Result<T, Error>;
