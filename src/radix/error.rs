use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RadixError {
    #[error("entry already present for this key and mask")]
    DuplicateEntry,
    #[error("mask annotation inconsistent; refusing to detach leaf")]
    InconsistentAnnotation,
}

pub type RadixResult<T> = Result<T, RadixError>;
