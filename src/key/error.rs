use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("empty address string")]
    Empty,
    #[error("address string too long: '{input}'")]
    TooLong { input: String },
    #[error("malformed address '{input}'")]
    BadAddress { input: String },
    #[error("malformed mask in '{input}'")]
    BadMask { input: String },
    #[error("mask length {masklen} out of range (max {max})")]
    MaskRange { masklen: i32, max: u8 },
    #[error("keys have different lengths")]
    LengthMismatch,
    #[error("key has no address bytes")]
    EmptyKey,
    #[error("mask has no set bits")]
    EmptyMask,
    #[error("arithmetic wrapped around the address space")]
    AddressSpaceWrapped,
}
