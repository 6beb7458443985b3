use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::key::{self, BinKey, KeyError};

/// Address family, derived from a binary key's length byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Af {
    V4,
    V6,
}

impl Af {
    /// Total binary key length including the length byte itself.
    #[inline(always)]
    pub const fn keylen(self) -> u8 {
        match self {
            Af::V4 => 5,
            Af::V6 => 17,
        }
    }

    #[inline(always)]
    pub const fn max_masklen(self) -> u8 {
        match self {
            Af::V4 => 32,
            Af::V6 => 128,
        }
    }
}

/// A CIDR block: a network-masked address plus a mask length.
///
/// The address is always stored masked, so `Prefix` values compare equal
/// iff they denote the same block.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    addr: BinKey,
    masklen: u8,
}

impl Prefix {
    /// Builds a prefix from an address key and a mask length, masking the
    /// address down to its network address.
    pub fn new(addr: BinKey, masklen: u8) -> Result<Self, KeyError> {
        let af = addr.af().ok_or(KeyError::EmptyKey)?;
        if masklen > af.max_masklen() {
            return Err(KeyError::MaskRange {
                masklen: masklen as i32,
                max: af.max_masklen(),
            });
        }
        let mask = BinKey::mask_by_len(masklen as i32, af)?;
        let mut addr = addr;
        addr.network(&mask)?;
        Ok(Self { addr, masklen })
    }

    /// Internal constructor for keys already masked by the tree.
    #[inline]
    pub(crate) fn from_masked(addr: BinKey, masklen: u8) -> Self {
        Self { addr, masklen }
    }

    #[inline]
    pub fn af(&self) -> Af {
        match self.addr.af() {
            Some(af) => af,
            None => unreachable!("prefix holds a family-tagged key"),
        }
    }

    #[inline]
    pub fn addr(&self) -> &BinKey {
        &self.addr
    }

    #[inline]
    pub fn masklen(&self) -> u8 {
        self.masklen
    }

    /// True iff `addr` falls inside this block.
    pub fn contains(&self, addr: &BinKey) -> bool {
        if addr.af() != Some(self.af()) {
            return false;
        }
        match BinKey::mask_by_len(self.masklen as i32, self.af()) {
            Ok(mask) => key::isin(addr, &self.addr, Some(&mask)),
            Err(_) => false,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.masklen)
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prefix({self})")
    }
}

impl FromStr for Prefix {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, masklen, af) = key::parse_cidr(s)?;
        let masklen = if masklen < 0 {
            af.max_masklen()
        } else {
            masklen as u8
        };
        Prefix::new(addr, masklen)
    }
}

impl Serialize for Prefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Prefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Per-family entry counts, serializable for diagnostics dumps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub count4: usize,
    pub count6: usize,
}

impl TableStats {
    #[inline]
    pub fn total(&self) -> usize {
        self.count4 + self.count6
    }
}
