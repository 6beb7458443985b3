use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::{BinKey, MAX_BINKEY};
use crate::types::Af;

impl BinKey {
    /// Canonical address text for a key of known family. Short mask keys
    /// are zero-extended to the family length first.
    pub fn to_addr_string(&self, af: Af) -> String {
        match af {
            Af::V4 => {
                let mut o = [0u8; 4];
                for (i, b) in o.iter_mut().enumerate() {
                    *b = self.padded_byte(i + 1);
                }
                Ipv4Addr::from(o).to_string()
            }
            Af::V6 => {
                let mut o = [0u8; 16];
                for (i, b) in o.iter_mut().enumerate() {
                    *b = self.padded_byte(i + 1);
                }
                Ipv6Addr::from(o).to_string()
            }
        }
    }

    #[inline]
    fn padded_byte(&self, i: usize) -> u8 {
        if i < self.len().min(MAX_BINKEY) {
            self.at(i)
        } else {
            0
        }
    }
}

impl fmt::Display for BinKey {
    /// Formats by inferred family: any length above an IPv4 key prints as
    /// IPv6. Short mask keys print zero-extended as IPv4.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let af = if self.len() > Af::V4.keylen() as usize {
            Af::V6
        } else {
            Af::V4
        };
        f.write_str(&self.to_addr_string(af))
    }
}

impl fmt::Debug for BinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinKey[{};{}]", self.len(), self)
    }
}
