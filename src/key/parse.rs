//! CIDR string parsing.
//!
//! IPv4 accepts one to four dot-separated groups in base 10, hex (`0x`) or
//! octal (leading `0`); missing trailing groups are zero, so `10.10/8` means
//! `10.10.0.0/8`. IPv6 accepts the standard textual form. The family is
//! picked from the literal: a colon selects IPv6, anything else must parse
//! as IPv4.

use std::net::Ipv6Addr;

use memchr::memchr;

use super::{BinKey, KeyError};
use crate::types::Af;

/// Longest accepted input: an IPv6 literal plus `/128`.
pub(crate) const MAX_STRKEY: usize = 50;

/// Parses `<address>[/<masklen>]` into a binary key, a mask length and the
/// address family. A missing mask parses as -1, meaning "host mask".
#[tracing::instrument(level = "trace", skip(s), fields(len = s.len()))]
pub fn parse_cidr(s: &str) -> Result<(BinKey, i32, Af), KeyError> {
    if s.is_empty() {
        return Err(KeyError::Empty);
    }
    if s.len() > MAX_STRKEY {
        return Err(KeyError::TooLong { input: s.into() });
    }

    let bytes = s.as_bytes();
    let (addr_part, masklen) = match memchr(b'/', bytes) {
        Some(pos) => {
            let m = parse_int(&s[pos + 1..]).ok_or_else(|| KeyError::BadMask {
                input: s.into(),
            })?;
            if !(0..=255).contains(&m) {
                return Err(KeyError::BadMask { input: s.into() });
            }
            (&s[..pos], m as i32)
        }
        None => (s, -1),
    };

    if addr_part.is_empty() {
        return Err(KeyError::Empty);
    }

    if memchr(b':', addr_part.as_bytes()).is_some() {
        let max = Af::V6.max_masklen() as i32;
        if masklen > max {
            return Err(KeyError::MaskRange { masklen, max: max as u8 });
        }
        let v6: Ipv6Addr = addr_part
            .parse()
            .map_err(|_| KeyError::BadAddress { input: s.into() })?;
        Ok((BinKey::v6(v6.octets()), masklen, Af::V6))
    } else {
        let max = Af::V4.max_masklen() as i32;
        if masklen > max {
            return Err(KeyError::MaskRange { masklen, max: max as u8 });
        }
        let key = parse_v4(addr_part).ok_or_else(|| KeyError::BadAddress {
            input: s.into(),
        })?;
        Ok((key, masklen, Af::V4))
    }
}

/// One to four numeric groups, left-aligned into the four address bytes.
fn parse_v4(s: &str) -> Option<BinKey> {
    if !s.as_bytes()[0].is_ascii_digit() {
        return None;
    }
    let mut octets = [0u8; 4];
    let mut count = 0usize;
    for group in s.split('.') {
        if count == 4 {
            return None; // too many groups
        }
        let v = parse_int(group)?;
        if !(0..=255).contains(&v) {
            return None;
        }
        octets[count] = v as u8;
        count += 1;
    }
    Some(BinKey::v4(octets))
}

/// Base-aware integer, `sscanf("%i")` style: `0x` hex, leading-0 octal,
/// base 10 otherwise, optional sign. The whole input must be consumed.
fn parse_int(s: &str) -> Option<i64> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() {
        return None;
    }
    let v = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        if hex.is_empty() {
            return None;
        }
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()?
    };
    Some(if neg { -v } else { v })
}
