//! CIDR bounds and closed address ranges.
//!
//! All addresses live in one 128-bit ordered space: IPv6 addresses map to
//! their numeric value and IPv4 addresses to their IPv4-mapped IPv6 form
//! (`::ffff:a.b.c.d`). Bounds are persisted as fixed-width, lower-case hex
//! strings so that lexical and numeric order agree.

use std::{
  fmt,
  net::{IpAddr, Ipv4Addr, Ipv6Addr},
  str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Width of the persisted form, in hex digits.
pub const SORTABLE_WIDTH: usize = 32;

// ─── Bound ───────────────────────────────────────────────────────────────────

/// One endpoint of a CIDR range.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Bound(u128);

impl Bound {
  pub const MIN: Bound = Bound(0);
  pub const MAX: Bound = Bound(u128::MAX);

  pub fn new(value: u128) -> Self { Self(value) }

  pub fn value(self) -> u128 { self.0 }

  pub fn from_ip(addr: IpAddr) -> Self {
    match addr {
      IpAddr::V4(v4) => Self::from(v4),
      IpAddr::V6(v6) => Self::from(v6),
    }
  }

  /// Fixed-width persisted form.
  pub fn to_sortable(self) -> String { format!("{:0width$x}", self.0, width = SORTABLE_WIDTH) }

  /// Parse a persisted bound. Shorter hex strings are accepted so that
  /// bounds written with a narrower encoding can still be read.
  pub fn parse_sortable(s: &str) -> Result<Self> {
    let s = s.trim();
    if s.is_empty() || s.len() > SORTABLE_WIDTH {
      return Err(Error::InvalidRecord(format!("malformed bound {s:?}")));
    }
    u128::from_str_radix(s, 16)
      .map(Self)
      .map_err(|e| Error::InvalidRecord(format!("malformed bound {s:?}: {e}")))
  }

  /// Accept a bound stored as a plain integer column.
  pub fn from_integer(value: i64) -> Result<Self> {
    u128::try_from(value)
      .map(Self)
      .map_err(|_| Error::InvalidRecord(format!("negative bound {value}")))
  }
}

impl From<Ipv4Addr> for Bound {
  fn from(addr: Ipv4Addr) -> Self { Self(u128::from(addr.to_ipv6_mapped())) }
}

impl From<Ipv6Addr> for Bound {
  fn from(addr: Ipv6Addr) -> Self { Self(u128::from(addr)) }
}

impl From<Bound> for String {
  fn from(b: Bound) -> String { b.to_sortable() }
}

impl TryFrom<String> for Bound {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { Self::parse_sortable(&s) }
}

impl FromStr for Bound {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse_sortable(s) }
}

impl fmt::Display for Bound {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_sortable())
  }
}

// ─── CidrRange ───────────────────────────────────────────────────────────────

/// A closed interval `[min, max]` with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CidrRange {
  min: Bound,
  max: Bound,
}

impl CidrRange {
  pub fn new(min: Bound, max: Bound) -> Result<Self> {
    if min > max {
      return Err(Error::InvalidRecord(format!(
        "range bounds out of order: {min} > {max}"
      )));
    }
    Ok(Self { min, max })
  }

  /// The single-address range `[p, p]`.
  pub fn point(p: Bound) -> Self { Self { min: p, max: p } }

  pub fn from_v4_prefix(addr: Ipv4Addr, prefix: u8) -> Result<Self> {
    if prefix > 32 {
      return Err(Error::InvalidEntity(format!("{addr}/{prefix}")));
    }
    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - u32::from(prefix)) };
    let low = u32::from(addr) & mask;
    let high = low | !mask;
    Ok(Self {
      min: Bound::from(Ipv4Addr::from(low)),
      max: Bound::from(Ipv4Addr::from(high)),
    })
  }

  pub fn from_v6_prefix(addr: Ipv6Addr, prefix: u8) -> Result<Self> {
    if prefix > 128 {
      return Err(Error::InvalidEntity(format!("{addr}/{prefix}")));
    }
    let mask = if prefix == 0 { 0 } else { u128::MAX << (128 - u32::from(prefix)) };
    let low = u128::from(addr) & mask;
    Ok(Self { min: Bound(low), max: Bound(low | !mask) })
  }

  /// Build from two optional stored columns; both present or both absent.
  pub fn from_columns(min: Option<Bound>, max: Option<Bound>) -> Result<Option<Self>> {
    match (min, max) {
      (None, None) => Ok(None),
      (Some(min), Some(max)) => Self::new(min, max).map(Some),
      _ => Err(Error::InvalidRecord(
        "only one of cidr_min/cidr_max is present".into(),
      )),
    }
  }

  pub fn min(&self) -> Bound { self.min }

  pub fn max(&self) -> Bound { self.max }

  pub fn contains(&self, p: Bound) -> bool { self.min <= p && p <= self.max }

  /// Whether every address in `other` is also in `self`.
  pub fn covers(&self, other: CidrRange) -> bool { self.min <= other.min && other.max <= self.max }
}
