//! Entities (the subjects statements talk about) and query descriptors.
//!
//! Entities are referenced by their canonical string label inside statement
//! fields. Parsing a label into an [`Entity`] recovers its kind and, for
//! addresses, the range it covers.

use std::{
  fmt,
  net::{IpAddr, Ipv4Addr, Ipv6Addr},
  str::FromStr,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
  Error, Result,
  bound::{Bound, CidrRange},
  signing::PublicKey,
};

// ─── Entity ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
  Domain(String),
  /// `localpart@domain`
  EMail(String),
  /// An autonomous system, written `AS12345`.
  As(u32),
  Ipv4 { addr: Ipv4Addr, prefix: u8 },
  Ipv6 { addr: Ipv6Addr, prefix: u8 },
  Signer(PublicKey),
  /// A URL, e.g. an abuse contact form.
  Url(String),
  /// Base64 SHA-256 of an e-mail address, written `#@<digest>`.
  HashedEMail(String),
}

impl Entity {
  /// Hash an e-mail address so it can be published without the address.
  pub fn hashed_email_for(email: &str) -> Self {
    let digest = Sha256::digest(email.as_bytes());
    Self::HashedEMail(STANDARD.encode(digest))
  }

  /// The address range covered by an IP entity.
  pub fn range(&self) -> Option<CidrRange> {
    match self {
      Self::Ipv4 { addr, prefix } => CidrRange::from_v4_prefix(*addr, *prefix).ok(),
      Self::Ipv6 { addr, prefix } => CidrRange::from_v6_prefix(*addr, *prefix).ok(),
      _ => None,
    }
  }

}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Domain(s) | Self::EMail(s) | Self::Url(s) => f.write_str(s),
      Self::As(n) => write!(f, "AS{n}"),
      Self::Ipv4 { addr, prefix: 32 } => write!(f, "{addr}"),
      Self::Ipv4 { addr, prefix } => write!(f, "{addr}/{prefix}"),
      Self::Ipv6 { addr, prefix: 128 } => write!(f, "{addr}"),
      Self::Ipv6 { addr, prefix } => write!(f, "{addr}/{prefix}"),
      Self::Signer(pk) => write!(f, "{pk}"),
      Self::HashedEMail(s) => write!(f, "#@{s}"),
    }
  }
}

impl FromStr for Entity {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::InvalidEntity(s.to_owned());
    if s.is_empty() {
      return Err(invalid());
    }

    if s.starts_with("http://") || s.starts_with("https://") {
      return Ok(Self::Url(s.to_owned()));
    }
    if let Some(digest) = s.strip_prefix("#@") {
      return Ok(Self::HashedEMail(digest.to_owned()));
    }
    if s.starts_with("ed25519:") {
      return s.parse().map(Self::Signer);
    }
    if s.contains('@') {
      return Ok(Self::EMail(s.to_owned()));
    }
    if let Some(entity) = parse_ip(s)? {
      return Ok(entity);
    }
    if s.contains('.') {
      return Ok(Self::Domain(s.to_owned()));
    }
    if let Some(num) = s.strip_prefix("AS") {
      return num.parse().map(Self::As).map_err(|_| invalid());
    }
    Err(invalid())
  }
}

/// Parse `addr` or `addr/prefix`. Returns `Ok(None)` if `s` is not an
/// address at all, and an error if it is one but the prefix is malformed or
/// host bits are set.
fn parse_ip(s: &str) -> Result<Option<Entity>> {
  let (addr_part, prefix_part) = match s.split_once('/') {
    Some((a, p)) => (a, Some(p)),
    None => (s, None),
  };
  let Ok(addr) = addr_part.parse::<IpAddr>() else {
    return Ok(None);
  };
  let invalid = || Error::InvalidEntity(s.to_owned());

  let (entity, range) = match addr {
    IpAddr::V4(addr) => {
      let prefix = prefix_part.map_or(Ok(32), str::parse::<u8>).map_err(|_| invalid())?;
      (Entity::Ipv4 { addr, prefix }, CidrRange::from_v4_prefix(addr, prefix)?)
    }
    IpAddr::V6(addr) => {
      let prefix = prefix_part.map_or(Ok(128), str::parse::<u8>).map_err(|_| invalid())?;
      (Entity::Ipv6 { addr, prefix }, CidrRange::from_v6_prefix(addr, prefix)?)
    }
  };
  if range.min() != Bound::from_ip(addr) {
    return Err(invalid());
  }
  Ok(Some(entity))
}

// ─── EntityDescriptor ────────────────────────────────────────────────────────

/// What a caller asks about.
///
/// A name is matched exactly. An address or network is matched exactly by
/// label and also by every ranged statement whose range covers all of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EntityDescriptor {
  Name(String),
  Address(IpAddr),
  Network { addr: IpAddr, prefix: u8 },
}

impl EntityDescriptor {
  /// An IP literal becomes an [`EntityDescriptor::Address`] and
  /// `addr/prefix` a [`EntityDescriptor::Network`]; anything else non-empty
  /// is a name.
  pub fn parse(s: &str) -> Result<Self> {
    let s = s.trim();
    if s.is_empty() {
      return Err(Error::InvalidEntity(s.to_owned()));
    }
    if let Ok(addr) = s.parse::<IpAddr>() {
      return Ok(Self::Address(addr));
    }
    if let Some((addr, _)) = s.split_once('/')
      && addr.parse::<IpAddr>().is_ok()
    {
      return match parse_ip(s)? {
        Some(Entity::Ipv4 { addr, prefix }) => Ok(Self::Network { addr: addr.into(), prefix }),
        Some(Entity::Ipv6 { addr, prefix }) => Ok(Self::Network { addr: addr.into(), prefix }),
        _ => Err(Error::InvalidEntity(s.to_owned())),
      };
    }
    Ok(Self::Name(s.to_owned()))
  }

  /// Label used for exact matching against statement entities.
  pub fn label(&self) -> String {
    match self {
      Self::Name(name) => name.clone(),
      Self::Address(addr) => addr.to_string(),
      Self::Network { addr, prefix } => format!("{addr}/{prefix}"),
    }
  }

  /// The range a covering statement must contain, if any.
  pub fn range(&self) -> Option<CidrRange> {
    match self {
      Self::Name(_) => None,
      Self::Address(addr) => Some(CidrRange::point(Bound::from_ip(*addr))),
      Self::Network { addr: IpAddr::V4(addr), prefix } => CidrRange::from_v4_prefix(*addr, *prefix).ok(),
      Self::Network { addr: IpAddr::V6(addr), prefix } => CidrRange::from_v6_prefix(*addr, *prefix).ok(),
    }
  }
}

impl fmt::Display for EntityDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.label()) }
}
