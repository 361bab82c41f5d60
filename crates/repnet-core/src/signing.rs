//! Canonical opinion encoding and Ed25519 signature verification.
//!
//! The signed payload is version-tagged. Field order, widths, and the
//! empty-comment convention are part of the protocol: changing any of them
//! requires a new [`ENCODING_TAG`].
//!
//! ```text
//! "repnet/opinion/v1" 0x00
//! statement_id  i64 BE
//! signer_id     i64 BE
//! date          i64 BE   unix seconds
//! valid         u8       0 | 1
//! serial        u32 BE
//! certainty     i32 BE
//! comment       u32 BE byte length, UTF-8 bytes (absent encodes as empty)
//! ```

use std::{fmt, str::FromStr};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  id::SignerId,
  record::{Opinion, OpinionBody, SignedOpinion},
};

/// Domain-separation tag prefixed to every signed payload.
pub const ENCODING_TAG: &[u8] = b"repnet/opinion/v1\0";

const KEY_PREFIX: &str = "ed25519:";

// ─── PublicKey ───────────────────────────────────────────────────────────────

/// A signer's Ed25519 verifying key, written `ed25519:<base64>`.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    let array: [u8; 32] = bytes
      .try_into()
      .map_err(|_| Error::InvalidEntity(format!("public key must be 32 bytes, got {}", bytes.len())))?;
    VerifyingKey::from_bytes(&array)
      .map(Self)
      .map_err(|e| Error::InvalidEntity(format!("invalid public key: {e}")))
  }

  pub fn to_bytes(&self) -> [u8; 32] { self.0.to_bytes() }
}

impl From<VerifyingKey> for PublicKey {
  fn from(key: VerifyingKey) -> Self { Self(key) }
}

impl From<&SigningKey> for PublicKey {
  fn from(key: &SigningKey) -> Self { Self(key.verifying_key()) }
}

impl fmt::Display for PublicKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{KEY_PREFIX}{}", STANDARD.encode(self.0.as_bytes()))
  }
}

impl fmt::Debug for PublicKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "PublicKey({self})")
  }
}

impl FromStr for PublicKey {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let encoded = s
      .strip_prefix(KEY_PREFIX)
      .ok_or_else(|| Error::InvalidEntity(s.to_owned()))?;
    let bytes = STANDARD
      .decode(encoded)
      .map_err(|_| Error::InvalidEntity(s.to_owned()))?;
    Self::from_bytes(&bytes)
  }
}

impl TryFrom<String> for PublicKey {
  type Error = Error;

  fn try_from(s: String) -> Result<Self> { s.parse() }
}

impl From<PublicKey> for String {
  fn from(pk: PublicKey) -> String { pk.to_string() }
}

// ─── OwnKey ──────────────────────────────────────────────────────────────────

/// A node's own signing identity: its secret key and the signer id of the
/// `signer` statement that publishes the matching public key.
#[derive(Clone)]
pub struct OwnKey {
  key:    SigningKey,
  signer: SignerId,
}

impl OwnKey {
  pub fn new(key: SigningKey, signer: SignerId) -> Self { Self { key, signer } }

  pub fn signer(&self) -> SignerId { self.signer }

  pub fn public_key(&self) -> PublicKey { PublicKey::from(&self.key) }

  /// Sign `body` as this signer. `body.signer_id` is overwritten.
  pub fn sign(&self, mut body: OpinionBody) -> SignedOpinion {
    body.signer_id = self.signer;
    body.sign(&self.key)
  }
}

impl fmt::Debug for OwnKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("OwnKey")
      .field("signer", &self.signer)
      .field("public_key", &self.public_key())
      .finish_non_exhaustive()
  }
}

// ─── Encoding ────────────────────────────────────────────────────────────────

/// The exact bytes a signer signs for `body`.
pub fn canonical_bytes(body: &OpinionBody) -> Vec<u8> {
  let comment = body.comment.as_deref().unwrap_or("").as_bytes();
  let mut out = Vec::with_capacity(ENCODING_TAG.len() + 37 + comment.len());
  out.extend_from_slice(ENCODING_TAG);
  out.extend_from_slice(&body.statement_id.0.to_be_bytes());
  out.extend_from_slice(&body.signer_id.0.to_be_bytes());
  out.extend_from_slice(&body.date.timestamp().to_be_bytes());
  out.push(u8::from(body.valid));
  out.extend_from_slice(&body.serial.to_be_bytes());
  out.extend_from_slice(&body.certainty.to_be_bytes());
  // Comments longer than u32::MAX bytes cannot be produced by `sign`, so
  // they saturate here and simply fail verification.
  let len = u32::try_from(comment.len()).unwrap_or(u32::MAX);
  out.extend_from_slice(&len.to_be_bytes());
  out.extend_from_slice(comment);
  out
}

// ─── Sign / verify ───────────────────────────────────────────────────────────

/// Sign `body` and return the 64 signature bytes.
pub fn sign(body: &OpinionBody, key: &SigningKey) -> Vec<u8> {
  key.sign(&canonical_bytes(body)).to_bytes().to_vec()
}

/// Check `signature` over `body` against `key`.
///
/// Malformed signatures (wrong length, non-canonical encoding) verify to
/// `false`; this function never panics.
pub fn verify_parts(body: &OpinionBody, signature: &[u8], key: &PublicKey) -> bool {
  let Ok(sig) = Signature::from_slice(signature) else {
    return false;
  };
  key.0.verify_strict(&canonical_bytes(body), &sig).is_ok()
}

/// Verify a stored opinion against the public key of its claimed signer.
pub fn verify(opinion: &Opinion, key: &PublicKey) -> bool {
  verify_parts(&opinion.body, &opinion.signature, key)
}
