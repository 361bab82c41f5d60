//! Node configuration, read from `repnet.toml` and `REPNET_*` variables.

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use anyhow::Context as _;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use ed25519_dalek::SigningKey;
use repnet_core::{id::SignerId, store::TrustTable};
use repnet_engine::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// Per-call deadline for store reads during resolution.
  pub store_timeout_ms: u64,
  /// Weight of signers not listed in `trust`.
  pub default_trust:    f64,
  /// Signer id to trust weight.
  pub trust:            BTreeMap<String, f64>,
  /// Base64 Ed25519 secret key, as printed by `--generate-key`. Without it
  /// the node cannot sign and refuses submissions.
  pub own_key:          Option<String>,
}

impl Default for NodeConfig {
  fn default() -> Self {
    Self {
      host:             "127.0.0.1".to_string(),
      port:             8450,
      store_path:       PathBuf::from("~/.local/share/repnet/repnet.sqlite"),
      store_timeout_ms: 2_000,
      default_trust:    0.0,
      trust:            BTreeMap::new(),
      own_key:          None,
    }
  }
}

impl NodeConfig {
  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig { store_timeout: Duration::from_millis(self.store_timeout_ms) }
  }

  pub fn trust_table(&self) -> anyhow::Result<TrustTable> {
    let mut table = TrustTable::new(self.default_trust);
    for (signer, weight) in &self.trust {
      let id: i64 = signer
        .trim()
        .parse()
        .with_context(|| format!("trust key {signer:?} is not a signer id"))?;
      table.set(SignerId(id), *weight);
    }
    Ok(table)
  }

  pub fn signing_key(&self) -> anyhow::Result<Option<SigningKey>> {
    let Some(encoded) = &self.own_key else {
      return Ok(None);
    };
    let bytes = STANDARD
      .decode(encoded.trim())
      .context("own_key is not valid base64")?;
    let secret: [u8; 32] = bytes
      .try_into()
      .map_err(|b: Vec<u8>| anyhow::anyhow!("own_key must be 32 bytes, got {}", b.len()))?;
    Ok(Some(SigningKey::from_bytes(&secret)))
  }
}
