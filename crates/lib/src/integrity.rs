//! Self-integrity gate.
//!
//! Before anything privileged happens the running installer's bytes are
//! checked against a detached Ed25519 signature over their SHA-512 digest.
//! The signature and public key are fetched into a scoped temporary
//! directory that is removed on every exit path. Any failure is fatal.

use std::fs;
use std::path::PathBuf;

use base64::{Engine as _, engine::general_purpose};
use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha512};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::consts::{INSTALLER_MANIFEST_NAME, PUBLIC_KEY_RESOURCE, SIGNATURE_RESOURCE};
use crate::fetch::{FetchError, Fetcher};

#[derive(Debug, Error)]
pub enum IntegrityError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("failed to read installer {path}: {source}")]
  ReadInstaller {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to stage signature artifacts: {0}")]
  Scratch(#[source] std::io::Error),

  #[error("invalid public key: {0}")]
  InvalidKey(String),

  #[error("invalid signature: {0}")]
  InvalidSignature(String),

  #[error("signature does not match installer")]
  Mismatch,
}

pub struct IntegrityVerifier<'a, F> {
  config: &'a RunConfig,
  fetcher: &'a F,
}

impl<'a, F: Fetcher> IntegrityVerifier<'a, F> {
  pub fn new(config: &'a RunConfig, fetcher: &'a F) -> Self {
    Self { config, fetcher }
  }

  /// Verify the configured installer binary against the published signature.
  pub async fn verify(&self) -> Result<(), IntegrityError> {
    let sig_url = self.config.manifest_resource(INSTALLER_MANIFEST_NAME, SIGNATURE_RESOURCE);
    let key_url = self.config.manifest_resource(INSTALLER_MANIFEST_NAME, PUBLIC_KEY_RESOURCE);

    let scratch = tempfile::Builder::new()
      .prefix("imbuild-sig-")
      .tempdir()
      .map_err(IntegrityError::Scratch)?;
    let sig_path = scratch.path().join(SIGNATURE_RESOURCE);
    let key_path = scratch.path().join(PUBLIC_KEY_RESOURCE);

    fs::write(&sig_path, self.fetcher.fetch(&sig_url).await?).map_err(IntegrityError::Scratch)?;
    fs::write(&key_path, self.fetcher.fetch(&key_url).await?).map_err(IntegrityError::Scratch)?;
    debug!(dir = %scratch.path().display(), "staged signature artifacts");

    let installer = &self.config.installer_path;
    let bytes = fs::read(installer).map_err(|source| IntegrityError::ReadInstaller {
      path: installer.clone(),
      source,
    })?;
    let signature = fs::read(&sig_path).map_err(IntegrityError::Scratch)?;
    let key = fs::read(&key_path).map_err(IntegrityError::Scratch)?;

    verify_detached(&bytes, &signature, &key)?;
    info!(installer = %installer.display(), "installer signature verified");
    Ok(())
  }
}

/// Check `signature` over the SHA-512 digest of `message` with `public_key`.
pub fn verify_detached(message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), IntegrityError> {
  let key = parse_public_key(public_key)?;
  let signature = parse_signature(signature)?;
  let digest = Sha512::digest(message);

  key.verify(&digest, &signature).map_err(|_| IntegrityError::Mismatch)
}

/// Accepts a PEM SubjectPublicKeyInfo or 32 raw bytes encoded hex/base64.
fn parse_public_key(raw: &[u8]) -> Result<VerifyingKey, IntegrityError> {
  let text = std::str::from_utf8(raw)
    .map_err(|_| IntegrityError::InvalidKey("public key must be UTF-8 text".to_string()))?
    .trim();

  if text.starts_with("-----BEGIN") {
    return VerifyingKey::from_public_key_pem(text).map_err(|e| IntegrityError::InvalidKey(e.to_string()));
  }

  let bytes = decode_hex_or_base64(text).map_err(IntegrityError::InvalidKey)?;
  let key_bytes: [u8; 32] = bytes
    .try_into()
    .map_err(|_| IntegrityError::InvalidKey("Ed25519 public key must decode to 32 bytes".to_string()))?;
  VerifyingKey::from_bytes(&key_bytes).map_err(|e| IntegrityError::InvalidKey(e.to_string()))
}

/// Accepts 64 raw bytes or hex/base64 text.
fn parse_signature(raw: &[u8]) -> Result<Signature, IntegrityError> {
  if let Ok(bytes) = <[u8; 64]>::try_from(raw) {
    return Ok(Signature::from_bytes(&bytes));
  }

  let text = std::str::from_utf8(raw)
    .map_err(|_| IntegrityError::InvalidSignature("not 64 raw bytes or text".to_string()))?
    .trim();
  if text.is_empty() {
    return Err(IntegrityError::InvalidSignature("signature is empty".to_string()));
  }

  let bytes = decode_hex_or_base64(text).map_err(IntegrityError::InvalidSignature)?;
  let sig_bytes: [u8; 64] = bytes
    .try_into()
    .map_err(|_| IntegrityError::InvalidSignature("Ed25519 signature must decode to 64 bytes".to_string()))?;
  Ok(Signature::from_bytes(&sig_bytes))
}

fn decode_hex_or_base64(text: &str) -> Result<Vec<u8>, String> {
  if text.len() % 2 == 0 && text.chars().all(|c| c.is_ascii_hexdigit()) {
    return hex::decode(text).map_err(|e| e.to_string());
  }
  general_purpose::STANDARD
    .decode(text)
    .map_err(|_| "value must be base64 or hex encoded".to_string())
}
