//! HTTP fetching and archive digest checks.

use std::future::Future;

use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
  /// HTTP request failed or returned a non-success status.
  #[error("fetch failed for {url}: {message}")]
  FetchFailed { url: String, message: String },
}

/// Retrieves the body of a URL.
pub trait Fetcher {
  fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>>;

  /// Fetch a single whitespace-trimmed text token.
  fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> {
    async move {
      let bytes = self.fetch(url).await?;
      Ok(String::from_utf8_lossy(&bytes).trim().to_string())
    }
  }
}

/// `Fetcher` backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Fetcher for HttpFetcher {
  async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    info!(url = %url, "fetching URL");

    let failed = |message: String| FetchError::FetchFailed {
      url: url.to_string(),
      message,
    };

    let response = self.client.get(url).send().await.map_err(|e| failed(e.to_string()))?;

    if !response.status().is_success() {
      return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    debug!(url = %url, size = bytes.len(), "download complete");

    Ok(bytes.to_vec())
  }
}

/// Outcome of comparing an archive against its expected digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum HashCheck {
  /// The manifest provided no digest.
  NotProvided,
  Verified,
  Mismatch { expected: String, actual: String },
}

impl HashCheck {
  pub fn is_mismatch(&self) -> bool {
    matches!(self, HashCheck::Mismatch { .. })
  }
}

/// Hex digest of `data` using the algorithm implied by `expected`'s length.
///
/// 40 hex characters select SHA-1, 128 select SHA-512, anything else SHA-256.
pub fn digest_for(expected: &str, data: &[u8]) -> String {
  match expected.len() {
    40 => hex::encode(Sha1::digest(data)),
    128 => hex::encode(Sha512::digest(data)),
    _ => hex::encode(Sha256::digest(data)),
  }
}

/// Compare `data` against an optional expected digest (case-insensitive).
pub fn check_hash(expected: Option<&str>, data: &[u8]) -> HashCheck {
  let Some(expected) = expected.map(str::trim).filter(|e| !e.is_empty()) else {
    return HashCheck::NotProvided;
  };

  let expected = expected.to_ascii_lowercase();
  let actual = digest_for(&expected, data);
  if actual == expected {
    HashCheck::Verified
  } else {
    HashCheck::Mismatch { expected, actual }
  }
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it, falling back to a digest
/// of the URL when no usable name remains.
pub fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    let filename = filename.split('?').next().unwrap_or(filename);

    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  format!("download_{}", &hex::encode(Sha256::digest(url.as_bytes()))[..16])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn no_expected_hash_is_not_provided() {
    assert_eq!(check_hash(None, b"data"), HashCheck::NotProvided);
    assert_eq!(check_hash(Some("  "), b"data"), HashCheck::NotProvided);
  }

  #[test]
  fn sha1_digest_selected_by_length() {
    // sha1("abc")
    let expected = "a9993e364706816aba3e25717850c26c9cd0d89d";
    assert_eq!(check_hash(Some(expected), b"abc"), HashCheck::Verified);
  }

  #[test]
  fn sha256_digest_is_case_insensitive() {
    let expected = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
    assert_eq!(check_hash(Some(expected), b"abc"), HashCheck::Verified);
  }

  #[test]
  fn sha512_digest_selected_by_length() {
    let expected = hex::encode(Sha512::digest(b"abc"));
    assert_eq!(check_hash(Some(&expected), b"abc"), HashCheck::Verified);
  }

  #[test]
  fn mismatch_reports_both_digests() {
    let expected = "a9993e364706816aba3e25717850c26c9cd0d89d";
    let check = check_hash(Some(expected), b"abd");
    match check {
      HashCheck::Mismatch { expected: e, actual } => {
        assert_eq!(e, expected);
        assert_eq!(actual.len(), 40);
        assert_ne!(actual, expected);
      }
      other => panic!("expected mismatch, got {other:?}"),
    }
  }

  #[test]
  fn url_to_filename_simple() {
    assert_eq!(url_to_filename("https://example.com/libaom-3.8.0.tar.gz"), "libaom-3.8.0.tar.gz");
  }

  #[test]
  fn url_to_filename_with_query() {
    assert_eq!(url_to_filename("https://example.com/v1.0.tar.gz?token=abc"), "v1.0.tar.gz");
  }

  #[test]
  fn url_to_filename_fallback_for_empty() {
    assert!(url_to_filename("https://example.com/").starts_with("download_"));
  }

  #[tokio::test]
  async fn http_fetcher_returns_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/aom/version")
      .with_status(200)
      .with_body("3.8.0\n")
      .create_async()
      .await;

    let fetcher = HttpFetcher::new();
    let text = fetcher.fetch_text(&format!("{}/aom/version", server.url())).await.unwrap();

    assert_eq!(text, "3.8.0");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn http_fetcher_rejects_error_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/missing").with_status(404).create_async().await;

    let fetcher = HttpFetcher::new();
    let result = fetcher.fetch(&format!("{}/missing", server.url())).await;

    assert!(matches!(result, Err(FetchError::FetchFailed { ref message, .. }) if message.contains("404")));
  }
}
