//! Capability URIs: unguessable identifiers that double as access
//! credentials.

use std::collections::HashSet;

use rand_core::{OsRng, RngCore};

/// Bytes of randomness per identifier.
const TOKEN_BYTES: usize = 16;

/// The containers identifiers are allocated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
  Topics,
  Subscriptions,
  Metadata,
}

impl Container {
  pub fn path(self) -> &'static str {
    match self {
      Self::Topics => "/topics/",
      Self::Subscriptions => "/subscriptions/",
      Self::Metadata => "/metadata/",
    }
  }
}

#[derive(Debug, Clone)]
pub struct CapabilityUriGenerator {
  base_url: String,
}

impl CapabilityUriGenerator {
  pub fn new(base_url: impl Into<String>) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_owned();
    Self { base_url }
  }

  pub fn base_url(&self) -> &str { &self.base_url }

  /// `base + /container/ + 128-bit hex token`. The container path is
  /// normalised to start and end with `/`.
  pub fn generate(&self, container_path: &str) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let path = container_path.trim_matches('/');
    if path.is_empty() {
      format!("{}/{}", self.base_url, hex::encode(bytes))
    } else {
      format!("{}/{path}/{}", self.base_url, hex::encode(bytes))
    }
  }

  /// Generate until the candidate is not in `existing`.
  pub fn generate_unique(&self, container_path: &str, existing: &HashSet<String>) -> String {
    loop {
      let candidate = self.generate(container_path);
      if !existing.contains(&candidate) {
        return candidate;
      }
    }
  }
}
