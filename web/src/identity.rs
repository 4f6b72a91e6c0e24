//! Bearer-token to vendor resolution.
//!
//! Tokens are configured as `token=vendor-uuid` pairs and kept only as
//! SHA-256 digests. Lookups compare digests in constant time against every
//! entry.

use constant_time_eq::constant_time_eq_32;
use eventday_core::VendorId;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Malformed token configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// An entry is not `token=uuid`.
    #[error("Invalid vendor token entry '{0}': expected token=vendor-uuid")]
    Malformed(String),

    /// The vendor part is not a UUID.
    #[error("Invalid vendor id '{0}'")]
    InvalidVendor(String),
}

/// Known bearer tokens and the vendors they authenticate.
#[derive(Clone, Default)]
pub struct VendorTokens {
    entries: Vec<([u8; 32], VendorId)>,
}

impl std::fmt::Debug for VendorTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorTokens")
            .field("count", &self.entries.len())
            .finish()
    }
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

impl VendorTokens {
    /// No tokens: every request is unauthorized.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` for `vendor`.
    #[must_use]
    pub fn with_token(mut self, token: &str, vendor: VendorId) -> Self {
        self.entries.push((digest(token), vendor));
        self
    }

    /// Parse a comma-separated `token=vendor-uuid` list. Blank entries are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] for an entry without `=`, with an empty
    /// token, or with a vendor id that is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let mut tokens = Self::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (token, vendor) = entry
                .split_once('=')
                .ok_or_else(|| IdentityError::Malformed(entry.to_string()))?;
            let token = token.trim();
            if token.is_empty() {
                return Err(IdentityError::Malformed(entry.to_string()));
            }
            let vendor = Uuid::parse_str(vendor.trim())
                .map_err(|_| IdentityError::InvalidVendor(vendor.trim().to_string()))?;
            tokens = tokens.with_token(token, VendorId::from_uuid(vendor));
        }
        Ok(tokens)
    }

    /// The vendor `token` authenticates, if any.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<VendorId> {
        let presented = digest(token);
        let mut found = None;
        for (known, vendor) in &self.entries {
            if constant_time_eq_32(known, &presented) {
                found = Some(*vendor);
            }
        }
        found
    }

    /// Number of configured tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no token is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_resolve() {
        let vendor = Uuid::new_v4();
        let tokens = VendorTokens::parse(&format!(" alpha={vendor} , ,")).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens.resolve("alpha"), Some(VendorId::from_uuid(vendor)));
        assert_eq!(tokens.resolve("alph"), None);
    }

    #[test]
    fn parse_rejects_bad_entries() {
        assert!(matches!(
            VendorTokens::parse("no-separator"),
            Err(IdentityError::Malformed(_))
        ));
        assert!(matches!(
            VendorTokens::parse("=abc"),
            Err(IdentityError::Malformed(_))
        ));
        assert!(matches!(
            VendorTokens::parse("t=not-a-uuid"),
            Err(IdentityError::InvalidVendor(_))
        ));
    }

    #[test]
    fn debug_hides_digests() {
        let tokens = VendorTokens::new().with_token("secret", VendorId::new());
        assert_eq!(format!("{tokens:?}"), "VendorTokens { count: 1 }");
    }
}
