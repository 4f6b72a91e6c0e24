//! One-time-password challenges gating the start and close of an event.
//!
//! A challenge is issued with a fresh 6-digit code and verified by exact
//! match within [`DEFAULT_OTP_TTL_SECS`] of issuance. Re-issuing replaces the
//! stored challenge, so any earlier code stops matching.

use crate::error::LifecycleError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default validity window of an issued code, in seconds.
pub const DEFAULT_OTP_TTL_SECS: i64 = 600;

/// Default validity window of an issued code.
#[must_use]
pub fn default_otp_ttl() -> Duration {
    Duration::seconds(DEFAULT_OTP_TTL_SECS)
}

/// Which lifecycle gate a challenge belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    /// Confirms the customer is present and the event may start
    Start,
    /// Confirms the customer accepts the finished setup
    Closing,
}

impl OtpPurpose {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 6-digit numeric code.
///
/// `Debug` is redacted so codes never end up in logs by accident.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OtpCode(String);

impl OtpCode {
    /// Smallest code that can be issued.
    pub const MIN: u32 = 100_000;
    /// Largest code that can be issued.
    pub const MAX: u32 = 999_999;

    /// Build a code from a number, clamped into `MIN..=MAX`.
    #[must_use]
    pub fn from_number(n: u32) -> Self {
        Self(n.clamp(Self::MIN, Self::MAX).to_string())
    }

    /// Parse a stored or supplied code.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Validation`] unless `s` is exactly six ASCII
    /// digits.
    pub fn parse(s: &str) -> Result<Self, LifecycleError> {
        let s = s.trim();
        if s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(LifecycleError::Validation(
                "OTP must be a 6-digit code".to_string(),
            ))
        }
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a caller-supplied code.
    #[must_use]
    pub fn matches(&self, supplied: &str) -> bool {
        constant_time_eq::constant_time_eq(self.0.as_bytes(), supplied.trim().as_bytes())
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

/// An issued challenge and its verification state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpChallenge {
    /// The issued code
    pub code: OtpCode,
    /// When the code was dispatched
    pub sent_at: DateTime<Utc>,
    /// When the code was verified
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    /// Whether the code was verified
    #[serde(default)]
    pub is_verified: bool,
}

impl OtpChallenge {
    /// A freshly issued, unverified challenge.
    #[must_use]
    pub const fn issue(code: OtpCode, sent_at: DateTime<Utc>) -> Self {
        Self {
            code,
            sent_at,
            verified_at: None,
            is_verified: false,
        }
    }

    /// Last instant at which the code is still accepted.
    #[must_use]
    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.sent_at + ttl
    }

    /// Returns `true` if the code is no longer accepted at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now > self.expires_at(ttl)
    }

    /// Verify a supplied code and mark the challenge verified.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::PreconditionFailed`] if already verified
    /// - [`LifecycleError::OtpExpired`] past the validity window
    /// - [`LifecycleError::OtpMismatch`] if the code differs
    pub fn verify(
        &mut self,
        supplied: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), LifecycleError> {
        if self.is_verified {
            return Err(LifecycleError::PreconditionFailed(
                "OTP has already been verified".to_string(),
            ));
        }
        if self.is_expired_at(now, ttl) {
            return Err(LifecycleError::OtpExpired);
        }
        if !self.code.matches(supplied) {
            return Err(LifecycleError::OtpMismatch);
        }
        self.is_verified = true;
        self.verified_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sent_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn code_debug_is_redacted() {
        let code = OtpCode::parse("123456").unwrap();
        assert_eq!(format!("{code:?}"), "OtpCode(******)");
    }

    #[test]
    fn code_parse_requires_six_digits() {
        assert!(OtpCode::parse("12345").is_err());
        assert!(OtpCode::parse("12345a").is_err());
        assert!(OtpCode::parse("1234567").is_err());
        assert_eq!(OtpCode::parse(" 654321 ").unwrap().as_str(), "654321");
    }

    #[test]
    fn verify_within_window_succeeds() {
        let mut otp = OtpChallenge::issue(OtpCode::parse("482913").unwrap(), sent_at());
        let now = sent_at() + default_otp_ttl() - Duration::milliseconds(1);
        otp.verify("482913", now, default_otp_ttl()).unwrap();
        assert!(otp.is_verified);
        assert_eq!(otp.verified_at, Some(now));
    }

    #[test]
    fn verify_at_exact_deadline_is_accepted() {
        let mut otp = OtpChallenge::issue(OtpCode::parse("482913").unwrap(), sent_at());
        let now = sent_at() + default_otp_ttl();
        assert!(otp.verify("482913", now, default_otp_ttl()).is_ok());
    }

    #[test]
    fn verify_after_window_is_expired_even_with_right_code() {
        let mut otp = OtpChallenge::issue(OtpCode::parse("482913").unwrap(), sent_at());
        let now = sent_at() + default_otp_ttl() + Duration::milliseconds(1);
        assert_eq!(
            otp.verify("482913", now, default_otp_ttl()),
            Err(LifecycleError::OtpExpired)
        );
        assert!(!otp.is_verified);
    }

    #[test]
    fn wrong_code_is_mismatch_and_leaves_challenge_open() {
        let mut otp = OtpChallenge::issue(OtpCode::parse("482913").unwrap(), sent_at());
        assert_eq!(
            otp.verify("000000", sent_at(), default_otp_ttl()),
            Err(LifecycleError::OtpMismatch)
        );
        assert!(otp.verify("482913", sent_at(), default_otp_ttl()).is_ok());
    }

    #[test]
    fn second_verification_is_rejected() {
        let mut otp = OtpChallenge::issue(OtpCode::parse("482913").unwrap(), sent_at());
        otp.verify("482913", sent_at(), default_otp_ttl()).unwrap();
        assert!(matches!(
            otp.verify("482913", sent_at(), default_otp_ttl()),
            Err(LifecycleError::PreconditionFailed(_))
        ));
    }

    proptest! {
        #[test]
        fn from_number_always_yields_six_digits(n in any::<u32>()) {
            let code = OtpCode::from_number(n);
            prop_assert_eq!(code.as_str().len(), 6);
            prop_assert!(OtpCode::parse(code.as_str()).is_ok());
        }
    }
}
