//! OAuth token pair and account identity models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Margin before access-token expiration when we proactively refresh
/// (5 minutes). Guards against network latency racing the literal expiry.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// OAuth access/refresh token pair with both validity windows.
///
/// Owned exclusively by the token service; persisted keyed by membership
/// id and destroyed on logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires
    pub access_expires_at: DateTime<Utc>,
    /// When the refresh token itself expires (much longer window)
    pub refresh_expires_at: DateTime<Utc>,
    /// When this pair was issued
    pub issued_at: DateTime<Utc>,
}

impl Token {
    /// Build a token pair from the wire response, anchored at `now`.
    pub fn from_response(resp: &TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: resp.access_token.clone(),
            refresh_token: resp.refresh_token.clone(),
            access_expires_at: now + Duration::seconds(resp.expires_in),
            refresh_expires_at: now + Duration::seconds(resp.refresh_expires_in),
            issued_at: now,
        }
    }

    /// Whether the access token is still usable at `now`, with the skew
    /// margin applied.
    pub fn access_usable(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.access_expires_at
    }

    /// Whether the refresh token can still be redeemed at `now`.
    ///
    /// No margin here: a dead refresh token means forced re-login, and
    /// treating a live one as dead would log the user out early.
    pub fn refresh_usable(&self, now: DateTime<Utc>) -> bool {
        now < self.refresh_expires_at
    }
}

/// Token response from the OAuth endpoint (both grant types).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: i64,
    pub membership_id: String,
}

/// Logged-in account identity, used by all components that build request
/// URLs. Created on successful login and persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountIdentity {
    pub membership_id: String,
    pub membership_type: i32,
    pub display_name: String,
    pub icon_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(access_secs: i64, refresh_secs: i64) -> Token {
        let now = Utc::now();
        Token {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            access_expires_at: now + Duration::seconds(access_secs),
            refresh_expires_at: now + Duration::seconds(refresh_secs),
            issued_at: now,
        }
    }

    #[test]
    fn test_access_usable_applies_margin() {
        let now = Utc::now();
        // Expires in 10 minutes: usable (margin is 5 minutes)
        assert!(make_token(600, 7_776_000).access_usable(now));
        // Expires in 4 minutes: inside the margin, treated as expired
        assert!(!make_token(240, 7_776_000).access_usable(now));
        // Already expired
        assert!(!make_token(-100, 7_776_000).access_usable(now));
    }

    #[test]
    fn test_refresh_usable_has_no_margin() {
        let now = Utc::now();
        assert!(make_token(0, 60).refresh_usable(now));
        assert!(!make_token(0, -1).refresh_usable(now));
    }

    #[test]
    fn test_from_response_anchors_windows_at_now() {
        let now = Utc::now();
        let resp = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_in: 3600,
            refresh_expires_in: 7_776_000,
            membership_id: "4611686018467260757".to_string(),
        };

        let token = Token::from_response(&resp, now);
        assert_eq!(token.issued_at, now);
        assert_eq!(token.access_expires_at, now + Duration::seconds(3600));
        assert_eq!(token.refresh_expires_at, now + Duration::seconds(7_776_000));
    }
}
