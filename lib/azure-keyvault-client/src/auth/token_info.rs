use chrono::{DateTime, Duration, Utc};

/// Bearer token held in an authenticator's cache slot.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Token kept for the authenticator's lifetime
    pub fn permanent(token: String) -> Self {
        Self {
            token,
            expires_at: None,
        }
    }

    pub fn expiring(token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// True once `now` is within `buffer` of expiry. Tokens without an
    /// expiry never go stale.
    pub fn is_stale(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at
                .checked_sub_signed(buffer)
                .is_none_or(|refresh_at| now >= refresh_at),
            None => false,
        }
    }
}
