use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// List size at which a revocation triggers a sweep of expired entries
const DEFAULT_PRUNE_THRESHOLD: usize = 10_000;

/// Signed tokens revoked at logout.
///
/// Entries are keyed by a SHA-256 fingerprint of the token and kept until
/// the token would have expired anyway. Only expired entries are ever
/// removed, so a live revocation cannot be lost to a full list.
pub struct RevocationList {
    /// fingerprint -> token expiry
    revoked: Mutex<HashMap<String, DateTime<Utc>>>,
    prune_threshold: usize,
}

impl Default for RevocationList {
    fn default() -> Self {
        Self::new()
    }
}

fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl RevocationList {
    pub fn new() -> Self {
        Self::with_prune_threshold(DEFAULT_PRUNE_THRESHOLD)
    }

    pub fn with_prune_threshold(prune_threshold: usize) -> Self {
        Self {
            revoked: Mutex::new(HashMap::new()),
            prune_threshold: prune_threshold.max(1),
        }
    }

    /// Revoke a token until its natural expiry
    pub fn revoke(&self, token: &str, expires_at: DateTime<Utc>) {
        let mut revoked = match self.revoked.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if revoked.len() >= self.prune_threshold {
            Self::remove_expired(&mut revoked, Utc::now());
            if revoked.len() >= self.prune_threshold {
                warn!(
                    "Revocation list holds {} live entries (threshold {})",
                    revoked.len(),
                    self.prune_threshold
                );
            }
        }

        revoked.insert(fingerprint(token), expires_at);
        info!("Token revoked until {}", expires_at);
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        match self.revoked.lock() {
            Ok(revoked) => revoked.contains_key(&fingerprint(token)),
            Err(poisoned) => poisoned.into_inner().contains_key(&fingerprint(token)),
        }
    }

    pub fn len(&self) -> usize {
        match self.revoked.lock() {
            Ok(revoked) => revoked.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose token has expired; returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let mut revoked = match self.revoked.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self::remove_expired(&mut revoked, Utc::now())
    }

    fn remove_expired(revoked: &mut HashMap<String, DateTime<Utc>>, now: DateTime<Utc>) -> usize {
        let before = revoked.len();
        revoked.retain(|_, expires_at| *expires_at > now);
        let removed = before - revoked.len();
        if removed > 0 {
            debug!("Removed {} expired entries from revocation list", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_revoke_and_check_token() {
        let list = RevocationList::new();
        list.revoke("token-1", Utc::now() + Duration::hours(1));

        assert!(list.is_revoked("token-1"));
        assert!(!list.is_revoked("token-2"));
    }

    #[test]
    fn test_cleanup_expired_tokens() {
        let list = RevocationList::new();
        list.revoke("expired", Utc::now() - Duration::seconds(1));
        list.revoke("valid", Utc::now() + Duration::minutes(1));
        assert_eq!(list.len(), 2);

        assert_eq!(list.cleanup_expired(), 1);
        assert!(!list.is_revoked("expired"));
        assert!(list.is_revoked("valid"));
    }

    #[test]
    fn test_sweep_drops_only_expired_entries() {
        let list = RevocationList::with_prune_threshold(3);
        list.revoke("old", Utc::now() - Duration::seconds(5));
        list.revoke("a", Utc::now() + Duration::minutes(5));
        list.revoke("b", Utc::now() + Duration::minutes(5));

        list.revoke("c", Utc::now() + Duration::minutes(5));
        assert_eq!(list.len(), 3);
        assert!(!list.is_revoked("old"));
        assert!(list.is_revoked("a"));
        assert!(list.is_revoked("c"));
    }

    #[test]
    fn test_live_revocations_survive_past_threshold() {
        let list = RevocationList::with_prune_threshold(2);
        let expiry = Utc::now() + Duration::hours(1);
        for token in ["a", "b", "c", "d", "e"] {
            list.revoke(token, expiry);
        }

        assert_eq!(list.len(), 5);
        for token in ["a", "b", "c", "d", "e"] {
            assert!(list.is_revoked(token), "{} lost its revocation", token);
        }
    }
}
