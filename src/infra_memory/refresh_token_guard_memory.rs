use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Every this many issues, slots nobody came back for are swept.
const PURGE_EVERY: usize = 256;

struct Slot {
    token_id: TokenId,
    expires_at: Instant,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local refresh guard.
///
/// Compare-and-delete runs under the owning shard's write lock, so it is atomic
/// for callers sharing this instance but not across processes. Use the Redis
/// guard when more than one service instance is running.
///
/// Expired slots are dropped lazily on redemption and in a periodic sweep
/// from `issue`, so users who never return do not pin memory.
#[derive(Default)]
pub struct MemoryRefreshTokenGuard {
    slots: DashMap<UserId, Slot>,
    issued: AtomicUsize,
}

impl MemoryRefreshTokenGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_session(&self, user_id: UserId) -> bool {
        let now = Instant::now();
        self.slots
            .get(&user_id)
            .is_some_and(|slot| slot.is_live(now))
    }

    fn purge_expired(&self, now: Instant) {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.is_live(now));
        debug!(purged = before.saturating_sub(self.slots.len()), "expired refresh slots swept");
    }
}

#[async_trait::async_trait]
impl RefreshTokenGuard for MemoryRefreshTokenGuard {
    async fn issue(
        &self,
        user_id: UserId,
        token_id: &TokenId,
        ttl_secs: u64,
    ) -> Result<(), RefreshGuardError> {
        let now = Instant::now();
        let expires_at = now + Duration::from_secs(ttl_secs.max(1));
        self.slots.insert(
            user_id,
            Slot {
                token_id: token_id.clone(),
                expires_at,
            },
        );
        debug!(%user_id, ttl_secs, "refresh token id issued");

        if self.issued.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            self.purge_expired(now);
        }
        Ok(())
    }

    async fn validate_and_invalidate(
        &self,
        user_id: UserId,
        token_id: &TokenId,
    ) -> Result<(), RefreshGuardError> {
        let now = Instant::now();
        let consumed = self
            .slots
            .remove_if(&user_id, |_, slot| {
                slot.is_live(now) && slot.token_id == *token_id
            })
            .is_some();

        if consumed {
            return Ok(());
        }

        // Drop a slot that only survived because nobody looked at it since it expired.
        self.slots.remove_if(&user_id, |_, slot| !slot.is_live(now));
        debug!(%user_id, "refresh token id mismatch");
        Err(RefreshGuardError::TokenReuseOrInvalid)
    }

    async fn revoke(&self, user_id: UserId) -> Result<(), RefreshGuardError> {
        self.slots.remove(&user_id);
        debug!(%user_id, "refresh token id revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TTL: u64 = 60;

    #[tokio::test]
    async fn redeem_succeeds_exactly_once() {
        let guard = MemoryRefreshTokenGuard::new();
        let user = UserId::new_random();
        let t1 = TokenId::generate();

        guard.issue(user, &t1, TTL).await.unwrap();
        guard.validate_and_invalidate(user, &t1).await.unwrap();
        assert!(matches!(
            guard.validate_and_invalidate(user, &t1).await,
            Err(RefreshGuardError::TokenReuseOrInvalid)
        ));
    }

    #[tokio::test]
    async fn mismatch_leaves_live_id_untouched() {
        let guard = MemoryRefreshTokenGuard::new();
        let user = UserId::new_random();
        let t1 = TokenId::generate();
        let t2 = TokenId::generate();

        guard.issue(user, &t1, TTL).await.unwrap();
        assert!(matches!(
            guard.validate_and_invalidate(user, &t2).await,
            Err(RefreshGuardError::TokenReuseOrInvalid)
        ));
        guard.validate_and_invalidate(user, &t1).await.unwrap();
    }

    #[tokio::test]
    async fn never_issued_is_rejected() {
        let guard = MemoryRefreshTokenGuard::new();
        assert!(matches!(
            guard
                .validate_and_invalidate(UserId::new_random(), &TokenId::generate())
                .await,
            Err(RefreshGuardError::TokenReuseOrInvalid)
        ));
    }

    #[tokio::test]
    async fn reissue_overwrites_previous_id() {
        let guard = MemoryRefreshTokenGuard::new();
        let user = UserId::new_random();
        let t1 = TokenId::generate();
        let t2 = TokenId::generate();

        guard.issue(user, &t1, TTL).await.unwrap();
        guard.issue(user, &t2, TTL).await.unwrap();
        assert!(guard.validate_and_invalidate(user, &t1).await.is_err());
        guard.validate_and_invalidate(user, &t2).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn expired_id_behaves_as_never_issued() {
        let guard = MemoryRefreshTokenGuard::new();
        let user = UserId::new_random();
        let t1 = TokenId::generate();

        guard.issue(user, &t1, 1).await.unwrap();
        assert!(guard.has_session(user));

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(!guard.has_session(user));
        assert!(matches!(
            guard.validate_and_invalidate(user, &t1).await,
            Err(RefreshGuardError::TokenReuseOrInvalid)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_expired_slots_are_swept_on_issue() {
        let guard = MemoryRefreshTokenGuard::new();
        for _ in 0..PURGE_EVERY - 1 {
            guard
                .issue(UserId::new_random(), &TokenId::generate(), 1)
                .await
                .unwrap();
        }
        assert_eq!(guard.slots.len(), PURGE_EVERY - 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let returning = UserId::new_random();
        guard.issue(returning, &TokenId::generate(), TTL).await.unwrap();

        assert_eq!(guard.slots.len(), 1);
        assert!(guard.has_session(returning));
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let guard = MemoryRefreshTokenGuard::new();
        let user = UserId::new_random();
        guard.revoke(user).await.unwrap();

        let t1 = TokenId::generate();
        guard.issue(user, &t1, TTL).await.unwrap();
        guard.revoke(user).await.unwrap();
        guard.revoke(user).await.unwrap();
        assert!(!guard.has_session(user));
        assert!(guard.validate_and_invalidate(user, &t1).await.is_err());
    }

    #[tokio::test]
    async fn users_do_not_interfere() {
        let guard = MemoryRefreshTokenGuard::new();
        let a = UserId::new_random();
        let b = UserId::new_random();
        let ta = TokenId::generate();
        let tb = TokenId::generate();

        guard.issue(a, &ta, TTL).await.unwrap();
        guard.issue(b, &tb, TTL).await.unwrap();

        assert!(guard.validate_and_invalidate(b, &ta).await.is_err());
        guard.revoke(a).await.unwrap();
        assert!(guard.has_session(b));
        guard.validate_and_invalidate(b, &tb).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redemptions_yield_one_winner() {
        for _ in 0..50 {
            let guard = Arc::new(MemoryRefreshTokenGuard::new());
            let user = UserId::new_random();
            let t1 = TokenId::generate();
            guard.issue(user, &t1, TTL).await.unwrap();

            let racers = (0..2).map(|_| {
                let guard = guard.clone();
                let t1 = t1.clone();
                tokio::spawn(async move { guard.validate_and_invalidate(user, &t1).await })
            });
            let results = futures_util::future::join_all(racers).await;
            let wins = results
                .into_iter()
                .filter(|r| matches!(r, Ok(Ok(()))))
                .count();
            assert_eq!(wins, 1);
        }
    }
}
