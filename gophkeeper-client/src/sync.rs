//! Reconciliation of the local replica with the remote authoritative store.
//!
//! Both stores are compared through their (id, hash, timestamp) projections;
//! ciphertext only moves for ids whose hashes differ. Conflicts resolve by
//! last write wins on the timestamp, with ties kept local. There are no
//! tombstones: deletes happen eagerly at the moment of user action, never
//! here.

use crate::backend::RemoteStore;
use crate::controller::Controller;
use crate::error::ClientError;
use crate::storage::LocalStorage;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    local: LocalStorage,
    /// Serializes runs: a tick that fires while a run is in flight waits.
    run_lock: tokio::sync::Mutex<()>,
}

impl SyncEngine {
    pub fn new(remote: Arc<dyn RemoteStore>, local: LocalStorage) -> Self {
        Self {
            remote,
            local,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one reconciliation pass for `owner`.
    ///
    /// Aborts on the first storage or remote error; nothing is rolled back,
    /// both stores stay consistent up to the last completed operation and the
    /// next run retries from there. Against unchanged stores a second run is
    /// a no-op.
    pub async fn synchronize(
        &self,
        owner: i64,
        cancel: &CancellationToken,
    ) -> Result<(), ClientError> {
        let _running = self.run_lock.lock().await;

        ensure_live(cancel)?;
        let remote_meta = self.remote.get_secret_sync_meta().await?;
        ensure_live(cancel)?;
        let local_meta = self.local.sync_meta_by_owner(owner)?;

        let local_by_id: HashMap<Uuid, _> =
            local_meta.into_iter().map(|m| (m.id, m)).collect();
        let mut seen: HashSet<Uuid> = HashSet::new();

        for remote in &remote_meta {
            match local_by_id.get(&remote.id) {
                None => self.pull(&remote.id, cancel).await?,
                Some(local) => {
                    seen.insert(remote.id);
                    if remote.hash == local.hash {
                        continue;
                    }
                    if remote.timestamp > local.timestamp {
                        self.pull(&remote.id, cancel).await?;
                    } else {
                        // Ties favor the local copy.
                        self.push(&remote.id, cancel).await?;
                    }
                }
            }
        }

        for id in local_by_id.keys() {
            if !seen.contains(id) {
                self.push(id, cancel).await?;
            }
        }

        Ok(())
    }

    /// Fetch the full record from the remote and overwrite the local copy.
    async fn pull(&self, id: &Uuid, cancel: &CancellationToken) -> Result<(), ClientError> {
        ensure_live(cancel)?;
        let secret = self.remote.get_secret_by_id(id).await?;
        ensure_live(cancel)?;
        self.local.save_encoded_secret(&secret)
    }

    /// Read the local record and overwrite the remote copy.
    async fn push(&self, id: &Uuid, cancel: &CancellationToken) -> Result<(), ClientError> {
        let secret = self.local.get_secret_by_id(id)?;
        ensure_live(cancel)?;
        self.remote.save_encoded_secret(&secret).await
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), ClientError> {
    if cancel.is_cancelled() {
        Err(ClientError::Cancelled)
    } else {
        Ok(())
    }
}

/// Spawn the periodic sync task.
///
/// One tick, one run; missed ticks are delayed rather than bursted, which
/// together with the engine's run lock gives at-most-one-in-flight. Errors
/// are reported and the next tick retries.
pub fn spawn_periodic(
    controller: Arc<Controller>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the first real
        // sync happens one full period after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match controller.synchronize(&cancel).await {
                        Ok(()) => {}
                        Err(ClientError::Cancelled) => break,
                        Err(e) => tracing::warn!("background synchronization failed: {e}"),
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockRemote;
    use async_trait::async_trait;
    use gophkeeper_core::{EncodedSecret, SecretSyncMeta, SecretType, User};
    use std::sync::atomic::Ordering;

    const OWNER: i64 = 1;

    fn secret(name: &str, hash: &str, timestamp: i64) -> EncodedSecret {
        EncodedSecret {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner: OWNER,
            description: String::new(),
            secret_type: SecretType::Text,
            encoded_content: hash.as_bytes().to_vec(),
            hash: hash.to_string(),
            timestamp,
        }
    }

    fn engine(remote: Arc<MockRemote>, local: LocalStorage) -> SyncEngine {
        SyncEngine::new(remote, local)
    }

    #[tokio::test]
    async fn pulls_remote_only_secret() {
        let remote_secret = secret("s1", "H", 100);
        let remote = Arc::new(MockRemote::with_secrets(vec![remote_secret.clone()]));
        let local = LocalStorage::in_memory().unwrap();

        engine(remote.clone(), local.clone())
            .synchronize(OWNER, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            local.get_secret_by_id(&remote_secret.id).unwrap(),
            remote_secret
        );
        assert_eq!(remote.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pushes_local_only_secret() {
        let local_secret = secret("s1", "H", 100);
        let remote = Arc::new(MockRemote::default());
        let local = LocalStorage::in_memory().unwrap();
        local.save_encoded_secret(&local_secret).unwrap();

        engine(remote.clone(), local.clone())
            .synchronize(OWNER, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(remote.secret(&local_secret.id).unwrap(), local_secret);
    }

    #[tokio::test]
    async fn remote_newer_overwrites_local() {
        let local_secret = secret("s1", "HL", 100);
        let mut remote_secret = local_secret.clone();
        remote_secret.hash = "HR".to_string();
        remote_secret.encoded_content = b"HR".to_vec();
        remote_secret.timestamp = 200;

        let remote = Arc::new(MockRemote::with_secrets(vec![remote_secret.clone()]));
        let local = LocalStorage::in_memory().unwrap();
        local.save_encoded_secret(&local_secret).unwrap();

        engine(remote.clone(), local.clone())
            .synchronize(OWNER, &CancellationToken::new())
            .await
            .unwrap();

        let stored = local.get_secret_by_id(&local_secret.id).unwrap();
        assert_eq!(stored.hash, "HR");
        assert_eq!(stored.timestamp, 200);
        // Remote is untouched.
        assert_eq!(remote.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn equal_timestamps_push_local() {
        let local_secret = secret("s1", "HL", 100);
        let mut remote_secret = local_secret.clone();
        remote_secret.hash = "HR".to_string();
        remote_secret.encoded_content = b"HR".to_vec();

        let remote = Arc::new(MockRemote::with_secrets(vec![remote_secret]));
        let local = LocalStorage::in_memory().unwrap();
        local.save_encoded_secret(&local_secret).unwrap();

        engine(remote.clone(), local.clone())
            .synchronize(OWNER, &CancellationToken::new())
            .await
            .unwrap();

        let stored = remote.secret(&local_secret.id).unwrap();
        assert_eq!(stored.hash, "HL");
        assert_eq!(stored.timestamp, 100);
    }

    #[tokio::test]
    async fn local_newer_overwrites_remote() {
        let local_secret = secret("s1", "HL", 300);
        let mut remote_secret = local_secret.clone();
        remote_secret.hash = "HR".to_string();
        remote_secret.timestamp = 200;

        let remote = Arc::new(MockRemote::with_secrets(vec![remote_secret]));
        let local = LocalStorage::in_memory().unwrap();
        local.save_encoded_secret(&local_secret).unwrap();

        engine(remote.clone(), local.clone())
            .synchronize(OWNER, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(remote.secret(&local_secret.id).unwrap().hash, "HL");
    }

    #[tokio::test]
    async fn equal_hashes_do_nothing() {
        let shared = secret("s1", "H", 100);
        let remote = Arc::new(MockRemote::with_secrets(vec![shared.clone()]));
        let local = LocalStorage::in_memory().unwrap();
        local.save_encoded_secret(&shared).unwrap();

        engine(remote.clone(), local.clone())
            .synchronize(OWNER, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(remote.saves.load(Ordering::SeqCst), 0);
        assert_eq!(remote.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_run_is_noop() {
        let remote = Arc::new(MockRemote::with_secrets(vec![
            secret("a", "HA", 100),
            secret("b", "HB", 200),
        ]));
        let local = LocalStorage::in_memory().unwrap();
        local.save_encoded_secret(&secret("c", "HC", 50)).unwrap();

        let engine = engine(remote.clone(), local.clone());
        engine
            .synchronize(OWNER, &CancellationToken::new())
            .await
            .unwrap();

        let saves = remote.saves.load(Ordering::SeqCst);
        let fetches = remote.fetches.load(Ordering::SeqCst);
        assert_eq!(saves, 1); // c pushed
        assert_eq!(fetches, 2); // a, b pulled

        // Converged: the second pass moves nothing.
        engine
            .synchronize(OWNER, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(remote.saves.load(Ordering::SeqCst), saves);
        assert_eq!(remote.fetches.load(Ordering::SeqCst), fetches);
    }

    #[tokio::test]
    async fn divergent_stores_converge_in_one_pass() {
        let remote_only = secret("r", "HR", 10);
        let local_only = secret("l", "HL", 20);
        let conflicted_local = secret("c", "CL", 100);
        let mut conflicted_remote = conflicted_local.clone();
        conflicted_remote.hash = "CR".to_string();
        conflicted_remote.timestamp = 900;

        let remote = Arc::new(MockRemote::with_secrets(vec![
            remote_only.clone(),
            conflicted_remote.clone(),
        ]));
        let local = LocalStorage::in_memory().unwrap();
        local.save_encoded_secret(&local_only).unwrap();
        local.save_encoded_secret(&conflicted_local).unwrap();

        engine(remote.clone(), local.clone())
            .synchronize(OWNER, &CancellationToken::new())
            .await
            .unwrap();

        // Both stores now hold the same three records.
        let mut local_meta = local.sync_meta_by_owner(OWNER).unwrap();
        let mut remote_meta = remote.get_secret_sync_meta().await.unwrap();
        local_meta.sort_by_key(|m| m.id);
        remote_meta.sort_by_key(|m| m.id);
        assert_eq!(local_meta, remote_meta);

        // The conflicted id resolved to the newer, remote copy.
        assert_eq!(
            local.get_secret_by_id(&conflicted_local.id).unwrap().hash,
            "CR"
        );
    }

    #[tokio::test]
    async fn cancellation_aborts_the_run() {
        let remote = Arc::new(MockRemote::with_secrets(vec![secret("s1", "H", 100)]));
        let local = LocalStorage::in_memory().unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = engine(remote, local)
            .synchronize(OWNER, &cancel)
            .await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn remote_failure_aborts_the_run() {
        let remote = Arc::new(MockRemote::default());
        let local = LocalStorage::in_memory().unwrap();

        // A remote that lists an id it cannot serve: the fetch fails and the
        // run aborts without touching the local store.
        struct ListsButCannotServe(Arc<MockRemote>);

        #[async_trait]
        impl RemoteStore for ListsButCannotServe {
            async fn login(&self, l: &str, p: &str) -> Result<(String, User), ClientError> {
                self.0.login(l, p).await
            }
            async fn register(&self, l: &str, p: &str) -> Result<(String, User), ClientError> {
                self.0.register(l, p).await
            }
            fn set_token(&self, t: &str) {
                self.0.set_token(t)
            }
            fn clear_token(&self) {
                self.0.clear_token()
            }
            async fn get_secret_sync_meta(&self) -> Result<Vec<SecretSyncMeta>, ClientError> {
                Ok(vec![SecretSyncMeta {
                    id: Uuid::new_v4(),
                    hash: "H".to_string(),
                    timestamp: 1,
                }])
            }
            async fn get_secret_sync_meta_by_name(
                &self,
                n: &str,
            ) -> Result<SecretSyncMeta, ClientError> {
                self.0.get_secret_sync_meta_by_name(n).await
            }
            async fn get_secret_by_id(&self, _: &Uuid) -> Result<EncodedSecret, ClientError> {
                Err(ClientError::ServerUnavailable)
            }
            async fn save_encoded_secret(&self, s: &EncodedSecret) -> Result<(), ClientError> {
                self.0.save_encoded_secret(s).await
            }
            async fn delete_secret(&self, id: &Uuid) -> Result<(), ClientError> {
                self.0.delete_secret(id).await
            }
        }

        let result = SyncEngine::new(Arc::new(ListsButCannotServe(remote)), local.clone())
            .synchronize(OWNER, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ClientError::ServerUnavailable)));
        assert!(local.sync_meta_by_owner(OWNER).unwrap().is_empty());
    }
}
