//! In-memory snapshot of the store with time based refresh.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::models::{Mathematician, MathematicianUpdate, User};
use crate::password::verify_password_blocking;
use crate::store::{Store, StoreResult};
use crate::telemetry::{Color, Logger, REFRESH_CNTR};

/// A snapshot older than this is refetched on the next `refresh`.
pub const STALENESS_WINDOW: Duration = Duration::from_secs(60);
/// An open store connection unused for this long is closed.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

const LOGGER: Logger = Logger::new("Database", Color::Yellow);

/// Both collections as fetched together. Replaced as a whole, never mutated.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Bumped on every successful refresh, 0 before the first one.
    pub version: u64,
    pub fetched_at: Option<Instant>,
    pub mathematicians: Vec<Mathematician>,
    pub users: Vec<User>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.fetched_at.is_none() || self.mathematicians.is_empty()
    }

    fn is_stale(&self, now: Instant) -> bool {
        match self.fetched_at {
            Some(fetched_at) => now.duration_since(fetched_at) > STALENESS_WINDOW,
            None => true,
        }
    }
}

pub struct DataCache {
    store: Arc<dyn Store>,
    snapshot: watch::Sender<Arc<Snapshot>>,
    refreshing: tokio::sync::Mutex<()>,
    idle_timer: Mutex<Option<JoinHandle<()>>>,
}

impl DataCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            snapshot: watch::Sender::new(Arc::new(Snapshot::default())),
            refreshing: tokio::sync::Mutex::new(()),
            idle_timer: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.borrow().clone()
    }

    /// Receiver that is marked changed whenever a refresh replaces the snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot.subscribe()
    }

    /// Open the store if needed and (re)arm the idle timeout.
    pub async fn connect(&self) -> StoreResult<()> {
        self.store.connect().await?;

        let store = self.store.clone();
        let deadline = Instant::now() + IDLE_TIMEOUT;
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            LOGGER.log("Closing idle connection");
            store.close().await;
        });
        if let Some(previous) = self.idle_timer.lock().unwrap().replace(timer) {
            previous.abort();
        }
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(timer) = self.idle_timer.lock().unwrap().take() {
            timer.abort();
        }
        self.store.close().await;
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_connected()
    }

    /// Refetch both collections when forced, empty or stale.
    ///
    /// Returns whether the snapshot was replaced. Store failures are logged
    /// and leave the previous snapshot in place.
    pub async fn refresh(&self, force: bool) -> bool {
        let _guard = self.refreshing.lock().await;
        let current = self.snapshot();
        if !force && !current.is_empty() && !current.is_stale(Instant::now()) {
            return false;
        }

        match self.fetch().await {
            Ok((mathematicians, users)) => {
                let snapshot = Snapshot {
                    version: current.version + 1,
                    fetched_at: Some(Instant::now()),
                    mathematicians,
                    users,
                };
                tracing::debug!(
                    version = snapshot.version,
                    mathematicians = snapshot.mathematicians.len(),
                    users = snapshot.users.len(),
                    "Snapshot updated"
                );
                self.snapshot.send_replace(Arc::new(snapshot));
                REFRESH_CNTR.with_label_values(&["fetched"]).inc();
                true
            }
            Err(e) => {
                LOGGER.error(format!("Failed to refresh data: {e}"));
                REFRESH_CNTR.with_label_values(&["failed"]).inc();
                false
            }
        }
    }

    async fn fetch(&self) -> StoreResult<(Vec<Mathematician>, Vec<User>)> {
        self.connect().await?;
        let mathematicians = self.store.mathematicians().await?;
        let users = self.store.users().await?;
        Ok((mathematicians, users))
    }

    /// Look a user up, refetching first unless `cache` is set.
    pub async fn get_user(&self, username: &str, cache: bool) -> Option<User> {
        if !cache {
            self.refresh(true).await;
        }
        self.snapshot()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned()
    }

    /// Insert `user` unless the username is taken. Returns whether it was inserted.
    pub async fn add_user(&self, user: User) -> StoreResult<bool> {
        if self.get_user(&user.username, false).await.is_some() {
            return Ok(false);
        }
        let inserted = self.insert_user(&user).await;
        self.refresh(true).await;
        inserted.map(|_| true)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.connect().await?;
        self.store.insert_user(user).await
    }

    /// The user if `password` matches its stored hash.
    pub async fn login(&self, username: &str, password: &str) -> Option<User> {
        let user = self.get_user(username, false).await?;
        verify_password_blocking(password.to_owned(), user.password_hash.clone())
            .await
            .then_some(user)
    }

    /// Write a partial update and refresh. Returns whether the record was found.
    pub async fn update_mathematician(
        &self,
        id: &str,
        update: &MathematicianUpdate,
    ) -> StoreResult<bool> {
        let result = self.write_update(id, update).await;
        self.refresh(true).await;
        result
    }

    async fn write_update(&self, id: &str, update: &MathematicianUpdate) -> StoreResult<bool> {
        self.connect().await?;
        self.store.update_mathematician(id, update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::mathematician;
    use crate::password::hash_password;
    use crate::store::MemoryStore;

    fn cache_with(people: Vec<Mathematician>, users: Vec<User>) -> (Arc<MemoryStore>, DataCache) {
        let store = Arc::new(MemoryStore::new(people, users));
        let cache = DataCache::new(store.clone());
        (store, cache)
    }

    fn dataset() -> Vec<Mathematician> {
        vec![
            mathematician("euler", "Leonhard Euler", "Euler's Identity"),
            mathematician("gauss", "Carl Friedrich Gauss", "Gauss's law"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_respects_staleness_window() {
        let (store, cache) = cache_with(dataset(), vec![]);
        assert!(cache.refresh(false).await);
        assert_eq!(store.fetch_count(), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!cache.refresh(false).await);
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(cache.snapshot().version, 1);

        assert!(cache.refresh(true).await);
        assert_eq!(store.fetch_count(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.refresh(false).await);
        assert_eq!(store.fetch_count(), 3);
        assert_eq!(cache.snapshot().version, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_snapshot_is_always_refetched() {
        let (store, cache) = cache_with(vec![], vec![]);
        cache.refresh(false).await;
        cache.refresh(false).await;
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let (store, cache) = cache_with(dataset(), vec![]);
        assert!(cache.refresh(true).await);
        let failed_before = REFRESH_CNTR.with_label_values(&["failed"]).get();

        store.set_failing(true);
        assert!(!cache.refresh(true).await);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.mathematicians.len(), 2);
        assert!(REFRESH_CNTR.with_label_values(&["failed"]).get() >= failed_before + 1.0);
    }

    #[tokio::test]
    async fn failed_writes_are_reported() {
        let (store, cache) = cache_with(dataset(), vec![]);
        cache.refresh(true).await;
        store.set_failing(true);

        let update = MathematicianUpdate {
            age: Some(1),
            ..Default::default()
        };
        assert!(cache.update_mathematician("euler", &update).await.is_err());
        let user = User {
            username: "ada".to_owned(),
            password_hash: String::new(),
            image: None,
        };
        assert!(cache.add_user(user).await.is_err());
        assert_eq!(cache.snapshot().mathematicians[0].age, 50);
    }

    #[tokio::test]
    async fn subscribers_see_both_collections_together() {
        let user = User {
            username: "ada".to_owned(),
            password_hash: String::new(),
            image: None,
        };
        let (_store, cache) = cache_with(dataset(), vec![user]);
        let mut updates = cache.subscribe();
        cache.refresh(true).await;

        assert!(updates.has_changed().unwrap());
        let snapshot = updates.borrow_and_update().clone();
        assert_eq!(snapshot.mathematicians.len(), 2);
        assert_eq!(snapshot.users.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connection_is_closed() {
        let (store, cache) = cache_with(dataset(), vec![]);
        cache.connect().await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        // re-arms the timer
        cache.connect().await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        tokio::task::yield_now().await;
        assert!(store.is_connected());

        tokio::time::advance(Duration::from_secs(20)).await;
        tokio::task::yield_now().await;
        assert!(!store.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_the_idle_timer() {
        let (store, cache) = cache_with(dataset(), vec![]);
        cache.connect().await.unwrap();
        cache.close().await;
        assert!(!store.is_connected());

        store.connect().await.unwrap();
        tokio::time::advance(IDLE_TIMEOUT * 2).await;
        tokio::task::yield_now().await;
        assert!(store.is_connected());
    }

    #[tokio::test]
    async fn duplicate_users_are_not_added() {
        let (store, cache) = cache_with(dataset(), vec![]);
        let user = User {
            username: "ada".to_owned(),
            password_hash: hash_password("lovelace").unwrap(),
            image: None,
        };
        assert!(cache.add_user(user.clone()).await.unwrap());
        assert!(!cache.add_user(user).await.unwrap());
        assert_eq!(store.users().await.unwrap().len(), 1);
        assert!(cache.get_user("ada", true).await.is_some());
    }

    #[tokio::test]
    async fn login_checks_the_password() {
        let user = User {
            username: "ada".to_owned(),
            password_hash: hash_password("lovelace").unwrap(),
            image: None,
        };
        let (_store, cache) = cache_with(dataset(), vec![user]);
        assert!(cache.login("ada", "lovelace").await.is_some());
        assert!(cache.login("ada", "babbage").await.is_none());
        assert!(cache.login("charles", "lovelace").await.is_none());
    }

    #[tokio::test]
    async fn update_is_visible_after_write() {
        let (_store, cache) = cache_with(dataset(), vec![]);
        cache.refresh(true).await;
        let update = MathematicianUpdate {
            age: Some(76),
            ..Default::default()
        };
        assert!(cache.update_mathematician("euler", &update).await.unwrap());
        let snapshot = cache.snapshot();
        let euler = snapshot
            .mathematicians
            .iter()
            .find(|person| person.id == "euler")
            .unwrap();
        assert_eq!(euler.age, 76);
    }
}
