use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Store, StoreError, StoreResult};
use crate::models::{Mathematician, MathematicianUpdate, User};

/// Keeps everything in process memory, mainly for tests and demos.
#[derive(Default)]
pub struct MemoryStore {
    people: Mutex<Vec<Mathematician>>,
    users: Mutex<Vec<User>>,
    connected: AtomicBool,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new(people: Vec<Mathematician>, users: Vec<User>) -> Self {
        Self {
            people: Mutex::new(people),
            users: Mutex::new(users),
            ..Default::default()
        }
    }

    /// How many times the mathematicians collection has been read.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// While set, every query and write fails with an io error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn ensure_connected(&self) -> StoreResult<()> {
        if !self.is_connected() {
            return Err(StoreError::NotConnected);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("store unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn connect(&self) -> StoreResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn mathematicians(&self) -> StoreResult<Vec<Mathematician>> {
        self.ensure_connected()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.people.lock().unwrap().clone())
    }

    async fn users(&self) -> StoreResult<Vec<User>> {
        self.ensure_connected()?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn update_mathematician(
        &self,
        id: &str,
        update: &MathematicianUpdate,
    ) -> StoreResult<bool> {
        self.ensure_connected()?;
        let mut people = self.people.lock().unwrap();
        match people.iter_mut().find(|person| person.id == id) {
            Some(person) => {
                person.apply(update);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.ensure_connected()?;
        self.users.lock().unwrap().push(user.clone());
        Ok(())
    }
}
