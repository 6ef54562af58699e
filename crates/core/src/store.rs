use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::chat::UserId;
use crate::domain::session::Session;

/// Keyed table of in-flight sessions. Every operation is atomic for one
/// user id; `lock_user` serializes whole event turns for the same user.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
    user_locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: UserId) -> Option<Session> {
        self.sessions().get(&user_id).cloned()
    }

    /// Returns the session it replaced, if any.
    pub fn insert(&self, session: Session) -> Option<Session> {
        self.sessions().insert(session.user_id(), session)
    }

    pub fn remove(&self, user_id: UserId) -> Option<Session> {
        self.sessions().remove(&user_id)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub async fn lock_user(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.user_locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks.entry(user_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<UserId, Session>> {
        match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
