// Copyright (c) 2026 Arc Asumity
// Licensed under the GPLv3 or later License.
// See LICENSE file for details.
//
// src/store.rs
// Shared mail store behind the session state machines.

use crate::conf;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown user {0}")]
    UnknownUser(String),
    #[error("store I/O failed")]
    Io(#[from] std::io::Error),
}

/// One message inside a session's mailbox snapshot.
#[derive(Debug, Clone)]
pub struct MailItem {
    uid: String,
    size: usize,
    deleted: bool,
    body: Arc<[u8]>,
}

impl MailItem {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Session-local view of one user's mail, loaded at authentication.
///
/// Items keep their 1-based position for the whole session; deletion
/// only marks them, and the totals below skip marked items. Dropping the
/// snapshot discards the marks without touching the backing store.
#[derive(Debug, Default)]
pub struct Mailbox {
    items: Vec<MailItem>,
}

impl Mailbox {
    pub fn count(&self) -> usize {
        self.items.iter().filter(|m| !m.deleted).count()
    }

    pub fn total_size(&self) -> usize {
        self.items
            .iter()
            .filter(|m| !m.deleted)
            .map(|m| m.size)
            .sum()
    }

    /// Item at 1-based `index`, or `None` when absent or marked deleted.
    pub fn item(&self, index: usize) -> Option<&MailItem> {
        let item = self.items.get(index.checked_sub(1)?)?;
        if item.deleted {
            None
        } else {
            Some(item)
        }
    }

    /// Non-deleted items with their fixed 1-based positions.
    pub fn positions(&self) -> impl Iterator<Item = (usize, &MailItem)> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.deleted)
            .map(|(i, m)| (i + 1, m))
    }

    pub fn mark_deleted(&mut self, index: usize) -> bool {
        match index.checked_sub(1).and_then(|i| self.items.get_mut(i)) {
            Some(item) if !item.deleted => {
                item.deleted = true;
                true
            }
            _ => false,
        }
    }

    pub fn reset_deletions(&mut self) {
        for item in &mut self.items {
            item.deleted = false;
        }
    }
}

/// Contract both daemons consume. `validate` with no password is an
/// existence check; with one it verifies the credential. `deliver`
/// stores the body for every recipient or fails as a whole.
pub trait MailStore {
    async fn validate(&self, name: &str, password: Option<&str>) -> bool;
    async fn load_mailbox(&self, name: &str) -> Result<Mailbox, StoreError>;
    async fn deliver(&self, body: &[u8], recipients: &[String]) -> Result<(), StoreError>;
}

#[derive(Debug)]
pub enum Store {
    Memory(MemoryStore),
}

impl MailStore for Store {
    async fn validate(&self, name: &str, password: Option<&str>) -> bool {
        match self {
            Store::Memory(store) => store.validate(name, password).await,
        }
    }

    async fn load_mailbox(&self, name: &str) -> Result<Mailbox, StoreError> {
        match self {
            Store::Memory(store) => store.load_mailbox(name).await,
        }
    }

    async fn deliver(&self, body: &[u8], recipients: &[String]) -> Result<(), StoreError> {
        match self {
            Store::Memory(store) => store.deliver(body, recipients).await,
        }
    }
}

#[derive(Debug)]
struct StoredMail {
    uid: String,
    body: Arc<[u8]>,
}

#[derive(Debug, Default)]
struct UserRecord {
    password: String,
    mail: Vec<StoredMail>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    users: HashMap<String, UserRecord>,
    next_uid: u64,
}

/// In-memory backing store, seeded from configuration. All access goes
/// through one lock, which also makes `deliver` atomic for callers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn from_config(config: &conf::Config) -> Self {
        let mut inner = MemoryInner::default();
        for user in &config.users {
            let mut record = UserRecord {
                password: user.password.clone(),
                mail: Vec::new(),
            };
            for body in &user.mail {
                inner.next_uid += 1;
                record.mail.push(StoredMail {
                    uid: inner.next_uid.to_string(),
                    body: Arc::from(body.as_bytes()),
                });
            }
            inner.users.insert(user.name.clone(), record);
        }
        MemoryStore {
            inner: Mutex::new(inner),
        }
    }

    pub async fn add_user(&self, name: &str, password: &str) {
        let mut inner = self.inner.lock().await;
        inner.users.insert(
            name.to_string(),
            UserRecord {
                password: password.to_string(),
                mail: Vec::new(),
            },
        );
    }

    pub async fn push_mail(&self, name: &str, body: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_uid += 1;
        let uid = inner.next_uid.to_string();
        let record = inner
            .users
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownUser(name.to_string()))?;
        record.mail.push(StoredMail {
            uid,
            body: Arc::from(body),
        });
        Ok(())
    }
}

impl MailStore for MemoryStore {
    async fn validate(&self, name: &str, password: Option<&str>) -> bool {
        let inner = self.inner.lock().await;
        match inner.users.get(name) {
            Some(record) => match password {
                Some(password) => record.password == password,
                None => true,
            },
            None => false,
        }
    }

    async fn load_mailbox(&self, name: &str) -> Result<Mailbox, StoreError> {
        let inner = self.inner.lock().await;
        let record = inner
            .users
            .get(name)
            .ok_or_else(|| StoreError::UnknownUser(name.to_string()))?;
        let items = record
            .mail
            .iter()
            .map(|m| MailItem {
                uid: m.uid.clone(),
                size: m.body.len(),
                deleted: false,
                body: m.body.clone(),
            })
            .collect();
        Ok(Mailbox { items })
    }

    async fn deliver(&self, body: &[u8], recipients: &[String]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        // all-or-error: refuse the whole delivery before touching any mailbox
        for name in recipients {
            if !inner.users.contains_key(name) {
                return Err(StoreError::UnknownUser(name.clone()));
            }
        }
        let shared: Arc<[u8]> = Arc::from(body);
        for name in recipients {
            inner.next_uid += 1;
            let uid = inner.next_uid.to_string();
            if let Some(record) = inner.users.get_mut(name) {
                record.mail.push(StoredMail {
                    uid,
                    body: shared.clone(),
                });
            }
        }
        Ok(())
    }
}
