//! Credential storage for the single logged-in identity.
//!
//! The credential record lives in a flat key/value store under three keys
//! which are always written and removed together.

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use derive_more::{Debug, Display};

pub const TOKEN_KEY: &str = "auth-token";
pub const USER_KEY: &str = "auth-user";
pub const USER_ID_KEY: &str = "auth-user-id";

/// An API token. Printed in full by `Display` (it goes into headers) but never
/// by `Debug`, so it does not leak into logs.
#[derive(Clone, PartialEq, Eq, Display, Debug)]
#[debug("AuthToken(..)")]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CredentialRecord {
    pub token: AuthToken,
    pub username: String,
    pub user_id: String,
}

/// Persistent string key/value storage.
pub trait KeyValueStore: Send {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove_item(&mut self, key: &str) -> anyhow::Result<()>;

    /// Write every entry or none of them. On failure the keys already
    /// written are put back to their previous values.
    fn set_items(&mut self, items: &[(&str, &str)]) -> anyhow::Result<()> {
        let previous = snapshot(&*self, items.iter().map(|(key, _)| *key));
        for (key, value) in items {
            if let Err(err) = self.set_item(key, value) {
                restore(self, &previous);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Remove every key or none of them.
    fn remove_items(&mut self, keys: &[&str]) -> anyhow::Result<()> {
        let previous = snapshot(&*self, keys.iter().copied());
        for key in keys {
            if let Err(err) = self.remove_item(key) {
                restore(self, &previous);
                return Err(err);
            }
        }
        Ok(())
    }
}

fn snapshot<'k, S: KeyValueStore + ?Sized>(
    store: &S,
    keys: impl Iterator<Item = &'k str>,
) -> Vec<(&'k str, Option<String>)> {
    keys.map(|key| (key, store.get_item(key))).collect()
}

fn restore<S: KeyValueStore + ?Sized>(store: &mut S, previous: &[(&str, Option<String>)]) {
    for (key, value) in previous {
        let result = match value {
            Some(value) => store.set_item(key, value),
            None => store.remove_item(key),
        };
        if let Err(err) = result {
            tracing::warn!("Failed to restore {key} after a partial write: {err}");
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct MemoryStore {
    items: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> anyhow::Result<()> {
        self.items.remove(key);
        Ok(())
    }
}

/// A JSON object on disk holding the store's entries.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStore {
    /// Default location: `<data dir>/coderr/credentials.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("coderr").join("credentials.json"))
    }

    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let items = if fs::exists(&path).context("Failed to check if credential file exists")? {
            let raw = fs::read_to_string(&path).context("Failed to read credential file")?;
            serde_json::from_str(&raw).context("Failed to parse credential file")?
        } else {
            BTreeMap::new()
        };
        tracing::debug!("Opened credential store at {}", path.display());
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create credential directory")?;
        }
        let json = serde_json::to_string_pretty(&self.items)?;
        write_private(&self.path, json.as_bytes()).context("Failed to write credential file")?;
        Ok(())
    }

    /// Apply `change` to the entries and persist once, keeping the old
    /// entries if persisting fails.
    fn update(
        &mut self,
        change: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> anyhow::Result<()> {
        let previous = self.items.clone();
        change(&mut self.items);
        if let Err(err) = self.persist() {
            self.items = previous;
            return Err(err);
        }
        Ok(())
    }
}

/// The file holds a token, so only the owner may read it.
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::{
        io::Write,
        os::unix::fs::{OpenOptionsExt, PermissionsExt},
    };

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies when the file is created.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.update(|items| {
            items.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove_item(&mut self, key: &str) -> anyhow::Result<()> {
        if !self.items.contains_key(key) {
            return Ok(());
        }
        self.update(|items| {
            items.remove(key);
        })
    }

    fn set_items(&mut self, entries: &[(&str, &str)]) -> anyhow::Result<()> {
        self.update(|items| {
            for (key, value) in entries {
                items.insert((*key).to_owned(), (*value).to_owned());
            }
        })
    }

    fn remove_items(&mut self, keys: &[&str]) -> anyhow::Result<()> {
        if !keys.iter().any(|key| self.items.contains_key(*key)) {
            return Ok(());
        }
        self.update(|items| {
            for key in keys {
                items.remove(*key);
            }
        })
    }
}

/// The logged-in identity, backed by an injected store.
pub struct Session {
    store: Box<dyn KeyValueStore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username())
            .field("has_token", &self.token().is_some())
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl Session {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// The stored token. An empty value counts as no token.
    pub fn token(&self) -> Option<AuthToken> {
        self.non_empty(TOKEN_KEY).map(AuthToken)
    }

    pub fn username(&self) -> Option<String> {
        self.non_empty(USER_KEY)
    }

    pub fn user_id(&self) -> Option<String> {
        self.non_empty(USER_ID_KEY)
    }

    pub fn credentials(&self) -> Option<CredentialRecord> {
        Some(CredentialRecord {
            token: self.token()?,
            username: self.username()?,
            user_id: self.user_id()?,
        })
    }

    pub fn set_credentials(&mut self, record: &CredentialRecord) -> anyhow::Result<()> {
        self.store.set_items(&[
            (TOKEN_KEY, record.token.as_str()),
            (USER_KEY, &record.username),
            (USER_ID_KEY, &record.user_id),
        ])?;
        tracing::debug!("Stored credentials for {}", record.username);
        Ok(())
    }

    pub fn remove_credentials(&mut self) -> anyhow::Result<()> {
        self.store.remove_items(&[TOKEN_KEY, USER_KEY, USER_ID_KEY])?;
        tracing::debug!("Removed stored credentials");
        Ok(())
    }

    fn non_empty(&self, key: &str) -> Option<String> {
        self.store.get_item(key).filter(|v| !v.is_empty())
    }
}
