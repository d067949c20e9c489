use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::models::{Locale, NotificationInterval, Subscription};

use super::errors::PersistenceError;

/// user_id -> (asset_id -> interval)
pub type Subscriptions = BTreeMap<String, BTreeMap<String, NotificationInterval>>;

/// user_id -> locale
pub type Preferences = BTreeMap<String, Locale>;

/// Everything the store persists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    pub notifications: Subscriptions,
    pub languages: Preferences,
}

impl StoreState {
    /// Flatten the nested mapping into one entry per (user, asset)
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.notifications
            .iter()
            .flat_map(|(user_id, assets)| {
                assets.iter().map(move |(asset_id, interval)| {
                    Subscription::new(user_id, asset_id, *interval)
                })
            })
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.notifications.values().map(|assets| assets.len()).sum()
    }
}

/// On-disk layout: tags are kept as plain strings so that a file written by a
/// newer build (with more interval or locale tags) still loads.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    notifications: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    languages: BTreeMap<String, String>,
}

impl From<&StoreState> for PersistedState {
    fn from(state: &StoreState) -> Self {
        Self {
            notifications: state
                .notifications
                .iter()
                .map(|(user_id, assets)| {
                    let assets = assets
                        .iter()
                        .map(|(asset_id, interval)| (asset_id.clone(), interval.tag().to_string()))
                        .collect();
                    (user_id.clone(), assets)
                })
                .collect(),
            languages: state
                .languages
                .iter()
                .map(|(user_id, locale)| (user_id.clone(), locale.tag().to_string()))
                .collect(),
        }
    }
}

impl PersistedState {
    /// Convert to the typed state, dropping entries with unknown tags
    fn into_state(self) -> StoreState {
        let mut state = StoreState::default();

        for (user_id, assets) in self.notifications {
            let mut parsed = BTreeMap::new();
            for (asset_id, tag) in assets {
                match tag.parse::<NotificationInterval>() {
                    Ok(interval) => {
                        parsed.insert(asset_id, interval);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Dropping subscription {}/{} on load: {}",
                            user_id,
                            asset_id,
                            e
                        );
                    }
                }
            }
            if !parsed.is_empty() {
                state.notifications.insert(user_id, parsed);
            }
        }

        for (user_id, tag) in self.languages {
            match tag.parse::<Locale>() {
                Ok(locale) => {
                    state.languages.insert(user_id, locale);
                }
                Err(e) => tracing::warn!("Dropping language of user {} on load: {}", user_id, e),
            }
        }

        state
    }
}

/// Durable (user, asset) -> interval mapping plus user languages
///
/// Every mutation rewrites the whole file: new contents go to a temporary file in
/// the same directory, which is fsynced and then renamed over the old one. A crash
/// therefore leaves either the old or the new file, never a truncated one.
///
/// Mutations are serialized by a single lock held across the write. If the write
/// fails, the in-memory state is left exactly as it was.
pub struct SubscriptionStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl SubscriptionStore {
    /// Open the store backed by `path`, loading whatever is there
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Self::load(&path);

        tracing::info!(
            "📂 Subscription store opened: {} ({} subscriptions, {} languages)",
            path.display(),
            state.subscription_count(),
            state.languages.len()
        );

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Read the state file
    ///
    /// A missing file is a first run; an unreadable or corrupt one is logged and
    /// treated the same way. Neither fails the process.
    pub fn load(path: &Path) -> StoreState {
        match Self::read(path) {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::info!("No state file at {}, starting empty", path.display());
                StoreState::default()
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️  State file {} could not be loaded ({}), starting empty",
                    path.display(),
                    e
                );
                StoreState::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Option<StoreState>, PersistenceError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let persisted: PersistedState = serde_json::from_slice(&bytes)?;
        Ok(Some(persisted.into_state()))
    }

    /// Write `state` to `path` atomically
    pub fn save(path: &Path, state: &StoreState) -> Result<(), PersistenceError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &PersistedState::from(state))?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| PersistenceError::Io(e.error))?;

        Ok(())
    }

    /// Apply `change` to a copy of the state, persist it, then publish it
    ///
    /// `change` reports whether it modified anything; unchanged state is not written.
    fn mutate<R>(
        &self,
        change: impl FnOnce(&mut StoreState) -> (R, bool),
    ) -> Result<R, PersistenceError> {
        let mut state = self.state.lock();
        let mut next = state.clone();

        let (result, changed) = change(&mut next);
        if changed {
            if let Err(e) = Self::save(&self.path, &next) {
                tracing::error!("❌ Failed to persist {}: {}", self.path.display(), e);
                return Err(e);
            }
            *state = next;
        }

        Ok(result)
    }

    /// Set the language of a user
    pub fn set_language(&self, user_id: &str, locale: Locale) -> Result<(), PersistenceError> {
        self.mutate(|state| {
            state.languages.insert(user_id.to_string(), locale);
            ((), true)
        })
    }

    /// Upsert a subscription, returning the interval it replaced (if any)
    pub fn add(
        &self,
        user_id: &str,
        asset_id: &str,
        interval: NotificationInterval,
    ) -> Result<Option<NotificationInterval>, PersistenceError> {
        self.mutate(|state| {
            let previous = state
                .notifications
                .entry(user_id.to_string())
                .or_default()
                .insert(asset_id.to_string(), interval);
            (previous, true)
        })
    }

    /// Remove a subscription; returns false (and writes nothing) when absent
    pub fn remove(&self, user_id: &str, asset_id: &str) -> Result<bool, PersistenceError> {
        self.mutate(|state| {
            let Some(assets) = state.notifications.get_mut(user_id) else {
                return (false, false);
            };
            let removed = assets.remove(asset_id).is_some();
            if assets.is_empty() {
                state.notifications.remove(user_id);
            }
            (removed, removed)
        })
    }

    /// Remove every subscription of a user with a single write
    pub fn clear_all(&self, user_id: &str) -> Result<usize, PersistenceError> {
        self.mutate(|state| {
            let removed = state
                .notifications
                .remove(user_id)
                .map(|assets| assets.len())
                .unwrap_or(0);
            (removed, removed > 0)
        })
    }

    /// Subscriptions of one user, keyed by asset
    pub fn list_for(&self, user_id: &str) -> BTreeMap<String, NotificationInterval> {
        self.state
            .lock()
            .notifications
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn interval_of(&self, user_id: &str, asset_id: &str) -> Option<NotificationInterval> {
        self.state
            .lock()
            .notifications
            .get(user_id)
            .and_then(|assets| assets.get(asset_id).copied())
    }

    /// Language explicitly chosen by a user, if any
    pub fn language(&self, user_id: &str) -> Option<Locale> {
        self.state.lock().languages.get(user_id).copied()
    }

    /// Every subscription across all users
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.state.lock().subscriptions()
    }

    /// Copy of the full in-memory state
    pub fn snapshot(&self) -> StoreState {
        self.state.lock().clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
