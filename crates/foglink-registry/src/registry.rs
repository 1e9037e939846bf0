use foglink_common::endpoint::normalize_url;
use foglink_common::now_millis;
use foglink_common::protocol::error::{FoglinkError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::instance::{MetaPatch, RegisteredInstance};
use crate::store::{KvStore, MemoryStore};

/// Storage key of the ordered URL list
pub const URLS_KEY: &str = "foglink.instances";
/// Storage key of the active-instance pointer
pub const ACTIVE_KEY: &str = "foglink.active";
/// Storage key of the per-URL metadata map
pub const META_KEY: &str = "foglink.meta";

/// Options for [`InstanceRegistry::add`].
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub display_name: Option<String>,
}

impl AddOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
        }
    }
}

/// Registered instances, their metadata and the active pointer.
///
/// The ordered URL list and the metadata map always hold the same keys.
/// Every mutation rewrites the affected blobs in the backing [`KvStore`];
/// storage failures are logged and the in-memory state stays authoritative.
pub struct InstanceRegistry {
    store: Arc<dyn KvStore>,
    urls: Vec<String>,
    meta: BTreeMap<String, RegisteredInstance>,
    active: Option<String>,
}

impl InstanceRegistry {
    /// Loads the registry from `store`.
    ///
    /// Missing or corrupt blobs load as empty. Key sets that drifted apart
    /// (URLs without metadata or metadata without URL) are repaired.
    pub fn load(store: Arc<dyn KvStore>) -> Self {
        let urls: Vec<String> = read_blob(store.as_ref(), URLS_KEY).unwrap_or_default();
        let mut meta: BTreeMap<String, RegisteredInstance> =
            read_blob(store.as_ref(), META_KEY).unwrap_or_default();
        let active: Option<String> = read_blob(store.as_ref(), ACTIVE_KEY).unwrap_or_default();

        let mut ordered = Vec::with_capacity(urls.len());
        for url in urls {
            if !ordered.contains(&url) {
                ordered.push(url);
            }
        }

        let orphaned = meta.keys().filter(|k| !ordered.contains(k)).count();
        meta.retain(|k, _| ordered.contains(k));
        let now = now_millis();
        for url in &ordered {
            meta.entry(url.clone())
                .or_insert_with(|| RegisteredInstance::new(url.clone(), now))
                .url = url.clone();
        }

        let mut registry = Self {
            store,
            urls: ordered,
            meta,
            active,
        };

        if orphaned > 0 {
            warn!("Dropped {} metadata entries without a registered URL", orphaned);
            registry.persist_meta();
        }

        info!("Loaded {} registered instances", registry.urls.len());
        registry
    }

    /// Registry backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::load(Arc::new(MemoryStore::new()))
    }

    /// Registers a URL. Returns `false` for malformed or duplicate input.
    pub fn add(&mut self, url: &str, options: AddOptions) -> bool {
        match self.try_add(url, options) {
            Ok(_) => true,
            Err(e) => {
                debug!("Rejected instance {}: {}", url, e);
                false
            }
        }
    }

    /// Registers a URL, returning its normalized form.
    ///
    /// # Errors
    /// [`FoglinkError::Validation`] when the URL is empty, malformed or
    /// already registered after normalization.
    pub fn try_add(&mut self, url: &str, options: AddOptions) -> Result<String> {
        let url = normalize_url(url)?;
        if self.meta.contains_key(&url) {
            return Err(FoglinkError::Validation(format!("{} is already registered", url)));
        }

        let mut instance = RegisteredInstance::new(url.clone(), now_millis());
        instance.display_name = options.display_name.filter(|n| !n.trim().is_empty());

        self.urls.push(url.clone());
        self.meta.insert(url.clone(), instance);
        self.persist_urls();
        self.persist_meta();

        info!("Registered instance {}", url);
        Ok(url)
    }

    /// Unregisters a URL and its metadata.
    ///
    /// If it was the active instance, the pointer moves to the URL that took
    /// its place in registration order (or the new last one), or is cleared.
    pub fn remove(&mut self, url: &str) -> bool {
        let key = self.resolve(url);
        let Some(position) = self.urls.iter().position(|u| *u == key) else {
            return false;
        };

        self.urls.remove(position);
        self.meta.remove(&key);

        if self.active.as_deref() == Some(key.as_str()) {
            self.active = self
                .urls
                .get(position)
                .or_else(|| self.urls.last())
                .cloned();
            self.persist_active();
        }

        self.persist_urls();
        self.persist_meta();
        info!("Removed instance {}", key);
        true
    }

    /// Whether `url` (raw or normalized) is registered.
    pub fn contains(&self, url: &str) -> bool {
        self.meta.contains_key(&self.resolve(url))
    }

    /// Registered URLs in registration order.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Registered instances in registration order.
    pub fn instances(&self) -> Vec<RegisteredInstance> {
        self.urls
            .iter()
            .map(|url| self.get_meta(url))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Stored metadata, or a fresh default record for unknown URLs.
    pub fn get_meta(&self, url: &str) -> RegisteredInstance {
        let key = self.resolve(url);
        self.meta
            .get(&key)
            .cloned()
            .unwrap_or_else(|| RegisteredInstance::new(key, now_millis()))
    }

    /// Merges `patch` into a registered URL's metadata.
    ///
    /// Unregistered URLs are ignored so the key sets never diverge.
    pub fn update_meta(&mut self, url: &str, patch: MetaPatch) {
        let key = self.resolve(url);
        match self.meta.get_mut(&key) {
            Some(instance) => {
                instance.apply(&patch);
                instance.url = key;
                self.persist_meta();
            }
            None => debug!("Ignoring metadata update for unregistered {}", url),
        }
    }

    /// Sets or clears the display name. Returns `false` for unknown URLs.
    pub fn rename(&mut self, url: &str, name: Option<String>) -> bool {
        if !self.contains(url) {
            return false;
        }
        let name = name.filter(|n| !n.trim().is_empty());
        self.update_meta(url, MetaPatch::new().display_name(name));
        true
    }

    /// The active URL.
    ///
    /// A stale or missing pointer falls back to the first registered URL and
    /// the fallback is persisted. `None` only when the registry is empty.
    pub fn active(&mut self) -> Option<String> {
        let valid = self
            .active
            .as_ref()
            .map(|a| self.meta.contains_key(a))
            .unwrap_or(false);

        if !valid {
            let fallback = self.urls.first().cloned();
            if fallback != self.active {
                if let Some(stale) = &self.active {
                    warn!("Active instance {} is no longer registered", stale);
                }
                self.active = fallback;
                self.persist_active();
            }
        }

        self.active.clone()
    }

    /// Marks `url` active. No-op (returns `false`) for non-members.
    pub fn set_active(&mut self, url: &str) -> bool {
        let key = self.resolve(url);
        if !self.meta.contains_key(&key) {
            return false;
        }
        self.active = Some(key);
        self.persist_active();
        true
    }

    /// Normalized form of `url` when it parses, the raw string otherwise.
    fn resolve(&self, url: &str) -> String {
        normalize_url(url).unwrap_or_else(|_| url.to_string())
    }

    fn persist_urls(&self) {
        write_blob(self.store.as_ref(), URLS_KEY, &self.urls);
    }

    fn persist_meta(&self) {
        write_blob(self.store.as_ref(), META_KEY, &self.meta);
    }

    fn persist_active(&self) {
        write_blob(self.store.as_ref(), ACTIVE_KEY, &self.active);
    }
}

fn read_blob<T: serde::de::DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read {}: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring corrupt {} blob: {}", key, e);
            None
        }
    }
}

fn write_blob<T: serde::Serialize>(store: &dyn KvStore, key: &str, value: &T) {
    let serialized = match serde_json::to_string(value) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to serialize {}: {}", key, e);
            return;
        }
    };
    if let Err(e) = store.set(key, &serialized) {
        warn!("Failed to persist {}: {}", key, e);
    }
}
