// Runtime feature flags seeded from the application config

use crate::config::AppConfigStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Named boolean switches with change notification
///
/// Flags seed from the `featureFlags` section of the config and can be
/// flipped at runtime. Readers treat an unknown flag as off. Subscribers
/// get a snapshot of the whole map on every effective change; writes that
/// do not change a value stay silent.
pub struct FeatureFlags {
    flags: Mutex<HashMap<String, bool>>,
    tx: watch::Sender<HashMap<String, bool>>,
}

impl FeatureFlags {
    /// Builds the flag set, seeding from config when it is already loaded
    pub fn new(cfg: Arc<AppConfigStore>) -> Self {
        let seed = cfg
            .config()
            .ok()
            .and_then(|c| c.feature_flags.clone())
            .unwrap_or_default();
        let (tx, _rx) = watch::channel(seed.clone());
        Self {
            flags: Mutex::new(seed),
            tx,
        }
    }

    /// Replaces all flags with the given map
    pub fn load(&self, flags: HashMap<String, bool>) {
        let mut current = self.flags.lock().unwrap();
        if *current == flags {
            return;
        }
        *current = flags.clone();
        self.tx.send_replace(flags);
    }

    /// Whether the flag exists and is on
    pub fn is_on(&self, name: &str) -> bool {
        self.flags.lock().unwrap().get(name).copied().unwrap_or(false)
    }

    /// Whether the flag is absent or off
    pub fn is_off(&self, name: &str) -> bool {
        !self.is_on(name)
    }

    /// Sets one flag; a write that changes nothing emits no notification
    pub fn set(&self, name: &str, value: bool) {
        let mut flags = self.flags.lock().unwrap();
        if flags.get(name).copied() == Some(value) {
            return;
        }
        flags.insert(name.to_string(), value);
        self.tx.send_replace(flags.clone());
    }

    /// Flips a flag; a missing flag toggles to on
    pub fn toggle(&self, name: &str) {
        let mut flags = self.flags.lock().unwrap();
        let next = !flags.get(name).copied().unwrap_or(false);
        flags.insert(name.to_string(), next);
        self.tx.send_replace(flags.clone());
    }

    /// Snapshot of every flag
    pub fn all(&self) -> HashMap<String, bool> {
        self.flags.lock().unwrap().clone()
    }

    /// Subscribes to flag map changes
    pub fn subscribe(&self) -> watch::Receiver<HashMap<String, bool>> {
        self.tx.subscribe()
    }
}
