use std::collections::HashMap;

use crate::error::DeckError;
use crate::models::ConnectionProfile;

/// Keyed store of connection profiles. Profiles are keyed by their label.
pub trait ProfileStore {
    /// All profiles, most recently used first.
    fn profiles(&self) -> Vec<ConnectionProfile>;

    fn get(&self, name: &str) -> Option<ConnectionProfile>;

    /// Insert or replace the profile with the same label.
    fn upsert(&mut self, profile: ConnectionProfile);

    fn remove(&mut self, name: &str) -> Option<ConnectionProfile>;

    /// Mark a profile as used now and return it.
    fn touch(&mut self, name: &str) -> Result<ConnectionProfile, DeckError>;

    fn most_recent(&self) -> Option<ConnectionProfile> {
        self.profiles().into_iter().next()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    profiles: HashMap<String, ConnectionProfile>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromIterator<ConnectionProfile> for MemoryProfileStore {
    fn from_iter<I: IntoIterator<Item = ConnectionProfile>>(iter: I) -> Self {
        let mut store = Self::new();
        for profile in iter {
            store.upsert(profile);
        }
        store
    }
}

impl ProfileStore for MemoryProfileStore {
    fn profiles(&self) -> Vec<ConnectionProfile> {
        let mut all: Vec<_> = self.profiles.values().cloned().collect();
        all.sort_by(|a, b| b.last_used.cmp(&a.last_used).then_with(|| a.label().cmp(b.label())));
        all
    }

    fn get(&self, name: &str) -> Option<ConnectionProfile> {
        self.profiles.get(name).cloned()
    }

    fn upsert(&mut self, profile: ConnectionProfile) {
        self.profiles.insert(profile.label().to_string(), profile);
    }

    fn remove(&mut self, name: &str) -> Option<ConnectionProfile> {
        self.profiles.remove(name)
    }

    fn touch(&mut self, name: &str) -> Result<ConnectionProfile, DeckError> {
        let profile = self
            .profiles
            .get_mut(name)
            .ok_or_else(|| DeckError::Profile(format!("no profile named {name:?}")))?;
        profile.touch();
        Ok(profile.clone())
    }
}
