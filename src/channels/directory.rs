use crate::memory::types::ChannelInfo;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Channel id → display name. Seeded from config and updated as transports
/// report names. An unknown id is not an error; it names itself.
#[derive(Debug, Default)]
pub struct ChannelDirectory {
    names: RwLock<BTreeMap<String, String>>,
}

impl ChannelDirectory {
    pub fn new(seed: &[ChannelInfo]) -> Self {
        let directory = Self::default();
        for channel in seed {
            directory.register(&channel.id, &channel.name);
        }
        directory
    }

    /// Record or rename a channel. Blank names are ignored.
    pub fn register(&self, id: &str, name: &str) {
        let name = name.trim().trim_start_matches('#');
        if id.trim().is_empty() || name.is_empty() {
            return;
        }
        let mut names = self.names.write().unwrap_or_else(PoisonError::into_inner);
        if names.get(id).map(String::as_str) != Some(name) {
            names.insert(id.to_string(), name.to_string());
        }
    }

    /// Make `id` known without overriding a name it already has.
    pub fn ensure_known(&self, id: &str) {
        if id.trim().is_empty() {
            return;
        }
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.to_string())
            .or_insert_with(|| id.to_string());
    }

    pub fn name_for(&self, id: &str) -> String {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Every known channel, ordered by id.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, name)| ChannelInfo::new(id.clone(), name.clone()))
            .collect()
    }
}
