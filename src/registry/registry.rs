use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::IntoEnumIterator;
use tracing::debug;

use super::default_priority::default_priority;
use super::RegistryError;
use crate::providers::ProviderId;
use crate::tasks::TaskKind;

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Live,
    /// Only used when the provider is named explicitly.
    Staging,
}

/// One `(model, provider)` mapping.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub hf_model_id: String,
    pub provider: ProviderId,
    /// The provider's own identifier for the model.
    pub provider_id: String,
    pub task: TaskKind,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_weights_path: Option<String>,
}

impl RegistryEntry {
    pub fn live<M: Into<String>, P: Into<String>>(
        hf_model_id: M,
        provider: ProviderId,
        provider_id: P,
        task: TaskKind,
    ) -> RegistryEntry {
        RegistryEntry {
            hf_model_id: hf_model_id.into(),
            provider,
            provider_id: provider_id.into(),
            task,
            status: EntryStatus::Live,
            adapter: None,
            adapter_weights_path: None,
        }
    }

    pub fn staging(mut self) -> RegistryEntry {
        self.status = EntryStatus::Staging;
        self
    }

    pub fn lora<P: Into<String>>(mut self, weights_path: P) -> RegistryEntry {
        self.adapter = Some("lora".to_string());
        self.adapter_weights_path = Some(weights_path.into());
        self
    }
}

/// An entry as it appears in a registry document. The model and the provider
/// are the keys the entry is filed under.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DocumentEntry {
    provider_id: String,
    task: TaskKind,
    #[serde(default)]
    status: EntryStatus,
    adapter: Option<String>,
    adapter_weights_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Registry {
    /// Entries in registration order.
    entries: Vec<RegistryEntry>,
    /// Indices into `entries` per Hub model identifier.
    models: HashMap<String, Vec<usize>>,
    priorities: HashMap<ProviderId, u8>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    /// An empty registry with the default provider priorities.
    pub fn new() -> Registry {
        let priorities = ProviderId::iter().map(|id| (id, default_priority(id)));

        Registry {
            entries: Vec::new(),
            models: HashMap::new(),
            priorities: HashMap::from_iter(priorities),
        }
    }

    /// Builds a registry from a `{hfModelId: {provider: entry}}` document.
    pub fn from_json(document: &str) -> Result<Registry, RegistryError> {
        let mut registry = Registry::new();

        registry.extend_from_json(document)?;

        Ok(registry)
    }

    /// Reads a registry document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Registry, RegistryError> {
        let path = path.as_ref();

        let document = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&document)
    }

    /// Adds the entries of a registry document, in document order.
    pub fn extend_from_json(&mut self, document: &str) -> Result<(), RegistryError> {
        let models: Map<String, Value> = serde_json::from_str(document)?;

        for (hf_model_id, providers) in models {
            let providers: Map<String, Value> = serde_json::from_value(providers)?;

            for (provider, entry) in providers {
                let provider = ProviderId::from_str(&provider)
                    .map_err(|_| RegistryError::UnknownProvider(provider.clone()))?;

                let entry: DocumentEntry = serde_json::from_value(entry)?;

                self.insert(RegistryEntry {
                    hf_model_id: hf_model_id.clone(),
                    provider,
                    provider_id: entry.provider_id,
                    task: entry.task,
                    status: entry.status,
                    adapter: entry.adapter,
                    adapter_weights_path: entry.adapter_weights_path,
                })?;
            }
        }

        Ok(())
    }

    /// Registers an entry. Each `(model, provider)` pair can only be
    /// registered once.
    pub fn insert(&mut self, entry: RegistryEntry) -> Result<(), RegistryError> {
        if self.entry(&entry.hf_model_id, entry.provider).is_some() {
            return Err(RegistryError::DuplicateEntry {
                model: entry.hf_model_id,
                provider: entry.provider,
            });
        }

        debug!(
            model = %entry.hf_model_id,
            provider = %entry.provider,
            task = %entry.task,
            "registered model"
        );

        let index = self.entries.len();

        self.models
            .entry(entry.hf_model_id.clone())
            .or_default()
            .push(index);

        self.entries.push(entry);

        Ok(())
    }

    pub fn set_priority(&mut self, provider: ProviderId, priority: u8) {
        self.priorities.insert(provider, priority);
    }

    pub fn priority(&self, provider: ProviderId) -> u8 {
        self.priorities
            .get(&provider)
            .copied()
            .unwrap_or_else(|| default_priority(provider))
    }

    /// The entries of a model, in registration order.
    pub fn entries_for<'r>(&'r self, hf_model_id: &str) -> impl Iterator<Item = &'r RegistryEntry> {
        self.models
            .get(hf_model_id)
            .into_iter()
            .flatten()
            .map(|&i| &self.entries[i])
    }

    pub fn entry(&self, hf_model_id: &str, provider: ProviderId) -> Option<&RegistryEntry> {
        self.entries_for(hf_model_id)
            .find(|entry| entry.provider == provider)
    }

    /// All entries, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
