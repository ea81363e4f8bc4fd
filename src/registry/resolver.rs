use tracing::{debug, warn};

use super::registry::{EntryStatus, Registry, RegistryEntry};
use crate::error::{Error, Result};
use crate::providers::ProviderId;
use crate::tasks::TaskKind;

/// The concrete endpoint a call was resolved to. Created per call and owned by
/// that call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub provider: ProviderId,
    /// The provider's own identifier for the model.
    pub provider_id: String,
    /// The model identifier the caller asked for.
    pub hf_model_id: String,
    pub task: TaskKind,
    pub adapter: Option<String>,
    pub adapter_weights_path: Option<String>,
}

impl ResolvedTarget {
    fn from_entry(entry: &RegistryEntry, task: TaskKind) -> ResolvedTarget {
        ResolvedTarget {
            provider: entry.provider,
            provider_id: entry.provider_id.clone(),
            hf_model_id: entry.hf_model_id.clone(),
            task,
            adapter: entry.adapter.clone(),
            adapter_weights_path: entry.adapter_weights_path.clone(),
        }
    }
}

/// Whether an entry registered for `registered` can serve `requested`.
fn task_matches(provider: ProviderId, registered: TaskKind, requested: TaskKind) -> bool {
    use TaskKind::{FeatureExtraction, SentenceSimilarity};

    registered == requested
        || (provider == ProviderId::HfInference
            && matches!(
                (registered, requested),
                (FeatureExtraction, SentenceSimilarity) | (SentenceSimilarity, FeatureExtraction)
            ))
}

/// Resolves `(model, task, provider?)` triples against a registry. Resolution
/// is a pure lookup and never touches the network.
pub struct ModelResolver<'r> {
    registry: &'r Registry,
}

impl<'r> ModelResolver<'r> {
    pub fn new(registry: &'r Registry) -> ModelResolver<'r> {
        ModelResolver { registry }
    }

    pub fn resolve(
        &self,
        model: &str,
        task: TaskKind,
        provider: Option<ProviderId>,
    ) -> Result<ResolvedTarget> {
        let target = match provider {
            Some(provider) if provider.dialect().is_prefix_required() => {
                Self::resolve_client_side(model, task, provider)?
            }
            Some(provider) => self.resolve_explicit(model, task, provider)?,
            None => self.resolve_auto(model, task)?,
        };

        debug!(
            model,
            task = %task,
            provider = %target.provider,
            provider_id = %target.provider_id,
            "resolved model"
        );

        Ok(target)
    }

    /// Client-side routed providers take `"<provider>/<model>"` identifiers.
    fn resolve_client_side(
        model: &str,
        task: TaskKind,
        provider: ProviderId,
    ) -> Result<ResolvedTarget> {
        let prefix = format!("{}/", provider);

        let provider_id = match model.strip_prefix(&prefix) {
            Some(provider_id) if !provider_id.is_empty() => provider_id,
            _ => {
                return Err(Error::ProviderPrefixRequired {
                    provider,
                    model: model.to_string(),
                })
            }
        };

        if !provider.dialect().supports(task) {
            return Err(Error::ModelNotSupportedForProviderTask {
                model: model.to_string(),
                task,
                provider,
                supported: None,
            });
        }

        Ok(ResolvedTarget {
            provider,
            provider_id: provider_id.to_string(),
            hf_model_id: model.to_string(),
            task,
            adapter: None,
            adapter_weights_path: None,
        })
    }

    fn resolve_explicit(
        &self,
        model: &str,
        task: TaskKind,
        provider: ProviderId,
    ) -> Result<ResolvedTarget> {
        let not_supported = |supported: Option<TaskKind>| Error::ModelNotSupportedForProviderTask {
            model: model.to_string(),
            task,
            provider,
            supported,
        };

        let entry = self
            .registry
            .entry(model, provider)
            .ok_or_else(|| not_supported(None))?;

        if !task_matches(provider, entry.task, task) {
            return Err(not_supported(Some(entry.task)));
        }

        if !provider.dialect().supports(task) {
            return Err(not_supported(None));
        }

        if entry.status == EntryStatus::Staging {
            warn!(
                "Model {} is in staging mode for provider {}. Meant for test purposes only.",
                model, provider
            );
        }

        Ok(ResolvedTarget::from_entry(entry, task))
    }

    /// Picks the highest priority live entry. Entries of equal priority are
    /// ranked by registration order.
    fn resolve_auto(&self, model: &str, task: TaskKind) -> Result<ResolvedTarget> {
        let mut selected: Option<&RegistryEntry> = None;

        for entry in self.registry.entries_for(model) {
            if entry.status != EntryStatus::Live || !task_matches(entry.provider, entry.task, task) {
                continue;
            }

            if !entry.provider.dialect().supports(task) {
                debug!(
                    model,
                    provider = %entry.provider,
                    task = %task,
                    "skipping entry, the provider does not serve the task"
                );
                continue;
            }

            if let Some(alt) = selected {
                if self.registry.priority(alt.provider) >= self.registry.priority(entry.provider) {
                    continue;
                }
            }

            selected = Some(entry);
        }

        match selected {
            Some(entry) => Ok(ResolvedTarget::from_entry(entry, task)),
            None => Err(Error::ModelNotFound {
                model: model.to_string(),
                task,
            }),
        }
    }
}
