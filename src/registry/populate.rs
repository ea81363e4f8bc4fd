use tracing::debug;

use super::{Registry, RegistryError};
use crate::config::Config;

/// Builds the registry described by the configuration: the document named by
/// `registry`, or the built-in mappings, with the configured provider
/// priorities applied.
pub(crate) fn populated_registry(config: &Config) -> Result<Registry, RegistryError> {
    let mut registry = match &config.registry {
        Some(path) => Registry::load(path)?,
        None => Registry::builtin(),
    };

    for (provider, provider_config) in config.providers() {
        if let Some(priority) = provider_config.priority {
            debug!(provider = %provider, priority, "overriding provider priority");

            registry.set_priority(provider, priority);
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderId;
    use crate::registry::default_priority;

    #[test]
    fn builtin_registry_with_configured_priorities() {
        let config = Config::from_toml("[providers.together]\npriority = 250\n").unwrap();

        let registry = populated_registry(&config).unwrap();

        assert_eq!(registry.len(), Registry::builtin().len());
        assert_eq!(registry.priority(ProviderId::Together), 250);
        assert_eq!(
            registry.priority(ProviderId::Groq),
            default_priority(ProviderId::Groq)
        );
    }

    #[test]
    fn registry_document_replaces_the_builtin_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{"gpt2": {"hf-inference": {"providerId": "gpt2", "task": "text-generation"}}}"#,
        )
        .unwrap();

        let config = Config {
            registry: Some(path),
            ..Config::default()
        };

        let registry = populated_registry(&config).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.entry("gpt2", ProviderId::HfInference).is_some());
    }
}
