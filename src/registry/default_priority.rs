use crate::providers::ProviderId;

/// The priority of a provider when none is configured.
pub fn default_priority(provider_id: ProviderId) -> u8 {
    match provider_id {
        ProviderId::HfInference => 10,
        ProviderId::OpenAi => 0,
        _ => 100,
    }
}
