//! Concrete provider identifiers

use serde::{Deserialize, Serialize};
use strum_macros;

use super::dialect::Dialect;
use super::{fal_ai, hf_inference, openai_compat, replicate, together};

/// The `ProviderId` is a unique per-provider identifier. It is used to
/// differentiate providers at runtime in code which is generic over different
/// providers.
///
/// The `to_string` and `FromStr` forms are the registry's provider keys and are
/// part of the CLI, so they should remain stable.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    HfInference,
    Together,
    FalAi,
    Replicate,
    Nebius,
    Novita,
    FeatherlessAi,
    Sambanova,
    Scaleway,
    Cohere,
    FireworksAi,
    Groq,
    Cerebras,
    Hyperbolic,
    Nscale,
    Ovhcloud,
    Deepinfra,
    #[strum(serialize = "openai")]
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderId {
    /// The request/response dialect of the provider.
    pub fn dialect(self) -> &'static Dialect {
        match self {
            ProviderId::HfInference => &hf_inference::DIALECT,
            ProviderId::Together => &together::DIALECT,
            ProviderId::FalAi => &fal_ai::DIALECT,
            ProviderId::Replicate => &replicate::DIALECT,
            ProviderId::Nebius => &openai_compat::NEBIUS,
            ProviderId::Novita => &openai_compat::NOVITA,
            ProviderId::FeatherlessAi => &openai_compat::FEATHERLESS_AI,
            ProviderId::Sambanova => &openai_compat::SAMBANOVA,
            ProviderId::Scaleway => &openai_compat::SCALEWAY,
            ProviderId::Cohere => &openai_compat::COHERE,
            ProviderId::FireworksAi => &openai_compat::FIREWORKS_AI,
            ProviderId::Groq => &openai_compat::GROQ,
            ProviderId::Cerebras => &openai_compat::CEREBRAS,
            ProviderId::Hyperbolic => &openai_compat::HYPERBOLIC,
            ProviderId::Nscale => &openai_compat::NSCALE,
            ProviderId::Ovhcloud => &openai_compat::OVHCLOUD,
            ProviderId::Deepinfra => &openai_compat::DEEPINFRA,
            ProviderId::OpenAi => &openai_compat::OPENAI,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn identifiers_round_trip_through_strings() {
        assert_eq!(ProviderId::HfInference.to_string(), "hf-inference");
        assert_eq!(ProviderId::FalAi.to_string(), "fal-ai");
        assert_eq!(ProviderId::OpenAi.to_string(), "openai");
        assert_eq!(
            ProviderId::from_str("featherless-ai").unwrap(),
            ProviderId::FeatherlessAi
        );
        assert_eq!(
            ProviderId::from_str("ovhcloud").unwrap(),
            ProviderId::Ovhcloud
        );
        assert!(ProviderId::from_str("not-a-vendor").is_err());
    }

    #[test]
    fn serde_uses_the_same_names() {
        let id: ProviderId = serde_json::from_str("\"fireworks-ai\"").unwrap();
        assert_eq!(id, ProviderId::FireworksAi);

        assert_eq!(
            serde_json::to_string(&ProviderId::OpenAi).unwrap(),
            "\"openai\""
        );
    }
}
