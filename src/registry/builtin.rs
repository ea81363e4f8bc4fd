//! Mappings that ship with the crate.

use lazy_static::lazy_static;

use super::{Registry, RegistryEntry};
use crate::providers::ProviderId;
use crate::tasks::TaskKind;

lazy_static! {
    static ref BUILTIN: Registry = {
        let mut registry = Registry::new();

        for entry in builtin_entries() {
            // Pairs below are unique, checked by the tests of this module.
            let _ = registry.insert(entry);
        }

        registry
    };
}

fn builtin_entries() -> Vec<RegistryEntry> {
    use ProviderId::*;
    use TaskKind::*;

    vec![
        RegistryEntry::live(
            "meta-llama/Llama-3.3-70B-Instruct",
            Together,
            "meta-llama/Llama-3.3-70B-Instruct-Turbo",
            Conversational,
        ),
        RegistryEntry::live(
            "meta-llama/Llama-3.3-70B-Instruct",
            Nebius,
            "meta-llama/Llama-3.3-70B-Instruct",
            Conversational,
        ),
        RegistryEntry::live(
            "meta-llama/Llama-3.3-70B-Instruct",
            Groq,
            "llama-3.3-70b-versatile",
            Conversational,
        ),
        RegistryEntry::live(
            "meta-llama/Llama-3.1-8B-Instruct",
            Cerebras,
            "llama3.1-8b",
            Conversational,
        ),
        RegistryEntry::live(
            "meta-llama/Llama-3.1-8B-Instruct",
            Novita,
            "meta-llama/llama-3.1-8b-instruct",
            Conversational,
        ),
        RegistryEntry::live(
            "meta-llama/Llama-3.1-8B-Instruct",
            Sambanova,
            "Meta-Llama-3.1-8B-Instruct",
            Conversational,
        ),
        RegistryEntry::live(
            "mistralai/Mistral-7B-Instruct-v0.3",
            FeatherlessAi,
            "mistralai/Mistral-7B-Instruct-v0.3",
            TextGeneration,
        ),
        RegistryEntry::live(
            "CohereLabs/c4ai-command-r7b-12-2024",
            Cohere,
            "command-r7b-12-2024",
            Conversational,
        ),
        RegistryEntry::live(
            "deepseek-ai/DeepSeek-R1",
            FireworksAi,
            "accounts/fireworks/models/deepseek-r1",
            Conversational,
        ),
        RegistryEntry::live(
            "deepseek-ai/DeepSeek-R1",
            Hyperbolic,
            "deepseek-ai/DeepSeek-R1",
            Conversational,
        ),
        RegistryEntry::live(
            "Qwen/Qwen2.5-Coder-32B-Instruct",
            Nscale,
            "Qwen/Qwen2.5-Coder-32B-Instruct",
            Conversational,
        ),
        RegistryEntry::live(
            "Qwen/Qwen2.5-Coder-32B-Instruct",
            Deepinfra,
            "Qwen/Qwen2.5-Coder-32B-Instruct",
            Conversational,
        ),
        RegistryEntry::live(
            "meta-llama/Llama-3.1-8B-Instruct",
            Ovhcloud,
            "Llama-3.1-8B-Instruct",
            Conversational,
        ),
        RegistryEntry::live(
            "BAAI/bge-multilingual-gemma2",
            Scaleway,
            "bge-multilingual-gemma2",
            FeatureExtraction,
        ),
        RegistryEntry::live(
            "openai-community/gpt2",
            HfInference,
            "openai-community/gpt2",
            TextGeneration,
        ),
        RegistryEntry::live(
            "sentence-transformers/all-MiniLM-L6-v2",
            HfInference,
            "sentence-transformers/all-MiniLM-L6-v2",
            SentenceSimilarity,
        ),
        RegistryEntry::live(
            "distilbert/distilbert-base-uncased-finetuned-sst-2-english",
            HfInference,
            "distilbert/distilbert-base-uncased-finetuned-sst-2-english",
            TextClassification,
        ),
        RegistryEntry::live(
            "facebook/bart-large-mnli",
            HfInference,
            "facebook/bart-large-mnli",
            ZeroShotClassification,
        ),
        RegistryEntry::live(
            "black-forest-labs/FLUX.1-schnell",
            Together,
            "black-forest-labs/FLUX.1-schnell",
            TextToImage,
        ),
        RegistryEntry::live(
            "black-forest-labs/FLUX.1-schnell",
            Replicate,
            "black-forest-labs/flux-schnell",
            TextToImage,
        ),
        RegistryEntry::live(
            "black-forest-labs/FLUX.1-dev",
            FalAi,
            "fal-ai/flux/dev",
            TextToImage,
        ),
        RegistryEntry::live(
            "black-forest-labs/FLUX.1-dev",
            Together,
            "black-forest-labs/FLUX.1-dev",
            TextToImage,
        ),
        RegistryEntry::live(
            "openai/whisper-large-v3",
            FalAi,
            "fal-ai/whisper",
            AutomaticSpeechRecognition,
        ),
        RegistryEntry::live(
            "openai/whisper-large-v3",
            HfInference,
            "openai/whisper-large-v3",
            AutomaticSpeechRecognition,
        ),
        RegistryEntry::live(
            "hexgrad/Kokoro-82M",
            Replicate,
            "jaaari/kokoro-82m:f559560eb822dc509045f3921a1921234918b91739db4bf3daab2169b71c7a13",
            TextToSpeech,
        ),
    ]
}

impl Registry {
    /// The registry of known mappings.
    pub fn builtin() -> Registry {
        BUILTIN.clone()
    }
}
