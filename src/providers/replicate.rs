//! The Replicate dialect.
//!
//! Replicate models are either addressed by name, or pinned to a version with
//! `owner/name:version`. Pinned versions go through the generic predictions
//! endpoint and carry the version in the body.

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::normalize::ProviderOutput;
use crate::registry::ResolvedTarget;
use crate::request::RequestBody;
use crate::tasks::{CallArgs, TaskKind};

use super::dialect::{Dialect, KeyScheme, Route, Routing, StreamStyle, TaskDialect};
use super::{payload, ProviderId};

fn version(target: &ResolvedTarget) -> Option<&str> {
    target.provider_id.split_once(':').map(|(_, version)| version)
}

fn route(target: &ResolvedTarget) -> String {
    if version(target).is_some() {
        "v1/predictions".to_string()
    } else {
        format!("v1/models/{}/predictions", target.provider_id)
    }
}

fn prediction(target: &ResolvedTarget, input: Map<String, Value>) -> RequestBody {
    let mut body = Map::new();
    body.insert("input".to_string(), Value::Object(input));

    if let Some(version) = version(target) {
        body.insert("version".to_string(), json!(version));
    }

    RequestBody::Json(Value::Object(body))
}

fn text_to_image_payload(target: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let prompt = payload::text(args)?;

    let mut input = args.parameters.clone();
    input.insert("prompt".to_string(), json!(prompt));

    if let Some(url) = payload::lora_weights_url(target)? {
        input.insert("lora_weights".to_string(), json!(url));
    }

    Ok(prediction(target, input))
}

fn text_to_speech_payload(target: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let text = payload::text(args)?;

    let mut input = args.parameters.clone();
    input.insert("text".to_string(), json!(text));

    Ok(prediction(target, input))
}

/// The prediction output is either a URL or a list of URLs.
fn output(target: &ResolvedTarget, output: ProviderOutput) -> Result<ProviderOutput> {
    let value = payload::json(target, output)?;

    let url = match value.get("output") {
        Some(Value::String(url)) => Some(url.clone()),
        Some(Value::Array(urls)) => urls.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    };

    url.map(ProviderOutput::Url)
        .ok_or_else(|| Error::unexpected_output(target.provider, "a prediction output URL"))
}

pub(super) static DIALECT: Dialect = Dialect {
    provider: ProviderId::Replicate,
    base_url: "https://api.replicate.com",
    routing: Routing::Hub,
    key_scheme: KeyScheme::Bearer,
    headers: &[("prefer", "wait")],
    tasks: &[
        TaskDialect {
            task: TaskKind::TextToImage,
            route: Route::Model(route),
            payload: text_to_image_payload,
            output,
            stream: StreamStyle::Unsupported,
        },
        TaskDialect {
            task: TaskKind::TextToSpeech,
            route: Route::Model(route),
            payload: text_to_speech_payload,
            output,
            stream: StreamStyle::Unsupported,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Inputs;

    fn target(provider_id: &str) -> ResolvedTarget {
        ResolvedTarget {
            provider: ProviderId::Replicate,
            provider_id: provider_id.to_string(),
            hf_model_id: "black-forest-labs/FLUX.1-schnell".to_string(),
            task: TaskKind::TextToImage,
            adapter: None,
            adapter_weights_path: None,
        }
    }

    fn args() -> CallArgs {
        CallArgs::new(
            "black-forest-labs/FLUX.1-schnell",
            TaskKind::TextToImage,
            Inputs::Text("a lighthouse".to_string()),
        )
        .parameter("num_inference_steps", 4)
    }

    #[test]
    fn named_models_use_the_model_route() {
        let target = target("black-forest-labs/flux-schnell");

        assert_eq!(
            route(&target),
            "v1/models/black-forest-labs/flux-schnell/predictions"
        );

        let RequestBody::Json(body) = text_to_image_payload(&target, &args()).unwrap() else {
            panic!("expected a JSON body");
        };

        assert_eq!(
            body,
            json!({ "input": { "num_inference_steps": 4, "prompt": "a lighthouse" } })
        );
    }

    #[test]
    fn versioned_models_carry_the_version() {
        let target = target("owner/model:5599ed30");

        assert_eq!(route(&target), "v1/predictions");

        let RequestBody::Json(body) = text_to_image_payload(&target, &args()).unwrap() else {
            panic!("expected a JSON body");
        };

        assert_eq!(body["version"], "5599ed30");
    }

    #[test]
    fn output_accepts_a_string_or_a_list() {
        let target = target("black-forest-labs/flux-schnell");

        let single = ProviderOutput::Json(json!({ "output": "https://replicate.delivery/a.webp" }));
        assert_eq!(
            output(&target, single).unwrap(),
            ProviderOutput::Url("https://replicate.delivery/a.webp".to_string())
        );

        let list = ProviderOutput::Json(json!({ "output": ["https://replicate.delivery/b.webp"] }));
        assert_eq!(
            output(&target, list).unwrap(),
            ProviderOutput::Url("https://replicate.delivery/b.webp".to_string())
        );

        let missing = ProviderOutput::Json(json!({ "status": "failed" }));
        assert_eq!(
            output(&target, missing).unwrap_err().kind(),
            crate::ErrorKind::UpstreamServerError
        );
    }
}
