//! Transforms for vendors that speak the OpenAI API, and the dialects of the
//! vendors that need nothing else.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::normalize::ProviderOutput;
use crate::registry::ResolvedTarget;
use crate::request::RequestBody;
use crate::tasks::{CallArgs, TaskKind};

use super::dialect::{Dialect, KeyScheme, Route, Routing, StreamStyle, TaskDialect};
use super::payload;
use super::ProviderId;

/* /chat/completions */

pub(super) fn chat_payload(target: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let messages = payload::messages(args)?;

    let mut body = payload::parameters_renamed(args, "max_new_tokens", "max_tokens");
    body.insert("messages".to_string(), json!(messages));
    body.insert("model".to_string(), json!(target.provider_id));
    payload::insert_stream(&mut body, args);

    Ok(RequestBody::Json(Value::Object(body)))
}

pub(super) fn chat_output(target: &ResolvedTarget, output: ProviderOutput) -> Result<ProviderOutput> {
    let value = payload::json(target, output)?;

    if !value.get("choices").is_some_and(Value::is_array) {
        return Err(Error::unexpected_output(
            target.provider,
            "a chat completion with choices",
        ));
    }

    Ok(ProviderOutput::Json(value))
}

/* /completions */

pub(super) fn completion_payload(target: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let prompt = payload::text(args)?;

    let mut body = payload::parameters_renamed(args, "max_new_tokens", "max_tokens");
    body.insert("prompt".to_string(), json!(prompt));
    body.insert("model".to_string(), json!(target.provider_id));
    payload::insert_stream(&mut body, args);

    Ok(RequestBody::Json(Value::Object(body)))
}

pub(super) fn completion_output(
    target: &ResolvedTarget,
    output: ProviderOutput,
) -> Result<ProviderOutput> {
    let value = payload::json(target, output)?;
    let text = payload::string_at(target, &value, "/choices/0/text")?;

    Ok(ProviderOutput::Json(json!({ "generated_text": text })))
}

/* /embeddings */

pub(super) fn embeddings_payload(target: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let input = payload::texts(args)?;

    let mut body = args.parameters.clone();
    body.insert("input".to_string(), input);
    body.insert("model".to_string(), json!(target.provider_id));

    Ok(RequestBody::Json(Value::Object(body)))
}

pub(super) fn embeddings_output(
    target: &ResolvedTarget,
    output: ProviderOutput,
) -> Result<ProviderOutput> {
    let value = payload::json(target, output)?;

    let data = value
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::unexpected_output(target.provider, "a list of embeddings"))?;

    let embeddings = data
        .iter()
        .map(|item| {
            item.get("embedding")
                .cloned()
                .ok_or_else(|| Error::unexpected_output(target.provider, "an embedding"))
        })
        .collect::<Result<Vec<Value>>>()?;

    Ok(ProviderOutput::Json(Value::Array(embeddings)))
}

/* /images/generations */

pub(super) fn image_payload(target: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let prompt = payload::text(args)?;

    let mut body = args.parameters.clone();
    body.insert("prompt".to_string(), json!(prompt));
    body.insert("response_format".to_string(), json!("b64_json"));
    body.insert("model".to_string(), json!(target.provider_id));

    Ok(RequestBody::Json(Value::Object(body)))
}

pub(super) fn image_output(target: &ResolvedTarget, output: ProviderOutput) -> Result<ProviderOutput> {
    let value = payload::json(target, output)?;
    let encoded = payload::string_at(target, &value, "/data/0/b64_json")?;

    let data = BASE64
        .decode(encoded.as_bytes())
        .map_err(|_| Error::unexpected_output(target.provider, "base64 encoded image data"))?;

    Ok(ProviderOutput::Binary {
        content_type: "image/jpeg".to_string(),
        data: Bytes::from(data),
    })
}

pub(super) const fn chat(route: &'static str) -> TaskDialect {
    TaskDialect {
        task: TaskKind::Conversational,
        route: Route::Fixed(route),
        payload: chat_payload,
        output: chat_output,
        stream: StreamStyle::ChatDeltas,
    }
}

pub(super) const fn completion(route: &'static str) -> TaskDialect {
    TaskDialect {
        task: TaskKind::TextGeneration,
        route: Route::Fixed(route),
        payload: completion_payload,
        output: completion_output,
        stream: StreamStyle::CompletionText,
    }
}

pub(super) const fn embeddings(route: &'static str) -> TaskDialect {
    TaskDialect {
        task: TaskKind::FeatureExtraction,
        route: Route::Fixed(route),
        payload: embeddings_payload,
        output: embeddings_output,
        stream: StreamStyle::Unsupported,
    }
}

pub(super) const fn image(route: &'static str) -> TaskDialect {
    TaskDialect {
        task: TaskKind::TextToImage,
        route: Route::Fixed(route),
        payload: image_payload,
        output: image_output,
        stream: StreamStyle::Unsupported,
    }
}

macro_rules! hub_dialect {
    ($provider:expr, $base_url:expr, [$($task:expr),* $(,)?] $(,)?) => {
        Dialect {
            provider: $provider,
            base_url: $base_url,
            routing: Routing::Hub,
            key_scheme: KeyScheme::Bearer,
            headers: &[],
            tasks: &[$($task),*],
        }
    };
}

pub(super) static NEBIUS: Dialect = hub_dialect!(
    ProviderId::Nebius,
    "https://api.studio.nebius.ai",
    [
        chat("v1/chat/completions"),
        completion("v1/completions"),
        embeddings("v1/embeddings"),
        image("v1/images/generations"),
    ],
);

pub(super) static NOVITA: Dialect = hub_dialect!(
    ProviderId::Novita,
    "https://api.novita.ai",
    [
        chat("v3/openai/chat/completions"),
        completion("v3/openai/completions"),
    ],
);

pub(super) static FEATHERLESS_AI: Dialect = hub_dialect!(
    ProviderId::FeatherlessAi,
    "https://api.featherless.ai",
    [chat("v1/chat/completions"), completion("v1/completions")],
);

pub(super) static SAMBANOVA: Dialect = hub_dialect!(
    ProviderId::Sambanova,
    "https://api.sambanova.ai",
    [chat("v1/chat/completions"), embeddings("v1/embeddings")],
);

pub(super) static SCALEWAY: Dialect = hub_dialect!(
    ProviderId::Scaleway,
    "https://api.scaleway.ai",
    [chat("v1/chat/completions"), embeddings("v1/embeddings")],
);

pub(super) static COHERE: Dialect = hub_dialect!(
    ProviderId::Cohere,
    "https://api.cohere.com",
    [chat("compatibility/v1/chat/completions")],
);

pub(super) static FIREWORKS_AI: Dialect = hub_dialect!(
    ProviderId::FireworksAi,
    "https://api.fireworks.ai",
    [chat("inference/v1/chat/completions")],
);

pub(super) static GROQ: Dialect = hub_dialect!(
    ProviderId::Groq,
    "https://api.groq.com",
    [chat("openai/v1/chat/completions")],
);

pub(super) static CEREBRAS: Dialect = hub_dialect!(
    ProviderId::Cerebras,
    "https://api.cerebras.ai",
    [chat("v1/chat/completions")],
);

pub(super) static HYPERBOLIC: Dialect = hub_dialect!(
    ProviderId::Hyperbolic,
    "https://api.hyperbolic.xyz",
    [chat("v1/chat/completions")],
);

pub(super) static NSCALE: Dialect = hub_dialect!(
    ProviderId::Nscale,
    "https://inference.api.nscale.com",
    [chat("v1/chat/completions")],
);

pub(super) static OVHCLOUD: Dialect = hub_dialect!(
    ProviderId::Ovhcloud,
    "https://oai.endpoints.kepler.ai.cloud.ovh.net",
    [chat("v1/chat/completions")],
);

pub(super) static DEEPINFRA: Dialect = hub_dialect!(
    ProviderId::Deepinfra,
    "https://api.deepinfra.com",
    [chat("v1/openai/chat/completions")],
);

pub(super) static OPENAI: Dialect = Dialect {
    provider: ProviderId::OpenAi,
    base_url: "https://api.openai.com",
    routing: Routing::ClientSide,
    key_scheme: KeyScheme::Bearer,
    headers: &[],
    tasks: &[chat("v1/chat/completions")],
};
