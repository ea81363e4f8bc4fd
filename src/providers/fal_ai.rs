//! The fal.ai dialect.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};

use crate::error::Result;
use crate::normalize::ProviderOutput;
use crate::registry::ResolvedTarget;
use crate::request::RequestBody;
use crate::tasks::{CallArgs, TaskKind};

use super::dialect::{Dialect, KeyScheme, Route, Routing, StreamStyle, TaskDialect};
use super::{payload, ProviderId};

/// The base model fal.ai applies generic LoRA weights to.
const LORA_BASE_MODEL: &str = "stabilityai/stable-diffusion-xl-base-1.0";

fn route(target: &ResolvedTarget) -> String {
    target.provider_id.clone()
}

fn text_to_image_payload(target: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let prompt = payload::text(args)?;

    let mut body = args.parameters.clone();
    body.insert("prompt".to_string(), json!(prompt));
    body.insert("sync_mode".to_string(), json!(true));

    if let Some(url) = payload::lora_weights_url(target)? {
        body.insert("loras".to_string(), json!([{ "path": url, "scale": 1 }]));

        if target.provider_id == "fal-ai/lora" {
            body.insert("model_name".to_string(), json!(LORA_BASE_MODEL));
        }
    }

    Ok(RequestBody::Json(Value::Object(body)))
}

fn text_to_speech_payload(_: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let text = payload::text(args)?;

    let mut body = args.parameters.clone();
    body.insert("text".to_string(), json!(text));

    Ok(RequestBody::Json(Value::Object(body)))
}

fn speech_recognition_payload(_: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let (data, content_type) = payload::binary(args)?;

    let audio_url = format!(
        "data:{};base64,{}",
        content_type.unwrap_or("audio/mpeg"),
        BASE64.encode(data)
    );

    let mut body = args.parameters.clone();
    body.insert("audio_url".to_string(), json!(audio_url));

    Ok(RequestBody::Json(Value::Object(body)))
}

fn image_output(target: &ResolvedTarget, output: ProviderOutput) -> Result<ProviderOutput> {
    let value = payload::json(target, output)?;

    Ok(ProviderOutput::Url(payload::string_at(
        target,
        &value,
        "/images/0/url",
    )?))
}

fn audio_output(target: &ResolvedTarget, output: ProviderOutput) -> Result<ProviderOutput> {
    let value = payload::json(target, output)?;

    Ok(ProviderOutput::Url(payload::string_at(
        target,
        &value,
        "/audio/url",
    )?))
}

fn transcription_output(target: &ResolvedTarget, output: ProviderOutput) -> Result<ProviderOutput> {
    let value = payload::json(target, output)?;
    let text = payload::string_at(target, &value, "/text")?;

    Ok(ProviderOutput::Json(json!({ "text": text })))
}

pub(super) static DIALECT: Dialect = Dialect {
    provider: ProviderId::FalAi,
    base_url: "https://fal.run",
    routing: Routing::Hub,
    key_scheme: KeyScheme::Key,
    headers: &[],
    tasks: &[
        TaskDialect {
            task: TaskKind::TextToImage,
            route: Route::Model(route),
            payload: text_to_image_payload,
            output: image_output,
            stream: StreamStyle::Unsupported,
        },
        TaskDialect {
            task: TaskKind::TextToSpeech,
            route: Route::Model(route),
            payload: text_to_speech_payload,
            output: audio_output,
            stream: StreamStyle::Unsupported,
        },
        TaskDialect {
            task: TaskKind::AutomaticSpeechRecognition,
            route: Route::Model(route),
            payload: speech_recognition_payload,
            output: transcription_output,
            stream: StreamStyle::Unsupported,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Inputs;
    use bytes::Bytes;

    fn target(provider_id: &str, adapter: Option<&str>, weights: Option<&str>) -> ResolvedTarget {
        ResolvedTarget {
            provider: ProviderId::FalAi,
            provider_id: provider_id.to_string(),
            hf_model_id: "user/pixel-art-lora".to_string(),
            task: TaskKind::TextToImage,
            adapter: adapter.map(str::to_string),
            adapter_weights_path: weights.map(str::to_string),
        }
    }

    fn image_args() -> CallArgs {
        CallArgs::new(
            "user/pixel-art-lora",
            TaskKind::TextToImage,
            Inputs::Text("a red fox".to_string()),
        )
    }

    fn body(request: RequestBody) -> Value {
        match request {
            RequestBody::Json(value) => value,
            other => panic!("expected a JSON body, got {:?}", other),
        }
    }

    #[test]
    fn plain_models_get_no_adapter_fields() {
        let body = body(
            text_to_image_payload(&target("fal-ai/flux/dev", None, None), &image_args()).unwrap(),
        );

        assert_eq!(body["prompt"], "a red fox");
        assert_eq!(body["sync_mode"], true);
        assert!(body.get("loras").is_none());
        assert!(body.get("model_name").is_none());
    }

    #[test]
    fn lora_adapters_are_loaded_from_the_hub() {
        let target = target("fal-ai/lora", Some("lora"), Some("pixel.safetensors"));
        let body = body(text_to_image_payload(&target, &image_args()).unwrap());

        assert_eq!(
            body["loras"],
            json!([{
                "path": "https://huggingface.co/user/pixel-art-lora/resolve/main/pixel.safetensors",
                "scale": 1
            }])
        );
        assert_eq!(body["model_name"], LORA_BASE_MODEL);
    }

    #[test]
    fn lora_without_weights_is_invalid() {
        let target = target("fal-ai/lora", Some("lora"), None);
        let err = text_to_image_payload(&target, &image_args()).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::InvalidArguments);
    }

    #[test]
    fn audio_is_sent_as_a_data_url() {
        let args = CallArgs::new(
            "openai/whisper-large-v3",
            TaskKind::AutomaticSpeechRecognition,
            Inputs::Binary {
                data: Bytes::from_static(b"abc"),
                content_type: Some("audio/flac".to_string()),
            },
        );

        let body = body(
            speech_recognition_payload(&target("fal-ai/whisper", None, None), &args).unwrap(),
        );

        assert_eq!(body["audio_url"], "data:audio/flac;base64,YWJj");
    }

    #[test]
    fn image_result_is_a_url() {
        let output = ProviderOutput::Json(json!({
            "images": [{ "url": "https://v3.fal.media/files/fox.png" }]
        }));

        assert_eq!(
            image_output(&target("fal-ai/flux/dev", None, None), output).unwrap(),
            ProviderOutput::Url("https://v3.fal.media/files/fox.png".to_string())
        );
    }
}
