//! Helpers shared by the dialect transforms.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::normalize::ProviderOutput;
use crate::registry::ResolvedTarget;
use crate::tasks::{CallArgs, ChatMessage, Inputs};

const HUB_URL: &str = "https://huggingface.co";

pub(super) fn messages(args: &CallArgs) -> Result<&[ChatMessage]> {
    match &args.inputs {
        Inputs::Messages(messages) => Ok(messages),
        _ => Err(Error::invalid_arguments(format!(
            "{} expects a list of chat messages",
            args.task
        ))),
    }
}

pub(super) fn text(args: &CallArgs) -> Result<&str> {
    match &args.inputs {
        Inputs::Text(text) => Ok(text),
        _ => Err(Error::invalid_arguments(format!(
            "{} expects a text input",
            args.task
        ))),
    }
}

/// A single text or a batch of texts, as a JSON value.
pub(super) fn texts(args: &CallArgs) -> Result<Value> {
    match &args.inputs {
        Inputs::Text(text) => Ok(Value::String(text.clone())),
        Inputs::Texts(texts) => Ok(Value::from(texts.clone())),
        _ => Err(Error::invalid_arguments(format!(
            "{} expects a text input or a list of text inputs",
            args.task
        ))),
    }
}

pub(super) fn binary(args: &CallArgs) -> Result<(&Bytes, Option<&str>)> {
    match &args.inputs {
        Inputs::Binary { data, content_type } => Ok((data, content_type.as_deref())),
        _ => Err(Error::invalid_arguments(format!(
            "{} expects binary inputs",
            args.task
        ))),
    }
}

/// The caller's parameters with `from` renamed to `to`. An explicit `to`
/// wins over a renamed `from`.
pub(super) fn parameters_renamed(args: &CallArgs, from: &str, to: &str) -> Map<String, Value> {
    let mut params = args.parameters.clone();

    if let Some(value) = params.remove(from) {
        if !params.contains_key(to) {
            params.insert(to.to_string(), value);
        }
    }

    params
}

/// Inserts the `stream` flag only for streamed calls, vendors reject it on
/// some non-streaming routes.
pub(super) fn insert_stream(body: &mut Map<String, Value>, args: &CallArgs) {
    if args.stream {
        body.insert("stream".to_string(), Value::Bool(true));
    }
}

/// The JSON document of a provider answer.
pub(super) fn json(target: &ResolvedTarget, output: ProviderOutput) -> Result<Value> {
    match output {
        ProviderOutput::Json(value) => Ok(value),
        _ => Err(Error::unexpected_output(target.provider, "a JSON document")),
    }
}

/// A string found at `pointer` in the answer.
pub(super) fn string_at(target: &ResolvedTarget, value: &Value, pointer: &str) -> Result<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::unexpected_output(target.provider, format!("a string at {}", pointer)))
}

/// The Hub download URL of the LoRA weights attached to the target, if any.
///
/// A `lora` adapter without a weights path cannot be loaded by any vendor.
pub(super) fn lora_weights_url(target: &ResolvedTarget) -> Result<Option<String>> {
    match target.adapter.as_deref() {
        Some("lora") => match &target.adapter_weights_path {
            Some(path) => Ok(Some(format!(
                "{}/{}/resolve/main/{}",
                HUB_URL, target.hf_model_id, path
            ))),
            None => Err(Error::invalid_arguments(format!(
                "no adapter weights path is registered for the LoRA model {}",
                target.hf_model_id
            ))),
        },
        _ => Ok(None),
    }
}
