//! The hf-inference dialect: the Hub's own serverless inference API.
//!
//! Models are addressed by path (`models/{id}`). Chat goes through the
//! OpenAI-compatible route of the model, embeddings through the task pipeline
//! route, everything else through the model route with an `{inputs,
//! parameters}` body.

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::normalize::ProviderOutput;
use crate::registry::ResolvedTarget;
use crate::request::RequestBody;
use crate::tasks::{CallArgs, Inputs, TaskKind};

use super::dialect::{Dialect, KeyScheme, Route, Routing, StreamStyle, TaskDialect};
use super::{openai_compat, payload, ProviderId};

fn model_route(target: &ResolvedTarget) -> String {
    format!("models/{}", target.provider_id)
}

fn chat_route(target: &ResolvedTarget) -> String {
    format!("models/{}/v1/chat/completions", target.provider_id)
}

fn pipeline_route(target: &ResolvedTarget) -> String {
    format!("models/{}/pipeline/{}", target.provider_id, target.task)
}

fn inputs_body(inputs: Value, parameters: Map<String, Value>) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("inputs".to_string(), inputs);

    if !parameters.is_empty() {
        body.insert("parameters".to_string(), Value::Object(parameters));
    }

    body
}

fn text_generation_payload(_: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let inputs = payload::text(args)?;
    let parameters = payload::parameters_renamed(args, "max_tokens", "max_new_tokens");

    let mut body = inputs_body(json!(inputs), parameters);
    payload::insert_stream(&mut body, args);

    Ok(RequestBody::Json(Value::Object(body)))
}

/// The text generation answer is either `{generated_text}` or a list with a
/// single such object.
fn text_generation_output(
    target: &ResolvedTarget,
    output: ProviderOutput,
) -> Result<ProviderOutput> {
    let value = payload::json(target, output)?;

    let first = match &value {
        Value::Array(items) => items.first(),
        _ => Some(&value),
    };

    let text = first
        .and_then(|v| v.get("generated_text"))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::unexpected_output(target.provider, "generated text"))?;

    Ok(ProviderOutput::Json(json!({ "generated_text": text })))
}

fn text_inputs_payload(_: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let inputs = payload::texts(args)?;

    Ok(RequestBody::Json(Value::Object(inputs_body(
        inputs,
        args.parameters.clone(),
    ))))
}

fn zero_shot_payload(target: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let has_labels = args
        .parameters
        .get("candidate_labels")
        .is_some_and(|labels| labels.is_array() || labels.is_string());

    if !has_labels {
        return Err(Error::invalid_arguments(format!(
            "zero-shot classification with {} requires parameters.candidate_labels",
            target.provider
        )));
    }

    text_inputs_payload(target, args)
}

fn sentence_similarity_payload(_: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let inputs = match &args.inputs {
        Inputs::Json(inputs)
            if inputs.get("source_sentence").is_some_and(Value::is_string)
                && inputs.get("sentences").is_some_and(Value::is_array) =>
        {
            inputs.clone()
        }
        _ => {
            return Err(Error::invalid_arguments(
                "sentence similarity expects {source_sentence, sentences} inputs",
            ))
        }
    };

    Ok(RequestBody::Json(Value::Object(inputs_body(
        inputs,
        args.parameters.clone(),
    ))))
}

fn speech_recognition_payload(_: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let (data, content_type) = payload::binary(args)?;

    Ok(RequestBody::Binary {
        data: data.clone(),
        content_type: content_type.map(str::to_string),
    })
}

fn passthrough(_: &ResolvedTarget, output: ProviderOutput) -> Result<ProviderOutput> {
    Ok(output)
}

fn media_output(target: &ResolvedTarget, output: ProviderOutput) -> Result<ProviderOutput> {
    match output {
        ProviderOutput::Json(_) => Err(Error::unexpected_output(
            target.provider,
            format!("a binary {} result", target.task),
        )),
        output => Ok(output),
    }
}

const fn by_model(
    task: TaskKind,
    payload: super::dialect::PayloadFn,
    output: super::dialect::OutputFn,
) -> TaskDialect {
    TaskDialect {
        task,
        route: Route::Model(model_route),
        payload,
        output,
        stream: StreamStyle::Unsupported,
    }
}

pub(super) static DIALECT: Dialect = Dialect {
    provider: ProviderId::HfInference,
    base_url: "https://router.huggingface.co/hf-inference",
    routing: Routing::Hub,
    key_scheme: KeyScheme::Bearer,
    headers: &[],
    tasks: &[
        TaskDialect {
            task: TaskKind::Conversational,
            route: Route::Model(chat_route),
            payload: openai_compat::chat_payload,
            output: openai_compat::chat_output,
            stream: StreamStyle::ChatDeltas,
        },
        TaskDialect {
            task: TaskKind::TextGeneration,
            route: Route::Model(model_route),
            payload: text_generation_payload,
            output: text_generation_output,
            stream: StreamStyle::TokenEvents,
        },
        TaskDialect {
            task: TaskKind::FeatureExtraction,
            route: Route::Model(pipeline_route),
            payload: text_inputs_payload,
            output: passthrough,
            stream: StreamStyle::Unsupported,
        },
        TaskDialect {
            task: TaskKind::SentenceSimilarity,
            route: Route::Model(pipeline_route),
            payload: sentence_similarity_payload,
            output: passthrough,
            stream: StreamStyle::Unsupported,
        },
        by_model(TaskKind::TextClassification, text_inputs_payload, passthrough),
        by_model(TaskKind::ZeroShotClassification, zero_shot_payload, passthrough),
        by_model(TaskKind::TextToImage, text_inputs_payload, media_output),
        by_model(TaskKind::TextToSpeech, text_inputs_payload, media_output),
        by_model(
            TaskKind::AutomaticSpeechRecognition,
            speech_recognition_payload,
            passthrough,
        ),
    ],
};
