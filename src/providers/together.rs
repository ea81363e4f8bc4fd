//! The together.ai dialect.

use serde_json::{json, Value};

use crate::error::Result;
use crate::registry::ResolvedTarget;
use crate::request::RequestBody;
use crate::tasks::{CallArgs, TaskKind};

use super::dialect::{Dialect, KeyScheme, Route, Routing, StreamStyle, TaskDialect};
use super::openai_compat::{self, completion};
use super::{payload, ProviderId};

/// together.ai expects the schema of a `json_schema` response format one level
/// up: `{type: json_schema, schema}` instead of `{type: json_schema,
/// json_schema: {schema}}`.
fn chat_payload(target: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let mut body = openai_compat::chat_payload(target, args)?;

    if let RequestBody::Json(Value::Object(body)) = &mut body {
        let schema = body
            .get("response_format")
            .filter(|format| format.get("type") == Some(&json!("json_schema")))
            .and_then(|format| format.pointer("/json_schema/schema"))
            .cloned();

        if let Some(schema) = schema {
            body.insert(
                "response_format".to_string(),
                json!({ "type": "json_schema", "schema": schema }),
            );
        }
    }

    Ok(body)
}

fn image_payload(target: &ResolvedTarget, args: &CallArgs) -> Result<RequestBody> {
    let prompt = payload::text(args)?;

    let mut body = args.parameters.clone();
    body.insert("prompt".to_string(), json!(prompt));
    body.insert("response_format".to_string(), json!("base64"));
    body.insert("model".to_string(), json!(target.provider_id));

    Ok(RequestBody::Json(Value::Object(body)))
}

pub(super) static DIALECT: Dialect = Dialect {
    provider: ProviderId::Together,
    base_url: "https://api.together.xyz",
    routing: Routing::Hub,
    key_scheme: KeyScheme::Bearer,
    headers: &[],
    tasks: &[
        TaskDialect {
            task: TaskKind::Conversational,
            route: Route::Fixed("v1/chat/completions"),
            payload: chat_payload,
            output: openai_compat::chat_output,
            stream: StreamStyle::ChatDeltas,
        },
        completion("v1/completions"),
        TaskDialect {
            task: TaskKind::TextToImage,
            route: Route::Fixed("v1/images/generations"),
            payload: image_payload,
            output: openai_compat::image_output,
            stream: StreamStyle::Unsupported,
        },
    ],
};
