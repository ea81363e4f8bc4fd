//! The caller-facing entry point.
//!
//! An [`InferenceClient`] ties the pieces together: it resolves the call
//! against its registry, builds the vendor request, sends it through its
//! transport, and either normalizes the answer or hands back a
//! [`ChunkStream`]. A client holds no per-call state, so it can be shared
//! between concurrent calls.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};
use url::Url;

use crate::classify;
use crate::config::{Config, ConfigError};
use crate::error::{Error, Result};
use crate::normalize::{self, NormalizedResult, ProviderOutput};
use crate::providers::{ProviderId, TaskDialect};
use crate::registry::populate::populated_registry;
use crate::registry::{ModelResolver, Registry, ResolvedTarget};
use crate::request::{Endpoints, HttpRequest, RequestBuilder};
use crate::stream::{ChunkStream, FrameParser, StreamFormat};
use crate::tasks::{CallArgs, OutputType};
use crate::transport::{self, ReqwestTransport, Response, Transport};

const OCTET_STREAM: &str = "application/octet-stream";

fn is_json(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

fn task_dialect(target: &ResolvedTarget) -> Result<&'static TaskDialect> {
    target
        .provider
        .dialect()
        .task(target.task)
        .ok_or_else(|| Error::ModelNotSupportedForProviderTask {
            model: target.hf_model_id.clone(),
            task: target.task,
            provider: target.provider,
            supported: None,
        })
}

/// Reads a whole response, classifying error statuses.
async fn read_body(
    provider: ProviderId,
    res: Response,
    cancel: &CancellationToken,
) -> Result<(Option<String>, bytes::Bytes)> {
    let status = res.status;
    let success = res.is_success();
    let content_type = res.content_type.clone();
    let media_type = res.media_type();

    let body = res.bytes(cancel).await?;

    if !success {
        return Err(classify::from_status(
            provider,
            status,
            content_type.as_deref(),
            &body,
        ));
    }

    Ok((media_type, body))
}

fn provider_output(provider: ProviderId, media_type: Option<String>, body: bytes::Bytes) -> Result<ProviderOutput> {
    match media_type {
        Some(media_type) if is_json(&media_type) => serde_json::from_slice(&body)
            .map(ProviderOutput::Json)
            .map_err(|_| Error::unexpected_output(provider, "a valid JSON document")),
        Some(media_type) => Ok(ProviderOutput::Binary {
            content_type: media_type,
            data: body,
        }),
        None => Ok(serde_json::from_slice(&body)
            .map(ProviderOutput::Json)
            .unwrap_or_else(|_| ProviderOutput::Binary {
                content_type: OCTET_STREAM.to_string(),
                data: body,
            })),
    }
}

pub struct ClientBuilder {
    registry: Option<Arc<Registry>>,
    transport: Option<Arc<dyn Transport>>,
    access_token: Option<String>,
    endpoints: Endpoints,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    fn new() -> ClientBuilder {
        ClientBuilder {
            registry: None,
            transport: None,
            access_token: None,
            endpoints: Endpoints::default(),
            timeout: None,
        }
    }

    /// The registry to resolve models against. Defaults to
    /// [`Registry::builtin`].
    pub fn registry(mut self, registry: Registry) -> ClientBuilder {
        self.registry = Some(Arc::new(registry));
        self
    }

    pub fn shared_registry(mut self, registry: Arc<Registry>) -> ClientBuilder {
        self.registry = Some(registry);
        self
    }

    /// Replaces the HTTP transport. Defaults to a [`ReqwestTransport`].
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> ClientBuilder {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn access_token<S: Into<String>>(mut self, token: S) -> ClientBuilder {
        self.access_token = Some(token.into());
        self
    }

    pub fn router_url<S: Into<String>>(mut self, url: S) -> ClientBuilder {
        self.endpoints = self.endpoints.with_router_url(url);
        self
    }

    /// Overrides the base URL used when calling `provider` directly.
    pub fn base_url<S: Into<String>>(mut self, provider: ProviderId, url: S) -> ClientBuilder {
        self.endpoints = self.endpoints.with_override(provider, url);
        self
    }

    /// Only applies to the default transport.
    pub fn timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> std::result::Result<InferenceClient, transport::Error> {
        let transport: Arc<dyn Transport> = match (self.transport, self.timeout) {
            (Some(transport), _) => transport,
            (None, Some(timeout)) => Arc::new(ReqwestTransport::with_timeout(timeout)?),
            (None, None) => Arc::new(ReqwestTransport::new()),
        };

        Ok(InferenceClient {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(Registry::builtin())),
            transport,
            requests: RequestBuilder::new(self.access_token, self.endpoints),
        })
    }
}

#[derive(Clone)]
pub struct InferenceClient {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    requests: RequestBuilder,
}

impl InferenceClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// A client set up from a configuration file.
    pub fn from_config(config: &Config) -> std::result::Result<InferenceClient, ConfigError> {
        let mut builder = InferenceClient::builder().registry(populated_registry(config)?);

        if let Some(token) = config.access_token()? {
            builder = builder.access_token(token);
        }

        if let Some(router_url) = &config.router_url {
            builder = builder.router_url(router_url.as_str());
        }

        for (provider, provider_config) in config.providers() {
            if let Some(base_url) = &provider_config.base_url {
                builder = builder.base_url(provider, base_url.as_str());
            }
        }

        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        builder.build().map_err(ConfigError::Transport)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn resolve(&self, args: &CallArgs) -> Result<ResolvedTarget> {
        ModelResolver::new(&self.registry).resolve(&args.model, args.task, args.provider)
    }

    /// Resolves and builds the request of a call without sending it.
    pub fn prepare(&self, args: &CallArgs) -> Result<(ResolvedTarget, HttpRequest)> {
        let target = self.resolve(args)?;
        let request = self.requests.build(&target, args)?;

        Ok((target, request))
    }

    /// Runs a call to completion. Streamed calls are drained into the same
    /// result type.
    pub async fn call(&self, args: &CallArgs, cancel: &CancellationToken) -> Result<NormalizedResult> {
        if args.stream {
            return self.stream(args, cancel.clone()).await?.collect_result().await;
        }

        let (target, request) = self.prepare(args)?;
        let dialect = task_dialect(&target)?;

        let span = info_span!("call", provider = %target.provider, task = %target.task);

        async {
            let res = self.transport.send(request, cancel).await?;
            let (media_type, body) = read_body(target.provider, res, cancel).await?;

            let output = provider_output(target.provider, media_type, body)?;
            let output = (dialect.output)(&target, output)?;
            let output = self.fetch_url(&target, output, args.output_type, cancel).await?;

            normalize::normalize(target.task, target.provider, output, args.output_type)
        }
        .instrument(span)
        .await
    }

    /// Downloads a result the provider returned by URL, when the caller asked
    /// for the payload itself.
    async fn fetch_url(
        &self,
        target: &ResolvedTarget,
        output: ProviderOutput,
        output_type: OutputType,
        cancel: &CancellationToken,
    ) -> Result<ProviderOutput> {
        let url = match (&output, output_type) {
            (ProviderOutput::Url(url), OutputType::Blob) if !url.starts_with("data:") => url,
            _ => return Ok(output),
        };

        let url = Url::parse(url)
            .map_err(|_| Error::unexpected_output(target.provider, "a valid result URL"))?;

        debug!(%url, "fetching result");

        let res = self.transport.send(HttpRequest::get(url), cancel).await?;
        let (media_type, data) = read_body(target.provider, res, cancel).await?;

        Ok(ProviderOutput::Binary {
            content_type: media_type.unwrap_or_else(|| OCTET_STREAM.to_string()),
            data,
        })
    }

    /// Starts a streamed call.
    ///
    /// Resolution and request errors are returned directly. An error status
    /// from the provider is the first item of the returned sequence.
    pub async fn stream(&self, args: &CallArgs, cancel: CancellationToken) -> Result<ChunkStream> {
        if !args.task.is_streamable() {
            return Err(Error::invalid_arguments(format!(
                "{} cannot be streamed",
                args.task
            )));
        }

        let mut args = args.clone();
        args.stream = true;

        let (target, request) = self.prepare(&args)?;
        let dialect = task_dialect(&target)?;

        let res = self.transport.send(request, &cancel).await?;

        if !res.is_success() {
            let status = res.status;
            let content_type = res.content_type.clone();
            let body = res.bytes(&cancel).await?;

            let err = classify::from_status(target.provider, status, content_type.as_deref(), &body);

            return Ok(ChunkStream::failed(target.provider, target.task, err));
        }

        let format = match res.media_type().as_deref() {
            Some("text/event-stream") => StreamFormat::Sse,
            Some("application/x-ndjson" | "application/jsonl" | "application/jsonlines") => {
                StreamFormat::Ndjson
            }
            other => {
                return Err(Error::UpstreamServerError {
                    provider: target.provider,
                    status: Some(res.status),
                    message: format!(
                        "expected a streamed response, got content type \"{}\"",
                        other.unwrap_or("none")
                    ),
                })
            }
        };

        debug!(provider = %target.provider, ?format, "streaming response");

        let frames = FrameParser::new(res.body, format, cancel.clone());

        Ok(ChunkStream::new(
            target.provider,
            target.task,
            dialect.stream,
            frames,
            cancel,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::TextGeneration;
    use crate::registry::RegistryEntry;
    use crate::request::RequestBody;
    use crate::tasks::{ChatMessage, Inputs, TaskKind};
    use crate::ErrorKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every request with the next canned response, and records the
    /// requests.
    #[derive(Clone, Default)]
    struct FakeTransport {
        responses: Arc<Mutex<Vec<(u16, Option<&'static str>, &'static [u8])>>>,
        requests: Arc<Mutex<Vec<HttpRequest>>>,
    }

    impl FakeTransport {
        fn respond(self, status: u16, content_type: Option<&'static str>, body: &'static [u8]) -> FakeTransport {
            self.responses.lock().unwrap().push((status, content_type, body));
            self
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(
            &self,
            request: HttpRequest,
            cancel: &CancellationToken,
        ) -> std::result::Result<Response, transport::Error> {
            if cancel.is_cancelled() {
                return Err(transport::Error::cancelled());
            }

            self.requests.lock().unwrap().push(request);

            let (status, content_type, body) = self.responses.lock().unwrap().remove(0);

            Ok(Response::from_bytes(status, content_type, body))
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();

        for entry in [
            RegistryEntry::live(
                "meta-llama/Llama-3.1-8B-Instruct",
                ProviderId::Together,
                "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo",
                TaskKind::Conversational,
            ),
            RegistryEntry::live(
                "openai-community/gpt2",
                ProviderId::HfInference,
                "openai-community/gpt2",
                TaskKind::TextGeneration,
            ),
            RegistryEntry::live(
                "black-forest-labs/FLUX.1-dev",
                ProviderId::FalAi,
                "fal-ai/flux/dev",
                TaskKind::TextToImage,
            ),
        ] {
            registry.insert(entry).unwrap();
        }

        registry
    }

    fn client(transport: FakeTransport) -> InferenceClient {
        InferenceClient::builder()
            .registry(registry())
            .access_token("hf_abc")
            .transport(transport)
            .build()
            .unwrap()
    }

    fn chat() -> CallArgs {
        CallArgs::chat(
            "meta-llama/Llama-3.1-8B-Instruct",
            vec![ChatMessage::user("Say hello")],
        )
    }

    const CHAT_BODY: &[u8] = br#"{"id":"1","choices":[{"index":0,"message":{"role":"assistant","content":"Hello world"},"finish_reason":"stop"}]}"#;

    const CHAT_STREAM: &[u8] = b"data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hello\"}}]}\n\ndata: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"},\"finish_reason\":\"stop\"}]}\n\ndata: [DONE]\n\n";

    #[tokio::test]
    async fn chat_completion() {
        let transport = FakeTransport::default().respond(200, Some("application/json"), CHAT_BODY);
        let client = client(transport.clone());

        let result = client.call(&chat(), &CancellationToken::new()).await.unwrap();

        let NormalizedResult::ChatCompletion(completion) = result else {
            panic!("expected a chat completion");
        };
        assert_eq!(completion.content(), Some("Hello world"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url.as_str(),
            "https://router.huggingface.co/together/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn streamed_and_plain_calls_agree() {
        let transport = FakeTransport::default()
            .respond(200, Some("application/json"), CHAT_BODY)
            .respond(200, Some("text/event-stream"), CHAT_STREAM);
        let client = client(transport.clone());
        let cancel = CancellationToken::new();

        let plain = client.call(&chat(), &cancel).await.unwrap();

        let mut chunks = client.stream(&chat(), cancel.clone()).await.unwrap();
        let mut text = String::new();

        while let Some(chunk) = chunks.next().await {
            text.push_str(chunk.unwrap().delta_text().unwrap_or_default());
        }

        let NormalizedResult::ChatCompletion(plain) = plain else {
            panic!("expected a chat completion");
        };
        assert_eq!(plain.content(), Some(text.as_str()));

        let streamed = transport.requests().pop().unwrap();
        let RequestBody::Json(body) = streamed.body else {
            panic!("expected a JSON body");
        };
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn call_with_stream_collects_the_chunks() {
        let transport = FakeTransport::default().respond(
            200,
            Some("text/event-stream"),
            b"data:{\"token\":{\"id\":1,\"text\":\"42\",\"special\":false},\"generated_text\":\"42\"}\n\n",
        );
        let client = client(transport);

        let args = CallArgs::text_generation("openai-community/gpt2", "The answer is").stream(true);
        let result = client.call(&args, &CancellationToken::new()).await.unwrap();

        assert_eq!(
            result,
            NormalizedResult::TextGeneration(TextGeneration {
                generated_text: "42".to_string()
            })
        );
    }

    #[tokio::test]
    async fn error_status_is_the_first_chunk() {
        let transport = FakeTransport::default().respond(
            422,
            Some("application/json"),
            br#"{"error":"Input validation error: `inputs` tokens + `max_new_tokens` must be <= 4096","error_type":"validation"}"#,
        );
        let client = client(transport);

        let mut chunks = client.stream(&chat(), CancellationToken::new()).await.unwrap();

        let err = chunks.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamValidationError);
        assert!(err.to_string().contains("must be <= 4096"));
        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn error_status_of_a_plain_call() {
        let transport = FakeTransport::default().respond(500, Some("text/plain"), b"boom");
        let client = client(transport);

        let err = client.call(&chat(), &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamServerError);
        assert!(err.to_string().ends_with("boom"));
    }

    #[tokio::test]
    async fn unexpected_stream_content_type() {
        let transport = FakeTransport::default().respond(200, Some("text/html"), b"<html/>");
        let client = client(transport);

        let err = client
            .stream(&chat(), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamServerError);
    }

    #[tokio::test]
    async fn resolution_errors_never_reach_the_transport() {
        let transport = FakeTransport::default();
        let client = client(transport.clone());
        let cancel = CancellationToken::new();

        let prefix = CallArgs::chat("gpt-4o-mini", vec![ChatMessage::user("hi")]).provider(ProviderId::OpenAi);
        let err = client.call(&prefix, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderPrefixRequired);

        let unknown = CallArgs::chat("acme/unknown", vec![ChatMessage::user("hi")]);
        let err = client.call(&unknown, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelNotFound);

        let image = CallArgs::new(
            "black-forest-labs/FLUX.1-dev",
            TaskKind::TextToImage,
            Inputs::Text("a fox".to_string()),
        );
        let err = client.stream(&image, cancel.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);

        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn url_results_are_fetched_for_blobs() {
        let transport = FakeTransport::default()
            .respond(
                200,
                Some("application/json"),
                br#"{"images":[{"url":"https://v3.fal.media/files/fox.png"}]}"#,
            )
            .respond(200, Some("image/png"), b"PNG");
        let client = client(transport.clone());

        let args = CallArgs::new(
            "black-forest-labs/FLUX.1-dev",
            TaskKind::TextToImage,
            Inputs::Text("a fox".to_string()),
        );

        let result = client.call(&args, &CancellationToken::new()).await.unwrap();

        assert_eq!(
            result,
            NormalizedResult::Blob {
                content_type: "image/png".to_string(),
                data: bytes::Bytes::from_static(b"PNG"),
            }
        );

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url.as_str(), "https://v3.fal.media/files/fox.png");
        assert!(requests[1].headers.is_empty());
    }

    #[tokio::test]
    async fn url_results_are_kept_for_urls() {
        let transport = FakeTransport::default().respond(
            200,
            Some("application/json"),
            br#"{"images":[{"url":"https://v3.fal.media/files/fox.png"}]}"#,
        );
        let client = client(transport.clone());

        let args = CallArgs::new(
            "black-forest-labs/FLUX.1-dev",
            TaskKind::TextToImage,
            Inputs::Text("a fox".to_string()),
        )
        .output_type(OutputType::Url);

        let result = client.call(&args, &CancellationToken::new()).await.unwrap();

        assert_eq!(
            result,
            NormalizedResult::Url("https://v3.fal.media/files/fox.png".to_string())
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_calls_are_not_sent() {
        let transport = FakeTransport::default();
        let client = client(transport.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.call(&chat(), &cancel).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn from_config() {
        let config = Config::from_toml(
            "access_token = \"gsk_abc\"\n[providers.groq]\nbase_url = \"http://127.0.0.1:8080\"\n",
        )
        .unwrap();

        let client = InferenceClient::from_config(&config).unwrap();

        let args = CallArgs::chat(
            "meta-llama/Llama-3.3-70B-Instruct",
            vec![ChatMessage::user("hi")],
        )
        .provider(ProviderId::Groq);

        let (target, request) = client.prepare(&args).unwrap();

        assert_eq!(target.provider_id, "llama-3.3-70b-versatile");
        assert_eq!(
            request.url.as_str(),
            "http://127.0.0.1:8080/openai/v1/chat/completions"
        );
    }
}
