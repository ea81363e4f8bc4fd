//! Turns a resolved call into a transport-ready HTTP request.
//!
//! The builder holds no per-call state: the same `(target, args)` always
//! yields the same request. Everything that can be wrong with a call is
//! reported here, before any network I/O.

use std::collections::HashMap;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::providers::{Routing, StreamStyle};
use crate::providers::ProviderId;
use crate::registry::ResolvedTarget;
use crate::tasks::CallArgs;

pub const DEFAULT_ROUTER_URL: &str = "https://router.huggingface.co";

/// How the access token authenticates a request, which also decides where the
/// request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No token. Requests go through the router unauthenticated.
    None,
    /// A Hub token (`hf_...`). Requests go through the router.
    HfToken,
    /// A provider's own key. Requests go to the provider directly.
    ProviderKey,
}

impl AuthMethod {
    pub fn from_token(token: Option<&str>) -> AuthMethod {
        match token {
            None => AuthMethod::None,
            Some(token) if token.starts_with("hf_") => AuthMethod::HfToken,
            Some(_) => AuthMethod::ProviderKey,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Binary {
        data: Bytes,
        content_type: Option<String>,
    },
    Empty,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl HttpRequest {
    /// An unauthenticated GET, used to fetch results providers return by URL.
    pub fn get(url: Url) -> HttpRequest {
        HttpRequest {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }
}

/// Where requests are sent.
#[derive(Debug, Clone)]
pub struct Endpoints {
    router_url: String,
    overrides: HashMap<ProviderId, String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints::new(DEFAULT_ROUTER_URL)
    }
}

impl Endpoints {
    pub fn new<S: Into<String>>(router_url: S) -> Endpoints {
        Endpoints {
            router_url: router_url.into(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_router_url<S: Into<String>>(mut self, router_url: S) -> Endpoints {
        self.router_url = router_url.into();
        self
    }

    /// Replaces the base URL used when calling `provider` directly.
    pub fn with_override<S: Into<String>>(mut self, provider: ProviderId, base_url: S) -> Endpoints {
        self.overrides.insert(provider, base_url.into());
        self
    }

    fn provider_base_url(&self, provider: ProviderId) -> &str {
        self.overrides
            .get(&provider)
            .map(String::as_str)
            .unwrap_or(provider.dialect().base_url)
    }

    /// The base URL of `provider` for the given authentication method.
    pub fn base_url(&self, provider: ProviderId, auth: AuthMethod) -> String {
        let dialect = provider.dialect();

        match (dialect.routing, auth) {
            (Routing::ClientSide, _) | (Routing::Hub, AuthMethod::ProviderKey) => {
                self.provider_base_url(provider).to_string()
            }
            (Routing::Hub, AuthMethod::None | AuthMethod::HfToken) => {
                format!("{}/{}", self.router_url.trim_end_matches('/'), provider)
            }
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::invalid_arguments("header value contains invalid characters"))
}

#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    access_token: Option<String>,
    endpoints: Endpoints,
}

impl RequestBuilder {
    pub fn new(access_token: Option<String>, endpoints: Endpoints) -> RequestBuilder {
        RequestBuilder {
            access_token,
            endpoints,
        }
    }

    pub fn auth_method(&self) -> AuthMethod {
        AuthMethod::from_token(self.access_token.as_deref())
    }

    pub fn build(&self, target: &ResolvedTarget, args: &CallArgs) -> Result<HttpRequest> {
        let provider = target.provider;
        let dialect = provider.dialect();
        let auth = self.auth_method();

        let task = dialect
            .task(target.task)
            .ok_or_else(|| Error::ModelNotSupportedForProviderTask {
                model: target.hf_model_id.clone(),
                task: target.task,
                provider,
                supported: None,
            })?;

        if dialect.routing == Routing::ClientSide && auth == AuthMethod::HfToken {
            return Err(Error::invalid_arguments(format!(
                "Provider {} is closed-source and does not support HF tokens.",
                provider
            )));
        }

        if args.stream && task.stream == StreamStyle::Unsupported {
            return Err(Error::invalid_arguments(format!(
                "{} cannot be streamed from {}",
                target.task, provider
            )));
        }

        let body = (task.payload)(target, args)?;

        let base_url = self.endpoints.base_url(provider, auth);
        let raw_url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            task.route.path(target).trim_start_matches('/')
        );
        let url = Url::parse(&raw_url)
            .map_err(|e| Error::invalid_arguments(format!("invalid endpoint \"{}\": {}", raw_url, e)))?;

        let mut headers = HeaderMap::new();

        if let Some(token) = &self.access_token {
            let value = match auth {
                AuthMethod::ProviderKey => dialect.key_scheme.header_value(token),
                _ => format!("Bearer {}", token),
            };

            headers.insert(AUTHORIZATION, header_value(&value)?);
        }

        match &body {
            RequestBody::Json(_) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            RequestBody::Binary {
                content_type: Some(content_type),
                ..
            } => {
                headers.insert(CONTENT_TYPE, header_value(content_type)?);
            }
            _ => {}
        }

        if args.stream {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }

        for &(name, value) in dialect.headers {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }

        debug!(
            provider = %provider,
            url = %url,
            ?auth,
            stream = args.stream,
            "built request"
        );

        Ok(HttpRequest {
            method: Method::POST,
            url,
            headers,
            body,
        })
    }
}
