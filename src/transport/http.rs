use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Error, Response, Transport};
use crate::request::{HttpRequest, RequestBody};

/// Sends requests with a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> ReqwestTransport {
        ReqwestTransport::default()
    }

    /// A transport whose requests give up after `timeout`. The timeout covers
    /// the whole exchange, including reading the body.
    pub fn with_timeout(timeout: Duration) -> Result<ReqwestTransport, Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(ReqwestTransport { client })
    }

    pub fn with_client(client: Client) -> ReqwestTransport {
        ReqwestTransport { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest, cancel: &CancellationToken) -> Result<Response, Error> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        debug!(%method, %url, "sending request");

        let mut builder = self.client.request(method, url).headers(headers);

        builder = match body {
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Binary { data, .. } => builder.body(data),
            RequestBody::Empty => builder,
        };

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled()),
            res = builder.send() => res?,
        };

        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        trace!(status, content_type = ?content_type, "received response headers");

        let body = res.bytes_stream().map_err(Error::from).boxed();

        Ok(Response {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ErrorKind;
    use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
    use reqwest::Method;
    use serde_json::json;

    fn post(url: &str, body: RequestBody) -> HttpRequest {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer hf_abc"));

        HttpRequest {
            method: Method::POST,
            url: url.parse().unwrap(),
            headers,
            body,
        }
    }

    #[tokio::test]
    async fn sends_json_and_reads_the_body() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer hf_abc")
            .match_body(mockito::Matcher::Json(json!({"model": "m"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new();
        let cancel = CancellationToken::new();

        let res = transport
            .send(
                post(
                    &format!("{}/v1/chat/completions", server.url()),
                    RequestBody::Json(json!({"model": "m"})),
                ),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(res.status, 200);
        assert_eq!(res.content_type.as_deref(), Some("application/json"));

        let body = res.bytes(&cancel).await.unwrap();
        assert_eq!(&body[..], br#"{"ok":true}"#);

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_statuses_are_responses() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/models/gpt2")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let res = ReqwestTransport::new()
            .send(
                post(
                    &format!("{}/models/gpt2", server.url()),
                    RequestBody::Binary {
                        data: bytes::Bytes::from_static(b"RIFF"),
                        content_type: Some("audio/wav".to_string()),
                    },
                ),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(res.status, 503);
        assert!(!res.is_success());
    }

    #[tokio::test]
    async fn cancelled_requests_are_not_sent() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = ReqwestTransport::new()
            .send(post("http://127.0.0.1:9/", RequestBody::Empty), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn silent_servers_time_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accepts connections and never answers
        let server = tokio::spawn(async move {
            let mut open = Vec::new();

            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let err = ReqwestTransport::with_timeout(Duration::from_millis(50))
            .unwrap()
            .send(post(&format!("http://{}/", addr), RequestBody::Empty), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TimedOut);
        assert_eq!(crate::Error::from(err).kind(), crate::ErrorKind::Timeout);

        server.abort();
    }

    #[tokio::test]
    async fn unreachable_hosts_fail_to_connect() {
        let err = ReqwestTransport::new()
            .send(post("http://127.0.0.1:9/", RequestBody::Empty), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
    }
}
