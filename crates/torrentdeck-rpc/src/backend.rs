use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use url::Url;

use crate::error::RpcError;

/// Header carrying the daemon's CSRF session token, both ways.
pub const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";

/// An outgoing JSON POST to the daemon.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    /// Current session token; empty until the daemon hands one out.
    pub session_id: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

/// The parts of a daemon reply the transport looks at.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub session_id: Option<String>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self {
            status,
            session_id: None,
            body: value.to_string().into_bytes(),
        }
    }

    /// A 409 challenge carrying a fresh session token.
    pub fn conflict(token: &str) -> Self {
        Self {
            status: 409,
            session_id: Some(token.to_string()),
            body: Vec::new(),
        }
    }
}

/// Moves request bytes to the daemon and back.
///
/// The RPC client is generic over this so the handshake and scheduling
/// logic can run against a scripted backend in tests.
pub trait HttpBackend: Clone + Send + Sync + 'static {
    fn post(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpReply, RpcError>> + Send;
}

/// Production backend on top of `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestBackend {
    http: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl HttpBackend for ReqwestBackend {
    async fn post(&self, request: HttpRequest) -> Result<HttpReply, RpcError> {
        let mut builder = self
            .http
            .post(request.url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(SESSION_ID_HEADER, request.session_id);
        if let Some(authorization) = request.authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        let resp = builder.body(request.body).send().await?;
        let status = resp.status().as_u16();
        let session_id = resp
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await?.to_vec();

        Ok(HttpReply {
            status,
            session_id,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;
    use crate::client::RpcClient;
    use crate::endpoint::{Credentials, Endpoint};

    fn client_for(
        server: &MockServer,
        credentials: Option<&Credentials>,
    ) -> RpcClient<ReqwestBackend> {
        let endpoint =
            Endpoint::new(false, &server.host(), server.port(), "rpc", credentials).unwrap();
        RpcClient::new(ReqwestBackend::new(Duration::from_secs(5)).unwrap(), endpoint)
    }

    #[tokio::test]
    async fn test_sends_json_headers_and_basic_auth() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rpc")
                    .header("content-type", "application/json")
                    .header("accept", "application/json")
                    .header("authorization", "Basic dXNlcjpwYXNz")
                    .body_includes("\"method\":\"torrent-start\"");
                then.status(200)
                    .json_body(json!({ "result": "success", "arguments": {} }));
            })
            .await;

        let credentials = Credentials {
            username: "user".into(),
            password: "pass".into(),
        };
        let client = client_for(&server, Some(&credentials));
        client.torrent_start(&[1]).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_repeated_conflict_gives_up_after_one_retry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/rpc");
                then.status(409).header(SESSION_ID_HEADER, "T1");
            })
            .await;

        let client = client_for(&server, None);
        let err = client.send("session-get", None).await.unwrap_err();

        assert!(matches!(err, RpcError::Auth), "got {err:?}");
        assert_eq!(client.session_id(), "T1");
        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_transport_error() {
        let endpoint = Endpoint::new(false, "127.0.0.1", 1, "/rpc", None).unwrap();
        let client = RpcClient::new(
            ReqwestBackend::new(Duration::from_secs(2)).unwrap(),
            endpoint,
        );
        let err = client.send("session-get", None).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)), "got {err:?}");
    }
}
