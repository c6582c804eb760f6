use std::sync::{Arc, Mutex, PoisonError};

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::Value;

use crate::backend::{HttpBackend, HttpReply, HttpRequest};
use crate::endpoint::Endpoint;
use crate::error::RpcError;
use crate::types::{
    AddedTorrent, IdsArgs, RemoveArgs, RpcRequest, RpcResponse, SessionGetRequest, SessionRecord,
    TorrentAddArgs, TorrentAddResponse, TorrentGetRequest, TorrentGetResponse, TorrentRecord,
    TorrentSetArgs, SESSION_FIELDS, TORRENT_FIELDS,
};

const CONFLICT: u16 = 409;

/// Daemon RPC client for one connection.
///
/// Clones share the session token, so concurrent calls made on behalf of
/// the same connection all benefit from a single 409 handshake. A new
/// connection gets a new client and therefore starts with an empty token.
#[derive(Clone)]
pub struct RpcClient<B> {
    backend: B,
    endpoint: Endpoint,
    session_id: Arc<Mutex<String>>,
}

impl<B: HttpBackend> RpcClient<B> {
    pub fn new(backend: B, endpoint: Endpoint) -> Self {
        Self {
            backend,
            endpoint,
            session_id: Arc::new(Mutex::new(String::new())),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The token currently sent with every request.
    pub fn session_id(&self) -> String {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_session_id(&self, token: String) {
        *self.session_id.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Send one RPC call and return its `arguments` object.
    ///
    /// A 409 reply carries the token the daemon expects; it is stored and
    /// the same request is retried exactly once.
    pub async fn send(&self, method: &str, arguments: Option<Value>) -> Result<Value, RpcError> {
        let body = serde_json::to_vec(&RpcRequest { method, arguments })
            .map_err(|e| RpcError::Protocol(e.to_string()))?;

        let mut reply = self.post(&body).await?;
        if reply.status == CONFLICT {
            let token = reply.session_id.take().ok_or_else(|| {
                RpcError::Protocol("409 reply without a session id header".into())
            })?;
            tracing::debug!(method, "session token refreshed, retrying");
            self.set_session_id(token);

            reply = self.post(&body).await?;
            if reply.status == CONFLICT {
                tracing::warn!(method, "daemon rejected the refreshed session token");
                return Err(RpcError::Auth);
            }
        }

        if reply.status != 200 {
            let message = String::from_utf8_lossy(&reply.body).into_owned();
            tracing::warn!(method, status = reply.status, "daemon RPC error");
            return Err(RpcError::Api {
                status: reply.status,
                message,
            });
        }

        let response: RpcResponse = serde_json::from_slice(&reply.body)
            .map_err(|e| RpcError::Protocol(format!("{method}: {e}")))?;
        if response.result != "success" {
            return Err(RpcError::Daemon(response.result));
        }
        Ok(response.arguments)
    }

    async fn post(&self, body: &[u8]) -> Result<HttpReply, RpcError> {
        let request = HttpRequest {
            url: self.endpoint.url().clone(),
            session_id: self.session_id(),
            authorization: self.endpoint.authorization().map(str::to_string),
            body: body.to_vec(),
        };
        self.backend.post(request).await
    }

    async fn call<A, R>(&self, method: &str, arguments: &A) -> Result<R, RpcError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let arguments =
            serde_json::to_value(arguments).map_err(|e| RpcError::Protocol(e.to_string()))?;
        let value = self.send(method, Some(arguments)).await?;
        serde_json::from_value(value).map_err(|e| RpcError::Protocol(format!("{method}: {e}")))
    }

    /// Fetch every torrent (or only `ids`) with the full field list.
    pub async fn torrent_get(&self, ids: Option<&[i64]>) -> Result<Vec<TorrentRecord>, RpcError> {
        let resp: TorrentGetResponse = self
            .call(
                "torrent-get",
                &TorrentGetRequest {
                    fields: TORRENT_FIELDS,
                    ids,
                },
            )
            .await?;
        Ok(resp.torrents)
    }

    pub async fn torrent_start(&self, ids: &[i64]) -> Result<(), RpcError> {
        let _: IgnoredAny = self.call("torrent-start", &IdsArgs { ids }).await?;
        Ok(())
    }

    pub async fn torrent_stop(&self, ids: &[i64]) -> Result<(), RpcError> {
        let _: IgnoredAny = self.call("torrent-stop", &IdsArgs { ids }).await?;
        Ok(())
    }

    pub async fn torrent_remove(&self, ids: &[i64], delete_local_data: bool) -> Result<(), RpcError> {
        let _: IgnoredAny = self
            .call(
                "torrent-remove",
                &RemoveArgs {
                    ids,
                    delete_local_data,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn torrent_set(&self, args: &TorrentSetArgs) -> Result<(), RpcError> {
        let _: IgnoredAny = self.call("torrent-set", args).await?;
        Ok(())
    }

    pub async fn torrent_add(&self, args: &TorrentAddArgs) -> Result<AddedTorrent, RpcError> {
        let resp: TorrentAddResponse = self.call("torrent-add", args).await?;
        resp.into_added()
    }

    pub async fn session_get(&self) -> Result<SessionRecord, RpcError> {
        self.call(
            "session-get",
            &SessionGetRequest {
                fields: SESSION_FIELDS,
            },
        )
        .await
    }

    pub async fn session_set(&self, record: &SessionRecord) -> Result<(), RpcError> {
        let _: IgnoredAny = self.call("session-set", record).await?;
        Ok(())
    }
}
