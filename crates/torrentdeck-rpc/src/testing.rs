//! Scripted [`HttpBackend`] for exercising the transport and engine
//! without a daemon.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::backend::{HttpBackend, HttpReply, HttpRequest};
use crate::error::RpcError;
use crate::types::TorrentRecord;

/// A request as the scripted backend saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub session_id: String,
    pub authorization: Option<String>,
    pub method: String,
    pub arguments: Value,
}

type Responder = dyn Fn(&RecordedRequest) -> Result<HttpReply, RpcError> + Send + Sync;

/// Records every request and answers through a caller-supplied closure.
///
/// A gated backend parks each request until [`ScriptedBackend::release`]
/// hands out a permit, which lets tests hold a poll cycle open.
#[derive(Clone)]
pub struct ScriptedBackend {
    inner: Arc<Inner>,
}

struct Inner {
    responder: Box<Responder>,
    calls: Mutex<Vec<RecordedRequest>>,
    gate: Option<Semaphore>,
}

impl ScriptedBackend {
    pub fn new(
        responder: impl Fn(&RecordedRequest) -> Result<HttpReply, RpcError> + Send + Sync + 'static,
    ) -> Self {
        Self::build(Box::new(responder), None)
    }

    pub fn gated(
        responder: impl Fn(&RecordedRequest) -> Result<HttpReply, RpcError> + Send + Sync + 'static,
    ) -> Self {
        Self::build(Box::new(responder), Some(Semaphore::new(0)))
    }

    fn build(responder: Box<Responder>, gate: Option<Semaphore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                responder,
                calls: Mutex::new(Vec::new()),
                gate,
            }),
        }
    }

    /// Let `permits` parked requests through. No-op on an ungated backend.
    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.inner.gate {
            gate.add_permits(permits);
        }
    }

    pub fn calls(&self) -> Vec<RecordedRequest> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_for(&self, method: &str) -> Vec<RecordedRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl HttpBackend for ScriptedBackend {
    async fn post(&self, request: HttpRequest) -> Result<HttpReply, RpcError> {
        let envelope: Value = serde_json::from_slice(&request.body)
            .map_err(|e| RpcError::Protocol(e.to_string()))?;
        let recorded = RecordedRequest {
            url: request.url.to_string(),
            session_id: request.session_id,
            authorization: request.authorization,
            method: envelope["method"].as_str().unwrap_or_default().to_string(),
            arguments: envelope.get("arguments").cloned().unwrap_or(Value::Null),
        };
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(recorded.clone());

        if let Some(gate) = &self.inner.gate {
            gate.acquire()
                .await
                .map_err(|e| RpcError::Transport(e.to_string()))?
                .forget();
        }

        (self.inner.responder)(&recorded)
    }
}

/// A 200 reply with `result: success` and the given arguments.
pub fn success(arguments: Value) -> Result<HttpReply, RpcError> {
    Ok(HttpReply::json(
        200,
        &json!({ "result": "success", "arguments": arguments }),
    ))
}

/// A fully populated `torrent-get` record with three files.
pub fn torrent_json(id: i64, queue_position: i64) -> Value {
    json!({
        "id": id,
        "name": format!("torrent-{id}"),
        "status": 4,
        "error": 0,
        "errorString": "",
        "totalSize": 1000,
        "eta": 60,
        "isFinished": false,
        "peersGettingFromUs": 1,
        "peersSendingToUs": 3,
        "rateDownload": 2048,
        "rateUpload": 512,
        "percentComplete": 0.5,
        "queuePosition": queue_position,
        "downloadDir": "/downloads",
        "uploadRatio": 0.25,
        "files": [
            { "name": "a.mkv", "length": 600, "bytesCompleted": 300 },
            { "name": "b.mkv", "length": 300, "bytesCompleted": 150 },
            { "name": "c.nfo", "length": 100, "bytesCompleted": 50 }
        ],
        "wanted": [0, 1, 1],
        "priorities": [-1, 0, 1],
        "peer-limit": 50,
        "downloadLimit": 100,
        "downloadLimited": false,
        "uploadLimit": 100,
        "uploadLimited": false,
        "honorsSessionLimits": true,
        "seedIdleLimit": 30,
        "seedIdleMode": 0,
        "seedRatioLimit": 2.0,
        "seedRatioMode": 0
    })
}

/// A complete `session-get` arguments object.
pub fn session_json() -> Value {
    json!({
        "download-dir": "/downloads",
        "incomplete-dir": "/incomplete",
        "incomplete-dir-enabled": false,
        "rename-partial-files": true,
        "peer-limit-global": 200,
        "peer-limit-per-torrent": 50,
        "speed-limit-down-enabled": false,
        "speed-limit-down": 100,
        "speed-limit-up-enabled": false,
        "speed-limit-up": 100,
        "alt-speed-down": 50,
        "alt-speed-up": 50,
        "alt-speed-enabled": false,
        "download-queue-size": 5,
        "download-queue-enabled": true
    })
}

/// [`torrent_json`] decoded into the wire record.
pub fn torrent_record(id: i64, queue_position: i64) -> TorrentRecord {
    serde_json::from_value(torrent_json(id, queue_position)).expect("fixture matches TorrentRecord")
}
