//! JSON-RPC transport for a remote Transmission-style torrent daemon.
//!
//! [`RpcClient`] owns one connection's session token and performs the
//! 409 handshake; the actual bytes go through an [`HttpBackend`].

pub mod backend;
pub mod client;
pub mod endpoint;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use backend::{HttpBackend, HttpReply, HttpRequest, ReqwestBackend, SESSION_ID_HEADER};
pub use client::RpcClient;
pub use endpoint::{Credentials, Endpoint};
pub use error::RpcError;
