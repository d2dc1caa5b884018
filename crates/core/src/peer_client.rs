//! RPC client to the `wgctl` data-plane daemon over a local Unix socket,
//! per spec.md §4.C.

use hyper::body::Buf;
use hyper::{Body, Client, Method, Request, StatusCode};
use hyperlocal::{UnixClientExt, UnixConnector, Uri as UnixUri};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum PeerError {
    #[error("failed to send request to wgctl: {0}")]
    Send(#[from] hyper::Error),
    #[error("wgctl returned {0}: {1}")]
    Api(StatusCode, String),
    #[error("failed to decode wgctl response: {0}")]
    Decode(String),
}

pub type PeerResult<T> = Result<T, PeerError>;

#[derive(Serialize)]
struct AddPeerRequest<'a> {
    pubkey: &'a str,
    allowed_ips: &'a str,
}

#[derive(Serialize)]
struct RemovePeerRequest<'a> {
    pubkey: &'a str,
}

#[derive(Deserialize)]
struct PeerActionResponse {
    action: Option<String>,
}

/// A single long-lived client reused across requests, safe for concurrent
/// use — the shared resource called out in spec.md §5.
#[derive(Clone)]
pub struct PeerClient {
    client: Client<UnixConnector>,
    socket_path: String,
    token: String,
}

impl PeerClient {
    pub fn new(socket_path: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::unix(),
            socket_path: socket_path.into(),
            token: token.into(),
        }
    }

    async fn post(&self, path: &str, body: Vec<u8>) -> PeerResult<(StatusCode, Vec<u8>)> {
        let uri: hyper::Uri = UnixUri::new(&self.socket_path, path).into();
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .header("X-WGCTL-Token", &self.token)
            .body(Body::from(body))
            .map_err(|e| PeerError::Decode(e.to_string()))?;

        let resp = self.client.request(req).await?;
        let status = resp.status();
        let aggregated = hyper::body::aggregate(resp.into_body()).await?;
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut aggregated.reader(), &mut buf)
            .map_err(|e| PeerError::Decode(e.to_string()))?;
        Ok((status, buf))
    }

    /// `add_peer(pubkey, allowed_ips)`. Non-2xx is a retriable error — the
    /// caller decides whether/how to retry.
    pub async fn add_peer(&self, pubkey: &str, allowed_ips: &str) -> PeerResult<Option<String>> {
        let payload = serde_json::to_vec(&AddPeerRequest { pubkey, allowed_ips })
            .map_err(|e| PeerError::Decode(e.to_string()))?;
        let (status, body) = self.post("/peer/add", payload).await?;

        if !status.is_success() {
            return Err(PeerError::Api(status, String::from_utf8_lossy(&body).into_owned()));
        }

        let parsed: PeerActionResponse =
            serde_json::from_slice(&body).map_err(|e| PeerError::Decode(e.to_string()))?;
        Ok(parsed.action)
    }

    /// `remove_peer(pubkey)`. Idempotent: a 404-class response counts as
    /// success, since the daemon having already forgotten the peer is the
    /// desired end state.
    pub async fn remove_peer(&self, pubkey: &str) -> PeerResult<()> {
        let payload = serde_json::to_vec(&RemovePeerRequest { pubkey })
            .map_err(|e| PeerError::Decode(e.to_string()))?;
        let (status, body) = self.post("/peer/remove", payload).await?;

        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(PeerError::Api(status, String::from_utf8_lossy(&body).into_owned()))
    }
}
