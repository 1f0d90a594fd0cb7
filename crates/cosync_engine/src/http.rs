//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted behind a trait so any library
//! (reqwest, ureq, hyper) can carry the bytes. Request and response bodies
//! are JSON.

use crate::error::{EngineError, EngineResult};
use crate::transport::CommitTransport;
use cosync_protocol::{
    Algebra, CommitRequest, CommitResponse, CreateRequest, CreateResponse, DocumentId,
    JoinResponse, StatRequest, StatResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// HTTP client abstraction.
///
/// Implementations send a POST with a JSON body and return the response
/// body. A transport-level failure (connect, timeout) is an `Err`; the
/// session treats it as retryable.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;
}

/// HTTP-based commit transport.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport against `base_url`, e.g. `https://sync.example.com`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// The server this transport talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn exchange<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        request: &Req,
    ) -> EngineResult<Resp> {
        let body = serde_json::to_vec(request)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url, body)
            .map_err(EngineError::transport_retryable)?;
        serde_json::from_slice(&response).map_err(|e| EngineError::Serialization(e.to_string()))
    }
}

impl<A, C> CommitTransport<A> for HttpTransport<C>
where
    A: Algebra,
    A::Data: Serialize + DeserializeOwned,
    A::Edit: Serialize + DeserializeOwned,
    C: HttpClient,
{
    fn create(
        &self,
        request: CreateRequest<A::Data>,
    ) -> EngineResult<CreateResponse<A::Data, A::Edit>> {
        self.exchange("/create", &request)
    }

    fn join(&self, document_id: &DocumentId) -> EngineResult<JoinResponse<A::Data, A::Edit>> {
        self.exchange(&format!("/document/{}", document_id.as_str()), &())
    }

    fn commit(&self, request: &CommitRequest<A::Edit>) -> EngineResult<CommitResponse<A::Edit>> {
        self.exchange("/commit", request)
    }

    fn stat(&self, request: &StatRequest) -> EngineResult<StatResponse<A::Data>> {
        self.exchange("/stat", request)
    }
}
