use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::{self, StreamExt};
use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REPLAYS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS,
};
use crate::session::SessionManager;
use crate::sse::decode_chat_stream;
use crate::token_store::TokenStore;
use crate::types::{
    ChatRequest, ChatResponse, Envelope, Message, Room, RoomId, Upload,
};

/// A stream of answer text fragments, in arrival order.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Client for the DocWeave backend.
///
/// Every call attaches the current bearer token, unwraps the response envelope,
/// and recovers from one expired access token by refreshing and replaying the
/// request once.
#[derive(Clone)]
pub struct DocWeave {
    http: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    session: Arc<SessionManager>,
}

#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(Value),
    File(Upload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accept {
    Json,
    EventStream,
}

/// One logical request; rebuilt for every attempt.
#[derive(Debug, Clone)]
struct ApiRequest {
    method: Method,
    path: String,
    body: Body,
    accept: Accept,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Body::Empty,
            accept: Accept::Json,
        }
    }

    fn json(mut self, value: Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    fn file(mut self, upload: Upload) -> Self {
        self.body = Body::File(upload);
        self
    }

    fn event_stream(mut self) -> Self {
        self.accept = Accept::EventStream;
        self
    }
}

impl DocWeave {
    /// Create a client, loading any persisted session from `store`.
    pub async fn connect(config: &ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let base_url = config.api_url()?;
        let timeout = config.timeout;
        let http = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;
        let session =
            SessionManager::load(http.clone(), base_url.clone(), timeout, store).await?;
        Ok(Self {
            http,
            base_url,
            timeout,
            session: Arc::new(session),
        })
    }

    /// The session this client authenticates with.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// The API root every request path is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// List the user's rooms.
    pub async fn fetch_rooms(&self) -> Result<Vec<Room>> {
        self.call(ApiRequest::new(Method::GET, "doc/rooms")).await
    }

    /// Fetch the full message history of a room.
    pub async fn fetch_messages(&self, room_id: RoomId) -> Result<Vec<Message>> {
        self.call(ApiRequest::new(
            Method::GET,
            format!("doc/rooms/{room_id}/messages"),
        ))
        .await
    }

    /// Upload a document into a new room.
    pub async fn create_room(&self, upload: &Upload) -> Result<Room> {
        self.call(ApiRequest::new(Method::POST, "doc/rooms").file(upload.clone()))
            .await
    }

    /// Add a document to an existing room.
    pub async fn add_file(&self, room_id: RoomId, upload: &Upload) -> Result<()> {
        let _: Value = self
            .call(
                ApiRequest::new(Method::POST, format!("doc/rooms/{room_id}/files"))
                    .file(upload.clone()),
            )
            .await?;
        Ok(())
    }

    /// Ask a question and wait for the complete answer.
    pub async fn send_message(&self, room_id: RoomId, message: &str) -> Result<ChatResponse> {
        self.call(
            ApiRequest::new(Method::POST, format!("doc/rooms/{room_id}/chat"))
                .json(serde_json::to_value(ChatRequest::new(message))?),
        )
        .await
    }

    /// Ask a question and receive the answer as it is generated.
    ///
    /// If the backend answers with a regular JSON envelope instead of an event
    /// stream, the whole answer is yielded as a single fragment.
    pub async fn stream_message(&self, room_id: RoomId, message: &str) -> Result<AnswerStream> {
        let request = ApiRequest::new(Method::POST, format!("doc/rooms/{room_id}/chat"))
            .json(serde_json::to_value(ChatRequest::new(message))?)
            .event_stream();
        let response = self.execute(&request).await?;
        let is_event_stream = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        if response.status().is_success() && is_event_stream {
            return Ok(Box::pin(decode_chat_stream(response.bytes_stream())));
        }
        let answer: ChatResponse = read_envelope(response).await?.into_data()?;
        Ok(Box::pin(stream::once(async move { Ok(answer.answer) })))
    }

    /// Delete a room and its documents.
    pub async fn delete_room(&self, room_id: RoomId) -> Result<()> {
        let _: Value = self
            .call(ApiRequest::new(
                Method::DELETE,
                format!("doc/rooms/{room_id}"),
            ))
            .await?;
        Ok(())
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.execute(&request).await?;
        read_envelope(response).await?.into_data()
    }

    /// Send a request, refreshing and replaying once on 401.
    async fn execute(&self, request: &ApiRequest) -> Result<Response> {
        let (response, token) = self.dispatch(request).await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => {
                CLIENT_REPLAYS.click();
                debug!(path = %request.path, "access token rejected; refreshing");
                if let Err(err) = self.session.refresh_after(token.as_deref()).await {
                    self.session.expire().await;
                    return Err(Error::session_expired(format!(
                        "could not refresh the session: {err}"
                    )));
                }
                let (replayed, _) = self.dispatch(request).await?;
                match replayed.status() {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                        warn!(path = %request.path, status = %replayed.status(), "replay rejected");
                        self.session.expire().await;
                        Err(Error::session_expired(
                            "the refreshed session was rejected",
                        ))
                    }
                    _ => Ok(replayed),
                }
            }
            StatusCode::FORBIDDEN => {
                warn!(path = %request.path, "access revoked");
                self.session.expire().await;
                Err(Error::session_expired("access was revoked"))
            }
            _ => Ok(response),
        }
    }

    /// Send one attempt, returning the response and the token it carried.
    async fn dispatch(&self, request: &ApiRequest) -> Result<(Response, Option<String>)> {
        let url = self.base_url.join(&request.path)?;
        let token = self.session.access_token();

        let mut builder = self.http.request(request.method.clone(), url);
        builder = match request.accept {
            Accept::Json => builder.header(header::ACCEPT, HeaderValue::from_static("application/json")),
            Accept::EventStream => {
                builder.header(header::ACCEPT, HeaderValue::from_static("text/event-stream"))
            }
        };
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::File(upload) => builder.multipart(upload.to_form()?),
        };

        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            transport_error(e, self.timeout)
        })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        debug!(
            method = %request.method,
            path = %request.path,
            status = %response.status(),
            "response"
        );
        Ok((response, token))
    }
}

/// Run `future` unless `token` is cancelled first.
pub async fn cancellable<T, F>(token: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::abort("request cancelled")),
        result = future => result,
    }
}

/// Map a reqwest failure onto the client's error taxonomy.
pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::timeout(
            format!("Request timed out: {e}"),
            Some(timeout.as_secs_f64()),
        )
    } else if e.is_connect() {
        Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
    } else {
        Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
    }
}

/// Read a response body as an envelope, turning HTTP and envelope failures into errors.
pub(crate) async fn read_envelope(response: Response) -> Result<Envelope> {
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        Error::http_client(
            format!("Failed to read response: {e}"),
            Some(Box::new(e)),
        )
    })?;
    match serde_json::from_str::<Envelope>(&body) {
        Ok(envelope) if status.is_success() && envelope.is_success() => Ok(envelope),
        Ok(envelope) => Err(envelope.into_error(status.as_u16())),
        Err(e) if status.is_success() => Err(Error::serialization(
            format!("Failed to parse response envelope: {e}"),
            Some(Box::new(e)),
        )),
        Err(_) => Err(status_error(status, body)),
    }
}

fn status_error(status: StatusCode, body: String) -> Error {
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };
    match status {
        StatusCode::NOT_FOUND => Error::not_found(message, None, None),
        StatusCode::REQUEST_TIMEOUT => Error::timeout(message, None),
        _ => Error::request(status.as_u16(), None, message),
    }
}

/// Drain an answer stream into one string.
pub async fn collect_answer(mut stream: AnswerStream) -> Result<String> {
    let mut answer = String::new();
    while let Some(fragment) = stream.next().await {
        answer.push_str(&fragment?);
    }
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::MemoryTokenStore;

    #[tokio::test]
    async fn client_creation() {
        let config = ClientConfig::new().with_base_url("https://docs.example.com/api");
        let client = DocWeave::connect(&config, Arc::new(MemoryTokenStore::new()))
            .await
            .unwrap();
        assert_eq!(client.base_url().as_str(), "https://docs.example.com/api/");
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn cancelled_request_aborts() {
        let token = CancellationToken::new();
        token.cancel();
        let result = cancellable(&token, std::future::pending::<Result<()>>()).await;
        assert!(result.unwrap_err().is_abort());
    }

    #[tokio::test]
    async fn uncancelled_request_completes() {
        let token = CancellationToken::new();
        let result = cancellable(&token, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn status_errors_map_by_code() {
        assert!(status_error(StatusCode::NOT_FOUND, String::new()).is_not_found());
        assert!(status_error(StatusCode::REQUEST_TIMEOUT, "slow".into()).is_timeout());
        let err = status_error(StatusCode::BAD_GATEWAY, String::new());
        assert_eq!(err.status_code(), Some(502));
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[tokio::test]
    async fn collect_answer_concatenates() {
        let stream: AnswerStream = Box::pin(stream::iter(vec![
            Ok("Hel".to_string()),
            Ok("lo".to_string()),
        ]));
        assert_eq!(collect_answer(stream).await.unwrap(), "Hello");
    }
}
