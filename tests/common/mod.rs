//! In-process HTTP stub for the API tests: an axum router on its own tokio
//! runtime that answers with canned responses in order and records what the
//! client sent.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::TcpListener as StdTcpListener;
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Path plus query string, e.g. `/api/v1/code/history?page=2`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

struct StubState {
    responses: Mutex<VecDeque<(u16, String)>>,
    delay: Duration,
    captured: Mutex<Vec<CapturedRequest>>,
}

pub struct StubServer {
    pub url: String,
    state: Arc<StubState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StubServer {
    /// Stop the server and return the captured requests.
    pub fn finish(mut self) -> Vec<CapturedRequest> {
        self.stop();
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
        std::mem::take(&mut *self.state.captured.lock().unwrap())
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Serve `responses` in order, one per request. Extra requests get a 500.
pub fn serve(responses: Vec<(u16, &str)>) -> StubServer {
    spawn(responses, Duration::ZERO)
}

/// Like [`serve`], but every response is held back for `delay`.
pub fn serve_delayed(delay: Duration, responses: Vec<(u16, &str)>) -> StubServer {
    spawn(responses, delay)
}

/// URL of a port with nothing listening on it.
pub fn refused_url() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn spawn(responses: Vec<(u16, &str)>, delay: Duration) -> StubServer {
    let state = Arc::new(StubState {
        responses: Mutex::new(
            responses
                .into_iter()
                .map(|(status, body)| (status, body.to_string()))
                .collect(),
        ),
        delay,
        captured: Mutex::new(Vec::new()),
    });

    let (addr_tx, addr_rx) = mpsc::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = Router::new().fallback(respond).with_state(state.clone());

    let handle = thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            addr_tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });
    });

    let addr = addr_rx.recv().unwrap();
    StubServer {
        url: format!("http://{addr}"),
        state,
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    }
}

async fn respond(
    State(state): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.captured.lock().unwrap().push(CapturedRequest {
        method: method.to_string(),
        path: uri.to_string(),
        headers,
        body,
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    let next = state.responses.lock().unwrap().pop_front();
    let (status, body) =
        next.unwrap_or((500, r#"{"detail": "no canned response left"}"#.to_string()));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONNECTION, "close"),
        ],
        body,
    )
        .into_response()
}
