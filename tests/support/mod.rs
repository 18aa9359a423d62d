// Scripted HTTP server shared by the integration tests.
#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex, mpsc},
    thread,
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header::CONTENT_TYPE},
    response::IntoResponse,
};
use coderr_client::{ApiClient, ClientConfig, MemoryStore, Session};
use tokio::{io::AsyncReadExt, net::TcpListener};

// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    // Header lookup is case-insensitive, like HTTP.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Reply { status: u16, body: String },
    // Accept the connection, read from it, then close it without answering.
    HangUp,
}

#[derive(Clone)]
struct Scripted {
    status: StatusCode,
    body: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct TestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl TestServer {
    // Answer every request with `status` and `body`.
    pub fn reply(status: u16, body: &str) -> Self {
        Self::start(Behavior::Reply {
            status,
            body: body.to_owned(),
        })
    }

    pub fn start(behavior: Behavior) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let (addr_tx, addr_rx) = mpsc::channel();

        // The server thread owns its own Tokio runtime and lives until the
        // test binary exits.
        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                addr_tx.send(addr).expect("publish test server address");

                match behavior {
                    Behavior::Reply { status, body } => {
                        let state = Scripted {
                            status: StatusCode::from_u16(status).expect("valid status"),
                            body,
                            requests: recorded,
                        };
                        let app = Router::new().fallback(record).with_state(state);
                        axum::serve(listener, app).await.expect("test server failed");
                    }
                    Behavior::HangUp => hang_up(listener).await,
                }
            });
        });

        let addr = addr_rx.recv().expect("test server address");
        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn api_base_url(&self) -> String {
        format!("{}/api/", self.base_url)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request log").clone()
    }

    pub fn only_request(&self) -> RecordedRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request: {requests:?}");
        requests.into_iter().next().expect("one request")
    }

    pub fn client(&self, session: Session) -> ApiClient {
        client_for(&self.api_base_url(), session)
    }
}

pub fn client_for(api_base_url: &str, session: Session) -> ApiClient {
    let mut config = ClientConfig::default()
        .with_api_base_url(api_base_url)
        .with_frontend_base_url("http://front.test/coderr/");
    config.no_proxy = true;
    ApiClient::new(config, session).expect("build client")
}

pub fn anonymous() -> Session {
    Session::new(MemoryStore::new())
}

// A base URL on a port nothing listens on.
pub fn unreachable_api_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    drop(listener);
    format!("http://{addr}/api/")
}

// The request is logged before answering so the client never sees a
// response whose request is not yet recorded.
async fn record(
    State(state): State<Scripted>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_owned(), |pq| pq.as_str().to_owned());
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    state.requests.lock().expect("request log").push(RecordedRequest {
        method: method.to_string(),
        path,
        headers,
        body: body.to_vec(),
    });

    (state.status, [(CONTENT_TYPE, "application/json")], state.body)
}

async fn hang_up(listener: TcpListener) {
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            continue;
        };
        let mut buf = [0; 4096];
        let _ = stream.read(&mut buf).await;
    }
}
