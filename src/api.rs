//! Request normalizer for the Coderr REST API.
//!
//! Every verb helper reduces its exchange to an [`Outcome`]. Transport and
//! parse problems become [`Outcome::Failure`]; any HTTP response with a JSON
//! body, 4xx and 5xx included, becomes [`Outcome::Response`] and callers
//! branch on [`Outcome::ok`] themselves.

use derive_more::Display;
use reqwest::{
    Method, StatusCode,
    blocking::{Client, RequestBuilder},
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde::{Serialize, Serializer};
use serde_json::{Value, json};

use crate::{config::ClientConfig, form::FormData, session::Session};

/// Why no usable response was obtained.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    #[display("Failed to connect to the server.")]
    Connect,
    #[display("Response was not valid JSON.")]
    InvalidJson,
    #[display("There was an issue with the request or network connection.")]
    Request,
    #[display("Network error")]
    Network,
}

impl FailureKind {
    /// Anything that stopped the request from reaching the server or its
    /// reply from arriving counts as a connection failure. Only a request
    /// that could not be built or followed is a request failure.
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
            Self::Connect
        } else if err.is_decode() {
            Self::InvalidJson
        } else if err.is_builder() || err.is_redirect() {
            Self::Request
        } else {
            Self::Network
        }
    }
}

/// The normalized result of one API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Response { status: StatusCode, data: Value },
    Failure { kind: FailureKind },
}

impl Outcome {
    /// `true` only for a response with a 2xx status.
    pub fn ok(&self) -> bool {
        match self {
            Self::Response { status, .. } => status.is_success(),
            Self::Failure { .. } => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Failure { .. } => None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Response { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<String> {
        match self {
            Self::Response { .. } => None,
            Self::Failure { kind } => Some(kind.to_string()),
        }
    }

    /// The `{ok, status, data}` / `{ok, status: "error", message}` shape.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Response { status, data } => json!({
                "ok": self.ok(),
                "status": status.as_u16(),
                "data": data,
            }),
            Self::Failure { kind } => json!({
                "ok": false,
                "status": "error",
                "message": kind.to_string(),
            }),
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Headers carrying the stored token, or none when logged out.
pub fn create_headers(session: &Session) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(token) = session.token() {
        match HeaderValue::from_str(&format!("Token {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => {
                tracing::warn!("Stored token is not a valid header value, sending request without it");
            }
        }
    }
    headers
}

#[derive(Clone, Copy)]
enum Auth {
    Attach,
    Omit,
}

#[derive(Clone, Copy)]
enum ReadBody {
    Json,
    Ignore,
}

/// Thin wrapper around a blocking reqwest client bound to one API base URL.
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
    session: Session,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Session) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if config.no_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;
        tracing::debug!("Base API URL: {}", config.api_base_url);
        Ok(Self {
            http,
            config,
            session,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Plain concatenation; the endpoint is not validated or encoded.
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.config.api_base_url)
    }

    pub fn get(&self, endpoint: &str) -> Outcome {
        let req = self.request(Method::GET, endpoint, Auth::Attach);
        Self::dispatch(req, ReadBody::Json)
    }

    /// GET without the stored token, used before an account is usable.
    pub fn get_anonymous(&self, endpoint: &str) -> Outcome {
        let req = self
            .request(Method::GET, endpoint, Auth::Omit)
            .header(CONTENT_TYPE, "application/json");
        Self::dispatch(req, ReadBody::Json)
    }

    /// JSON POST without the stored token, for login and registration.
    pub fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Outcome {
        let req = Self::json_body(self.request(Method::POST, endpoint, Auth::Omit), body);
        Self::dispatch(req, ReadBody::Json)
    }

    pub fn post_authenticated<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Outcome {
        let req = Self::json_body(self.request(Method::POST, endpoint, Auth::Attach), body);
        Self::dispatch(req, ReadBody::Json)
    }

    pub fn patch_json<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Outcome {
        let req = Self::json_body(self.request(Method::PATCH, endpoint, Auth::Attach), body);
        Self::dispatch(req, ReadBody::Json)
    }

    /// Multipart PATCH. No content type is set here so the multipart
    /// boundary is filled in by the form encoder.
    pub fn patch_multipart(&self, endpoint: &str, form: FormData) -> Outcome {
        let req = self
            .request(Method::PATCH, endpoint, Auth::Attach)
            .multipart(form.into_multipart());
        Self::dispatch(req, ReadBody::Json)
    }

    /// DELETE; the response body is not read and `data` is always `{}`.
    pub fn delete(&self, endpoint: &str) -> Outcome {
        let req = self.request(Method::DELETE, endpoint, Auth::Attach);
        Self::dispatch(req, ReadBody::Ignore)
    }

    fn request(&self, method: Method, endpoint: &str, auth: Auth) -> RequestBuilder {
        let url = self.url(endpoint);
        tracing::debug!("{method} {url}");
        let headers = match auth {
            Auth::Attach => create_headers(&self.session),
            Auth::Omit => HeaderMap::new(),
        };
        self.http.request(method, url).headers(headers)
    }

    fn json_body<B: Serialize + ?Sized>(req: RequestBuilder, body: &B) -> RequestBuilder {
        req.header(CONTENT_TYPE, "application/json").json(body)
    }

    fn dispatch(req: RequestBuilder, read: ReadBody) -> Outcome {
        let response = match req.send() {
            Ok(response) => response,
            Err(err) => return Self::failed(&err),
        };
        let status = response.status();
        tracing::debug!("Response status: {status}");

        let data = match read {
            ReadBody::Ignore => json!({}),
            ReadBody::Json => {
                let text = match response.text() {
                    Ok(text) => text,
                    Err(err) => return Self::failed(&err),
                };
                match serde_json::from_str(&text) {
                    Ok(data) => data,
                    Err(err) => {
                        tracing::warn!("Response body is not JSON: {err}");
                        return Outcome::Failure {
                            kind: FailureKind::InvalidJson,
                        };
                    }
                }
            }
        };
        Outcome::Response { status, data }
    }

    fn failed(err: &reqwest::Error) -> Outcome {
        let kind = FailureKind::classify(err);
        tracing::warn!("Request failed: {err}");
        Outcome::Failure { kind }
    }
}
