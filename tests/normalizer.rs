mod support;

use coderr_client::{
    FailureKind, MemoryStore, Outcome, Session,
    form::{FilePart, FormData, FormInput},
    session::{AuthToken, CredentialRecord},
};
use reqwest::StatusCode;
use serde_json::json;

use support::{Behavior, TestServer, anonymous, client_for, unreachable_api_base_url};

fn logged_in() -> Session {
    let mut session = Session::new(MemoryStore::new());
    session
        .set_credentials(&CredentialRecord {
            token: AuthToken::new("abc123"),
            username: "andrey".into(),
            user_id: "1".into(),
        })
        .expect("store credentials");
    session
}

#[test]
fn get_returns_status_and_parsed_body() {
    let server = TestServer::reply(200, r#"{"results": [], "count": 0}"#);
    let client = server.client(anonymous());

    let outcome = client.get("offers/?page=1");

    assert!(outcome.ok());
    assert_eq!(outcome.status(), Some(StatusCode::OK));
    assert_eq!(outcome.data(), Some(&json!({"results": [], "count": 0})));

    let request = server.only_request();
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/api/offers/?page=1");
}

#[test]
fn error_status_is_passed_through_as_response() {
    let server = TestServer::reply(404, r#"{"detail": "Not found."}"#);
    let client = server.client(anonymous());

    let outcome = client.get("offers/999/");

    assert!(!outcome.ok());
    assert_eq!(
        outcome,
        Outcome::Response {
            status: StatusCode::NOT_FOUND,
            data: json!({"detail": "Not found."}),
        }
    );
}

#[test]
fn authenticated_calls_carry_token() {
    let server = TestServer::reply(200, "{}");
    let client = server.client(logged_in());

    client.get("profile/1/");
    client.post_authenticated("orders/", &json!({"offer_detail_id": 3}));
    client.patch_json("orders/1/", &json!({"status": "completed"}));
    client.patch_multipart("profile/1/", FormData::flatten(&json!({"location": "Berlin"}).into()));
    client.delete("orders/1/");

    let requests = server.requests();
    assert_eq!(requests.len(), 5);
    for request in &requests {
        assert_eq!(
            request.header("authorization"),
            Some("Token abc123"),
            "{} {}",
            request.method,
            request.path
        );
    }
}

#[test]
fn anonymous_calls_omit_authorization() {
    let server = TestServer::reply(200, "{}");
    let client = server.client(anonymous());

    client.get("offers/");
    client.delete("offers/1/");

    for request in server.requests() {
        assert_eq!(request.header("authorization"), None);
    }
}

#[test]
fn plain_post_never_sends_token() {
    let server = TestServer::reply(201, r#"{"token": "t"}"#);
    let client = server.client(logged_in());

    let outcome = client.post("login/", &json!({"username": "andrey", "password": "asdasd"}));

    assert_eq!(outcome.status(), Some(StatusCode::CREATED));
    let request = server.only_request();
    assert_eq!(request.method, "POST");
    assert_eq!(request.header("authorization"), None);
    assert_eq!(request.header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&request.body).expect("json body");
    assert_eq!(body, json!({"username": "andrey", "password": "asdasd"}));
}

#[test]
fn json_patch_sets_json_content_type() {
    let server = TestServer::reply(200, "{}");
    let client = server.client(logged_in());

    client.patch_json("offers/4/", &json!({"title": "New"}));

    let request = server.only_request();
    assert_eq!(request.method, "PATCH");
    assert_eq!(request.header("content-type"), Some("application/json"));
}

#[test]
fn multipart_patch_sends_flattened_fields() {
    let server = TestServer::reply(200, r#"{"id": 1}"#);
    let client = server.client(logged_in());

    let input = FormInput::Map(vec![
        ("a".into(), FormInput::from(json!(1))),
        ("b".into(), FormInput::from(json!({"c": 2, "d": 3}))),
        (
            "file".into(),
            FormInput::File(FilePart::new("avatar.png", b"PNGDATA".to_vec()).with_mime("image/png")),
        ),
    ]);
    let outcome = client.patch_multipart("profile/1/", FormData::flatten(&input));
    assert!(outcome.ok());

    let request = server.only_request();
    let content_type = request.header("content-type").expect("content type");
    assert!(content_type.starts_with("multipart/form-data; boundary="), "{content_type}");

    let body = request.body_text();
    assert!(body.contains(r#"name="a""#));
    assert!(body.contains(r#"name="b[c]""#));
    assert!(body.contains(r#"name="b[d]""#));
    assert!(body.contains(r#"name="file"; filename="avatar.png""#));
    assert!(body.contains("PNGDATA"));
}

#[test]
fn delete_ignores_response_body() {
    let server = TestServer::reply(204, "");
    let client = server.client(logged_in());

    let outcome = client.delete("offers/1/");

    assert_eq!(
        outcome,
        Outcome::Response {
            status: StatusCode::NO_CONTENT,
            data: json!({}),
        }
    );
    assert_eq!(server.only_request().method, "DELETE");
}

#[test]
fn unreachable_server_is_connect_failure() {
    let client = client_for(&unreachable_api_base_url(), logged_in());

    let outcome = client.get("offers/");

    assert!(!outcome.ok());
    assert_eq!(
        outcome.to_json(),
        json!({"ok": false, "status": "error", "message": "Failed to connect to the server."})
    );
}

#[test]
fn every_verb_reports_connect_failure() {
    let client = client_for(&unreachable_api_base_url(), anonymous());
    let body = json!({"x": 1});

    let outcomes = [
        client.get("a/"),
        client.get_anonymous("a/"),
        client.post("a/", &body),
        client.post_authenticated("a/", &body),
        client.patch_json("a/", &body),
        client.patch_multipart("a/", FormData::flatten(&body.clone().into())),
        client.delete("a/"),
    ];
    for outcome in outcomes {
        assert_eq!(
            outcome,
            Outcome::Failure {
                kind: FailureKind::Connect
            }
        );
    }
}

#[test]
fn non_json_body_is_parse_failure() {
    let server = TestServer::reply(200, "<html>gateway</html>");
    let client = server.client(anonymous());

    let outcome = client.get("offers/");

    assert_eq!(outcome.message().as_deref(), Some("Response was not valid JSON."));
    assert_eq!(outcome.to_json()["status"], "error");
}

#[test]
fn dropped_connection_is_connect_failure() {
    let server = TestServer::start(Behavior::HangUp);
    let client = server.client(anonymous());

    let outcome = client.get("offers/");

    assert_eq!(
        outcome,
        Outcome::Failure {
            kind: FailureKind::Connect
        }
    );
    assert_eq!(outcome.message().as_deref(), Some("Failed to connect to the server."));
    assert!(server.requests().is_empty());
}
