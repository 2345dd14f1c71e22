//! HTTP-mode tests against a minimal in-process GraphQL endpoint.
//!
//! The server accepts exactly one request, asserts what the client sent
//! (path, bearer token, operation name), and replies with a canned body.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use serde_json::{json, Value};

use tally_client::{ClientMode, ServiceClient};
use tally_engine::{EntityKind, EntityRef, ReadError, RemoteReader, RemoteWriter, WriteError};

struct OneShotServer {
    base_url: String,
    handle: JoinHandle<String>,
}

/// Serve one request; returns the request body to the joining test.
fn serve_one(
    status_line: &'static str,
    body: &'static str,
    expect_bearer: Option<&'static str>,
) -> OneShotServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();

        let mut buf = Vec::new();
        let mut header_end = None;
        while header_end.is_none() {
            let mut tmp = [0u8; 1024];
            let n = stream.read(&mut tmp).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(i) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                header_end = Some(i + 4);
            }
        }

        let header_end = header_end.expect("full request headers");
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        assert!(headers.starts_with("post /api/graphql"));
        if let Some(token) = expect_bearer {
            assert!(
                headers.contains(&format!("authorization: bearer {token}")),
                "missing bearer in {headers}"
            );
        }

        let content_length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length: "))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let mut body_buf = buf[header_end..].to_vec();
        while body_buf.len() < content_length {
            let mut tmp = vec![0u8; content_length - body_buf.len()];
            let n = stream.read(&mut tmp).unwrap();
            if n == 0 {
                break;
            }
            body_buf.extend_from_slice(&tmp[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();

        String::from_utf8_lossy(&body_buf[..content_length]).to_string()
    });

    OneShotServer {
        base_url: format!("http://{addr}"),
        handle,
    }
}

fn http_client(base_url: String, token: Option<&str>) -> ServiceClient {
    ServiceClient::new(ClientMode::Http {
        base_url,
        token: token.map(String::from),
    })
}

fn txn(id: &str) -> EntityRef {
    EntityRef::new(EntityKind::Transaction, id)
}

#[test]
fn read_fields_sends_bearer_and_maps_wire_names() {
    let server = serve_one(
        "200 OK",
        r#"{"data":{"transaction":{"id":"t1","isReviewed":true,"categoryId":"c9","notes":null}}}"#,
        Some("tok123"),
    );
    let client = http_client(server.base_url.clone(), Some("tok123"));

    let values = client
        .read_fields(&txn("t1"), &["reviewed", "category_id", "notes"])
        .unwrap();
    assert_eq!(values["reviewed"], json!(true));
    assert_eq!(values["category_id"], json!("c9"));
    assert_eq!(values["notes"], Value::Null);

    let request: Value = serde_json::from_str(&server.handle.join().unwrap()).unwrap();
    assert_eq!(request["operationName"], json!("TransactionById"));
    assert_eq!(request["variables"]["id"], json!("t1"));
}

#[test]
fn null_entity_maps_to_not_found() {
    let server = serve_one("200 OK", r#"{"data":{"transaction":null}}"#, None);
    let client = http_client(server.base_url.clone(), None);

    assert!(matches!(
        client.read_fields(&txn("gone"), &["reviewed"]),
        Err(ReadError::NotFound { .. })
    ));
    server.handle.join().unwrap();
}

#[test]
fn graphql_errors_surface_with_extension_code() {
    let server = serve_one(
        "200 OK",
        r#"{"errors":[{"extensions":{"code":"BAD_USER_INPUT"},"message":"Value does not exist"}]}"#,
        None,
    );
    let client = http_client(server.base_url.clone(), None);

    match client.read_fields(&txn("t1"), &["reviewed"]) {
        Err(ReadError::Transport { detail, .. }) => {
            assert!(detail.contains("BAD_USER_INPUT"), "{detail}");
            assert!(detail.contains("Value does not exist"), "{detail}");
        }
        other => panic!("expected Transport, got {other:?}"),
    }
    server.handle.join().unwrap();
}

#[test]
fn http_status_error_is_transport_not_panic() {
    let server = serve_one("401 Unauthorized", r#"{"data":null}"#, None);
    let client = http_client(server.base_url.clone(), None);

    assert!(matches!(
        client.read_fields(&txn("t1"), &["reviewed"]),
        Err(ReadError::Transport { .. })
    ));
    server.handle.join().unwrap();
}

#[test]
fn write_fields_posts_camel_case_input() {
    let server = serve_one(
        "200 OK",
        r#"{"data":{"editTransaction":{"id":"t1"}}}"#,
        Some("tok123"),
    );
    let client = http_client(server.base_url.clone(), Some("tok123"));

    client
        .write_fields(
            &txn("t1"),
            &BTreeMap::from([
                ("reviewed".to_string(), json!(true)),
                ("category_id".to_string(), json!("c2")),
            ]),
        )
        .unwrap();

    let request: Value = serde_json::from_str(&server.handle.join().unwrap()).unwrap();
    assert_eq!(request["operationName"], json!("EditTransaction"));
    assert_eq!(request["variables"]["input"]["isReviewed"], json!(true));
    assert_eq!(request["variables"]["input"]["categoryId"], json!("c2"));
}

#[test]
fn failed_write_attributes_the_entity() {
    let server = serve_one(
        "200 OK",
        r#"{"errors":[{"message":"write rejected"}]}"#,
        None,
    );
    let client = http_client(server.base_url.clone(), None);

    match client.write_fields(&txn("t7"), &BTreeMap::from([("reviewed".to_string(), json!(true))]))
    {
        Err(WriteError::Transport { entity, detail }) => {
            assert_eq!(entity, txn("t7"));
            assert!(detail.contains("write rejected"), "{detail}");
        }
        other => panic!("expected Transport, got {other:?}"),
    }
    server.handle.join().unwrap();
}
