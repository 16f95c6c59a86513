use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

use taskdesk::api::{ActionTransport, HttpClient, TaskReader};
use taskdesk::error::ErrorKind;
use taskdesk::workflow::{ActionKind, ActionRequest};

#[derive(Debug)]
struct Captured {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

/// Serves one canned `(status, body)` per connection, in order.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let port = listener.local_addr().expect("local addr").port();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for (status, body) in responses {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

            let mut request_line = String::new();
            reader.read_line(&mut request_line).expect("request line");
            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("header line");
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((k, v)) = line.split_once(':') {
                    headers.push((k.trim().to_string(), v.trim().to_string()));
                }
            }
            let len = headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(0);
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).expect("request body");

            let mut stream = stream;
            let reply = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(reply.as_bytes()).expect("write reply");
            stream.flush().ok();

            tx.send(Captured {
                request_line: request_line.trim_end().to_string(),
                headers,
                body: String::from_utf8_lossy(&buf).into_owned(),
            })
            .ok();
        }
    });
    (format!("http://127.0.0.1:{port}/api/v2/"), rx)
}

fn client(base: &str) -> HttpClient {
    HttpClient::new(base, "secret-token".into(), Duration::from_secs(5))
        .unwrap()
        .with_locale("pt-BR")
}

fn recv(rx: &mpsc::Receiver<Captured>) -> Captured {
    rx.recv_timeout(Duration::from_secs(5)).expect("server saw a request")
}

#[test]
fn split_posts_with_bearer_token() {
    let (base, rx) = serve(vec![(200, r#"{"taskId": 4}"#)]);
    let req = ActionRequest::new(ActionKind::Split, ActionKind::Split.path(9, 4), None);

    let res = client(&base).post_action(&req).unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body, Some(json!({"taskId": 4})));

    let got = recv(&rx);
    assert_eq!(got.request_line, "POST /api/v2/projects/9/tasks/actions/split/4/ HTTP/1.1");
    assert_eq!(got.header("authorization"), Some("Bearer secret-token"));
    assert_eq!(got.header("accept-language"), Some("pt-BR"));
}

#[test]
fn unlock_after_mapping_sends_json_body() {
    let (base, rx) = serve(vec![(200, "{}")]);
    let req = ActionRequest::new(
        ActionKind::UnlockAfterMapping,
        ActionKind::UnlockAfterMapping.path(9, 4),
        Some(json!({"comment": "done", "status": "MAPPED"})),
    );

    client(&base).post_action(&req).unwrap();

    let got = recv(&rx);
    assert!(got.request_line.starts_with("POST /api/v2/projects/9/tasks/actions/unlock-after-mapping/4/ "));
    assert!(got.header("content-type").unwrap_or_default().starts_with("application/json"));
    assert_eq!(got.json(), json!({"comment": "done", "status": "MAPPED"}));
}

#[test]
fn rejected_action_surfaces_backend_error() {
    let (base, rx) = serve(vec![(
        409,
        r#"{"Error": "Task is locked by another user", "SubCode": "LockedByOther"}"#,
    )]);
    let req = ActionRequest::new(
        ActionKind::StopValidation,
        ActionKind::StopValidation.path(9, 4),
        Some(json!({"resetTasks": [{"taskId": 4, "comment": ""}]})),
    );

    let err = client(&base).post_action(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Status(409));
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("Task is locked by another user"), "unexpected err: {err}");
    recv(&rx);
}

#[test]
fn server_errors_are_retryable() {
    let (base, rx) = serve(vec![(503, "")]);
    let req = ActionRequest::new(ActionKind::Split, ActionKind::Split.path(1, 1), None);
    let err = client(&base).post_action(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Status(503));
    assert!(err.is_retryable());
    recv(&rx);
}

#[test]
fn unreachable_backend_is_a_network_error() {
    let port = TcpListener::bind("127.0.0.1:0")
        .expect("bind free port")
        .local_addr()
        .expect("local addr")
        .port();
    let c = client(&format!("http://127.0.0.1:{port}/api/v2/"));
    let req = ActionRequest::new(ActionKind::Split, ActionKind::Split.path(1, 1), None);
    let err = c.post_action(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

#[test]
fn task_detail_and_user_search_read_the_api() {
    let (base, rx) = serve(vec![
        (
            200,
            r#"{"taskId": 4, "taskStatus": "LOCKED_FOR_MAPPING",
                "lastUpdated": "2024-05-01T12:00:00.000000", "autoUnlockSeconds": 7200,
                "taskHistory": [{"historyId": 1, "action": "LOCKED_FOR_MAPPING",
                                 "actionText": "00:05:00", "actionDate": "2024-05-01T12:00:00Z",
                                 "actionBy": "mapper"}]}"#,
        ),
        (200, r#"{"pagination": {}, "usernames": ["mapper", "mapper_2"]}"#),
    ]);
    let c = client(&base);

    let detail = c.task_detail(9, 4).unwrap();
    assert_eq!(detail.task_history.len(), 1);
    assert_eq!(detail.active().unwrap().auto_unlock_seconds, 7200);
    let got = recv(&rx);
    assert_eq!(got.request_line, "GET /api/v2/projects/9/tasks/4/ HTTP/1.1");
    assert_eq!(got.header("authorization"), Some("Bearer secret-token"));

    let users = c.search_users("map", 9).unwrap();
    assert_eq!(users, vec!["mapper", "mapper_2"]);
    let got = recv(&rx);
    assert_eq!(
        got.request_line,
        "GET /api/v2/users/queries/filter/map/?projectId=9 HTTP/1.1"
    );
}
