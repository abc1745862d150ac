use anyhow::{anyhow, Result};
use runtests::report::{Report, WarningRecord};
use runtests::submit::{
    interpret, submit_report, Endpoint, HttpResponse, HttpTransport, SubmissionResult, Transport,
};
use serde_json::{json, Value};
use std::cell::RefCell;

/// Records every request and answers with a fixed response.
struct FakeTransport {
    response: Option<HttpResponse>,
    sent: RefCell<Vec<(String, Value)>>,
}

impl FakeTransport {
    fn answering(status: u16, reason: &str, body: &str) -> Self {
        Self {
            response: Some(HttpResponse {
                status,
                reason: reason.to_string(),
                body: body.as_bytes().to_vec(),
            }),
            sent: RefCell::new(Vec::new()),
        }
    }

    fn unreachable() -> Self {
        Self {
            response: None,
            sent: RefCell::new(Vec::new()),
        }
    }
}

impl Transport for FakeTransport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse> {
        let value: Value = serde_json::from_slice(&body)?;
        self.sent.borrow_mut().push((url.to_string(), value));
        self.response
            .clone()
            .ok_or_else(|| anyhow!("connection refused"))
    }
}

fn endpoint() -> Endpoint {
    Endpoint {
        scheme: "https".into(),
        host: "tests.example".into(),
        path: "/post/v2/".into(),
    }
}

fn sample_report() -> Report {
    serde_json::from_value(json!({
        "summary": {"passed": 3, "total": 3},
        "platform_info": {"system": "Linux"},
        "warnings": [{"a": 1}, {"a": 1}, {"b": 2}]
    }))
    .unwrap()
}

fn submit(consent: bool, transport: &FakeTransport) -> (Option<SubmissionResult>, String) {
    let mut report = sample_report();
    let mut out = Vec::new();
    let res = submit_report(consent, &mut report, &endpoint(), transport, &mut out).unwrap();
    (res, String::from_utf8(out).unwrap())
}

#[test]
fn no_consent_no_request() {
    let t = FakeTransport::answering(200, "OK", "{}");
    let (res, printed) = submit(false, &t);
    assert!(res.is_none());
    assert!(printed.is_empty());
    assert!(t.sent.borrow().is_empty());
}

#[test]
fn payload_has_unique_warnings_and_extra_fields() {
    let t = FakeTransport::answering(200, "OK", "{}");
    submit(true, &t);

    let sent = t.sent.borrow();
    assert_eq!(sent.len(), 1);
    let (url, body) = &sent[0];
    assert_eq!(url, "https://tests.example/post/v2/");
    assert_eq!(body["summary"]["total"], json!(3));
    assert_eq!(body["platform_info"]["system"], json!("Linux"));

    let mut warnings: Vec<String> = body["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w.to_string())
        .collect();
    warnings.sort();
    assert_eq!(warnings, vec![r#"{"a":1}"#.to_string(), r#"{"b":2}"#.to_string()]);
}

#[test]
fn success_shows_returned_url() {
    let t = FakeTransport::answering(200, "OK", r#"{"url": "https://tests.example/r/42"}"#);
    let (res, printed) = submit(true, &t);
    assert_eq!(
        res,
        Some(SubmissionResult::Uploaded {
            url: "https://tests.example/r/42".into()
        })
    );
    assert!(printed.contains("https://tests.example/r/42"));
    assert!(printed.contains("Thank you!"));
}

#[test]
fn success_without_url_falls_back_to_host() {
    let t = FakeTransport::answering(200, "OK", r#"{"id": 42}"#);
    let (res, printed) = submit(true, &t);
    assert_eq!(
        res,
        Some(SubmissionResult::Uploaded {
            url: "tests.example".into()
        })
    );
    assert!(printed.contains("tests.example"));
}

#[test]
fn unparsable_success_body_falls_back_to_host() {
    let resp = HttpResponse {
        status: 200,
        reason: "OK".into(),
        body: b"<html>ok</html>".to_vec(),
    };
    assert_eq!(
        interpret(&resp, "tests.example"),
        SubmissionResult::Uploaded {
            url: "tests.example".into()
        }
    );
}

#[test]
fn server_error_is_reported_not_raised() {
    let t = FakeTransport::answering(503, "Service Unavailable", "");
    let (res, printed) = submit(true, &t);
    assert!(!res.as_ref().unwrap().is_uploaded());
    assert!(printed.contains("503"));
    assert!(printed.contains("Service Unavailable"));
    assert!(printed.contains("Could not send a test report to tests.example"));
    assert_eq!(t.sent.borrow().len(), 1);
}

#[test]
fn transport_error_takes_failure_path() {
    let t = FakeTransport::unreachable();
    let (res, printed) = submit(true, &t);
    match res {
        Some(SubmissionResult::Failed { status, reason }) => {
            assert_eq!(status, None);
            assert!(reason.contains("connection refused"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(printed.contains("connection refused"));
    assert_eq!(t.sent.borrow().len(), 1);
}

#[test]
fn http_transport_against_mock_server() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/post/v2/")
        .match_header("content-type", "application/json")
        .match_body(mockito::Matcher::PartialJson(json!({"summary": {"total": 3}})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"url": "https://tests.example/r/42"}"#)
        .expect(1)
        .create();

    let endpoint = Endpoint {
        scheme: "http".into(),
        host: server.host_with_port(),
        path: "/post/v2/".into(),
    };
    let transport = HttpTransport::new(5).unwrap();
    let mut report = sample_report();
    let mut out = Vec::new();
    let res = submit_report(true, &mut report, &endpoint, &transport, &mut out).unwrap();

    mock.assert();
    assert!(res.unwrap().is_uploaded());
    assert_eq!(report.warnings.len(), 2);
    assert!(String::from_utf8(out).unwrap().contains("https://tests.example/r/42"));
}

#[test]
fn http_transport_surfaces_reason_phrase() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/post/v2/")
        .with_status(503)
        .expect(1)
        .create();

    let endpoint = Endpoint {
        scheme: "http".into(),
        host: server.host_with_port(),
        path: "/post/v2/".into(),
    };
    let transport = HttpTransport::new(5).unwrap();
    let mut report = Report {
        warnings: vec![WarningRecord::default()],
        ..Default::default()
    };
    let mut out = Vec::new();
    let res = submit_report(true, &mut report, &endpoint, &transport, &mut out).unwrap();

    mock.assert();
    assert_eq!(
        res,
        Some(SubmissionResult::Failed {
            status: Some(503),
            reason: "Service Unavailable".into()
        })
    );
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("503 Service Unavailable"));
}

#[test]
fn http_transport_connection_refused_is_not_fatal() {
    // Bind and drop to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let endpoint = Endpoint {
        scheme: "http".into(),
        host: format!("127.0.0.1:{port}"),
        path: "/post/v2/".into(),
    };
    let transport = HttpTransport::new(5).unwrap();
    let mut report = sample_report();
    let mut out = Vec::new();
    let res = submit_report(true, &mut report, &endpoint, &transport, &mut out).unwrap();
    assert!(matches!(res, Some(SubmissionResult::Failed { status: None, .. })));
    assert!(String::from_utf8(out).unwrap().starts_with("Error: Could not send"));
}
