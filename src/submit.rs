use crate::{config::Config, report::Report};
use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub path: String,
}

impl Endpoint {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            scheme: cfg.report.scheme.clone(),
            host: cfg.report.host.clone(),
            path: cfg.report.path.clone(),
        }
    }

    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: Vec<u8>,
}

/// Errors are transport-level only; any HTTP status is a response.
pub trait Transport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let timeout = (timeout_seconds > 0).then(|| Duration::from_secs(timeout_seconds));
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "building HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse> {
        let resp = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .with_context(|| format!("POST {url}"))?;
        let status = resp.status();
        let reason = status.canonical_reason().unwrap_or("").to_string();
        let body = resp.bytes().with_context(|| "reading response body")?.to_vec();
        Ok(HttpResponse {
            status: status.as_u16(),
            reason,
            body,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Uploaded { url: String },
    Failed { status: Option<u16>, reason: String },
}

impl SubmissionResult {
    pub fn message(&self, host: &str) -> String {
        match self {
            SubmissionResult::Uploaded { url } => format!(
                "Your test results have been reported and are available at: {url}\nThank you!"
            ),
            SubmissionResult::Failed { status: Some(code), reason } => {
                format!("Error: Could not send a test report to {host}.\n{code} {reason}")
            }
            SubmissionResult::Failed { status: None, reason } => {
                format!("Error: Could not send a test report to {host}.\n{reason}")
            }
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, SubmissionResult::Uploaded { .. })
    }
}

pub fn interpret(resp: &HttpResponse, host: &str) -> SubmissionResult {
    if resp.status != 200 {
        return SubmissionResult::Failed {
            status: Some(resp.status),
            reason: resp.reason.clone(),
        };
    }
    let url = serde_json::from_slice::<serde_json::Value>(&resp.body)
        .ok()
        .and_then(|v| v.get("url").and_then(|u| u.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            debug!("success response carried no url; falling back to host");
            host.to_string()
        });
    SubmissionResult::Uploaded { url }
}

/// HTTP and transport failures come back as `Failed`; only serialization and
/// writes to `out` produce errors.
pub fn submit_report(
    consent: bool,
    report: &mut Report,
    endpoint: &Endpoint,
    transport: &dyn Transport,
    out: &mut dyn Write,
) -> Result<Option<SubmissionResult>> {
    if !consent {
        return Ok(None);
    }

    report.normalize();
    let body = serde_json::to_vec(report).with_context(|| "serializing report")?;
    let url = endpoint.url();
    info!(
        "uploading report to {url} ({} bytes, {} warnings)",
        body.len(),
        report.warnings.len()
    );

    let result = match transport.post_json(&url, body) {
        Ok(resp) => interpret(&resp, &endpoint.host),
        Err(err) => {
            warn!("report upload failed: {err:#}");
            SubmissionResult::Failed {
                status: None,
                reason: format!("{err:#}"),
            }
        }
    };

    writeln!(out, "{}", result.message(&endpoint.host))?;
    Ok(Some(result))
}
