//! Client for the question-answering backend.
//!
//! The backend ingests PDFs, answers questions with evidence chunk ids and
//! renders highlight PDFs for those chunks. This module only consumes its
//! three endpoints:
//!
//! | Endpoint | Request | Used for |
//! |----------|---------|----------|
//! | `POST {api}/process-pdf` | multipart `file` | document name |
//! | `POST {api}/query` | query string `query`, `doc_name`, `k` | answer + evidence |
//! | `POST {api}/highlight` | JSON `doc_name`, `chunk_ids`, `color`, `return_pdf` | annotated PDF URL, target |
//!
//! Uploaded and annotated PDFs are served as static files from the server
//! origin, not from the versioned API root.

use crate::config::ApiConfig;
use crate::error::ViewerError;
use crate::target::HighlightTarget;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Maximum number of evidence chunks sent to the highlight endpoint.
pub const MAX_EVIDENCE_CHUNKS: usize = 5;

/// Highlight colour sent to the backend, `[r, g, b]` in `0.0..=1.0`.
pub const DEFAULT_HIGHLIGHT_COLOR: [f32; 3] = [1.0, 0.85, 0.2];

/// Answer text used when the backend returns none.
pub const NO_RESULT: &str = "(no result)";

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
struct UploadBody {
    #[serde(default)]
    document_name: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    evidence: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
struct HighlightRequest<'a> {
    doc_name: &'a str,
    chunk_ids: &'a [i64],
    color: [f32; 3],
    return_pdf: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct HighlightBody {
    #[serde(default)]
    annotated_pdf_url: Option<String>,
    #[serde(default)]
    page: Option<Value>,
    #[serde(default)]
    bbox: Option<Value>,
    #[serde(default)]
    highlights: Option<Vec<Value>>,
}

// ── Public results ───────────────────────────────────────────────────────

/// A document accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedDocument {
    /// Name the backend indexed the document under.
    pub name: String,
    /// Absolute URL of the original PDF.
    pub url: String,
}

/// Answer to a question plus its evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub text: String,
    /// Parsed evidence chunk ids, at most [`MAX_EVIDENCE_CHUNKS`].
    pub chunk_ids: Vec<i64>,
}

/// Result of a highlight request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightResult {
    /// Absolute URL of the annotated PDF, when the backend produced one.
    pub annotated_url: Option<String>,
    /// Location of the first highlight.
    pub target: Option<HighlightTarget>,
    /// Every well-formed highlight the backend returned.
    pub targets: Vec<HighlightTarget>,
}

// ── Evidence parsing ─────────────────────────────────────────────────────

static LEADING_INT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?\d+)").expect("static regex is valid")
});

/// Parse one evidence entry as an integer chunk id.
///
/// Strings use their leading integer (`"12"`, `" 7abc"` → 7); numbers are
/// truncated toward zero. Anything else is rejected.
pub fn parse_chunk_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            let t = f.trunc();
            if t.is_finite() && t >= i64::MIN as f64 && t <= i64::MAX as f64 {
                Some(t as i64)
            } else {
                None
            }
        }
        Value::String(s) => LEADING_INT
            .captures(s)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        _ => None,
    }
}

/// Pull `evidence.chunk_id` out of a query response, keeping the first
/// [`MAX_EVIDENCE_CHUNKS`] valid ids.
pub fn parse_evidence(evidence: Option<&Value>) -> Vec<i64> {
    evidence
        .and_then(|e| e.get("chunk_id"))
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(parse_chunk_id)
                .take(MAX_EVIDENCE_CHUNKS)
                .collect()
        })
        .unwrap_or_default()
}

// ── Client ───────────────────────────────────────────────────────────────

/// HTTP client for the backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig, timeout_secs: u64) -> Result<Self, ViewerError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ViewerError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_root(), path)
    }

    /// `{origin}/pdfs/original/{name}` with the name percent-encoded.
    pub fn original_pdf_url(&self, name: &str) -> Result<String, ViewerError> {
        static_pdf_url(self.config.origin_base(), &["pdfs", "original", name])
    }

    /// `{origin}/pdfs/annotated/{name}__annotated.pdf`.
    pub fn annotated_pdf_url(&self, name: &str) -> Result<String, ViewerError> {
        let file = format!("{}__annotated.pdf", name);
        static_pdf_url(self.config.origin_base(), &["pdfs", "annotated", &file])
    }

    /// Resolve a server-relative path against the origin.
    pub fn absolute_url(&self, relative: &str) -> String {
        format!("{}{}", self.config.origin_base(), relative)
    }

    /// Upload a PDF for ingestion.
    pub async fn upload(&self, path: &Path) -> Result<UploadedDocument, ViewerError> {
        let endpoint = self.endpoint("process-pdf");
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ViewerError::InvalidSource {
                source_str: path.display().to_string(),
            })?;

        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ViewerError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => ViewerError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ViewerError::InvalidSource {
                source_str: path.display().to_string(),
            },
        })?;

        info!("Uploading {} ({} bytes)", file_name, bytes.len());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str("application/pdf")
            .map_err(|e| request_error(&endpoint, e))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_error(&endpoint, e))?;
        let body: UploadBody = read_json(&endpoint, response).await?;

        let name = body
            .document_name
            .or(body.filename)
            .filter(|n| !n.is_empty())
            .unwrap_or(file_name);
        let url = self.original_pdf_url(&name)?;
        debug!("Uploaded as '{}' → {}", name, url);
        Ok(UploadedDocument { name, url })
    }

    /// Ask a question about an uploaded document.
    pub async fn query(&self, doc_name: &str, query: &str, k: u32) -> Result<QueryAnswer, ViewerError> {
        let endpoint = self.endpoint("query");
        let k = k.to_string();
        let response = self
            .http
            .post(&endpoint)
            .query(&[("query", query), ("doc_name", doc_name), ("k", k.as_str())])
            .send()
            .await
            .map_err(|e| request_error(&endpoint, e))?;
        let body: QueryBody = read_json(&endpoint, response).await?;

        let text = body
            .result
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| NO_RESULT.to_string());
        let chunk_ids = parse_evidence(body.evidence.as_ref());
        debug!("Answer with {} evidence chunks", chunk_ids.len());
        Ok(QueryAnswer { text, chunk_ids })
    }

    /// Request an annotated PDF highlighting `chunk_ids`.
    pub async fn highlight(
        &self,
        doc_name: &str,
        chunk_ids: &[i64],
        color: [f32; 3],
        return_pdf: bool,
    ) -> Result<HighlightResult, ViewerError> {
        let endpoint = self.endpoint("highlight");
        let payload = HighlightRequest {
            doc_name,
            chunk_ids,
            color,
            return_pdf,
        };
        let response = self
            .http
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| request_error(&endpoint, e))?;
        let body: HighlightBody = read_json(&endpoint, response).await?;
        Ok(self.highlight_result(body))
    }

    fn highlight_result(&self, body: HighlightBody) -> HighlightResult {
        let annotated_url = body
            .annotated_pdf_url
            .filter(|u| !u.is_empty())
            .map(|u| self.absolute_url(&u));
        let targets: Vec<HighlightTarget> = body
            .highlights
            .unwrap_or_default()
            .iter()
            .filter_map(HighlightTarget::from_json)
            .collect();
        let target = match (&body.page, &body.bbox) {
            (Some(page), Some(bbox)) => HighlightTarget::from_parts(page, bbox),
            _ => None,
        }
        .or_else(|| targets.first().copied());

        HighlightResult {
            annotated_url,
            target,
            targets,
        }
    }
}

fn static_pdf_url(origin: &str, segments: &[&str]) -> Result<String, ViewerError> {
    let mut url = Url::parse(origin).map_err(|e| {
        ViewerError::InvalidConfig(format!("API origin '{}' is not a URL: {}", origin, e))
    })?;
    url.path_segments_mut()
        .map_err(|_| ViewerError::InvalidConfig(format!("API origin '{}' cannot have a path", origin)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}

fn request_error(endpoint: &str, e: reqwest::Error) -> ViewerError {
    ViewerError::ApiRequest {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    }
}

/// Decode a success body, or turn an error status into `ApiStatus` using
/// the JSON `detail` field when the backend supplied one.
async fn read_json<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> Result<T, ViewerError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| request_error(endpoint, e))?;

    if !status.is_success() {
        return Err(ViewerError::ApiStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            detail: error_detail(&text),
        });
    }

    serde_json::from_str(&text).map_err(|e| ViewerError::ApiRequest {
        endpoint: endpoint.to_string(),
        reason: format!("invalid JSON response: {}", e),
    })
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        })
        .unwrap_or_else(|| body.trim().to_string())
}
