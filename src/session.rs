//! Question-and-answer session: the glue between the backend and the viewer.
//!
//! A session remembers the uploaded document and the conversation, and
//! pushes new evidence into a [`ViewerController`]: an annotated PDF URL
//! becomes the new source and the returned bounding box becomes the
//! highlight target.

use crate::api::{ApiClient, DEFAULT_HIGHLIGHT_COLOR, MAX_EVIDENCE_CHUNKS};
use crate::backend::DocumentLoader;
use crate::controller::ViewerController;
use crate::error::ViewerError;
use crate::target::HighlightTarget;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Number of chunks the backend retrieves per question.
pub const DEFAULT_K: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

/// What one question produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskOutcome {
    pub answer: String,
    pub chunk_ids: Vec<i64>,
    pub annotated_url: Option<String>,
    pub target: Option<HighlightTarget>,
}

/// A conversation about one uploaded document.
pub struct QaSession<'a, L: DocumentLoader> {
    client: ApiClient,
    viewer: &'a ViewerController<L>,
    doc_name: Option<String>,
    doc_url: Option<String>,
    messages: Vec<ChatMessage>,
    k: u32,
}

impl<'a, L: DocumentLoader> QaSession<'a, L> {
    pub fn new(client: ApiClient, viewer: &'a ViewerController<L>) -> Self {
        Self {
            client,
            viewer,
            doc_name: None,
            doc_url: None,
            messages: Vec::new(),
            k: DEFAULT_K,
        }
    }

    pub fn with_k(mut self, k: u32) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn document_name(&self) -> Option<&str> {
        self.doc_name.as_deref()
    }

    pub fn document_url(&self) -> Option<&str> {
        self.doc_url.as_deref()
    }

    /// Upload a PDF and show the original in the viewer.
    pub async fn upload(&mut self, path: &Path) -> Result<(), ViewerError> {
        let uploaded = self.client.upload(path).await?;
        self.viewer.set_source(Some(&uploaded.url));
        self.doc_name = Some(uploaded.name);
        self.doc_url = Some(uploaded.url);
        Ok(())
    }

    /// Ask a question, record the exchange, and highlight the evidence.
    ///
    /// A failed query is recorded as an `Error: ...` answer and returned as
    /// `Err`. A failed highlight request only logs a warning.
    pub async fn ask(&mut self, query: &str) -> Result<AskOutcome, ViewerError> {
        let doc_name = self.doc_name.clone().ok_or(ViewerError::NoDocument)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(ViewerError::EmptyQuery);
        }

        self.push(Role::User, query);
        let answer = match self.client.query(&doc_name, query, self.k).await {
            Ok(answer) => answer,
            Err(e) => {
                self.push(Role::Assistant, &chat_error(&e));
                return Err(e);
            }
        };
        self.push(Role::Assistant, &answer.text);

        let mut outcome = AskOutcome {
            answer: answer.text,
            chunk_ids: answer.chunk_ids,
            annotated_url: None,
            target: None,
        };
        if outcome.chunk_ids.is_empty() {
            return Ok(outcome);
        }

        let ids = &outcome.chunk_ids[..outcome.chunk_ids.len().min(MAX_EVIDENCE_CHUNKS)];
        match self
            .client
            .highlight(&doc_name, ids, DEFAULT_HIGHLIGHT_COLOR, false)
            .await
        {
            Ok(result) => {
                if let Some(url) = &result.annotated_url {
                    self.viewer.set_source(Some(url));
                    self.doc_url = Some(url.clone());
                }
                self.viewer.set_highlight_target(result.target);
                outcome.annotated_url = result.annotated_url;
                outcome.target = result.target;
            }
            Err(e) => warn!("Highlight error: {}", e),
        }
        Ok(outcome)
    }

    fn push(&mut self, role: Role, text: &str) {
        self.messages.push(ChatMessage {
            role,
            text: text.to_string(),
        });
    }
}

/// Chat text for a failed query: the backend's `detail` when it sent one,
/// otherwise the error itself.
fn chat_error(e: &ViewerError) -> String {
    match e {
        ViewerError::ApiStatus { detail, .. } if !detail.is_empty() => format!("Error: {}", detail),
        other => format!("Error: {}", other),
    }
}
