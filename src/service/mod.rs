//! Conversation and feedback collaborators consumed by the turn loop.
//!
//! The model-facing service is an external dependency; this module only defines the
//! contract plus a worker handle so calls never block the UI thread.

mod command;

pub use command::CommandService;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Never edited after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// End-of-interview evaluation shown on the summary screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResult {
    pub overall_summary: String,
    pub strengths: String,
    pub areas_for_improvement: String,
    pub missed_concepts: String,
    pub key_takeaways: String,
}

impl FeedbackResult {
    /// Placeholder used when the feedback service fails, so every field still renders.
    pub fn unavailable() -> Self {
        let na = || "N/A".to_string();
        Self {
            overall_summary: "Could not generate feedback due to an error.".to_string(),
            strengths: na(),
            areas_for_improvement: na(),
            missed_concepts: na(),
            key_takeaways: na(),
        }
    }

    /// Section titles paired with their text, in display order.
    pub fn sections(&self) -> [(&'static str, &str); 5] {
        [
            ("Overall Summary", self.overall_summary.as_str()),
            ("Strengths", self.strengths.as_str()),
            ("Areas for Improvement", self.areas_for_improvement.as_str()),
            ("Missed Concepts", self.missed_concepts.as_str()),
            ("Key Takeaways", self.key_takeaways.as_str()),
        ]
    }
}

/// How an interview is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartRequest {
    /// Free-form topic chosen by the candidate.
    Topic(String),
    /// Ask the model to invent a case of the given type.
    GeneratedCase(String),
    /// Run the interview on case material the candidate supplied.
    UploadedCase(String),
}

impl StartRequest {
    /// Case material that must accompany every later turn.
    pub fn source_document(&self) -> Option<&str> {
        match self {
            StartRequest::UploadedCase(text) => Some(text.as_str()),
            StartRequest::Topic(_) | StartRequest::GeneratedCase(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StartRequest::Topic(_) => "topic",
            StartRequest::GeneratedCase(_) => "generated_case",
            StartRequest::UploadedCase(_) => "uploaded_case",
        }
    }
}

/// External model-inference collaborator. Calls may block; the turn loop runs them on
/// worker threads.
pub trait ConversationService: Send + Sync {
    /// Produce the interviewer's opening message.
    fn start(&self, request: &StartRequest) -> Result<Message>;

    /// Produce the interviewer's reply to the full transcript so far.
    fn send(&self, transcript: &[Message], source_document: Option<&str>) -> Result<Message>;

    /// Evaluate the finished transcript.
    fn summarize(&self, transcript: &[Message]) -> Result<FeedbackResult>;
}

/// Handle the turn loop polls for the result of one service call.
pub struct ServiceJob<T> {
    receiver: Receiver<Result<T>>,
    handle: Option<JoinHandle<()>>,
    started_at: Instant,
}

impl<T: Send + 'static> ServiceJob<T> {
    /// Run `call` on a worker thread that sends back exactly one result.
    pub fn spawn(call: impl FnOnce() -> Result<T> + Send + 'static) -> Self {
        let (tx, rx) = mpsc::sync_channel(1);
        let handle = thread::spawn(move || {
            let _ = tx.send(call());
        });
        Self {
            receiver: rx,
            handle: Some(handle),
            started_at: Instant::now(),
        }
    }

    /// Non-blocking check for the result; a worker that died counts as a failure.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        let result = match self.receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                Err(anyhow!("service worker exited without a result"))
            }
        };
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        Some(result)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
