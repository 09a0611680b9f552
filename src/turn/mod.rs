//! Conversation turn loop: owns the transcript and the single in-flight service call.
//!
//! Service calls run on worker threads ([`ServiceJob`]); the owning loop calls
//! [`TurnLoop::poll`] each tick to fold finished results back into the transcript.


pub use crate::service::StartRequest;

use crate::log_timing;
use crate::service::{ConversationService, FeedbackResult, Message, ServiceJob};
use anyhow::Result;
use std::sync::Arc;

/// Appended in place of a reply when the conversation service fails.
pub const TURN_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error. Please try sending your message again.";
/// Shown on the selection screen when an interview could not be opened.
pub const START_ERROR_NOTICE: &str = "Failed to start the interview. Please try again later.";
/// Shown above the placeholder feedback when summarizing fails.
pub const FEEDBACK_ERROR_NOTICE: &str =
    "Failed to generate feedback. You can still review the conversation history.";

/// Which screen of the practice session is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Welcome,
    Selection,
    Interview,
    Feedback,
}

/// What changed when a pending service call completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnUpdate {
    InterviewStarted,
    StartFailed,
    ReplyAppended,
    ReplyFailed,
    FeedbackReady,
    FeedbackFailed,
}

enum PendingCall {
    Start(ServiceJob<Message>, &'static str),
    Reply(ServiceJob<Message>),
    Feedback(ServiceJob<FeedbackResult>),
}

enum Completed {
    Start(Result<Message>),
    Reply(Result<Message>),
    Feedback(Result<FeedbackResult>),
}

pub struct TurnLoop<S: ConversationService + 'static> {
    service: Arc<S>,
    transcript: Vec<Message>,
    phase: SessionPhase,
    source_document: Option<String>,
    feedback: Option<FeedbackResult>,
    error: Option<String>,
    pending: Option<PendingCall>,
    pending_user_text: Option<String>,
}

impl<S: ConversationService + 'static> TurnLoop<S> {
    pub fn new(service: S) -> Self {
        Self {
            service: Arc::new(service),
            transcript: Vec::new(),
            phase: SessionPhase::Welcome,
            source_document: None,
            feedback: None,
            error: None,
            pending: None,
            pending_user_text: None,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// True while a service call is outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn feedback(&self) -> Option<&FeedbackResult> {
        self.feedback.as_ref()
    }

    /// Notice for the current screen, if the last start or feedback call failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn source_document(&self) -> Option<&str> {
        self.source_document.as_deref()
    }

    /// User text whose reply is still outstanding.
    pub fn pending_user_text(&self) -> Option<&str> {
        self.pending_user_text.as_deref()
    }

    /// Leave the welcome screen for interview selection.
    pub fn begin(&mut self) {
        if self.phase == SessionPhase::Welcome {
            self.phase = SessionPhase::Selection;
            self.source_document = None;
            self.error = None;
        }
    }

    /// Ask the service for the opening message. Returns false if a call is already
    /// pending or an interview is running.
    pub fn start(&mut self, request: StartRequest) -> bool {
        if self.is_busy() || !matches!(self.phase, SessionPhase::Welcome | SessionPhase::Selection)
        {
            return false;
        }
        self.phase = SessionPhase::Selection;
        self.transcript.clear();
        self.feedback = None;
        self.error = None;
        self.source_document = request.source_document().map(str::to_string);

        let label = request.label();
        let service = Arc::clone(&self.service);
        self.pending = Some(PendingCall::Start(
            ServiceJob::spawn(move || service.start(&request)),
            label,
        ));
        true
    }

    /// Append a typed message and request the interviewer's reply.
    pub fn submit_text(&mut self, text: &str) -> bool {
        let trimmed = text.trim();
        if self.is_busy() || trimmed.is_empty() || self.phase != SessionPhase::Interview {
            return false;
        }
        self.transcript.push(Message::user(trimmed));
        self.pending_user_text = Some(trimmed.to_string());

        let service = Arc::clone(&self.service);
        let transcript = self.transcript.clone();
        let source_document = self.source_document.clone();
        self.pending = Some(PendingCall::Reply(ServiceJob::spawn(move || {
            service.send(&transcript, source_document.as_deref())
        })));
        true
    }

    /// Spoken turns follow the same contract as typed ones.
    pub fn submit_finalized_utterance(&mut self, text: &str) -> bool {
        self.submit_text(text)
    }

    /// Move to the feedback screen and request the evaluation.
    pub fn end_session(&mut self) -> bool {
        if self.is_busy() || self.phase != SessionPhase::Interview {
            return false;
        }
        self.phase = SessionPhase::Feedback;
        self.feedback = None;
        self.error = None;

        let service = Arc::clone(&self.service);
        let transcript = self.transcript.clone();
        self.pending = Some(PendingCall::Feedback(ServiceJob::spawn(move || {
            service.summarize(&transcript)
        })));
        true
    }

    /// Back to the welcome screen with an empty session. Any pending result is dropped.
    pub fn start_new(&mut self) {
        self.pending = None;
        self.pending_user_text = None;
        self.transcript.clear();
        self.feedback = None;
        self.error = None;
        self.source_document = None;
        self.phase = SessionPhase::Welcome;
    }

    /// Fold a finished service call into the session, without blocking.
    pub fn poll(&mut self) -> Option<TurnUpdate> {
        let completed = match self.pending.as_mut()? {
            PendingCall::Start(job, label) => {
                let result = job.try_take()?;
                log_timing("service_start", job.elapsed(), *label);
                Completed::Start(result)
            }
            PendingCall::Reply(job) => {
                let result = job.try_take()?;
                log_timing(
                    "service_reply",
                    job.elapsed(),
                    &format!("turns={}", self.transcript.len()),
                );
                Completed::Reply(result)
            }
            PendingCall::Feedback(job) => {
                let result = job.try_take()?;
                log_timing(
                    "service_feedback",
                    job.elapsed(),
                    &format!("turns={}", self.transcript.len()),
                );
                Completed::Feedback(result)
            }
        };
        self.pending = None;
        self.pending_user_text = None;
        Some(self.apply(completed))
    }

    fn apply(&mut self, completed: Completed) -> TurnUpdate {
        match completed {
            Completed::Start(Ok(opening)) => {
                self.transcript = vec![Message::assistant(opening.content)];
                self.phase = SessionPhase::Interview;
                tracing::info!(target: "caseterm::turn", "interview started");
                TurnUpdate::InterviewStarted
            }
            Completed::Start(Err(err)) => {
                crate::log_debug(&format!("interview start failed: {err:#}"));
                self.phase = SessionPhase::Selection;
                self.source_document = None;
                self.error = Some(START_ERROR_NOTICE.to_string());
                TurnUpdate::StartFailed
            }
            Completed::Reply(Ok(reply)) => {
                self.transcript.push(Message::assistant(reply.content));
                TurnUpdate::ReplyAppended
            }
            Completed::Reply(Err(err)) => {
                crate::log_debug(&format!("reply failed: {err:#}"));
                self.transcript.push(Message::assistant(TURN_ERROR_MESSAGE));
                TurnUpdate::ReplyFailed
            }
            Completed::Feedback(Ok(feedback)) => {
                self.feedback = Some(feedback);
                TurnUpdate::FeedbackReady
            }
            Completed::Feedback(Err(err)) => {
                crate::log_debug(&format!("feedback failed: {err:#}"));
                self.feedback = Some(FeedbackResult::unavailable());
                self.error = Some(FEEDBACK_ERROR_NOTICE.to_string());
                TurnUpdate::FeedbackFailed
            }
        }
    }
}
