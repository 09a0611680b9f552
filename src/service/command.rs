//! Conversation service backed by an external helper process.
//!
//! Each request spawns the configured command, writes one `{"type", "payload"}` JSON
//! object to its stdin and reads the JSON answer from stdout. The helper owns the
//! model provider, credentials and transport.

use super::{ConversationService, FeedbackResult, Message, StartRequest};
use crate::config::{sanitize_command, AppConfig};
use crate::{log_debug, log_debug_content};
use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Stdio};

#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    payload: Value,
}

/// Runs one helper process per request.
#[derive(Debug, Clone)]
pub struct CommandService {
    argv: Vec<String>,
}

impl CommandService {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            bail!("service command cannot be empty");
        }
        Ok(Self { argv })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(sanitize_command(&config.service_cmd, "--service-cmd")?)
    }

    fn call<T: DeserializeOwned>(&self, request: &ProxyRequest<'_>) -> Result<T> {
        let body = serde_json::to_string(request).context("failed to encode service request")?;
        log_debug(&format!("service request type={}", request.kind));
        log_debug_content(&format!("service request body: {body}"));

        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run service command '{}'", self.argv[0]))?;
        {
            let mut stdin = child
                .stdin
                .take()
                .context("failed to open service command stdin")?;
            stdin
                .write_all(body.as_bytes())
                .and_then(|_| stdin.write_all(b"\n"))
                .context("failed to write service request")?;
        }
        let output = child
            .wait_with_output()
            .context("failed to wait for service command")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "service command failed with status {}.\nstdout:\n{}\nstderr:\n{}",
                output.status,
                stdout.trim(),
                stderr.trim()
            ));
        }
        parse_service_output(&stdout)
    }
}

impl ConversationService for CommandService {
    fn start(&self, request: &StartRequest) -> Result<Message> {
        self.call(&start_request(request))
    }

    fn send(&self, transcript: &[Message], source_document: Option<&str>) -> Result<Message> {
        self.call(&continue_request(transcript, source_document))
    }

    fn summarize(&self, transcript: &[Message]) -> Result<FeedbackResult> {
        self.call(&ProxyRequest {
            kind: "feedback",
            payload: json!({ "history": transcript }),
        })
    }
}

fn start_request(request: &StartRequest) -> ProxyRequest<'static> {
    match request {
        StartRequest::Topic(topic) => ProxyRequest {
            kind: "start_topic",
            payload: json!({ "topic": topic }),
        },
        StartRequest::GeneratedCase(case_type) => ProxyRequest {
            kind: "start_generate",
            payload: json!({ "caseType": case_type }),
        },
        StartRequest::UploadedCase(content) => ProxyRequest {
            kind: "start_upload",
            payload: json!({ "caseContent": content }),
        },
    }
}

fn continue_request(transcript: &[Message], source_document: Option<&str>) -> ProxyRequest<'static> {
    let mut payload = json!({ "history": transcript });
    if let (Some(document), Some(map)) = (source_document, payload.as_object_mut()) {
        map.insert("caseContext".to_string(), Value::from(document));
    }
    ProxyRequest {
        kind: "continue",
        payload,
    }
}

/// Accept either a bare JSON document or log noise followed by a JSON line
/// (optionally prefixed with `JSON:`). The last parsable line wins.
fn parse_service_output<T: DeserializeOwned>(stdout: &str) -> Result<T> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        bail!("service command produced no output");
    }
    let mut last_error = match serde_json::from_str::<T>(trimmed) {
        Ok(value) => return Ok(value),
        Err(err) => (trimmed.to_string(), err),
    };

    for line in stdout.lines().rev() {
        let mut candidate = line.trim();
        if let Some(rest) = candidate.strip_prefix("JSON:") {
            candidate = rest.trim();
        }
        if !(candidate.starts_with('{') && candidate.ends_with('}')) {
            continue;
        }
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(err) => last_error = (candidate.to_string(), err),
        }
    }

    let (line, err) = last_error;
    Err(anyhow!("service command did not emit usable JSON")
        .context(format!("last JSON parse failure `{line}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Role;

    #[test]
    fn continue_request_includes_case_context_only_when_present() {
        let transcript = vec![Message::assistant("Welcome"), Message::user("Hi")];
        let with_doc = serde_json::to_value(continue_request(&transcript, Some("case text")))
            .expect("encode");
        assert_eq!(with_doc["type"], "continue");
        assert_eq!(with_doc["payload"]["caseContext"], "case text");
        assert_eq!(with_doc["payload"]["history"][1]["role"], "user");

        let without_doc =
            serde_json::to_value(continue_request(&transcript, None)).expect("encode");
        assert!(without_doc["payload"].get("caseContext").is_none());
    }

    #[test]
    fn start_requests_map_to_proxy_types() {
        let topic = serde_json::to_value(start_request(&StartRequest::Topic("pricing".into())))
            .expect("encode");
        assert_eq!(topic["type"], "start_topic");
        assert_eq!(topic["payload"]["topic"], "pricing");

        let generated = serde_json::to_value(start_request(&StartRequest::GeneratedCase(
            "market sizing".into(),
        )))
        .expect("encode");
        assert_eq!(generated["type"], "start_generate");
        assert_eq!(generated["payload"]["caseType"], "market sizing");

        let upload =
            serde_json::to_value(start_request(&StartRequest::UploadedCase("doc".into())))
                .expect("encode");
        assert_eq!(upload["type"], "start_upload");
        assert_eq!(upload["payload"]["caseContent"], "doc");
    }

    #[test]
    fn parses_bare_json_output() {
        let message: Message =
            parse_service_output("{\"role\":\"assistant\",\"content\":\"Hello\"}\n")
                .expect("parse");
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "Hello");
    }

    #[test]
    fn parses_last_json_line_after_log_noise() {
        let stdout = "loading model...\n{\"role\":\"assistant\",\"content\":\"old\"}\nJSON: {\"role\":\"assistant\",\"content\":\"new\"}\n";
        let message: Message = parse_service_output(stdout).expect("parse");
        assert_eq!(message.content, "new");
    }

    #[test]
    fn rejects_output_without_json() {
        assert!(parse_service_output::<Message>("").is_err());
        assert!(parse_service_output::<Message>("model unavailable").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn command_service_round_trips_through_a_helper() {
        let service = CommandService::new(vec![
            "sh".into(),
            "-c".into(),
            "cat >/dev/null; echo '{\"role\":\"assistant\",\"content\":\"Walk me through it\"}'"
                .into(),
        ])
        .expect("service");
        let reply = service
            .send(&[Message::user("Let's begin")], None)
            .expect("reply");
        assert_eq!(reply.content, "Walk me through it");
    }

    #[cfg(unix)]
    #[test]
    fn command_service_surfaces_non_zero_exit() {
        let service = CommandService::new(vec![
            "sh".into(),
            "-c".into(),
            "cat >/dev/null; echo quota exceeded >&2; exit 3".into(),
        ])
        .expect("service");
        let err = service
            .summarize(&[Message::user("done")])
            .expect_err("should fail");
        assert!(format!("{err:#}").contains("quota exceeded"));
    }
}
