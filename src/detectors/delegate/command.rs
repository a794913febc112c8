//! Delegate backed by an external program speaking JSON over stdio.
//!
//! The program receives `{"reference", "candidate", "language"}` on stdin and
//! must print `{"weighted_ngram", "syntax_match", "dataflow_match"}` (CodeBLEU
//! `*_score` names are accepted too) on stdout.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use super::{DelegateError, DelegateScores, SimilarityDelegate};

/// Maximum stdout accepted from the delegate (1 MiB).
const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

/// Interval between exit-status polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Serialize)]
struct DelegateRequest<'a> {
    reference: &'a str,
    candidate: &'a str,
    language: &'a str,
}

/// Runs a configured program once per comparison.
#[derive(Debug, Clone)]
pub struct CommandDelegate {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDelegate {
    /// `command[0]` is the program, the rest are its arguments.
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        let mut parts = command.into_iter();
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            timeout,
        }
    }

    fn run(&self, request: &[u8]) -> Result<Vec<u8>, DelegateError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(DelegateError::Spawn)?;

        // Pipes are serviced on helper threads so neither side can block the other.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = thread::spawn(move || read_limited(stdout));
        let stderr_reader = thread::spawn(move || read_limited(stderr));

        if let Some(mut stdin) = child.stdin.take() {
            let request = request.to_vec();
            thread::spawn(move || {
                if let Err(err) = stdin.write_all(&request) {
                    // Delegates may exit without reading stdin.
                    debug!("Delegate closed stdin early: {}", err);
                }
            });
        }

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait().map_err(DelegateError::Spawn)? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!("Delegate {} timed out after {:?}", self.program, self.timeout);
                    return Err(DelegateError::Timeout(self.timeout));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let stdout = stdout_reader
            .join()
            .map_err(|_| DelegateError::Failed("stdout reader panicked".into()))?;
        let stderr = stderr_reader
            .join()
            .map_err(|_| DelegateError::Failed("stderr reader panicked".into()))?;

        if !status.success() {
            return Err(DelegateError::Exit {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

fn read_limited<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buffer = Vec::new();
    if let Some(pipe) = pipe {
        let _ = pipe.take(MAX_RESPONSE_BYTES).read_to_end(&mut buffer);
    }
    buffer
}

impl SimilarityDelegate for CommandDelegate {
    fn name(&self) -> &str {
        &self.program
    }

    fn score(
        &self,
        reference: &str,
        candidate: &str,
        language: &str,
    ) -> Result<DelegateScores, DelegateError> {
        let request = serde_json::to_vec(&DelegateRequest {
            reference,
            candidate,
            language,
        })
        .map_err(|e| DelegateError::Protocol(e.to_string()))?;

        let output = self.run(&request)?;
        let scores: DelegateScores = serde_json::from_slice(&output)
            .map_err(|e| DelegateError::Protocol(e.to_string()))?;
        scores.validate()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> CommandDelegate {
        CommandDelegate::new(
            vec!["sh".into(), "-c".into(), script.into()],
            Duration::from_secs(10),
        )
    }

    #[test]
    fn parses_scores_from_stdout() {
        let delegate = shell(
            r#"cat > /dev/null; echo '{"weighted_ngram":0.5,"syntax_match":0.25,"dataflow_match":1.0}'"#,
        );
        let scores = delegate.score("x = 1", "x = 2", "python").unwrap();
        assert_eq!(scores.weighted_ngram, 0.5);
        assert_eq!(scores.syntax_match, 0.25);
        assert_eq!(scores.dataflow_match, 1.0);
    }

    #[test]
    fn request_is_written_to_stdin() {
        // Echo back a score only when the request carries the language tag.
        let delegate = shell(
            r#"if grep -q '"language":"python"'; then echo '{"weighted_ngram":1,"syntax_match":1,"dataflow_match":1}'; else exit 3; fi"#,
        );
        assert!(delegate.score("a", "b", "python").is_ok());
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let delegate = shell("cat > /dev/null; echo 'no codebleu here' >&2; exit 2");
        match delegate.score("a", "b", "python") {
            Err(DelegateError::Exit { stderr, .. }) => assert_eq!(stderr, "no codebleu here"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_a_protocol_error() {
        let delegate = shell("cat > /dev/null; echo 'not json'");
        assert!(matches!(
            delegate.score("a", "b", "python"),
            Err(DelegateError::Protocol(_))
        ));
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let delegate = shell(
            r#"cat > /dev/null; echo '{"weighted_ngram":2.0,"syntax_match":0.5,"dataflow_match":0.5}'"#,
        );
        assert!(matches!(
            delegate.score("a", "b", "python"),
            Err(DelegateError::OutOfRange { .. })
        ));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let delegate = CommandDelegate::new(
            vec!["/nonexistent/codesim-delegate".into()],
            Duration::from_secs(1),
        );
        assert!(matches!(
            delegate.score("a", "b", "python"),
            Err(DelegateError::Spawn(_))
        ));
    }

    #[test]
    fn slow_delegate_times_out() {
        let delegate = CommandDelegate::new(
            vec!["sh".into(), "-c".into(), "sleep 5".into()],
            Duration::from_millis(100),
        );
        assert!(matches!(
            delegate.score("a", "b", "python"),
            Err(DelegateError::Timeout(_))
        ));
    }
}
