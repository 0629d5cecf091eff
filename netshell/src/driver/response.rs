//! Command results.

use std::time::Duration;

use serde::Serialize;

/// Response from a command execution.
#[derive(Debug, Clone)]
pub struct Response {
    /// The command that was executed.
    pub command: String,

    /// Sanitized output: no echo, no prompt, no control sequences.
    pub result: String,

    /// The raw output as received from the terminal.
    pub raw_result: String,

    /// The prompt that ended the output.
    pub prompt: String,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// Failure substring found in the output, if any.
    pub failure_message: Option<String>,
}

impl Response {
    /// Create a new successful response.
    pub fn new(
        command: impl Into<String>,
        result: impl Into<String>,
        raw_result: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            raw_result: raw_result.into(),
            prompt: prompt.into(),
            elapsed,
            failure_message: None,
        }
    }

    /// Create a failed response.
    pub fn failed(
        command: impl Into<String>,
        result: impl Into<String>,
        raw_result: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
        failure_message: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            raw_result: raw_result.into(),
            prompt: prompt.into(),
            elapsed,
            failure_message: Some(failure_message.into()),
        }
    }

    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.failure_message.is_none()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.result.lines()
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.result.contains(pattern)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.result)
    }
}

/// One step of a batch or a configuration transaction.
///
/// Exactly one of `output` and `error` carries the interesting text: a
/// failed step has an empty `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub command: String,
    pub output: String,
    pub error: Option<String>,
}

impl CommandRecord {
    pub fn ok(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(command: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Record a device response, treating failure output as an error.
    pub fn from_response(response: Response) -> Self {
        match response.failure_message {
            None => Self::ok(response.command, response.result),
            Some(pattern) if response.result.is_empty() => Self::failed(response.command, pattern),
            Some(_) => Self::failed(response.command, response.result),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
