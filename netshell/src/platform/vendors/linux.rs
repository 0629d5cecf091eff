//! Linux platform: prompt negotiation and shell helpers.
//!
//! Login prompts on Linux are whatever the user's dotfiles make them, so
//! the session starts with a loose pattern that only looks at the final
//! prompt glyph, then replaces `PS1` with a fixed marker and switches to
//! an exact pattern for everything after.
//!
//! ```text
//! user@host:~$            # bash
//! root@host:/ #           # root / busybox
//! ❯                       # starship, pure
//! └──>                    # two-line themes
//! NETSHELL$               # after negotiation
//! ```

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, info};
use regex::bytes::Regex;
use serde::Serialize;

use crate::channel::PtyChannel;
use crate::driver::{CommandRecord, DeviceProtocol, DeviceType, Response};
use crate::error::{DriverError, Result};
use crate::platform::PlatformDefinition;

/// Platform name for Linux.
pub const PLATFORM_NAME: &str = "linux";

/// Final glyph of common interactive prompts.
const INITIAL_PROMPT: &str = r"(?:[$#%>]|└──>|»|❯)\s*\z";

/// Prompt after negotiation.
const NORMALIZED_PROMPT: &str = r"NETSHELL\$\s*\z";

/// The quotes split the marker so the echoed command never matches it.
const SET_PROMPT: &str = "unset PROMPT_COMMAND RPROMPT; export PS1='NET''SHELL$ '";

const HARDEN: &str = "export TERM=dumb; unset HISTFILE";

const INITIAL_PROMPT_TIMEOUT: Duration = Duration::from_secs(20);
const SET_PROMPT_TIMEOUT: Duration = Duration::from_secs(10);
const HARDEN_TIMEOUT: Duration = Duration::from_secs(5);
const OS_INFO_TIMEOUT: Duration = Duration::from_secs(10);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw bytes per upload command; keeps each line well under typical
/// terminal input limits once base64-encoded.
const UPLOAD_CHUNK_BYTES: usize = 2048;

const OS_INFO_COMMANDS: [&str; 3] = [
    "hostname",
    "uname -a",
    "cat /etc/os-release 2>/dev/null | head -5",
];

static NORMALIZED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NORMALIZED_PROMPT).expect("valid normalized prompt pattern"));

/// Create the Linux platform definition.
pub fn platform() -> PlatformDefinition {
    let initial = Regex::new(INITIAL_PROMPT).expect("valid initial prompt pattern");

    PlatformDefinition::new(PLATFORM_NAME, DeviceType::Linux, initial)
        .with_failure_pattern("command not found")
        .with_failure_pattern("No such file or directory")
        .with_failure_pattern("Permission denied")
        .with_failure_pattern("Operation not permitted")
        .with_on_open_command(HARDEN)
        .with_terminal_size(511, 24)
}

/// Host facts gathered by [`LinuxSession::os_info`].
///
/// Fields that could not be read are `"N/A"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsInfo {
    pub hostname: String,
    pub uname: String,
    pub os_release: String,
}

/// A Linux shell with a normalized prompt.
pub struct LinuxSession {
    channel: PtyChannel,
    definition: PlatformDefinition,
    normalized: AtomicBool,
}

impl LinuxSession {
    pub fn new(channel: PtyChannel, definition: PlatformDefinition) -> Self {
        Self {
            channel,
            definition,
            normalized: AtomicBool::new(false),
        }
    }

    /// Whether the prompt has been replaced with the fixed marker.
    pub fn is_normalized(&self) -> bool {
        self.normalized.load(Ordering::Acquire)
    }

    fn ensure_normalized(&self) -> Result<()> {
        if self.is_normalized() {
            Ok(())
        } else {
            Err(DriverError::NegotiationFailed {
                message: "shell prompt has not been normalized".to_string(),
            }
            .into())
        }
    }

    /// Run one command.
    pub async fn exec(&self, command: &str, timeout: Duration) -> Result<Response> {
        self.ensure_normalized()?;
        self.channel.send_command(command, timeout).await
    }

    /// Run several commands, one record each; failures do not stop the batch.
    pub async fn exec_multi(
        &self,
        commands: &[String],
        timeout: Duration,
    ) -> Result<Vec<CommandRecord>> {
        self.ensure_normalized()?;
        self.send_commands(commands, timeout).await
    }

    /// Write `content` to `path` on the remote host, replacing the file.
    ///
    /// The text travels base64-encoded in chunks, so quotes, newlines and
    /// shell metacharacters arrive byte-for-byte. Returns the response of
    /// the last command sent; upload stops at the first failing chunk.
    pub async fn upload_text(&self, path: &str, content: &str) -> Result<Response> {
        self.ensure_normalized()?;

        let commands = upload_commands(path, content);
        debug!("uploading {} bytes to {} in {} commands", content.len(), path, commands.len());

        let guard = self.channel.lock().await;
        let mut response = guard.send_command(&commands[0], UPLOAD_TIMEOUT).await?;
        for command in &commands[1..] {
            if !response.is_success() {
                break;
            }
            response = guard.send_command(command, UPLOAD_TIMEOUT).await?;
        }

        Ok(response)
    }

    /// Hostname, kernel and distribution, each best-effort.
    pub async fn os_info(&self) -> Result<OsInfo> {
        self.ensure_normalized()?;

        let guard = self.channel.lock().await;
        let mut values = Vec::with_capacity(OS_INFO_COMMANDS.len());
        for command in OS_INFO_COMMANDS {
            let value = match guard.send_command(command, OS_INFO_TIMEOUT).await {
                Ok(response) if response.is_success() && !response.result.is_empty() => {
                    response.result
                }
                Ok(_) => "N/A".to_string(),
                Err(e) if e.is_timeout() => {
                    debug!("{:?} timed out", command);
                    "N/A".to_string()
                }
                Err(e) => return Err(e),
            };
            values.push(value);
        }

        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_else(|| "N/A".to_string());
        Ok(OsInfo {
            hostname: next(),
            uname: next(),
            os_release: next(),
        })
    }
}

impl DeviceProtocol for LinuxSession {
    fn device_type(&self) -> DeviceType {
        DeviceType::Linux
    }

    fn channel(&self) -> &PtyChannel {
        &self.channel
    }

    async fn negotiate(&self) -> Result<()> {
        let mut guard = self.channel.lock().await;

        guard.wait_for_prompt(INITIAL_PROMPT_TIMEOUT).await?;
        debug!("initial prompt seen, normalizing");

        guard.set_prompt(NORMALIZED_PATTERN.clone());
        guard.send_command(SET_PROMPT, SET_PROMPT_TIMEOUT).await?;
        self.normalized.store(true, Ordering::Release);

        for command in &self.definition.on_open_commands {
            guard.send_command(command, HARDEN_TIMEOUT).await?;
        }

        info!("linux prompt normalized");
        Ok(())
    }
}

/// Shell-quote a single word.
fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Commands that recreate `content` at `path`; never empty.
fn upload_commands(path: &str, content: &str) -> Vec<String> {
    let target = shell_quote(path);

    if content.is_empty() {
        return vec![format!(": > {}", target)];
    }

    content
        .as_bytes()
        .chunks(UPLOAD_CHUNK_BYTES)
        .enumerate()
        .map(|(i, chunk)| {
            let redirect = if i == 0 { ">" } else { ">>" };
            format!(
                "printf '%s' '{}' | base64 -d {} {}",
                BASE64.encode(chunk),
                redirect,
                target
            )
        })
        .collect()
}
