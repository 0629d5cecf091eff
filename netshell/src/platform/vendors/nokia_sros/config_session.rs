//! Nokia SR OS MD-CLI configuration transaction.
//!
//! One call to [`SrosSession::configure`] runs the whole exclusive-mode
//! lifecycle under a single execution lock:
//!
//! ```text
//! edit-config exclusive ─► cmd 1 … cmd N ─► commit | discard ─► quit-config
//! ```
//!
//! A failing configuration command is recorded and the transaction keeps
//! going. Leaving configuration mode is always attempted; if it fails the
//! session is left in a suspect state and the caller gets an error that
//! still carries every step.

use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;

use super::session::SrosSession;
use crate::driver::{CommandRecord, DeviceProtocol};
use crate::error::{DriverError, Result};

const ENTER_EXCLUSIVE: &str = "edit-config exclusive";
const COMMIT: &str = "commit";
const DISCARD: &str = "discard";
const QUIT_CONFIG: &str = "quit-config";

const ENTER_TIMEOUT: Duration = Duration::from_secs(15);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const COMMIT_TIMEOUT: Duration = Duration::from_secs(30);
const DISCARD_TIMEOUT: Duration = Duration::from_secs(15);
const QUIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a configuration transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigureResult {
    /// Commit was requested and the commit step went through.
    pub committed: bool,

    /// Every step in order, including enter, commit/discard and exit.
    pub steps: Vec<CommandRecord>,
}

impl SrosSession {
    /// Apply `commands` in exclusive configuration mode.
    ///
    /// With `commit` false the candidate is discarded instead. Device error
    /// text in a step's output is reported as-is; only transport failures
    /// (timeouts, a dead channel) turn a step into an error record.
    pub async fn configure(&self, commands: &[String], commit: bool) -> Result<ConfigureResult> {
        let guard = self.channel().lock().await;
        let mut steps = Vec::with_capacity(commands.len() + 3);

        let enter = match self.send_observed(&guard, ENTER_EXCLUSIVE, ENTER_TIMEOUT).await {
            Ok(response) => response,
            Err(e) => {
                // The device may have entered exclusive mode without answering
                warn!("{} failed: {}; attempting {}", ENTER_EXCLUSIVE, e, QUIT_CONFIG);
                if let Err(quit) = self.send_observed(&guard, QUIT_CONFIG, QUIT_TIMEOUT).await {
                    warn!("{} after failed enter also failed: {}", QUIT_CONFIG, quit);
                }
                return Err(e);
            }
        };
        if !self.in_configuration().await {
            // Typically another session holds the exclusive lock
            warn!("exclusive configuration refused: {}", enter.result);
            let reason = if enter.result.is_empty() {
                "exclusive configuration mode not entered".to_string()
            } else {
                enter.result
            };
            steps.push(CommandRecord::failed(ENTER_EXCLUSIVE, reason));
            return Ok(ConfigureResult {
                committed: false,
                steps,
            });
        }
        steps.push(CommandRecord::ok(ENTER_EXCLUSIVE, enter.result));

        for command in commands {
            let record = match self.send_observed(&guard, command, COMMAND_TIMEOUT).await {
                Ok(response) => CommandRecord::ok(command.as_str(), response.result),
                Err(e) => {
                    warn!("{:?} failed, continuing: {}", command, e);
                    CommandRecord::failed(command.as_str(), e.to_string())
                }
            };
            steps.push(record);
        }

        let (finish, finish_timeout) = if commit {
            (COMMIT, COMMIT_TIMEOUT)
        } else {
            (DISCARD, DISCARD_TIMEOUT)
        };
        debug!("finishing transaction with {}", finish);
        let finished = match self.send_observed(&guard, finish, finish_timeout).await {
            Ok(response) => {
                steps.push(CommandRecord::ok(finish, response.result));
                true
            }
            Err(e) => {
                warn!("{} failed: {}", finish, e);
                steps.push(CommandRecord::failed(finish, e.to_string()));
                false
            }
        };

        match self.send_observed(&guard, QUIT_CONFIG, QUIT_TIMEOUT).await {
            Ok(response) => steps.push(CommandRecord::ok(QUIT_CONFIG, response.result)),
            Err(e) => {
                let reason = e.to_string();
                steps.push(CommandRecord::failed(QUIT_CONFIG, reason.clone()));
                return Err(DriverError::ConfigExitFailed { reason, steps }.into());
            }
        }

        if self.in_configuration().await {
            return Err(DriverError::ConfigExitFailed {
                reason: "prompt still shows configuration mode".to_string(),
                steps,
            }
            .into());
        }

        Ok(ConfigureResult {
            committed: commit && finished,
            steps,
        })
    }
}
