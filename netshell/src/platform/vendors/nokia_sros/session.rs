//! Nokia SR OS MD-CLI session.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use super::platform::{extract_hostname, is_config_prompt, parse_pwc, prompt_context, unpaged};
use crate::channel::{ExecGuard, PtyChannel, clean_output};
use crate::driver::{CommandRecord, DeviceProtocol, DeviceType, Response};
use crate::error::{DriverError, Result};
use crate::platform::PlatformDefinition;

const BANNER_TIMEOUT: Duration = Duration::from_secs(30);
const SETUP_TIMEOUT: Duration = Duration::from_secs(10);
const PWC_TIMEOUT: Duration = Duration::from_secs(10);
const ROLLBACK_TIMEOUT: Duration = Duration::from_secs(30);

const DISABLE_PAGING: &str = "environment more false";

/// What the session last saw of the device's CLI state.
#[derive(Debug, Clone, Default)]
pub(crate) struct CliState {
    pub(crate) hostname: Option<String>,
    pub(crate) context: String,
    pub(crate) configuring: bool,
}

/// An SR OS MD-CLI shell.
pub struct SrosSession {
    channel: PtyChannel,
    definition: PlatformDefinition,
    state: Mutex<CliState>,
}

impl SrosSession {
    pub fn new(channel: PtyChannel, definition: PlatformDefinition) -> Self {
        Self {
            channel,
            definition,
            state: Mutex::new(CliState {
                context: "/".to_string(),
                ..CliState::default()
            }),
        }
    }

    /// Hostname parsed from the login prompt.
    pub async fn hostname(&self) -> Option<String> {
        self.state.lock().await.hostname.clone()
    }

    /// Context path as of the last prompt seen.
    pub async fn current_context(&self) -> String {
        self.state.lock().await.context.clone()
    }

    /// Whether the last prompt seen was in a configuration mode.
    pub async fn in_configuration(&self) -> bool {
        self.state.lock().await.configuring
    }

    /// Track configuration mode and context from a response's prompt.
    pub(crate) async fn observe(&self, response: &Response) {
        if response.prompt.is_empty() {
            return;
        }
        let mut state = self.state.lock().await;
        state.configuring = is_config_prompt(&response.prompt);
        if let Some(context) = prompt_context(&response.prompt) {
            state.context = context;
        }
    }

    /// Send under an already-held guard and track the prompt.
    pub(crate) async fn send_observed(
        &self,
        guard: &ExecGuard<'_>,
        command: &str,
        timeout: Duration,
    ) -> Result<Response> {
        let response = guard.send_command(command, timeout).await?;
        self.observe(&response).await;
        Ok(response)
    }

    /// Run an operational command.
    ///
    /// Show commands get `| no-more` appended unless they already ask for
    /// unpaged output.
    pub async fn cli(&self, command: &str, timeout: Duration) -> Result<Response> {
        self.send_command(&unpaged(command), timeout).await
    }

    /// Ask the device for its present working context.
    pub async fn get_context(&self) -> Result<String> {
        let response = self.send_command("pwc", PWC_TIMEOUT).await?;
        let context = parse_pwc(&response.result);
        self.state.lock().await.context = context.clone();
        Ok(context)
    }

    /// Revert to a saved configuration checkpoint.
    pub async fn rollback(&self, index: u32) -> Result<Response> {
        info!("rolling back to checkpoint {}", index);
        self.send_command(&format!("rollback {}", index), ROLLBACK_TIMEOUT)
            .await
    }

    async fn best_effort(&self, guard: &ExecGuard<'_>, command: &str) {
        match self.send_observed(guard, command, SETUP_TIMEOUT).await {
            Ok(response) if !response.is_success() => {
                warn!("{:?} rejected: {}", command, response.result);
            }
            Ok(_) => {}
            Err(e) => warn!("{:?} failed: {}", command, e),
        }
    }
}

impl DeviceProtocol for SrosSession {
    fn device_type(&self) -> DeviceType {
        DeviceType::Sros
    }

    fn channel(&self) -> &PtyChannel {
        &self.channel
    }

    async fn negotiate(&self) -> Result<()> {
        let guard = self.channel.lock().await;

        let banner = guard.wait_for_prompt(BANNER_TIMEOUT).await?;
        let login = clean_output(&banner, "", guard.prompt());
        let hostname = extract_hostname(&login.prompt);
        match &hostname {
            Some(name) => debug!("logged in to {}", name),
            None => warn!("could not read hostname from prompt {:?}", login.prompt),
        }
        let left_in_config = is_config_prompt(&login.prompt);
        self.state.lock().await.hostname = hostname;

        self.send_observed(&guard, DISABLE_PAGING, SETUP_TIMEOUT).await?;

        for command in &self.definition.on_open_commands {
            self.best_effort(&guard, command).await;
        }

        if left_in_config {
            info!("session opened in configuration mode, leaving it");
            self.best_effort(&guard, "discard").await;
            self.best_effort(&guard, "quit-config").await;
        }

        self.send_observed(&guard, "exit all", SETUP_TIMEOUT).await?;
        Ok(())
    }

    async fn send_command(&self, command: &str, timeout: Duration) -> Result<Response> {
        let guard = self.channel.lock().await;
        self.send_observed(&guard, command, timeout).await
    }

    async fn send_commands(
        &self,
        commands: &[String],
        timeout: Duration,
    ) -> Result<Vec<CommandRecord>> {
        if !self.channel.is_connected() {
            return Err(DriverError::NotConnected.into());
        }

        let guard = self.channel.lock().await;
        let mut records = Vec::with_capacity(commands.len());
        for command in commands {
            let record = match self.send_observed(&guard, command, timeout).await {
                Ok(response) => CommandRecord::from_response(response),
                Err(e) => CommandRecord::failed(command.as_str(), e.to_string()),
            };
            records.push(record);
        }
        Ok(records)
    }
}
