//! Per-family constants: prompts, failure markers, terminal geometry.

use regex::bytes::Regex;

use crate::driver::DeviceType;

/// Static description of a device family.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Platform name (e.g., "linux", "nokia_sros").
    pub name: String,

    pub device_type: DeviceType,

    /// Prompt recognized right after login, before any negotiation.
    pub initial_prompt: Regex,

    /// Output substrings that indicate command failure.
    pub failed_when_contains: Vec<String>,

    /// Commands run once the prompt is under control.
    pub on_open_commands: Vec<String>,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,
}

impl PlatformDefinition {
    pub fn new(name: impl Into<String>, device_type: DeviceType, initial_prompt: Regex) -> Self {
        Self {
            name: name.into(),
            device_type,
            initial_prompt,
            failed_when_contains: vec![],
            on_open_commands: vec![],
            terminal_width: 511,
            terminal_height: 24,
        }
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Set terminal dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }
}
