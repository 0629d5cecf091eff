//! Nokia SR OS platform definition (MD-CLI).
//!
//! MD-CLI prompts span two lines: the context line, optionally prefixed
//! with configuration-mode markers, and the `CPM:user@host#` line.
//!
//! # Prompt Examples
//!
//! ```text
//! [/]                                  # operational (line 1)
//! A:admin@router#                      # operational (line 2)
//!
//! (ex)[/]                              # exclusive config at root
//! A:admin@router#
//!
//! *(ex)[/configure router "Base"]      # config with path + uncommitted
//! A:admin@router#
//! ```
//!
//! Prompt patterns adapted from
//! [scrapli](https://github.com/scrapli/scrapli_community/blob/main/scrapli_community/nokia/sros/nokia_sros.py).

use std::sync::LazyLock;

use regex::Regex as TextRegex;
use regex::bytes::Regex;

use crate::driver::DeviceType;
use crate::platform::PlatformDefinition;

/// Platform name for Nokia SR OS.
pub const PLATFORM_NAME: &str = "nokia_sros";

/// Two-line MD-CLI prompt in any mode.
///
/// `(?m)` makes `^` match at line starts; `\z` pins the prompt to the end
/// of the output.
pub(crate) const PROMPT: &str = r"(?mi)^!?\*?(?:\((?:ex|gl|pr|ro)(?::[\w-]+)?\))?\[.*\]\r?\n\*?[abcd]:[\w._-]+@[\w._-]+#\s*\z";

static HOSTNAME: LazyLock<TextRegex> =
    LazyLock::new(|| TextRegex::new(r"(?i)[abcd]:[^\s#@]+@([^\s#]+)#").expect("valid hostname pattern"));

static CONFIG_MODE: LazyLock<TextRegex> = LazyLock::new(|| {
    TextRegex::new(r"\((?:ex|gl|pr|ro)(?::[\w-]+)?\)\[").expect("valid configuration mode pattern")
});

static PROMPT_CONTEXT: LazyLock<TextRegex> =
    LazyLock::new(|| TextRegex::new(r"\[(.*)\]").expect("valid prompt context pattern"));

static PWC_HEADER: LazyLock<TextRegex> = LazyLock::new(|| {
    TextRegex::new(r"(?i)(?:present working|current) context:\s*(.*)").expect("valid pwc pattern")
});

/// Create the Nokia SR OS platform definition.
pub fn platform() -> PlatformDefinition {
    let prompt = Regex::new(PROMPT).expect("valid MD-CLI prompt pattern");

    PlatformDefinition::new(PLATFORM_NAME, DeviceType::Sros, prompt)
        .with_failure_pattern("MINOR:")
        .with_failure_pattern("MAJOR:")
        .with_failure_pattern("CRITICAL:")
        .with_failure_pattern("Error:")
        .with_failure_pattern("Bad Command:")
        .with_on_open_command("environment command-completion space false")
        .with_on_open_command("environment console width 512")
        .with_terminal_size(512, 24)
}

/// Hostname from the `CPM:user@host#` prompt line.
pub(crate) fn extract_hostname(text: &str) -> Option<String> {
    HOSTNAME
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether a prompt carries a configuration-mode marker.
pub(crate) fn is_config_prompt(prompt: &str) -> bool {
    CONFIG_MODE.is_match(prompt)
}

/// Context path shown in the prompt's first line.
pub(crate) fn prompt_context(prompt: &str) -> Option<String> {
    PROMPT_CONTEXT
        .captures(prompt)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Add `| no-more` to show commands that do not already disable paging.
pub(crate) fn unpaged(command: &str) -> String {
    let command = command.trim();
    let is_show = command
        .split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case("show"));

    if is_show && !command.contains("no-more") {
        format!("{} | no-more", command)
    } else {
        command.to_string()
    }
}

/// Extract the path from `pwc` output.
///
/// Falls back to the whole (trimmed) output when no header is present.
pub(crate) fn parse_pwc(output: &str) -> String {
    let mut lines = output.lines();
    while let Some(line) = lines.next() {
        let Some(caps) = PWC_HEADER.captures(line) else {
            continue;
        };
        let inline = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if !inline.is_empty() {
            return inline.to_string();
        }
        if let Some(next) = lines
            .by_ref()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.chars().all(|c| c == '-'))
        {
            return next.to_string();
        }
    }

    output.trim().to_string()
}
