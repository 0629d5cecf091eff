//! Turn a raw command exchange into clean output text.

use regex::bytes::Regex;

use super::patterns::strip_control;

/// Sanitized command output together with the prompt that ended it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOutput {
    pub result: String,
    pub prompt: String,
}

/// Clean raw terminal bytes captured for `command`.
///
/// Control sequences are stripped, the trailing prompt is cut off, blank
/// lines are dropped, the first line echoing the command is dropped and so
/// is any line that by itself matches the prompt pattern.
pub fn clean_output(raw: &[u8], command: &str, prompt: &Regex) -> CleanOutput {
    let cleaned = strip_control(raw);
    let (body, prompt_text) = split_trailing_prompt(&cleaned, prompt);

    let command = command.trim();
    let mut echo_pending = !command.is_empty();
    let mut lines = Vec::new();

    for line in body.lines() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }
        if echo_pending && stripped.contains(command) {
            echo_pending = false;
            continue;
        }
        if prompt.is_match(stripped.as_bytes()) {
            continue;
        }
        lines.push(line.trim_end());
    }

    CleanOutput {
        result: lines.join("\n").trim().to_string(),
        prompt: prompt_text.trim().to_string(),
    }
}

/// Sanitize raw output, discarding the prompt text.
pub fn sanitize(raw: &[u8], command: &str, prompt: &Regex) -> String {
    clean_output(raw, command, prompt).result
}

/// Split off the last prompt match that runs to the end of the text.
///
/// Multi-line prompts never match a single line, so they have to go
/// before the text is split.
fn split_trailing_prompt<'a>(text: &'a str, prompt: &Regex) -> (&'a str, &'a str) {
    let tail_match = prompt
        .find_iter(text.as_bytes())
        .filter(|m| text[m.end()..].trim().is_empty())
        .last();

    match tail_match {
        Some(m) => match (text.get(..m.start()), text.get(m.start()..)) {
            (Some(body), Some(prompt_text)) => (body, prompt_text),
            _ => (text, ""),
        },
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_prompt() -> Regex {
        Regex::new(r"NETSHELL\$\s*\z").unwrap()
    }

    fn sros_prompt() -> Regex {
        Regex::new(
            r"(?mi)^[!*]*(?:\((?:ex|gl|pr|ro)(?::[\w-]+)?\))?\[.*\]\r?\n\*?[abcd]:[\w._-]+@[\w._-]+#\s*\z",
        )
        .unwrap()
    }

    #[test]
    fn test_echo_and_prompt_removed() {
        let raw = b"echo hi\r\nhi\r\nNETSHELL$ ";
        let clean = clean_output(raw, "echo hi", &linux_prompt());
        assert_eq!(clean.result, "hi");
        assert_eq!(clean.prompt, "NETSHELL$");
    }

    #[test]
    fn test_echo_dropped_only_once() {
        let raw = b"echo echo\r\necho\r\nNETSHELL$ ";
        assert_eq!(sanitize(raw, "echo echo", &linux_prompt()), "echo");
    }

    #[test]
    fn test_prompt_glued_to_output() {
        // Output without a trailing newline runs straight into the prompt
        let raw = b"cat /tmp/f\r\nhello\r\nworldNETSHELL$ ";
        assert_eq!(sanitize(raw, "cat /tmp/f", &linux_prompt()), "hello\nworld");
    }

    #[test]
    fn test_blank_lines_and_controls_dropped() {
        let raw = b"ls\r\n\r\n\x1b[01;34mdir\x1b[0m  file\r\n\r\n\x1b]0;title\x07NETSHELL$ ";
        assert_eq!(sanitize(raw, "ls", &linux_prompt()), "dir  file");
    }

    #[test]
    fn test_empty_command_keeps_all_lines() {
        let raw = b"banner line\r\nNETSHELL$ ";
        assert_eq!(sanitize(raw, "", &linux_prompt()), "banner line");
    }

    #[test]
    fn test_multiline_sros_prompt_removed() {
        let raw = b"show version | no-more\r\nTiMOS-B-23.10.R1\r\n\r\n[/]\r\nA:admin@pe1# ";
        let clean = clean_output(raw, "show version | no-more", &sros_prompt());
        assert_eq!(clean.result, "TiMOS-B-23.10.R1");
        assert_eq!(clean.prompt, "[/]\nA:admin@pe1#");
    }

    #[test]
    fn test_config_mode_prompt_removed() {
        let raw = b"commit\r\n\r\n*(ex)[/configure router \"Base\"]\r\nA:admin@pe1# ";
        let clean = clean_output(raw, "commit", &sros_prompt());
        assert_eq!(clean.result, "");
        assert!(clean.prompt.starts_with("*(ex)"));
    }

    #[test]
    fn test_no_output_line_matches_prompt() {
        let prompt = linux_prompt();
        let raw = b"cmd\r\nNETSHELL$\r\nreal output\r\n  NETSHELL$  \r\nNETSHELL$ ";
        let out = sanitize(raw, "cmd", &prompt);

        assert_eq!(out, "real output");
        for line in out.lines() {
            assert!(!prompt.is_match(line.trim().as_bytes()));
            assert!(!line.trim().is_empty());
        }
    }
}
