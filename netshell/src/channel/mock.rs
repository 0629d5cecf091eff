//! Scripted shell used by unit tests in place of an SSH channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::{ShellReader, ShellWriter};
use crate::error::{Result, TransportError};

enum Event {
    Data(Bytes),
    Eof,
    Fail,
}

type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

pub(crate) struct MockReader {
    rx: UnboundedReceiver<Event>,
}

#[async_trait]
impl ShellReader for MockReader {
    async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        match self.rx.recv().await {
            Some(Event::Data(data)) => Ok(Some(data)),
            Some(Event::Fail) => Err(TransportError::Disconnected.into()),
            Some(Event::Eof) | None => Ok(None),
        }
    }
}

struct WriterState {
    pending: String,
    responder: Responder,
}

/// Writer that feeds every complete line to a responder closure and
/// pushes whatever it returns back into the reader.
pub(crate) struct MockWriter {
    tx: UnboundedSender<Event>,
    state: Mutex<WriterState>,
    log: Arc<Mutex<Log>>,
    closed: Arc<AtomicBool>,
}

#[derive(Default)]
struct Log {
    raw: Vec<u8>,
    lines: Vec<String>,
}

#[async_trait]
impl ShellWriter for MockWriter {
    async fn write(&self, data: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Disconnected.into());
        }
        self.log.lock().unwrap().raw.extend_from_slice(data);

        let mut state = self.state.lock().unwrap();
        state.pending.push_str(&String::from_utf8_lossy(data));
        while let Some(pos) = state.pending.find('\n') {
            let line: String = state.pending.drain(..=pos).collect();
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            self.log.lock().unwrap().lines.push(line.clone());
            if let Some(reply) = (state.responder)(&line) {
                let _ = self.tx.send(Event::Data(Bytes::from(reply)));
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        let _ = self.tx.send(Event::Eof);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

/// Test-side handle onto the fake remote end.
#[derive(Clone)]
pub(crate) struct MockRemote {
    tx: UnboundedSender<Event>,
    log: Arc<Mutex<Log>>,
    closed: Arc<AtomicBool>,
}

impl MockRemote {
    /// Emit unsolicited output.
    pub(crate) fn push(&self, text: &str) {
        let _ = self.tx.send(Event::Data(Bytes::copy_from_slice(text.as_bytes())));
    }

    /// Remote end closes the stream.
    pub(crate) fn hangup(&self) {
        let _ = self.tx.send(Event::Eof);
    }

    /// Remote end errors out.
    pub(crate) fn fail(&self) {
        let _ = self.tx.send(Event::Fail);
    }

    /// Complete lines written so far.
    pub(crate) fn lines(&self) -> Vec<String> {
        self.log.lock().unwrap().lines.clone()
    }

    /// Every byte written so far.
    pub(crate) fn raw(&self) -> Vec<u8> {
        self.log.lock().unwrap().raw.clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

pub(crate) fn mock_shell(
    responder: impl FnMut(&str) -> Option<String> + Send + 'static,
) -> (MockReader, MockWriter, MockRemote) {
    let (tx, rx) = unbounded_channel();
    let log = Arc::new(Mutex::new(Log::default()));
    let closed = Arc::new(AtomicBool::new(false));

    let writer = MockWriter {
        tx: tx.clone(),
        state: Mutex::new(WriterState {
            pending: String::new(),
            responder: Box::new(responder),
        }),
        log: log.clone(),
        closed: closed.clone(),
    };

    (MockReader { rx }, writer, MockRemote { tx, log, closed })
}

/// Minimal Linux host: honours PS1, a handful of commands and a tiny
/// filesystem reachable through the base64 upload pipeline and `cat`.
pub(crate) fn linux_host(initial_prompt: &str) -> impl FnMut(&str) -> Option<String> + Send + 'static {
    let mut prompt = initial_prompt.to_string();
    let mut files: HashMap<String, Vec<u8>> = HashMap::new();

    move |line: &str| {
        let cmd = line.trim();
        let mut reply = format!("{}\r\n", line);

        if cmd.starts_with("sleep") {
            return Some(reply);
        }

        if let Some(pos) = cmd.find("PS1=") {
            prompt = shell_word(&cmd[pos + 4..]);
        } else if let Some(upload) = parse_upload(cmd) {
            let (path, data, append) = upload;
            let entry = files.entry(path).or_default();
            if !append {
                entry.clear();
            }
            entry.extend_from_slice(&data);
        } else if let Some(path) = cmd.strip_prefix(": > ") {
            files.insert(shell_word(path), Vec::new());
        } else if let Some(path) = cmd.strip_prefix("cat '") {
            let path = shell_word(&format!("'{}", path));
            match files.get(&path) {
                Some(data) => reply.push_str(&String::from_utf8_lossy(data).replace('\n', "\r\n")),
                None => reply.push_str(&format!("cat: {}: No such file or directory\r\n", path)),
            }
        } else if let Some(text) = cmd.strip_prefix("echo ") {
            reply.push_str(&format!("{}\r\n", text));
        } else if cmd == "hostname" {
            reply.push_str("lab-host\r\n");
        } else if cmd == "uname -a" {
            reply.push_str("Linux lab-host 6.1.0-18-amd64 #1 SMP x86_64 GNU/Linux\r\n");
        } else if cmd.starts_with("cat /etc/os-release") {
            reply.push_str("PRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\r\nNAME=\"Debian GNU/Linux\"\r\n");
        } else if cmd.starts_with("export ") || cmd.starts_with("unset ") || cmd.is_empty() {
            // environment tweaks print nothing
        } else {
            let name = cmd.split_whitespace().next().unwrap_or_default();
            reply.push_str(&format!("bash: {}: command not found\r\n", name));
        }

        reply.push_str(&prompt);
        Some(reply)
    }
}

/// Read one shell word, honouring single quotes and concatenation.
fn shell_word(input: &str) -> String {
    let mut word = String::new();
    let mut quoted = false;
    for c in input.chars() {
        match c {
            '\'' => quoted = !quoted,
            ' ' | ';' if !quoted => break,
            _ => word.push(c),
        }
    }
    word
}

fn parse_upload(cmd: &str) -> Option<(String, Vec<u8>, bool)> {
    let rest = cmd.strip_prefix("printf '%s' '")?;
    let (encoded, rest) = rest.split_once('\'')?;
    let rest = rest.trim_start().strip_prefix("| base64 -d ")?;
    let (append, path) = match rest.strip_prefix(">>") {
        Some(path) => (true, path),
        None => (false, rest.strip_prefix('>')?),
    };
    let data = BASE64.decode(encoded).ok()?;
    Some((shell_word(path.trim_start()), data, append))
}

/// Minimal SR OS MD-CLI node with an exclusive candidate datastore.
#[derive(Debug, Clone)]
pub(crate) struct SrosNode {
    pub(crate) hostname: String,
    pub(crate) context: String,
    pub(crate) configuring: bool,
    pub(crate) dirty: bool,
    pub(crate) locked_elsewhere: bool,
    /// Commands that never get an answer.
    pub(crate) unresponsive: Vec<String>,
    /// Commands that take effect but never get an answer.
    pub(crate) silent: Vec<String>,
    pub(crate) committed: Vec<String>,
    candidate: Vec<String>,
}

impl SrosNode {
    pub(crate) fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            context: "/".to_string(),
            configuring: false,
            dirty: false,
            locked_elsewhere: false,
            unresponsive: Vec::new(),
            silent: Vec::new(),
            committed: Vec::new(),
            candidate: Vec::new(),
        }
    }

    pub(crate) fn prompt(&self) -> String {
        let mode = match (self.configuring, self.dirty) {
            (true, true) => "*(ex)",
            (true, false) => "(ex)",
            _ => "",
        };
        format!("\r\n{}[{}]\r\nA:admin@{}# ", mode, self.context, self.hostname)
    }

    fn respond(&mut self, cmd: &str) -> Option<String> {
        if self.unresponsive.iter().any(|c| c == cmd) {
            return None;
        }

        let silent = self.silent.iter().any(|c| c == cmd);
        let body = match cmd {
            c if c.starts_with("environment ") => String::new(),
            "edit-config exclusive" if self.locked_elsewhere => {
                "MINOR: MGMT_CORE #2052: Exclusive datastore access unavailable".to_string()
            }
            "edit-config exclusive" => {
                self.configuring = true;
                "INFO: CLI #2060: Entering exclusive configuration mode".to_string()
            }
            "commit" if self.configuring => {
                self.committed.append(&mut self.candidate);
                self.dirty = false;
                String::new()
            }
            "discard" if self.configuring => {
                self.candidate.clear();
                self.dirty = false;
                String::new()
            }
            "quit-config" if self.configuring => {
                self.configuring = false;
                self.context = "/".to_string();
                "INFO: CLI #2064: Exiting exclusive configuration mode".to_string()
            }
            "exit all" => {
                self.context = "/".to_string();
                String::new()
            }
            "pwc" => format!(
                "---------------------------------------------------------------\r\n\
                 Present Working Context:\r\n{}\r\n\
                 ---------------------------------------------------------------",
                self.context
            ),
            c if c.starts_with("show ") && !c.contains("no-more") => {
                return Some("Press any key to continue (Q to quit)".to_string());
            }
            c if c.starts_with("show version") => {
                "TiMOS-B-23.10.R1 both/x86_64 Nokia 7750 SR Copyright (c) 2000-2023 Nokia.".to_string()
            }
            c if c.starts_with("rollback ") => {
                format!("Executing rollback {}...\r\nRollback completed", &c[9..])
            }
            c if self.configuring => {
                self.candidate.push(c.to_string());
                self.dirty = true;
                if c.starts_with("router ") {
                    self.context = "/configure router \"Base\"".to_string();
                }
                String::new()
            }
            c => format!("MINOR: MGMT_CORE #2201: Unknown element - '{}'", c),
        };

        if silent {
            return None;
        }

        let mut reply = format!("{}\r\n", cmd);
        if !body.is_empty() {
            reply.push_str(&body);
            reply.push_str("\r\n");
        }
        reply.push_str(&self.prompt());
        Some(reply)
    }
}

/// Responder driving a shared [`SrosNode`].
pub(crate) fn sros_node(node: Arc<Mutex<SrosNode>>) -> impl FnMut(&str) -> Option<String> + Send + 'static {
    move |line: &str| node.lock().unwrap().respond(line.trim())
}
