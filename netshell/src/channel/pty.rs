//! Prompt-synchronized command execution over a shell channel.
//!
//! A [`PtyChannel`] owns the write half of a shell, a background reader
//! draining the read half into a shared [`PatternBuffer`], and the active
//! prompt pattern. The prompt lives behind the execution lock, so holding
//! an [`ExecGuard`] is the only way to send anything: two commands can
//! never interleave on one channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, trace, warn};
use regex::bytes::Regex;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::buffer::PatternBuffer;
use super::reader::BufferedReader;
use super::sanitize::clean_output;
use super::{ShellReader, ShellWriter};
use crate::driver::Response;
use crate::error::{ChannelError, DriverError, Result};

/// Tuning knobs for a channel.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Bytes from the end of the buffer searched for the prompt.
    pub search_depth: usize,

    /// How often a waiting command re-checks the buffer.
    pub poll_interval: Duration,

    /// Upper bound on a single read by the reader task, so cancellation
    /// is noticed promptly.
    pub read_timeout: Duration,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            search_depth: 1000,
            poll_interval: Duration::from_millis(20),
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// Interactive shell channel with a single execution lock.
pub struct PtyChannel {
    writer: Box<dyn ShellWriter>,
    buffer: Arc<Mutex<PatternBuffer>>,

    /// Active prompt pattern; its mutex is the execution lock.
    prompt: Mutex<Regex>,

    /// Output substrings that mark a command as failed.
    failed_when_contains: Vec<String>,

    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    config: PtyConfig,
}

impl PtyChannel {
    /// Start reading from `reader` in the background and wrap `writer`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        reader: Box<dyn ShellReader>,
        writer: Box<dyn ShellWriter>,
        prompt: Regex,
        failed_when_contains: Vec<String>,
        config: PtyConfig,
    ) -> Self {
        let buffer = Arc::new(Mutex::new(PatternBuffer::new(config.search_depth)));
        let connected = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let reader_task = BufferedReader {
            reader,
            buffer: buffer.clone(),
            connected: connected.clone(),
            cancel: cancel.clone(),
            read_timeout: config.read_timeout,
        }
        .spawn();

        Self {
            writer,
            buffer,
            prompt: Mutex::new(prompt),
            failed_when_contains,
            connected,
            cancel,
            reader_task: Mutex::new(Some(reader_task)),
            config,
        }
    }

    /// Acquire the execution lock.
    pub async fn lock(&self) -> ExecGuard<'_> {
        ExecGuard {
            channel: self,
            prompt: self.prompt.lock().await,
        }
    }

    /// Send one command under the execution lock.
    pub async fn send_command(&self, command: &str, timeout: Duration) -> Result<Response> {
        self.lock().await.send_command(command, timeout).await
    }

    /// Send raw text under the execution lock.
    pub async fn send_raw(&self, text: &str, wait: Duration) -> Result<String> {
        self.lock().await.send_raw(text, wait).await
    }

    /// Whether the reader is alive and the connection is up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && self.writer.is_alive()
    }

    pub fn config(&self) -> &PtyConfig {
        &self.config
    }

    /// Stop the reader and tear down the connection.
    ///
    /// Commands in flight observe the disconnect and fail. Safe to call
    /// more than once.
    pub async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        self.cancel.cancel();

        if let Some(task) = self.reader_task.lock().await.take() {
            if let Err(e) = task.await {
                warn!("reader task ended abnormally: {}", e);
            }
        }

        self.writer.close().await
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DriverError::NotConnected.into())
        }
    }

    fn detect_failure(&self, output: &str) -> Option<&str> {
        self.failed_when_contains
            .iter()
            .find(|pattern| output.contains(pattern.as_str()))
            .map(String::as_str)
    }
}

impl Drop for PtyChannel {
    fn drop(&mut self) {
        if self.connected.load(Ordering::Acquire) {
            warn!("channel dropped without close(); stopping reader");
        }
        self.cancel.cancel();
    }
}

/// Exclusive access to a channel for one logical operation.
///
/// Multi-step exchanges (prompt negotiation, configuration transactions)
/// hold a single guard throughout so nothing else can interleave.
pub struct ExecGuard<'a> {
    channel: &'a PtyChannel,
    prompt: MutexGuard<'a, Regex>,
}

impl ExecGuard<'_> {
    /// The active prompt pattern.
    pub fn prompt(&self) -> &Regex {
        &self.prompt
    }

    /// Replace the active prompt pattern.
    pub fn set_prompt(&mut self, prompt: Regex) {
        debug!("prompt pattern now {}", prompt.as_str());
        *self.prompt = prompt;
    }

    /// Write text verbatim.
    pub async fn write(&self, text: &str) -> Result<()> {
        self.channel.writer.write(text.as_bytes()).await
    }

    /// Discard everything buffered so far.
    pub async fn clear(&self) {
        self.channel.buffer.lock().await.clear();
    }

    /// Wait for the active prompt without sending anything.
    pub async fn wait_for_prompt(&self, timeout: Duration) -> Result<Vec<u8>> {
        self.read_until(&self.prompt, timeout).await
    }

    /// Poll the buffer until `pattern` matches its tail, then claim it.
    ///
    /// On timeout the buffer is left intact and the error carries exactly
    /// what has been read so far.
    pub async fn read_until(&self, pattern: &Regex, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;

        loop {
            {
                let mut buffer = self.channel.buffer.lock().await;
                if buffer.contains_prompt(pattern) {
                    return Ok(buffer.take());
                }
                if !self.channel.connected.load(Ordering::Acquire) {
                    return Err(ChannelError::Closed {
                        partial: buffer.as_str_lossy().into_owned(),
                    }
                    .into());
                }
                if Instant::now() >= deadline {
                    return Err(ChannelError::PatternTimeout {
                        timeout,
                        partial: buffer.as_str_lossy().into_owned(),
                    }
                    .into());
                }
            }

            tokio::time::sleep(self.channel.config.poll_interval).await;
        }
    }

    /// Send a command and wait for the prompt to come back.
    pub async fn send_command(&self, command: &str, timeout: Duration) -> Result<Response> {
        self.channel.ensure_connected()?;

        let start = Instant::now();
        self.clear().await;

        debug!("send_command: {:?}", command);
        self.write(&format!("{}\n", command)).await?;

        let data = self.read_until(&self.prompt, timeout).await?;
        let elapsed = start.elapsed();

        let raw_result = String::from_utf8_lossy(&data).into_owned();
        let clean = clean_output(&data, command, &self.prompt);
        trace!("{:?} -> {} bytes in {:?}", command, data.len(), elapsed);

        if let Some(pattern) = self.channel.detect_failure(&clean.result) {
            return Ok(Response::failed(
                command,
                clean.result,
                raw_result,
                clean.prompt,
                elapsed,
                pattern,
            ));
        }

        Ok(Response::new(command, clean.result, raw_result, clean.prompt, elapsed))
    }

    /// Write text verbatim, wait, then claim whatever has arrived.
    ///
    /// No prompt synchronization and no sanitizing: this is for talking to
    /// things that are not the shell (pagers, confirmation prompts).
    pub async fn send_raw(&self, text: &str, wait: Duration) -> Result<String> {
        self.channel.ensure_connected()?;

        debug!("send_raw: {:?}", text);
        self.write(text).await?;
        tokio::time::sleep(wait).await;

        let data = self.channel.buffer.lock().await.take();
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::{MockRemote, mock_shell};

    fn prompt() -> Regex {
        Regex::new(r"host\$\s*\z").unwrap()
    }

    fn fast_config() -> PtyConfig {
        PtyConfig {
            poll_interval: Duration::from_millis(5),
            read_timeout: Duration::from_millis(10),
            ..PtyConfig::default()
        }
    }

    fn echo_shell() -> (PtyChannel, MockRemote) {
        let (reader, writer, remote) = mock_shell(|line| match line {
            "sleep" => None,
            "boom" => Some("boom\r\nboom: command not found\r\nhost$ ".to_string()),
            _ => Some(format!("{}\r\nout:{}\r\nhost$ ", line, line)),
        });
        let channel = PtyChannel::open(
            Box::new(reader),
            Box::new(writer),
            prompt(),
            vec!["command not found".to_string()],
            fast_config(),
        );
        (channel, remote)
    }

    #[tokio::test]
    async fn test_send_command_returns_clean_output() {
        let (channel, remote) = echo_shell();

        let response = channel
            .send_command("uptime", Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(response.result, "out:uptime");
        assert_eq!(response.prompt, "host$");
        assert!(response.is_success());
        assert_eq!(remote.lines(), vec!["uptime"]);
    }

    #[tokio::test]
    async fn test_failure_substring_marks_response() {
        let (channel, _remote) = echo_shell();

        let response = channel.send_command("boom", Duration::from_secs(1)).await.unwrap();
        assert!(!response.is_success());
        assert_eq!(response.failure_message.as_deref(), Some("command not found"));
    }

    #[tokio::test]
    async fn test_stale_output_never_leaks_into_next_command() {
        let (channel, remote) = echo_shell();

        remote.push("stale noise\r\n");
        tokio::time::sleep(Duration::from_millis(30)).await;

        let response = channel.send_command("ls", Duration::from_secs(1)).await.unwrap();
        assert!(!response.raw_result.contains("stale"));
        assert_eq!(response.result, "out:ls");
    }

    #[tokio::test]
    async fn test_output_claimed_exactly_once() {
        let (channel, _remote) = echo_shell();

        let first = channel.send_command("one", Duration::from_secs(1)).await.unwrap();
        let second = channel.send_command("two", Duration::from_secs(1)).await.unwrap();

        assert_eq!(first.result, "out:one");
        assert_eq!(second.result, "out:two");
        assert!(!second.raw_result.contains("one"));
    }

    #[tokio::test]
    async fn test_timeout_carries_exactly_what_arrived() {
        let (channel, remote) = echo_shell();

        let guard = channel.lock().await;
        let pending = guard.send_command("sleep", Duration::from_millis(150));
        let push = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            remote.push("partial ");
            remote.push("line");
        };
        let (result, _) = tokio::join!(pending, push);

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.partial_output(), Some("partial line"));
    }

    #[tokio::test]
    async fn test_prompt_split_across_chunks() {
        let (reader, writer, remote) = mock_shell(|_| None);
        let channel = PtyChannel::open(
            Box::new(reader),
            Box::new(writer),
            prompt(),
            Vec::new(),
            fast_config(),
        );

        let guard = channel.lock().await;
        let pending = guard.send_command("date", Duration::from_secs(1));
        let push = async {
            remote.push("date\r\nThu Jan  1\r\nho");
            tokio::time::sleep(Duration::from_millis(30)).await;
            remote.push("st$ ");
        };
        let (result, _) = tokio::join!(pending, push);

        assert_eq!(result.unwrap().result, "Thu Jan  1");
    }

    #[tokio::test]
    async fn test_hangup_fails_in_flight_command() {
        let (channel, remote) = echo_shell();

        let guard = channel.lock().await;
        let pending = guard.send_command("sleep", Duration::from_secs(5));
        let hangup = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.push("half");
            remote.hangup();
        };
        let (result, _) = tokio::join!(pending, hangup);

        let err = result.unwrap_err();
        assert!(!err.is_timeout());
        assert_eq!(err.partial_output(), Some("half"));
        drop(guard);
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_closed_channel_rejects_commands() {
        let (channel, remote) = echo_shell();

        channel.close().await.unwrap();
        assert!(remote.is_closed());
        assert!(!channel.is_connected());

        let err = channel.send_command("ls", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Driver(DriverError::NotConnected)
        ));

        // Second close is harmless
        channel.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_raw_returns_unsanitized_bytes() {
        let (reader, writer, remote) = mock_shell(|_| None);
        let channel = PtyChannel::open(
            Box::new(reader),
            Box::new(writer),
            prompt(),
            Vec::new(),
            fast_config(),
        );

        let guard = channel.lock().await;
        let pending = guard.send_raw("q", Duration::from_millis(80));
        let reply = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.push("\x1b[7m--More--\x1b[0m\r");
        };
        let (received, _) = tokio::join!(pending, reply);

        assert_eq!(received.unwrap(), "\x1b[7m--More--\x1b[0m\r");
        assert_eq!(remote.raw(), b"q");
    }

    #[tokio::test]
    async fn test_execution_lock_serializes_callers() {
        let (channel, remote) = echo_shell();
        let channel = Arc::new(channel);

        let tasks: Vec<_> = (0..5)
            .map(|i| {
                let channel = channel.clone();
                tokio::spawn(async move {
                    channel
                        .send_command(&format!("cmd{}", i), Duration::from_secs(2))
                        .await
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            let response = task.await.unwrap().unwrap();
            assert_eq!(response.result, format!("out:cmd{}", i));
        }
        assert_eq!(remote.lines().len(), 5);
    }
}
