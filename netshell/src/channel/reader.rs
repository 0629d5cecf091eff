//! Background task that drains a shell channel into the shared buffer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, trace};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ShellReader;
use super::buffer::PatternBuffer;

/// Owns the read half of a channel for the lifetime of a session.
pub(crate) struct BufferedReader {
    pub(crate) reader: Box<dyn ShellReader>,
    pub(crate) buffer: Arc<Mutex<PatternBuffer>>,
    pub(crate) connected: Arc<AtomicBool>,
    pub(crate) cancel: CancellationToken,
    pub(crate) read_timeout: Duration,
}

impl BufferedReader {
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => {
                    trace!("reader cancelled");
                    break;
                }
                chunk = tokio::time::timeout(self.read_timeout, self.reader.read_chunk()) => chunk,
            };

            match chunk {
                // Poll window elapsed with nothing to read
                Err(_) => continue,
                Ok(Ok(Some(data))) => {
                    trace!("read {} bytes", data.len());
                    self.buffer.lock().await.extend(&data);
                }
                Ok(Ok(None)) => {
                    debug!("remote side closed the channel");
                    break;
                }
                Ok(Err(e)) => {
                    debug!("reader stopped: {}", e);
                    break;
                }
            }
        }

        self.connected.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::mock_shell;

    fn reader_for(
        reader: Box<dyn ShellReader>,
    ) -> (BufferedReader, Arc<Mutex<PatternBuffer>>, Arc<AtomicBool>, CancellationToken) {
        let buffer = Arc::new(Mutex::new(PatternBuffer::default()));
        let connected = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let task = BufferedReader {
            reader,
            buffer: buffer.clone(),
            connected: connected.clone(),
            cancel: cancel.clone(),
            read_timeout: Duration::from_millis(10),
        };
        (task, buffer, connected, cancel)
    }

    #[tokio::test]
    async fn test_chunks_appended_in_order() {
        let (reader, _writer, remote) = mock_shell(|_| None);
        let (task, buffer, _connected, cancel) = reader_for(Box::new(reader));
        let handle = task.spawn();

        remote.push("first ");
        remote.push("second");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(buffer.lock().await.as_slice(), b"first second");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_marks_disconnected() {
        let (reader, _writer, remote) = mock_shell(|_| None);
        let (task, _buffer, connected, _cancel) = reader_for(Box::new(reader));
        let handle = task.spawn();

        remote.hangup();
        handle.await.unwrap();
        assert!(!connected.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_read_error_marks_disconnected() {
        let (reader, _writer, remote) = mock_shell(|_| None);
        let (task, _buffer, connected, _cancel) = reader_for(Box::new(reader));
        let handle = task.spawn();

        remote.fail();
        handle.await.unwrap();
        assert!(!connected.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_cancel_stops_idle_reader() {
        let (reader, _writer, _remote) = mock_shell(|_| None);
        let (task, _buffer, connected, cancel) = reader_for(Box::new(reader));
        let handle = task.spawn();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reader should stop promptly")
            .unwrap();
        assert!(!connected.load(Ordering::Acquire));
    }
}
