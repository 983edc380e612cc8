//! The narrow port through which the core talks to its embedding host.

use std::io::{Result as IoResult, Write};
use std::sync::Arc;

/// Outbound calls the core makes into the host UI.
///
/// These are the only two interactions permitted. Implementations must tolerate
/// being called from several threads at once; a single `write_output` call must not
/// be torn, but ordering across concurrent writers is best effort.
pub trait HostPort: Send + Sync {
    /// Signal that the host may prompt for the next line.
    fn request_next_line(&self);

    /// Append text to the host's output stream.
    fn write_output(&self, text: &str);
}

/// Writer handed to a running applet, forwarding every write to the host eagerly.
///
/// Bytes are decoded as UTF-8. An incomplete multi-byte sequence at the end of a
/// write is held back until the next write completes it; invalid bytes are replaced
/// with U+FFFD.
pub struct OutputSink {
    host: Arc<dyn HostPort>,
    pending: Vec<u8>,
}

impl OutputSink {
    pub fn new(host: Arc<dyn HostPort>) -> Self {
        Self {
            host,
            pending: Vec::new(),
        }
    }

    /// Forward every complete character in `pending` to the host.
    ///
    /// Invalid sequences become U+FFFD in place. A trailing incomplete sequence stays
    /// pending unless `force` is set.
    fn emit(&mut self, force: bool) {
        let mut text = String::new();
        let mut consumed = 0;
        while consumed < self.pending.len() {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.pending.len();
                }
                Err(e) => {
                    let valid = &rest[..e.valid_up_to()];
                    text.push_str(&String::from_utf8_lossy(valid));
                    consumed += valid.len();
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed += len;
                        }
                        // input ended mid-sequence
                        None if force => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed = self.pending.len();
                        }
                        None => break,
                    }
                }
            }
        }
        self.pending.drain(..consumed);
        if !text.is_empty() {
            self.host.write_output(&text);
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.pending.extend_from_slice(data);
        self.emit(false);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        self.emit(true);
        Ok(())
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        self.emit(true);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::HostPort;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Fake host port recording everything the core does.
    #[derive(Default)]
    pub struct RecordingHost {
        output: Mutex<Vec<String>>,
        next_line_requests: Mutex<usize>,
        notify: Notify,
    }

    impl RecordingHost {
        pub fn output(&self) -> String {
            self.output.lock().unwrap().concat()
        }

        pub fn writes(&self) -> Vec<String> {
            self.output.lock().unwrap().clone()
        }

        pub fn next_line_requests(&self) -> usize {
            *self.next_line_requests.lock().unwrap()
        }

        /// Wait until at least `n` next-line requests have been observed.
        pub async fn wait_for_requests(&self, n: usize) {
            tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    let notified = self.notify.notified();
                    if self.next_line_requests() >= n {
                        return;
                    }
                    notified.await;
                }
            })
            .await
            .expect("timed out waiting for next-line requests");
        }
    }

    impl HostPort for RecordingHost {
        fn request_next_line(&self) {
            *self.next_line_requests.lock().unwrap() += 1;
            self.notify.notify_waiters();
        }

        fn write_output(&self, text: &str) {
            self.output.lock().unwrap().push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingHost;
    use super::*;

    #[test]
    fn test_each_write_is_forwarded() {
        let host = Arc::new(RecordingHost::default());
        let mut sink = OutputSink::new(host.clone());

        write!(sink, "one").unwrap();
        writeln!(sink, " two").unwrap();

        assert_eq!(host.output(), "one two\n");
        assert!(host.writes().len() >= 2);
    }

    #[test]
    fn test_split_utf8_sequence_is_held_back() {
        let host = Arc::new(RecordingHost::default());
        let mut sink = OutputSink::new(host.clone());
        let bytes = "é".as_bytes();

        sink.write_all(&bytes[..1]).unwrap();
        assert_eq!(host.output(), "");

        sink.write_all(&bytes[1..]).unwrap();
        assert_eq!(host.output(), "é");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let host = Arc::new(RecordingHost::default());
        let mut sink = OutputSink::new(host.clone());

        sink.write_all(b"a\xffb").unwrap();
        assert_eq!(host.output(), "a\u{FFFD}b");
    }

    #[test]
    fn test_invalid_byte_before_split_sequence() {
        let host = Arc::new(RecordingHost::default());
        let mut sink = OutputSink::new(host.clone());

        sink.write_all(b"\xff\xc3").unwrap();
        assert_eq!(host.output(), "\u{FFFD}");

        sink.write_all(b"\xa9").unwrap();
        assert_eq!(host.output(), "\u{FFFD}é");
    }

    #[test]
    fn test_dangling_bytes_flushed_on_drop() {
        let host = Arc::new(RecordingHost::default());
        {
            let mut sink = OutputSink::new(host.clone());
            sink.write_all(&"é".as_bytes()[..1]).unwrap();
        }
        assert_eq!(host.output(), "\u{FFFD}");
    }
}
