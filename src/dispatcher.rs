use crate::executor::ExecutionBridge;
use crate::host::HostPort;
use crate::lexer::{self, LexingError};
use crate::registry::Registry;
use std::sync::Arc;
use tracing::debug;

/// What happened to one submitted line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Blank line; nothing written.
    Empty,
    /// The line could not be split into words; nothing ran.
    Rejected(LexingError),
    /// The first word names no registered applet; nothing ran.
    NotFound(String),
    /// The named applet was handed to the execution bridge.
    Launched(String),
}

/// Resolves the first word of a line against the registry and launches the match.
///
/// Every path except [`Dispatch::Launched`] finishes synchronously, signalling the host
/// before returning. A launched applet signals from the bridge once it completes.
pub struct Dispatcher {
    registry: Arc<Registry>,
    bridge: ExecutionBridge,
    host: Arc<dyn HostPort>,
    not_found_message: String,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        bridge: ExecutionBridge,
        host: Arc<dyn HostPort>,
        not_found_message: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            bridge,
            host,
            not_found_message: not_found_message.into(),
        }
    }

    pub fn dispatch(&self, line: &str) -> Dispatch {
        let words = match lexer::split_into_words(line) {
            Ok(words) => words,
            Err(e) => {
                debug!(error = %e, "rejected line");
                self.host.write_output(&format!("parse error: {e}\n"));
                self.host.request_next_line();
                return Dispatch::Rejected(e);
            }
        };

        let mut words = words.into_iter();
        let Some(name) = words.next() else {
            self.host.request_next_line();
            return Dispatch::Empty;
        };
        let args: Vec<String> = words.collect();

        match self.registry.resolve(&name) {
            Some(entry) => {
                debug!(applet = %name, argc = args.len(), "launching applet");
                self.bridge.run(entry, args);
                Dispatch::Launched(name)
            }
            None => {
                debug!(applet = %name, "applet not found");
                self.host
                    .write_output(&format!("{}: {}\n", self.not_found_message, name));
                self.host.request_next_line();
                Dispatch::NotFound(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHost;
    use crate::lexer::Quote;
    use anyhow::Result;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::runtime::Handle;

    struct Fixture {
        host: Arc<RecordingHost>,
        dispatcher: Dispatcher,
        launches: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(RecordingHost::default());
        let launches = Arc::new(AtomicUsize::new(0));

        let counter = launches.clone();
        let mut builder = Registry::builder();
        builder
            .register("ls", move |out: &mut dyn Write, args: &[String]| -> Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                writeln!(out, "ls {:?}", args)?;
                Ok(())
            })
            .unwrap();

        let bridge = ExecutionBridge::new(Handle::current(), host.clone(), None);
        let dispatcher =
            Dispatcher::new(Arc::new(builder.build()), bridge, host.clone(), "applet not found");
        Fixture {
            host,
            dispatcher,
            launches,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blank_line_only_requests_next_line() {
        let f = fixture();
        assert_eq!(f.dispatcher.dispatch(""), Dispatch::Empty);
        assert_eq!(f.dispatcher.dispatch("   "), Dispatch::Empty);
        assert_eq!(f.host.next_line_requests(), 2);
        assert_eq!(f.host.output(), "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_parse_error_is_reported_without_running() {
        let f = fixture();
        assert_eq!(
            f.dispatcher.dispatch(r#"ls "a"#),
            Dispatch::Rejected(LexingError::UnfinishedQuote(Quote::Double))
        );
        assert_eq!(f.host.next_line_requests(), 1);
        assert_eq!(f.host.output(), "parse error: unterminated double-quoted string\n");

        assert_eq!(
            f.dispatcher.dispatch(r"ls a\"),
            Dispatch::Rejected(LexingError::UnfinishedEscape)
        );
        assert_eq!(f.host.next_line_requests(), 2);
        assert!(
            f.host
                .output()
                .ends_with("parse error: unterminated backslash escape\n")
        );
        assert_eq!(f.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_name_is_reported_synchronously() {
        let f = fixture();
        assert_eq!(
            f.dispatcher.dispatch("frobnicate x"),
            Dispatch::NotFound("frobnicate".to_string())
        );
        // signalled before dispatch returned, nothing was spawned
        assert_eq!(f.host.next_line_requests(), 1);
        assert_eq!(f.host.output(), "applet not found: frobnicate\n");
        assert_eq!(f.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lookup_is_case_sensitive() {
        let f = fixture();
        assert_eq!(f.dispatcher.dispatch("LS"), Dispatch::NotFound("LS".to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_name_is_not_forwarded_as_argument() {
        let f = fixture();
        assert_eq!(
            f.dispatcher.dispatch(r#"ls -l "my dir""#),
            Dispatch::Launched("ls".to_string())
        );
        f.host.wait_for_requests(1).await;
        assert_eq!(f.host.output(), "ls [\"-l\", \"my dir\"]\n");

        f.dispatcher.dispatch("ls");
        f.host.wait_for_requests(2).await;
        assert!(f.host.output().ends_with("ls []\n"));
        assert_eq!(f.launches.load(Ordering::SeqCst), 2);
    }
}
