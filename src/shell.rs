use crate::config::ShellConfig;
use crate::dispatcher::{Dispatch, Dispatcher};
use crate::executor::ExecutionBridge;
use crate::host::HostPort;
use crate::registry::Registry;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tracing::trace;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("no host port configured")]
    MissingHost,
    #[error("no applet registry configured")]
    MissingRegistry,
    #[error("no runtime handle given and none is current: {0}")]
    NoRuntime(#[from] TryCurrentError),
}

/// The host-facing entry point of the shell.
///
/// A `Shell` exposes a single inbound call, [`submit_line`](Self::submit_line). Everything
/// it tells the host goes through the [`HostPort`] it was built with. Clones share the
/// same registry, host and execution bridge.
///
/// Example
/// ```
/// use applet_shell::{HostPort, Registry, Shell};
/// use std::io::Write;
/// use std::sync::{Arc, Mutex, mpsc};
///
/// struct Host {
///     output: Mutex<String>,
///     ready: Mutex<mpsc::Sender<()>>,
/// }
///
/// impl HostPort for Host {
///     fn request_next_line(&self) {
///         let _ = self.ready.lock().unwrap().send(());
///     }
///     fn write_output(&self, text: &str) {
///         self.output.lock().unwrap().push_str(text);
///     }
/// }
///
/// fn echo(out: &mut dyn Write, args: &[String]) -> anyhow::Result<()> {
///     writeln!(out, "{}", args.join(" "))?;
///     Ok(())
/// }
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let (tx, rx) = mpsc::channel();
/// let host = Arc::new(Host { output: Mutex::new(String::new()), ready: Mutex::new(tx) });
///
/// let mut registry = Registry::builder();
/// registry.register("echo", echo).unwrap();
///
/// let shell = Shell::builder()
///     .registry(registry.build())
///     .host(host.clone())
///     .runtime(runtime.handle().clone())
///     .build()
///     .unwrap();
///
/// shell.submit_line(r#"echo "hello   world""#);
/// rx.recv().unwrap();
/// assert_eq!(*host.output.lock().unwrap(), "hello   world\n");
/// ```
#[derive(Clone)]
pub struct Shell {
    dispatcher: Arc<Dispatcher>,
    config: Arc<ShellConfig>,
}

impl Shell {
    pub fn builder() -> ShellBuilder {
        ShellBuilder::default()
    }

    /// Hand a raw line to the shell and return without waiting for the command.
    ///
    /// The host receives exactly one `request_next_line` for this line, either before
    /// this call returns or when the launched applet completes.
    pub fn submit_line(&self, raw_line: &str) {
        let outcome = self.dispatcher.dispatch(raw_line);
        trace!(?outcome, "line submitted");
    }

    /// Like [`submit_line`](Self::submit_line), reporting how the line was handled.
    pub fn dispatch(&self, raw_line: &str) -> Dispatch {
        self.dispatcher.dispatch(raw_line)
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }
}

/// Assembles a [`Shell`]. The registry and host port are required.
#[derive(Default)]
pub struct ShellBuilder {
    config: ShellConfig,
    registry: Option<Arc<Registry>>,
    host: Option<Arc<dyn HostPort>>,
    runtime: Option<Handle>,
}

impl ShellBuilder {
    pub fn config(mut self, config: ShellConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(self, registry: Registry) -> Self {
        self.shared_registry(Arc::new(registry))
    }

    pub fn shared_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn host(mut self, host: Arc<dyn HostPort>) -> Self {
        self.host = Some(host);
        self
    }

    /// Runtime applets are spawned onto. Defaults to the runtime current at `build`.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Shell, ShellError> {
        let host = self.host.ok_or(ShellError::MissingHost)?;
        let registry = self.registry.ok_or(ShellError::MissingRegistry)?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()?,
        };

        let bridge = ExecutionBridge::new(runtime, Arc::clone(&host), self.config.max_in_flight);
        let dispatcher = Dispatcher::new(
            registry,
            bridge,
            host,
            self.config.not_found_message.clone(),
        );
        Ok(Shell {
            dispatcher: Arc::new(dispatcher),
            config: Arc::new(self.config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHost;

    #[test]
    fn test_build_requires_host_and_registry() {
        let err = Shell::builder().registry(Registry::default()).build().err();
        assert!(matches!(err, Some(ShellError::MissingHost)));

        let host: Arc<dyn HostPort> = Arc::new(RecordingHost::default());
        let err = Shell::builder().host(host).build().err();
        assert!(matches!(err, Some(ShellError::MissingRegistry)));
    }

    #[test]
    fn test_build_outside_runtime_needs_handle() {
        let host: Arc<dyn HostPort> = Arc::new(RecordingHost::default());
        let err = Shell::builder()
            .registry(Registry::default())
            .host(host)
            .build()
            .err();
        assert!(matches!(err, Some(ShellError::NoRuntime(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_build_picks_up_current_runtime() {
        let host = Arc::new(RecordingHost::default());
        let shell = Shell::builder()
            .registry(Registry::default())
            .host(host.clone())
            .config(ShellConfig {
                not_found_message: "nope".to_string(),
                ..ShellConfig::default()
            })
            .build()
            .unwrap();

        shell.submit_line("ls");
        assert_eq!(host.output(), "nope: ls\n");
        assert_eq!(host.next_line_requests(), 1);
        assert_eq!(shell.config().not_found_message, "nope");
    }
}
