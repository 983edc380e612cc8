use crate::command::CommandEntry;
use crate::host::{HostPort, OutputSink};
use std::any::Any;
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError};
use tracing::{debug, error, warn};

/// Runs dispatched applets off the host's calling thread and reports their completion.
///
/// Every call to [`run`](Self::run) results in exactly one `request_next_line` on the
/// host once the applet has returned, failed or panicked. An applet that never returns
/// never produces that signal; there is no timeout and no cancellation.
pub struct ExecutionBridge {
    runtime: Handle,
    host: Arc<dyn HostPort>,
    limiter: Option<Arc<Semaphore>>,
}

impl ExecutionBridge {
    /// Create a bridge spawning onto `runtime`.
    ///
    /// With `max_in_flight` set, at most that many applets execute at once; further
    /// launches wait for a free slot inside their own task. Limits above
    /// [`Semaphore::MAX_PERMITS`] are clamped to it.
    pub fn new(
        runtime: Handle,
        host: Arc<dyn HostPort>,
        max_in_flight: Option<NonZeroUsize>,
    ) -> Self {
        Self {
            runtime,
            host,
            limiter: max_in_flight
                .map(|n| Arc::new(Semaphore::new(n.get().min(Semaphore::MAX_PERMITS)))),
        }
    }

    /// Launch `entry` with `args` and return immediately.
    pub fn run(&self, entry: CommandEntry, args: Vec<String>) {
        let host = Arc::clone(&self.host);
        let limiter = self.limiter.clone();

        self.runtime.spawn(async move {
            // the semaphore is never closed, so acquiring only fails if it is dropped
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };

            let name = entry.name().to_string();
            let sink_host = Arc::clone(&host);
            let outcome = task::spawn_blocking(move || -> anyhow::Result<()> {
                let mut stdout = OutputSink::new(sink_host);
                let result = entry.invoke(&mut stdout, &args);
                stdout.flush()?;
                result
            })
            .await;

            report(host.as_ref(), &name, outcome);
            host.request_next_line();
        });
    }
}

fn report(host: &dyn HostPort, name: &str, outcome: Result<anyhow::Result<()>, JoinError>) {
    match outcome {
        Ok(Ok(())) => debug!(applet = name, "applet finished"),
        Ok(Err(e)) => {
            let message = format!("{e:#}");
            warn!(applet = name, error = %message, "applet failed");
            host.write_output(&format!("ERROR: {message}\n"));
        }
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            error!(applet = name, panic = %message, "applet panicked");
            host.write_output(&format!("ERROR: {name}: panicked: {message}\n"));
        }
        Err(e) => {
            error!(applet = name, error = %e, "applet task did not complete");
            host.write_output(&format!("ERROR: {name}: {e}\n"));
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
