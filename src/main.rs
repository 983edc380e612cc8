use anyhow::{Context, Result};
use applet_shell::{HostPort, Shell, ShellConfig, applets};
use argh::FromArgs;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::{Arc, mpsc};
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// interactive shell running a fixed set of applets.
struct Args {
    #[argh(option)]
    /// prompt shown before each line; overrides APPLET_SHELL_PROMPT
    prompt: Option<String>,

    #[argh(option)]
    /// maximum number of applets running at once, 0 for no limit; overrides APPLET_SHELL_MAX_JOBS
    max_jobs: Option<usize>,

    #[argh(switch, short = 'q')]
    /// do not print the list of applets on startup
    quiet: bool,
}

/// Host side of the protocol for a plain terminal.
struct TerminalHost {
    ready: mpsc::Sender<()>,
}

impl HostPort for TerminalHost {
    fn request_next_line(&self) {
        // the receiver only goes away once the REPL has finished
        let _ = self.ready.send(());
    }

    fn write_output(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
            tracing::warn!(error = %e, "failed to write output");
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Args = argh::from_env();
    let mut config = ShellConfig::from_env();
    if let Some(prompt) = args.prompt {
        config.prompt = prompt;
    }
    if let Some(max_jobs) = args.max_jobs {
        config.max_in_flight = NonZeroUsize::new(max_jobs);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the applet runtime")?;

    let registry = applets::default_registry()?;
    if !args.quiet {
        println!("applets: {}", registry.names().join(" "));
    }

    let (ready_tx, ready_rx) = mpsc::channel();
    let shell = Shell::builder()
        .config(config)
        .registry(registry)
        .host(Arc::new(TerminalHost { ready: ready_tx }))
        .runtime(runtime.handle().clone())
        .build()?;

    let result = repl(&shell, &ready_rx);
    // a hung applet must not keep the process alive after the user quits
    runtime.shutdown_background();
    result
}

fn repl(shell: &Shell, ready: &mpsc::Receiver<()>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    loop {
        match rl.readline(&shell.config().prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                }
                shell.submit_line(&line);
                if ready.recv().is_err() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}
