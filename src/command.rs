use anyhow::Result;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Object-safe trait for any command (applet) that can be dispatched by the shell.
///
/// An applet receives the output sink and the argument words that follow its name.
/// The name itself is never part of `args`. Implementations are shared between
/// concurrently running invocations, hence `Send + Sync`.
///
/// A blanket implementation exists for plain functions and closures with the
/// matching signature, so a registry can be populated without extra types:
///
/// ```
/// use applet_shell::command::Applet;
/// use std::io::Write;
///
/// fn hello(out: &mut dyn Write, args: &[String]) -> anyhow::Result<()> {
///     writeln!(out, "hello {}", args.join(" "))?;
///     Ok(())
/// }
///
/// let mut out = Vec::new();
/// hello.invoke(&mut out, &["world".to_string()]).unwrap();
/// assert_eq!(out, b"hello world\n");
/// ```
pub trait Applet: Send + Sync {
    /// Runs the applet to completion.
    fn invoke(&self, stdout: &mut dyn Write, args: &[String]) -> Result<()>;
}

impl<F> Applet for F
where
    F: Fn(&mut dyn Write, &[String]) -> Result<()> + Send + Sync,
{
    fn invoke(&self, stdout: &mut dyn Write, args: &[String]) -> Result<()> {
        self(stdout, args)
    }
}

/// A registered applet together with the name it was registered under.
///
/// Entries are immutable once created and cheap to clone.
#[derive(Clone)]
pub struct CommandEntry {
    name: Arc<str>,
    applet: Arc<dyn Applet>,
}

impl CommandEntry {
    pub(crate) fn new(name: impl Into<Arc<str>>, applet: Arc<dyn Applet>) -> Self {
        Self {
            name: name.into(),
            applet,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the underlying applet with the given sink and arguments.
    pub fn invoke(&self, stdout: &mut dyn Write, args: &[String]) -> Result<()> {
        self.applet.invoke(stdout, args)
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
