//! A small command shell core meant to sit behind a terminal-like host UI.
//!
//! The host hands raw lines to [`Shell::submit_line`]. Each line is split into words
//! ([`lexer`]), the first word is looked up in an immutable applet table ([`Registry`]),
//! and a match is executed concurrently on a tokio runtime so the host's own loop is
//! never blocked. The host learns about progress only through the two calls of
//! [`HostPort`]: text to display and a signal that it may prompt again.
//!
//! The public modules [`command`] and [`registry`] are what you need to plug in your
//! own applets; [`applets::default_registry`] provides a ready-made set.

pub mod applets;
pub mod command;
pub mod config;
mod dispatcher;
mod executor;
pub mod host;
pub mod lexer;
pub mod registry;
mod shell;

pub use command::{Applet, CommandEntry};
pub use config::ShellConfig;
pub use dispatcher::Dispatch;
pub use host::{HostPort, OutputSink};
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use shell::{Shell, ShellBuilder, ShellError};
