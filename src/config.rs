use std::env as stdenv;
use std::num::NonZeroUsize;

/// Environment variable overriding [`ShellConfig::prompt`].
pub const PROMPT_VAR: &str = "APPLET_SHELL_PROMPT";
/// Environment variable overriding [`ShellConfig::max_in_flight`]. `0` means unbounded.
pub const MAX_JOBS_VAR: &str = "APPLET_SHELL_MAX_JOBS";

/// User-level settings for a [`Shell`](crate::Shell) and its terminal host.
///
/// Fields are public; the binary layers command-line flags over [`ShellConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Prompt shown by the host before each line.
    pub prompt: String,
    /// Upper bound on applets running at the same time. `None` means unbounded.
    pub max_in_flight: Option<NonZeroUsize>,
    /// Text written when the first word names no registered applet.
    pub not_found_message: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "~$ ".to_string(),
            max_in_flight: None,
            not_found_message: "applet not found".to_string(),
        }
    }
}

impl ShellConfig {
    /// Defaults overridden by the process environment.
    ///
    /// A malformed job limit is ignored with a warning rather than failing startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| stdenv::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(prompt) = lookup(PROMPT_VAR) {
            config.prompt = prompt;
        }
        if let Some(raw) = lookup(MAX_JOBS_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.max_in_flight = NonZeroUsize::new(n),
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring {MAX_JOBS_VAR}"),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ShellConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ShellConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_env() {
        assert_eq!(config_from(&[]), ShellConfig::default());
        assert_eq!(ShellConfig::default().max_in_flight, None);
    }

    #[test]
    fn test_env_overrides() {
        let config = config_from(&[(PROMPT_VAR, "> "), (MAX_JOBS_VAR, " 4 ")]);
        assert_eq!(config.prompt, "> ");
        assert_eq!(config.max_in_flight, NonZeroUsize::new(4));
    }

    #[test]
    fn test_zero_or_garbage_job_limit_is_unbounded() {
        assert_eq!(config_from(&[(MAX_JOBS_VAR, "0")]).max_in_flight, None);
        assert_eq!(config_from(&[(MAX_JOBS_VAR, "lots")]).max_in_flight, None);
    }
}
