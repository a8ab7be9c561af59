//! Injected progress logger.
//!
//! A [`Logger`] is handed to the [`Client`](crate::Client), every
//! [`CachedProvider`](crate::metadata::CachedProvider) and the content
//! [`Source`](crate::Source) when they are constructed. Every message is
//! emitted as a `tracing` event and, when a hook is installed, forwarded to it
//! so frontends can render progress without a global logger.
//!
//! # Examples
//!
//! ```rust
//! use kanko::Logger;
//! use std::sync::{Arc, Mutex};
//!
//! let lines = Arc::new(Mutex::new(Vec::new()));
//! let sink = lines.clone();
//! let logger = Logger::new()
//!     .with_prefix("mangadex")
//!     .with_hook(move |line| sink.lock().unwrap().push(line.to_string()));
//!
//! logger.log("downloading 12 pages");
//! assert_eq!(lines.lock().unwrap()[0], "mangadex: downloading 12 pages");
//! ```

use std::fmt;
use std::sync::Arc;

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Cheaply cloneable progress logger.
#[derive(Clone, Default)]
pub struct Logger {
    prefix: Option<Arc<str>>,
    hook: Option<Hook>,
}

impl Logger {
    /// Creates a logger that only emits `tracing` events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes every message with `prefix: `.
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.prefix = Some(Arc::from(prefix.as_ref()));
        self
    }

    /// Installs a hook receiving every formatted message.
    pub fn with_hook(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// The configured prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Logs a progress message.
    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        let line = match &self.prefix {
            Some(prefix) => format!("{prefix}: {message}"),
            None => message.to_string(),
        };

        tracing::info!(target: "kanko", "{}", line);
        if let Some(hook) = &self.hook {
            hook(&line);
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("prefix", &self.prefix)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
