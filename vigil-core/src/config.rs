//! Runtime Configuration
//!
//! Configuration is per thread, like the rest of the reactive state. A host
//! typically installs it once at startup, either built in code or loaded from
//! JSON:
//!
//! ```rust
//! use vigil_core::config::{self, Config};
//!
//! let cfg = Config::from_json(r#"{ "async_flush": false }"#).unwrap();
//! config::configure(cfg);
//! assert!(!config::current().async_flush);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};

/// Callback receiving reported errors or warnings.
pub type Handler = Rc<dyn Fn(&ReactiveError)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Flush the watcher queue on the next tick. When false, every enqueue
    /// flushes synchronously.
    pub async_flush: bool,

    /// How many times one watcher may re-run inside a single flush before
    /// the flush is abandoned as an infinite update loop.
    pub max_update_count: u32,

    /// Suppress warning logs. Warn handlers still run.
    pub silent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_flush: true,
            max_update_count: 100,
            silent: false,
        }
    }
}

impl Config {
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
    static ERROR_HANDLER: RefCell<Option<Handler>> = const { RefCell::new(None) };
    static WARN_HANDLER: RefCell<Option<Handler>> = const { RefCell::new(None) };
}

/// Install a configuration for the current thread.
pub fn configure(config: Config) {
    CONFIG.with(|c| *c.borrow_mut() = config);
}

/// A copy of the current thread's configuration.
pub fn current() -> Config {
    CONFIG.with(|c| c.borrow().clone())
}

pub fn set_error_handler(handler: Option<Handler>) {
    ERROR_HANDLER.with(|h| *h.borrow_mut() = handler);
}

pub fn set_warn_handler(handler: Option<Handler>) {
    WARN_HANDLER.with(|h| *h.borrow_mut() = handler);
}

pub(crate) fn report_warning(warning: &ReactiveError) {
    if !CONFIG.with(|c| c.borrow().silent) {
        tracing::warn!(warning = %warning, "reactivity warning");
    }
    // Clone out so the handler may replace itself.
    let handler = WARN_HANDLER.with(|h| h.borrow().clone());
    if let Some(handler) = handler {
        handler(warning);
    }
}

pub(crate) fn report_error(error: &ReactiveError) {
    tracing::error!(error = %error, "reactivity error");
    let handler = ERROR_HANDLER.with(|h| h.borrow().clone());
    if let Some(handler) = handler {
        handler(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = Config::from_json(r#"{ "silent": true }"#).unwrap();
        assert!(cfg.silent);
        assert!(cfg.async_flush);
        assert_eq!(cfg.max_update_count, 100);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Config::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ReactiveError::Config(_)));
    }

    #[test]
    fn warn_handler_receives_reports() {
        let seen = Rc::new(Cell::new(0));
        let seen_clone = seen.clone();
        set_warn_handler(Some(Rc::new(move |_: &ReactiveError| seen_clone.set(seen_clone.get() + 1))));

        report_warning(&ReactiveError::evaluation("careful"));
        assert_eq!(seen.get(), 1);

        set_warn_handler(None);
        report_warning(&ReactiveError::evaluation("careful"));
        assert_eq!(seen.get(), 1);
    }
}
