//! Configuration for the supervisor.
//!
//! The [`Config`] struct is not constructable, use [`ConfigBuilder`].
//!
//! # Examples
//!
//! ```
//! # use procmux::config::ConfigBuilder;
//! # use std::time::Duration;
//! ConfigBuilder::default()
//!     .grace_period(Duration::from_secs(10))
//!     .build()
//!     .expect("mission failed");
//! ```

use std::time::Duration;

/// How long processes get to exit after SIGTERM before they are killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Arguments to the supervisor
#[derive(Builder, Clone, Debug)]
#[builder(setter(into))]
#[builder(build_fn(validate = "Self::validate"))]
#[non_exhaustive]
pub struct Config {
    /// Time between SIGTERM and SIGKILL during shutdown.
    #[builder(default = "DEFAULT_GRACE_PERIOD")]
    pub grace_period: Duration,
    /// How long the event loop waits for an event before rechecking its state.
    #[builder(default = "Duration::from_millis(100)")]
    pub poll_interval: Duration,
    /// Turn SIGINT and SIGTERM sent to us into a shutdown of all processes.
    #[builder(default = "true")]
    pub handle_signals: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: Duration::from_millis(100),
            handle_signals: true,
        }
    }
}

impl ConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.poll_interval.map_or(false, |i| i == Duration::from_secs(0)) {
            return Err("poll_interval must not be zero".into());
        }

        Ok(())
    }
}
