use std::sync::Arc;

use crate::{error::ProtocolError, line::MIN_ARGUMENT_LINE};

/// Default maximum line length, terminator included
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// Default maximum size of a submitted message body
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65535;

/// Per-session settings shared by the POP3 and SMTP servers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Hostname announced in greetings and shutdown notices
    pub banner: Arc<str>,
    pub max_line_length: usize,
    /// Only consulted by the submission session
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionConfig {
    /// Create a new `SessionConfig` builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    ///
    /// Check the configuration can serve at least the shortest command
    ///
    /// # Errors
    /// When the maximum line length cannot hold a `VERB ARG\r\n` line or the
    /// maximum message size is zero
    ///
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.max_line_length < MIN_ARGUMENT_LINE {
            return Err(ProtocolError::InvalidConfiguration {
                field: "max_line_length",
                reason: format!(
                    "{} is shorter than the minimum command line of {MIN_ARGUMENT_LINE} bytes",
                    self.max_line_length
                ),
            });
        }

        if self.max_message_size == 0 {
            return Err(ProtocolError::InvalidConfiguration {
                field: "max_message_size",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for `SessionConfig`
#[derive(Debug)]
pub struct SessionConfigBuilder {
    banner: String,
    max_line_length: usize,
    max_message_size: usize,
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self {
            banner: String::new(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl SessionConfigBuilder {
    /// Set the server banner hostname
    #[must_use]
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    #[must_use]
    pub const fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    #[must_use]
    pub const fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Build the final `SessionConfig`
    ///
    /// An empty banner falls back to the `HOSTNAME` environment variable, then
    /// to `localhost`.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        SessionConfig {
            banner: if self.banner.is_empty() {
                std::env::var("HOSTNAME")
                    .ok()
                    .filter(|host| !host.is_empty())
                    .unwrap_or_else(|| "localhost".to_string())
                    .into()
            } else {
                self.banner.into()
            },
            max_line_length: self.max_line_length,
            max_message_size: self.max_message_size,
        }
    }
}
