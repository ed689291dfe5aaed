//! A small Server-Sent Events builder.
//!
//! Keeps full control over the emitted bytes, in particular the space after
//! the `data:` field name that some non-compliant clients require.

use std::fmt;

/// A single SSE event, built with the builder pattern and rendered with
/// `to_string()`.
#[derive(Debug, Default, Clone)]
pub struct Event {
    event: Option<String>,
    data: Option<String>,
}

impl Event {
    /// Sets the `event` field (the event type).
    pub fn event<T: Into<String>>(mut self, event: T) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Sets the `data` field. Embedded newlines are split into multiple
    /// `data:` lines per the SSE specification.
    pub fn data<T: Into<String>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(event) = &self.event {
            write!(f, "event: {}\n", event)?;
        }
        if let Some(data) = &self.data {
            if data.is_empty() {
                f.write_str("data: \n")?;
            } else {
                for line in data.lines() {
                    write!(f, "data: {}\n", line)?;
                }
            }
        }
        // Terminate the event with the required blank line.
        f.write_str("\n")
    }
}
