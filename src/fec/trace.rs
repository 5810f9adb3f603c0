//! Optional observability hook.
//!
//! Encoders and decoders emit named `(zone, text)` events at fixed points.
//! Without a sink attached nothing is formatted and nothing is emitted.

pub const DECODER_STATE: &str = "decoder_state";
pub const COEFFICIENTS_BEFORE_READ: &str = "symbol_coefficients_before_read_symbol";
pub const INDEX_BEFORE_READ_UNCODED: &str = "symbol_index_before_read_uncoded_symbol";
pub const UNCODED_SYMBOL_DISCOVERED: &str = "uncoded_symbol_discovered";
pub const COEFFICIENTS_BEFORE_WRITE: &str = "symbol_coefficients_before_write_symbol";
pub const INDEX_BEFORE_WRITE_UNCODED: &str = "symbol_index_before_write_uncoded_symbol";

/// Receives trace events.
pub trait TraceSink: Send {
    fn event(&mut self, zone: &str, text: &str);
}

impl<F> TraceSink for F
where
    F: FnMut(&str, &str) + Send,
{
    fn event(&mut self, zone: &str, text: &str) {
        self(zone, text)
    }
}

/// Prints every event to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutTrace;

impl TraceSink for StdoutTrace {
    fn event(&mut self, zone: &str, text: &str) {
        println!("{}:", zone);
        println!("{}", text);
    }
}

/// Forwards every event to the `log` facade at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn event(&mut self, zone: &str, text: &str) {
        log::trace!("{}: {}", zone, text);
    }
}

#[derive(Default)]
pub struct Trace {
    sink: Option<Box<dyn TraceSink>>,
    zone_prefix: String,
}

impl std::fmt::Debug for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trace")
            .field("enabled", &self.is_enabled())
            .field("zone_prefix", &self.zone_prefix)
            .finish()
    }
}

impl Trace {
    pub fn set_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.sink = Some(sink);
    }

    pub fn clear(&mut self) {
        self.sink = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn set_zone_prefix(&mut self, prefix: impl Into<String>) {
        self.zone_prefix = prefix.into();
    }

    pub fn zone_prefix(&self) -> &str {
        &self.zone_prefix
    }

    /// Emits an event; `text` is only evaluated when a sink is attached.
    pub fn write<F>(&mut self, zone: &str, text: F)
    where
        F: FnOnce() -> String,
    {
        if let Some(sink) = self.sink.as_mut() {
            let text = text();
            if self.zone_prefix.is_empty() {
                sink.event(zone, &text);
            } else {
                sink.event(&format!("{}.{}", self.zone_prefix, zone), &text);
            }
        }
    }
}

/// Renders a coefficient vector the way trace events print it.
pub(crate) fn format_coefficients(coefficients: &[u8]) -> String {
    coefficients
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
