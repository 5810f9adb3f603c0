use crate::error::Result;
use crate::fec::{CodecConfig, Decoder, Encoder, LogTrace};
use crate::logger;
use serde::Deserialize;
use std::path::Path;

/// Trace settings applied to every encoder and decoder built from an [`AppConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceConfig {
    pub enabled: bool,
    pub zone_prefix: Option<String>,
}

/// Unified configuration structure parsed from a TOML file.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub codec: CodecConfig,
    pub trace: TraceConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            codec: CodecConfig::default(),
            trace: TraceConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML string. Missing sections take their defaults.
    pub fn from_toml(s: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Root {
            codec: Option<CodecConfig>,
            trace: Option<TraceSection>,
            logging: Option<LoggingSection>,
        }

        #[derive(Deserialize)]
        struct TraceSection {
            enabled: Option<bool>,
            zone_prefix: Option<String>,
        }

        #[derive(Deserialize)]
        struct LoggingSection {
            level: Option<String>,
        }

        let raw: Root = toml::from_str(s)?;
        let trace = raw.trace.map_or_else(TraceConfig::default, |t| TraceConfig {
            enabled: t.enabled.unwrap_or(false),
            zone_prefix: t.zone_prefix,
        });
        let cfg = Self {
            codec: raw.codec.unwrap_or_default(),
            trace,
            log_level: raw
                .logging
                .and_then(|l| l.level)
                .unwrap_or_else(|| "info".to_string()),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.codec.validate()
    }

    /// Installs the global logger at the configured default level.
    pub fn init_logging(&self) {
        logger::init_with_level(&self.log_level);
    }

    pub fn build_encoder<'a>(&self, block: &'a [u8]) -> Result<Encoder<'a>> {
        let mut encoder = self.codec.build_encoder(block)?;
        if self.trace.enabled {
            encoder.set_trace(Box::new(LogTrace));
        }
        if let Some(prefix) = &self.trace.zone_prefix {
            encoder.set_zone_prefix(format!("{}.encoder", prefix));
        }
        Ok(encoder)
    }

    pub fn build_decoder<'a>(&self, buffer: &'a mut [u8]) -> Result<Decoder<'a>> {
        let mut decoder = self.codec.build_decoder(buffer)?;
        if self.trace.enabled {
            decoder.set_trace(Box::new(LogTrace));
        }
        if let Some(prefix) = &self.trace.zone_prefix {
            decoder.set_zone_prefix(format!("{}.decoder", prefix));
        }
        Ok(decoder)
    }
}
