// Copyright (c) 2024, The QuicFuscate Project Authors.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright
//       notice, this list of conditions and the following disclaimer.
//
//     * Redistributions in binary form must reproduce the above
//       copyright notice, this list of conditions and the following disclaimer
//       in the documentation and/or other materials provided with the
//       distribution.
//
//     * Neither the name of the copyright holder nor the names of its
//       contributors may be used to endorse or promote products derived from
//       this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// OWNER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! # Block RLNC Codec
//!
//! Random linear network coding over a single block ("generation"). The
//! encoder first sends the original symbols uncoded (systematic phase), then
//! random linear combinations of all symbols over GF(2), GF(2^4) or GF(2^8).
//! The decoder folds payloads in one at a time with incremental Gauss-Jordan
//! elimination and reconstructs the block from any full-rank subset,
//! tolerating loss, reordering and duplication.
//!
//! Coding vectors travel either explicitly (full vector), as a 32-bit seed
//! (seed) or as a seed plus density (sparse seed), which keeps the header at
//! eight bytes regardless of the number of symbols.

use crate::error::{Result, RlncError};
use serde::{Deserialize, Serialize};

pub mod decoder;
pub mod encoder;
pub mod generator;
pub mod gf_tables;
pub mod payload;
pub mod storage;
pub mod trace;

pub use decoder::*;
pub use encoder::*;
pub use generator::{CoefficientGenerator, CodingVector, CodingVectorFormat};
pub use gf_tables::{init_gf_tables, Field, FiniteField};
pub use payload::{PayloadCodec, PayloadHeader};
pub use storage::{ConstSymbolStorage, MutableSymbolStorage};
pub use trace::{LogTrace, StdoutTrace, TraceSink};

/// Parameters shared by the encoder and decoder of one block.
///
/// Both ends must agree on every field except `density`, `systematic` and
/// `seed`, which only affect the encoder. `on_the_fly` adds the encoder
/// rank to every payload so that symbols can be handed to the encoder one
/// at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub field: Field,
    pub symbols: usize,
    pub symbol_size: usize,
    pub coding_vector_format: CodingVectorFormat,
    pub density: f64,
    pub systematic: bool,
    pub seed: Option<u64>,
    pub on_the_fly: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            field: Field::Binary8,
            symbols: 16,
            symbol_size: 1400,
            coding_vector_format: CodingVectorFormat::FullVector,
            density: generator::DEFAULT_DENSITY,
            systematic: true,
            seed: None,
            on_the_fly: false,
        }
    }
}

impl CodecConfig {
    pub fn new(field: Field, symbols: usize, symbol_size: usize) -> Self {
        Self {
            field,
            symbols,
            symbol_size,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: CodingVectorFormat) -> Self {
        self.coding_vector_format = format;
        self
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn with_systematic(mut self, systematic: bool) -> Self {
        self.systematic = systematic;
        self
    }

    pub fn with_on_the_fly(mut self, on_the_fly: bool) -> Self {
        self.on_the_fly = on_the_fly;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbols == 0 {
            return Err(RlncError::Configuration(
                "symbols must be greater than zero".to_string(),
            ));
        }
        if self.symbols > u32::MAX as usize {
            return Err(RlncError::Configuration(format!(
                "{} symbols exceed the supported maximum",
                self.symbols
            )));
        }
        if self.symbol_size == 0 {
            return Err(RlncError::Configuration(
                "symbol_size must be greater than zero".to_string(),
            ));
        }
        if self.symbols.checked_mul(self.symbol_size).is_none() {
            return Err(RlncError::Configuration(
                "block size overflows usize".to_string(),
            ));
        }
        generator::validate_density(self.density)
    }

    pub fn block_size(&self) -> usize {
        self.symbols.saturating_mul(self.symbol_size)
    }

    pub fn payload_codec(&self) -> PayloadCodec {
        PayloadCodec::new(
            self.field,
            self.symbols,
            self.symbol_size,
            self.coding_vector_format,
        )
        .with_rank(self.on_the_fly)
    }

    pub fn payload_size(&self) -> usize {
        self.payload_codec().payload_size()
    }

    pub fn build_encoder<'a>(&self, block: &'a [u8]) -> Result<Encoder<'a>> {
        Encoder::new(self, block)
    }

    /// Builds an encoder with no symbols; attach them with
    /// [`Encoder::set_const_symbol`] as they become available.
    pub fn build_on_the_fly_encoder<'a>(&self) -> Result<Encoder<'a>> {
        Encoder::on_the_fly(self)
    }

    pub fn build_decoder<'a>(&self, buffer: &'a mut [u8]) -> Result<Decoder<'a>> {
        Decoder::new(self, buffer)
    }

    /// Load the `[codec]` table from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Root {
            codec: CodecConfig,
        }

        let raw: Root = toml::from_str(s)?;
        raw.codec.validate()?;
        Ok(raw.codec)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert!(CodecConfig::new(Field::Binary, 0, 10).validate().is_err());
        assert!(CodecConfig::new(Field::Binary, 10, 0).validate().is_err());
        assert!(CodecConfig::new(Field::Binary, usize::MAX, 2)
            .validate()
            .is_err());
        assert!(CodecConfig::new(Field::Binary, 10, 10)
            .with_density(2.0)
            .validate()
            .is_err());
        assert!(CodecConfig::new(Field::Binary, 10, 10).validate().is_ok());
    }

    #[test]
    fn sizes() {
        let config = CodecConfig::new(Field::Binary8, 10, 100)
            .with_format(CodingVectorFormat::SparseSeed);
        assert_eq!(config.block_size(), 1000);
        assert_eq!(config.payload_size(), 108);
        let dense = CodecConfig::new(Field::Binary4, 10, 100);
        assert_eq!(dense.payload_size(), 2 + 5 + 100);
        let ranked = dense.with_on_the_fly(true);
        assert_eq!(ranked.payload_size(), 2 + 1 + 5 + 100);
    }

    #[test]
    fn parse_config_toml() {
        let cfg_str = r#"
            [codec]
            field = "binary4"
            symbols = 32
            symbol_size = 160
            coding_vector_format = "sparse_seed"
            density = 0.3
            seed = 42
            on_the_fly = true
        "#;
        let cfg = CodecConfig::from_toml(cfg_str).unwrap();
        assert_eq!(cfg.field, Field::Binary4);
        assert_eq!(cfg.symbols, 32);
        assert_eq!(cfg.symbol_size, 160);
        assert_eq!(cfg.coding_vector_format, CodingVectorFormat::SparseSeed);
        assert!((cfg.density - 0.3).abs() < 1e-9);
        assert!(cfg.systematic);
        assert_eq!(cfg.seed, Some(42));
        assert!(cfg.on_the_fly);
    }

    #[test]
    fn toml_errors() {
        assert!(matches!(
            CodecConfig::from_toml("[codec]\nfield = \"gf65536\"\n"),
            Err(RlncError::ConfigParse(_))
        ));
        assert!(matches!(
            CodecConfig::from_toml("[codec]\nsymbols = 0\n"),
            Err(RlncError::Configuration(_))
        ));
    }
}
