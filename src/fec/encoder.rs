use super::generator::{
    quantize_density, validate_density, CoefficientGenerator, CodingVector, CodingVectorFormat,
};
use super::gf_tables::{init_gf_tables, Field, FiniteField};
use super::payload::{PayloadCodec, PayloadHeader};
use super::storage::ConstSymbolStorage;
use super::trace::{self, StdoutTrace, Trace, TraceSink};
use super::CodecConfig;
use crate::error::{Result, RlncError};
use crate::telemetry;
use log::{debug, trace};

/// Where the encoder is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    /// Original symbols `next..symbols` have not been sent uncoded yet.
    Systematic { next: usize },
    /// Every payload from here on is a random combination.
    Coded,
}

/// Produces payloads for one block.
///
/// Pull-based: each call to [`Encoder::write_payload`] returns one payload
/// and nothing is buffered in between. An on-the-fly encoder starts without
/// symbols and codes over the leading symbols attached so far; with none
/// available it writes a zero payload.
pub struct Encoder<'a> {
    field: FiniteField,
    storage: ConstSymbolStorage<'a>,
    generator: CoefficientGenerator,
    codec: PayloadCodec,
    systematic: bool,
    systematic_cursor: usize,
    density: f64,
    trace: Trace,
    payloads_written: u64,
}

impl<'a> Encoder<'a> {
    pub fn new(config: &CodecConfig, block: &'a [u8]) -> Result<Self> {
        config.validate()?;
        let storage = ConstSymbolStorage::new(block, config.symbols, config.symbol_size)?;
        Ok(Self::with_storage(config, storage))
    }

    /// An encoder whose symbols are attached later with
    /// [`Encoder::set_const_symbol`]. Requires `config.on_the_fly`.
    pub fn on_the_fly(config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        if !config.on_the_fly {
            return Err(RlncError::Configuration(
                "on-the-fly encoding needs on_the_fly payloads".to_string(),
            ));
        }
        let storage = ConstSymbolStorage::empty(config.symbols, config.symbol_size)?;
        Ok(Self::with_storage(config, storage))
    }

    fn with_storage(config: &CodecConfig, storage: ConstSymbolStorage<'a>) -> Self {
        init_gf_tables();
        let generator = match config.seed {
            Some(seed) => CoefficientGenerator::with_seed(config.field, seed),
            None => CoefficientGenerator::new(config.field),
        };
        debug!(
            "encoder: {:?}, {} symbols of {} bytes, {:?}, systematic {}",
            config.field,
            config.symbols,
            config.symbol_size,
            config.coding_vector_format,
            config.systematic
        );
        Self {
            field: FiniteField::new(config.field),
            storage,
            generator,
            codec: config.payload_codec(),
            systematic: config.systematic,
            systematic_cursor: 0,
            density: config.density,
            trace: Trace::default(),
            payloads_written: 0,
        }
    }

    /// Makes symbol `index` available for coding.
    pub fn set_const_symbol(&mut self, index: usize, data: &'a [u8]) -> Result<()> {
        self.storage.set_symbol(index, data)?;
        trace!(
            "encoder: symbol {} attached, rank {}",
            index,
            self.storage.rank()
        );
        Ok(())
    }

    pub fn is_symbol_available(&self, index: usize) -> bool {
        self.storage.is_symbol_available(index)
    }

    pub fn symbols_initialized(&self) -> usize {
        self.storage.symbols_initialized()
    }

    pub fn state(&self) -> EncoderState {
        if self.in_systematic_phase() {
            EncoderState::Systematic {
                next: self.systematic_cursor,
            }
        } else {
            EncoderState::Coded
        }
    }

    pub fn in_systematic_phase(&self) -> bool {
        self.systematic && self.systematic_cursor < self.storage.symbols()
    }

    pub fn is_systematic_on(&self) -> bool {
        self.systematic
    }

    /// Resumes sending uncoded symbols from where the phase was left.
    pub fn set_systematic_on(&mut self) {
        self.systematic = true;
    }

    pub fn set_systematic_off(&mut self) {
        self.systematic = false;
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    /// Sets the density of sparse vectors generated from the next payload on.
    pub fn set_density(&mut self, density: f64) -> Result<()> {
        validate_density(density)?;
        self.density = density;
        Ok(())
    }

    /// Reseeds the generator so that the payload sequence is reproducible.
    pub fn set_seed(&mut self, seed: u64) {
        self.generator.set_seed(seed);
    }

    pub fn set_trace(&mut self, sink: Box<dyn TraceSink>) {
        self.trace.set_sink(sink);
    }

    pub fn set_trace_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&str, &str) + Send + 'static,
    {
        self.trace.set_sink(Box::new(callback));
    }

    pub fn set_trace_stdout(&mut self) {
        self.trace.set_sink(Box::new(StdoutTrace));
    }

    pub fn set_trace_off(&mut self) {
        self.trace.clear();
    }

    pub fn set_zone_prefix(&mut self, prefix: impl Into<String>) {
        self.trace.set_zone_prefix(prefix);
    }

    pub fn field(&self) -> Field {
        self.field.field()
    }

    pub fn coding_vector_format(&self) -> CodingVectorFormat {
        self.codec.format()
    }

    pub fn symbols(&self) -> usize {
        self.storage.symbols()
    }

    pub fn symbol_size(&self) -> usize {
        self.storage.symbol_size()
    }

    pub fn block_size(&self) -> usize {
        self.storage.symbols() * self.storage.symbol_size()
    }

    pub fn payload_size(&self) -> usize {
        self.codec.payload_size()
    }

    /// Number of leading symbols available to the encoder.
    pub fn rank(&self) -> usize {
        self.storage.rank()
    }

    pub fn payloads_written(&self) -> u64 {
        self.payloads_written
    }

    pub fn write_payload(&mut self) -> Result<Vec<u8>> {
        let mut payload = vec![0u8; self.payload_size()];
        self.write_payload_into(&mut payload)?;
        Ok(payload)
    }

    /// Writes the next payload into `payload` and returns the bytes used.
    pub fn write_payload_into(&mut self, payload: &mut [u8]) -> Result<usize> {
        let rank = self.storage.rank();
        if self.systematic && self.systematic_cursor < rank {
            let index = self.systematic_cursor;
            let data = self.storage.symbol(index).ok_or_else(|| {
                RlncError::Configuration(format!("symbol {} is not available", index))
            })?;
            self.trace
                .write(trace::INDEX_BEFORE_WRITE_UNCODED, || index.to_string());
            self.codec.encode_ranked_into(
                &PayloadHeader::Systematic { index },
                rank,
                data,
                payload,
            )?;
            self.systematic_cursor += 1;
            telemetry::SYSTEMATIC_PAYLOADS.inc();
            trace!("encoder: systematic symbol {}", index);
        } else {
            let (header, coefficients) = self.next_coding_vector(rank);
            self.trace.write(trace::COEFFICIENTS_BEFORE_WRITE, || {
                trace::format_coefficients(&coefficients)
            });
            let data = self.combine(&coefficients);
            self.codec
                .encode_ranked_into(&header, rank, &data, payload)?;
            telemetry::CODED_PAYLOADS.inc();
            trace!("encoder: coded payload {:?}", header);
        }
        self.payloads_written += 1;
        Ok(payload.len())
    }

    /// Draws a vector over the first `rank` symbols, zero past them.
    fn next_coding_vector(&mut self, rank: usize) -> (PayloadHeader, CodingVector) {
        let symbols = self.storage.symbols();
        let field = self.field.field();
        let (header, mut coefficients) = match self.codec.format() {
            CodingVectorFormat::FullVector => {
                let mut coefficients = self.generator.generate_dense(rank);
                coefficients.resize(symbols, 0);
                (
                    PayloadHeader::FullVector {
                        coefficients: coefficients.clone(),
                    },
                    coefficients,
                )
            }
            CodingVectorFormat::Seed => {
                let seed = self.generator.next_seed();
                (
                    PayloadHeader::Seed { seed },
                    CoefficientGenerator::generate_seeded(field, seed, rank),
                )
            }
            CodingVectorFormat::SparseSeed => {
                let seed = self.generator.next_seed();
                let density = quantize_density(self.density);
                (
                    PayloadHeader::SparseSeed { seed, density },
                    CoefficientGenerator::generate_sparse_quantized(field, seed, density, rank),
                )
            }
        };
        coefficients.resize(symbols, 0);
        (header, coefficients)
    }

    /// Computes `sum(coefficients[i] * symbol[i])`.
    fn combine(&self, coefficients: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; self.storage.symbol_size()];
        for (&coeff, symbol) in coefficients.iter().zip(self.storage.iter()) {
            self.field.axpy(&mut data, coeff, symbol);
        }
        data
    }
}
