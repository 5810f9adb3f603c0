//! Incremental Gauss-Jordan decoder.
//!
//! Rows are kept in reduced row-echelon form at all times: each stored row
//! has a leading 1 in its pivot column and zeros in every other pivot
//! column. The data of pivot row `p` lives in slot `p` of the destination
//! buffer, so at full rank the buffer already holds the original block.

use super::generator::{CoefficientGenerator, CodingVector, CodingVectorFormat};
use super::gf_tables::{init_gf_tables, Field, FiniteField};
use super::payload::{PayloadCodec, PayloadHeader};
use super::storage::MutableSymbolStorage;
use super::trace::{self, StdoutTrace, Trace, TraceSink};
use super::CodecConfig;
use crate::error::{Result, RlncError};
use crate::telemetry;
use log::{debug, info, trace};

/// A stored pivot row. Its symbol data is the matching storage slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EliminationRow {
    coefficients: CodingVector,
}

impl EliminationRow {
    pub fn coefficients(&self) -> &[u8] {
        &self.coefficients
    }

    fn is_unit(&self, pivot: usize) -> bool {
        self.coefficients
            .iter()
            .enumerate()
            .all(|(i, &c)| if i == pivot { c == 1 } else { c == 0 })
    }
}

/// Rebuilds one block from payloads received in any order.
pub struct Decoder<'a> {
    field: FiniteField,
    storage: MutableSymbolStorage<'a>,
    codec: PayloadCodec,
    rows: Vec<Option<EliminationRow>>,
    decoded: Vec<bool>,
    symbols_decoded: usize,
    rank: usize,
    trace: Trace,
    payloads_read: u64,
    remote_rank: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(config: &CodecConfig, buffer: &'a mut [u8]) -> Result<Self> {
        config.validate()?;
        init_gf_tables();
        let storage = MutableSymbolStorage::new(buffer, config.symbols, config.symbol_size)?;
        debug!(
            "decoder: {:?}, {} symbols of {} bytes, {:?}",
            config.field, config.symbols, config.symbol_size, config.coding_vector_format
        );
        Ok(Self {
            field: FiniteField::new(config.field),
            storage,
            codec: config.payload_codec(),
            rows: vec![None; config.symbols],
            decoded: vec![false; config.symbols],
            symbols_decoded: 0,
            rank: 0,
            trace: Trace::default(),
            payloads_read: 0,
            remote_rank: 0,
        })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn is_complete(&self) -> bool {
        self.rank == self.symbols()
    }

    /// At least one original symbol is fully known.
    pub fn is_partially_complete(&self) -> bool {
        self.symbols_decoded > 0
    }

    pub fn symbols_decoded(&self) -> usize {
        self.symbols_decoded
    }

    pub fn is_symbol_decoded(&self, index: usize) -> bool {
        self.decoded.get(index).copied().unwrap_or(false)
    }

    pub fn is_symbol_pivot(&self, index: usize) -> bool {
        matches!(self.rows.get(index), Some(Some(_)))
    }

    /// Stored row with its pivot at `index`, if any.
    pub fn row(&self, index: usize) -> Option<&EliminationRow> {
        self.rows.get(index).and_then(|r| r.as_ref())
    }

    /// The original block, once every symbol is decoded.
    pub fn decoded_data(&self) -> Option<&[u8]> {
        if self.is_complete() {
            Some(self.storage.block())
        } else {
            None
        }
    }

    /// Decoded symbol `index`, available before the block completes.
    pub fn decoded_symbol(&self, index: usize) -> Option<&[u8]> {
        if self.is_symbol_decoded(index) {
            Some(self.storage.symbol(index))
        } else {
            None
        }
    }

    pub fn into_inner(self) -> &'a mut [u8] {
        self.storage.into_inner()
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
        self.storage.block().len()
    }

    pub fn payload_size(&self) -> usize {
        self.codec.payload_size()
    }

    pub fn payloads_read(&self) -> u64 {
        self.payloads_read
    }

    /// Highest encoder rank seen in a payload. Equals `symbols` unless the
    /// payloads carry a rank field.
    pub fn remote_rank(&self) -> usize {
        self.remote_rank
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

    /// Folds one payload into the decoding state.
    ///
    /// Linearly dependent payloads are absorbed without error. Malformed
    /// payloads return [`RlncError::Framing`] and leave the state untouched.
    /// Once complete, further payloads are ignored.
    pub fn read_payload(&mut self, payload: &[u8]) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        let (header, rank, data) = match self.codec.decode_ranked(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                telemetry::FRAMING_ERRORS.inc();
                debug!("decoder: dropping payload: {}", e);
                return Err(e);
            }
        };
        self.payloads_read += 1;
        self.remote_rank = self.remote_rank.max(rank);
        telemetry::PAYLOADS_READ.inc();

        // Seeded vectors span the encoder's rank; the remaining entries are zero.
        let field = self.field.field();
        let symbols = self.symbols();
        let expand = |mut coefficients: CodingVector| {
            coefficients.resize(symbols, 0);
            coefficients
        };
        match header {
            PayloadHeader::Systematic { index } => self.read_uncoded_symbol(data, index),
            PayloadHeader::FullVector { coefficients } => self.read_symbol(data, &coefficients),
            PayloadHeader::Seed { seed } => {
                let coefficients =
                    expand(CoefficientGenerator::generate_seeded(field, seed, rank));
                self.read_symbol(data, &coefficients)
            }
            PayloadHeader::SparseSeed { seed, density } => {
                let coefficients = expand(CoefficientGenerator::generate_sparse_quantized(
                    field, seed, density, rank,
                ));
                self.read_symbol(data, &coefficients)
            }
        }
    }

    /// Folds a coded symbol with an explicit, unpacked coding vector.
    pub fn read_symbol(&mut self, data: &[u8], coefficients: &[u8]) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        self.check_symbol(data)?;
        if coefficients.len() != self.symbols() {
            return Err(RlncError::Framing(format!(
                "coding vector has {} entries, expected {}",
                coefficients.len(),
                self.symbols()
            )));
        }
        if let Some(&bad) = coefficients.iter().find(|&&c| !self.field.is_element(c)) {
            return Err(RlncError::Framing(format!(
                "coefficient {} is not an element of {:?}",
                bad,
                self.field.field()
            )));
        }
        self.trace.write(trace::COEFFICIENTS_BEFORE_READ, || {
            trace::format_coefficients(coefficients)
        });
        self.ingest(coefficients.to_vec(), data.to_vec())
    }

    /// Folds an original symbol known to be symbol `index`.
    pub fn read_uncoded_symbol(&mut self, data: &[u8], index: usize) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        self.check_symbol(data)?;
        if index >= self.symbols() {
            return Err(RlncError::Framing(format!(
                "symbol index {} out of range for {} symbols",
                index,
                self.symbols()
            )));
        }
        self.trace
            .write(trace::INDEX_BEFORE_READ_UNCODED, || index.to_string());
        if self.decoded[index] {
            self.discard_dependent();
            return Ok(());
        }
        let mut coefficients = vec![0u8; self.symbols()];
        coefficients[index] = 1;
        self.ingest(coefficients, data.to_vec())
    }

    fn check_symbol(&self, data: &[u8]) -> Result<()> {
        if data.len() != self.symbol_size() {
            return Err(RlncError::Framing(format!(
                "symbol data is {} bytes, expected {}",
                data.len(),
                self.symbol_size()
            )));
        }
        Ok(())
    }

    fn ingest(&mut self, mut coefficients: CodingVector, mut symbol: Vec<u8>) -> Result<()> {
        let field = self.field;
        let symbols = self.symbols();

        // Forward: clear every column that already has a pivot. Stored rows
        // are zero in all other pivot columns, so one ascending pass suffices.
        for j in 0..symbols {
            let c = coefficients[j];
            if c == 0 {
                continue;
            }
            if let Some(row) = &self.rows[j] {
                field.axpy(&mut coefficients, c, &row.coefficients);
                field.axpy(&mut symbol, c, self.storage.symbol(j));
            }
        }

        let pivot = match coefficients.iter().position(|&c| c != 0) {
            Some(p) => p,
            None => {
                self.discard_dependent();
                return Ok(());
            }
        };

        let inverse = field.invert(coefficients[pivot])?;
        field.scale(&mut coefficients, inverse);
        field.scale(&mut symbol, inverse);

        // Backward: clear the new pivot column from the stored rows.
        let mut discovered = Vec::new();
        for j in 0..symbols {
            let row = match self.rows[j].as_mut() {
                Some(row) => row,
                None => continue,
            };
            let c = row.coefficients[pivot];
            if c == 0 {
                continue;
            }
            field.axpy(&mut row.coefficients, c, &coefficients);
            field.axpy(self.storage.symbol_mut(j), c, &symbol);
            if !self.decoded[j] && row.is_unit(j) {
                discovered.push(j);
            }
        }

        let row = EliminationRow { coefficients };
        if row.is_unit(pivot) {
            discovered.push(pivot);
        }
        self.storage.set_symbol(pivot, &symbol);
        self.rows[pivot] = Some(row);
        self.rank += 1;
        trace!("decoder: pivot {} stored, rank {}", pivot, self.rank);

        for index in discovered {
            self.decoded[index] = true;
            self.symbols_decoded += 1;
            self.trace
                .write(trace::UNCODED_SYMBOL_DISCOVERED, || index.to_string());
        }

        if self.trace.is_enabled() {
            let state = self.state_dump();
            self.trace.write(trace::DECODER_STATE, || state);
        }

        if self.is_complete() {
            telemetry::DECODES_COMPLETED.inc();
            info!(
                "decoder: block of {} symbols complete after {} payloads",
                symbols, self.payloads_read
            );
        }
        Ok(())
    }

    fn discard_dependent(&mut self) {
        telemetry::DEPENDENT_PAYLOADS.inc();
        trace!("decoder: linearly dependent symbol discarded, rank {}", self.rank);
    }

    /// One line per pivot slot: `U` decoded, `C` coded pivot, `?` missing.
    fn state_dump(&self) -> String {
        let mut out = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            let (status, coefficients) = match row {
                Some(row) if self.decoded[i] => ("U", trace::format_coefficients(&row.coefficients)),
                Some(row) => ("C", trace::format_coefficients(&row.coefficients)),
                None => ("?", trace::format_coefficients(&vec![0u8; self.rows.len()])),
            };
            out.push_str(&format!("{} {}: {}\n", i, status, coefficients));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn binary_config(symbols: usize, symbol_size: usize) -> CodecConfig {
        CodecConfig::new(Field::Binary, symbols, symbol_size)
    }

    #[test]
    fn two_symbol_binary_scenario() {
        let config = binary_config(2, 1);
        let mut out = vec![0u8; 2];
        let mut decoder = Decoder::new(&config, &mut out).unwrap();

        decoder.read_symbol(&[0xAA], &[1, 0]).unwrap();
        assert_eq!(decoder.rank(), 1);
        assert!(decoder.is_symbol_decoded(0));
        assert_eq!(decoder.decoded_symbol(0), Some(&[0xAA][..]));
        assert!(!decoder.is_complete());

        decoder.read_symbol(&[0xFF], &[1, 1]).unwrap();
        assert_eq!(decoder.rank(), 2);
        assert!(decoder.is_complete());
        assert_eq!(decoder.row(1).unwrap().coefficients(), &[0, 1]);
        assert_eq!(decoder.decoded_data(), Some(&[0xAA, 0x55][..]));
    }

    #[test]
    fn duplicate_is_absorbed() {
        let config = binary_config(2, 1);
        let mut out = vec![0u8; 2];
        let mut decoder = Decoder::new(&config, &mut out).unwrap();
        decoder.read_symbol(&[0xAA], &[1, 0]).unwrap();
        decoder.read_symbol(&[0xAA], &[1, 0]).unwrap();
        assert_eq!(decoder.rank(), 1);
        decoder.read_uncoded_symbol(&[0xAA], 0).unwrap();
        assert_eq!(decoder.rank(), 1);
    }

    #[test]
    fn back_substitution_reveals_symbols() {
        let config = CodecConfig::new(Field::Binary8, 3, 2);
        let field = FiniteField::new(Field::Binary8);
        let original = [[1u8, 2], [3, 4], [5, 6]];
        let combine = |coefficients: &[u8]| -> Vec<u8> {
            let mut data = vec![0u8; 2];
            for (i, &c) in coefficients.iter().enumerate() {
                field.axpy(&mut data, c, &original[i]);
            }
            data
        };

        let mut out = vec![0u8; 6];
        let mut decoder = Decoder::new(&config, &mut out).unwrap();
        for coefficients in [[2u8, 3, 0], [0, 7, 9], [1, 1, 1]] {
            decoder
                .read_symbol(&combine(&coefficients), &coefficients)
                .unwrap();
        }
        assert!(decoder.is_complete());
        assert_eq!(decoder.symbols_decoded(), 3);
        assert_eq!(decoder.into_inner(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn uncoded_after_coded_resolves_row() {
        let config = CodecConfig::new(Field::Binary8, 2, 1);
        let mut out = vec![0u8; 2];
        let mut decoder = Decoder::new(&config, &mut out).unwrap();
        let field = FiniteField::new(Field::Binary8);
        let coded = field.multiply(3, 10) ^ field.multiply(5, 20);
        decoder.read_symbol(&[coded], &[3, 5]).unwrap();
        assert!(decoder.is_symbol_pivot(0));
        assert!(!decoder.is_partially_complete());
        decoder.read_uncoded_symbol(&[20], 1).unwrap();
        assert!(decoder.is_complete());
        assert_eq!(decoder.decoded_data(), Some(&[10, 20][..]));
    }

    #[test]
    fn complete_decoder_ignores_input() {
        let config = binary_config(1, 2);
        let mut out = vec![0u8; 2];
        let mut decoder = Decoder::new(&config, &mut out).unwrap();
        decoder.read_uncoded_symbol(&[1, 2], 0).unwrap();
        assert!(decoder.is_complete());
        decoder.read_symbol(&[9, 9], &[1]).unwrap();
        decoder.read_payload(&[0u8; 3]).unwrap();
        assert_eq!(decoder.rank(), 1);
        assert_eq!(decoder.decoded_data(), Some(&[1, 2][..]));
    }

    #[test]
    fn rejects_bad_input() {
        let config = CodecConfig::new(Field::Binary4, 3, 2);
        let mut out = vec![0u8; 6];
        let mut decoder = Decoder::new(&config, &mut out).unwrap();
        assert!(decoder.read_symbol(&[0, 0], &[1, 2]).is_err());
        assert!(decoder.read_symbol(&[0, 0], &[1, 2, 16]).is_err());
        assert!(decoder.read_symbol(&[0], &[1, 2, 3]).is_err());
        assert!(decoder.read_uncoded_symbol(&[0, 0], 3).is_err());
        assert!(matches!(
            decoder.read_payload(&[1, 2, 3]),
            Err(RlncError::Framing(_))
        ));
        assert_eq!(decoder.rank(), 0);
        assert_eq!(decoder.payloads_read(), 0);
    }

    #[test]
    fn seeded_payloads_span_the_encoder_rank() {
        let config = CodecConfig::new(Field::Binary8, 3, 1)
            .with_format(CodingVectorFormat::Seed)
            .with_on_the_fly(true);
        let codec = config.payload_codec();
        let field = FiniteField::new(Field::Binary8);
        let original = [10u8, 20, 30];
        let coefficients = CoefficientGenerator::generate_seeded(Field::Binary8, 5, 2);
        let mut data = [0u8];
        for (i, &c) in coefficients.iter().enumerate() {
            field.axpy(&mut data, c, &original[i..i + 1]);
        }
        let payload = codec
            .encode_ranked(&PayloadHeader::Seed { seed: 5 }, 2, &data)
            .unwrap();

        let mut out = vec![0u8; 3];
        let mut decoder = Decoder::new(&config, &mut out).unwrap();
        decoder.read_payload(&payload).unwrap();
        assert_eq!(decoder.remote_rank(), 2);
        assert_eq!(decoder.rank(), 1);
        let rows: Vec<&EliminationRow> = (0..3).filter_map(|i| decoder.row(i)).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].coefficients()[2], 0);
    }

    #[test]
    fn zero_rank_payload_is_absorbed() {
        let config = CodecConfig::new(Field::Binary4, 2, 2)
            .with_format(CodingVectorFormat::SparseSeed)
            .with_on_the_fly(true);
        let payload = config
            .payload_codec()
            .encode_ranked(&PayloadHeader::SparseSeed { seed: 1, density: 100 }, 0, &[0, 0])
            .unwrap();
        let mut out = vec![0u8; 4];
        let mut decoder = Decoder::new(&config, &mut out).unwrap();
        decoder.read_payload(&payload).unwrap();
        assert_eq!(decoder.rank(), 0);
        assert_eq!(decoder.payloads_read(), 1);
        assert_eq!(decoder.remote_rank(), 0);
    }

    #[test]
    fn traces_discovery_and_state() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let config = binary_config(2, 1);
        let mut out = vec![0u8; 2];
        let mut decoder = Decoder::new(&config, &mut out).unwrap();
        decoder.set_zone_prefix("Decoder");
        decoder.set_trace_callback(move |zone, text| {
            sink.lock().unwrap().push((zone.to_string(), text.to_string()));
        });
        decoder.read_symbol(&[0xAA], &[1, 0]).unwrap();

        let events = events.lock().unwrap();
        let zones: Vec<&str> = events.iter().map(|(z, _)| z.as_str()).collect();
        assert_eq!(
            zones,
            vec![
                "Decoder.symbol_coefficients_before_read_symbol",
                "Decoder.uncoded_symbol_discovered",
                "Decoder.decoder_state",
            ]
        );
        assert_eq!(events[0].1, "1 0");
        assert_eq!(events[1].1, "0");
        assert_eq!(events[2].1, "0 U: 1 0\n1 ?: 0 0\n");
    }
}
