//! Payload framing.
//!
//! Layout: `[format_tag:1][field_tag:1][rank][body][symbol data]`. The body
//! is the packed coding vector (full vector), a big-endian seed (seed) or a
//! seed followed by a big-endian density code (sparse seed). Systematic
//! payloads use format tag 0 and carry the symbol index in a body of the same
//! length, so every payload of a configuration has the same size.
//!
//! The rank field is present only for on-the-fly coding: it holds, big-endian,
//! the number of leading symbols the encoder had when it wrote the payload.
//! Coefficients past that rank are zero and seeded vectors are expanded over
//! the first `rank` entries only.

use super::generator::{CodingVector, CodingVectorFormat};
use super::gf_tables::Field;
use crate::error::{Result, RlncError};

pub const SYSTEMATIC_TAG: u8 = 0;
const TAG_LEN: usize = 2;
const SEED_LEN: usize = 4;
const DENSITY_LEN: usize = 2;

/// Header fields of one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadHeader {
    /// An original symbol sent uncoded.
    Systematic { index: usize },
    FullVector { coefficients: CodingVector },
    Seed { seed: u32 },
    SparseSeed { seed: u32, density: u16 },
}

impl PayloadHeader {
    pub fn is_systematic(&self) -> bool {
        matches!(self, PayloadHeader::Systematic { .. })
    }
}

/// Bytes needed to pack `symbols` elements of `field`.
pub fn vector_size(field: Field, symbols: usize) -> usize {
    (symbols * field.bits() + 7) / 8
}

/// Packs unpacked elements at the field's bit width.
pub fn pack_vector(field: Field, coefficients: &[u8], out: &mut [u8]) {
    out.iter_mut().for_each(|b| *b = 0);
    match field {
        Field::Binary => {
            for (i, &c) in coefficients.iter().enumerate() {
                out[i / 8] |= (c & 1) << (i % 8);
            }
        }
        Field::Binary4 => {
            for (i, &c) in coefficients.iter().enumerate() {
                out[i / 2] |= (c & 0x0F) << ((i % 2) * 4);
            }
        }
        Field::Binary8 => out[..coefficients.len()].copy_from_slice(coefficients),
    }
}

pub fn unpack_vector(field: Field, packed: &[u8], count: usize) -> CodingVector {
    match field {
        Field::Binary => (0..count).map(|i| (packed[i / 8] >> (i % 8)) & 1).collect(),
        Field::Binary4 => (0..count)
            .map(|i| (packed[i / 2] >> ((i % 2) * 4)) & 0x0F)
            .collect(),
        Field::Binary8 => packed[..count].to_vec(),
    }
}

/// Minimal big-endian width of a symbol index.
fn index_width(symbols: usize) -> usize {
    let max_index = symbols.saturating_sub(1);
    let bits = usize::BITS - max_index.leading_zeros();
    ((bits as usize + 7) / 8).max(1)
}

/// Width of a rank in `0..=symbols`.
fn rank_width(symbols: usize) -> usize {
    index_width(symbols.saturating_add(1))
}

fn read_be(bytes: &[u8]) -> usize {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64) as usize
}

fn write_be(value: usize, out: &mut [u8]) {
    let bytes = (value as u64).to_be_bytes();
    out.copy_from_slice(&bytes[8 - out.len()..]);
}

/// Fixed-size framing for one codec configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadCodec {
    field: Field,
    symbols: usize,
    symbol_size: usize,
    format: CodingVectorFormat,
    rank_len: usize,
}

impl PayloadCodec {
    pub fn new(
        field: Field,
        symbols: usize,
        symbol_size: usize,
        format: CodingVectorFormat,
    ) -> Self {
        Self {
            field,
            symbols,
            symbol_size,
            format,
            rank_len: 0,
        }
    }

    /// Adds the encoder rank field used by on-the-fly coding.
    pub fn with_rank(mut self, enabled: bool) -> Self {
        self.rank_len = if enabled { rank_width(self.symbols) } else { 0 };
        self
    }

    pub fn format(&self) -> CodingVectorFormat {
        self.format
    }

    pub fn carries_rank(&self) -> bool {
        self.rank_len > 0
    }

    fn body_size(&self) -> usize {
        match self.format {
            CodingVectorFormat::FullVector => vector_size(self.field, self.symbols),
            CodingVectorFormat::Seed => SEED_LEN,
            CodingVectorFormat::SparseSeed => SEED_LEN + DENSITY_LEN,
        }
    }

    pub fn header_size(&self) -> usize {
        TAG_LEN + self.rank_len + self.body_size()
    }

    pub fn payload_size(&self) -> usize {
        self.header_size() + self.symbol_size
    }

    pub fn encode(&self, header: &PayloadHeader, data: &[u8]) -> Result<Vec<u8>> {
        self.encode_ranked(header, self.symbols, data)
    }

    pub fn encode_ranked(
        &self,
        header: &PayloadHeader,
        rank: usize,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.payload_size()];
        self.encode_ranked_into(header, rank, data, &mut out)?;
        Ok(out)
    }

    /// Frames `header` and `data` into `out`, which must be exactly
    /// [`PayloadCodec::payload_size`] bytes.
    pub fn encode_into(&self, header: &PayloadHeader, data: &[u8], out: &mut [u8]) -> Result<()> {
        self.encode_ranked_into(header, self.symbols, data, out)
    }

    /// Like [`PayloadCodec::encode_into`], for an encoder holding only the
    /// first `rank` symbols. Without a rank field `rank` must be `symbols`.
    pub fn encode_ranked_into(
        &self,
        header: &PayloadHeader,
        rank: usize,
        data: &[u8],
        out: &mut [u8],
    ) -> Result<()> {
        if rank > self.symbols || (!self.carries_rank() && rank != self.symbols) {
            return Err(RlncError::Framing(format!(
                "rank {} cannot be framed for {} symbols",
                rank, self.symbols
            )));
        }
        if out.len() != self.payload_size() {
            return Err(RlncError::Framing(format!(
                "output buffer is {} bytes, payload size is {}",
                out.len(),
                self.payload_size()
            )));
        }
        if data.len() != self.symbol_size {
            return Err(RlncError::Framing(format!(
                "symbol data is {} bytes, expected {}",
                data.len(),
                self.symbol_size
            )));
        }

        let header_size = self.header_size();
        let (head, body) = out.split_at_mut(header_size);
        let (tags, rest) = head.split_at_mut(TAG_LEN);
        let (rank_field, fields) = rest.split_at_mut(self.rank_len);
        tags[1] = self.field.tag();
        write_be(rank, rank_field);
        fields.iter_mut().for_each(|b| *b = 0);
        match header {
            PayloadHeader::Systematic { index } => {
                let width = index_width(self.symbols);
                if *index >= rank || width > fields.len() {
                    return Err(RlncError::Framing(format!(
                        "symbol index {} out of range",
                        index
                    )));
                }
                tags[0] = SYSTEMATIC_TAG;
                write_be(*index, &mut fields[..width]);
            }
            PayloadHeader::FullVector { coefficients }
                if self.format == CodingVectorFormat::FullVector =>
            {
                if coefficients.len() != self.symbols {
                    return Err(RlncError::Framing(format!(
                        "coding vector has {} entries, expected {}",
                        coefficients.len(),
                        self.symbols
                    )));
                }
                if coefficients[rank..].iter().any(|&c| c != 0) {
                    return Err(RlncError::Framing(format!(
                        "coding vector has coefficients past rank {}",
                        rank
                    )));
                }
                tags[0] = self.format.tag();
                pack_vector(self.field, coefficients, fields);
            }
            PayloadHeader::Seed { seed } if self.format == CodingVectorFormat::Seed => {
                tags[0] = self.format.tag();
                fields[..SEED_LEN].copy_from_slice(&seed.to_be_bytes());
            }
            PayloadHeader::SparseSeed { seed, density }
                if self.format == CodingVectorFormat::SparseSeed =>
            {
                tags[0] = self.format.tag();
                fields[..SEED_LEN].copy_from_slice(&seed.to_be_bytes());
                fields[SEED_LEN..SEED_LEN + DENSITY_LEN].copy_from_slice(&density.to_be_bytes());
            }
            other => {
                return Err(RlncError::Framing(format!(
                    "header {:?} does not match format {:?}",
                    other, self.format
                )))
            }
        }
        body.copy_from_slice(data);
        Ok(())
    }

    /// Parses a payload into its header and a view of its symbol data.
    pub fn decode<'p>(&self, payload: &'p [u8]) -> Result<(PayloadHeader, &'p [u8])> {
        let (header, _, data) = self.decode_ranked(payload)?;
        Ok((header, data))
    }

    /// Parses a payload into its header, the encoder rank it was written at
    /// (`symbols` without a rank field) and its symbol data.
    pub fn decode_ranked<'p>(
        &self,
        payload: &'p [u8],
    ) -> Result<(PayloadHeader, usize, &'p [u8])> {
        if payload.len() != self.payload_size() {
            return Err(RlncError::Framing(format!(
                "payload is {} bytes, expected {}",
                payload.len(),
                self.payload_size()
            )));
        }
        let (head, data) = payload.split_at(self.header_size());
        match Field::from_tag(head[1]) {
            Some(field) if field == self.field => {}
            Some(field) => {
                return Err(RlncError::Framing(format!(
                    "payload field {:?} does not match {:?}",
                    field, self.field
                )))
            }
            None => {
                return Err(RlncError::Framing(format!(
                    "unknown field tag {}",
                    head[1]
                )))
            }
        }
        let (rank_field, fields) = head[TAG_LEN..].split_at(self.rank_len);
        let rank = if self.carries_rank() {
            read_be(rank_field)
        } else {
            self.symbols
        };
        if rank > self.symbols {
            return Err(RlncError::Framing(format!(
                "rank {} exceeds {} symbols",
                rank, self.symbols
            )));
        }

        if head[0] == SYSTEMATIC_TAG {
            let width = index_width(self.symbols);
            let index = read_be(&fields[..width]);
            if index >= rank {
                return Err(RlncError::Framing(format!(
                    "systematic index {} out of range for rank {}",
                    index, rank
                )));
            }
            return Ok((PayloadHeader::Systematic { index }, rank, data));
        }

        let format = CodingVectorFormat::from_tag(head[0]).ok_or_else(|| {
            RlncError::Framing(format!("unknown coding vector format tag {}", head[0]))
        })?;
        if format != self.format {
            return Err(RlncError::Framing(format!(
                "payload format {:?} does not match {:?}",
                format, self.format
            )));
        }
        let seed = || u32::from_be_bytes([fields[0], fields[1], fields[2], fields[3]]);
        let header = match format {
            CodingVectorFormat::FullVector => {
                let coefficients = unpack_vector(self.field, fields, self.symbols);
                if coefficients[rank..].iter().any(|&c| c != 0) {
                    return Err(RlncError::Framing(format!(
                        "coding vector has coefficients past rank {}",
                        rank
                    )));
                }
                PayloadHeader::FullVector { coefficients }
            }
            CodingVectorFormat::Seed => PayloadHeader::Seed { seed: seed() },
            CodingVectorFormat::SparseSeed => PayloadHeader::SparseSeed {
                seed: seed(),
                density: u16::from_be_bytes([fields[SEED_LEN], fields[SEED_LEN + 1]]),
            },
        };
        Ok((header, rank, data))
    }
}
