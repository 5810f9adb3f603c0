use crate::error::{Result, RlncError};

fn check_block_len(len: usize, symbols: usize, symbol_size: usize) -> Result<()> {
    let expected = symbols.checked_mul(symbol_size).ok_or_else(|| {
        RlncError::Configuration("block size overflows usize".to_string())
    })?;
    if len != expected {
        return Err(RlncError::Configuration(format!(
            "block is {} bytes, expected {} ({} symbols of {} bytes)",
            len, expected, symbols, symbol_size
        )));
    }
    Ok(())
}

fn check_symbol_size(symbol_size: usize) -> Result<()> {
    if symbol_size == 0 {
        return Err(RlncError::Configuration(
            "symbol_size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Read-only view of caller-owned symbols.
///
/// Built either over a complete block or empty, with symbols attached one
/// at a time as they become available. The rank is the length of the
/// leading run of available symbols; coding only ever spans that run.
#[derive(Debug, Clone)]
pub struct ConstSymbolStorage<'a> {
    slots: Vec<Option<&'a [u8]>>,
    symbols: usize,
    symbol_size: usize,
    initialized: usize,
    rank: usize,
}

impl<'a> ConstSymbolStorage<'a> {
    pub fn new(block: &'a [u8], symbols: usize, symbol_size: usize) -> Result<Self> {
        check_symbol_size(symbol_size)?;
        check_block_len(block.len(), symbols, symbol_size)?;
        Ok(Self {
            slots: block.chunks_exact(symbol_size).map(Some).collect(),
            symbols,
            symbol_size,
            initialized: symbols,
            rank: symbols,
        })
    }

    /// Storage with no symbols attached yet.
    pub fn empty(symbols: usize, symbol_size: usize) -> Result<Self> {
        check_symbol_size(symbol_size)?;
        symbols.checked_mul(symbol_size).ok_or_else(|| {
            RlncError::Configuration("block size overflows usize".to_string())
        })?;
        Ok(Self {
            slots: vec![None; symbols],
            symbols,
            symbol_size,
            initialized: 0,
            rank: 0,
        })
    }

    /// Attaches symbol `index`. Re-attaching replaces the previous slice.
    pub fn set_symbol(&mut self, index: usize, data: &'a [u8]) -> Result<()> {
        if index >= self.symbols {
            return Err(RlncError::Configuration(format!(
                "symbol index {} out of range for {} symbols",
                index, self.symbols
            )));
        }
        if data.len() != self.symbol_size {
            return Err(RlncError::Configuration(format!(
                "symbol is {} bytes, expected {}",
                data.len(),
                self.symbol_size
            )));
        }
        if self.slots[index].replace(data).is_none() {
            self.initialized += 1;
        }
        while self.rank < self.symbols && self.slots[self.rank].is_some() {
            self.rank += 1;
        }
        Ok(())
    }

    pub fn symbols(&self) -> usize {
        self.symbols
    }

    pub fn symbol_size(&self) -> usize {
        self.symbol_size
    }

    /// Number of leading symbols available.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of symbols attached, in any position.
    pub fn symbols_initialized(&self) -> usize {
        self.initialized
    }

    pub fn is_symbol_available(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    #[inline]
    pub fn symbol(&self, index: usize) -> Option<&'a [u8]> {
        self.slots.get(index).copied().flatten()
    }

    /// The symbols `0..rank`, in order.
    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.slots[..self.rank].iter().flatten().copied()
    }
}

/// Writable view of a caller-owned destination buffer.
///
/// Slot `i` holds the data of the decoder's pivot row `i`; once every row is
/// a unit vector the buffer is the original block.
#[derive(Debug)]
pub struct MutableSymbolStorage<'a> {
    block: &'a mut [u8],
    symbols: usize,
    symbol_size: usize,
}

impl<'a> MutableSymbolStorage<'a> {
    pub fn new(block: &'a mut [u8], symbols: usize, symbol_size: usize) -> Result<Self> {
        check_block_len(block.len(), symbols, symbol_size)?;
        Ok(Self {
            block,
            symbols,
            symbol_size,
        })
    }

    pub fn symbols(&self) -> usize {
        self.symbols
    }

    pub fn symbol_size(&self) -> usize {
        self.symbol_size
    }

    #[inline]
    pub fn symbol(&self, index: usize) -> &[u8] {
        let start = index * self.symbol_size;
        &self.block[start..start + self.symbol_size]
    }

    #[inline]
    pub fn symbol_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.symbol_size;
        &mut self.block[start..start + self.symbol_size]
    }

    pub fn set_symbol(&mut self, index: usize, data: &[u8]) {
        self.symbol_mut(index).copy_from_slice(data);
    }

    pub fn block(&self) -> &[u8] {
        self.block
    }

    pub fn into_inner(self) -> &'a mut [u8] {
        self.block
    }
}
