use crate::error::{Result, RlncError};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

// --- Field selection ---

/// The finite fields supported by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// GF(2). Every bit of a symbol is an element.
    Binary,
    /// GF(2^4). Every byte of a symbol holds two elements, low nibble first.
    Binary4,
    /// GF(2^8). Every byte of a symbol is an element.
    Binary8,
}

impl Field {
    pub fn bits(self) -> usize {
        match self {
            Field::Binary => 1,
            Field::Binary4 => 4,
            Field::Binary8 => 8,
        }
    }

    /// Largest element value.
    pub fn max_value(self) -> u8 {
        match self {
            Field::Binary => 1,
            Field::Binary4 => 15,
            Field::Binary8 => 255,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Field::Binary => 0,
            Field::Binary4 => 1,
            Field::Binary8 => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Field> {
        match tag {
            0 => Some(Field::Binary),
            1 => Some(Field::Binary4),
            2 => Some(Field::Binary8),
            _ => None,
        }
    }
}

impl std::str::FromStr for Field {
    type Err = RlncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "binary" | "gf2" => Ok(Field::Binary),
            "binary4" | "gf16" => Ok(Field::Binary4),
            "binary8" | "gf256" => Ok(Field::Binary8),
            other => Err(RlncError::Configuration(format!(
                "unsupported finite field: {}",
                other
            ))),
        }
    }
}

// --- Table construction ---

const GF16_POLY: u16 = 0x13; // x^4 + x + 1
const GF256_POLY: u16 = 0x11D; // x^8 + x^4 + x^3 + x^2 + 1

/// Log/exp tables plus one 256-entry row per coefficient mapping a symbol
/// byte to `coeff * byte`. For GF(2^4) the row multiplies both nibbles.
struct FieldTables {
    log: Vec<u8>,
    exp: Vec<u8>,
    rows: Vec<[u8; 256]>,
    group_order: usize,
}

impl FieldTables {
    fn build(bits: usize, poly: u16) -> Self {
        let order = 1usize << bits;
        let group_order = order - 1;
        let mut log = vec![0u8; order];
        let mut exp = vec![0u8; group_order * 2];
        let mut x: u16 = 1;
        for i in 0..group_order {
            exp[i] = x as u8;
            exp[i + group_order] = x as u8; // For handling wrap-around
            log[x as usize] = i as u8;
            x <<= 1;
            if x & order as u16 != 0 {
                x ^= poly;
            }
        }

        let mut tables = Self {
            log,
            exp,
            rows: Vec::with_capacity(order),
            group_order,
        };
        for coeff in 0..order {
            let c = coeff as u8;
            let mut row = [0u8; 256];
            for (value, out) in row.iter_mut().enumerate() {
                let v = value as u8;
                *out = if bits == 8 {
                    tables.mul(c, v)
                } else {
                    (tables.mul(c, v >> 4) << 4) | tables.mul(c, v & 0x0F)
                };
            }
            tables.rows.push(row);
        }
        tables
    }

    #[inline(always)]
    fn mul(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let log_a = self.log[a as usize] as usize;
        let log_b = self.log[b as usize] as usize;
        self.exp[log_a + log_b]
    }

    #[inline(always)]
    fn inv(&self, a: u8) -> u8 {
        self.exp[self.group_order - self.log[a as usize] as usize]
    }
}

lazy_static! {
    static ref GF16_TABLES: FieldTables = FieldTables::build(4, GF16_POLY);
    static ref GF256_TABLES: FieldTables = FieldTables::build(8, GF256_POLY);
}

/// Forces construction of the shared multiplication tables.
///
/// Tables are built lazily on first use otherwise; calling this at
/// configuration time keeps the cost out of the first payload.
pub fn init_gf_tables() {
    lazy_static::initialize(&GF16_TABLES);
    lazy_static::initialize(&GF256_TABLES);
}

// --- Arithmetic ---

/// Arithmetic over one [`Field`], bound to the shared read-only tables.
///
/// Elements are passed unpacked, one per `u8`, and reduced to the field's
/// bit width on entry (`value & max_value`). Symbol buffers handed to
/// [`FiniteField::axpy`] and [`FiniteField::scale`] are interpreted packed
/// according to the field.
#[derive(Clone, Copy)]
pub struct FiniteField {
    field: Field,
    tables: Option<&'static FieldTables>,
}

impl std::fmt::Debug for FiniteField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiniteField")
            .field("field", &self.field)
            .finish()
    }
}

impl FiniteField {
    pub fn new(field: Field) -> Self {
        let tables: Option<&'static FieldTables> = match field {
            Field::Binary => None,
            Field::Binary4 => Some(&*GF16_TABLES),
            Field::Binary8 => Some(&*GF256_TABLES),
        };
        Self { field, tables }
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn is_element(&self, value: u8) -> bool {
        value <= self.field.max_value()
    }

    #[inline(always)]
    fn reduce(&self, value: u8) -> u8 {
        value & self.field.max_value()
    }

    #[inline(always)]
    pub fn add(&self, a: u8, b: u8) -> u8 {
        self.reduce(a ^ b)
    }

    #[inline(always)]
    pub fn subtract(&self, a: u8, b: u8) -> u8 {
        self.reduce(a ^ b)
    }

    #[inline(always)]
    pub fn multiply(&self, a: u8, b: u8) -> u8 {
        let (a, b) = (self.reduce(a), self.reduce(b));
        match self.tables {
            None => a & b,
            Some(t) => t.mul(a, b),
        }
    }

    /// Computes the multiplicative inverse of `a`.
    pub fn invert(&self, a: u8) -> Result<u8> {
        let a = self.reduce(a);
        if a == 0 {
            return Err(RlncError::DivideByZero);
        }
        Ok(match self.tables {
            None => 1,
            Some(t) => t.inv(a),
        })
    }

    pub fn divide(&self, a: u8, b: u8) -> Result<u8> {
        Ok(self.multiply(a, self.invert(b)?))
    }

    /// Computes `dest += coeff * src` over every element of the buffers.
    #[inline]
    pub fn axpy(&self, dest: &mut [u8], coeff: u8, src: &[u8]) {
        debug_assert_eq!(dest.len(), src.len());
        match self.reduce(coeff) {
            0 => {}
            1 => {
                for (d, s) in dest.iter_mut().zip(src) {
                    *d ^= *s;
                }
            }
            c => {
                // Only reachable for the extension fields; GF(2) has no other element.
                if let Some(t) = self.tables {
                    let row = &t.rows[c as usize];
                    for (d, s) in dest.iter_mut().zip(src) {
                        *d ^= row[*s as usize];
                    }
                }
            }
        }
    }

    /// Computes `dest *= coeff` over every element of the buffer.
    #[inline]
    pub fn scale(&self, dest: &mut [u8], coeff: u8) {
        match self.reduce(coeff) {
            0 => dest.iter_mut().for_each(|b| *b = 0),
            1 => {}
            c => {
                if let Some(t) = self.tables {
                    let row = &t.rows[c as usize];
                    for b in dest.iter_mut() {
                        *b = row[*b as usize];
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference shift-and-add multiplication.
    fn mul_shift(mut a: u16, mut b: u16, bits: u32, poly: u16) -> u8 {
        let mut res = 0u16;
        let top = 1u16 << bits;
        while b != 0 {
            if b & 1 != 0 {
                res ^= a;
            }
            a <<= 1;
            if a & top != 0 {
                a ^= poly;
            }
            b >>= 1;
        }
        res as u8
    }

    #[test]
    fn gf256_matches_reference() {
        let f = FiniteField::new(Field::Binary8);
        for a in 0..=255u16 {
            for b in 0..=255u16 {
                assert_eq!(
                    f.multiply(a as u8, b as u8),
                    mul_shift(a, b, 8, GF256_POLY),
                    "{} * {}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn gf16_matches_reference() {
        let f = FiniteField::new(Field::Binary4);
        for a in 0..16u16 {
            for b in 0..16u16 {
                assert_eq!(f.multiply(a as u8, b as u8), mul_shift(a, b, 4, GF16_POLY));
            }
        }
    }

    #[test]
    fn inverses() {
        for field in [Field::Binary, Field::Binary4, Field::Binary8] {
            let f = FiniteField::new(field);
            for a in 1..=field.max_value() {
                let inv = f.invert(a).unwrap();
                assert_eq!(f.multiply(a, inv), 1, "{:?} inverse of {}", field, a);
            }
            assert!(matches!(f.invert(0), Err(RlncError::DivideByZero)));
        }
    }

    #[test]
    fn divide_by_zero() {
        let f = FiniteField::new(Field::Binary8);
        assert!(matches!(f.divide(7, 0), Err(RlncError::DivideByZero)));
        assert_eq!(f.divide(0, 7).unwrap(), 0);
    }

    #[test]
    fn binary_axpy_is_xor() {
        let f = FiniteField::new(Field::Binary);
        let mut dest = vec![0xAA, 0x0F];
        f.axpy(&mut dest, 0, &[0xFF, 0xFF]);
        assert_eq!(dest, vec![0xAA, 0x0F]);
        f.axpy(&mut dest, 1, &[0xFF, 0xFF]);
        assert_eq!(dest, vec![0x55, 0xF0]);
    }

    #[test]
    fn binary4_axpy_treats_nibbles_independently() {
        let f = FiniteField::new(Field::Binary4);
        let src = [0x31u8];
        let mut dest = [0u8];
        f.axpy(&mut dest, 2, &src);
        let expected = (f.multiply(2, 3) << 4) | f.multiply(2, 1);
        assert_eq!(dest[0], expected);
    }

    #[test]
    fn scale_then_inverse_restores() {
        let f = FiniteField::new(Field::Binary8);
        let original: Vec<u8> = (0..=255).collect();
        let mut buf = original.clone();
        f.scale(&mut buf, 0x53);
        f.scale(&mut buf, f.invert(0x53).unwrap());
        assert_eq!(buf, original);
    }

    #[test]
    fn out_of_range_inputs_are_reduced() {
        let gf2 = FiniteField::new(Field::Binary);
        assert_eq!(gf2.multiply(3, 3), 1);
        assert_eq!(gf2.add(2, 3), 1);
        assert_eq!(gf2.invert(3).unwrap(), 1);
        assert!(matches!(gf2.invert(2), Err(RlncError::DivideByZero)));
        let mut dest = [0x0Fu8, 0xF0];
        gf2.axpy(&mut dest, 3, &[0xFF, 0xFF]);
        assert_eq!(dest, [0xF0, 0x0F]);
        gf2.axpy(&mut dest, 2, &[0xFF, 0xFF]);
        assert_eq!(dest, [0xF0, 0x0F]);

        let gf16 = FiniteField::new(Field::Binary4);
        assert_eq!(gf16.multiply(16, 1), 0);
        assert_eq!(gf16.multiply(0x1F, 2), gf16.multiply(0x0F, 2));
        let mut buf = [0x21u8];
        gf16.scale(&mut buf, 0x13);
        let mut expected = [0x21u8];
        gf16.scale(&mut expected, 0x03);
        assert_eq!(buf, expected);
    }

    #[test]
    fn parse_field_names() {
        assert_eq!("gf256".parse::<Field>().unwrap(), Field::Binary8);
        assert_eq!("Binary4".parse::<Field>().unwrap(), Field::Binary4);
        assert!("gf65536".parse::<Field>().is_err());
    }
}
