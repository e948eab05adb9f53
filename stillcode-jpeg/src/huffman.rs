//! Huffman coding for the entropy layer.
//!
//! Tables come from two places: the Annex K.3 defaults below, or an optimal
//! set built from symbol statistics (Annex K.2) when the encoder is asked to
//! optimize. Both end up in the same canonical `bits`/`huffval`
//! representation that travels in DHT segments.

use stillcode_core::JpegBitReader;

use crate::error::{JpegError, Result};
use crate::marker::ZIGZAG;

/// Table class: DC difference coding or AC run-length coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableClass {
    /// DC difference categories.
    Dc,
    /// AC (run, category) symbols.
    Ac,
}

impl TableClass {
    /// Wire value used in the DHT class/id byte.
    pub fn wire_value(self) -> u8 {
        match self {
            TableClass::Dc => 0,
            TableClass::Ac => 1,
        }
    }

    /// Human-readable class name for error reporting.
    pub fn name(self) -> &'static str {
        match self {
            TableClass::Dc => "DC",
            TableClass::Ac => "AC",
        }
    }
}

/// Number of bits needed to represent `|value|`; 0 maps to category 0.
pub fn magnitude_category(value: i32) -> u8 {
    let magnitude = value.unsigned_abs();
    (32 - magnitude.leading_zeros()) as u8
}

/// Raw magnitude bits for a signed value in its category.
///
/// Negative values are stored as `value + 2^category - 1`, the one's
/// complement form the decoder's receive/extend undoes.
pub fn magnitude_bits(value: i32, category: u8) -> u16 {
    if value < 0 {
        (value + (1 << category) - 1) as u16
    } else {
        value as u16
    }
}

/// Kraft capacity sum for a length-count array: `sum(bits[L] * 2^(16-L))`.
///
/// A decodable table never exceeds `2^16`.
pub fn kraft_sum(bits: &[u8; 17]) -> u32 {
    let mut sum = 0u32;
    for length in 1..=16 {
        sum += u32::from(bits[length]) << (16 - length);
    }
    sum
}

/// A canonical Huffman table.
///
/// `bits[1..=16]` counts the codes of each length and `huffval` lists the
/// symbols in (length, value) order; together they fully determine the code
/// assignment. The mincode/maxcode/valptr arrays are the derived decode
/// structure, built once and reused for every block.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    /// Table class.
    pub class: TableClass,
    /// Table id (0-3).
    pub id: u8,
    /// Count of codes per length; index 0 unused.
    pub bits: [u8; 17],
    /// Symbols ordered by (code length, symbol value).
    pub huffval: Vec<u8>,
    mincode: [i32; 17],
    maxcode: [i32; 17],
    valptr: [i32; 17],
}

impl HuffmanTable {
    /// Build a table from its canonical bits/huffval definition.
    ///
    /// Validates the symbol count against the length counts and the Kraft
    /// capacity bound before deriving the decode structure.
    pub fn from_spec(class: TableClass, id: u8, bits: [u8; 17], huffval: Vec<u8>) -> Result<Self> {
        let total: usize = bits[1..=16].iter().map(|&c| usize::from(c)).sum();
        if total != huffval.len() || total > 256 {
            return Err(JpegError::InvalidSegment {
                marker: crate::marker::bytes::DHT,
                reason: format!(
                    "length counts describe {} symbols, {} provided",
                    total,
                    huffval.len()
                ),
            });
        }
        if kraft_sum(&bits) > (1 << 16) {
            return Err(JpegError::InvalidSegment {
                marker: crate::marker::bytes::DHT,
                reason: "code lengths exceed prefix-code capacity".into(),
            });
        }

        let mut table = Self {
            class,
            id,
            bits,
            huffval,
            mincode: [0; 17],
            maxcode: [-1; 17],
            valptr: [0; 17],
        };
        table.build_lookup();
        Ok(table)
    }

    /// Derive mincode/maxcode/valptr from bits (Annex C code generation).
    fn build_lookup(&mut self) {
        let mut huffsize = Vec::with_capacity(self.huffval.len());
        for length in 1..=16u8 {
            for _ in 0..self.bits[usize::from(length)] {
                huffsize.push(length);
            }
        }

        let mut huffcode = Vec::with_capacity(huffsize.len());
        let mut code = 0i32;
        let mut prev_size = huffsize.first().copied().unwrap_or(0);
        for &size in &huffsize {
            while prev_size < size {
                code <<= 1;
                prev_size += 1;
            }
            huffcode.push(code);
            code += 1;
        }

        let mut index = 0usize;
        for length in 1..=16usize {
            if self.bits[length] == 0 {
                self.maxcode[length] = -1;
            } else {
                self.valptr[length] = index as i32;
                self.mincode[length] = huffcode[index];
                index += usize::from(self.bits[length]);
                self.maxcode[length] = huffcode[index - 1];
            }
        }
    }

    /// Decode one symbol, reading bit by bit.
    ///
    /// Fails with `InvalidHuffmanCode` when no code matches within 16 bits.
    /// Marker-encountered conditions from the reader pass through untouched.
    pub fn decode_symbol(&self, reader: &mut JpegBitReader<'_>) -> Result<u8> {
        let mut code = i32::from(reader.read_bit()?);
        let mut length = 1usize;

        while code > self.maxcode[length] {
            if length >= 16 {
                return Err(JpegError::InvalidHuffmanCode);
            }
            code = (code << 1) | i32::from(reader.read_bit()?);
            length += 1;
        }

        let index = (self.valptr[length] + code - self.mincode[length]) as usize;
        self.huffval
            .get(index)
            .copied()
            .ok_or(JpegError::InvalidHuffmanCode)
    }
}

/// Encode-side lookup: symbol to (code, length).
#[derive(Debug, Clone)]
pub struct HuffmanEncoder {
    codes: [(u16, u8); 256],
}

impl HuffmanEncoder {
    /// Derive the canonical code assignment from a table.
    pub fn from_table(table: &HuffmanTable) -> Self {
        let mut codes = [(0u16, 0u8); 256];
        let mut code = 0u16;
        let mut index = 0usize;

        for length in 1..=16u8 {
            for _ in 0..table.bits[usize::from(length)] {
                let symbol = usize::from(table.huffval[index]);
                codes[symbol] = (code, length);
                index += 1;
                code += 1;
            }
            code <<= 1;
        }

        Self { codes }
    }

    /// Look up a symbol's code; `None` when the table does not define it.
    pub fn code(&self, symbol: u8) -> Option<(u16, u8)> {
        let entry = self.codes[usize::from(symbol)];
        (entry.1 > 0).then_some(entry)
    }
}

// ---------------------------------------------------------------------------
// Annex K.3 default tables
// ---------------------------------------------------------------------------

/// Standard DC luminance table.
pub fn dc_luminance() -> HuffmanTable {
    let bits = [0, 0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
    let huffval = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
    HuffmanTable::from_spec(TableClass::Dc, 0, bits, huffval)
        .expect("Annex K table definitions are well formed")
}

/// Standard DC chrominance table.
pub fn dc_chrominance() -> HuffmanTable {
    let bits = [0, 0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
    let huffval = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
    HuffmanTable::from_spec(TableClass::Dc, 1, bits, huffval)
        .expect("Annex K table definitions are well formed")
}

/// Standard AC luminance table.
pub fn ac_luminance() -> HuffmanTable {
    let bits = [0, 0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 125];
    let huffval = vec![
        0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, //
        0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07, //
        0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08, //
        0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52, 0xD1, 0xF0, //
        0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A, 0x16, //
        0x17, 0x18, 0x19, 0x1A, 0x25, 0x26, 0x27, 0x28, //
        0x29, 0x2A, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, //
        0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, //
        0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, //
        0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, //
        0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, //
        0x7A, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, //
        0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, //
        0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, //
        0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, //
        0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5, //
        0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, //
        0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1, 0xE2, //
        0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, //
        0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, //
        0xF9, 0xFA,
    ];
    HuffmanTable::from_spec(TableClass::Ac, 0, bits, huffval)
        .expect("Annex K table definitions are well formed")
}

/// Standard AC chrominance table.
pub fn ac_chrominance() -> HuffmanTable {
    let bits = [0, 0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 119];
    let huffval = vec![
        0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, //
        0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71, //
        0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, //
        0xA1, 0xB1, 0xC1, 0x09, 0x23, 0x33, 0x52, 0xF0, //
        0x15, 0x62, 0x72, 0xD1, 0x0A, 0x16, 0x24, 0x34, //
        0xE1, 0x25, 0xF1, 0x17, 0x18, 0x19, 0x1A, 0x26, //
        0x27, 0x28, 0x29, 0x2A, 0x35, 0x36, 0x37, 0x38, //
        0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, //
        0x49, 0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, //
        0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, //
        0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, //
        0x79, 0x7A, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, //
        0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, //
        0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, //
        0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, //
        0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, //
        0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, //
        0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, //
        0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, //
        0xEA, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, //
        0xF9, 0xFA,
    ];
    HuffmanTable::from_spec(TableClass::Ac, 1, bits, huffval)
        .expect("Annex K table definitions are well formed")
}

// ---------------------------------------------------------------------------
// Shared block walker
// ---------------------------------------------------------------------------

/// Receiver for the symbol sequence of one block.
///
/// Implemented by the statistics histogram collector and by the bit-level
/// emitter; both are driven through [`walk_block`] so they can never
/// disagree about which symbols a block produces.
pub trait BlockSink {
    /// The block's DC difference: its category and signed value.
    fn dc(&mut self, category: u8, diff: i32) -> Result<()>;

    /// One AC symbol byte (`run << 4 | category`, with ZRL `0xF0` and EOB
    /// `0x00`) plus the coefficient value for its magnitude bits.
    fn ac(&mut self, symbol: u8, category: u8, value: i32) -> Result<()>;
}

/// Histogram-filling sink for the encoder's statistics pass.
#[derive(Debug)]
pub struct StatsSink<'a> {
    /// DC category histogram.
    pub dc: &'a mut FrequencyCounter,
    /// AC symbol histogram.
    pub ac: &'a mut FrequencyCounter,
}

impl BlockSink for StatsSink<'_> {
    fn dc(&mut self, category: u8, _diff: i32) -> Result<()> {
        self.dc.record(category);
        Ok(())
    }

    fn ac(&mut self, symbol: u8, _category: u8, _value: i32) -> Result<()> {
        self.ac.record(symbol);
        Ok(())
    }
}

/// Walk one quantized block in zigzag order, producing the exact symbol
/// sequence the entropy coder emits.
///
/// Returns the block's DC level for the caller's running predictor.
pub fn walk_block(levels: &[i16; 64], prev_dc: i16, sink: &mut impl BlockSink) -> Result<i16> {
    let dc = levels[0];
    let diff = i32::from(dc) - i32::from(prev_dc);
    let dc_category = magnitude_category(diff);
    if dc_category > 15 {
        return Err(JpegError::CategoryOverflow { value: diff });
    }
    sink.dc(dc_category, diff)?;

    let mut zero_run = 0u8;
    for k in 1..64 {
        let value = i32::from(levels[ZIGZAG[k]]);
        if value == 0 {
            zero_run += 1;
            continue;
        }
        while zero_run >= 16 {
            sink.ac(0xF0, 0, 0)?;
            zero_run -= 16;
        }
        let category = magnitude_category(value);
        if category > 15 {
            return Err(JpegError::CategoryOverflow { value });
        }
        sink.ac((zero_run << 4) | category, category, value)?;
        zero_run = 0;
    }
    if zero_run > 0 {
        sink.ac(0x00, 0, 0)?;
    }

    Ok(dc)
}

// ---------------------------------------------------------------------------
// Annex K.2 optimal table construction
// ---------------------------------------------------------------------------

/// Symbol frequency histogram feeding optimal table construction.
///
/// Slot 256 is reserved for the pseudo-symbol that keeps the all-ones code
/// unassigned.
#[derive(Debug, Clone)]
pub struct FrequencyCounter {
    counts: [i64; 257],
}

impl Default for FrequencyCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrequencyCounter {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self { counts: [0; 257] }
    }

    /// Count one occurrence of a symbol.
    pub fn record(&mut self, symbol: u8) {
        self.counts[usize::from(symbol)] += 1;
    }

    /// Whether no symbol has been recorded.
    pub fn is_empty(&self) -> bool {
        self.counts[..256].iter().all(|&c| c == 0)
    }
}

/// Sentinel marking a node already merged into another tree.
const FREQ_MERGED: i64 = i64::MAX;

/// Longest code length Huffman's algorithm can produce here before limiting.
const MAX_CODE_LENGTH: usize = 32;

/// Build an optimal canonical table from symbol statistics (Annex K.2).
///
/// Code lengths are limited to 16 bits by rebalancing length counts; the
/// result is deterministic for identical histograms and always satisfies the
/// Kraft capacity bound.
pub fn build_optimal_table(
    class: TableClass,
    id: u8,
    histogram: &FrequencyCounter,
) -> Result<HuffmanTable> {
    let mut freq = histogram.counts;
    // The reserved pseudo-symbol guarantees no real symbol gets all ones.
    freq[256] = 1;

    let mut codesize = [0usize; 257];
    let mut others = [-1i32; 257];

    loop {
        // Two smallest nonzero frequencies; ties resolve toward the larger
        // symbol so the assignment is deterministic.
        let mut c1: i32 = -1;
        let mut c2: i32 = -1;
        let mut v1 = i64::MAX;
        let mut v2 = i64::MAX;
        for (i, &f) in freq.iter().enumerate() {
            if f > 0 && f < FREQ_MERGED {
                if f <= v1 {
                    c2 = c1;
                    v2 = v1;
                    v1 = f;
                    c1 = i as i32;
                } else if f <= v2 {
                    v2 = f;
                    c2 = i as i32;
                }
            }
        }
        if c2 < 0 {
            break;
        }

        let c1 = c1 as usize;
        let c2 = c2 as usize;

        freq[c1] = freq[c1].saturating_add(freq[c2]);
        freq[c2] = FREQ_MERGED;

        codesize[c1] += 1;
        let mut node = c1;
        while others[node] >= 0 {
            node = others[node] as usize;
            codesize[node] += 1;
        }
        others[node] = c2 as i32;

        codesize[c2] += 1;
        let mut node = c2;
        while others[node] >= 0 {
            node = others[node] as usize;
            codesize[node] += 1;
        }
    }

    // Count symbols at each code length.
    let mut length_counts = [0i32; MAX_CODE_LENGTH + 1];
    for &size in codesize.iter() {
        if size > 0 {
            if size > MAX_CODE_LENGTH {
                return Err(JpegError::CodeLengthOverflow);
            }
            length_counts[size] += 1;
        }
    }

    // Limit to 16 bits: move pairs of symbols up from over-deep levels,
    // splitting a shorter code to make room (Annex K.2 figure K.3).
    for i in (17..=MAX_CODE_LENGTH).rev() {
        while length_counts[i] > 0 {
            let mut j = i - 2;
            while j > 0 && length_counts[j] == 0 {
                j -= 1;
            }
            if j == 0 {
                return Err(JpegError::CodeLengthOverflow);
            }
            length_counts[i] -= 2;
            length_counts[i - 1] += 1;
            length_counts[j + 1] += 2;
            length_counts[j] -= 1;
        }
    }

    // Drop the pseudo-symbol from the deepest occupied level.
    let mut deepest = 16;
    while deepest > 0 && length_counts[deepest] == 0 {
        deepest -= 1;
    }
    if deepest > 0 {
        length_counts[deepest] -= 1;
    }

    // Reassign lengths to the real symbols: frequency order (original
    // codesize) first, symbol value as the deterministic tiebreak.
    let mut real_symbols: Vec<(usize, usize)> = (0..256usize)
        .filter(|&sym| codesize[sym] > 0)
        .map(|sym| (codesize[sym], sym))
        .collect();
    real_symbols.sort_unstable();

    let mut bits = [0u8; 17];
    let mut lengths = [0u8; 256];
    let mut symbol_iter = real_symbols.iter();
    for length in 1..=16usize {
        for _ in 0..length_counts[length] {
            if let Some(&(_, sym)) = symbol_iter.next() {
                lengths[sym] = length as u8;
                bits[length] += 1;
            }
        }
    }

    // Canonical huffval: (length, symbol value) order.
    let mut huffval = Vec::new();
    for length in 1..=16u8 {
        for (sym, &len) in lengths.iter().enumerate() {
            if len == length {
                huffval.push(sym as u8);
            }
        }
    }

    HuffmanTable::from_spec(class, id, bits, huffval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stillcode_core::JpegBitWriter;

    fn roundtrip_symbols(table: &HuffmanTable) {
        let encoder = HuffmanEncoder::from_table(table);
        for &symbol in &table.huffval {
            let (code, length) = encoder.code(symbol).expect("symbol has a code");
            let mut writer = JpegBitWriter::new();
            writer.write_bits(code, length).unwrap();
            writer.align().unwrap();
            let bytes = writer.finish().unwrap();
            let mut reader = JpegBitReader::new(&bytes);
            assert_eq!(
                table.decode_symbol(&mut reader).unwrap(),
                symbol,
                "symbol 0x{:02X}",
                symbol
            );
        }
    }

    #[test]
    fn test_magnitude_category() {
        assert_eq!(magnitude_category(0), 0);
        assert_eq!(magnitude_category(1), 1);
        assert_eq!(magnitude_category(-1), 1);
        assert_eq!(magnitude_category(2), 2);
        assert_eq!(magnitude_category(-3), 2);
        assert_eq!(magnitude_category(255), 8);
        assert_eq!(magnitude_category(-255), 8);
        assert_eq!(magnitude_category(1023), 10);
        assert_eq!(magnitude_category(-2047), 11);
        assert_eq!(magnitude_category(32767), 15);
    }

    #[test]
    fn test_standard_tables_satisfy_kraft() {
        for table in [
            dc_luminance(),
            dc_chrominance(),
            ac_luminance(),
            ac_chrominance(),
        ] {
            assert!(kraft_sum(&table.bits) <= 1 << 16);
            let total: usize = table.bits[1..=16].iter().map(|&c| usize::from(c)).sum();
            assert_eq!(total, table.huffval.len());
        }
    }

    #[test]
    fn test_standard_tables_roundtrip_every_symbol() {
        for table in [
            dc_luminance(),
            dc_chrominance(),
            ac_luminance(),
            ac_chrominance(),
        ] {
            roundtrip_symbols(&table);
        }
    }

    #[test]
    fn test_invalid_spec_rejected() {
        // Count/symbol mismatch.
        let mut bits = [0u8; 17];
        bits[2] = 3;
        assert!(HuffmanTable::from_spec(TableClass::Dc, 0, bits, vec![1, 2]).is_err());

        // Kraft violation: 5 codes of length 2 cannot exist.
        let mut bits = [0u8; 17];
        bits[2] = 5;
        assert!(HuffmanTable::from_spec(TableClass::Dc, 0, bits, vec![0, 1, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_decode_rejects_corrupt_code() {
        // DC luminance leaves the all-ones 9-bit-and-beyond space unassigned.
        let table = dc_luminance();
        let bytes = [0xFF, 0x00, 0xFF, 0x00];
        let mut reader = JpegBitReader::new(&bytes);
        assert!(matches!(
            table.decode_symbol(&mut reader),
            Err(JpegError::InvalidHuffmanCode)
        ));
    }

    #[test]
    fn test_optimal_table_limits_depth() {
        // Fibonacci frequencies drive raw Huffman depth past 16, forcing the
        // rebalancing pass to engage.
        let mut histogram = FrequencyCounter::new();
        let (mut a, mut b) = (1i64, 1i64);
        for sym in 0u8..30 {
            histogram.counts[usize::from(sym)] = a;
            let next = a + b;
            a = b;
            b = next;
        }
        let table = build_optimal_table(TableClass::Ac, 0, &histogram).unwrap();
        assert!(kraft_sum(&table.bits) <= 1 << 16);
        assert_eq!(table.huffval.len(), 30);
        assert!(table.bits[1..=16].iter().any(|&c| c > 0));
        roundtrip_symbols(&table);
    }

    #[test]
    fn test_optimal_table_single_symbol() {
        let mut histogram = FrequencyCounter::new();
        for _ in 0..10 {
            histogram.record(0x42);
        }
        let table = build_optimal_table(TableClass::Ac, 0, &histogram).unwrap();
        assert_eq!(table.huffval, vec![0x42]);
        roundtrip_symbols(&table);
    }

    #[test]
    fn test_optimal_table_deterministic() {
        let mut histogram = FrequencyCounter::new();
        for sym in [3u8, 3, 3, 7, 7, 9, 9, 0xF0, 0x00, 0x00] {
            histogram.record(sym);
        }
        let a = build_optimal_table(TableClass::Ac, 1, &histogram).unwrap();
        let b = build_optimal_table(TableClass::Ac, 1, &histogram).unwrap();
        assert_eq!(a.bits, b.bits);
        assert_eq!(a.huffval, b.huffval);
    }

    #[test]
    fn test_optimal_table_all_symbols() {
        let mut histogram = FrequencyCounter::new();
        for sym in 0u16..256 {
            for _ in 0..=(sym % 7) {
                histogram.record(sym as u8);
            }
        }
        let table = build_optimal_table(TableClass::Ac, 0, &histogram).unwrap();
        assert!(kraft_sum(&table.bits) <= 1 << 16);
        assert!(table.bits[1..=16].iter().map(|&c| usize::from(c)).sum::<usize>() <= 256);
        roundtrip_symbols(&table);
    }

    #[derive(Default)]
    struct RecordingSink {
        dc: Vec<(u8, i32)>,
        ac: Vec<u8>,
    }

    impl BlockSink for RecordingSink {
        fn dc(&mut self, category: u8, diff: i32) -> Result<()> {
            self.dc.push((category, diff));
            Ok(())
        }

        fn ac(&mut self, symbol: u8, _category: u8, _value: i32) -> Result<()> {
            self.ac.push(symbol);
            Ok(())
        }
    }

    #[test]
    fn test_walk_block_dc_difference() {
        let mut levels = [0i16; 64];
        levels[0] = 12;
        let mut sink = RecordingSink::default();
        let new_dc = walk_block(&levels, 5, &mut sink).unwrap();
        assert_eq!(new_dc, 12);
        assert_eq!(sink.dc, vec![(3, 7)]);
    }

    #[test]
    fn test_walk_block_zrl_folding() {
        let mut levels = [0i16; 64];
        // Zigzag position 20 holds a value; 19 zeros precede it.
        levels[ZIGZAG[20]] = -2;
        let mut sink = RecordingSink::default();
        walk_block(&levels, 0, &mut sink).unwrap();
        // 19 zeros = one ZRL (16) + run of 3, then EOB for the tail.
        assert_eq!(sink.ac, vec![0xF0, (3 << 4) | 2, 0x00]);
    }

    #[test]
    fn test_walk_block_no_eob_when_last_coefficient_set() {
        let mut levels = [0i16; 64];
        levels[ZIGZAG[63]] = 1;
        let mut sink = RecordingSink::default();
        walk_block(&levels, 0, &mut sink).unwrap();
        assert_eq!(sink.ac.last(), Some(&((14 << 4) | 1)));
        assert!(!sink.ac.contains(&0x00));
    }

    #[test]
    fn test_walk_block_all_zero_is_dc_plus_eob() {
        let levels = [0i16; 64];
        let mut sink = RecordingSink::default();
        walk_block(&levels, 0, &mut sink).unwrap();
        assert_eq!(sink.dc, vec![(0, 0)]);
        assert_eq!(sink.ac, vec![0x00]);
    }

    #[test]
    fn test_stats_sink_counts_symbols() {
        let mut dc = FrequencyCounter::new();
        let mut ac = FrequencyCounter::new();
        let mut levels = [0i16; 64];
        levels[0] = 3;
        levels[ZIGZAG[1]] = -1;
        walk_block(&levels, 0, &mut StatsSink { dc: &mut dc, ac: &mut ac }).unwrap();
        assert!(!dc.is_empty());
        assert!(!ac.is_empty());
        assert_eq!(dc.counts[2], 1); // category of diff 3
        assert_eq!(ac.counts[0x01], 1); // run 0, category 1
        assert_eq!(ac.counts[0x00], 1); // EOB
    }
}
