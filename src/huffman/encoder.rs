//! Length-limited canonical Huffman code construction.
//!
//! Code lengths are built with a package-merge style construction instead of
//! a plain Huffman tree plus post-hoc length clamping: package-merge finds
//! the truly optimal set of lengths subject to the `max_bits` ceiling, where
//! tree-then-clamp approaches can overshoot and require ad-hoc redistribution.

use crate::deflate::tables::reverse_bits_n;
use crate::error::{Error, Result};

/// Maximum code length for the literal/length and distance alphabets.
pub const MAX_CODE_LENGTH: u8 = 15;
/// Maximum code length for the code-length ("codegen") alphabet.
pub const MAX_CL_CODE_LENGTH: u8 = 7;

/// A single canonical Huffman code: `code` is already bit-reversed so that an
/// LSB-first bit writer emits it MSB-first, as DEFLATE requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Code {
    pub code: u16,
    pub len: u8,
}

/// Builds and holds the canonical codes for one DEFLATE alphabet (literal,
/// distance, or code-length).
#[derive(Debug, Clone, Default)]
pub struct HuffmanEncoder {
    codes: Vec<Code>,
}

impl HuffmanEncoder {
    /// Create an encoder for an alphabet of `num_symbols` symbols, all
    /// initially unused (length 0).
    pub fn new(num_symbols: usize) -> Self {
        Self { codes: vec![Code::default(); num_symbols] }
    }

    /// Regenerate the canonical codes from symbol frequencies.
    pub fn generate(&mut self, freq: &[u32], max_bits: u8) -> Result<()> {
        if max_bits >= 16 {
            return Err(Error::CodeLengthTooLarge { max_bits });
        }
        let lengths = compute_code_lengths(freq, max_bits)?;
        self.codes = codes_from_lengths(&lengths);
        Ok(())
    }

    /// The canonical code table, one entry per symbol.
    pub fn codes(&self) -> &[Code] {
        &self.codes
    }

    /// Total bits needed to encode `freq` under the current code table.
    pub fn bit_length(&self, freq: &[u32]) -> u64 {
        freq.iter()
            .zip(self.codes.iter())
            .map(|(&f, c)| f as u64 * c.len as u64)
            .sum()
    }
}

/// Assigns canonical codes to symbols given their code lengths (RFC 1951
/// §3.2.2): within each length, symbols are ordered ascending and receive
/// consecutive code values.
pub fn codes_from_lengths(lengths: &[u8]) -> Vec<Code> {
    let max_bits = lengths.iter().copied().max().unwrap_or(0) as usize;
    if max_bits == 0 {
        return vec![Code::default(); lengths.len()];
    }
    let mut bl_count = vec![0u32; max_bits + 1];
    for &len in lengths {
        if len > 0 {
            bl_count[len as usize] += 1;
        }
    }
    let mut next_code = vec![0u32; max_bits + 2];
    let mut code = 0u32;
    for bits in 1..=max_bits {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }
    let mut codes = vec![Code::default(); lengths.len()];
    for (sym, &len) in lengths.iter().enumerate() {
        if len == 0 {
            continue;
        }
        let c = next_code[len as usize];
        next_code[len as usize] += 1;
        codes[sym] = Code { code: reverse_bits_n(c as u16, len), len };
    }
    codes
}

#[derive(Clone)]
struct Item {
    weight: u64,
    symbols: Vec<u32>,
}

fn pair_up(items: &[Item]) -> Vec<Item> {
    let pairs = items.len() / 2;
    let mut out = Vec::with_capacity(pairs);
    for i in 0..pairs {
        let a = &items[2 * i];
        let b = &items[2 * i + 1];
        let mut symbols = Vec::with_capacity(a.symbols.len() + b.symbols.len());
        symbols.extend_from_slice(&a.symbols);
        symbols.extend_from_slice(&b.symbols);
        out.push(Item { weight: a.weight + b.weight, symbols });
    }
    out
}

fn merge_sorted(a: Vec<Item>, b: &[Item]) -> Vec<Item> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut ai = a.into_iter().peekable();
    let mut bi = b.iter().cloned().peekable();
    loop {
        match (ai.peek(), bi.peek()) {
            (Some(x), Some(y)) => {
                if x.weight <= y.weight {
                    out.push(ai.next().unwrap());
                } else {
                    out.push(bi.next().unwrap());
                }
            }
            (Some(_), None) => out.push(ai.next().unwrap()),
            (None, Some(_)) => out.push(bi.next().unwrap()),
            (None, None) => break,
        }
    }
    out
}

/// Package-merge length-limited Huffman code-length construction.
///
/// Builds a list of leaves sorted by ascending frequency, then for each
/// level up to `max_bits` packages adjacent pairs from the previous level
/// and merges them back in with the original leaves. The lowest-weight
/// `2n - 2` items at the top level determine, by how many times each symbol
/// appears among them, that symbol's final code length.
fn compute_code_lengths(freq: &[u32], max_bits: u8) -> Result<Vec<u8>> {
    let num_symbols = freq.len();
    let mut lengths = vec![0u8; num_symbols];

    let mut leaves: Vec<Item> = freq
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f > 0)
        .map(|(sym, &f)| Item { weight: f as u64, symbols: vec![sym as u32] })
        .collect();
    leaves.sort_by(|a, b| a.weight.cmp(&b.weight));

    let n = leaves.len();
    if n == 0 {
        return Ok(lengths);
    }
    if n <= 2 {
        for item in &leaves {
            lengths[item.symbols[0] as usize] = 1;
        }
        return Ok(lengths);
    }

    let mut current = leaves.clone();
    for _level in 2..=max_bits {
        let mut source = current;
        if source.len() % 2 == 1 {
            source.pop();
        }
        let packaged = pair_up(&source);
        current = merge_sorted(packaged, &leaves);
    }

    let take = (2 * n - 2).min(current.len());
    for item in &current[..take] {
        for &sym in &item.symbols {
            lengths[sym as usize] += 1;
        }
    }

    if lengths.iter().any(|&l| l > max_bits) {
        return Err(Error::HuffmanConstructionFailed { expected: max_bits as usize, found: 0 });
    }

    Ok(lengths)
}
