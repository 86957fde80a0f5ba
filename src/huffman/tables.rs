//! Fixed (RFC 1951 §3.2.6) Huffman encodings, built once and shared by every
//! block writer.

use crate::huffman::encoder::Code;
use crate::deflate::tables::reverse_bits_n;
use std::sync::OnceLock;

/// Fixed Huffman literal/length code lengths.
pub fn fixed_literal_lengths() -> [u8; 288] {
    let mut lengths = [0u8; 288];
    lengths[0..=143].fill(8);
    lengths[144..=255].fill(9);
    lengths[256..=279].fill(7);
    lengths[280..=287].fill(8);
    lengths
}

/// Fixed Huffman distance code lengths. RFC 1951 defines 30 distance
/// symbols, all 5 bits wide.
pub fn fixed_distance_lengths() -> [u8; 30] {
    [5u8; 30]
}

fn build_fixed_literal_codes() -> [Code; 288] {
    let lengths = fixed_literal_lengths();
    let mut codes = [Code { code: 0, len: 0 }; 288];
    // RFC 1951 assigns these codes directly rather than by the generic
    // canonical-from-lengths procedure: consecutive integer values per
    // length range, offset so the overall order is still canonical.
    let mut next = [0u16; 10];
    next[7] = 0b0000000;
    next[8] = 0b00110000;
    next[9] = 0b110010000;
    for (sym, &len) in lengths.iter().enumerate() {
        let code = next[len as usize];
        next[len as usize] += 1;
        codes[sym] = Code { code: reverse_bits_n(code, len), len };
    }
    codes
}

fn build_fixed_distance_codes() -> [Code; 30] {
    let lengths = fixed_distance_lengths();
    let mut codes = [Code { code: 0, len: 0 }; 30];
    for (sym, &len) in lengths.iter().enumerate() {
        codes[sym] = Code { code: reverse_bits_n(sym as u16, len), len };
    }
    codes
}

/// The process-wide fixed literal/length code table.
pub fn fixed_literal_codes() -> &'static [Code; 288] {
    static CODES: OnceLock<[Code; 288]> = OnceLock::new();
    CODES.get_or_init(build_fixed_literal_codes)
}

/// The process-wide fixed distance code table.
pub fn fixed_distance_codes() -> &'static [Code; 30] {
    static CODES: OnceLock<[Code; 30]> = OnceLock::new();
    CODES.get_or_init(build_fixed_distance_codes)
}
