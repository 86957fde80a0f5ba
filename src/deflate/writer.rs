//! DEFLATE block writer: token indexing, Huffman code generation, the
//! stored/fixed/dynamic size comparison, and final bit-exact serialization.

use crate::bits::BitWriter;
use crate::deflate::tables::{length_code, offset_code, CODE_LENGTH_ORDER, DISTANCE_TABLE, LENGTH_TABLE};
use crate::deflate::tokens::Token;
use crate::error::Result;
use crate::huffman::encoder::Code;
use crate::huffman::tables::{fixed_distance_codes, fixed_literal_codes};
use crate::huffman::HuffmanEncoder;
use std::io::Write;

const NUM_LITERAL_SYMBOLS: usize = 286;
const NUM_OFFSET_SYMBOLS: usize = 30;
const NUM_CODEGEN_SYMBOLS: usize = 19;
const MAX_STORED_LEN: usize = 65535;
const END_OF_BLOCK: usize = 256;

const STORED_TYPE: u32 = 0;
const FIXED_TYPE: u32 = 2;
const DYNAMIC_TYPE: u32 = 4;

/// Orchestrates one DEFLATE block: given a token stream (and optionally the
/// raw input it was derived from), picks the smallest of stored, fixed, or
/// dynamic Huffman encoding and writes it to the underlying sink.
pub struct BlockWriter<W: Write> {
    bw: BitWriter<W>,
    literal_freq: [u32; NUM_LITERAL_SYMBOLS],
    offset_freq: [u32; NUM_OFFSET_SYMBOLS],
    codegen_freq: [u32; NUM_CODEGEN_SYMBOLS],
    codegen: Vec<(u8, u8)>,
    literal_encoding: HuffmanEncoder,
    offset_encoding: HuffmanEncoder,
    codegen_encoding: HuffmanEncoder,
}

impl<W: Write> BlockWriter<W> {
    /// Wrap a byte sink in a fresh block writer.
    pub fn new(writer: W) -> Self {
        Self {
            bw: BitWriter::new(writer),
            literal_freq: [0; NUM_LITERAL_SYMBOLS],
            offset_freq: [0; NUM_OFFSET_SYMBOLS],
            codegen_freq: [0; NUM_CODEGEN_SYMBOLS],
            codegen: Vec::with_capacity(NUM_LITERAL_SYMBOLS + NUM_OFFSET_SYMBOLS),
            literal_encoding: HuffmanEncoder::new(NUM_LITERAL_SYMBOLS),
            offset_encoding: HuffmanEncoder::new(NUM_OFFSET_SYMBOLS),
            codegen_encoding: HuffmanEncoder::new(NUM_CODEGEN_SYMBOLS),
        }
    }

    /// Replace the underlying sink, clearing the bit buffer and sticky error.
    pub fn reset(&mut self, writer: W) -> W {
        self.bw.reset(writer)
    }

    /// The first error latched since construction or the last `reset`.
    pub fn error(&self) -> Option<&crate::error::Error> {
        self.bw.error()
    }

    /// Flush any pending bits to the sink.
    pub fn flush(&mut self) {
        self.bw.flush();
    }

    /// Pick the smallest of stored, fixed, or dynamic Huffman encoding.
    pub fn write_block(&mut self, tokens: &[Token], eof: bool, input: Option<&[u8]>) -> Result<()> {
        let (num_literals, num_offsets) = self.index_tokens(tokens);
        self.literal_encoding.generate(&self.literal_freq[..num_literals], 15)?;
        self.offset_encoding.generate(&self.offset_freq[..num_offsets], 15)?;

        let extra = self.extra_bits(num_literals, num_offsets);
        let fixed_sz = self.fixed_size(extra);

        self.generate_codegen(num_literals, num_offsets);
        self.codegen_encoding.generate(&self.codegen_freq, 7)?;
        let num_codegens = self.num_codegens();
        let dynamic_sz = self.dynamic_size(num_codegens, extra);

        let use_dynamic = dynamic_sz < fixed_sz;
        let chosen = fixed_sz.min(dynamic_sz);

        let (stored_sz, storable) = self.stored_size(input);
        if storable && stored_sz < chosen {
            let data = input.unwrap();
            self.write_stored_header(eof, data.len());
            self.bw.write_bytes(data);
            return Ok(());
        }

        if use_dynamic {
            self.write_dynamic_header(num_literals, num_offsets, num_codegens, eof);
            self.write_tokens(tokens, false);
        } else {
            self.write_fixed_header(eof);
            self.write_tokens(tokens, true);
        }
        Ok(())
    }

    /// Always dynamic Huffman, unless falling back to stored saves enough
    /// to clear the 1/16th margin.
    pub fn write_block_dynamic(
        &mut self,
        tokens: &[Token],
        eof: bool,
        input: Option<&[u8]>,
    ) -> Result<()> {
        let (num_literals, num_offsets) = self.index_tokens(tokens);
        self.literal_encoding.generate(&self.literal_freq[..num_literals], 15)?;
        self.offset_encoding.generate(&self.offset_freq[..num_offsets], 15)?;

        let extra = self.extra_bits(num_literals, num_offsets);
        self.generate_codegen(num_literals, num_offsets);
        self.codegen_encoding.generate(&self.codegen_freq, 7)?;
        let num_codegens = self.num_codegens();
        let dynamic_sz = self.dynamic_size(num_codegens, extra);

        let (stored_sz, storable) = self.stored_size(input);
        if storable && stored_sz < dynamic_sz + (dynamic_sz >> 4) {
            let data = input.unwrap();
            self.write_stored_header(eof, data.len());
            self.bw.write_bytes(data);
            return Ok(());
        }

        self.write_dynamic_header(num_literals, num_offsets, num_codegens, eof);
        self.write_tokens(tokens, false);
        Ok(())
    }

    /// Huffman-only mode: every input byte is a literal, no distance codes
    /// are ever used.
    pub fn write_block_huff(&mut self, eof: bool, input: &[u8]) -> Result<()> {
        self.literal_freq = [0; NUM_LITERAL_SYMBOLS];
        for &b in input {
            self.literal_freq[b as usize] += 1;
        }
        self.literal_freq[END_OF_BLOCK] = 1;
        let num_literals = last_used_index(&self.literal_freq, 257);
        self.literal_encoding.generate(&self.literal_freq[..num_literals], 15)?;

        self.offset_freq = [0; NUM_OFFSET_SYMBOLS];
        self.offset_freq[0] = 1;
        self.offset_encoding.generate(&self.offset_freq[..1], 15)?;

        self.generate_codegen(num_literals, 1);
        self.codegen_encoding.generate(&self.codegen_freq, 7)?;
        let num_codegens = self.num_codegens();
        let dynamic_sz = self.dynamic_size(num_codegens, 0);

        let (stored_sz, storable) = self.stored_size(Some(input));
        if storable && stored_sz < dynamic_sz + (dynamic_sz >> 4) {
            self.write_stored_header(eof, input.len());
            self.bw.write_bytes(input);
            return Ok(());
        }

        self.write_dynamic_header(num_literals, 1, num_codegens, eof);
        let lit_codes = self.literal_encoding.codes();
        for &b in input {
            let c = lit_codes[b as usize];
            self.bw.write_code(c.code, c.len);
        }
        let eob = lit_codes[END_OF_BLOCK];
        self.bw.write_code(eob.code, eob.len);
        Ok(())
    }

    fn index_tokens(&mut self, tokens: &[Token]) -> (usize, usize) {
        self.literal_freq = [0; NUM_LITERAL_SYMBOLS];
        self.offset_freq = [0; NUM_OFFSET_SYMBOLS];
        for &t in tokens {
            if t.is_match() {
                let lc = length_code(t.length()) as usize;
                self.literal_freq[257 + lc] += 1;
                let oc = offset_code(t.offset()) as usize;
                self.offset_freq[oc] += 1;
            } else {
                self.literal_freq[t.literal_value() as usize] += 1;
            }
        }
        self.literal_freq[END_OF_BLOCK] += 1;

        let num_literals = last_used_index(&self.literal_freq, 257);
        let mut num_offsets = last_used_index(&self.offset_freq, 0);
        if num_offsets == 0 {
            self.offset_freq[0] = 1;
            num_offsets = 1;
        }
        (num_literals, num_offsets)
    }

    fn generate_codegen(&mut self, num_literals: usize, num_offsets: usize) {
        self.codegen_freq = [0; NUM_CODEGEN_SYMBOLS];
        let mut combined = Vec::with_capacity(num_literals + num_offsets);
        combined.extend(self.literal_encoding.codes()[..num_literals].iter().map(|c| c.len));
        combined.extend(self.offset_encoding.codes()[..num_offsets].iter().map(|c| c.len));

        self.codegen = rle_encode_lengths(&combined);
        for &(sym, _) in &self.codegen {
            self.codegen_freq[sym as usize] += 1;
        }
    }

    fn num_codegens(&self) -> usize {
        let codes = self.codegen_encoding.codes();
        let mut n = 18usize;
        while n > 3 && codes[CODE_LENGTH_ORDER[n]].len == 0 {
            n -= 1;
        }
        n + 1
    }

    fn extra_bits(&self, num_literals: usize, num_offsets: usize) -> u64 {
        let mut bits = 0u64;
        for i in 0..num_literals.saturating_sub(257) {
            let (_, extra) = LENGTH_TABLE[i];
            bits += self.literal_freq[257 + i] as u64 * extra as u64;
        }
        for i in 0..num_offsets {
            let (_, extra) = DISTANCE_TABLE[i];
            bits += self.offset_freq[i] as u64 * extra as u64;
        }
        bits
    }

    fn fixed_size(&self, extra_bits: u64) -> u64 {
        3 + fixed_bit_length(&self.literal_freq, fixed_literal_codes())
            + fixed_bit_length(&self.offset_freq, fixed_distance_codes())
            + extra_bits
    }

    fn dynamic_size(&self, num_codegens: usize, extra_bits: u64) -> u64 {
        let header = 3
            + 5
            + 5
            + 4
            + 3 * num_codegens as u64
            + self.codegen_encoding.bit_length(&self.codegen_freq)
            + 2 * self.codegen_freq[16] as u64
            + 3 * self.codegen_freq[17] as u64
            + 7 * self.codegen_freq[18] as u64;
        header
            + self.literal_encoding.bit_length(&self.literal_freq)
            + self.offset_encoding.bit_length(&self.offset_freq)
            + extra_bits
    }

    fn stored_size(&self, input: Option<&[u8]>) -> (u64, bool) {
        match input {
            Some(data) if data.len() <= MAX_STORED_LEN => (((data.len() + 5) * 8) as u64, true),
            _ => (0, false),
        }
    }

    fn write_stored_header(&mut self, eof: bool, len: usize) {
        let flag = STORED_TYPE + eof as u32;
        self.bw.write_bits(flag, 3);
        self.bw.align_to_byte();
        self.bw.write_u16_le(len as u16);
        self.bw.write_u16_le(!(len as u16));
    }

    fn write_fixed_header(&mut self, eof: bool) {
        self.bw.write_bits(FIXED_TYPE + eof as u32, 3);
    }

    fn write_dynamic_header(
        &mut self,
        num_literals: usize,
        num_offsets: usize,
        num_codegens: usize,
        eof: bool,
    ) {
        self.bw.write_bits(DYNAMIC_TYPE + eof as u32, 3);
        self.bw.write_bits((num_literals - 257) as u32, 5);
        self.bw.write_bits((num_offsets - 1) as u32, 5);
        self.bw.write_bits((num_codegens - 4) as u32, 4);

        let codegen_codes = self.codegen_encoding.codes();
        for &sym in CODE_LENGTH_ORDER.iter().take(num_codegens) {
            self.bw.write_bits(codegen_codes[sym].len as u32, 3);
        }

        for &(sym, extra) in &self.codegen {
            let c = codegen_codes[sym as usize];
            self.bw.write_code(c.code, c.len);
            match sym {
                16 => self.bw.write_bits(extra as u32, 2),
                17 => self.bw.write_bits(extra as u32, 3),
                18 => self.bw.write_bits(extra as u32, 7),
                _ => {}
            }
        }
    }

    fn write_tokens(&mut self, tokens: &[Token], use_fixed: bool) {
        for &t in tokens {
            if t.is_match() {
                let length = t.length();
                let lc = length_code(length) as usize;
                let (base, extra_bits) = LENGTH_TABLE[lc];
                let c = literal_code(use_fixed, &self.literal_encoding, 257 + lc);
                self.bw.write_code(c.code, c.len);
                if extra_bits > 0 {
                    self.bw.write_bits(length - base as u32, extra_bits);
                }

                let offset = t.offset();
                let oc = offset_code(offset) as usize;
                let (obase, oextra) = DISTANCE_TABLE[oc];
                let c = offset_code_entry(use_fixed, &self.offset_encoding, oc);
                self.bw.write_code(c.code, c.len);
                if oextra > 0 {
                    self.bw.write_bits(offset - obase as u32, oextra);
                }
            } else {
                let c = literal_code(use_fixed, &self.literal_encoding, t.literal_value() as usize);
                self.bw.write_code(c.code, c.len);
            }
        }
        let eob = literal_code(use_fixed, &self.literal_encoding, END_OF_BLOCK);
        self.bw.write_code(eob.code, eob.len);
    }
}

#[inline]
fn literal_code(use_fixed: bool, dynamic: &HuffmanEncoder, sym: usize) -> Code {
    if use_fixed {
        fixed_literal_codes()[sym]
    } else {
        dynamic.codes()[sym]
    }
}

#[inline]
fn offset_code_entry(use_fixed: bool, dynamic: &HuffmanEncoder, sym: usize) -> Code {
    if use_fixed {
        fixed_distance_codes()[sym]
    } else {
        dynamic.codes()[sym]
    }
}

fn fixed_bit_length(freq: &[u32], codes: &[Code]) -> u64 {
    freq.iter().zip(codes.iter()).map(|(&f, c)| f as u64 * c.len as u64).sum()
}

fn last_used_index(freq: &[u32], floor: usize) -> usize {
    let mut idx = floor;
    for (i, &f) in freq.iter().enumerate() {
        if f > 0 {
            idx = idx.max(i + 1);
        }
    }
    idx
}

/// Run-length encode code lengths per RFC 1951 §3.2.7: symbol 16 repeats the
/// previous nonzero length 3..=6 times, 17 repeats a zero run 3..=10 times,
/// 18 repeats a zero run 11..=138 times.
fn rle_encode_lengths(lengths: &[u8]) -> Vec<(u8, u8)> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < lengths.len() {
        let sym = lengths[i];
        let mut total = 1usize;
        while i + total < lengths.len() && lengths[i + total] == sym {
            total += 1;
        }
        if sym != 0 {
            out.push((sym, 0));
            let mut remaining = total - 1;
            while remaining > 0 {
                if remaining < 3 {
                    for _ in 0..remaining {
                        out.push((sym, 0));
                    }
                    remaining = 0;
                } else {
                    let chunk = remaining.min(6);
                    out.push((16, (chunk - 3) as u8));
                    remaining -= chunk;
                }
            }
        } else {
            let mut remaining = total;
            while remaining >= 11 {
                let chunk = remaining.min(138);
                out.push((18, (chunk - 11) as u8));
                remaining -= chunk;
            }
            if remaining >= 3 {
                out.push((17, (remaining - 3) as u8));
                remaining = 0;
            }
            for _ in 0..remaining {
                out.push((0, 0));
            }
        }
        i += total;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rle_encodes_zero_runs() {
        let lengths = vec![0u8; 20];
        let encoded = rle_encode_lengths(&lengths);
        // 20 zeros -> one 18 (11..=138, chunk=18) covering 11, then a 17 covering remaining 9? let's just check symbol usage
        assert!(encoded.iter().any(|&(sym, _)| sym == 18 || sym == 17));
        let total: usize = encoded
            .iter()
            .map(|&(sym, extra)| match sym {
                16 => extra as usize + 3,
                17 => extra as usize + 3,
                18 => extra as usize + 11,
                _ => 1,
            })
            .sum();
        assert_eq!(total, 20);
    }

    #[test]
    fn rle_encodes_repeat_runs() {
        let lengths = vec![4u8, 4, 4, 4, 4, 4, 4, 4];
        let encoded = rle_encode_lengths(&lengths);
        assert_eq!(encoded[0], (4, 0));
        assert!(encoded.iter().any(|&(sym, _)| sym == 16));
    }

    #[test]
    fn null_huffman_emits_eob_bit_set_when_final() {
        let mut out = Vec::new();
        {
            let mut bw = BlockWriter::new(&mut out);
            let tokens = vec![Token::literal(0)];
            bw.write_block(&tokens, true, Some(&[0u8])).unwrap();
            bw.flush();
        }
        assert_eq!(out[0] & 1, 1);
    }

    #[test]
    fn write_block_is_reset_stable() {
        let mut out1 = Vec::new();
        let tokens = vec![Token::literal(b'a'), Token::literal(b'b'), Token::literal(b'a')];
        {
            let mut bw = BlockWriter::new(&mut out1);
            bw.write_block_huff(true, b"aba").unwrap();
            bw.flush();
        }
        let mut out2 = Vec::new();
        {
            let mut bw = BlockWriter::new(&mut out2);
            bw.write_block_huff(true, b"aba").unwrap();
            bw.flush();
        }
        assert_eq!(out1, out2);
        let _ = &tokens;
    }

    #[test]
    fn random_data_falls_back_to_stored() {
        let mut out = Vec::new();
        let data: Vec<u8> = (0..1000u32).map(|i| ((i * 2654435761) >> 24) as u8).collect();
        let tokens: Vec<Token> = data.iter().map(|&b| Token::literal(b)).collect();
        {
            let mut bw = BlockWriter::new(&mut out);
            bw.write_block(&tokens, true, Some(&data)).unwrap();
            bw.flush();
        }
        // stored header: 3 bits type(=1, BFINAL=1,BTYPE=00) + align + 4 len bytes + payload
        assert_eq!(out[0] & 0x07, 0x01);
        assert_eq!(&out[1..3], &(data.len() as u16).to_le_bytes());
    }
}
