//! End-to-end tests cross-validating the block writer and match-finder
//! against a reference DEFLATE decoder.

use std::io::Read;

use defblock::{BlockWriter, MatchFinder, Token};

fn generate_random_data(size: usize, seed: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state = seed | 1;
    for _ in 0..size {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        data.push((state & 0xff) as u8);
    }
    data
}

fn generate_repetitive_data(size: usize) -> Vec<u8> {
    b"AAAAAAAAAAAAAAAA".iter().cycle().take(size).copied().collect()
}

fn generate_mixed_data(size: usize) -> Vec<u8> {
    let patterns: [&[u8]; 3] =
        [b"ACGTACGTACGTACGT", b"NNNNNNNNNNNNNNNN", b"ATATATATATATATAT"];
    let mut data = Vec::with_capacity(size);
    let mut idx = 0;
    while data.len() < size {
        let pattern = patterns[idx % patterns.len()];
        let remaining = size - data.len();
        let take = remaining.min(pattern.len());
        data.extend_from_slice(&pattern[..take]);
        idx += 1;
    }
    data
}

/// Compress `data` into a raw DEFLATE stream, splitting it into
/// `block_size`-byte blocks (each tokenized independently), always choosing
/// the smallest of stored/fixed/dynamic per block.
fn compress(data: &[u8], block_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut mf = MatchFinder::new();
        let mut bw = BlockWriter::new(&mut out);
        if data.is_empty() {
            bw.write_block(&[], true, Some(data)).unwrap();
        } else {
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + block_size).min(data.len());
                let chunk = &data[offset..end];
                let mut tokens = Vec::new();
                mf.next_block(chunk, &mut tokens);
                let eof = end == data.len();
                bw.write_block(&tokens, eof, Some(chunk)).unwrap();
                offset = end;
            }
        }
        bw.flush();
    }
    out
}

/// Same as `compress`, but always forces dynamic Huffman (exercises
/// `write_block_dynamic`'s stored-fallback margin).
fn compress_dynamic(data: &[u8], block_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut mf = MatchFinder::new();
        let mut bw = BlockWriter::new(&mut out);
        let mut offset = 0;
        loop {
            let end = (offset + block_size).min(data.len());
            let chunk = &data[offset..end];
            let mut tokens = Vec::new();
            mf.next_block(chunk, &mut tokens);
            let eof = end == data.len();
            bw.write_block_dynamic(&tokens, eof, Some(chunk)).unwrap();
            if eof {
                break;
            }
            offset = end;
        }
        bw.flush();
    }
    out
}

fn compress_huff(data: &[u8], block_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut bw = BlockWriter::new(&mut out);
        let mut offset = 0;
        loop {
            let end = (offset + block_size).min(data.len());
            let chunk = &data[offset..end];
            let eof = end == data.len();
            bw.write_block_huff(eof, chunk).unwrap();
            if eof {
                break;
            }
            offset = end;
        }
        bw.flush();
    }
    out
}

fn inflate(deflated: &[u8]) -> Vec<u8> {
    let mut decoder = flate2::read::DeflateDecoder::new(deflated);
    let mut result = Vec::new();
    decoder.read_to_end(&mut result).unwrap();
    result
}

#[test]
fn empty_input_round_trips() {
    let out = compress(&[], 65280);
    assert_eq!(inflate(&out), Vec::<u8>::new());
}

#[test]
fn small_input_round_trips() {
    let data = b"Hello, World!".to_vec();
    let out = compress(&data, 65280);
    assert_eq!(inflate(&out), data);
}

#[test]
fn single_block_round_trips() {
    let data = generate_random_data(60_000, 12345);
    let out = compress(&data, 65280);
    assert_eq!(inflate(&out), data);
}

#[test]
fn multiple_blocks_round_trip() {
    let data = generate_mixed_data(200_000);
    let out = compress(&data, 65280);
    assert_eq!(inflate(&out), data);
}

#[test]
fn highly_compressible_data_shrinks() {
    let data = generate_repetitive_data(500_000);
    let out = compress(&data, 65280);
    assert_eq!(inflate(&out), data);
    assert!(out.len() < data.len());
}

#[test]
fn incompressible_data_round_trips() {
    let data = generate_random_data(50_000, 99999);
    let out = compress(&data, 32768);
    assert_eq!(inflate(&out), data);
}

#[test]
fn all_byte_values_round_trip() {
    let mut data = Vec::with_capacity(256 * 10);
    for _ in 0..10 {
        data.extend(0u8..=255);
    }
    let out = compress(&data, 65280);
    assert_eq!(inflate(&out), data);
}

#[test]
fn forced_dynamic_round_trips() {
    let data = generate_mixed_data(100_000);
    let out = compress_dynamic(&data, 65280);
    assert_eq!(inflate(&out), data);
}

#[test]
fn forced_dynamic_random_falls_back_to_stored() {
    let data = generate_random_data(40_000, 7);
    let out = compress_dynamic(&data, 65280);
    assert_eq!(inflate(&out), data);
}

#[test]
fn huffman_only_mode_round_trips() {
    let data = generate_mixed_data(50_000);
    let out = compress_huff(&data, 65280);
    assert_eq!(inflate(&out), data);
}

#[test]
fn small_block_size_round_trips() {
    let data = generate_random_data(100_000, 11111);
    let out = compress(&data, 16384);
    assert_eq!(inflate(&out), data);
}

#[test]
fn data_exactly_at_block_boundary() {
    let data = generate_mixed_data(65280);
    let out = compress(&data, 65280);
    assert_eq!(inflate(&out), data);
}

#[test]
fn data_just_over_block_boundary() {
    let data = generate_mixed_data(65281);
    let out = compress(&data, 65280);
    assert_eq!(inflate(&out), data);
}

#[test]
fn eob_bit_set_only_on_final_block() {
    let data = generate_mixed_data(150_000);
    let out = compress(&data, 65280);
    // BFINAL is the low bit of the first byte of each block header; only
    // the last block's header should have it set. We can't easily locate
    // block boundaries without parsing, but we can confirm decoding the
    // whole stream succeeds and matches exactly, which a false early
    // BFINAL=1 (truncating the stream) or a missing final BFINAL=1
    // (flate2 waiting for more data) would both break.
    assert_eq!(inflate(&out), data);
}

#[test]
fn tokens_round_trip_without_block_writer() {
    let data = generate_mixed_data(20_000);
    let mut mf = MatchFinder::new();
    let mut tokens = Vec::new();
    mf.next_block(&data, &mut tokens);
    let mut reconstructed = Vec::with_capacity(data.len());
    for t in tokens {
        if t.is_match() {
            let len = t.length() as usize;
            let off = t.offset() as usize;
            for _ in 0..len {
                let b = reconstructed[reconstructed.len() - off];
                reconstructed.push(b);
            }
        } else {
            reconstructed.push(t.literal_value());
        }
    }
    assert_eq!(reconstructed, data);
}

#[test]
fn literal_token_space_disjoint_from_match_token_space() {
    for b in 0u8..=255 {
        assert!(!Token::literal(b).is_match());
    }
    assert!(Token::matches(3, 1).is_match());
}
