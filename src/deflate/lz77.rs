//! Fast LZ77 match-finder.
//!
//! A single fixed-depth hash table (no hash chains, no lazy matching) over a
//! two-block history: the block just processed (`prev`) and the block being
//! processed now. This targets one speed/ratio point rather than the
//! multi-level dial a general-purpose LZ77 encoder would expose.

use crate::deflate::tokens::Token;

const TABLE_BITS: u32 = 14;
const TABLE_SIZE: usize = 1 << TABLE_BITS;
const TABLE_MASK: usize = TABLE_SIZE - 1;
const HASH_SHIFT: u32 = 32 - TABLE_BITS;

const MAX_MATCH_OFFSET: i32 = 32768;
const MAX_MATCH_LENGTH: usize = 258;
const MIN_MATCH_LENGTH: usize = 4;
const MARGIN: usize = 15;

#[derive(Clone, Copy, Default)]
struct TableEntry {
    val: u32,
    offset: i32,
}

/// Single-speed LZ77 match-finder, one instance per output stream.
pub struct MatchFinder {
    table: Vec<TableEntry>,
    prev: Vec<u8>,
    cur: i32,
}

impl MatchFinder {
    /// A fresh match-finder with empty history.
    pub fn new() -> Self {
        Self { table: vec![TableEntry::default(); TABLE_SIZE], prev: Vec::new(), cur: 65535 }
    }

    /// Clear history without processing a block, as if starting a new
    /// logical stream.
    pub fn reset(&mut self) {
        self.prev.clear();
        if self.cur >= i32::MAX - 2 * 65535 {
            self.shift_offsets();
        } else {
            self.cur += 32768;
        }
    }

    fn shift_offsets(&mut self) {
        if self.prev.is_empty() {
            for e in self.table.iter_mut() {
                *e = TableEntry::default();
            }
            self.cur = 32769;
            return;
        }
        let delta = self.cur - 32769;
        for e in self.table.iter_mut() {
            e.offset = (e.offset - delta).max(0);
        }
        self.cur = 32769;
    }

    #[inline]
    fn hash(u: u32) -> u32 {
        u.wrapping_mul(0x1e35a7bd) >> HASH_SHIFT
    }

    #[inline]
    fn load32(src: &[u8], i: usize) -> u32 {
        u32::from_le_bytes(src[i..i + 4].try_into().unwrap())
    }

    #[inline]
    fn load64(src: &[u8], i: usize) -> u64 {
        u64::from_le_bytes(src[i..i + 8].try_into().unwrap())
    }

    /// Extend a known 4-byte match at `src[s..]`/candidate position `t`
    /// (relative to `src`; negative means into `prev`, counted from its end).
    fn match_len(&self, src: &[u8], s: usize, t: i32) -> usize {
        let max_len = MAX_MATCH_LENGTH.saturating_sub(4).min(src.len() - s);
        let mut n = 0usize;
        while n < max_len {
            let a = src[s + n];
            let pos = t + n as i32;
            let b = if pos >= 0 {
                let idx = pos as usize;
                if idx >= src.len() {
                    break;
                }
                src[idx]
            } else {
                let idx = self.prev.len() as i32 + pos;
                if idx < 0 {
                    break;
                }
                self.prev[idx as usize]
            };
            if a != b {
                break;
            }
            n += 1;
        }
        n
    }

    /// Tokenize one logical block (up to 65535 bytes) of input, appending
    /// literal and match tokens to `tokens`.
    pub fn next_block(&mut self, src: &[u8], tokens: &mut Vec<Token>) {
        if self.cur >= i32::MAX - 2 * 65535 {
            self.shift_offsets();
        }

        if src.len() < MIN_MATCH_LENGTH + 1 + MARGIN {
            self.cur += 65535;
            self.prev.clear();
            tokens.extend(src.iter().map(|&b| Token::literal(b)));
            return;
        }

        let s_limit = src.len() - MARGIN;
        let mut next_emit = 0usize;
        let mut s = 0usize;
        let mut cv = Self::load32(src, s);
        let mut next_hash = Self::hash(cv);
        let mut skip = 32usize;

        'outer: loop {
            let mut candidate;
            loop {
                let stride = (skip >> 5).max(1);
                let next_s = s + stride;
                skip += 1;
                if next_s > s_limit {
                    break 'outer;
                }
                let h = (next_hash as usize) & TABLE_MASK;
                let entry = self.table[h];
                let now = Self::load32(src, next_s);
                self.table[h] = TableEntry { val: cv, offset: s as i32 + self.cur };
                next_hash = Self::hash(now);

                let offset = s as i32 - (entry.offset - self.cur);
                if offset >= 0 && offset <= MAX_MATCH_OFFSET && cv == entry.val {
                    candidate = entry;
                    break;
                }
                s = next_s;
                cv = now;
            }

            tokens.extend(src[next_emit..s].iter().map(|&b| Token::literal(b)));

            loop {
                let t = candidate.offset - self.cur;
                let l = self.match_len(src, s + 4, t + 4) + 4;
                tokens.push(Token::matches(l as u32, (s as i32 - t) as u32));
                s += l;
                next_emit = s;
                if s >= s_limit {
                    break 'outer;
                }

                let x = Self::load64(src, s - 2);
                let prev_hash = Self::hash(x as u32);
                self.table[(prev_hash as usize) & TABLE_MASK] =
                    TableEntry { val: x as u32, offset: self.cur + s as i32 - 2 };
                let x2 = (x >> 16) as u32;
                let curr_hash = Self::hash(x2);
                let h2 = (curr_hash as usize) & TABLE_MASK;
                let entry2 = self.table[h2];
                self.table[h2] = TableEntry { val: x2, offset: self.cur + s as i32 };

                let offset2 = s as i32 - (entry2.offset - self.cur);
                if offset2 >= 0 && offset2 <= MAX_MATCH_OFFSET && x2 == entry2.val {
                    candidate = entry2;
                    continue;
                }
                cv = (x >> 24) as u32;
                next_hash = Self::hash(cv);
                s += 1;
                break;
            }
        }

        if next_emit < src.len() {
            tokens.extend(src[next_emit..].iter().map(|&b| Token::literal(b)));
        }
        self.cur += src.len() as i32;
        self.prev.clear();
        self.prev.extend_from_slice(src);
    }
}

impl Default for MatchFinder {
    fn default() -> Self {
        Self::new()
    }
}
