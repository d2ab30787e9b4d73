//! DEFLATE dynamic-block planning and emission.
//!
//! The planner tallies symbol frequencies over a candidate input range,
//! builds the three Huffman codings a dynamic block needs (literal/length,
//! distance, code-length), and keeps doubling the candidate while a merged
//! block costs no more bits than the two halves separately. Blocks always use
//! BTYPE 2; stored and fixed-Huffman blocks are never emitted.

use crate::bit_sink::BitSink;
use crate::huffman::HuffmanCoding;
use crate::matcher::MatchRecord;
use crate::{DeflateError, DeflateOptions};

/// Base length for each of the 29 length codes (symbols 257..=285).
const MATCH_OFF: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

/// Extra bits carried by each length code.
const MATCH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Base distance for each of the 30 distance codes.
const DIST_OFF: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits carried by each distance code.
const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Transmission order of the code-length alphabet lengths (RFC 1951 §3.2.7).
const CLEN_ORDER: [usize; 19] = [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];

fn match_code(length: usize) -> usize {
    MATCH_OFF.partition_point(|&base| base as usize <= length) - 1
}

fn dist_code(distance: usize) -> usize {
    DIST_OFF.partition_point(|&base| base as usize <= distance) - 1
}

/// One element of a block's payload.
#[derive(Clone, Copy)]
enum Item {
    Literal(u8),
    Match { length: usize, distance: usize },
}

/// Walks the items covered by records `rec_start..` whose position lies in
/// `[start, end)`, including the literals in the gaps between records.
///
/// Returns `(rec_end, actual_end)`; a match that starts before `end` but
/// extends past it pushes `actual_end` beyond the requested range.
fn walk_items(
    input: &[u8],
    records: &[MatchRecord],
    rec_start: usize,
    start: usize,
    end: usize,
    mut visit: impl FnMut(Item),
) -> (usize, usize) {
    let mut position = start;
    let mut index = rec_start;
    while index < records.len() && (records[index].position as usize) < end {
        let record = records[index];
        for p in position..record.position as usize {
            visit(Item::Literal(input[p]));
        }
        visit(Item::Match {
            length: record.len(),
            distance: record.distance as usize,
        });
        position = record.end();
        index += 1;
    }
    if position < end {
        for p in position..end {
            visit(Item::Literal(input[p]));
        }
        position = end;
    }
    (index, position)
}

/// Run-length symbol for the code-length alphabet: codes 0..=15 literally,
/// 16 repeats the previous length, 17/18 encode zero runs.
#[derive(Clone, Copy)]
struct ClenSym {
    code: u8,
    extra: u8,
}

fn run_length_encode(lengths: &[u8]) -> Vec<ClenSym> {
    let mut symbols = Vec::new();
    let mut i = 0;
    while i < lengths.len() {
        let value = lengths[i];
        let mut run = 1;
        while i + run < lengths.len() && lengths[i + run] == value {
            run += 1;
        }
        i += run;

        if value == 0 {
            while run >= 11 {
                let take = run.min(138);
                symbols.push(ClenSym {
                    code: 18,
                    extra: (take - 11) as u8,
                });
                run -= take;
            }
            if run >= 3 {
                symbols.push(ClenSym {
                    code: 17,
                    extra: (run - 3) as u8,
                });
                run = 0;
            }
            for _ in 0..run {
                symbols.push(ClenSym { code: 0, extra: 0 });
            }
        } else {
            symbols.push(ClenSym { code: value, extra: 0 });
            run -= 1;
            while run >= 3 {
                let take = run.min(6);
                symbols.push(ClenSym {
                    code: 16,
                    extra: (take - 3) as u8,
                });
                run -= take;
            }
            for _ in 0..run {
                symbols.push(ClenSym { code: value, extra: 0 });
            }
        }
    }
    symbols
}

/// A candidate dynamic block: a planned input range plus the three codings
/// and their header cost. Built speculatively, possibly discarded in favour
/// of a longer merged block, finally written.
struct Block {
    start: usize,
    end: usize,
    rec_start: usize,
    rec_end: usize,
    lit: HuffmanCoding,
    dist: HuffmanCoding,
    len: HuffmanCoding,
    clen_syms: Vec<ClenSym>,
    hclen: usize,
    /// Header plus payload cost in bits, excluding extra bits (those are
    /// invariant under block splitting).
    bit_cost: u64,
}

impl Block {
    fn build(
        input: &[u8],
        records: &[MatchRecord],
        rec_start: usize,
        start: usize,
        end: usize,
    ) -> Result<Block, DeflateError> {
        let mut lit = HuffmanCoding::new(15, 288);
        let mut dist = HuffmanCoding::new(15, 30);

        let (rec_end, actual_end) =
            walk_items(input, records, rec_start, start, end, |item| match item {
                Item::Literal(byte) => lit.used[byte as usize] += 1,
                Item::Match { length, distance } => {
                    lit.used[257 + match_code(length)] += 1;
                    dist.used[dist_code(distance)] += 1;
                }
            });
        lit.used[256] += 1;

        lit.compute_codes(257)?;
        dist.compute_codes(1)?;

        let mut lengths = Vec::with_capacity(lit.count + dist.count);
        lengths.extend_from_slice(&lit.bits[..lit.count]);
        lengths.extend_from_slice(&dist.bits[..dist.count]);
        let clen_syms = run_length_encode(&lengths);

        let mut len = HuffmanCoding::new(7, 19);
        for sym in &clen_syms {
            len.used[sym.code as usize] += 1;
        }
        len.compute_codes(4)?;

        let mut hclen = 19;
        while hclen > 4 && len.bits[CLEN_ORDER[hclen - 1]] == 0 {
            hclen -= 1;
        }

        let bit_cost = 3
            + 14
            + hclen as u64 * 3
            + len.total_code_bits()
            + lit.total_code_bits()
            + dist.total_code_bits();

        Ok(Block {
            start,
            end: actual_end,
            rec_start,
            rec_end,
            lit,
            dist,
            len,
            clen_syms,
            hclen,
            bit_cost,
        })
    }

    /// Writes the block: 3-bit header, code-length table, RLE'd literal and
    /// distance lengths, payload, end-of-block.
    fn emit(&self, input: &[u8], records: &[MatchRecord], sink: &mut BitSink, last: bool) {
        sink.write_bits(1, last as u64);
        sink.write_bits(2, 2);
        sink.write_bits(5, (self.lit.count - 257) as u64);
        sink.write_bits(5, (self.dist.count - 1) as u64);
        sink.write_bits(4, (self.hclen - 4) as u64);
        for &slot in CLEN_ORDER.iter().take(self.hclen) {
            sink.write_bits(3, self.len.bits[slot] as u64);
        }
        for sym in &self.clen_syms {
            let code = sym.code as usize;
            sink.write_bits(self.len.bits[code] as u32, self.len.code[code] as u64);
            match sym.code {
                16 => sink.write_bits(2, sym.extra as u64),
                17 => sink.write_bits(3, sym.extra as u64),
                18 => sink.write_bits(7, sym.extra as u64),
                _ => {}
            }
        }

        walk_items(
            input,
            records,
            self.rec_start,
            self.start,
            self.end,
            |item| match item {
                Item::Literal(byte) => {
                    let sym = byte as usize;
                    sink.write_bits(self.lit.bits[sym] as u32, self.lit.code[sym] as u64);
                }
                Item::Match { length, distance } => {
                    let mc = match_code(length);
                    let sym = 257 + mc;
                    sink.write_bits(self.lit.bits[sym] as u32, self.lit.code[sym] as u64);
                    sink.write_bits(
                        MATCH_EXTRA[mc] as u32,
                        (length - MATCH_OFF[mc] as usize) as u64,
                    );
                    let dc = dist_code(distance);
                    sink.write_bits(self.dist.bits[dc] as u32, self.dist.code[dc] as u64);
                    sink.write_bits(
                        DIST_EXTRA[dc] as u32,
                        (distance - DIST_OFF[dc] as usize) as u64,
                    );
                }
            },
        );
        sink.write_bits(self.lit.bits[256] as u32, self.lit.code[256] as u64);
    }
}

/// Moves the boundary between `block` and `next` forward when an initial run
/// of `next`'s records is cheaper under `block`'s existing codes than under
/// `next`'s own coding. Only whole records (with their preceding literals)
/// move, and only while every symbol involved has a code in `block`.
fn tune_boundary(block: &mut Block, next: &Block, input: &[u8], records: &[MatchRecord]) {
    /// Accumulates `next_cost - block_cost` for one symbol; false when the
    /// symbol has no code under `block` and the scan must stop.
    fn charge(delta: &mut i64, block_bits: u8, next_bits: u8) -> bool {
        if block_bits == 0 {
            return false;
        }
        *delta += next_bits as i64 - block_bits as i64;
        true
    }

    let mut delta: i64 = 0;
    let mut best_delta: i64 = 0;
    let mut best = None;

    let mut position = next.start;
    'records: for index in next.rec_start..next.rec_end {
        let record = records[index];
        for p in position..record.position as usize {
            let byte = input[p] as usize;
            if !charge(&mut delta, block.lit.bits[byte], next.lit.bits[byte]) {
                break 'records;
            }
        }
        let sym = 257 + match_code(record.len());
        let dc = dist_code(record.distance as usize);
        if !charge(&mut delta, block.lit.bits[sym], next.lit.bits[sym])
            || !charge(&mut delta, block.dist.bits[dc], next.dist.bits[dc])
        {
            break;
        }

        position = record.end();
        if delta > best_delta {
            best_delta = delta;
            best = Some((index + 1, position));
        }
    }

    if let Some((rec_end, end)) = best {
        block.rec_end = rec_end;
        block.end = end;
    }
}

/// Supplies match records to the planner, blocking (or scanning inline)
/// until the requested input prefix has been decided.
pub(crate) trait MatchSource {
    /// Waits until the scanned prefix reaches `target` or the end of input,
    /// appending newly available records to `out`. Returns the scanned
    /// prefix.
    fn pull(&mut self, target: usize, out: &mut Vec<MatchRecord>) -> usize;
}

/// Plans and emits the full block sequence for `input`.
pub(crate) fn plan(
    input: &[u8],
    options: &DeflateOptions,
    source: &mut impl MatchSource,
    sink: &mut BitSink,
) -> Result<(), DeflateError> {
    let n = input.len();
    let mut records: Vec<MatchRecord> = Vec::new();
    let mut buffered = 0usize;
    let mut finished = 0usize;
    let mut rec_done = 0usize;

    if n == 0 {
        let block = Block::build(input, &records, 0, 0, 0)?;
        block.emit(input, &records, sink, true);
        return Ok(());
    }

    while finished < n {
        let size = options.start_block_size.max(1).min(n - finished);
        if buffered < finished + size {
            buffered = source.pull(finished + size, &mut records);
        }
        let mut block = Block::build(input, &records, rec_done, finished, finished + size)?;

        let mut candidate = size;
        while block.end < n {
            let next_end = (block.end + candidate).min(n);
            if buffered < next_end {
                buffered = source.pull(next_end, &mut records);
            }
            let next = Block::build(input, &records, block.rec_end, block.end, next_end)?;
            let merged = Block::build(input, &records, block.rec_start, block.start, next.end)?;
            if merged.bit_cost <= block.bit_cost + next.bit_cost {
                block = merged;
                candidate *= 2;
            } else {
                if options.tune_boundaries {
                    tune_boundary(&mut block, &next, input, &records);
                }
                break;
            }
        }

        block.emit(input, &records, sink, block.end >= n);
        finished = block.end;
        rec_done = block.rec_end;
    }
    Ok(())
}
