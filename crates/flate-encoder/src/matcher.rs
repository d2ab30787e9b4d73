//! LZ77 back-reference search.
//!
//! A three-byte rolling hash indexes every scanned position; positions that
//! share a bucket are chained through `link` so the search walks candidates
//! from nearest to farthest. Matching is lazy: a match is only committed once
//! the position after it fails to produce a better one.

pub const MIN_MATCH: usize = 3;
pub const MAX_MATCH: usize = 258;
pub const MAX_DISTANCE: usize = 32768;

/// Positions are stored offset by this, so the hash table's default 0 entry
/// reads as farther away than any real match.
const ENCODE_OFFSET: usize = MAX_DISTANCE + 1;

/// Candidates examined per hash chain before giving up.
const MAX_CHAIN: usize = 1024;

/// One back-reference: `length + MIN_MATCH` bytes at `position` equal the
/// bytes `distance` before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRecord {
    pub position: u32,
    /// Actual length minus `MIN_MATCH`.
    pub length: u8,
    /// In `1..=MAX_DISTANCE`.
    pub distance: u16,
}

impl MatchRecord {
    pub fn len(&self) -> usize {
        self.length as usize + MIN_MATCH
    }

    pub fn end(&self) -> usize {
        self.position as usize + self.len()
    }
}

/// Receives matches as the scan advances.
///
/// `scanned` is the input prefix for which all records are final; literals in
/// the gaps between records are reconstructed from the input by position
/// arithmetic, so they are never published explicitly.
pub trait RecordSink {
    fn save(&mut self, record: MatchRecord, scanned: usize);
    fn finish(&mut self, scanned: usize);
}

/// Incremental LZ77 scanner over an immutable input window.
pub struct Matcher<'a> {
    input: &'a [u8],
    hash_shift: u32,
    hash_mask: u32,
    hash_table: Vec<u32>,
    link: Vec<u32>,
    /// Next position to scan.
    position: usize,
    /// Highest position already inserted into the hash chains.
    inserted: Option<usize>,
    done: bool,
}

impl<'a> Matcher<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        // 2^(3*shift) buckets, enough to cover the input, capped at 2^18.
        let mut hash_shift = 1u32;
        while hash_shift < 6 && (1usize << (3 * hash_shift)) < input.len() {
            hash_shift += 1;
        }
        let hash_mask = (1u32 << (3 * hash_shift)) - 1;
        Self {
            input,
            hash_shift,
            hash_mask,
            hash_table: vec![0; hash_mask as usize + 1],
            link: vec![0; input.len()],
            position: 0,
            inserted: None,
            done: false,
        }
    }

    /// Prefix of the input that has been fully scanned.
    pub fn scanned(&self) -> usize {
        if self.done {
            self.input.len()
        } else {
            self.position
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Scans forward until `scanned() >= target` or the input is exhausted,
    /// publishing matches into `sink`. Calls `sink.finish` once at the end of
    /// input.
    pub fn advance(&mut self, target: usize, sink: &mut impl RecordSink) {
        let n = self.input.len();
        while !self.done && self.position < target {
            if self.position + MIN_MATCH > n {
                self.done = true;
                break;
            }
            self.step(sink);
        }
        if self.position + MIN_MATCH > n {
            self.done = true;
        }
        if self.done {
            sink.finish(n);
        }
    }

    /// Resolves one emit decision: either a single literal position or a
    /// match (after lazy evaluation), advancing past whatever was consumed.
    fn step(&mut self, sink: &mut impl RecordSink) {
        let n = self.input.len();
        let position = self.position;
        let head = self.insert(position);

        let (length, distance) = if position < head as usize {
            self.best_match(position, head as usize - ENCODE_OFFSET)
        } else {
            (0, 0)
        };
        if length < MIN_MATCH {
            self.position = position + 1;
            return;
        }

        // Lazy step: as long as the next position yields a strictly longer
        // match (or an equal one at a smaller distance), the current byte
        // becomes a literal and the decision moves one position later.
        let mut best = (position, length, distance);
        loop {
            let next = best.0 + 1;
            if next + MIN_MATCH > n || next >= self.position + 1 + MAX_MATCH {
                break;
            }
            let head = self.insert(next);
            if next >= head as usize {
                break;
            }
            let (cand_len, cand_dist) = self.best_match(next, head as usize - ENCODE_OFFSET);
            if cand_len > best.1 || (cand_len == best.1 && cand_len >= MIN_MATCH && cand_dist < best.2)
            {
                best = (next, cand_len, cand_dist);
            } else {
                break;
            }
        }

        let (match_pos, match_len, match_dist) = best;
        sink.save(
            MatchRecord {
                position: match_pos as u32,
                length: (match_len - MIN_MATCH) as u8,
                distance: match_dist as u16,
            },
            match_pos + match_len,
        );

        // Keep the chains current across the matched span so later positions
        // can still reach back into it.
        let resume = match_pos + match_len;
        let mut fill = self.inserted.map_or(0, |i| i + 1);
        while fill < resume {
            self.insert(fill);
            fill += 1;
        }
        self.position = resume;
    }

    /// Hashes `position`, links it into its bucket's chain, and returns the
    /// previous encoded head of that chain.
    fn insert(&mut self, position: usize) -> u32 {
        if let Some(inserted) = self.inserted {
            if position <= inserted {
                return self.link[position];
            }
        }
        self.inserted = Some(position);
        if position + MIN_MATCH > self.input.len() {
            return 0;
        }
        let hash = self.hash(position);
        let head = self.hash_table[hash as usize];
        self.link[position] = head;
        self.hash_table[hash as usize] = (position + ENCODE_OFFSET) as u32;
        head
    }

    fn hash(&self, position: usize) -> u32 {
        let bytes = &self.input[position..position + MIN_MATCH];
        let mut hash = 0u32;
        for &byte in bytes {
            hash = (hash << self.hash_shift).wrapping_add(byte as u32);
        }
        hash & self.hash_mask
    }

    /// Walks the chain starting at `candidate`, returning the best
    /// `(length, distance)` for `position`. Nearest candidates are tried
    /// first, so only strictly longer matches replace the best, which keeps
    /// the distance minimal for a given length.
    fn best_match(&self, position: usize, candidate: usize) -> (usize, usize) {
        let input = self.input;
        let avail = MAX_MATCH.min(input.len() - position);
        let mut best_len = 0usize;
        let mut best_dist = 0usize;
        let mut candidate = candidate;
        for _ in 0..MAX_CHAIN {
            let mut len = 0usize;
            while len < avail && input[candidate + len] == input[position + len] {
                len += 1;
            }
            if len > best_len {
                best_len = len;
                best_dist = position - candidate;
                if best_len == avail {
                    break;
                }
            }
            let next = self.link[candidate];
            if position >= next as usize {
                break;
            }
            candidate = next as usize - ENCODE_OFFSET;
        }
        (best_len, best_dist)
    }
}
