//! Optional two-thread pipeline: the LZ77 matcher produces into a bounded
//! ring of match records while the block planner consumes.
//!
//! One mutex guards the ring and its progress counters; a pair of condvars
//! carries the two wakeup predicates. The producer sleeps while the ring is
//! full; the consumer sleeps while the scanned prefix has not yet reached its
//! requested position. Records are consumed strictly in insertion order.

use std::sync::{Condvar, Mutex};

use crate::bit_sink::BitSink;
use crate::block::{self, MatchSource};
use crate::matcher::{MatchRecord, Matcher, RecordSink};
use crate::{DeflateError, DeflateOptions};

/// Largest ring capacity, in records.
const MAX_RING_CAPACITY: usize = 32768;

struct RingState {
    ring: Vec<MatchRecord>,
    mask: usize,
    /// Monotonic counts of records written and read; unread = write - read.
    write: usize,
    read: usize,
    /// Input prefix for which all records are final.
    buffered: usize,
    done: bool,
    /// Set when the consumer bails out early so the producer never blocks
    /// forever on a full ring.
    abandoned: bool,
}

pub(crate) struct SharedRing {
    state: Mutex<RingState>,
    /// Signalled when records or progress become available.
    produced: Condvar,
    /// Signalled when ring space is freed.
    consumed: Condvar,
}

impl SharedRing {
    pub(crate) fn new(input_len: usize) -> Self {
        // A record consumes at least MIN_MATCH input bytes, so N/3 records
        // (rounded up, made a power of two for cheap wrapping) always fit the
        // whole input; beyond the cap the producer throttles instead.
        let wanted = (input_len / 3 + 1).next_power_of_two();
        let capacity = wanted.clamp(16, MAX_RING_CAPACITY);
        Self {
            state: Mutex::new(RingState {
                ring: vec![
                    MatchRecord {
                        position: 0,
                        length: 0,
                        distance: 1,
                    };
                    capacity
                ],
                mask: capacity - 1,
                write: 0,
                read: 0,
                buffered: 0,
                done: false,
                abandoned: false,
            }),
            produced: Condvar::new(),
            consumed: Condvar::new(),
        }
    }

    fn abandon(&self) {
        let mut state = self.state.lock().expect("ring lock poisoned");
        state.abandoned = true;
        self.consumed.notify_all();
    }
}

/// Producer side: publishes records from the matcher thread.
struct ProducerSink<'r> {
    shared: &'r SharedRing,
}

impl RecordSink for ProducerSink<'_> {
    fn save(&mut self, record: MatchRecord, scanned: usize) {
        let mut state = self.shared.state.lock().expect("ring lock poisoned");
        while state.write - state.read > state.mask && !state.abandoned {
            state = self
                .shared
                .consumed
                .wait(state)
                .expect("ring lock poisoned");
        }
        if state.abandoned {
            return;
        }
        let slot = state.write & state.mask;
        state.ring[slot] = record;
        state.write += 1;
        state.buffered = scanned;
        self.shared.produced.notify_one();
    }

    fn finish(&mut self, scanned: usize) {
        let mut state = self.shared.state.lock().expect("ring lock poisoned");
        state.buffered = scanned;
        state.done = true;
        self.shared.produced.notify_one();
    }
}

/// Consumer side: drains the ring into the planner's local record list.
struct RingSource<'r> {
    shared: &'r SharedRing,
}

impl MatchSource for RingSource<'_> {
    fn pull(&mut self, target: usize, out: &mut Vec<MatchRecord>) -> usize {
        let mut state = self.shared.state.lock().expect("ring lock poisoned");
        loop {
            let had_backlog = state.write > state.read;
            while state.read < state.write {
                let slot = state.read & state.mask;
                out.push(state.ring[slot]);
                state.read += 1;
            }
            if had_backlog {
                self.shared.consumed.notify_one();
            }
            if state.buffered >= target || state.done {
                return state.buffered;
            }
            state = self
                .shared
                .produced
                .wait(state)
                .expect("ring lock poisoned");
        }
    }
}

/// Runs the matcher on a second thread and the planner on the current one.
pub(crate) fn deflate_threaded(
    input: &[u8],
    options: &DeflateOptions,
    sink: &mut BitSink,
) -> Result<(), DeflateError> {
    let shared = SharedRing::new(input.len());
    std::thread::scope(|scope| {
        scope.spawn(|| {
            let mut matcher = Matcher::new(input);
            let mut producer = ProducerSink { shared: &shared };
            matcher.advance(input.len(), &mut producer);
        });
        let mut source = RingSource { shared: &shared };
        let result = block::plan(input, options, &mut source, sink);
        // On an early error the producer may still be mid-scan; let it drain.
        shared.abandon();
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threaded_output_matches_single_threaded() {
        let mut input = Vec::new();
        for i in 0..50_000usize {
            input.push((i % 251) as u8);
            if i % 5 == 0 {
                input.extend_from_slice(b"repeated phrase ");
            }
        }

        let single = crate::deflate(
            &input,
            &DeflateOptions {
                threaded: false,
                ..Default::default()
            },
        )
        .unwrap();
        let threaded = crate::deflate(
            &input,
            &DeflateOptions {
                threaded: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(single, threaded);
    }

    #[test]
    fn tiny_ring_still_completes() {
        // Force heavy wrap-around: highly matchable input much larger than
        // the minimum ring.
        let input: Vec<u8> = b"abcdefgh".iter().copied().cycle().take(4096).collect();
        let shared = SharedRing::new(0); // minimum capacity
        std::thread::scope(|scope| {
            scope.spawn(|| {
                let mut matcher = Matcher::new(&input);
                let mut producer = ProducerSink { shared: &shared };
                matcher.advance(input.len(), &mut producer);
            });
            let mut source = RingSource { shared: &shared };
            let mut records = Vec::new();
            let buffered = source.pull(input.len(), &mut records);
            assert_eq!(buffered, input.len());
            assert!(!records.is_empty());
        });
    }
}
