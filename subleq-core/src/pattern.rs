//! The pattern-matching DSL the optimizer scans idioms with.
//!
//! A pattern is a string where each non-whitespace character consumes one memory word
//! at the next offset from a base address. Whitespace is layout only, purely for
//! grouping the three-word SUBLEQ triples a human reads the pattern as; it never
//! consumes a word.
//!
//! Symbols:
//! - `0`-`9`: numbered capture slot. First occurrence binds the word; later occurrences
//!   require equality with the bound value.
//! - `Z`: word must be 0.
//! - `N`: word must be the I/O sentinel (0xFFFF).
//! - `>`: word must equal the address of the next memory word (a fall-through target).
//! - `%`: word must equal the next immediate constant supplied by the caller.
//! - `!`: capture the word into the caller's output list; never fails.
//! - `?`: wildcard.
//! - `P`: word must be non-zero with the top bit clear ("positive").
//! - `M`: word must be a valid memory address or the I/O sentinel (always true for a
//!   16-bit cell, since every `u16` already satisfies "< 65536").
//! - `R`: like a numbered capture, but the slot index is supplied by the caller rather
//!   than encoded in the pattern text.
//!
//! Ten numbered slots are reused across match attempts via a version counter: binding
//! a slot stamps it with the matcher's current version, and a slot only reads back as
//! bound if its stamp equals that version. Bumping the version on each `try_match`
//! invalidates every slot in O(1), with no per-attempt allocation.

use crate::memory::{Memory, IO_PORT};

const SLOT_COUNT: usize = 10;

#[derive(Debug, Clone, Copy)]
struct Slot {
    version: u32,
    value: u16,
}

/// The result of a successful `try_match`: the words captured by `!`, in pattern
/// order, and the number of memory words the pattern consumed.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub bangs: Vec<u16>,
    pub length: u16,
}

pub struct PatternMatcher {
    slots: [Slot; SLOT_COUNT],
    version: u32,
}

impl PatternMatcher {
    pub fn new() -> Self {
        PatternMatcher {
            slots: [Slot { version: 0, value: 0 }; SLOT_COUNT],
            version: 0,
        }
    }

    /// Reads a numbered slot bound by the most recent `try_match`. Returns `None` if
    /// the slot was never touched during that attempt.
    pub fn slot(&self, index: usize) -> Option<u16> {
        let entry = self.slots[index];
        (entry.version == self.version).then_some(entry.value)
    }

    /// Attempts to match `pattern` against `memory` starting at `base`. `immediates`
    /// feeds `%` symbols in order; `reuse_slots` feeds `R` symbols in order (as slot
    /// indices). Slot bindings made by a successful match stay queryable via `slot()`
    /// until the next call to `try_match`.
    pub fn try_match(
        &mut self,
        memory: &Memory,
        base: u16,
        pattern: &str,
        immediates: &[u16],
        reuse_slots: &[usize],
    ) -> Option<MatchResult> {
        self.version = self.version.wrapping_add(1);
        if self.version == 0 {
            // Version 0 means "never bound" for every slot; skip it on wraparound.
            self.version = 1;
        }

        let mut offset: u16 = 0;
        let mut bangs = Vec::new();
        let mut immediates = immediates.iter();
        let mut reuse_slots = reuse_slots.iter();

        for symbol in pattern.chars().filter(|c| !c.is_whitespace()) {
            let address = base.wrapping_add(offset);
            let word = memory.peek(address);

            let matched = match symbol {
                '0'..='9' => self.bind(symbol as usize - '0' as usize, word),
                'Z' => word == 0,
                'N' => word == IO_PORT,
                '>' => word == address.wrapping_add(1),
                '%' => immediates.next().is_some_and(|&v| word == v),
                '!' => {
                    bangs.push(word);
                    true
                }
                '?' => true,
                'P' => word != 0 && word & 0x8000 == 0,
                'M' => true,
                'R' => match reuse_slots.next() {
                    Some(&slot) => self.bind(slot, word),
                    None => false,
                },
                other => panic!("unknown pattern symbol {other:?}"),
            };

            if !matched {
                return None;
            }
            offset += 1;
        }

        Some(MatchResult { bangs, length: offset })
    }

    fn bind(&mut self, slot: usize, word: u16) -> bool {
        let entry = &mut self.slots[slot];
        if entry.version == self.version {
            entry.value == word
        } else {
            entry.version = self.version;
            entry.value = word;
            true
        }
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_with(words: &[u16]) -> Memory {
        let mut memory = Memory::new();
        memory.load(words);
        memory
    }

    #[test]
    fn numbered_slot_binds_then_requires_equality() {
        let memory = mem_with(&[7, 7, 9]);
        let mut matcher = PatternMatcher::new();
        assert!(matcher.try_match(&memory, 0, "00", &[], &[]).is_some());
        assert_eq!(matcher.slot(0), Some(7));

        let mut matcher = PatternMatcher::new();
        assert!(matcher.try_match(&memory, 1, "00", &[], &[]).is_none());
    }

    #[test]
    fn fallthrough_symbol_checks_next_address() {
        let memory = mem_with(&[11, 22, 4]);
        let mut matcher = PatternMatcher::new();
        assert!(matcher.try_match(&memory, 0, "??>", &[], &[]).is_some());

        let mut matcher = PatternMatcher::new();
        let memory = mem_with(&[11, 22, 5]);
        assert!(matcher.try_match(&memory, 0, "??>", &[], &[]).is_none());
    }

    #[test]
    fn bang_always_succeeds_and_captures_in_order() {
        let memory = mem_with(&[42, 99]);
        let mut matcher = PatternMatcher::new();
        let result = matcher.try_match(&memory, 0, "!!", &[], &[]).unwrap();
        assert_eq!(result.bangs, vec![42, 99]);
    }

    #[test]
    fn zero_and_io_sentinel_symbols() {
        let memory = mem_with(&[0, IO_PORT]);
        let mut matcher = PatternMatcher::new();
        assert!(matcher.try_match(&memory, 0, "ZN", &[], &[]).is_some());

        let memory = mem_with(&[1, 0]);
        let mut matcher = PatternMatcher::new();
        assert!(matcher.try_match(&memory, 0, "ZN", &[], &[]).is_none());
    }

    #[test]
    fn immediate_symbol_matches_supplied_constant() {
        let memory = mem_with(&[5]);
        let mut matcher = PatternMatcher::new();
        assert!(matcher.try_match(&memory, 0, "%", &[5], &[]).is_some());
        let mut matcher = PatternMatcher::new();
        assert!(matcher.try_match(&memory, 0, "%", &[6], &[]).is_none());
    }

    #[test]
    fn positive_symbol_rejects_zero_and_negative() {
        let memory = mem_with(&[1, 0, 0x8000]);
        let mut matcher = PatternMatcher::new();
        assert!(matcher.try_match(&memory, 0, "P", &[], &[]).is_some());
        assert!(matcher.try_match(&memory, 1, "P", &[], &[]).is_none());
        assert!(matcher.try_match(&memory, 2, "P", &[], &[]).is_none());
    }

    #[test]
    fn reuse_symbol_binds_externally_named_slot() {
        let memory = mem_with(&[3, 3]);
        let mut matcher = PatternMatcher::new();
        let result = matcher.try_match(&memory, 0, "RR", &[], &[4, 4]);
        assert!(result.is_some());
        assert_eq!(matcher.slot(4), Some(3));
    }

    #[test]
    fn version_bump_invalidates_previous_bindings() {
        let memory = mem_with(&[1, 2]);
        let mut matcher = PatternMatcher::new();
        matcher.try_match(&memory, 0, "0", &[], &[]).unwrap();
        assert_eq!(matcher.slot(0), Some(1));
        matcher.try_match(&memory, 1, "?", &[], &[]).unwrap();
        assert_eq!(matcher.slot(0), None);
    }

    #[test]
    fn whitespace_is_not_consumed() {
        let memory = mem_with(&[1, 2, 3]);
        let mut matcher = PatternMatcher::new();
        let result = matcher.try_match(&memory, 0, "0 1 2", &[], &[]).unwrap();
        assert_eq!(result.length, 3);
    }
}
