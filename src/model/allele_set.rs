use std::fmt;

use serde_derive::{Deserialize, Serialize};

const WORD_BITS: usize = 64;

/// Fixed-width bitset over an AlleleIndex enumeration. Edge labels in the
/// allele graph are values of this type; intersection against the traveling
/// set is what attributes mismatches to the correct alleles, so all
/// operations stay O(words).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlleleSet {
    words: Vec<u64>,
    size: usize,
}

impl AlleleSet {
    pub fn empty(size: usize) -> AlleleSet {
        AlleleSet {
            words: vec![0; (size + WORD_BITS - 1) / WORD_BITS],
            size,
        }
    }

    pub fn full(size: usize) -> AlleleSet {
        let mut set = Self::empty(size);
        for word in set.words.iter_mut() {
            *word = u64::MAX;
        }
        set.clear_tail();
        set
    }

    pub fn singleton(size: usize, index: usize) -> AlleleSet {
        let mut set = Self::empty(size);
        set.insert(index);
        set
    }

    /// Number of alleles in the enumeration, not the cardinality.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn insert(&mut self, index: usize) {
        assert!(index < self.size, "allele index {} out of range", index);
        self.words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.size && self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    pub fn union(&self, other: &AlleleSet) -> AlleleSet {
        let mut out = self.clone();
        out.union_with(other);
        out
    }

    pub fn union_with(&mut self, other: &AlleleSet) {
        debug_assert_eq!(self.size, other.size);
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w |= o;
        }
    }

    pub fn intersect(&self, other: &AlleleSet) -> AlleleSet {
        debug_assert_eq!(self.size, other.size);
        let words = self
            .words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| a & b)
            .collect();
        AlleleSet {
            words,
            size: self.size,
        }
    }

    pub fn complement(&self) -> AlleleSet {
        let mut out = AlleleSet {
            words: self.words.iter().map(|w| !w).collect(),
            size: self.size,
        };
        out.clear_tail();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn cardinality(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let size = self.size;
        self.words
            .iter()
            .enumerate()
            .flat_map(move |(wi, word)| {
                (0..WORD_BITS)
                    .filter(move |bit| word & (1u64 << bit) != 0)
                    .map(move |bit| wi * WORD_BITS + bit)
            })
            .filter(move |index| *index < size)
    }

    // Bits past `size` would otherwise leak in through complement().
    fn clear_tail(&mut self) {
        let tail = self.size % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}

impl fmt::Display for AlleleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (count, index) in self.iter().enumerate() {
            if count > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", index)?;
        }
        write!(f, "}}")
    }
}
