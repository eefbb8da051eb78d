//! A fixed-size hash map of previously explored positions

use static_assertions::*;

use crate::solver::{MAX_SCORE, MIN_SCORE};
use crate::{HEIGHT, WIDTH};

/// Number of significant bits in a position key
pub const KEY_BITS: u32 = (WIDTH * (HEIGHT + 1)) as u32;

/// Number of bits needed to store an encoded score bound
pub const VALUE_BITS: u32 = log2(2 * (MAX_SCORE - MIN_SCORE + 2) as u64) + 1;

/// Log2 of the target table size
pub const LOG_SIZE: u32 = 23;

/// Returns the base-2 logarithm of `n`, rounded down
pub const fn log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        log2(n / 2) + 1
    }
}

// trial division up to the square root is plenty at this scale
const fn has_factor(n: u64) -> bool {
    let mut divisor = 2;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return true;
        }
        divisor += 1;
    }
    false
}

/// Returns the smallest prime greater than or equal to `n` (for `n >= 2`)
pub const fn next_prime(mut n: u64) -> u64 {
    while has_factor(n) {
        n += 1;
    }
    n
}

// a prime bucket count keeps the modular index well distributed even
// though keys are heavily structured
const TABLE_SIZE: usize = next_prime(1 << LOG_SIZE) as usize;

const_assert!(TABLE_SIZE >= 1 << LOG_SIZE);
// stored keys must hold every bit the bucket index does not determine
const_assert!(KEY_BITS - LOG_SIZE <= u32::BITS);
// both score bound encodings must fit in a stored value
const_assert!(2 * (MAX_SCORE - MIN_SCORE) + 2 < 1 << VALUE_BITS);
const_assert!(VALUE_BITS <= u8::BITS);

/// A collection of positions previously explored by the solver
///
/// # Notes
/// Implemented as a hash map of fixed prime size with two parallel arrays,
/// indexed by `key % size`. In case of collision the last entry is kept and
/// the previous one is overwritten.
///
/// Stored keys are truncated to the low 32 bits, which still covers every
/// bit the bucket index leaves undetermined. A lookup can therefore, very
/// rarely, report the value of a different position; the solver only ever
/// uses stored values as score bounds to narrow its search window, never to
/// terminate it, so a stale or foreign bound cannot corrupt the result.
pub struct TranspositionTable {
    keys: Box<[u32]>,
    values: Box<[u8]>,
}

impl TranspositionTable {
    /// Creates a table with every slot empty
    pub fn new() -> Self {
        Self {
            keys: vec![0; TABLE_SIZE].into_boxed_slice(),
            values: vec![0; TABLE_SIZE].into_boxed_slice(),
        }
    }

    fn index(key: u64) -> usize {
        (key % TABLE_SIZE as u64) as usize
    }

    /// Stores a value for a position key, overwriting any previous occupant
    ///
    /// The key must fit in [`KEY_BITS`] bits and the value in [`VALUE_BITS`]
    pub fn set(&mut self, key: u64, value: u8) {
        debug_assert!(key >> KEY_BITS == 0);
        debug_assert!(value >> VALUE_BITS == 0);

        let index = Self::index(key);
        self.keys[index] = key as u32;
        self.values[index] = value;
    }

    /// Returns the value stored for a key, or 0 if the key is absent
    pub fn get(&self, key: u64) -> u8 {
        debug_assert!(key >> KEY_BITS == 0);

        let index = Self::index(key);
        if self.keys[index] == key as u32 {
            self.values[index]
        } else {
            0
        }
    }

    /// Empties the table without reallocating it
    pub fn reset(&mut self) {
        self.keys.fill(0);
        self.values.fill(0);
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new()
    }
}
