//! Bulk loading of pre-solved positions into the transposition table

use anyhow::{Context, Result};
use log::{info, warn};
use static_assertions::*;

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::solver::{MAX_SCORE, MIN_SCORE};
use crate::transposition_table::{TranspositionTable, VALUE_BITS};

/// The largest number of records the book's leading count can express
pub const MAX_POSITIONS: usize = u16::MAX as usize;

// an 8-byte key followed by a 4-byte signed score, little-endian
const RECORD_SIZE: usize = 8 + 4;

// offset turning a book score into a stored bound that holds outright
const ABSOLUTE_BOUND_OFFSET: i32 = 2 * MAX_SCORE - 3 * MIN_SCORE + 3;

// seeded values must land in the lower-bound range of the table encoding
const_assert!(MIN_SCORE + ABSOLUTE_BOUND_OFFSET > MAX_SCORE - MIN_SCORE + 1);
const_assert!(MAX_SCORE + ABSOLUTE_BOUND_OFFSET < 1 << VALUE_BITS);

/// A file-backed set of pre-solved `(key, score)` pairs
///
/// # Notes
/// The on-disk layout is a little-endian `u16` record count followed by one
/// 12-byte record per position. At most [`MAX_POSITIONS`] records fit in a
/// single book
pub struct OpeningBook {
    path: PathBuf,
    records: Vec<(u64, i32)>,
}

impl OpeningBook {
    /// Creates an empty book bound to a file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            records: Vec::new(),
        }
    }

    /// Reads a book from disk
    ///
    /// A file that ends in the middle of a record keeps every whole record
    /// read up to that point
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut book = Self::new(&path);
        let file = File::open(&path)
            .with_context(|| format!("failed to open opening book {:?}", path.as_ref()))?;
        let mut reader = BufReader::new(file);

        let mut count_bytes = [0; 2];
        reader.read_exact(&mut count_bytes)?;
        let count = u16::from_le_bytes(count_bytes) as usize;

        let mut record = [0; RECORD_SIZE];
        for _ in 0..count {
            match reader.read_exact(&mut record) {
                Ok(()) => {
                    let mut key_bytes = [0; 8];
                    key_bytes.copy_from_slice(&record[0..8]);
                    let mut score_bytes = [0; 4];
                    score_bytes.copy_from_slice(&record[8..12]);
                    book.records.push((
                        u64::from_le_bytes(key_bytes),
                        i32::from_le_bytes(score_bytes),
                    ));
                }
                Err(error) if error.kind() == ErrorKind::UnexpectedEof => {
                    warn!(
                        "opening book {:?} ends mid-record, keeping {} of {} positions",
                        book.path,
                        book.records.len(),
                        count
                    );
                    break;
                }
                Err(error) => return Err(error.into()),
            }
        }
        Ok(book)
    }

    /// Appends a solved position to the book
    ///
    /// Positions past the format's record limit are dropped
    pub fn save(&mut self, key: u64, score: i32) {
        if self.records.len() == MAX_POSITIONS {
            warn!("opening book is full, dropping position {:#x}", key);
            return;
        }
        self.records.push((key, score));
    }

    /// Writes the book to its file, replacing any previous contents
    pub fn write(&self) -> Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("failed to create opening book {:?}", self.path))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&(self.records.len() as u16).to_le_bytes())?;
        let mut record = [0; RECORD_SIZE];
        for &(key, score) in &self.records {
            record[0..8].copy_from_slice(&key.to_le_bytes());
            record[8..12].copy_from_slice(&score.to_le_bytes());
            writer.write_all(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// The stored `(key, score)` pairs in file order
    pub fn records(&self) -> &[(u64, i32)] {
        &self.records
    }

    /// Seeds a transposition table with every stored position
    ///
    /// Scores are entered as absolute lower bounds
    pub fn load_into(&self, table: &mut TranspositionTable) {
        for &(key, score) in &self.records {
            table.set(key, (score + ABSOLUTE_BOUND_OFFSET) as u8);
        }
        info!(
            "opening book loaded {} positions into the transposition table",
            self.records.len()
        );
    }
}
