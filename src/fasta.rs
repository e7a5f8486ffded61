//! Lazy FASTA reader producing one [`SequenceRecord`] per `>` header.
//!
//! Parsing is done by `bio`; records are pulled forward-only, so a record
//! window can stop consuming the file early.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use bio::io::fasta;

/// One FASTA record with its zero-based position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub index: usize,
    pub identifier: String,
    /// The full header line without `>`: identifier plus description.
    pub description: String,
    pub residues: String,
}

impl SequenceRecord {
    fn from_fasta(index: usize, record: &fasta::Record) -> Self {
        let identifier = record.id().to_string();
        let description = match record.desc() {
            Some(desc) if !desc.is_empty() => format!("{identifier} {desc}"),
            _ => identifier.clone(),
        };
        Self {
            index,
            identifier,
            description,
            residues: String::from_utf8_lossy(record.seq()).into_owned(),
        }
    }
}

pub struct FastaReader<R: Read> {
    records: fasta::Records<BufReader<R>>,
    next_index: usize,
}

impl FastaReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            records: fasta::Reader::new(reader).records(),
            next_index: 0,
        }
    }
}

impl<R: Read> Iterator for FastaReader<R> {
    type Item = io::Result<SequenceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };
        let record = SequenceRecord::from_fasta(self.next_index, &record);
        self.next_index += 1;
        Some(Ok(record))
    }
}

/// Count the records in a FASTA file.
///
/// The whole file is parsed, so a malformed source fails here, before any
/// prompt or launch.
pub fn count_records<P: AsRef<Path>>(path: P) -> io::Result<usize> {
    count(File::open(path)?)
}

fn count<R: Read>(reader: R) -> io::Result<usize> {
    fasta::Reader::new(reader)
        .records()
        .try_fold(0, |n, record| record.map(|_| n + 1))
}
