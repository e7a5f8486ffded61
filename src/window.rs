//! Record-range filtering over a forward-only record source.

use std::io;

use crate::error::BatchError;
use crate::fasta::SequenceRecord;

/// Half-open ordinal range `[start, end)` of records eligible for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordWindow {
    pub start: usize,
    /// `None` means "until the source is exhausted".
    pub end: Option<usize>,
}

impl RecordWindow {
    pub fn new(start: usize, end: Option<usize>) -> Result<Self, BatchError> {
        match end {
            Some(end) if end < start => Err(BatchError::InvalidWindow { start, end }),
            _ => Ok(Self { start, end }),
        }
    }

    pub fn admits(&self, ordinal: usize) -> bool {
        ordinal >= self.start && self.end.is_none_or(|end| ordinal < end)
    }

    fn is_past(&self, ordinal: usize) -> bool {
        self.end.is_some_and(|end| ordinal >= end)
    }

    /// Number of records this window admits from a source of `total` records.
    pub fn expected_len(&self, total: usize) -> usize {
        let end = self.end.map_or(total, |end| end.min(total));
        end.saturating_sub(self.start)
    }

    /// Wrap `records` so that only admitted records are yielded.
    ///
    /// Enumeration stops at the first record past the window; the source is
    /// not polled again after that.
    pub fn apply<I>(self, records: I) -> Windowed<I>
    where
        I: Iterator<Item = io::Result<SequenceRecord>>,
    {
        Windowed {
            window: self,
            inner: records,
            finished: self.end == Some(self.start),
        }
    }
}

pub struct Windowed<I> {
    window: RecordWindow,
    inner: I,
    finished: bool,
}

impl<I> Iterator for Windowed<I>
where
    I: Iterator<Item = io::Result<SequenceRecord>>,
{
    type Item = io::Result<SequenceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.inner.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(record)) => {
                    if self.window.is_past(record.index) {
                        self.finished = true;
                        return None;
                    }
                    if self.window.admits(record.index) {
                        return Some(Ok(record));
                    }
                }
            }
        }
    }
}
