//! Deterministic result file names.
//!
//! A name is built from an optional prefix, the zero-padded record ordinal and
//! the sanitized FASTA description:
//!
//! ```text
//! prefix_0001_-_fasta record description
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::BatchError;
use crate::fasta::SequenceRecord;

/// Characters that are not allowed in file names on common filesystems.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const PREFIX_SEPARATOR: &str = "_";
const DESCRIPTION_SEPARATOR: &str = "_-_";

/// Rewrites a FASTA description before it becomes part of a file name.
pub trait DescriptionTransform: Send + Sync {
    fn apply(&self, description: &str) -> String;
}

impl<F> DescriptionTransform for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn apply(&self, description: &str) -> String {
        self(description)
    }
}

/// Built-in description transforms selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptionMode {
    /// Use the whole description.
    #[default]
    Full,
    /// Use only the first whitespace-separated token.
    FirstWord,
    /// Keep at most this many characters.
    Truncate(usize),
}

impl DescriptionTransform for DescriptionMode {
    fn apply(&self, description: &str) -> String {
        match self {
            DescriptionMode::Full => description.to_string(),
            DescriptionMode::FirstWord => description
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
            DescriptionMode::Truncate(n) => description.chars().take(*n).collect(),
        }
    }
}

impl FromStr for DescriptionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(DescriptionMode::Full),
            "first-word" => Ok(DescriptionMode::FirstWord),
            other => match other.strip_prefix("truncate:") {
                Some(n) => n
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .map(DescriptionMode::Truncate)
                    .ok_or_else(|| format!("invalid truncate length: {n}")),
                None => Err(format!(
                    "unknown description mode `{other}` (expected full, first-word or truncate:<N>)"
                )),
            },
        }
    }
}

/// Inputs to the naming policy, validated by [`NamingPolicy::new`].
#[derive(Clone, Default)]
pub struct NamingContext {
    pub prefix: String,
    pub auto_number: bool,
    pub use_description: bool,
    pub description_transform: Option<Arc<dyn DescriptionTransform>>,
    pub total_record_count: usize,
}

impl fmt::Debug for NamingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamingContext")
            .field("prefix", &self.prefix)
            .field("auto_number", &self.auto_number)
            .field("use_description", &self.use_description)
            .field("has_transform", &self.description_transform.is_some())
            .field("total_record_count", &self.total_record_count)
            .finish()
    }
}

/// Maps a record to its output file name.
#[derive(Clone)]
pub struct NamingPolicy {
    prefix: String,
    auto_number: bool,
    use_description: bool,
    transform: Arc<dyn DescriptionTransform>,
    zero_pad_width: usize,
}

impl NamingPolicy {
    /// Build a policy, rejecting contexts that cannot tell records apart.
    pub fn new(ctx: NamingContext) -> Result<Self, BatchError> {
        if !ctx.auto_number && !ctx.use_description {
            return Err(BatchError::NamingDisabled);
        }
        let transform = ctx
            .description_transform
            .unwrap_or_else(|| Arc::new(DescriptionMode::Full));

        Ok(Self {
            prefix: ctx.prefix,
            auto_number: ctx.auto_number,
            use_description: ctx.use_description,
            transform,
            zero_pad_width: pad_width(ctx.total_record_count),
        })
    }

    pub fn zero_pad_width(&self) -> usize {
        self.zero_pad_width
    }

    pub fn file_name(&self, record: &SequenceRecord) -> String {
        let mut name = String::new();
        if !self.prefix.is_empty() {
            name.push_str(&self.prefix);
            name.push_str(PREFIX_SEPARATOR);
        }
        if self.auto_number {
            name.push_str(&format!(
                "{:0width$}",
                record.index,
                width = self.zero_pad_width
            ));
        }
        if self.use_description {
            if self.auto_number {
                name.push_str(DESCRIPTION_SEPARATOR);
            }
            name.push_str(&sanitize(&self.transform.apply(&record.description)));
        }
        name
    }

    /// Reject record sets whose names would collide or leave the results
    /// directory. Numbered names are always unique, so nothing is read then.
    pub fn check_names<I>(&self, records: I) -> Result<(), BatchError>
    where
        I: IntoIterator<Item = io::Result<SequenceRecord>>,
    {
        if self.auto_number {
            return Ok(());
        }
        let mut seen: HashMap<String, usize> = HashMap::new();
        for record in records {
            let record = record?;
            let name = self.file_name(&record);
            if matches!(name.trim(), "" | "." | "..") {
                return Err(BatchError::UnusableName {
                    ordinal: record.index,
                    name,
                });
            }
            if let Some(&first) = seen.get(&name) {
                return Err(BatchError::DuplicateName {
                    first,
                    second: record.index,
                    name,
                });
            }
            seen.insert(name, record.index);
        }
        Ok(())
    }
}

/// Digit count of the record total, so existing result sets keep their names.
fn pad_width(total: usize) -> usize {
    total.to_string().len()
}

/// Replace every filesystem-illegal character with `_`.
pub fn sanitize(description: &str) -> String {
    description
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Whether an existing directory entry looks like a result this batch may overwrite.
pub fn looks_like_result(file_name: &str, prefix: &str) -> bool {
    (file_name.contains(".svg") || file_name.contains(".xml")) && file_name.contains(prefix)
}
