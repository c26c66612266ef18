//! Human-readable document numbers.

use std::sync::Arc;

use chrono::NaiveDate;

/// Collision-free counter service.
///
/// `next` returns 1 for the first call on a bucket and increments by one per
/// call after that, across threads.
pub trait SequenceGenerator: Send + Sync {
    fn next(&self, bucket: &str) -> u64;
}

impl<S> SequenceGenerator for Arc<S>
where
    S: SequenceGenerator + ?Sized,
{
    fn next(&self, bucket: &str) -> u64 {
        (**self).next(bucket)
    }
}

/// Formats numbers as `{prefix}-{YYYYMMDD}-{seq}`, counting per day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNumbering {
    prefix: String,
    width: usize,
}

impl DocumentNumbering {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    pub fn bucket(&self, date: NaiveDate) -> String {
        format!("{}-{}", self.prefix, date.format("%Y%m%d"))
    }

    pub fn format(&self, date: NaiveDate, sequence: u64) -> String {
        format!("{}-{:0width$}", self.bucket(date), sequence, width = self.width)
    }

    /// Draw the next number for `date` from `sequence`.
    pub fn next_number(&self, sequence: &dyn SequenceGenerator, date: NaiveDate) -> String {
        let n = sequence.next(&self.bucket(date));
        self.format(date, n)
    }
}

impl Default for DocumentNumbering {
    fn default() -> Self {
        Self::new("SALE", 4)
    }
}
