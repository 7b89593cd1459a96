//! The record source collaborator.
//!
//! A [`RecordSource`] yields one raw record per call. Format-specific readers
//! (dense text, sparse text, binary) live outside this crate; the parser only
//! needs the two read operations below.

use std::collections::VecDeque;

/// Provider of raw feature vectors, one record at a time.
///
/// Both read operations fill `vector` in place and return the record length.
/// A negative length ends the stream. End of input and a read failure are not
/// distinguished: sources that need finer error reporting must expose it
/// through their own channel.
///
/// `vector` may still hold the contents of an earlier record when the ring
/// retains vector storage across releases. Implementations replace its
/// contents; they should not append to it.
pub trait RecordSource<T>: Send {
    /// Reads the next unlabelled record into `vector`.
    fn read_vector(&mut self, vector: &mut Vec<T>) -> isize;

    /// Reads the next labelled record into `vector` and `label`.
    fn read_vector_and_label(&mut self, vector: &mut Vec<T>, label: &mut f64) -> isize;
}

impl<T, S> RecordSource<T> for Box<S>
where
    S: RecordSource<T> + ?Sized,
{
    #[inline]
    fn read_vector(&mut self, vector: &mut Vec<T>) -> isize {
        (**self).read_vector(vector)
    }

    #[inline]
    fn read_vector_and_label(&mut self, vector: &mut Vec<T>, label: &mut f64) -> isize {
        (**self).read_vector_and_label(vector, label)
    }
}

/// In-memory record source over a queue of `(vector, label)` records.
///
/// Returns `-1` once the queue is drained.
#[derive(Debug, Clone, Default)]
pub struct VecSource<T> {
    records: VecDeque<(Vec<T>, f64)>,
}

impl<T> VecSource<T> {
    /// Creates a source that yields `records` in order.
    pub fn new(records: impl IntoIterator<Item = (Vec<T>, f64)>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    /// Creates an unlabelled source; every record gets label `0.0`.
    pub fn unlabelled(vectors: impl IntoIterator<Item = Vec<T>>) -> Self {
        Self::new(vectors.into_iter().map(|v| (v, 0.0)))
    }

    /// Number of records not yet read.
    pub fn remaining(&self) -> usize {
        self.records.len()
    }

    fn next_into(&mut self, vector: &mut Vec<T>) -> Option<f64> {
        let (next, label) = self.records.pop_front()?;
        // Full replacement: the slot takes over this record's allocation.
        *vector = next;
        Some(label)
    }
}

impl<T: Send> RecordSource<T> for VecSource<T> {
    fn read_vector(&mut self, vector: &mut Vec<T>) -> isize {
        match self.next_into(vector) {
            Some(_) => vector.len() as isize,
            None => -1,
        }
    }

    fn read_vector_and_label(&mut self, vector: &mut Vec<T>, label: &mut f64) -> isize {
        match self.next_into(vector) {
            Some(l) => {
                *label = l;
                vector.len() as isize
            }
            None => -1,
        }
    }
}
