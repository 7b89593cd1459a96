/// Label carried by examples read in unlabelled mode.
pub const NO_LABEL: f64 = -1.0;

/// Ownership tag of a ring slot.
///
/// Exactly one tag holds per slot. The producer moves `Empty -> ForLocalUse`
/// (acquire) and `ForLocalUse -> ForForeignUse` (commit); the consumer moves
/// `ForForeignUse -> Empty` (release).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Free for the producer.
    #[default]
    Empty,
    /// Being filled by the producer.
    ForLocalUse,
    /// Committed; owned by the consumer until released.
    ForForeignUse,
}

/// A parsed feature vector with its length and label.
///
/// Examples live at fixed positions in the slot ring and are reused rather
/// than allocated per record.
#[derive(Debug, Clone, PartialEq)]
pub struct Example<T> {
    pub(crate) vector: Vec<T>,
    pub(crate) length: usize,
    pub(crate) label: f64,
}

impl<T> Example<T> {
    /// Creates an example from its parts.
    pub fn new(vector: Vec<T>, length: usize, label: f64) -> Self {
        Self {
            vector,
            length,
            label,
        }
    }

    /// The feature vector.
    #[inline]
    pub fn vector(&self) -> &[T] {
        &self.vector
    }

    /// Length reported by the record source.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Label of the example, or [`NO_LABEL`] in unlabelled mode.
    #[inline]
    pub fn label(&self) -> f64 {
        self.label
    }

    /// Consumes the example, returning the vector storage.
    pub fn into_vector(self) -> Vec<T> {
        self.vector
    }

    /// Drops the vector storage, keeping length and label.
    pub(crate) fn free_vector(&mut self) {
        self.vector = Vec::new();
    }
}

impl<T> Default for Example<T> {
    fn default() -> Self {
        Self {
            vector: Vec::new(),
            length: 0,
            label: NO_LABEL,
        }
    }
}
