/// Default number of example slots in the ring.
pub const DEFAULT_RING_CAPACITY: usize = 100;

/// Which read operation the parse thread calls on the record source.
///
/// Chosen once at `init` time from [`ParserConfig::labelled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Call [`RecordSource::read_vector_and_label`](crate::RecordSource::read_vector_and_label).
    Labelled,
    /// Call [`RecordSource::read_vector`](crate::RecordSource::read_vector).
    Unlabelled,
}

/// Configuration for [`InputParser`](crate::InputParser) and its slot ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Read labelled records (default: true)
    pub labelled: bool,
    /// Number of example slots in the ring (default: 100)
    pub ring_capacity: usize,
    /// Drop a slot's vector storage when the consumer finalizes it (default: true).
    ///
    /// When false the allocation stays in the slot and is handed back to the
    /// record source the next time the slot is filled.
    pub free_vector_after_release: bool,
    /// Explicitly release every held vector when the ring is destroyed (default: true)
    pub free_vectors_on_destruct: bool,
}

impl ParserConfig {
    /// Creates a new configuration with custom settings.
    pub const fn new(
        labelled: bool,
        ring_capacity: usize,
        free_vector_after_release: bool,
        free_vectors_on_destruct: bool,
    ) -> Self {
        Self {
            labelled,
            ring_capacity,
            free_vector_after_release,
            free_vectors_on_destruct,
        }
    }

    /// Returns the read strategy selected by this configuration.
    #[inline]
    pub const fn read_mode(&self) -> ReadMode {
        if self.labelled {
            ReadMode::Labelled
        } else {
            ReadMode::Unlabelled
        }
    }

    /// Sets whether records carry a label.
    pub const fn with_labelled(mut self, labelled: bool) -> Self {
        self.labelled = labelled;
        self
    }

    /// Sets the ring capacity.
    pub const fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;
        self
    }

    /// Sets whether finalized slots drop their vector storage.
    pub const fn with_free_vector_after_release(mut self, free: bool) -> Self {
        self.free_vector_after_release = free;
        self
    }

    /// Sets whether ring destruction releases every held vector.
    pub const fn with_free_vectors_on_destruct(mut self, free: bool) -> Self {
        self.free_vectors_on_destruct = free;
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        LABELLED_CONFIG
    }
}

/// Labelled records, 100 slots, vectors freed on release and on destruct.
pub const LABELLED_CONFIG: ParserConfig =
    ParserConfig::new(true, DEFAULT_RING_CAPACITY, true, true);

/// Unlabelled records, otherwise the same as [`LABELLED_CONFIG`].
pub const UNLABELLED_CONFIG: ParserConfig =
    ParserConfig::new(false, DEFAULT_RING_CAPACITY, true, true);
