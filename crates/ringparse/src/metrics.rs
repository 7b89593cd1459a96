/// Point-in-time counters of a parser run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Examples committed by the parse thread.
    pub vectors_parsed: u64,
    /// Examples handed to the consumer.
    pub vectors_read: u64,
    /// Times the parse thread waited for the consumer to free a slot.
    pub producer_waits: u64,
}

impl MetricsSnapshot {
    /// Examples parsed but not yet handed to the consumer.
    #[inline]
    pub fn backlog(&self) -> u64 {
        self.vectors_parsed.saturating_sub(self.vectors_read)
    }
}
