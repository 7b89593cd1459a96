//! Debug assertion macros for slot ring and parser invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`); release builds
//! pay nothing for them.

// =============================================================================
// Slot tags
// =============================================================================

/// Assert that a slot carries the tag a transition starts from.
///
/// **Invariant**: acquire starts at `Empty`, commit at `ForLocalUse`,
/// release at `ForForeignUse`.
///
/// Used in: `SlotRing::commit_slot()`, `SlotRing::release()`, `SlotRing::retrieve_committed_slot()`
macro_rules! debug_assert_slot_state {
    ($op:literal, $index:expr, $actual:expr, $expected:expr) => {
        debug_assert!(
            $actual == $expected,
            "slot {} in state {:?} cannot {} (expected {:?})",
            $index,
            $actual,
            $op,
            $expected
        )
    };
}

// =============================================================================
// Cursors
// =============================================================================

/// Assert that the consumer never retrieves past the last commit.
///
/// **Invariant**: `retrieved ≤ committed`
///
/// Used in: `SlotRing::retrieve_committed_slot()`
macro_rules! debug_assert_read_not_past_commit {
    ($retrieved:expr, $committed:expr) => {
        debug_assert!(
            $retrieved <= $committed,
            "retrieve cursor {} advanced beyond commit cursor {}",
            $retrieved,
            $committed
        )
    };
}

/// Assert that committed-but-unretrieved examples fit in the ring.
///
/// **Invariant**: `0 ≤ committed - retrieved ≤ capacity`
///
/// Used in: `SlotRing::commit_slot()`
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "ready count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

// =============================================================================
// Counters
// =============================================================================

/// Assert that a counter only increases.
///
/// Used in: parse loop for `vectors_parsed`, `retrieve_example()` for `vectors_read`
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// Assert that the consumer never reads more examples than were parsed.
///
/// **Invariant**: `vectors_read ≤ vectors_parsed`
///
/// Used in: `retrieve_example()`
macro_rules! debug_assert_read_not_past_parsed {
    ($read:expr, $parsed:expr) => {
        debug_assert!(
            $read <= $parsed,
            "vectors_read {} exceeds vectors_parsed {}",
            $read,
            $parsed
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_read_not_past_commit;
pub(crate) use debug_assert_read_not_past_parsed;
pub(crate) use debug_assert_slot_state;
