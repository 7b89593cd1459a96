use crate::config::{ParserConfig, ReadMode};
use crate::error::ParserError;
use crate::example::{Example, NO_LABEL};
use crate::invariants::{debug_assert_monotonic, debug_assert_read_not_past_parsed};
use crate::metrics::MetricsSnapshot;
use crate::ring::{ForeignSlot, SlotRing};
use crate::shutdown::CancelHandle;
use crate::source::RecordSource;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

// =============================================================================
// LIFECYCLE
// =============================================================================
//
//   IDLE --start--> RUNNING --source ends--> DRAINING --all read--> STOPPED
//                      |                                              ^
//                      +------------------- cancel -------------------+
//
// - RUNNING:  started, parsing_done == false
// - DRAINING: parsing_done == true, reading_done == false
// - STOPPED:  reading_done == true
//
// `parsing_done` and `reading_done` only go false -> true; `init` builds a
// fresh state.
//
// ## Locking
//
// `state` guards the lifecycle flags and both counters. The ring has its own
// lock for slot tags; the consumer takes the ring lock while holding `state`
// (retrieve), never the other way round.
//
// `keep_running` is read without any lock so that cancellation is observed
// at the top of every parse iteration even while the consumer holds `state`.
//
// =============================================================================

#[derive(Debug, Default)]
pub(crate) struct ParseState {
    started: bool,
    parsing_done: bool,
    reading_done: bool,
    vectors_parsed: u64,
    vectors_read: u64,
    number_of_features: Option<usize>,
}

/// State shared between the parser handle, its parse thread and cancel handles.
pub(crate) struct Shared<T> {
    state: Mutex<ParseState>,
    /// Signalled on commit, on end of parsing, and on cancel
    state_changed: Condvar,
    keep_running: CachePadded<AtomicBool>,
    ring: SlotRing<T>,
    source: Mutex<Box<dyn RecordSource<T>>>,
}

impl<T> Shared<T> {
    fn new(source: Box<dyn RecordSource<T>>, config: &ParserConfig) -> Self {
        let ring = SlotRing::new(config.ring_capacity);
        ring.set_free_vectors_on_destruct(config.free_vectors_on_destruct);
        Self {
            state: Mutex::new(ParseState::default()),
            state_changed: Condvar::new(),
            keep_running: CachePadded::new(AtomicBool::new(false)),
            ring,
            source: Mutex::new(source),
        }
    }

    #[inline]
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ParseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub(crate) fn keep_running(&self) -> bool {
        self.keep_running.load(Ordering::Acquire)
    }

    /// Returns true once a stop has been requested.
    #[inline]
    pub(crate) fn is_stopped(&self) -> bool {
        self.ring.is_closed()
    }

    /// Clears `keep_running`, closes the ring and wakes every waiter.
    ///
    /// Returns the previous value of `keep_running`.
    pub(crate) fn request_stop(&self) -> bool {
        let was_running = self.keep_running.swap(false, Ordering::AcqRel);
        self.ring.close();
        // Taking the lock orders the flag store before a consumer's
        // check-then-wait, so the notification cannot be missed.
        let _state = self.lock_state();
        self.state_changed.notify_all();
        was_running
    }
}

/// Moves a cancelled parser to STOPPED. A no-op unless a stop was requested.
fn mark_stopped_if_cancelled<T>(shared: &Shared<T>, state: &mut ParseState) {
    if shared.is_stopped() {
        state.parsing_done = true;
        state.reading_done = true;
    }
}

/// Marks parsing done when the parse thread exits, including by panic.
struct FinishGuard<'a, T> {
    shared: &'a Shared<T>,
}

impl<T> Drop for FinishGuard<'_, T> {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::warn!("parse thread panicked; ending stream");
        }
        let mut state = self.shared.lock_state();
        state.parsing_done = true;
        tracing::trace!(
            vectors_parsed = state.vectors_parsed,
            "parse thread finished"
        );
        self.shared.state_changed.notify_all();
    }
}

/// Body of the parse thread: read records into free slots until the source
/// ends or the parser is cancelled.
fn parse_loop<T>(shared: &Shared<T>, mode: ReadMode) {
    let _finish = FinishGuard { shared };
    let mut source = shared.source.lock().unwrap_or_else(PoisonError::into_inner);

    while shared.keep_running() {
        if shared.lock_state().parsing_done {
            return;
        }

        // None: the ring was closed by a cancel while we waited for a slot.
        let Some(mut slot) = shared.ring.acquire_free_slot() else {
            return;
        };

        let example = slot.example_mut();
        let length = match mode {
            ReadMode::Labelled => {
                source.read_vector_and_label(&mut example.vector, &mut example.label)
            }
            ReadMode::Unlabelled => {
                example.label = NO_LABEL;
                source.read_vector(&mut example.vector)
            }
        };

        // End of input and read failure both end the stream. Dropping the
        // uncommitted slot hands it back to the ring.
        if length < 0 {
            return;
        }

        let length = length as usize;
        example.length = length;
        slot.commit();

        let mut state = shared.lock_state();
        let parsed = state.vectors_parsed;
        state.vectors_parsed += 1;
        debug_assert_monotonic!("vectors_parsed", parsed, state.vectors_parsed);
        if state.number_of_features.is_none() {
            state.number_of_features = Some(length);
        }
        shared.state_changed.notify_all();
    }
}

/// Streams examples from a [`RecordSource`] to a single consumer.
///
/// A background thread reads records into a fixed ring of reusable example
/// slots; the consumer takes them out in order with
/// [`get_next_example`](Self::get_next_example) and hands each slot back with
/// [`finalize_example`](Self::finalize_example).
///
/// # Example
///
/// ```
/// use ringparse::{InputParser, ParserConfig, VecSource};
///
/// let records = (0..10).map(|i| (vec![i as f32], f64::from(i)));
/// let config = ParserConfig::default().with_ring_capacity(4);
/// let mut parser = InputParser::new(VecSource::new(records), config).unwrap();
///
/// parser.start_parser().unwrap();
/// let mut labels = Vec::new();
/// while let Some(example) = parser.get_next_example() {
///     labels.push(example.label());
///     parser.finalize_example();
/// }
/// parser.end_parser().unwrap();
///
/// assert_eq!(labels, (0..10).map(f64::from).collect::<Vec<_>>());
/// ```
pub struct InputParser<T> {
    shared: Arc<Shared<T>>,
    config: ParserConfig,
    read_mode: ReadMode,
    parse_thread: Option<JoinHandle<()>>,
    /// Slot handed out by the last successful `get_next_example`
    current: Option<ForeignSlot>,
}

impl<T: Send + 'static> InputParser<T> {
    /// Creates a parser reading from `source`.
    pub fn new<S>(source: S, config: ParserConfig) -> Result<Self, ParserError>
    where
        S: RecordSource<T> + 'static,
    {
        validate(&config)?;
        Ok(Self {
            shared: Arc::new(Shared::new(Box::new(source), &config)),
            config,
            read_mode: config.read_mode(),
            parse_thread: None,
            current: None,
        })
    }

    /// Re-initialises the parser with a new source and configuration.
    ///
    /// Resets the counters and lifecycle flags and builds a new ring. Fails
    /// with [`ParserError::Busy`] while a parse thread is attached.
    pub fn init<S>(&mut self, source: S, config: ParserConfig) -> Result<(), ParserError>
    where
        S: RecordSource<T> + 'static,
    {
        if self.parse_thread.is_some() {
            return Err(ParserError::Busy);
        }
        validate(&config)?;

        // The old slot handle belongs to the old ring.
        self.current = None;
        self.shared = Arc::new(Shared::new(Box::new(source), &config));
        self.config = config;
        self.read_mode = config.read_mode();
        tracing::debug!(
            ring_capacity = config.ring_capacity,
            labelled = config.labelled,
            "input parser initialised"
        );
        Ok(())
    }

    /// Spawns the parse thread.
    ///
    /// Fails with [`ParserError::AlreadyRunning`] if a parse thread is already
    /// attached; the running thread is unaffected.
    pub fn start_parser(&mut self) -> Result<(), ParserError> {
        tracing::trace!("entering InputParser::start_parser");
        if self.parse_thread.is_some() {
            return Err(ParserError::AlreadyRunning);
        }

        self.shared.lock_state().started = true;
        self.shared.keep_running.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let mode = self.read_mode;
        let spawned = thread::Builder::new()
            .name("ringparse-parser".into())
            .spawn(move || parse_loop(&shared, mode));

        match spawned {
            Ok(handle) => {
                self.parse_thread = Some(handle);
                tracing::trace!("parse thread started");
                Ok(())
            }
            Err(e) => {
                self.shared.keep_running.store(false, Ordering::Release);
                self.shared.lock_state().started = false;
                Err(ParserError::Spawn(e))
            }
        }
    }

    /// Waits for the parse thread to finish on its own.
    ///
    /// Use after the consumer has drained the stream. Calling it with no
    /// attached thread is a no-op.
    pub fn end_parser(&mut self) -> Result<(), ParserError> {
        let Some(handle) = self.parse_thread.take() else {
            return Ok(());
        };
        tracing::trace!("joining parse thread");
        let joined = handle.join().map_err(|_| ParserError::ParseThreadPanicked);

        mark_stopped_if_cancelled(&self.shared, &mut self.shared.lock_state());
        joined
    }

    /// Cancels the parse thread and waits for it.
    ///
    /// Wakes a consumer blocked in `get_next_example`, which then returns
    /// `None`. Safe to call repeatedly and after the thread has finished.
    pub fn exit_parser(&mut self) -> Result<(), ParserError> {
        if self.shared.request_stop() {
            tracing::debug!("cancelling parse thread");
        }
        let joined = self.end_parser();
        mark_stopped_if_cancelled(&self.shared, &mut self.shared.lock_state());
        joined
    }

    /// Returns a handle that can cancel this parser from another thread.
    pub fn cancel_handle(&self) -> CancelHandle<T> {
        CancelHandle::new(Arc::clone(&self.shared))
    }
}

impl<T> InputParser<T> {
    /// Returns the next example, blocking until one is parsed.
    ///
    /// Returns `None` once every parsed example has been read and the source
    /// has ended, or after a cancel. Call [`finalize_example`](Self::finalize_example)
    /// after each example before asking for the next one.
    ///
    /// An example that is not finalized before the next call keeps its slot
    /// for the lifetime of the ring: the slot is never reused, and a consumer
    /// that skips `finalize_example` repeatedly fills the ring and stalls the
    /// parse thread.
    pub fn get_next_example(&mut self) -> Option<&Example<T>> {
        let slot = {
            let shared = &*self.shared;
            let mut state = shared.lock_state();
            loop {
                if !shared.keep_running() {
                    mark_stopped_if_cancelled(shared, &mut state);
                    return None;
                }
                if state.reading_done {
                    return None;
                }
                if let Some(slot) = retrieve_example(shared, &mut state) {
                    break slot;
                }
                if state.reading_done {
                    return None;
                }
                state = shared
                    .state_changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let slot = self.current.insert(slot);
        Some(self.shared.ring.example(slot))
    }

    /// Returns the feature vector of the next example.
    ///
    /// Same as [`get_next_example`](Self::get_next_example) for consumers of
    /// unlabelled data.
    pub fn get_next_vector(&mut self) -> Option<&[T]> {
        self.get_next_example().map(Example::vector)
    }

    /// Releases the example returned by the last `get_next_example` so the
    /// parse thread can reuse its slot.
    pub fn finalize_example(&mut self) {
        if let Some(slot) = self.current.take() {
            self.shared
                .ring
                .release(slot, self.config.free_vector_after_release);
        }
    }

    /// Returns true while the parser is started and has not reached STOPPED.
    pub fn is_running(&self) -> bool {
        let state = self.shared.lock_state();
        state.started && (!state.parsing_done || !state.reading_done)
    }

    /// Number of features, taken from the first parsed vector.
    ///
    /// Returns 0 until a vector has been parsed. Later vectors are not
    /// checked against it.
    pub fn estimated_feature_count(&self) -> usize {
        self.shared.lock_state().number_of_features.unwrap_or(0)
    }

    /// Number of examples committed by the parse thread.
    pub fn vectors_parsed(&self) -> u64 {
        self.shared.lock_state().vectors_parsed
    }

    /// Number of examples handed to the consumer.
    pub fn vectors_read(&self) -> u64 {
        self.shared.lock_state().vectors_read
    }

    /// Snapshot of the parser counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        let state = self.shared.lock_state();
        MetricsSnapshot {
            vectors_parsed: state.vectors_parsed,
            vectors_read: state.vectors_read,
            producer_waits: self.shared.ring.producer_waits(),
        }
    }

    /// Size of the example ring.
    #[inline]
    pub fn ring_capacity(&self) -> usize {
        self.shared.ring.capacity()
    }

    /// The active configuration.
    #[inline]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Sets whether finalizing an example drops its vector storage.
    ///
    /// Keep the storage if the record source reuses vector allocations.
    pub fn set_free_vector_after_release(&mut self, free: bool) {
        self.config.free_vector_after_release = free;
    }

    /// Sets whether destroying the ring runs an explicit release pass over the
    /// vectors it still holds. The vectors are dropped with the ring either way.
    pub fn set_free_vectors_on_destruct(&mut self, free: bool) {
        self.config.free_vectors_on_destruct = free;
        self.shared.ring.set_free_vectors_on_destruct(free);
    }
}

impl<T> Drop for InputParser<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.parse_thread.take() {
            self.shared.request_stop();
            if handle.join().is_err() {
                tracing::warn!("parse thread panicked before parser was dropped");
            }
        }
    }
}

/// Takes the next committed example off the ring. Must be called with
/// `state` locked.
fn retrieve_example<T>(shared: &Shared<T>, state: &mut ParseState) -> Option<ForeignSlot> {
    debug_assert_read_not_past_parsed!(state.vectors_read, state.vectors_parsed);

    if state.vectors_read == state.vectors_parsed {
        if state.parsing_done {
            state.reading_done = true;
            // No more examples will arrive
            shared.state_changed.notify_all();
        }
        return None;
    }

    // Commit precedes the parsed count, so a counted example is always on the ring.
    let slot = shared.ring.retrieve_committed_slot();
    debug_assert!(slot.is_some(), "parsed example missing from ring");

    let read = state.vectors_read;
    state.vectors_read += 1;
    debug_assert_monotonic!("vectors_read", read, state.vectors_read);
    slot
}

fn validate(config: &ParserConfig) -> Result<(), ParserError> {
    if config.ring_capacity == 0 {
        return Err(ParserError::InvalidCapacity {
            capacity: config.ring_capacity,
        });
    }
    Ok(())
}
