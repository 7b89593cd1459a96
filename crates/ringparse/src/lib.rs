//! ringparse - Background Input Parsing Through a Bounded Slot Ring
//!
//! Decouples record I/O from the algorithm consuming the records. A dedicated
//! parse thread pulls raw records from a [`RecordSource`], writes them into a
//! fixed ring of reusable example slots, and a single consumer thread takes
//! them out in order.
//!
//! # Key Features
//!
//! - Strict FIFO delivery, no loss, no duplication
//! - Bounded memory: the parse thread waits when every slot is still held
//! - Slot reuse: vector allocations can be recycled between records
//! - Cooperative cancellation that wakes a blocked consumer and producer
//!
//! # Example
//!
//! ```
//! use ringparse::{InputParser, ParserConfig, VecSource};
//!
//! let source = VecSource::new(vec![
//!     (vec![0.5f32, 1.5], 1.0),
//!     (vec![2.0, 0.0], -1.0),
//! ]);
//! let mut parser = InputParser::new(source, ParserConfig::default()).unwrap();
//! parser.start_parser().unwrap();
//!
//! while let Some(example) = parser.get_next_example() {
//!     println!("{:?} -> {}", example.vector(), example.label());
//!     parser.finalize_example();
//! }
//!
//! parser.end_parser().unwrap();
//! ```

mod config;
mod error;
mod example;
mod invariants;
mod metrics;
mod parser;
mod ring;
mod shutdown;
mod source;

pub use config::{
    ParserConfig, ReadMode, DEFAULT_RING_CAPACITY, LABELLED_CONFIG, UNLABELLED_CONFIG,
};
pub use error::ParserError;
pub use example::{Example, SlotState, NO_LABEL};
pub use metrics::MetricsSnapshot;
pub use parser::InputParser;
pub use ring::{ForeignSlot, LocalSlot, SlotRing};
pub use shutdown::CancelHandle;
pub use source::{RecordSource, VecSource};
