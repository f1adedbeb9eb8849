//! A pull-based pipeline for merging many MRT archives (RIB dumps and UPDATES streams, local
//! files or a growing catalog) into one filtered, time-ordered sequence of [`BgpRecord`]s.
//!
//! The pieces, in the order data flows through them:
//! - [`filter_set`] — what the caller wants: a time interval, and optional collector/project/
//!   peer-AS/prefix/element-type/RIB-period predicates.
//! - [`data_interface`] — where inputs come from: a single file, a CSV catalog, or a SQLite
//!   catalog, each surfacing [`input_descriptor::InputDescriptor`]s.
//! - [`input_queue`] — holds descriptors the data interface has found but the reader set hasn't
//!   opened yet.
//! - [`reader`] and [`reader_set`] — decode each input and merge their head records into one
//!   non-decreasing timestamp order.
//! - [`coordinator`] — the public entry point: a small lifecycle state machine around all of
//!   the above, driven one record at a time through `next_record`.
//!
//! ```no_run
//! use bgpstream::stream::coordinator::{StreamCoordinator, NextStatus};
//!
//! let mut coordinator = StreamCoordinator::new();
//! coordinator.add_interval(1_600_000_000, 1_600_003_600).unwrap();
//! coordinator.set_data_interface("single-file").unwrap();
//! coordinator.set_data_interface_option("path", "updates.20200913.0000.bz2").unwrap();
//! coordinator.set_data_interface_option("collector", "rrc00").unwrap();
//! coordinator.start().unwrap();
//!
//! let mut record = None;
//! loop {
//!     match coordinator.next_record(&mut record).unwrap() {
//!         NextStatus::Ok => {
//!             for elem in &record.as_ref().unwrap().elements {
//!                 println!("{elem}");
//!             }
//!         }
//!         NextStatus::EndOfStream => break,
//!     }
//! }
//! coordinator.destroy();
//! ```

pub mod clock;
pub mod coordinator;
pub mod data_interface;
pub mod filter_set;
pub mod input_descriptor;
pub mod input_queue;
pub mod reader;
pub mod reader_set;
pub mod record;
