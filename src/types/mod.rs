//! Core types of the time card.
//!
//! ## Time model
//!
//! Every time is an `i64` millisecond offset from local midnight ([`Millis`]),
//! with `0` doubling as "unset". [`ms_to_parts`] and [`parts_to_ms`] convert
//! between that representation and display components.
//!
//! ## Checkpoints and countdown
//!
//! A card holds a [`CheckpointList`] of [`CheckpointRecord`]s in rally order.
//! [`calculate_countdown`] picks the next upcoming arrival as a
//! [`CountdownTarget`].
//!
//! ## Usage Example
//!
//! ```rust
//! use rallycard::types::{CheckpointField, CheckpointList, calculate_countdown, parse_time};
//!
//! let mut checkpoints = CheckpointList::new_card(2);
//! checkpoints.set_field(2, CheckpointField::ProvisionalStartTime, parse_time("09:30").unwrap()).unwrap();
//! checkpoints.set_field(2, CheckpointField::DrivingTime, 5 * 60_000).unwrap();
//!
//! let countdown = calculate_countdown(&checkpoints, parse_time("09:31").unwrap());
//! assert_eq!(countdown.label, "arrive at PKC2");
//! assert_eq!(countdown.target_time, parse_time("09:35").unwrap());
//! ```

mod card;
mod checkpoint;
mod countdown;
mod message;
mod time;

pub use card::{Card, CardInfo};
pub use checkpoint::{CheckpointField, CheckpointList, CheckpointRecord};
pub use countdown::{CountdownTarget, arrival_label, calculate_countdown};
pub use message::{BroadcastMessage, MessageKind};
pub use time::{
    MAX_TIME_OF_DAY, MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE, MS_PER_SECOND, Millis, TimeParts,
    UNSET, format_time, format_time_precise, ms_from_midnight, ms_to_parts, parse_time,
    parts_to_ms, round_trips_exactly, round_two_significant, validate_time_of_day,
};
