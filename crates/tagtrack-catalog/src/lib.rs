//! Tag catalog loading and tuning.
//!
//! A catalog is the list of RF tags the remote detector should listen for,
//! read from a comma separated text file:
//!
//! ```text
//! # id, name, freq_hz, ip_msecs_1, ip_msecs_1_id, ip_msecs_2, ip_msecs_2_id, pulse_width_msecs, ip_uncertainty_msecs, ip_jitter_msecs
//! 2, collar-a, 146000000, 1000, slow, 0, , 15, 60, 20
//! ```
//!
//! Lines starting with `#` and blank lines are skipped. The repeat count `k`
//! and false alarm probability come from session configuration and are
//! stamped onto every tag. Once parsed, the catalog is tuned to a single
//! receiver center frequency.

mod catalog;
mod error;
mod parse;
mod tag;
mod tuner;

pub use catalog::*;
pub use error::*;
pub use parse::*;
pub use tag::*;
pub use tuner::*;
