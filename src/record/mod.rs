//! Records carried in leaf blocks.
//!
//! - [`PostalRecord`] - A postal code keyed by ZIP, stored as a fixed-width
//!   projection
//! - [`read_length_indicated`] - Ingests the length-indicated postal file

mod postal;

pub use postal::{read_length_indicated, PostalRecord, COUNTY_LEN, PLACE_LEN, STATE_LEN};
