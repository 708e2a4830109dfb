//! kport convert: shape a live (schemaless) object into a [`TypedValue`] following a
//! [`FieldSchema`], then mark every position the live object could not fill as pending.
//!
//! [`convert`] only ever produces `Absent` for "no value here"; [`backfill`] is the one place
//! that turns those into `Pending`.

#![forbid(unsafe_code)]

mod backfill;
mod convert;
mod flatten;

pub use backfill::{backfill, narrow_top_level};
pub use convert::convert;
pub use flatten::flatten;

pub use kport_core::{ConversionError, FieldSchema, TypedValue};
