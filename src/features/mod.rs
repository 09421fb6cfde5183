//! Feature domain: the train/serve encoding contract.
//!
//! [`Schema`] is extracted from the training table and frozen; [`encode`]
//! turns any record into the vector layout that schema describes.

pub mod encoder;
pub mod schema;

pub use encoder::{encode, encode_table, RawValue, RecordView, MISSING_CATEGORY};
pub use schema::{Schema, SCHEMA_FORMAT_VERSION};
