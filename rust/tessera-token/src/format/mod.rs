//! Wire format: the protobuf envelope and block encoding.

pub(crate) mod convert;
pub mod schema;
