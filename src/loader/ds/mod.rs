//! Data structures shared by both loader paths: values, property slots,
//! namespace objects, module records, and the loader error taxonomy.

pub mod error;
pub mod namespace;
pub mod property;
pub mod record;
pub mod value;
