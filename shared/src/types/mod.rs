//! Record type definitions

pub mod record;
