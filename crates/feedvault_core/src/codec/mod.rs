//! Value codecs for data embedded in other records.

pub mod location;
