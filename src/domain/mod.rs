//! Catalog and receiving domain
pub mod adjustment;
pub mod aggregates;
pub mod events;
pub mod receiving;
pub mod value_objects;
pub mod variants;
