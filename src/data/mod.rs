//! Store boundary and external collaborators (geocoder, synonym expander).

pub mod geocode;
pub mod store;
pub mod synonyms;
pub mod types;
