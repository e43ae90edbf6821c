//! Atlas scenery - tile cache and level-of-detail scheduling for a world map

pub mod core;
pub mod math;
pub mod geo;
pub mod streaming;
pub mod scenery;
