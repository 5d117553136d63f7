/// Parsing helpers and the crate-wide `Res` alias
pub mod common;
/// Coordinates and offsets
pub mod squares;
