/*
[INPUT]:  Venue environment definitions
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions shared by HTTP and WebSocket layers
[UPDATE]: When new environments or shared types are added
*/

pub mod enums;

pub use enums::*;
