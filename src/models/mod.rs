//! Data models shared by the decoder and the stream pipeline.

pub mod bgp;
pub mod mrt;
pub mod network;

pub use bgp::*;
pub use mrt::*;
pub use network::*;
