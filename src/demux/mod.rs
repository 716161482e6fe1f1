//! Frame-to-packet demultiplexing
//!
//! [`parser`] splits a contiguous buffer into packets; [`reassembler`] feeds it
//! frame payloads, tracks packets that straddle frames and hands completed
//! packets to a [`PacketSink`](crate::sink::PacketSink).

pub mod parser;
pub mod reassembler;

pub use parser::{PacketParser, Parsed};
pub use reassembler::{Demultiplexer, InFlight};
