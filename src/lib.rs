#![cfg_attr(not(test), no_std)]

pub(crate) mod macros;
pub(crate) use macros::*;

pub mod bit_time;
pub mod crc;
pub mod events;
pub mod memory;
pub mod message;
pub mod queue;
pub mod settings;
pub mod spi;

#[cfg(all(test, not(feature = "async")))]
pub(crate) mod mocks;

pub use spi::Error;
pub use spi::MCP2517FD;
