//! Network messages for the host–voter sync protocol.

mod codec;
mod wire;

pub use codec::{decode_message, encode_message, CodecError};
pub use wire::{StateSnapshot, WireMessage};
