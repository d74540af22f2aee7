//! Frame codec and RPC descriptor table for the Liqi wire protocol: a
//! tagged, length-prefixed envelope carrying varint/length-delimited
//! Protobuf-shaped fields, with an XOR-obfuscated inner body on some
//! Notify frames.

pub mod descriptor;
pub mod error;
pub mod frame;
pub mod value;
pub mod varint;
pub mod xor;

pub use descriptor::{Descriptor, MethodTypes};
pub use error::CodecError;
pub use frame::{Codec, FrameKind, FrameView};
pub use value::{LiqiField, LiqiValue};
