//! Adapters (implementations) for the protocol collaborator ports
//!
//! Concrete in-process implementations of the codec, crypto, and
//! transport ports: a serde_json wire codec, an Ed25519/HMAC crypto
//! provider, and a loopback transport that drives a responder directly.
//! Production deployments substitute a DER codec and an HTTP transport
//! behind the same ports.

pub mod ed25519;
pub mod json_codec;
pub mod loopback;

pub use ed25519::{Ed25519Crypto, Identity};
pub use json_codec::JsonCodec;
pub use loopback::Loopback;
