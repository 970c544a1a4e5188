//! Ports (interfaces) for protocol collaborators
//!
//! The transaction engine only knows about these interfaces: the wire
//! codec, the crypto provider, and the message transport. Concrete
//! implementations live in `adapters` or outside the crate.

pub mod codec;
pub mod crypto;
pub mod transport;

pub use codec::{Codec, CodecError};
pub use crypto::{CryptoError, CryptoProvider};
pub use transport::{Transport, TransportError};
