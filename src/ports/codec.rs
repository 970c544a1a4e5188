//! Wire codec port
//!
//! ASN.1 DER encoding and decoding of CMP structures is delegated to a
//! codec collaborator. Besides whole messages, the engine needs stable
//! encodings of the substructures it signs or digests: the protected
//! part (header plus body), certificates for certHash, and certificate
//! requests for proof-of-possession signatures.

use thiserror::Error;

use crate::body::{Body, CertTemplate, Message};
use crate::header::Header;
use crate::types::Certificate;

/// Codec failures
#[derive(Debug, Error)]
pub enum CodecError {
    /// A structure could not be encoded
    #[error("encoding failed: {0}")]
    Encode(String),

    /// Received bytes could not be decoded
    #[error("decoding failed: {0}")]
    Decode(String),
}

/// Result type of codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Port for encoding and decoding CMP structures
pub trait Codec {
    /// Encode a whole message
    fn encode(&self, msg: &Message) -> CodecResult<Vec<u8>>;

    /// Decode a whole message
    fn decode(&self, bytes: &[u8]) -> CodecResult<Message>;

    /// Deep-copy a message through its wire form
    ///
    /// Semantically encode-then-decode; both endpoints use it to detect
    /// encoding bugs early.
    fn dup(&self, msg: &Message) -> CodecResult<Message> {
        self.decode(&self.encode(msg)?)
    }

    /// Encode the protected part (header and body) that protection is
    /// computed over
    fn encode_protected_part(&self, header: &Header, body: &Body) -> CodecResult<Vec<u8>>;

    /// Encode a certificate, the input of certHash digests
    fn encode_certificate(&self, cert: &Certificate) -> CodecResult<Vec<u8>>;

    /// Decode a certificate recovered from an encrypted value
    fn decode_certificate(&self, bytes: &[u8]) -> CodecResult<Certificate>;

    /// Encode a certificate request (id and template), the input of
    /// proof-of-possession signatures
    fn encode_cert_request(&self, cert_req_id: i64, template: &CertTemplate)
        -> CodecResult<Vec<u8>>;
}
