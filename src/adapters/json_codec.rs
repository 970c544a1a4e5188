//! JSON wire codec
//!
//! Serde-based codec over the typed message model. Encoding is not DER,
//! but it is a faithful round trip, which is what the engine's
//! encode-then-decode checks exercise. A production deployment plugs a
//! DER codec into the same port.

use crate::body::{Body, CertTemplate, Message};
use crate::header::Header;
use crate::ports::codec::{Codec, CodecError, CodecResult};
use crate::types::Certificate;

/// Codec encoding every structure as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create the codec
    pub fn new() -> Self {
        Self
    }
}

fn encode<T: serde::Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
}

fn decode<T: for<'de> serde::Deserialize<'de>>(bytes: &[u8]) -> CodecResult<T> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

impl Codec for JsonCodec {
    fn encode(&self, msg: &Message) -> CodecResult<Vec<u8>> {
        encode(msg)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Message> {
        decode(bytes)
    }

    fn encode_protected_part(&self, header: &Header, body: &Body) -> CodecResult<Vec<u8>> {
        encode(&(header, body))
    }

    fn encode_certificate(&self, cert: &Certificate) -> CodecResult<Vec<u8>> {
        encode(cert)
    }

    fn decode_certificate(&self, bytes: &[u8]) -> CodecResult<Certificate> {
        decode(bytes)
    }

    fn encode_cert_request(
        &self,
        cert_req_id: i64,
        template: &CertTemplate,
    ) -> CodecResult<Vec<u8>> {
        encode(&(cert_req_id, template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistinguishedName, KeyAlgorithm, PublicKey};

    #[test]
    fn test_certificate_round_trip() {
        let codec = JsonCodec::new();
        let cert = Certificate {
            subject: DistinguishedName::new("CN=device1"),
            issuer: DistinguishedName::new("CN=ca"),
            serial: 7,
            subject_key_id: Some(vec![1, 2, 3]),
            public_key: PublicKey {
                algorithm: KeyAlgorithm::Ed25519,
                bytes: vec![0xaa; 32],
            },
        };
        let bytes = codec.encode_certificate(&cert).unwrap();
        assert_eq!(codec.decode_certificate(&bytes).unwrap(), cert);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = JsonCodec::new();
        assert!(codec.decode(b"not json").is_err());
        assert!(codec.decode_certificate(b"{}").is_err());
    }
}
