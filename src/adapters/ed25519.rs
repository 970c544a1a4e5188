//! Ed25519 crypto provider
//!
//! Signature protection and proof of possession via ed25519-dalek,
//! password-based MAC via ring's HMAC, digests via sha2, and name-link
//! chain building over the decoded certificate model. Key-transport
//! decryption is not available for Ed25519 keys.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use ring::hmac;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::ports::crypto::{CryptoError, CryptoProvider, CryptoResult};
use crate::types::{
    Certificate, DigestAlg, DistinguishedName, EncryptedValue, KeyAlgorithm, KeyPair, MacAlg,
    PrivateKey, PublicKey, SecretBytes, SignatureAlg,
};

/// Longest accepted issuer chain
const MAX_CHAIN_DEPTH: usize = 8;

/// Crypto provider over ed25519-dalek, ring HMAC, and sha2
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Crypto;

impl Ed25519Crypto {
    /// Create the provider
    pub fn new() -> Self {
        Self
    }
}

fn signing_key(key: &PrivateKey) -> CryptoResult<SigningKey> {
    if key.algorithm != KeyAlgorithm::Ed25519 {
        return Err(CryptoError::InvalidKey(format!(
            "expected an Ed25519 key, got {:?}",
            key.algorithm
        )));
    }
    let seed: [u8; 32] = key
        .bytes
        .expose()
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("Ed25519 seed must be 32 octets".into()))?;
    Ok(SigningKey::from_bytes(&seed))
}

fn verifying_key(key: &PublicKey) -> CryptoResult<VerifyingKey> {
    let bytes: [u8; 32] = key
        .bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("Ed25519 public key must be 32 octets".into()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| CryptoError::InvalidKey(format!("not a valid Ed25519 point: {e}")))
}

fn hmac_algorithm(alg: MacAlg) -> hmac::Algorithm {
    match alg {
        MacAlg::HmacSha256 => hmac::HMAC_SHA256,
        MacAlg::HmacSha384 => hmac::HMAC_SHA384,
        MacAlg::HmacSha512 => hmac::HMAC_SHA512,
    }
}

impl CryptoProvider for Ed25519Crypto {
    fn sign(&self, data: &[u8], key: &PrivateKey, alg: SignatureAlg) -> CryptoResult<Vec<u8>> {
        let SignatureAlg::Ed25519 = alg;
        Ok(signing_key(key)?.sign(data).to_bytes().to_vec())
    }

    fn verify_raw_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        key: &PublicKey,
        alg: SignatureAlg,
    ) -> CryptoResult<()> {
        let SignatureAlg::Ed25519 = alg;
        let sig_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| CryptoError::SignatureVerificationFailed)?;
        verifying_key(key)?
            .verify(data, &Signature::from_bytes(&sig_bytes))
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    fn mac(&self, data: &[u8], secret: &SecretBytes, alg: MacAlg) -> CryptoResult<Vec<u8>> {
        let key = hmac::Key::new(hmac_algorithm(alg), secret.expose());
        Ok(hmac::sign(&key, data).as_ref().to_vec())
    }

    fn verify_mac(
        &self,
        data: &[u8],
        mac: &[u8],
        secret: &SecretBytes,
        alg: MacAlg,
    ) -> CryptoResult<()> {
        let key = hmac::Key::new(hmac_algorithm(alg), secret.expose());
        hmac::verify(&key, data, mac).map_err(|_| CryptoError::MacVerificationFailed)
    }

    fn digest(&self, data: &[u8], alg: DigestAlg) -> CryptoResult<Vec<u8>> {
        Ok(match alg {
            DigestAlg::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlg::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlg::Sha512 => Sha512::digest(data).to_vec(),
        })
    }

    fn build_chain(
        &self,
        leaf: &Certificate,
        intermediates: &[Certificate],
        roots: &[Certificate],
    ) -> CryptoResult<Vec<Certificate>> {
        let mut chain = vec![leaf.clone()];
        let mut current = leaf.clone();

        for _ in 0..MAX_CHAIN_DEPTH {
            if roots.iter().any(|r| *r == current) {
                return Ok(chain);
            }
            if let Some(root) = roots.iter().find(|r| r.subject == current.issuer) {
                chain.push(root.clone());
                return Ok(chain);
            }
            match intermediates
                .iter()
                .find(|c| c.subject == current.issuer && !chain.contains(c))
            {
                Some(issuer) => {
                    chain.push(issuer.clone());
                    current = issuer.clone();
                }
                None => break,
            }
        }

        Err(CryptoError::ChainBuildingFailed(format!(
            "no path from {} to a trust anchor",
            leaf.subject
        )))
    }

    fn decrypt_key_transport(
        &self,
        _enc: &EncryptedValue,
        _key: &PrivateKey,
    ) -> CryptoResult<Vec<u8>> {
        Err(CryptoError::UnsupportedAlgorithm(
            "Ed25519 keys cannot decrypt key-transport values".into(),
        ))
    }
}

/// A certificate and its matching private key, for wiring up endpoints
/// and test fixtures
#[derive(Debug, Clone)]
pub struct Identity {
    /// The certificate
    pub cert: Certificate,
    /// Private key matching the certificate's public key
    pub key: PrivateKey,
}

impl Identity {
    /// Generate an identity with a fresh Ed25519 key
    pub fn generate(subject: &str, issuer: &str, serial: u64) -> Self {
        let sk = SigningKey::generate(&mut OsRng);
        let public = PublicKey {
            algorithm: KeyAlgorithm::Ed25519,
            bytes: sk.verifying_key().to_bytes().to_vec(),
        };
        // SKI is the SHA-256 of the public key, truncated to 20 octets
        let ski = Sha256::digest(&public.bytes)[..20].to_vec();
        Identity {
            cert: Certificate {
                subject: DistinguishedName::new(subject),
                issuer: DistinguishedName::new(issuer),
                serial,
                subject_key_id: Some(ski),
                public_key: public,
            },
            key: PrivateKey {
                algorithm: KeyAlgorithm::Ed25519,
                bytes: SecretBytes::new(sk.to_bytes().to_vec()),
            },
        }
    }

    /// Generate a self-signed identity
    pub fn self_signed(subject: &str, serial: u64) -> Self {
        Self::generate(subject, subject, serial)
    }

    /// The identity's key pair, e.g. as the key a certificate is
    /// requested for
    pub fn key_pair(&self) -> KeyPair {
        KeyPair {
            private: self.key.clone(),
            public: self.cert.public_key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_round_trip() {
        let crypto = Ed25519Crypto::new();
        let id = Identity::self_signed("CN=signer", 1);
        let sig = crypto
            .sign(b"payload", &id.key, SignatureAlg::Ed25519)
            .unwrap();
        assert!(crypto
            .verify_raw_signature(b"payload", &sig, &id.cert.public_key, SignatureAlg::Ed25519)
            .is_ok());
        assert!(crypto
            .verify_raw_signature(b"tampered", &sig, &id.cert.public_key, SignatureAlg::Ed25519)
            .is_err());
    }

    #[test]
    fn test_mac_round_trip() {
        let crypto = Ed25519Crypto::new();
        let secret = SecretBytes::new(b"shared".to_vec());
        let tag = crypto.mac(b"payload", &secret, MacAlg::HmacSha256).unwrap();
        assert!(crypto
            .verify_mac(b"payload", &tag, &secret, MacAlg::HmacSha256)
            .is_ok());
        assert!(crypto
            .verify_mac(b"payload", &tag, &SecretBytes::new(b"other".to_vec()), MacAlg::HmacSha256)
            .is_err());
    }

    #[test]
    fn test_digest_lengths() {
        let crypto = Ed25519Crypto::new();
        assert_eq!(crypto.digest(b"x", DigestAlg::Sha256).unwrap().len(), 32);
        assert_eq!(crypto.digest(b"x", DigestAlg::Sha384).unwrap().len(), 48);
        assert_eq!(crypto.digest(b"x", DigestAlg::Sha512).unwrap().len(), 64);
    }

    #[test]
    fn test_chain_building() {
        let crypto = Ed25519Crypto::new();
        let root = Identity::self_signed("CN=root", 1);
        let inter = Identity::generate("CN=inter", "CN=root", 2);
        let leaf = Identity::generate("CN=leaf", "CN=inter", 3);

        let chain = crypto
            .build_chain(&leaf.cert, &[inter.cert.clone()], &[root.cert.clone()])
            .unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[2].subject, DistinguishedName::new("CN=root"));

        assert!(crypto.build_chain(&leaf.cert, &[], &[root.cert]).is_err());
    }
}
