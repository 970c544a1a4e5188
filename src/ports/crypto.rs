//! Crypto provider port
//!
//! Signature, MAC, digest, chain building, and key-transport decryption
//! are delegated to a crypto collaborator. The provider is read-only
//! and safe for concurrent readers.

use thiserror::Error;

use crate::types::{
    Certificate, DigestAlg, EncryptedValue, MacAlg, PrivateKey, PublicKey, SecretBytes,
    SignatureAlg,
};

/// Crypto provider failures
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature did not verify
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// MAC did not verify
    #[error("MAC verification failed")]
    MacVerificationFailed,

    /// Key material does not fit the requested algorithm
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// No trust chain could be built
    #[error("cannot build certificate chain: {0}")]
    ChainBuildingFailed(String),

    /// Key-transport decryption failed
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The provider does not implement the requested algorithm
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Result type of crypto operations
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Port for the cryptographic primitives the engine consumes
pub trait CryptoProvider {
    /// Sign `data` with a private key
    fn sign(&self, data: &[u8], key: &PrivateKey, alg: SignatureAlg) -> CryptoResult<Vec<u8>>;

    /// Verify a signature against a bare public key
    fn verify_raw_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        key: &PublicKey,
        alg: SignatureAlg,
    ) -> CryptoResult<()>;

    /// Verify a signature against the public key of `signer`
    fn verify_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        signer: &Certificate,
        alg: SignatureAlg,
    ) -> CryptoResult<()> {
        self.verify_raw_signature(data, signature, &signer.public_key, alg)
    }

    /// Compute a MAC over `data` with a shared secret
    fn mac(&self, data: &[u8], secret: &SecretBytes, alg: MacAlg) -> CryptoResult<Vec<u8>>;

    /// Verify a MAC over `data` with a shared secret
    fn verify_mac(
        &self,
        data: &[u8],
        mac: &[u8],
        secret: &SecretBytes,
        alg: MacAlg,
    ) -> CryptoResult<()> {
        let expected = self.mac(data, secret, alg)?;
        if expected == mac {
            Ok(())
        } else {
            Err(CryptoError::MacVerificationFailed)
        }
    }

    /// Digest `data` under a one-way function
    fn digest(&self, data: &[u8], alg: DigestAlg) -> CryptoResult<Vec<u8>>;

    /// Build a trust chain from `leaf` to one of `roots`
    ///
    /// Returns the chain from the leaf up to and including the root.
    fn build_chain(
        &self,
        leaf: &Certificate,
        intermediates: &[Certificate],
        roots: &[Certificate],
    ) -> CryptoResult<Vec<Certificate>>;

    /// Recover the octets wrapped in an encrypted value with the
    /// recipient's private key
    fn decrypt_key_transport(
        &self,
        enc: &EncryptedValue,
        key: &PrivateKey,
    ) -> CryptoResult<Vec<u8>>;
}
