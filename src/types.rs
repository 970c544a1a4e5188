//! Common types used throughout the cmp-session crate

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CmpError, Result};

/// Identifier of one CMP transaction, unique per open session per party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generate a fresh random 128-bit transaction identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Raw octets of the identifier
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

/// Number of octets in a freshly generated nonce
pub const NONCE_LENGTH: usize = 16;

/// Random octet string carried in message headers, fresh per outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce(Vec<u8>);

impl Nonce {
    /// Generate a fresh 128-bit nonce
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw octets of the nonce
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Shared secret or reference value with secure memory handling
pub struct SecretBytes(secrecy::SecretBox<Vec<u8>>);

impl SecretBytes {
    /// Wrap secret octets
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(secrecy::SecretBox::new(Box::new(bytes)))
    }

    /// Borrow the secret octets
    pub fn expose(&self) -> &[u8] {
        use secrecy::ExposeSecret;
        self.0.expose_secret()
    }
}

impl Clone for SecretBytes {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_vec())
    }
}

impl From<&[u8]> for SecretBytes {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes(***)")
    }
}

/// X.500 distinguished name in RFC 4514 string form, e.g. `CN=device1,O=Example`
///
/// The empty string is the NULL-DN used by unprotected messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistinguishedName(String);

impl DistinguishedName {
    /// Name from its RFC 4514 string form
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The NULL-DN
    pub fn null() -> Self {
        Self(String::new())
    }

    /// Whether this is the NULL-DN
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// String form of the name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("<null-DN>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// GeneralName forms the core distinguishes between
///
/// CMP headers require directoryName senders on the server side; other
/// forms are carried so that the check is expressible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneralName {
    /// X.500 directory name
    Directory(DistinguishedName),
    /// DNS name
    Dns(String),
}

impl GeneralName {
    /// The directory name if this is one
    pub fn as_directory(&self) -> Option<&DistinguishedName> {
        match self {
            GeneralName::Directory(dn) => Some(dn),
            GeneralName::Dns(_) => None,
        }
    }

    /// Directory form of the NULL-DN
    pub fn null_dn() -> Self {
        GeneralName::Directory(DistinguishedName::null())
    }
}

impl fmt::Display for GeneralName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneralName::Directory(dn) => write!(f, "{dn}"),
            GeneralName::Dns(name) => write!(f, "dns:{name}"),
        }
    }
}

/// Key algorithm of a public or private key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// Ed25519 elliptic curve
    Ed25519,
}

/// Public key material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    /// Key algorithm
    pub algorithm: KeyAlgorithm,
    /// Encoded public key octets
    pub bytes: Vec<u8>,
}

/// Private key material, never serialized
#[derive(Debug, Clone)]
pub struct PrivateKey {
    /// Key algorithm
    pub algorithm: KeyAlgorithm,
    /// Secret key octets
    pub bytes: SecretBytes,
}

/// A private key together with its public counterpart
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Secret half
    pub private: PrivateKey,
    /// Public half, placed into certificate request templates
    pub public: PublicKey,
}

/// Certificate model as the transaction engine sees it
///
/// ASN.1 parsing and signature checking live behind the codec and crypto
/// collaborators; the engine works on the already-decoded fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Subject distinguished name
    pub subject: DistinguishedName,
    /// Issuer distinguished name
    pub issuer: DistinguishedName,
    /// Serial number
    pub serial: u64,
    /// Subject key identifier, if the certificate carries one
    pub subject_key_id: Option<Vec<u8>>,
    /// Subject public key
    pub public_key: PublicKey,
}

impl Certificate {
    /// Issuer-and-serial pair identifying this certificate
    pub fn cert_id(&self) -> CertId {
        CertId {
            issuer: self.issuer.clone(),
            serial: self.serial,
        }
    }

    /// Whether subject and issuer coincide
    pub fn is_self_signed(&self) -> bool {
        self.subject == self.issuer
    }
}

/// Issuer name and serial number identifying a certificate (CRMF CertId)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertId {
    /// Issuer distinguished name
    pub issuer: DistinguishedName,
    /// Serial number
    pub serial: u64,
}

/// Encrypted value carrying a certificate for indirect proof of possession
/// (RFC 4210 §5.2.8.2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    /// Key-transport-encrypted symmetric key
    pub enc_symm_key: Vec<u8>,
    /// Payload encrypted under the symmetric key
    pub enc_value: Vec<u8>,
}

/// X.509 extension requested in a certificate template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    /// Extension OID in dotted-decimal form
    pub oid: String,
    /// Criticality flag
    pub critical: bool,
    /// Encoded extension value
    pub value: Vec<u8>,
}

/// One-way function used for message protection and certHash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlg {
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl Default for DigestAlg {
    fn default() -> Self {
        DigestAlg::Sha256
    }
}

/// MAC algorithm for password-based message protection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacAlg {
    /// HMAC with SHA-256
    HmacSha256,
    /// HMAC with SHA-384
    HmacSha384,
    /// HMAC with SHA-512
    HmacSha512,
}

impl Default for MacAlg {
    fn default() -> Self {
        MacAlg::HmacSha256
    }
}

/// Signature algorithm for signature-based message protection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlg {
    /// Ed25519
    Ed25519,
}

impl Default for SignatureAlg {
    fn default() -> Self {
        SignatureAlg::Ed25519
    }
}

/// Protection algorithm announced in a message header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtectionAlg {
    /// Signature by the sender's private key
    Signature {
        /// Signature algorithm
        alg: SignatureAlg,
        /// Digest negotiated alongside the signature
        digest: DigestAlg,
    },
    /// Password-based MAC over a shared secret
    PasswordMac {
        /// One-way function of the MAC scheme
        owf: DigestAlg,
        /// MAC algorithm
        mac: MacAlg,
    },
}

impl ProtectionAlg {
    /// One-way function negotiated by this protection, used for certHash
    pub fn owf(&self) -> DigestAlg {
        match self {
            ProtectionAlg::Signature { digest, .. } => *digest,
            ProtectionAlg::PasswordMac { owf, .. } => *owf,
        }
    }
}

/// Proof-of-possession method selected for certificate requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopoMethod {
    /// No proof of possession
    None,
    /// Signature with the key being certified
    Signature,
    /// Indirect proof via key encipherment
    KeyEnc,
    /// RA asserts it has verified possession
    RaVerified,
}

impl Default for PopoMethod {
    fn default() -> Self {
        PopoMethod::Signature
    }
}

impl TryFrom<i64> for PopoMethod {
    type Error = CmpError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(PopoMethod::None),
            1 => Ok(PopoMethod::Signature),
            2 => Ok(PopoMethod::KeyEnc),
            3 => Ok(PopoMethod::RaVerified),
            other => Err(CmpError::InvalidArgs(format!(
                "unknown POP method {other}"
            ))),
        }
    }
}

/// Reason for certificate revocation (RFC 5280 §5.3.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevocationReason {
    /// Unspecified reason
    Unspecified,
    /// Private key compromised
    KeyCompromise,
    /// CA key compromised
    CaCompromise,
    /// Certificate subject affiliation changed
    AffiliationChanged,
    /// Certificate superseded by a newer one
    Superseded,
    /// No longer needed
    CessationOfOperation,
    /// Certificate on hold
    CertificateHold,
    /// Privilege withdrawn
    PrivilegeWithdrawn,
    /// Attribute authority compromised
    AaCompromise,
}

impl Default for RevocationReason {
    fn default() -> Self {
        RevocationReason::Unspecified
    }
}

impl RevocationReason {
    /// RFC 5280 reason code
    pub fn code(self) -> i64 {
        match self {
            RevocationReason::Unspecified => 0,
            RevocationReason::KeyCompromise => 1,
            RevocationReason::CaCompromise => 2,
            RevocationReason::AffiliationChanged => 3,
            RevocationReason::Superseded => 4,
            RevocationReason::CessationOfOperation => 5,
            RevocationReason::CertificateHold => 6,
            RevocationReason::PrivilegeWithdrawn => 9,
            RevocationReason::AaCompromise => 10,
        }
    }
}

impl TryFrom<i64> for RevocationReason {
    type Error = CmpError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(RevocationReason::Unspecified),
            1 => Ok(RevocationReason::KeyCompromise),
            2 => Ok(RevocationReason::CaCompromise),
            3 => Ok(RevocationReason::AffiliationChanged),
            4 => Ok(RevocationReason::Superseded),
            5 => Ok(RevocationReason::CessationOfOperation),
            6 => Ok(RevocationReason::CertificateHold),
            9 => Ok(RevocationReason::PrivilegeWithdrawn),
            10 => Ok(RevocationReason::AaCompromise),
            other => Err(CmpError::InvalidArgs(format!(
                "unknown revocation reason {other}"
            ))),
        }
    }
}

/// OID of the implicitConfirm generalInfo item (id-it-implicitConfirm)
pub const OID_IMPLICIT_CONFIRM: &str = "1.3.6.1.5.5.7.4.13";

/// InfoTypeAndValue, the extensibility envelope of generalInfo and GENM/GENP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoTypeAndValue {
    /// Info type OID in dotted-decimal form
    pub info_type: String,
    /// Optional value, shape determined by the info type
    pub info_value: Option<serde_json::Value>,
}

impl InfoTypeAndValue {
    /// Item with a type and no value
    pub fn new(info_type: impl Into<String>) -> Self {
        Self {
            info_type: info_type.into(),
            info_value: None,
        }
    }

    /// Item with a type and a value
    pub fn with_value(info_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            info_type: info_type.into(),
            info_value: Some(value),
        }
    }

    /// The implicitConfirm marker item
    pub fn implicit_confirm() -> Self {
        Self::new(OID_IMPLICIT_CONFIRM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_are_unique() {
        assert_ne!(TransactionId::generate(), TransactionId::generate());
    }

    #[test]
    fn test_nonce_length() {
        assert_eq!(Nonce::generate().as_bytes().len(), NONCE_LENGTH);
        assert_ne!(Nonce::generate(), Nonce::generate());
    }

    #[test]
    fn test_secret_bytes_redacts_debug() {
        let secret = SecretBytes::new(b"hunter2".to_vec());
        assert_eq!(format!("{secret:?}"), "SecretBytes(***)");
        assert_eq!(secret.expose(), b"hunter2");
    }

    #[test]
    fn test_null_dn() {
        assert!(DistinguishedName::null().is_null());
        assert!(!DistinguishedName::new("CN=a").is_null());
    }

    #[test]
    fn test_protection_owf() {
        let sig = ProtectionAlg::Signature {
            alg: SignatureAlg::Ed25519,
            digest: DigestAlg::Sha384,
        };
        assert_eq!(sig.owf(), DigestAlg::Sha384);
        let mac = ProtectionAlg::PasswordMac {
            owf: DigestAlg::Sha512,
            mac: MacAlg::HmacSha256,
        };
        assert_eq!(mac.owf(), DigestAlg::Sha512);
    }
}
