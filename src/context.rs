//! Client and server contexts
//!
//! Per-party configuration and the cross-message state of the
//! transaction in flight: transaction id, the nonce pair, the last
//! received status, and response-derived certificates. One context
//! drives one transaction at a time; concurrent transactions use
//! distinct contexts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::body::{CertificationRequest, Message};
use crate::config::{ClientOptions, ServerOptions};
use crate::error::{CmpError, Result};
use crate::header::HeaderSource;
use crate::protect::{ProtectionExpectations, ProtectionSource};
use crate::status::{FailureInfo, PkiStatus, PkiStatusInfo};
use crate::types::{
    Certificate, DistinguishedName, Extension, GeneralName, KeyPair, Nonce, PrivateKey,
    ProtectionAlg, SecretBytes, SignatureAlg, TransactionId,
};

/// Per-transaction header state shared by both parties
#[derive(Debug, Clone, Default)]
pub struct TransactionState {
    /// Identifier of the open transaction
    pub transaction_id: Option<TransactionId>,
    /// Last nonce we sent, to be echoed by the peer
    pub sender_nonce: Option<Nonce>,
    /// The peer's last senderNonce, echoed in our next message
    pub recip_nonce: Option<Nonce>,
}

impl TransactionState {
    /// Forget the transaction, per the termination discipline
    pub fn clear(&mut self) {
        *self = TransactionState::default();
    }
}

/// Handle for cancelling a blocked session from another thread
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation; the session returns `Cancelled` at its
    /// next suspension point
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Verdict of a certificate-confirmation callback
pub type CertConfVerdict = std::result::Result<(), (FailureInfo, String)>;

/// Callback consulted before confirming a newly issued certificate
pub type CertConfCallback = Box<dyn Fn(&Certificate) -> CertConfVerdict + Send>;

/// Client-side per-party configuration and transaction state
#[derive(Default)]
pub struct ClientContext {
    // Own identity
    /// Certificate used for signature protection
    pub client_cert: Option<Certificate>,
    /// Private key matching `client_cert`
    pub private_key: Option<PrivateKey>,
    /// Reference value identifying us under MAC protection
    pub reference: Option<Vec<u8>>,
    /// Shared secret for MAC protection
    pub secret: Option<SecretBytes>,

    // Peer
    /// Expected sender name of replies, used as recipient
    pub expected_sender: Option<DistinguishedName>,
    /// Trust anchors for verifying reply protection
    pub trusted: Vec<Certificate>,
    /// Untrusted intermediates for chain building
    pub untrusted: Vec<Certificate>,
    /// Pinned server certificate, trusted as-is
    pub server_cert: Option<Certificate>,
    /// Additional certificates to ship in extraCerts
    pub extra_certs_out: Vec<Certificate>,

    // Request template
    /// Key pair the certificate is requested for
    pub new_key: Option<KeyPair>,
    /// Requested subject name
    pub subject: Option<DistinguishedName>,
    /// Requested issuer name
    pub issuer: Option<DistinguishedName>,
    /// Requested subject alternative names
    pub subject_alt_names: Vec<String>,
    /// Requested certificate policies
    pub policies: Vec<String>,
    /// Further requested extensions
    pub extensions: Vec<Extension>,
    /// Certificate to update (KUR) or revoke (RR)
    pub old_cert: Option<Certificate>,
    /// PKCS#10 request for P10CR
    pub csr: Option<CertificationRequest>,

    // Transaction results
    /// Status of the last response seen
    pub last_status: Option<PkiStatusInfo>,
    /// Certificate issued by the last successful transaction
    pub new_cert: Option<Certificate>,
    /// CA certificates published by the server
    pub ca_pubs: Vec<Certificate>,
    /// extraCerts received from the server
    pub extra_certs_in: Vec<Certificate>,

    /// Behavior options
    pub options: ClientOptions,

    /// Veto callback for certificate confirmation
    pub cert_conf_cb: Option<CertConfCallback>,

    pub(crate) tx: TransactionState,
    pub(crate) in_flight: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl ClientContext {
    /// Create an empty context with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-transaction state while preserving configuration
    pub fn reinit(&mut self) {
        self.tx.clear();
        self.in_flight = false;
        self.last_status = None;
        self.new_cert = None;
        self.ca_pubs.clear();
        self.extra_certs_in.clear();
        if let Some(flag) = &self.cancel {
            flag.store(false, Ordering::SeqCst);
        }
    }

    /// Handle for cancelling a session running on this context
    pub fn cancel_handle(&mut self) -> CancelHandle {
        let flag = self
            .cancel
            .get_or_insert_with(|| Arc::new(AtomicBool::new(false)));
        CancelHandle(Arc::clone(flag))
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Record the header of a message we are about to send
    pub(crate) fn record_outgoing(&mut self, header: &crate::header::Header) {
        self.tx.transaction_id = Some(header.transaction_id);
        self.tx.sender_nonce = Some(header.sender_nonce.clone());
    }

    pub(crate) fn protection_expectations(&self) -> ProtectionExpectations<'_> {
        ProtectionExpectations {
            unprotected_errors: self.options.unprotected_errors,
            accept_unprotected: false,
            secret: self.secret.as_ref(),
            pinned_cert: self.server_cert.as_ref(),
            trusted: &self.trusted,
            untrusted: &self.untrusted,
            permit_ta_in_extra_certs: self.options.permit_ta_in_extracerts_for_ir,
        }
    }
}

/// Directory name derived from a MAC reference value
fn reference_dn(reference: &[u8]) -> DistinguishedName {
    DistinguishedName::new(format!("CN={}", hex::encode(reference)))
}

/// Sender name per protection mode: certificate subject for signature,
/// reference value for MAC, NULL-DN for unprotected
fn derive_sender(
    protection: Option<ProtectionAlg>,
    cert: Option<&Certificate>,
    subject: Option<&DistinguishedName>,
    reference: Option<&[u8]>,
) -> Result<GeneralName> {
    let dn = match protection {
        None => return Ok(GeneralName::null_dn()),
        Some(ProtectionAlg::Signature { .. }) => cert
            .map(|c| c.subject.clone())
            .or_else(|| subject.cloned())
            .or_else(|| reference.map(reference_dn)),
        Some(ProtectionAlg::PasswordMac { .. }) => reference
            .map(reference_dn)
            .or_else(|| cert.map(|c| c.subject.clone()))
            .or_else(|| subject.cloned()),
    };
    dn.map(GeneralName::Directory)
        .ok_or(CmpError::MissingSenderIdentity)
}

impl HeaderSource for ClientContext {
    fn transaction_id(&self) -> Option<TransactionId> {
        self.tx.transaction_id
    }

    fn recip_nonce(&self) -> Option<Nonce> {
        self.tx.recip_nonce.clone()
    }

    fn sender(&self) -> Result<GeneralName> {
        derive_sender(
            self.protection_alg(),
            self.client_cert.as_ref(),
            self.subject.as_ref(),
            self.reference.as_deref(),
        )
    }

    fn recipient(&self) -> GeneralName {
        if let Some(name) = &self.expected_sender {
            return GeneralName::Directory(name.clone());
        }
        if let Some(cert) = &self.client_cert {
            return GeneralName::Directory(cert.issuer.clone());
        }
        GeneralName::null_dn()
    }

    fn sender_kid(&self) -> Option<Vec<u8>> {
        match self.protection_alg() {
            Some(ProtectionAlg::Signature { .. }) => self
                .client_cert
                .as_ref()
                .and_then(|c| c.subject_key_id.clone()),
            Some(ProtectionAlg::PasswordMac { .. }) => self.reference.clone(),
            None => None,
        }
    }

    fn protection_alg(&self) -> Option<ProtectionAlg> {
        if self.options.unprotected_send {
            return None;
        }
        if self.secret.is_some() {
            return Some(ProtectionAlg::PasswordMac {
                owf: self.options.owf_alg,
                mac: self.options.mac_alg,
            });
        }
        if self.private_key.is_some() && self.client_cert.is_some() {
            return Some(ProtectionAlg::Signature {
                alg: SignatureAlg::default(),
                digest: self.options.digest_alg,
            });
        }
        None
    }

    fn implicit_confirm(&self) -> bool {
        self.options.implicit_confirm
    }
}

impl ProtectionSource for ClientContext {
    fn signing_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    fn mac_secret(&self) -> Option<&SecretBytes> {
        self.secret.as_ref()
    }

    fn extra_certs_out(&self) -> Vec<Certificate> {
        let mut certs = Vec::new();
        if let Some(cert) = &self.client_cert {
            certs.push(cert.clone());
        }
        certs.extend(self.extra_certs_out.iter().cloned());
        certs
    }
}

/// Server-side per-party configuration and transaction state
#[derive(Default)]
pub struct ServerContext {
    // Issuing identity
    /// Certificate used for signature protection of responses
    pub server_cert: Option<Certificate>,
    /// Private key matching `server_cert`
    pub private_key: Option<PrivateKey>,
    /// Reference value identifying us under MAC protection
    pub reference: Option<Vec<u8>>,
    /// Shared secret for MAC protection
    pub secret: Option<SecretBytes>,

    /// Trust anchors for verifying request protection
    pub trusted: Vec<Certificate>,
    /// Untrusted intermediates for chain building
    pub untrusted: Vec<Certificate>,
    /// Additional certificates to ship in extraCerts
    pub extra_certs_out: Vec<Certificate>,

    // Canned response material
    /// Certificate returned in ip/cp/kup
    pub cert_out: Option<Certificate>,
    /// Chain of `cert_out`, shipped in extraCerts
    pub chain_out: Vec<Certificate>,
    /// caPubs published in ip
    pub ca_pubs_out: Vec<Certificate>,
    /// Status placed into responses
    pub status_out: PkiStatusInfo,

    /// Behavior options
    pub options: ServerOptions,

    pub(crate) tx: TransactionState,
    pub(crate) peer: Option<GeneralName>,
    pub(crate) pending: Option<Message>,
    pub(crate) cert_req_id: Option<i64>,
    pub(crate) grant_implicit: bool,
}

impl ServerContext {
    /// Create an empty context answering `accepted` with default options
    pub fn new() -> Self {
        Self {
            status_out: PkiStatusInfo::new(PkiStatus::Accepted),
            ..Self::default()
        }
    }

    /// Clear per-transaction state while preserving configuration
    pub fn reinit(&mut self) {
        self.tx.clear();
        self.peer = None;
        self.pending = None;
        self.cert_req_id = None;
        self.grant_implicit = false;
    }

    pub(crate) fn protection_expectations(&self) -> ProtectionExpectations<'_> {
        ProtectionExpectations {
            unprotected_errors: false,
            accept_unprotected: self.options.accept_unprotected_requests,
            secret: self.secret.as_ref(),
            pinned_cert: None,
            trusted: &self.trusted,
            untrusted: &self.untrusted,
            permit_ta_in_extra_certs: false,
        }
    }
}

impl HeaderSource for ServerContext {
    fn transaction_id(&self) -> Option<TransactionId> {
        self.tx.transaction_id
    }

    fn recip_nonce(&self) -> Option<Nonce> {
        self.tx.recip_nonce.clone()
    }

    fn sender(&self) -> Result<GeneralName> {
        derive_sender(
            self.protection_alg(),
            self.server_cert.as_ref(),
            None,
            self.reference.as_deref(),
        )
    }

    fn recipient(&self) -> GeneralName {
        self.peer.clone().unwrap_or_else(GeneralName::null_dn)
    }

    fn sender_kid(&self) -> Option<Vec<u8>> {
        match self.protection_alg() {
            Some(ProtectionAlg::Signature { .. }) => self
                .server_cert
                .as_ref()
                .and_then(|c| c.subject_key_id.clone()),
            Some(ProtectionAlg::PasswordMac { .. }) => self.reference.clone(),
            None => None,
        }
    }

    fn protection_alg(&self) -> Option<ProtectionAlg> {
        if self.secret.is_some() {
            return Some(ProtectionAlg::PasswordMac {
                owf: self.options.owf_alg,
                mac: self.options.mac_alg,
            });
        }
        if self.private_key.is_some() && self.server_cert.is_some() {
            return Some(ProtectionAlg::Signature {
                alg: SignatureAlg::default(),
                digest: self.options.digest_alg,
            });
        }
        None
    }

    fn implicit_confirm(&self) -> bool {
        self.grant_implicit
    }
}

impl ProtectionSource for ServerContext {
    fn signing_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    fn mac_secret(&self) -> Option<&SecretBytes> {
        self.secret.as_ref()
    }

    fn extra_certs_out(&self) -> Vec<Certificate> {
        let mut certs = Vec::new();
        if let Some(cert) = &self.server_cert {
            certs.push(cert.clone());
        }
        certs.extend(self.chain_out.iter().cloned());
        certs.extend(self.extra_certs_out.iter().cloned());
        certs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DigestAlg, KeyAlgorithm, MacAlg, PublicKey};

    fn test_cert(subject: &str, issuer: &str) -> Certificate {
        Certificate {
            subject: DistinguishedName::new(subject),
            issuer: DistinguishedName::new(issuer),
            serial: 1,
            subject_key_id: Some(vec![0x11; 20]),
            public_key: PublicKey {
                algorithm: KeyAlgorithm::Ed25519,
                bytes: vec![0; 32],
            },
        }
    }

    #[test]
    fn test_client_protection_mode_preference() {
        let mut ctx = ClientContext::new();
        assert_eq!(ctx.protection_alg(), None);

        ctx.secret = Some(SecretBytes::new(b"secret".to_vec()));
        assert!(matches!(
            ctx.protection_alg(),
            Some(ProtectionAlg::PasswordMac {
                owf: DigestAlg::Sha256,
                mac: MacAlg::HmacSha256,
            })
        ));

        ctx.options.unprotected_send = true;
        assert_eq!(ctx.protection_alg(), None);
    }

    #[test]
    fn test_client_sender_derivation() {
        let mut ctx = ClientContext::new();
        ctx.secret = Some(SecretBytes::new(b"secret".to_vec()));
        // MAC protection without a reference value falls back to nothing
        assert!(matches!(
            ctx.sender(),
            Err(CmpError::MissingSenderIdentity)
        ));

        ctx.reference = Some(vec![0xab, 0xcd]);
        let sender = ctx.sender().unwrap();
        assert_eq!(
            sender.as_directory().unwrap().as_str(),
            "CN=abcd"
        );

        // unprotected messages carry the NULL-DN
        ctx.options.unprotected_send = true;
        assert!(ctx.sender().unwrap().as_directory().unwrap().is_null());
    }

    #[test]
    fn test_client_recipient_fallback() {
        let mut ctx = ClientContext::new();
        assert!(ctx.recipient().as_directory().unwrap().is_null());

        ctx.client_cert = Some(test_cert("CN=client", "CN=ca"));
        assert_eq!(ctx.recipient().as_directory().unwrap().as_str(), "CN=ca");

        ctx.expected_sender = Some(DistinguishedName::new("CN=server"));
        assert_eq!(
            ctx.recipient().as_directory().unwrap().as_str(),
            "CN=server"
        );
    }

    #[test]
    fn test_reinit_clears_transaction_state() {
        let mut ctx = ClientContext::new();
        ctx.tx.transaction_id = Some(TransactionId::generate());
        ctx.tx.sender_nonce = Some(Nonce::generate());
        ctx.last_status = Some(PkiStatusInfo::new(PkiStatus::Rejection));
        ctx.new_cert = Some(test_cert("CN=client", "CN=ca"));
        ctx.options.implicit_confirm = true;

        ctx.reinit();
        assert!(ctx.tx.transaction_id.is_none());
        assert!(ctx.tx.sender_nonce.is_none());
        assert!(ctx.last_status.is_none());
        assert!(ctx.new_cert.is_none());
        // configuration survives
        assert!(ctx.options.implicit_confirm);
    }

    #[test]
    fn test_cancel_handle() {
        let mut ctx = ClientContext::new();
        let handle = ctx.cancel_handle();
        assert!(!ctx.is_cancelled());
        handle.cancel();
        assert!(ctx.is_cancelled());
        ctx.reinit();
        assert!(!ctx.is_cancelled());
    }
}
