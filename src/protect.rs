//! Message protection policy
//!
//! Applies signature or MAC protection to outgoing messages and decides
//! for incoming ones whether missing protection is tolerated or the
//! protection must verify against a discovered signer certificate or the
//! shared secret.

use tracing::{debug, warn};

use crate::body::{Body, BodyKind, Message};
use crate::error::{CmpError, Result};
use crate::header::{self, HeaderSource};
use crate::ports::codec::Codec;
use crate::ports::crypto::CryptoProvider;
use crate::status::PkiStatus;
use crate::types::{Certificate, ProtectionAlg, PrivateKey, SecretBytes};

/// Capability providing the credentials protection is computed with
///
/// Implemented by both the client and the server context, alongside
/// [`HeaderSource`].
pub trait ProtectionSource {
    /// Private key for signature protection
    fn signing_key(&self) -> Option<&PrivateKey>;

    /// Shared secret for MAC protection
    fn mac_secret(&self) -> Option<&SecretBytes>;

    /// Certificates to ship in extraCerts so the peer can verify our
    /// signature protection: own certificate first, then its chain
    fn extra_certs_out(&self) -> Vec<Certificate>;
}

/// Build a complete message: header, body, and protection
///
/// `unprotected` forces the message out without protection regardless of
/// available credentials.
pub fn seal<S: HeaderSource + ProtectionSource>(
    src: &S,
    body: Body,
    unprotected: bool,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let mut header = header::init_header(src)?;
    if unprotected {
        header.protection_alg = None;
    }

    // only certificate requests and responses may signal implicitConfirm
    let confirm_eligible = matches!(
        body.kind(),
        BodyKind::Ir | BodyKind::Cr | BodyKind::P10cr | BodyKind::Kur
            | BodyKind::Ip | BodyKind::Cp | BodyKind::Kup
    );
    if confirm_eligible && src.implicit_confirm() {
        header::set_implicit_confirm(&mut header);
    }

    let (protection, extra_certs) = match header.protection_alg {
        None => (None, Vec::new()),
        Some(ProtectionAlg::Signature { alg, .. }) => {
            let key = src
                .signing_key()
                .ok_or(CmpError::NullArgument("protection key"))?;
            let data = codec.encode_protected_part(&header, &body)?;
            let sig = crypto.sign(&data, key, alg).map_err(CmpError::internal)?;
            (Some(sig), src.extra_certs_out())
        }
        Some(ProtectionAlg::PasswordMac { mac, .. }) => {
            let secret = src
                .mac_secret()
                .ok_or(CmpError::NullArgument("shared secret"))?;
            let data = codec.encode_protected_part(&header, &body)?;
            let tag = crypto.mac(&data, secret, mac).map_err(CmpError::internal)?;
            (Some(tag), Vec::new())
        }
    };

    Ok(Message {
        header,
        body,
        protection,
        extra_certs,
    })
}

/// What the receiving party brings to protection validation
pub struct ProtectionExpectations<'a> {
    /// Tolerate unprotected error-ish messages (client and server option)
    pub unprotected_errors: bool,
    /// Tolerate any unprotected request (server option)
    pub accept_unprotected: bool,
    /// Shared secret for MAC-protected peers
    pub secret: Option<&'a SecretBytes>,
    /// Pinned peer certificate, trusted as-is
    pub pinned_cert: Option<&'a Certificate>,
    /// Trust anchors
    pub trusted: &'a [Certificate],
    /// Untrusted intermediates
    pub untrusted: &'a [Certificate],
    /// Accept a trust anchor from extraCerts for initialization
    /// responses (`permitTAInExtraCertsForIR`)
    pub permit_ta_in_extra_certs: bool,
}

/// Validate the protection of a received message
///
/// Unprotected messages pass only through the tolerated exceptions;
/// everything else must verify via the crypto provider using the signer
/// certificate discovered from extraCerts, the trust store, or the
/// pinned certificate.
pub fn validate_incoming(
    msg: &Message,
    exp: &ProtectionExpectations<'_>,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<()> {
    let Some(alg) = &msg.header.protection_alg else {
        if unprotected_exception(msg, exp) {
            return Ok(());
        }
        return Err(CmpError::ProtectionInvalid(
            "message is not protected".into(),
        ));
    };

    let protection = msg.protection.as_ref().ok_or_else(|| {
        CmpError::ProtectionInvalid("protectionAlg present but protection missing".into())
    })?;
    let data = codec.encode_protected_part(&msg.header, &msg.body)?;

    match alg {
        ProtectionAlg::PasswordMac { mac, .. } => {
            let secret = exp.secret.ok_or_else(|| {
                CmpError::ProtectionInvalid("MAC-protected message but no shared secret".into())
            })?;
            crypto
                .verify_mac(&data, protection, secret, *mac)
                .map_err(|e| CmpError::ProtectionInvalid(e.to_string()))?;
        }
        ProtectionAlg::Signature { alg, .. } => {
            let signer = find_signer(msg, exp)?;
            crypto
                .verify_signature(&data, protection, signer, *alg)
                .map_err(|e| CmpError::ProtectionInvalid(e.to_string()))?;
            ensure_signer_trusted(signer, msg, exp, crypto)?;
        }
    }
    debug!(body = %msg.body.kind(), "message protection verified");
    Ok(())
}

/// Whether an unprotected message falls under a tolerated exception
fn unprotected_exception(msg: &Message, exp: &ProtectionExpectations<'_>) -> bool {
    if exp.accept_unprotected {
        warn!(
            body = %msg.body.kind(),
            "ignoring missing protection of request message"
        );
        return true;
    }
    if !exp.unprotected_errors {
        return false;
    }
    let tolerated = match &msg.body {
        Body::Error(_) => true,
        Body::PkiConf => true,
        Body::Rp(rp) => rp
            .statuses
            .first()
            .is_some_and(|si| si.status == PkiStatus::Rejection),
        Body::Ip(rep) | Body::Cp(rep) | Body::Kup(rep) => rep
            .responses
            .first()
            .is_some_and(|r| r.status.status == PkiStatus::Rejection),
        _ => false,
    };
    if tolerated {
        warn!(
            body = %msg.body.kind(),
            "ignoring missing protection of error-signalling message"
        );
    }
    tolerated
}

/// Locate the certificate the protection signature should verify under
fn find_signer<'a>(
    msg: &'a Message,
    exp: &ProtectionExpectations<'a>,
) -> Result<&'a Certificate> {
    if let Some(pinned) = exp.pinned_cert {
        return Ok(pinned);
    }

    let sender_dn = msg.header.sender.as_directory();
    let by_sender = |cert: &&Certificate| {
        if let Some(kid) = &msg.header.sender_kid {
            if cert.subject_key_id.as_ref() == Some(kid) {
                return true;
            }
        }
        sender_dn.is_some_and(|dn| &cert.subject == dn)
    };

    msg.extra_certs
        .iter()
        .find(by_sender)
        .or_else(|| exp.trusted.iter().find(by_sender))
        .ok_or_else(|| {
            CmpError::ProtectionInvalid(format!(
                "no candidate signer certificate for sender {}",
                msg.header.sender
            ))
        })
}

/// Require a trust path from the signer to an anchor
fn ensure_signer_trusted(
    signer: &Certificate,
    msg: &Message,
    exp: &ProtectionExpectations<'_>,
    crypto: &dyn CryptoProvider,
) -> Result<()> {
    if exp.pinned_cert.is_some_and(|p| p == signer) {
        return Ok(());
    }
    if exp.trusted.iter().any(|c| c == signer) {
        return Ok(());
    }

    let mut intermediates: Vec<Certificate> = exp.untrusted.to_vec();
    intermediates.extend(msg.extra_certs.iter().cloned());

    let mut roots: Vec<Certificate> = exp.trusted.to_vec();
    if exp.permit_ta_in_extra_certs && msg.body.kind() == BodyKind::Ip {
        roots.extend(msg.extra_certs.iter().cloned());
    }

    crypto
        .build_chain(signer, &intermediates, &roots)
        .map(|_| ())
        .map_err(|e| CmpError::ProtectionInvalid(e.to_string()))
}
