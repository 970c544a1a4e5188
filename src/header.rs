//! PKIHeader discipline
//!
//! Transaction identifier and nonce handling for outgoing messages, and
//! the invariant checks applied to replies: same transactionID across a
//! transaction, recipNonce echoing our senderNonce, and pvno 2.
//!
//! Header construction is a free function over the [`HeaderSource`]
//! capability so that both the client context and the server context can
//! use it without one embedding the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::body::Message;
use crate::context::TransactionState;
use crate::error::{CmpError, Result};
use crate::types::{
    GeneralName, InfoTypeAndValue, Nonce, ProtectionAlg, TransactionId, OID_IMPLICIT_CONFIRM,
};

/// CMP protocol version carried in every header
pub const PVNO: u32 = 2;

/// PKIHeader of a CMP message (RFC 4210 §5.1.1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Protocol version, always 2
    pub pvno: u32,
    /// Name of the sending party
    pub sender: GeneralName,
    /// Name of the intended recipient
    pub recipient: GeneralName,
    /// Time of message production
    pub message_time: Option<DateTime<Utc>>,
    /// Protection algorithm, absent on unprotected messages
    pub protection_alg: Option<ProtectionAlg>,
    /// Key identifier of the sender's protection key
    pub sender_kid: Option<Vec<u8>>,
    /// Transaction this message belongs to
    pub transaction_id: TransactionId,
    /// Fresh nonce of this message
    pub sender_nonce: Nonce,
    /// Echo of the peer's last senderNonce, if one was seen
    pub recip_nonce: Option<Nonce>,
    /// generalInfo items, e.g. the implicitConfirm marker
    pub general_info: Vec<InfoTypeAndValue>,
}

impl Header {
    /// Whether the implicitConfirm marker is present in generalInfo
    pub fn has_implicit_confirm(&self) -> bool {
        self.general_info
            .iter()
            .any(|itav| itav.info_type == OID_IMPLICIT_CONFIRM)
    }
}

/// Capability providing the per-party data a header is built from
///
/// Implemented by both the client and the server context.
pub trait HeaderSource {
    /// Transaction id of the session in progress, if one is open
    fn transaction_id(&self) -> Option<TransactionId>;

    /// The peer's last senderNonce, to be echoed as recipNonce
    fn recip_nonce(&self) -> Option<Nonce>;

    /// Sender name derived from the party's credentials
    ///
    /// Subject of the protection certificate for signature protection,
    /// the directoryName form of the reference value for MAC protection,
    /// or the NULL-DN for unprotected messages. Fails with
    /// [`CmpError::MissingSenderIdentity`] when nothing can be derived.
    fn sender(&self) -> Result<GeneralName>;

    /// Recipient name: the configured peer, or a fallback per party
    fn recipient(&self) -> GeneralName;

    /// Sender key identifier: SKI of the protection certificate or the
    /// reference value
    fn sender_kid(&self) -> Option<Vec<u8>>;

    /// Protection algorithm this party will apply to the message
    fn protection_alg(&self) -> Option<ProtectionAlg>;

    /// Whether this party wants the implicitConfirm marker on messages
    /// that may carry it (certificate requests and responses)
    fn implicit_confirm(&self) -> bool;
}

/// Build the header for an outgoing message
///
/// Reuses the open transaction id or generates a fresh 128-bit one, and
/// always generates a fresh senderNonce. The caller records both into
/// its transaction state once the message is actually sent. The
/// implicitConfirm marker is added later by message sealing, since only
/// certificate requests and responses carry it.
pub fn init_header(src: &impl HeaderSource) -> Result<Header> {
    Ok(Header {
        pvno: PVNO,
        sender: src.sender()?,
        recipient: src.recipient(),
        message_time: Some(Utc::now()),
        protection_alg: src.protection_alg(),
        sender_kid: src.sender_kid(),
        transaction_id: src.transaction_id().unwrap_or_else(TransactionId::generate),
        sender_nonce: Nonce::generate(),
        recip_nonce: src.recip_nonce(),
        general_info: Vec::new(),
    })
}

/// Add the implicitConfirm marker to a header under construction
pub fn set_implicit_confirm(header: &mut Header) {
    if !header.has_implicit_confirm() {
        header.general_info.push(InfoTypeAndValue::implicit_confirm());
    }
}

/// Check a reply header against the transaction state
///
/// Enforces that the transactionID is unchanged, that recipNonce echoes
/// the senderNonce of our request, and that pvno is 2. On success the
/// peer's senderNonce is recorded for echoing in our next message
/// (RFC 4210 §5.1.1).
pub fn verify_reply_header(tx: &mut TransactionState, reply: &Message) -> Result<()> {
    let hdr = &reply.header;

    if hdr.pvno != PVNO {
        return Err(CmpError::InvalidArgs(format!(
            "unsupported pvno {} in reply header",
            hdr.pvno
        )));
    }

    if let Some(id) = tx.transaction_id {
        if hdr.transaction_id != id {
            return Err(CmpError::TransactionIdMismatch);
        }
    }

    if let Some(sent) = &tx.sender_nonce {
        if hdr.recip_nonce.as_ref() != Some(sent) {
            return Err(CmpError::NonceMismatch);
        }
    }

    tx.recip_nonce = Some(hdr.sender_nonce.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DistinguishedName;

    struct StubSource {
        transaction_id: Option<TransactionId>,
        recip_nonce: Option<Nonce>,
        sender: Option<GeneralName>,
        implicit_confirm: bool,
    }

    impl Default for StubSource {
        fn default() -> Self {
            Self {
                transaction_id: None,
                recip_nonce: None,
                sender: Some(GeneralName::Directory(DistinguishedName::new("CN=client"))),
                implicit_confirm: false,
            }
        }
    }

    impl HeaderSource for StubSource {
        fn transaction_id(&self) -> Option<TransactionId> {
            self.transaction_id
        }

        fn recip_nonce(&self) -> Option<Nonce> {
            self.recip_nonce.clone()
        }

        fn sender(&self) -> Result<GeneralName> {
            self.sender.clone().ok_or(CmpError::MissingSenderIdentity)
        }

        fn recipient(&self) -> GeneralName {
            GeneralName::null_dn()
        }

        fn sender_kid(&self) -> Option<Vec<u8>> {
            None
        }

        fn protection_alg(&self) -> Option<ProtectionAlg> {
            None
        }

        fn implicit_confirm(&self) -> bool {
            self.implicit_confirm
        }
    }

    #[test]
    fn test_init_header_generates_ids() {
        let hdr = init_header(&StubSource::default()).unwrap();
        assert_eq!(hdr.pvno, PVNO);
        assert!(hdr.recip_nonce.is_none());
        assert!(!hdr.has_implicit_confirm());

        let other = init_header(&StubSource::default()).unwrap();
        assert_ne!(hdr.transaction_id, other.transaction_id);
        assert_ne!(hdr.sender_nonce, other.sender_nonce);
    }

    #[test]
    fn test_init_header_reuses_open_transaction() {
        let id = TransactionId::generate();
        let peer_nonce = Nonce::generate();
        let src = StubSource {
            transaction_id: Some(id),
            recip_nonce: Some(peer_nonce.clone()),
            ..StubSource::default()
        };
        let hdr = init_header(&src).unwrap();
        assert_eq!(hdr.transaction_id, id);
        assert_eq!(hdr.recip_nonce, Some(peer_nonce));
    }

    #[test]
    fn test_set_implicit_confirm_is_idempotent() {
        let mut hdr = init_header(&StubSource::default()).unwrap();
        set_implicit_confirm(&mut hdr);
        set_implicit_confirm(&mut hdr);
        assert!(hdr.has_implicit_confirm());
        assert_eq!(hdr.general_info.len(), 1);
    }

    #[test]
    fn test_init_header_requires_sender() {
        let src = StubSource {
            sender: None,
            ..StubSource::default()
        };
        assert!(matches!(
            init_header(&src),
            Err(CmpError::MissingSenderIdentity)
        ));
    }
}
