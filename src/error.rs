//! Error types for CMP transaction processing

use thiserror::Error;

use crate::ports::codec::CodecError;
use crate::ports::crypto::CryptoError;
use crate::ports::transport::TransportError;
use crate::status::{FailureBit, FailureInfo, PkiStatus};

/// Result type alias for CMP operations
pub type Result<T> = std::result::Result<T, CmpError>;

/// Main error type for CMP client sessions and server dispatch
#[derive(Error, Debug)]
pub enum CmpError {
    /// A required context datum is missing
    #[error("required argument missing: {0}")]
    NullArgument(&'static str),

    /// An argument or option combination is invalid
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// A PKIStatus integer or name could not be decoded
    #[error("cannot parse PKIStatus: {0}")]
    ParsePkiStatus(String),

    /// Neither a reference value nor a subject name is available as sender
    #[error("no sender identity: neither reference value nor subject available")]
    MissingSenderIdentity,

    /// The reply's recipNonce does not echo our senderNonce
    #[error("sender and recipient nonces do not match")]
    NonceMismatch,

    /// The reply carries a different transactionID than the session
    #[error("transactionID of reply does not match the session")]
    TransactionIdMismatch,

    /// A second certificate request arrived while one is pending
    #[error("transactionID is already in use by a pending request")]
    TransactionIdInUse,

    /// Message protection is missing or failed verification
    #[error("error validating protection: {0}")]
    ProtectionInvalid(String),

    /// The reply body is not of the expected kind
    #[error("unexpected body: expected {expected}, got {got}")]
    UnexpectedBody {
        /// Body kind the session was waiting for
        expected: &'static str,
        /// What actually arrived, including error details if any
        got: String,
    },

    /// The reply carries a PKIStatus the session cannot act on
    #[error("unexpected PKIStatus: {0}")]
    UnexpectedStatus(PkiStatus),

    /// certReqId of a response or confirmation differs from the request
    #[error("unexpected certReqId: expected {expected}, got {got}")]
    UnexpectedRequestId {
        /// Id the transaction was opened with
        expected: i64,
        /// Id found in the message
        got: i64,
    },

    /// The certHash in a certConf does not match the issued certificate
    #[error("certHash does not match the issued certificate")]
    WrongCertHash,

    /// Proof of possession could not be verified
    #[error("proof of possession verification failed")]
    PopVerifyFailed,

    /// The polling budget was exhausted before a final response arrived
    #[error("total timeout reached while polling for a response")]
    PollTimeout,

    /// No PKIConf arrived in answer to a certConf
    #[error("PKIConf not received: {0}")]
    PkiConfNotReceived(String),

    /// Wire encoding or decoding failed
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The transport could not complete a round trip
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A revocation request was refused by the server
    #[error("revocation request not accepted")]
    RequestNotAccepted,

    /// The request sender is not a directoryName
    #[error("sender GeneralName type is not supported")]
    SenderTypeUnsupported,

    /// The session was cancelled by the caller
    #[error("session cancelled")]
    Cancelled,

    /// A condition that indicates a bug or a broken collaborator
    #[error("internal error: {0}")]
    InternalError(String),
}

impl CmpError {
    /// Wrap a crypto collaborator failure as an internal error.
    ///
    /// Used where a crypto failure does not map to a protocol-level
    /// condition such as [`CmpError::ProtectionInvalid`].
    pub(crate) fn internal(err: CryptoError) -> Self {
        CmpError::InternalError(err.to_string())
    }

    /// Best-effort failure-info bits for reporting this error in an
    /// ERROR response, defaulting to `badRequest`.
    pub fn fail_info(&self) -> FailureInfo {
        let bit = match self {
            CmpError::TransactionIdInUse => FailureBit::TransactionIdInUse,
            CmpError::WrongCertHash => FailureBit::BadCertId,
            CmpError::PopVerifyFailed => FailureBit::BadPop,
            CmpError::ProtectionInvalid(_) => FailureBit::BadMessageCheck,
            CmpError::NonceMismatch => FailureBit::BadRecipientNonce,
            CmpError::Codec(_) => FailureBit::BadDataFormat,
            CmpError::SenderTypeUnsupported => FailureBit::BadDataFormat,
            _ => FailureBit::BadRequest,
        };
        FailureInfo::single(bit)
    }
}
