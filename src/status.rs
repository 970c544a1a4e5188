//! PKIStatus and PKIFailureInfo model
//!
//! Canonical status codes, the 27-bit failure-info set, and the
//! human-readable rendering of `PKIStatusInfo` used in logs and
//! error details.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CmpError, Result};

/// Status of a PKI operation as reported by the peer (RFC 4210 §5.2.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PkiStatus {
    /// Request granted exactly as asked
    Accepted,
    /// Request granted with modifications
    GrantedWithMods,
    /// Request rejected
    Rejection,
    /// Not yet decided, poll for the final response
    Waiting,
    /// Revocation of the certificate is imminent
    RevocationWarning,
    /// Revocation of the certificate has occurred
    RevocationNotification,
    /// A key update was already performed for this certificate
    KeyUpdateWarning,
}

impl PkiStatus {
    /// Wire value of this status
    pub fn code(self) -> i64 {
        match self {
            PkiStatus::Accepted => 0,
            PkiStatus::GrantedWithMods => 1,
            PkiStatus::Rejection => 2,
            PkiStatus::Waiting => 3,
            PkiStatus::RevocationWarning => 4,
            PkiStatus::RevocationNotification => 5,
            PkiStatus::KeyUpdateWarning => 6,
        }
    }

    /// Decode a wire integer into a status
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(PkiStatus::Accepted),
            1 => Ok(PkiStatus::GrantedWithMods),
            2 => Ok(PkiStatus::Rejection),
            3 => Ok(PkiStatus::Waiting),
            4 => Ok(PkiStatus::RevocationWarning),
            5 => Ok(PkiStatus::RevocationNotification),
            6 => Ok(PkiStatus::KeyUpdateWarning),
            other => Err(CmpError::ParsePkiStatus(format!(
                "unknown PKIStatus value {other}"
            ))),
        }
    }

    /// RFC name of this status
    pub fn name(self) -> &'static str {
        match self {
            PkiStatus::Accepted => "accepted",
            PkiStatus::GrantedWithMods => "grantedWithMods",
            PkiStatus::Rejection => "rejection",
            PkiStatus::Waiting => "waiting",
            PkiStatus::RevocationWarning => "revocationWarning",
            PkiStatus::RevocationNotification => "revocationNotification",
            PkiStatus::KeyUpdateWarning => "keyUpdateWarning",
        }
    }
}

impl fmt::Display for PkiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PkiStatus {
    type Err = CmpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "accepted" => Ok(PkiStatus::Accepted),
            "grantedWithMods" => Ok(PkiStatus::GrantedWithMods),
            "rejection" => Ok(PkiStatus::Rejection),
            "waiting" => Ok(PkiStatus::Waiting),
            "revocationWarning" => Ok(PkiStatus::RevocationWarning),
            "revocationNotification" => Ok(PkiStatus::RevocationNotification),
            "keyUpdateWarning" => Ok(PkiStatus::KeyUpdateWarning),
            other => Err(CmpError::ParsePkiStatus(format!(
                "unknown PKIStatus name {other:?}"
            ))),
        }
    }
}

/// One named bit of the PKIFailureInfo bit string (RFC 4210 §5.2.3)
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureBit {
    BadAlg = 0,
    BadMessageCheck = 1,
    BadRequest = 2,
    BadTime = 3,
    BadCertId = 4,
    BadDataFormat = 5,
    WrongAuthority = 6,
    IncorrectData = 7,
    MissingTimeStamp = 8,
    BadPop = 9,
    CertRevoked = 10,
    CertConfirmed = 11,
    WrongIntegrity = 12,
    BadRecipientNonce = 13,
    TimeNotAvailable = 14,
    UnacceptedPolicy = 15,
    UnacceptedExtension = 16,
    AddInfoNotAvailable = 17,
    BadSenderNonce = 18,
    BadCertTemplate = 19,
    SignerNotTrusted = 20,
    TransactionIdInUse = 21,
    UnsupportedVersion = 22,
    NotAuthorized = 23,
    SystemUnavail = 24,
    SystemFailure = 25,
    DuplicateCertReq = 26,
}

/// Highest valid failure-info bit index
pub const FAILURE_INFO_MAX_BIT: u8 = 26;

impl FailureBit {
    /// All bits in ascending index order
    pub const ALL: [FailureBit; 27] = [
        FailureBit::BadAlg,
        FailureBit::BadMessageCheck,
        FailureBit::BadRequest,
        FailureBit::BadTime,
        FailureBit::BadCertId,
        FailureBit::BadDataFormat,
        FailureBit::WrongAuthority,
        FailureBit::IncorrectData,
        FailureBit::MissingTimeStamp,
        FailureBit::BadPop,
        FailureBit::CertRevoked,
        FailureBit::CertConfirmed,
        FailureBit::WrongIntegrity,
        FailureBit::BadRecipientNonce,
        FailureBit::TimeNotAvailable,
        FailureBit::UnacceptedPolicy,
        FailureBit::UnacceptedExtension,
        FailureBit::AddInfoNotAvailable,
        FailureBit::BadSenderNonce,
        FailureBit::BadCertTemplate,
        FailureBit::SignerNotTrusted,
        FailureBit::TransactionIdInUse,
        FailureBit::UnsupportedVersion,
        FailureBit::NotAuthorized,
        FailureBit::SystemUnavail,
        FailureBit::SystemFailure,
        FailureBit::DuplicateCertReq,
    ];

    /// Bit index in the PKIFailureInfo bit string
    pub fn index(self) -> u8 {
        self as u8
    }

    /// RFC name of this bit
    pub fn name(self) -> &'static str {
        match self {
            FailureBit::BadAlg => "badAlg",
            FailureBit::BadMessageCheck => "badMessageCheck",
            FailureBit::BadRequest => "badRequest",
            FailureBit::BadTime => "badTime",
            FailureBit::BadCertId => "badCertId",
            FailureBit::BadDataFormat => "badDataFormat",
            FailureBit::WrongAuthority => "wrongAuthority",
            FailureBit::IncorrectData => "incorrectData",
            FailureBit::MissingTimeStamp => "missingTimeStamp",
            FailureBit::BadPop => "badPOP",
            FailureBit::CertRevoked => "certRevoked",
            FailureBit::CertConfirmed => "certConfirmed",
            FailureBit::WrongIntegrity => "wrongIntegrity",
            FailureBit::BadRecipientNonce => "badRecipientNonce",
            FailureBit::TimeNotAvailable => "timeNotAvailable",
            FailureBit::UnacceptedPolicy => "unacceptedPolicy",
            FailureBit::UnacceptedExtension => "unacceptedExtension",
            FailureBit::AddInfoNotAvailable => "addInfoNotAvailable",
            FailureBit::BadSenderNonce => "badSenderNonce",
            FailureBit::BadCertTemplate => "badCertTemplate",
            FailureBit::SignerNotTrusted => "signerNotTrusted",
            FailureBit::TransactionIdInUse => "transactionIdInUse",
            FailureBit::UnsupportedVersion => "unsupportedVersion",
            FailureBit::NotAuthorized => "notAuthorized",
            FailureBit::SystemUnavail => "systemUnavail",
            FailureBit::SystemFailure => "systemFailure",
            FailureBit::DuplicateCertReq => "duplicateCertReq",
        }
    }
}

/// Set over the 27 named PKIFailureInfo bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureInfo(u32);

/// Mask of all valid failure-info bits
const VALID_BITS: u32 = (1 << (FAILURE_INFO_MAX_BIT as u32 + 1)) - 1;

impl FailureInfo {
    /// The empty set
    pub const EMPTY: FailureInfo = FailureInfo(0);

    /// Set containing exactly one bit
    pub fn single(bit: FailureBit) -> Self {
        FailureInfo(1 << bit.index())
    }

    /// Decode a raw bit pattern, rejecting indices above 26
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !VALID_BITS != 0 {
            return Err(CmpError::ParsePkiStatus(format!(
                "failure-info bits above index {FAILURE_INFO_MAX_BIT} set: {bits:#x}"
            )));
        }
        Ok(FailureInfo(bits))
    }

    /// Raw bit pattern
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether no bit is set
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Add a bit to the set
    pub fn insert(&mut self, bit: FailureBit) {
        self.0 |= 1 << bit.index();
    }

    /// Whether the given bit is set
    pub fn contains(self, bit: FailureBit) -> bool {
        self.0 & (1 << bit.index()) != 0
    }

    /// Iterate over the set bits in ascending index order
    pub fn iter(self) -> impl Iterator<Item = FailureBit> {
        FailureBit::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

impl FromIterator<FailureBit> for FailureInfo {
    fn from_iter<I: IntoIterator<Item = FailureBit>>(iter: I) -> Self {
        let mut info = FailureInfo::EMPTY;
        for bit in iter {
            info.insert(bit);
        }
        info
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for bit in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(bit.name())?;
            first = false;
        }
        Ok(())
    }
}

/// Status triple carried by responses and error messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkiStatusInfo {
    /// Overall outcome
    pub status: PkiStatus,
    /// Optional failure detail bits
    pub fail_info: FailureInfo,
    /// Optional free-text details, in order
    pub status_strings: Vec<String>,
}

impl PkiStatusInfo {
    /// Status info with no failure details
    pub fn new(status: PkiStatus) -> Self {
        Self {
            status,
            fail_info: FailureInfo::EMPTY,
            status_strings: Vec::new(),
        }
    }

    /// Status info with failure bits and an optional free-text reason
    pub fn with_detail(status: PkiStatus, fail_info: FailureInfo, text: Option<&str>) -> Self {
        Self {
            status,
            fail_info,
            status_strings: text.map(|t| vec![t.to_owned()]).unwrap_or_default(),
        }
    }

    /// Whether the peer granted the request, possibly with modifications
    pub fn is_granted(&self) -> bool {
        matches!(
            self.status,
            PkiStatus::Accepted | PkiStatus::GrantedWithMods
        )
    }
}

impl Default for PkiStatusInfo {
    fn default() -> Self {
        PkiStatusInfo::new(PkiStatus::Accepted)
    }
}

impl fmt::Display for PkiStatusInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if !self.fail_info.is_empty() {
            write!(f, "; PKIFailureInfo: {}", self.fail_info)?;
        } else if !self.is_granted() {
            f.write_str("; <no failure info>")?;
        }
        if !self.status_strings.is_empty() {
            f.write_str("; StatusStrings: ")?;
            for (i, s) in self.status_strings.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{s:?}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for code in 0..=6 {
            let status = PkiStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert!(PkiStatus::from_code(7).is_err());
        assert!(PkiStatus::from_code(-1).is_err());
    }

    #[test]
    fn test_status_names_round_trip() {
        for code in 0..=6 {
            let status = PkiStatus::from_code(code).unwrap();
            assert_eq!(status.name().parse::<PkiStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_failure_bit_indices() {
        assert_eq!(FailureBit::BadAlg.index(), 0);
        assert_eq!(FailureBit::BadPop.index(), 9);
        assert_eq!(FailureBit::SignerNotTrusted.index(), 20);
        assert_eq!(FailureBit::DuplicateCertReq.index(), 26);
    }

    #[test]
    fn test_failure_info_rejects_high_bits() {
        assert!(FailureInfo::from_bits(1 << 27).is_err());
        assert!(FailureInfo::from_bits(u32::MAX).is_err());
        let all = FailureInfo::from_bits((1 << 27) - 1).unwrap();
        assert_eq!(all.iter().count(), 27);
    }

    #[test]
    fn test_failure_info_renders_sorted() {
        let info: FailureInfo = [FailureBit::SignerNotTrusted, FailureBit::BadAlg]
            .into_iter()
            .collect();
        assert_eq!(info.to_string(), "badAlg, signerNotTrusted");
    }

    #[test]
    fn test_status_info_rendering() {
        let si = PkiStatusInfo::with_detail(
            PkiStatus::Rejection,
            FailureInfo::single(FailureBit::BadPop),
            Some("key mismatch"),
        );
        assert_eq!(
            si.to_string(),
            "rejection; PKIFailureInfo: badPOP; StatusStrings: \"key mismatch\""
        );

        let bare = PkiStatusInfo::new(PkiStatus::Rejection);
        assert_eq!(bare.to_string(), "rejection; <no failure info>");

        let ok = PkiStatusInfo::new(PkiStatus::Accepted);
        assert_eq!(ok.to_string(), "accepted");
    }
}
