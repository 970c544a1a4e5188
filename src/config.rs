//! Configuration Module
//!
//! Typed option records for the client and server contexts, TOML
//! loading and saving, and the integer-keyed option façade kept for
//! compatibility with OpenSSL-style `OSSL_CMP_OPT_*` tooling.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{DigestAlg, MacAlg, PopoMethod, RevocationReason};

/// Behavior options of a client context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Log verbosity hint for the embedding application
    pub log_verbosity: u8,

    /// Bound on a single transport round trip
    pub msg_timeout: Duration,

    /// Bound on the whole transaction including polling; zero means
    /// unlimited
    pub total_timeout: Duration,

    /// Requested certificate validity in days
    pub validity_days: Option<u32>,

    /// Do not derive default subject alternative names from the
    /// reference certificate
    pub san_nodefault: bool,

    /// Mark the SAN extension critical
    pub san_critical: bool,

    /// Mark the certificate policies extension critical
    pub policies_critical: bool,

    /// Proof-of-possession method for certificate requests
    pub popo_method: PopoMethod,

    /// Digest used with signature protection
    pub digest_alg: DigestAlg,

    /// One-way function for certHash when the response is unprotected
    pub owf_alg: DigestAlg,

    /// MAC algorithm for password-based protection
    pub mac_alg: MacAlg,

    /// Reason placed into revocation requests
    pub revocation_reason: RevocationReason,

    /// Ask the server to waive the certConf/PKIConf round
    pub implicit_confirm: bool,

    /// Never send certConf, regardless of what the server signals
    pub disable_confirm: bool,

    /// Send requests without protection
    pub unprotected_send: bool,

    /// Tolerate missing protection on error-signalling replies
    pub unprotected_errors: bool,

    /// Do not check key usage bits of the protection certificate
    pub ignore_key_usage: bool,

    /// Accept a trust anchor from extraCerts of an initialization
    /// response
    pub permit_ta_in_extracerts_for_ir: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            log_verbosity: 6,
            msg_timeout: Duration::from_secs(120),
            total_timeout: Duration::ZERO,
            validity_days: None,
            san_nodefault: false,
            san_critical: false,
            policies_critical: false,
            popo_method: PopoMethod::default(),
            digest_alg: DigestAlg::default(),
            owf_alg: DigestAlg::default(),
            mac_alg: MacAlg::default(),
            revocation_reason: RevocationReason::default(),
            implicit_confirm: false,
            disable_confirm: false,
            unprotected_send: false,
            unprotected_errors: false,
            ignore_key_usage: false,
            permit_ta_in_extracerts_for_ir: false,
        }
    }
}

/// Integer option keys of the compatibility façade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opt {
    /// Log verbosity
    LogVerbosity = 0,
    /// Per-message timeout in seconds
    MsgTimeout = 1,
    /// Per-transaction timeout in seconds
    TotalTimeout = 2,
    /// Requested validity in days
    ValidityDays = 3,
    /// Suppress default subject alternative names
    SubjectAltNameNoDefault = 4,
    /// SAN extension criticality
    SubjectAltNameCritical = 5,
    /// Policies extension criticality
    PoliciesCritical = 6,
    /// Proof-of-possession method
    PopoMethod = 7,
    /// Digest algorithm NID
    DigestAlgNid = 8,
    /// One-way function NID
    OwfAlgNid = 9,
    /// MAC algorithm NID
    MacAlgNid = 10,
    /// Revocation reason code
    RevocationReason = 11,
    /// Request implicit confirmation
    ImplicitConfirm = 12,
    /// Disable certificate confirmation
    DisableConfirm = 13,
    /// Send unprotected requests
    UnprotectedSend = 14,
    /// Tolerate unprotected error replies
    UnprotectedErrors = 15,
    /// Ignore key usage of the protection certificate
    IgnoreKeyUsage = 16,
    /// Permit trust anchor in extraCerts for IR
    PermitTaInExtraCertsForIr = 17,
}

impl TryFrom<i64> for Opt {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, ConfigError> {
        let opt = match value {
            0 => Opt::LogVerbosity,
            1 => Opt::MsgTimeout,
            2 => Opt::TotalTimeout,
            3 => Opt::ValidityDays,
            4 => Opt::SubjectAltNameNoDefault,
            5 => Opt::SubjectAltNameCritical,
            6 => Opt::PoliciesCritical,
            7 => Opt::PopoMethod,
            8 => Opt::DigestAlgNid,
            9 => Opt::OwfAlgNid,
            10 => Opt::MacAlgNid,
            11 => Opt::RevocationReason,
            12 => Opt::ImplicitConfirm,
            13 => Opt::DisableConfirm,
            14 => Opt::UnprotectedSend,
            15 => Opt::UnprotectedErrors,
            16 => Opt::IgnoreKeyUsage,
            17 => Opt::PermitTaInExtraCertsForIr,
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown option key {other}"
                )))
            }
        };
        Ok(opt)
    }
}

/// Digest selection by OpenSSL NID, as the façade receives it
fn digest_from_nid(nid: i64) -> Result<DigestAlg, ConfigError> {
    match nid {
        672 => Ok(DigestAlg::Sha256),
        673 => Ok(DigestAlg::Sha384),
        674 => Ok(DigestAlg::Sha512),
        other => Err(ConfigError::InvalidConfig(format!(
            "unsupported digest NID {other}"
        ))),
    }
}

impl ClientOptions {
    /// Integer-keyed setter kept as a thin façade over the typed record
    pub fn set_opt(&mut self, opt: Opt, value: i64) -> Result<(), ConfigError> {
        let seconds = |v: i64| -> Result<Duration, ConfigError> {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidConfig(format!("negative timeout {v}")))
        };
        match opt {
            Opt::LogVerbosity => self.log_verbosity = value as u8,
            Opt::MsgTimeout => self.msg_timeout = seconds(value)?,
            Opt::TotalTimeout => self.total_timeout = seconds(value)?,
            Opt::ValidityDays => {
                self.validity_days = (value > 0).then_some(value as u32);
            }
            Opt::SubjectAltNameNoDefault => self.san_nodefault = value != 0,
            Opt::SubjectAltNameCritical => self.san_critical = value != 0,
            Opt::PoliciesCritical => self.policies_critical = value != 0,
            Opt::PopoMethod => {
                self.popo_method = PopoMethod::try_from(value)
                    .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
            }
            Opt::DigestAlgNid => self.digest_alg = digest_from_nid(value)?,
            Opt::OwfAlgNid => self.owf_alg = digest_from_nid(value)?,
            Opt::MacAlgNid => {
                self.mac_alg = match digest_from_nid(value)? {
                    DigestAlg::Sha256 => MacAlg::HmacSha256,
                    DigestAlg::Sha384 => MacAlg::HmacSha384,
                    DigestAlg::Sha512 => MacAlg::HmacSha512,
                };
            }
            Opt::RevocationReason => {
                self.revocation_reason = RevocationReason::try_from(value)
                    .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
            }
            Opt::ImplicitConfirm => self.implicit_confirm = value != 0,
            Opt::DisableConfirm => self.disable_confirm = value != 0,
            Opt::UnprotectedSend => self.unprotected_send = value != 0,
            Opt::UnprotectedErrors => self.unprotected_errors = value != 0,
            Opt::IgnoreKeyUsage => self.ignore_key_usage = value != 0,
            Opt::PermitTaInExtraCertsForIr => {
                self.permit_ta_in_extracerts_for_ir = value != 0;
            }
        }
        Ok(())
    }

    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save options to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Validate option consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.msg_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "message timeout cannot be zero".to_string(),
            ));
        }
        if self.popo_method == PopoMethod::KeyEnc {
            return Err(ConfigError::InvalidConfig(
                "key encipherment POP is not supported".to_string(),
            ));
        }
        Ok(())
    }
}

/// Behavior options of a server context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerOptions {
    /// Echo implicitConfirm when the request asks for it
    pub grant_implicit_confirm: bool,

    /// Send error and rejection messages without protection
    pub send_unprotected_errors: bool,

    /// Accept requests with missing protection
    pub accept_unprotected_requests: bool,

    /// Accept requests whose POP is RAVerified
    pub accept_ra_verified: bool,

    /// Answer every request with the configured error
    pub send_error: bool,

    /// Number of polling rounds before the final certificate response
    pub poll_count: u32,

    /// checkAfter seconds sent in polling responses
    pub check_after_secs: u64,

    /// Digest used with signature protection
    pub digest_alg: DigestAlg,

    /// One-way function for recomputing certHash when responses go out
    /// unprotected
    pub owf_alg: DigestAlg,

    /// MAC algorithm for password-based protection
    pub mac_alg: MacAlg,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            grant_implicit_confirm: false,
            send_unprotected_errors: false,
            accept_unprotected_requests: false,
            accept_ra_verified: false,
            send_error: false,
            poll_count: 0,
            check_after_secs: 1,
            digest_alg: DigestAlg::default(),
            owf_alg: DigestAlg::default(),
            mac_alg: MacAlg::default(),
        }
    }
}

impl ServerOptions {
    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save options to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("IO error: {0}")]
    IoError(String),

    /// TOML content could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Options could not be serialized
    #[error("Serialize error: {0}")]
    SerializeError(String),

    /// An option value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_validate() {
        assert!(ClientOptions::default().validate().is_ok());
    }

    #[test]
    fn test_opt_facade_round_trip() {
        let mut opts = ClientOptions::default();
        opts.set_opt(Opt::ImplicitConfirm, 1).unwrap();
        opts.set_opt(Opt::TotalTimeout, 30).unwrap();
        opts.set_opt(Opt::OwfAlgNid, 673).unwrap();
        opts.set_opt(Opt::PopoMethod, 3).unwrap();
        assert!(opts.implicit_confirm);
        assert_eq!(opts.total_timeout, Duration::from_secs(30));
        assert_eq!(opts.owf_alg, DigestAlg::Sha384);
        assert_eq!(opts.popo_method, PopoMethod::RaVerified);
    }

    #[test]
    fn test_opt_facade_rejects_bad_values() {
        let mut opts = ClientOptions::default();
        assert!(opts.set_opt(Opt::MsgTimeout, -1).is_err());
        assert!(opts.set_opt(Opt::DigestAlgNid, 999).is_err());
        assert!(Opt::try_from(42).is_err());
    }

    #[test]
    fn test_options_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        let mut opts = ClientOptions::default();
        opts.implicit_confirm = true;
        opts.msg_timeout = Duration::from_secs(5);
        opts.save(&path).unwrap();
        let loaded = ClientOptions::from_file(&path).unwrap();
        assert!(loaded.implicit_confirm);
        assert_eq!(loaded.msg_timeout, Duration::from_secs(5));
    }
}
