//! Message catalog
//!
//! Typed request and response bodies of the CMP alphabet handled by the
//! core, and the constructors that build complete, protected messages
//! from a context: ir/cr/p10cr/kur/rr/certConf/pollReq/genm on the
//! client side and their responses on the server side.

use serde::{Deserialize, Serialize};

use crate::context::ClientContext;
use crate::error::{CmpError, Result};
use crate::header::{Header, HeaderSource};
use crate::ports::codec::Codec;
use crate::ports::crypto::CryptoProvider;
use crate::protect::{self, ProtectionSource};
use crate::status::{FailureInfo, PkiStatus, PkiStatusInfo};
use crate::types::{
    CertId, Certificate, DigestAlg, DistinguishedName, EncryptedValue, Extension,
    InfoTypeAndValue, PopoMethod, PublicKey, RevocationReason, SignatureAlg,
};

/// certReqId used by single-request transactions
pub const CERT_REQ_ID: i64 = 0;

/// A complete CMP message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// PKIHeader
    pub header: Header,
    /// PKIBody
    pub body: Body,
    /// Protection octets over header and body, absent if unprotected
    pub protection: Option<Vec<u8>>,
    /// Certificates useful for verifying the protection
    pub extra_certs: Vec<Certificate>,
}

/// Body kind tags, named as in RFC 4210 appendix D
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BodyKind {
    Ir,
    Ip,
    Cr,
    Cp,
    P10cr,
    Kur,
    Kup,
    Rr,
    Rp,
    CertConf,
    PkiConf,
    PollReq,
    PollRep,
    Genm,
    Genp,
    Error,
}

impl BodyKind {
    /// Short protocol name of this body kind
    pub fn name(self) -> &'static str {
        match self {
            BodyKind::Ir => "IR",
            BodyKind::Ip => "IP",
            BodyKind::Cr => "CR",
            BodyKind::Cp => "CP",
            BodyKind::P10cr => "P10CR",
            BodyKind::Kur => "KUR",
            BodyKind::Kup => "KUP",
            BodyKind::Rr => "RR",
            BodyKind::Rp => "RP",
            BodyKind::CertConf => "CERTCONF",
            BodyKind::PkiConf => "PKICONF",
            BodyKind::PollReq => "POLLREQ",
            BodyKind::PollRep => "POLLREP",
            BodyKind::Genm => "GENM",
            BodyKind::Genp => "GENP",
            BodyKind::Error => "ERROR",
        }
    }

    /// Reply kind a request of this kind waits for
    pub fn expected_reply(self) -> Option<BodyKind> {
        match self {
            BodyKind::Ir => Some(BodyKind::Ip),
            BodyKind::Cr | BodyKind::P10cr => Some(BodyKind::Cp),
            BodyKind::Kur => Some(BodyKind::Kup),
            BodyKind::Rr => Some(BodyKind::Rp),
            BodyKind::CertConf | BodyKind::Error => Some(BodyKind::PkiConf),
            BodyKind::PollReq => Some(BodyKind::PollRep),
            BodyKind::Genm => Some(BodyKind::Genp),
            _ => None,
        }
    }

    /// Whether this kind is one of the certificate response bodies
    pub fn is_cert_rep(self) -> bool {
        matches!(self, BodyKind::Ip | BodyKind::Cp | BodyKind::Kup)
    }
}

impl std::fmt::Display for BodyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// PKIBody variants handled by the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Body {
    /// Initialization request
    Ir(CertReqMessages),
    /// Initialization response
    Ip(CertRepMessage),
    /// Certification request
    Cr(CertReqMessages),
    /// Certification response
    Cp(CertRepMessage),
    /// PKCS#10 certification request
    P10cr(CertificationRequest),
    /// Key update request
    Kur(CertReqMessages),
    /// Key update response
    Kup(CertRepMessage),
    /// Revocation request
    Rr(RevReqContent),
    /// Revocation response
    Rp(RevRepContent),
    /// Certificate confirmation
    CertConf(CertConfirmContent),
    /// Confirmation
    PkiConf,
    /// Polling request
    PollReq(PollReqContent),
    /// Polling response
    PollRep(PollRepContent),
    /// General message
    Genm(GenMsgContent),
    /// General response
    Genp(GenMsgContent),
    /// Error message
    Error(ErrorMsgContent),
}

impl Body {
    /// Kind tag of this body
    pub fn kind(&self) -> BodyKind {
        match self {
            Body::Ir(_) => BodyKind::Ir,
            Body::Ip(_) => BodyKind::Ip,
            Body::Cr(_) => BodyKind::Cr,
            Body::Cp(_) => BodyKind::Cp,
            Body::P10cr(_) => BodyKind::P10cr,
            Body::Kur(_) => BodyKind::Kur,
            Body::Kup(_) => BodyKind::Kup,
            Body::Rr(_) => BodyKind::Rr,
            Body::Rp(_) => BodyKind::Rp,
            Body::CertConf(_) => BodyKind::CertConf,
            Body::PkiConf => BodyKind::PkiConf,
            Body::PollReq(_) => BodyKind::PollReq,
            Body::PollRep(_) => BodyKind::PollRep,
            Body::Genm(_) => BodyKind::Genm,
            Body::Genp(_) => BodyKind::Genp,
            Body::Error(_) => BodyKind::Error,
        }
    }

    /// The certificate response content of an ip/cp/kup body
    pub fn cert_rep(&self) -> Option<&CertRepMessage> {
        match self {
            Body::Ip(rep) | Body::Cp(rep) | Body::Kup(rep) => Some(rep),
            _ => None,
        }
    }

    /// The request messages of an ir/cr/kur body
    pub fn cert_req(&self) -> Option<&CertReqMessages> {
        match self {
            Body::Ir(req) | Body::Cr(req) | Body::Kur(req) => Some(req),
            _ => None,
        }
    }
}

/// CRMF CertReqMessages: the core produces exactly one CertReqMsg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertReqMessages {
    /// Contained requests, exactly one in this implementation
    pub reqs: Vec<CertReqMsg>,
}

/// One CRMF certificate request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertReqMsg {
    /// Request id, zero for single-request transactions
    pub cert_req_id: i64,
    /// Requested certificate contents
    pub cert_template: CertTemplate,
    /// Proof of possession of the matching private key
    pub popo: Option<ProofOfPossession>,
}

/// Requested certificate contents (CRMF CertTemplate)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertTemplate {
    /// Requested subject name
    pub subject: Option<DistinguishedName>,
    /// Requested issuer name
    pub issuer: Option<DistinguishedName>,
    /// Public key to be certified
    pub public_key: Option<PublicKey>,
    /// Requested validity in days
    pub validity_days: Option<u32>,
    /// Requested subject alternative names
    pub subject_alt_names: Vec<String>,
    /// Criticality of the SAN extension
    pub san_critical: bool,
    /// Requested certificate policies
    pub policies: Vec<String>,
    /// Criticality of the policies extension
    pub policies_critical: bool,
    /// Further requested extensions
    pub extensions: Vec<Extension>,
    /// Certificate being updated, for key update requests
    pub old_cert_id: Option<CertId>,
}

/// Proof of possession of the requested key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProofOfPossession {
    /// The RA asserts it has verified possession
    RaVerified,
    /// Signature over the certificate request with the requested key
    Signature {
        /// Signature algorithm
        alg: SignatureAlg,
        /// Signature octets
        signature: Vec<u8>,
    },
}

/// PKCS#10 request carried verbatim in a p10cr body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationRequest {
    /// Subject of the request
    pub subject: DistinguishedName,
    /// Public key of the request
    pub public_key: PublicKey,
    /// Encoded CertificationRequest as produced by the caller
    pub raw: Vec<u8>,
}

/// Certificate response message (ip/cp/kup content)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertRepMessage {
    /// CA certificates published alongside the response
    pub ca_pubs: Vec<Certificate>,
    /// Responses, at most one consumed by the core
    pub responses: Vec<CertResponse>,
}

impl CertRepMessage {
    /// Status of the response with the given id, or of the first one
    pub fn status_of(&self, cert_req_id: i64) -> Option<&PkiStatusInfo> {
        self.response_for(cert_req_id).map(|r| &r.status)
    }

    /// The response with the given certReqId
    pub fn response_for(&self, cert_req_id: i64) -> Option<&CertResponse> {
        self.responses.iter().find(|r| r.cert_req_id == cert_req_id)
    }
}

/// One certificate response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertResponse {
    /// Id of the request this answers
    pub cert_req_id: i64,
    /// Outcome for this request
    pub status: PkiStatusInfo,
    /// Issued key pair, present when a certificate was granted
    pub certified_key_pair: Option<CertifiedKeyPair>,
}

/// Issued certificate and related material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertifiedKeyPair {
    /// The certificate, direct or encrypted for indirect POP
    pub cert_or_enc_cert: CertOrEncCert,
}

/// Direct or encrypted form of an issued certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CertOrEncCert {
    /// Plain certificate
    Certificate(Certificate),
    /// Certificate encrypted to the requested key (RFC 4210 §5.2.8.2)
    EncryptedCert(EncryptedValue),
}

/// Revocation request content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevReqContent {
    /// Revocation details, one per certificate
    pub details: Vec<RevDetails>,
}

/// One revocation request entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevDetails {
    /// Certificate to revoke
    pub cert_id: CertId,
    /// Reason for revocation
    pub reason: RevocationReason,
}

/// Revocation response content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevRepContent {
    /// Statuses in the order of the request entries
    pub statuses: Vec<PkiStatusInfo>,
    /// Ids of the revoked certificates
    pub rev_certs: Vec<CertId>,
}

/// Certificate confirmation content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertConfirmContent {
    /// One entry per confirmed certificate
    pub statuses: Vec<CertStatus>,
}

/// Confirmation of one issued certificate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertStatus {
    /// Id of the original request
    pub cert_req_id: i64,
    /// Digest of the issued certificate under the negotiated OWF
    pub cert_hash: Vec<u8>,
    /// Acceptance or rejection of the certificate
    pub status_info: Option<PkiStatusInfo>,
}

/// Polling request content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollReqContent {
    /// Request ids being polled for
    pub cert_req_ids: Vec<i64>,
}

/// Polling response content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRepContent {
    /// One entry per polled request
    pub entries: Vec<PollRepEntry>,
}

/// One polling response entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRepEntry {
    /// Id of the pending request
    pub cert_req_id: i64,
    /// Seconds to wait before the next poll
    pub check_after_secs: u64,
    /// Optional reason free text
    pub reason: Option<String>,
}

/// General message or response content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenMsgContent {
    /// Carried InfoTypeAndValue items
    pub itavs: Vec<InfoTypeAndValue>,
}

/// Error message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMsgContent {
    /// Status and failure information
    pub status_info: PkiStatusInfo,
    /// Implementation-defined reason number
    pub error_code: Option<i64>,
    /// Free-text details
    pub error_details: Vec<String>,
}

// ============================================================================
// Client-side constructors
// ============================================================================

/// Build an initialization request from the context template
pub fn new_ir(
    ctx: &ClientContext,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let reqs = build_cert_req_messages(ctx, BodyKind::Ir, codec, crypto)?;
    seal_for_client(ctx, Body::Ir(reqs), codec, crypto)
}

/// Build a certification request from the context template
pub fn new_cr(
    ctx: &ClientContext,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let reqs = build_cert_req_messages(ctx, BodyKind::Cr, codec, crypto)?;
    seal_for_client(ctx, Body::Cr(reqs), codec, crypto)
}

/// Build a key update request for the context's old certificate
pub fn new_kur(
    ctx: &ClientContext,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let reqs = build_cert_req_messages(ctx, BodyKind::Kur, codec, crypto)?;
    seal_for_client(ctx, Body::Kur(reqs), codec, crypto)
}

/// Wrap the caller's PKCS#10 request
pub fn new_p10cr(
    ctx: &ClientContext,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let csr = ctx.csr.clone().ok_or(CmpError::NullArgument("p10CSR"))?;
    seal_for_client(ctx, Body::P10cr(csr), codec, crypto)
}

/// Build a revocation request for the context's old certificate
pub fn new_rr(
    ctx: &ClientContext,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let old_cert = ctx.old_cert.as_ref().ok_or(CmpError::NullArgument("oldCert"))?;
    let body = Body::Rr(RevReqContent {
        details: vec![RevDetails {
            cert_id: old_cert.cert_id(),
            reason: ctx.options.revocation_reason,
        }],
    });
    seal_for_client(ctx, body, codec, crypto)
}

/// Build a certificate confirmation for the newly issued certificate
///
/// `owf` is the one-way function negotiated by the protection of the
/// certificate response. `reject` turns the confirmation into a
/// rejection with the given failure info and reason text.
pub fn new_cert_conf(
    ctx: &ClientContext,
    owf: DigestAlg,
    reject: Option<(FailureInfo, String)>,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let cert = ctx.new_cert.as_ref().ok_or(CmpError::NullArgument("newCert"))?;
    let cert_hash = crypto
        .digest(&codec.encode_certificate(cert)?, owf)
        .map_err(CmpError::internal)?;
    let status_info = match reject {
        None => PkiStatusInfo::new(PkiStatus::Accepted),
        Some((fail_info, text)) => {
            PkiStatusInfo::with_detail(PkiStatus::Rejection, fail_info, Some(&text))
        }
    };
    let body = Body::CertConf(CertConfirmContent {
        statuses: vec![CertStatus {
            cert_req_id: CERT_REQ_ID,
            cert_hash,
            status_info: Some(status_info),
        }],
    });
    seal_for_client(ctx, body, codec, crypto)
}

/// Build a polling request for the pending certificate request
pub fn new_poll_req(
    ctx: &ClientContext,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let body = Body::PollReq(PollReqContent {
        cert_req_ids: vec![CERT_REQ_ID],
    });
    seal_for_client(ctx, body, codec, crypto)
}

/// Build a general message carrying the caller's ITAVs
pub fn new_genm(
    ctx: &ClientContext,
    itavs: Vec<InfoTypeAndValue>,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    seal_for_client(ctx, Body::Genm(GenMsgContent { itavs }), codec, crypto)
}

/// Build a client-originated error message
pub fn new_client_error(
    ctx: &ClientContext,
    status_info: PkiStatusInfo,
    error_code: Option<i64>,
    error_details: Vec<String>,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let body = Body::Error(ErrorMsgContent {
        status_info,
        error_code,
        error_details,
    });
    seal_for_client(ctx, body, codec, crypto)
}

fn seal_for_client(
    ctx: &ClientContext,
    body: Body,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    protect::seal(ctx, body, ctx.options.unprotected_send, codec, crypto)
}

/// Assemble the single-request CertReqMessages for ir/cr/kur
fn build_cert_req_messages(
    ctx: &ClientContext,
    kind: BodyKind,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<CertReqMessages> {
    let mut template = CertTemplate {
        subject: None,
        issuer: ctx.issuer.clone(),
        public_key: ctx.new_key.as_ref().map(|k| k.public.clone()),
        validity_days: ctx.options.validity_days,
        subject_alt_names: ctx.subject_alt_names.clone(),
        san_critical: ctx.options.san_critical,
        policies: ctx.policies.clone(),
        policies_critical: ctx.options.policies_critical,
        extensions: ctx.extensions.clone(),
        old_cert_id: None,
    };

    template.subject = match kind {
        // a key update defaults to the subject of the certificate it updates
        BodyKind::Kur => {
            let old = ctx.old_cert.as_ref().ok_or(CmpError::NullArgument("oldCert"))?;
            template.old_cert_id = Some(old.cert_id());
            ctx.subject.clone().or_else(|| Some(old.subject.clone()))
        }
        _ => ctx
            .subject
            .clone()
            .or_else(|| ctx.client_cert.as_ref().map(|c| c.subject.clone())),
    };

    let popo = build_popo(ctx, &template, codec, crypto)?;

    Ok(CertReqMessages {
        reqs: vec![CertReqMsg {
            cert_req_id: CERT_REQ_ID,
            cert_template: template,
            popo,
        }],
    })
}

/// Select and compute the proof of possession: RAVerified when there is
/// no key to sign with, a signature with the requested key otherwise
fn build_popo(
    ctx: &ClientContext,
    template: &CertTemplate,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Option<ProofOfPossession>> {
    match ctx.options.popo_method {
        PopoMethod::None => Ok(None),
        PopoMethod::RaVerified => Ok(Some(ProofOfPossession::RaVerified)),
        PopoMethod::KeyEnc => Err(CmpError::InvalidArgs(
            "key encipherment POP is not supported".into(),
        )),
        PopoMethod::Signature => match &ctx.new_key {
            None => Ok(Some(ProofOfPossession::RaVerified)),
            Some(key_pair) => {
                let data = codec.encode_cert_request(CERT_REQ_ID, template)?;
                let alg = SignatureAlg::default();
                let signature = crypto
                    .sign(&data, &key_pair.private, alg)
                    .map_err(CmpError::internal)?;
                Ok(Some(ProofOfPossession::Signature { alg, signature }))
            }
        },
    }
}

// ============================================================================
// Server-side constructors
// ============================================================================

/// Build an ip/cp/kup response
#[allow(clippy::too_many_arguments)]
pub fn new_cert_rep<S: HeaderSource + ProtectionSource>(
    src: &S,
    kind: BodyKind,
    cert_req_id: i64,
    status: PkiStatusInfo,
    cert: Option<Certificate>,
    ca_pubs: Vec<Certificate>,
    unprotected: bool,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let rep = CertRepMessage {
        ca_pubs,
        responses: vec![CertResponse {
            cert_req_id,
            status,
            certified_key_pair: cert.map(|c| CertifiedKeyPair {
                cert_or_enc_cert: CertOrEncCert::Certificate(c),
            }),
        }],
    };
    let body = match kind {
        BodyKind::Ip => Body::Ip(rep),
        BodyKind::Cp => Body::Cp(rep),
        BodyKind::Kup => Body::Kup(rep),
        other => {
            return Err(CmpError::InternalError(format!(
                "{other} is not a certificate response kind"
            )))
        }
    };
    protect::seal(src, body, unprotected, codec, crypto)
}

/// Build a revocation response
pub fn new_rp<S: HeaderSource + ProtectionSource>(
    src: &S,
    status: PkiStatusInfo,
    cert_id: CertId,
    unprotected: bool,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let body = Body::Rp(RevRepContent {
        statuses: vec![status],
        rev_certs: vec![cert_id],
    });
    protect::seal(src, body, unprotected, codec, crypto)
}

/// Build a confirmation response
pub fn new_pkiconf<S: HeaderSource + ProtectionSource>(
    src: &S,
    unprotected: bool,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    protect::seal(src, Body::PkiConf, unprotected, codec, crypto)
}

/// Build a polling response
pub fn new_poll_rep<S: HeaderSource + ProtectionSource>(
    src: &S,
    cert_req_id: i64,
    check_after_secs: u64,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let body = Body::PollRep(PollRepContent {
        entries: vec![PollRepEntry {
            cert_req_id,
            check_after_secs,
            reason: None,
        }],
    });
    protect::seal(src, body, false, codec, crypto)
}

/// Build a general response mirroring the given ITAVs
pub fn new_genp<S: HeaderSource + ProtectionSource>(
    src: &S,
    itavs: Vec<InfoTypeAndValue>,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    protect::seal(src, Body::Genp(GenMsgContent { itavs }), false, codec, crypto)
}

/// Build an error response
pub fn new_error<S: HeaderSource + ProtectionSource>(
    src: &S,
    status_info: PkiStatusInfo,
    error_code: Option<i64>,
    error_details: Vec<String>,
    unprotected: bool,
    codec: &dyn Codec,
    crypto: &dyn CryptoProvider,
) -> Result<Message> {
    let body = Body::Error(ErrorMsgContent {
        status_info,
        error_code,
        error_details,
    });
    protect::seal(src, body, unprotected, codec, crypto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_kind_names() {
        assert_eq!(BodyKind::Ir.name(), "IR");
        assert_eq!(BodyKind::CertConf.name(), "CERTCONF");
        assert_eq!(BodyKind::PollRep.name(), "POLLREP");
    }

    #[test]
    fn test_expected_replies() {
        assert_eq!(BodyKind::Ir.expected_reply(), Some(BodyKind::Ip));
        assert_eq!(BodyKind::P10cr.expected_reply(), Some(BodyKind::Cp));
        assert_eq!(BodyKind::Kur.expected_reply(), Some(BodyKind::Kup));
        assert_eq!(BodyKind::Rr.expected_reply(), Some(BodyKind::Rp));
        assert_eq!(BodyKind::Genm.expected_reply(), Some(BodyKind::Genp));
        assert_eq!(BodyKind::Ip.expected_reply(), None);
    }

    #[test]
    fn test_cert_rep_lookup() {
        let rep = CertRepMessage {
            ca_pubs: Vec::new(),
            responses: vec![CertResponse {
                cert_req_id: CERT_REQ_ID,
                status: PkiStatusInfo::new(PkiStatus::Accepted),
                certified_key_pair: None,
            }],
        };
        assert!(rep.response_for(CERT_REQ_ID).is_some());
        assert!(rep.response_for(1).is_none());
    }
}
