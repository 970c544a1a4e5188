//! Server dispatcher
//!
//! Consumes decoded CMP requests and produces responses: certificate
//! requests (with optional polling deferral), revocation, certificate
//! confirmation, error notices, and general messages. Dispatch goes
//! through the [`ServerHandlers`] trait, whose default methods carry the
//! standard behaviors; embedders override individual methods to change
//! policy.

use tracing::{info, warn};

use crate::body::{self, Body, BodyKind, Message, ProofOfPossession, CERT_REQ_ID};
use crate::context::ServerContext;
use crate::error::{CmpError, Result};
use crate::header::HeaderSource;
use crate::ports::codec::Codec;
use crate::ports::crypto::CryptoProvider;
use crate::protect;
use crate::status::{PkiStatus, PkiStatusInfo};

/// Collaborators threaded through request handlers
#[derive(Clone, Copy)]
pub struct Services<'a> {
    /// Wire codec
    pub codec: &'a dyn Codec,
    /// Crypto provider
    pub crypto: &'a dyn CryptoProvider,
}

/// Handler table for incoming request bodies
///
/// One method per request kind; the default implementations answer from
/// the canned material in the [`ServerContext`].
pub trait ServerHandlers {
    /// Answer ir/cr/p10cr/kur with ip/cp/kup
    fn cert_request(
        &mut self,
        ctx: &mut ServerContext,
        svc: Services<'_>,
        req: &Message,
    ) -> Result<Message> {
        defaults::cert_request(ctx, svc, req)
    }

    /// Answer rr with rp
    fn rr(&mut self, ctx: &mut ServerContext, svc: Services<'_>, req: &Message) -> Result<Message> {
        defaults::rr(ctx, svc, req)
    }

    /// Answer pollReq with pollRep or the deferred response
    fn poll_req(
        &mut self,
        ctx: &mut ServerContext,
        svc: Services<'_>,
        req: &Message,
    ) -> Result<Message> {
        defaults::poll_req(ctx, svc, req)
    }

    /// Answer certConf with pkiconf
    fn cert_conf(
        &mut self,
        ctx: &mut ServerContext,
        svc: Services<'_>,
        req: &Message,
    ) -> Result<Message> {
        defaults::cert_conf(ctx, svc, req)
    }

    /// Answer a client error notice with pkiconf
    fn error(
        &mut self,
        ctx: &mut ServerContext,
        svc: Services<'_>,
        req: &Message,
    ) -> Result<Message> {
        defaults::error(ctx, svc, req)
    }

    /// Answer genm with genp
    fn genm(
        &mut self,
        ctx: &mut ServerContext,
        svc: Services<'_>,
        req: &Message,
    ) -> Result<Message> {
        defaults::genm(ctx, svc, req)
    }
}

/// Handlers that only use the default behaviors
#[derive(Debug, Default)]
pub struct DefaultHandlers;

impl ServerHandlers for DefaultHandlers {}

/// Server-side counterpart of a client session
pub struct Responder<H = DefaultHandlers> {
    /// Server configuration and per-transaction state
    pub ctx: ServerContext,
    handlers: H,
}

impl Responder<DefaultHandlers> {
    /// Responder with the default handler table
    pub fn new(ctx: ServerContext) -> Self {
        Self {
            ctx,
            handlers: DefaultHandlers,
        }
    }
}

impl<H: ServerHandlers> Responder<H> {
    /// Responder with a custom handler table
    pub fn with_handlers(ctx: ServerContext, handlers: H) -> Self {
        Self { ctx, handlers }
    }

    /// Process one request and produce the response
    ///
    /// Handler failures are converted into an ERROR response carrying a
    /// best-effort failure info and the error's rendering as a detail;
    /// only a broken request encoding or a failure to build the error
    /// response itself surface as `Err`.
    pub fn process(
        &mut self,
        req: &Message,
        codec: &dyn Codec,
        crypto: &dyn CryptoProvider,
    ) -> Result<Message> {
        // re-encode and re-decode to catch encoding bugs early
        let req = codec.dup(req)?;
        let svc = Services { codec, crypto };

        match self.dispatch(&req, svc) {
            Ok(rsp) => Ok(rsp),
            Err(err) => self.error_response(&err, svc),
        }
    }

    fn dispatch(&mut self, req: &Message, svc: Services<'_>) -> Result<Message> {
        if req.header.sender.as_directory().is_none() {
            return Err(CmpError::SenderTypeUnsupported);
        }

        // adopt the request's transaction and remember whom to answer
        self.ctx.peer = Some(req.header.sender.clone());
        self.ctx.tx.recip_nonce = Some(req.header.sender_nonce.clone());

        let incoming = req.header.transaction_id;
        let is_cert_request = matches!(
            req.body.kind(),
            BodyKind::Ir | BodyKind::Cr | BodyKind::P10cr | BodyKind::Kur
        );
        // one pending request per responder; a second transaction is refused
        if is_cert_request
            && self.ctx.pending.is_some()
            && self.ctx.tx.transaction_id.is_some_and(|id| id != incoming)
        {
            return Err(CmpError::TransactionIdInUse);
        }
        self.ctx.tx.transaction_id = Some(incoming);

        protect::validate_incoming(
            req,
            &self.ctx.protection_expectations(),
            svc.codec,
            svc.crypto,
        )?;

        if self.ctx.options.send_error {
            return body::new_error(
                &self.ctx,
                self.ctx.status_out.clone(),
                None,
                Vec::new(),
                self.ctx.options.send_unprotected_errors,
                svc.codec,
                svc.crypto,
            );
        }

        match req.body.kind() {
            BodyKind::Ir | BodyKind::Cr | BodyKind::P10cr | BodyKind::Kur => {
                self.handlers.cert_request(&mut self.ctx, svc, req)
            }
            BodyKind::Rr => self.handlers.rr(&mut self.ctx, svc, req),
            BodyKind::PollReq => self.handlers.poll_req(&mut self.ctx, svc, req),
            BodyKind::CertConf => self.handlers.cert_conf(&mut self.ctx, svc, req),
            BodyKind::Error => self.handlers.error(&mut self.ctx, svc, req),
            BodyKind::Genm => self.handlers.genm(&mut self.ctx, svc, req),
            other => Err(CmpError::UnexpectedBody {
                expected: "a request body",
                got: other.name().to_owned(),
            }),
        }
    }

    fn error_response(&mut self, err: &CmpError, svc: Services<'_>) -> Result<Message> {
        warn!(%err, "request processing failed, answering with an error message");
        let status_info = PkiStatusInfo {
            status: PkiStatus::Rejection,
            fail_info: err.fail_info(),
            status_strings: Vec::new(),
        };
        body::new_error(
            &self.ctx,
            status_info,
            None,
            vec![err.to_string()],
            self.ctx.options.send_unprotected_errors,
            svc.codec,
            svc.crypto,
        )
    }
}

/// Default handler behaviors, usable as building blocks by custom
/// handler tables
pub mod defaults {
    use super::*;
    use crate::status::{FailureBit, FailureInfo};

    /// Answer a certificate request from the canned response material
    ///
    /// Verifies the proof of possession, defers into polling while the
    /// poll budget lasts, and echoes implicitConfirm when granted.
    pub fn cert_request(
        ctx: &mut ServerContext,
        svc: Services<'_>,
        req: &Message,
    ) -> Result<Message> {
        let rep_kind = match req.body.kind() {
            BodyKind::Ir => BodyKind::Ip,
            BodyKind::Cr | BodyKind::P10cr => BodyKind::Cp,
            BodyKind::Kur => BodyKind::Kup,
            other => {
                return Err(CmpError::UnexpectedBody {
                    expected: "IR, CR, P10CR, or KUR",
                    got: other.name().to_owned(),
                })
            }
        };

        let cert_req_id = match &req.body {
            Body::P10cr(_) => CERT_REQ_ID,
            _ => {
                req.body
                    .cert_req()
                    .and_then(|msgs| msgs.reqs.first())
                    .ok_or(CmpError::UnexpectedBody {
                        expected: "a CertReqMsg",
                        got: "certificate request without entries".into(),
                    })?
                    .cert_req_id
            }
        };
        ctx.cert_req_id = Some(cert_req_id);

        if !verify_popo(ctx, svc, req)? {
            let status = PkiStatusInfo::with_detail(
                PkiStatus::Rejection,
                FailureInfo::single(FailureBit::BadPop),
                None,
            );
            let unprotected = ctx.options.send_unprotected_errors;
            return body::new_cert_rep(
                ctx,
                rep_kind,
                cert_req_id,
                status,
                None,
                Vec::new(),
                unprotected,
                svc.codec,
                svc.crypto,
            );
        }

        if ctx.options.poll_count > 0 {
            // defer: memoize the request and tell the client to poll
            ctx.pending = Some(req.clone());
            let status = PkiStatusInfo::new(PkiStatus::Waiting);
            return body::new_cert_rep(
                ctx,
                rep_kind,
                cert_req_id,
                status,
                None,
                Vec::new(),
                false,
                svc.codec,
                svc.crypto,
            );
        }

        ctx.grant_implicit =
            req.header.has_implicit_confirm() && ctx.options.grant_implicit_confirm;

        let cert = ctx.cert_out.clone().ok_or(CmpError::NullArgument("certOut"))?;
        let status = ctx.status_out.clone();
        let unprotected =
            ctx.options.send_unprotected_errors && status.status == PkiStatus::Rejection;
        body::new_cert_rep(
            ctx,
            rep_kind,
            cert_req_id,
            status,
            Some(cert),
            ctx.ca_pubs_out.clone(),
            unprotected,
            svc.codec,
            svc.crypto,
        )
    }

    /// Answer a polling request: count down the poll budget, then
    /// synthesize the deferred certificate response
    pub fn poll_req(ctx: &mut ServerContext, svc: Services<'_>, req: &Message) -> Result<Message> {
        let ids = match &req.body {
            Body::PollReq(content) => &content.cert_req_ids,
            other => {
                return Err(CmpError::UnexpectedBody {
                    expected: "POLLREQ",
                    got: other.kind().name().to_owned(),
                })
            }
        };
        let id = ids.first().copied().ok_or(CmpError::UnexpectedBody {
            expected: "POLLREQ",
            got: "pollReq without certReqIds".into(),
        })?;
        let expected = ctx.cert_req_id.unwrap_or(CERT_REQ_ID);
        if id != expected {
            return Err(CmpError::UnexpectedRequestId { expected, got: id });
        }

        let pending = ctx
            .pending
            .clone()
            .ok_or(CmpError::NullArgument("pending certificate request"))?;

        if ctx.options.poll_count == 0 {
            ctx.pending = None;
            cert_request(ctx, svc, &pending)
        } else {
            ctx.options.poll_count -= 1;
            body::new_poll_rep(ctx, id, ctx.options.check_after_secs, svc.codec, svc.crypto)
        }
    }

    /// Check the certConf against the issued certificate and answer
    /// pkiconf
    pub fn cert_conf(ctx: &mut ServerContext, svc: Services<'_>, req: &Message) -> Result<Message> {
        let content = match &req.body {
            Body::CertConf(content) => content,
            other => {
                return Err(CmpError::UnexpectedBody {
                    expected: "CERTCONF",
                    got: other.kind().name().to_owned(),
                })
            }
        };

        match content.statuses.first() {
            None => info!("certificate rejected by client: empty certConf"),
            Some(status) => {
                if content.statuses.len() > 1 {
                    warn!("all CertStatus entries but the first are ignored");
                }
                let expected = ctx.cert_req_id.unwrap_or(CERT_REQ_ID);
                if status.cert_req_id != expected {
                    return Err(CmpError::UnexpectedRequestId {
                        expected,
                        got: status.cert_req_id,
                    });
                }

                // recompute the hash of the issued certificate under the
                // session's OWF
                let cert = ctx.cert_out.as_ref().ok_or(CmpError::NullArgument("certOut"))?;
                let owf = ctx
                    .protection_alg()
                    .map(|alg| alg.owf())
                    .unwrap_or(ctx.options.owf_alg);
                let recomputed = svc
                    .crypto
                    .digest(&svc.codec.encode_certificate(cert)?, owf)
                    .map_err(CmpError::internal)?;
                if recomputed != status.cert_hash {
                    return Err(CmpError::WrongCertHash);
                }

                if let Some(si) = &status.status_info {
                    if si.status != PkiStatus::Accepted {
                        info!(status = %si, "certificate rejected by client");
                    }
                }
            }
        }

        body::new_pkiconf(ctx, false, svc.codec, svc.crypto)
    }

    /// Acknowledge a client error notice with pkiconf
    pub fn error(ctx: &mut ServerContext, svc: Services<'_>, req: &Message) -> Result<Message> {
        if let Body::Error(content) = &req.body {
            warn!(status = %content.status_info, "client reported an error");
        }
        body::new_pkiconf(ctx, false, svc.codec, svc.crypto)
    }

    /// Answer a revocation request, accepting it only for the
    /// certificate this responder issues
    pub fn rr(ctx: &mut ServerContext, svc: Services<'_>, req: &Message) -> Result<Message> {
        let details = match &req.body {
            Body::Rr(content) => content.details.first().ok_or(CmpError::UnexpectedBody {
                expected: "RR",
                got: "revocation request without details".into(),
            })?,
            other => {
                return Err(CmpError::UnexpectedBody {
                    expected: "RR",
                    got: other.kind().name().to_owned(),
                })
            }
        };

        let own = ctx.cert_out.as_ref().ok_or(CmpError::NullArgument("certOut"))?;
        if details.cert_id != own.cert_id() {
            return Err(CmpError::RequestNotAccepted);
        }

        let status = ctx.status_out.clone();
        let unprotected =
            ctx.options.send_unprotected_errors && status.status == PkiStatus::Rejection;
        body::new_rp(
            ctx,
            status,
            details.cert_id.clone(),
            unprotected,
            svc.codec,
            svc.crypto,
        )
    }

    /// Mirror the incoming ITAVs into a genp
    pub fn genm(ctx: &mut ServerContext, svc: Services<'_>, req: &Message) -> Result<Message> {
        let itavs = match &req.body {
            Body::Genm(content) => content.itavs.clone(),
            other => {
                return Err(CmpError::UnexpectedBody {
                    expected: "GENM",
                    got: other.kind().name().to_owned(),
                })
            }
        };
        body::new_genp(ctx, itavs, svc.codec, svc.crypto)
    }

    /// Verify the proof of possession of a certificate request
    ///
    /// RAVerified passes only when the responder accepts it; a signature
    /// POP must verify under the public key of the template. A PKCS#10
    /// request carries its own signature, checked when the CSR was
    /// decoded.
    fn verify_popo(ctx: &ServerContext, svc: Services<'_>, req: &Message) -> Result<bool> {
        if matches!(req.body, Body::P10cr(_)) {
            return Ok(true);
        }
        let msg = req
            .body
            .cert_req()
            .and_then(|msgs| msgs.reqs.first())
            .ok_or(CmpError::UnexpectedBody {
                expected: "a CertReqMsg",
                got: "certificate request without entries".into(),
            })?;

        match &msg.popo {
            None => Ok(false),
            Some(ProofOfPossession::RaVerified) => Ok(ctx.options.accept_ra_verified),
            Some(ProofOfPossession::Signature { alg, signature }) => {
                let Some(key) = &msg.cert_template.public_key else {
                    return Ok(false);
                };
                let data = svc.codec.encode_cert_request(msg.cert_req_id, &msg.cert_template)?;
                Ok(svc
                    .crypto
                    .verify_raw_signature(&data, signature, key, *alg)
                    .is_ok())
            }
        }
    }
}
