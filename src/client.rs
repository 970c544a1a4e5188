//! Client transaction engine
//!
//! Runs complete CMP transactions against a server: ir/cr/p10cr/kur with
//! polling and certificate confirmation, rr with polling, and genm. One
//! [`Session`] drives one transaction on a [`ClientContext`]; the
//! engine blocks on the transport round trip and on polling sleeps, and
//! both suspension points honor cancellation.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::body::{
    self, Body, BodyKind, CertOrEncCert, CertRepMessage, CertResponse, Message, PollRepContent,
    RevRepContent, CERT_REQ_ID,
};
use crate::context::ClientContext;
use crate::error::{CmpError, Result};
use crate::header;
use crate::ports::codec::Codec;
use crate::ports::crypto::CryptoProvider;
use crate::ports::transport::{Transport, TransportError};
use crate::protect;
use crate::status::{FailureInfo, PkiStatus, PkiStatusInfo};
use crate::types::{Certificate, DigestAlg, InfoTypeAndValue};

/// Outcome of a revocation transaction, by reported PKIStatus
///
/// A rejected revocation is an outcome, not an engine error: the server
/// answered, the certificate just stays valid (it may already have been
/// revoked).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// Revocation performed
    Accepted,
    /// Revocation performed with modifications
    GrantedWithMods,
    /// Revocation refused
    Rejection,
    /// Revocation imminent
    RevocationWarning,
    /// Revocation has occurred
    RevocationNotification,
}

impl RevocationOutcome {
    /// Numeric outcome code, as reported by OpenSSL-style tooling
    pub fn code(self) -> u8 {
        match self {
            RevocationOutcome::Accepted => 1,
            RevocationOutcome::GrantedWithMods => 2,
            RevocationOutcome::Rejection => 3,
            RevocationOutcome::RevocationWarning => 5,
            RevocationOutcome::RevocationNotification => 6,
        }
    }
}

/// Granularity of the interruptible polling sleep
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// One client transaction in progress
///
/// Borrows the context and the collaborators for the duration of the
/// session; per-transaction state is cleared when the session
/// terminates, whatever the outcome.
pub struct Session<'a> {
    ctx: &'a mut ClientContext,
    transport: &'a mut dyn Transport,
    codec: &'a dyn Codec,
    crypto: &'a dyn CryptoProvider,
}

impl<'a> Session<'a> {
    /// Open a session over the given context and collaborators
    pub fn new(
        ctx: &'a mut ClientContext,
        transport: &'a mut dyn Transport,
        codec: &'a dyn Codec,
        crypto: &'a dyn CryptoProvider,
    ) -> Self {
        Self {
            ctx,
            transport,
            codec,
            crypto,
        }
    }

    /// Run an initialization request transaction (ir → ip)
    pub fn exec_ir(&mut self) -> Result<Certificate> {
        self.run_cert_request(BodyKind::Ir)
    }

    /// Run a certification request transaction (cr → cp)
    pub fn exec_cr(&mut self) -> Result<Certificate> {
        self.run_cert_request(BodyKind::Cr)
    }

    /// Run a PKCS#10 certification request transaction (p10cr → cp)
    pub fn exec_p10cr(&mut self) -> Result<Certificate> {
        self.run_cert_request(BodyKind::P10cr)
    }

    /// Run a key update transaction (kur → kup)
    pub fn exec_kur(&mut self) -> Result<Certificate> {
        self.run_cert_request(BodyKind::Kur)
    }

    /// Run a revocation transaction (rr → rp)
    pub fn exec_rr(&mut self) -> Result<RevocationOutcome> {
        self.begin()?;
        let result = self.rr_inner();
        self.finish();
        result
    }

    /// Run a general-message exchange (genm → genp), returning the
    /// ITAVs of the response
    pub fn exec_genm(&mut self, itavs: Vec<InfoTypeAndValue>) -> Result<Vec<InfoTypeAndValue>> {
        self.begin()?;
        let result = self.genm_inner(itavs);
        self.finish();
        result
    }

    /// Confirm or reject the certificate issued by a previous
    /// transaction outside a running session
    ///
    /// Non-empty `fail_info` turns the confirmation into a rejection
    /// with the given reason.
    pub fn exchange_cert_conf(
        &mut self,
        fail_info: FailureInfo,
        text: Option<&str>,
    ) -> Result<()> {
        if self.ctx.new_cert.is_none() {
            return Err(CmpError::InvalidArgs(
                "no newly issued certificate to confirm".into(),
            ));
        }
        self.begin()?;
        let result = self.confirm_certificate(self.ctx.options.owf_alg, {
            if fail_info.is_empty() {
                None
            } else {
                Some((fail_info, text.unwrap_or_default().to_owned()))
            }
        });
        self.finish();
        result
    }

    /// Push an error message to the server and wait for its PKIConf
    pub fn exchange_error(
        &mut self,
        status: PkiStatus,
        fail_info: FailureInfo,
        text: Option<&str>,
        error_code: Option<i64>,
        details: Vec<String>,
    ) -> Result<()> {
        self.begin()?;
        let result = (|| {
            let status_info = PkiStatusInfo::with_detail(status, fail_info, text);
            let req = body::new_client_error(
                self.ctx,
                status_info,
                error_code,
                details,
                self.codec,
                self.crypto,
            )?;
            self.send_receive_check(&req, BodyKind::PkiConf).map(|_| ())
        })();
        self.finish();
        result
    }

    // ========================================================================
    // Transaction bodies
    // ========================================================================

    fn run_cert_request(&mut self, op: BodyKind) -> Result<Certificate> {
        self.begin()?;
        let result = self.cert_request_inner(op);
        self.finish();
        result
    }

    fn cert_request_inner(&mut self, op: BodyKind) -> Result<Certificate> {
        let req = match op {
            BodyKind::Ir => body::new_ir(self.ctx, self.codec, self.crypto)?,
            BodyKind::Cr => body::new_cr(self.ctx, self.codec, self.crypto)?,
            BodyKind::P10cr => body::new_p10cr(self.ctx, self.codec, self.crypto)?,
            BodyKind::Kur => body::new_kur(self.ctx, self.codec, self.crypto)?,
            other => {
                return Err(CmpError::InternalError(format!(
                    "{other} is not a certificate request operation"
                )))
            }
        };
        let expected = match op.expected_reply() {
            Some(kind) => kind,
            None => {
                return Err(CmpError::InternalError(format!(
                    "no reply kind known for {op}"
                )))
            }
        };

        let mut reply = self.send_receive_check(&req, expected)?;

        // the server may defer with a pollRep right away
        if let Body::PollRep(content) = &reply.body {
            let first = content.clone();
            reply = self.poll_for_response(Some(first))?;
        }

        let mut rep = self.expect_cert_rep(expected, &reply)?;
        self.save_cert_rep_status(&rep);

        if rep.status_of(CERT_REQ_ID).map(|si| si.status) == Some(PkiStatus::Waiting) {
            reply = self.poll_for_response(None)?;
            rep = self.expect_cert_rep(expected, &reply)?;
            self.save_cert_rep_status(&rep);
        }

        let response = rep
            .response_for(CERT_REQ_ID)
            .ok_or(CmpError::UnexpectedRequestId {
                expected: CERT_REQ_ID,
                got: rep.responses.first().map_or(-1, |r| r.cert_req_id),
            })?;

        match response.status.status {
            PkiStatus::Accepted | PkiStatus::GrantedWithMods => {}
            PkiStatus::Rejection => return Err(CmpError::RequestNotAccepted),
            other => return Err(CmpError::UnexpectedStatus(other)),
        }

        let cert = self.extract_certificate(response)?;
        self.ctx.new_cert = Some(cert.clone());
        self.ctx.ca_pubs.extend(rep.ca_pubs.iter().cloned());
        self.ctx.extra_certs_in.extend(reply.extra_certs.iter().cloned());

        // certHash is computed under the OWF the reply's protection
        // negotiated
        let owf = reply
            .header
            .protection_alg
            .map(|alg| alg.owf())
            .unwrap_or(self.ctx.options.owf_alg);

        if !self.ctx.options.disable_confirm && !reply.header.has_implicit_confirm() {
            let reject = match (&self.ctx.cert_conf_cb, &self.ctx.new_cert) {
                (Some(cb), Some(new_cert)) => cb(new_cert).err(),
                _ => None,
            };
            self.confirm_certificate(owf, reject)?;
        }

        Ok(cert)
    }

    fn rr_inner(&mut self) -> Result<RevocationOutcome> {
        let req = body::new_rr(self.ctx, self.codec, self.crypto)?;
        let mut reply = self.send_receive_check(&req, BodyKind::Rp)?;

        let mut content = self.expect_rp(&reply)?;
        if content.statuses.first().map(|si| si.status) == Some(PkiStatus::Waiting) {
            reply = self.poll_for_response(None)?;
            content = self.expect_rp(&reply)?;
        }

        let status = content
            .statuses
            .first()
            .cloned()
            .ok_or(CmpError::UnexpectedBody {
                expected: "RP",
                got: "revocation response without status".into(),
            })?;
        self.ctx.last_status = Some(status.clone());
        info!(status = %status, "revocation response");

        match status.status {
            PkiStatus::Accepted => Ok(RevocationOutcome::Accepted),
            PkiStatus::GrantedWithMods => Ok(RevocationOutcome::GrantedWithMods),
            PkiStatus::Rejection => {
                warn!("revocation rejected, certificate may already be revoked");
                Ok(RevocationOutcome::Rejection)
            }
            PkiStatus::RevocationWarning => Ok(RevocationOutcome::RevocationWarning),
            PkiStatus::RevocationNotification => Ok(RevocationOutcome::RevocationNotification),
            other => Err(CmpError::UnexpectedStatus(other)),
        }
    }

    fn genm_inner(&mut self, itavs: Vec<InfoTypeAndValue>) -> Result<Vec<InfoTypeAndValue>> {
        let req = body::new_genm(self.ctx, itavs, self.codec, self.crypto)?;
        let reply = self.send_receive_check(&req, BodyKind::Genp)?;
        match reply.body {
            Body::Genp(content) => Ok(content.itavs),
            other => Err(CmpError::UnexpectedBody {
                expected: "GENP",
                got: other.kind().name().to_owned(),
            }),
        }
    }

    // ========================================================================
    // Shared mechanics
    // ========================================================================

    /// Send a request and validate the reply: header invariants,
    /// protection policy, and body kind
    fn send_receive_check(&mut self, req: &Message, expected: BodyKind) -> Result<Message> {
        if self.ctx.is_cancelled() {
            return Err(CmpError::Cancelled);
        }
        self.ctx.record_outgoing(&req.header);

        debug!(body = %req.body.kind(), "sending request");
        let reply = self
            .transport
            .round_trip(req, self.ctx.options.msg_timeout)?;
        debug!(body = %reply.body.kind(), "got response");

        header::verify_reply_header(&mut self.ctx.tx, &reply)?;
        protect::validate_incoming(
            &reply,
            &self.ctx.protection_expectations(),
            self.codec,
            self.crypto,
        )?;

        let got = reply.body.kind();
        let acceptable = got == expected
            // a final response may stand in for a pollRep and vice versa
            || (expected == BodyKind::PollRep && (got.is_cert_rep() || got == BodyKind::Rp))
            || (expected.is_cert_rep() && got == BodyKind::PollRep);

        if !acceptable {
            if let Body::Error(err) = &reply.body {
                self.ctx.last_status = Some(err.status_info.clone());
                return Err(CmpError::UnexpectedBody {
                    expected: expected.name(),
                    got: format!("ERROR ({})", err.status_info),
                });
            }
            return Err(CmpError::UnexpectedBody {
                expected: expected.name(),
                got: got.name().to_owned(),
            });
        }

        Ok(reply)
    }

    /// Poll until the server delivers the final response
    ///
    /// `first` is a pollRep that already arrived in place of the final
    /// response. The total timeout bounds the whole loop: the last poll
    /// is issued exactly when the budget runs out, and the loop fails
    /// with `PollTimeout` once it is exhausted.
    fn poll_for_response(&mut self, first: Option<PollRepContent>) -> Result<Message> {
        info!("received 'waiting' PKIStatus, polling for the final response");
        let unlimited = self.ctx.options.total_timeout.is_zero();
        let mut time_left = self.ctx.options.total_timeout;

        if let Some(content) = first {
            self.wait_check_after(&content, unlimited, &mut time_left)?;
        }

        loop {
            if !unlimited && time_left.is_zero() {
                return Err(CmpError::PollTimeout);
            }

            let preq = body::new_poll_req(self.ctx, self.codec, self.crypto)?;
            // a round trip that times out while polling exhausts the session
            let prep = match self.send_receive_check(&preq, BodyKind::PollRep) {
                Err(CmpError::Transport(TransportError::Timeout(_))) => {
                    return Err(CmpError::PollTimeout)
                }
                other => other?,
            };

            let poll = match &prep.body {
                Body::PollRep(content) => Some(content.clone()),
                _ => None,
            };
            match poll {
                Some(content) => self.wait_check_after(&content, unlimited, &mut time_left)?,
                None => {
                    info!("got final response on polling request");
                    return Ok(prep);
                }
            }
        }
    }

    /// Apply one pollRep's checkAfter to the budget and sleep
    fn wait_check_after(
        &self,
        content: &PollRepContent,
        unlimited: bool,
        time_left: &mut Duration,
    ) -> Result<()> {
        let entry = content.entries.first().ok_or(CmpError::UnexpectedBody {
            expected: "POLLREP",
            got: "pollRep without entries".into(),
        })?;
        if entry.cert_req_id != CERT_REQ_ID {
            return Err(CmpError::UnexpectedRequestId {
                expected: CERT_REQ_ID,
                got: entry.cert_req_id,
            });
        }
        if let Some(reason) = &entry.reason {
            info!(%reason, "server gave a polling reason");
        }

        let mut wait = Duration::from_secs(entry.check_after_secs);
        if !unlimited {
            // clamp the last wait so the final poll goes out exactly at
            // the deadline
            if *time_left > wait {
                *time_left -= wait;
            } else {
                wait = *time_left;
                *time_left = Duration::ZERO;
            }
        }

        info!(seconds = wait.as_secs(), "waiting before next pollReq");
        self.sleep(wait)
    }

    /// Interruptible sleep; returns `Cancelled` as soon as the caller
    /// signals cancellation
    fn sleep(&self, duration: Duration) -> Result<()> {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.ctx.is_cancelled() {
                return Err(CmpError::Cancelled);
            }
            let step = remaining.min(SLEEP_SLICE);
            std::thread::sleep(step);
            remaining -= step;
        }
        Ok(())
    }

    /// Exchange certConf for PKIConf
    fn confirm_certificate(
        &mut self,
        owf: DigestAlg,
        reject: Option<(FailureInfo, String)>,
    ) -> Result<()> {
        if let Some((bits, reason)) = &reject {
            warn!(fail_info = %bits, %reason, "rejecting the issued certificate");
        }
        let conf = body::new_cert_conf(self.ctx, owf, reject, self.codec, self.crypto)?;
        match self.send_receive_check(&conf, BodyKind::PkiConf) {
            Ok(_) => Ok(()),
            Err(CmpError::Transport(e)) => Err(CmpError::PkiConfNotReceived(e.to_string())),
            Err(CmpError::UnexpectedBody { got, .. }) => {
                Err(CmpError::PkiConfNotReceived(format!("got {got}")))
            }
            Err(e) => Err(e),
        }
    }

    fn expect_cert_rep(&self, expected: BodyKind, reply: &Message) -> Result<CertRepMessage> {
        reply
            .body
            .cert_rep()
            .cloned()
            .ok_or(CmpError::UnexpectedBody {
                expected: expected.name(),
                got: reply.body.kind().name().to_owned(),
            })
    }

    fn expect_rp(&self, reply: &Message) -> Result<RevRepContent> {
        match &reply.body {
            Body::Rp(content) => Ok(content.clone()),
            other => Err(CmpError::UnexpectedBody {
                expected: "RP",
                got: other.kind().name().to_owned(),
            }),
        }
    }

    /// Persist status, failure info, and status strings of the first
    /// certificate response
    fn save_cert_rep_status(&mut self, rep: &CertRepMessage) {
        if let Some(status) = rep.status_of(CERT_REQ_ID).or(rep.responses.first().map(|r| &r.status)) {
            self.ctx.last_status = Some(status.clone());
        }
    }

    /// Take the certificate out of a granting response, decrypting the
    /// indirect-POP form with the requested key if necessary
    fn extract_certificate(&self, response: &CertResponse) -> Result<Certificate> {
        let ckp = response
            .certified_key_pair
            .as_ref()
            .ok_or(CmpError::UnexpectedBody {
                expected: "certifiedKeyPair",
                got: "granting response without certificate".into(),
            })?;
        match &ckp.cert_or_enc_cert {
            CertOrEncCert::Certificate(cert) => Ok(cert.clone()),
            CertOrEncCert::EncryptedCert(enc) => {
                let key = self
                    .ctx
                    .new_key
                    .as_ref()
                    .ok_or(CmpError::NullArgument("newPkey"))?;
                let bytes = self
                    .crypto
                    .decrypt_key_transport(enc, &key.private)
                    .map_err(CmpError::internal)?;
                Ok(self.codec.decode_certificate(&bytes)?)
            }
        }
    }

    /// Re-entrancy guard: one transaction per context at a time
    fn begin(&mut self) -> Result<()> {
        if self.ctx.in_flight {
            return Err(CmpError::InvalidArgs(
                "a transaction is already in flight on this context".into(),
            ));
        }
        self.ctx.in_flight = true;
        Ok(())
    }

    /// Terminate the session: clear transactionID and nonces
    fn finish(&mut self) {
        self.ctx.in_flight = false;
        self.ctx.tx.clear();
    }
}
