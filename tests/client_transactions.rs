//! End-to-end client/server transaction tests
//!
//! Each test runs the client engine against the in-process responder,
//! mirroring the classic CMP mock-server scenarios: immediate issuance,
//! caPubs delivery, polling, poll timeout, implicit confirmation,
//! revocation, and error signalling.

mod common;

use std::time::{Duration, Instant};

use cmp_session::body::BodyKind::*;
use cmp_session::status::{FailureBit, PkiStatus, PkiStatusInfo};
use cmp_session::types::InfoTypeAndValue;
use cmp_session::CmpError;

use common::Harness;

#[test]
fn test_ir_happy_path() {
    let mut h = Harness::new();
    let cert = h.session().exec_ir().unwrap();

    assert_eq!(cert, h.client_id.cert);
    assert_eq!(h.ctx.new_cert.as_ref(), Some(&h.client_id.cert));
    assert!(h.ctx.ca_pubs.is_empty());
    assert_eq!(h.transport.transcript(), vec![Ir, Ip, CertConf, PkiConf]);
    assert_eq!(
        h.ctx.last_status.as_ref().map(|si| si.status),
        Some(PkiStatus::Accepted)
    );
}

#[test]
fn test_ir_with_ca_pubs() {
    let mut h = Harness::new();
    let server_cert = h.server_id.cert.clone();
    h.srv().ca_pubs_out = vec![server_cert.clone(), server_cert.clone()];

    let cert = h.session().exec_ir().unwrap();

    assert_eq!(cert, h.client_id.cert);
    assert_eq!(h.ctx.ca_pubs, vec![server_cert.clone(), server_cert]);
}

#[test]
fn test_ir_with_polling() {
    let mut h = Harness::new();
    h.srv().options.poll_count = 2;
    h.srv().options.check_after_secs = 1;

    let started = Instant::now();
    let cert = h.session().exec_ir().unwrap();
    let elapsed = started.elapsed();

    assert_eq!(cert, h.client_id.cert);
    assert_eq!(
        h.transport.transcript(),
        vec![Ir, Ip, PollReq, PollRep, PollReq, PollRep, PollReq, Ip, CertConf, PkiConf]
    );
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
}

#[test]
fn test_ir_poll_timeout() {
    let mut h = Harness::new();
    h.srv().options.poll_count = 4;
    h.srv().options.check_after_secs = 1;
    h.ctx.options.total_timeout = Duration::from_secs(3);

    let started = Instant::now();
    let err = h.session().exec_ir().unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, CmpError::PollTimeout), "got {err}");
    assert!(h.ctx.new_cert.is_none());
    // the budget admits exactly three one-second waits
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
}

#[test]
fn test_cr_with_implicit_confirm() {
    let mut h = Harness::new();
    h.ctx.options.implicit_confirm = true;
    h.srv().options.grant_implicit_confirm = true;

    let cert = h.session().exec_cr().unwrap();

    assert_eq!(cert, h.client_id.cert);
    // no certConf/PKIConf pair when both sides signal implicit confirm
    assert_eq!(h.transport.transcript(), vec![Cr, Cp]);
}

#[test]
fn test_cr_without_grant_still_confirms() {
    let mut h = Harness::new();
    h.ctx.options.implicit_confirm = true;
    // server does not grant, so the confirmation round still happens
    h.session().exec_cr().unwrap();
    assert_eq!(h.transport.transcript(), vec![Cr, Cp, CertConf, PkiConf]);
}

#[test]
fn test_kur() {
    let mut h = Harness::new();
    let cert = h.session().exec_kur().unwrap();
    assert_eq!(cert, h.client_id.cert);
    assert_eq!(h.transport.transcript(), vec![Kur, Kup, CertConf, PkiConf]);
}

#[test]
fn test_kur_requires_old_cert() {
    let mut h = Harness::new();
    h.ctx.old_cert = None;
    let err = h.session().exec_kur().unwrap_err();
    assert!(matches!(err, CmpError::NullArgument("oldCert")), "got {err}");
    assert!(h.transport.messages.is_empty());
}

#[test]
fn test_p10cr() {
    let mut h = Harness::new();
    h.ctx.csr = Some(h.csr());
    let cert = h.session().exec_p10cr().unwrap();
    assert_eq!(cert, h.client_id.cert);
    assert_eq!(h.transport.transcript(), vec![P10cr, Cp, CertConf, PkiConf]);
}

#[test]
fn test_rr_accepted() {
    let mut h = Harness::new();
    let outcome = h.session().exec_rr().unwrap();
    assert_eq!(outcome, cmp_session::client::RevocationOutcome::Accepted);
    assert_eq!(outcome.code(), 1);
    assert_eq!(h.transport.transcript(), vec![Rr, Rp]);
}

#[test]
fn test_rr_receives_error() {
    let mut h = Harness::new();
    h.srv().status_out = PkiStatusInfo::with_detail(
        PkiStatus::Rejection,
        cmp_session::status::FailureInfo::single(FailureBit::SignerNotTrusted),
        Some("test string"),
    );
    h.srv().options.send_error = true;

    let err = h.session().exec_rr().unwrap_err();
    assert!(matches!(err, CmpError::UnexpectedBody { .. }), "got {err}");

    let status = h.ctx.last_status.as_ref().expect("status recorded");
    assert_eq!(status.status, PkiStatus::Rejection);
    assert!(status.fail_info.contains(FailureBit::SignerNotTrusted));
    assert!(status
        .status_strings
        .iter()
        .any(|s| s.contains("test string")));
}

#[test]
fn test_genm_echoes_itavs() {
    let mut h = Harness::new();
    let itavs = vec![InfoTypeAndValue::with_value(
        "1.3.6.1.5.5.7.4.4",
        serde_json::json!("preferredSymmAlg"),
    )];
    let received = h.session().exec_genm(itavs.clone()).unwrap();
    assert_eq!(received, itavs);
    assert_eq!(h.transport.transcript(), vec![Genm, Genp]);
}

#[test]
fn test_cert_conf_callback_rejection_still_completes() {
    let mut h = Harness::new();
    h.ctx.cert_conf_cb = Some(Box::new(|_cert| {
        Err((
            cmp_session::status::FailureInfo::single(FailureBit::IncorrectData),
            "rejected by policy".to_owned(),
        ))
    }));

    // the engine still exchanges certConf/PKIConf, carrying the rejection
    h.session().exec_ir().unwrap();
    assert_eq!(h.transport.transcript(), vec![Ir, Ip, CertConf, PkiConf]);
}

#[test]
fn test_cancelled_before_send() {
    let mut h = Harness::new();
    h.ctx.cancel_handle().cancel();
    let err = h.session().exec_ir().unwrap_err();
    assert!(matches!(err, CmpError::Cancelled), "got {err}");
    assert!(h.transport.messages.is_empty());
}

#[test]
fn test_transaction_state_cleared_after_session() {
    let mut h = Harness::new();
    h.session().exec_ir().unwrap();
    // a follow-up transaction opens a fresh transaction id
    let first_tid = h.transport.messages[0].header.transaction_id;
    h.session().exec_rr().unwrap();
    let second_tid = h.transport.messages[4].header.transaction_id;
    assert_ne!(first_tid, second_tid);
}

#[test]
fn test_exchange_cert_conf_requires_new_cert() {
    let mut h = Harness::new();
    let err = h
        .session()
        .exchange_cert_conf(cmp_session::status::FailureInfo::EMPTY, None)
        .unwrap_err();
    assert!(matches!(err, CmpError::InvalidArgs(_)), "got {err}");
}

#[test]
fn test_exchange_error_is_acknowledged() {
    let mut h = Harness::new();
    h.session()
        .exchange_error(
            PkiStatus::Rejection,
            cmp_session::status::FailureInfo::single(FailureBit::UnsupportedVersion),
            Some("foo_status"),
            Some(999),
            vec!["foo_details".to_owned()],
        )
        .unwrap();
    assert_eq!(h.transport.transcript(), vec![Error, PkiConf]);
}
