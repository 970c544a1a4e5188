//! Server dispatcher behaviors
//!
//! Proof-of-possession policy, revocation matching, certConf hash
//! checking, the single-pending-transaction guard, and sender-form
//! enforcement.

mod common;

use cmp_session::body::{self, Body};
use cmp_session::status::{FailureBit, PkiStatus};
use cmp_session::types::{DigestAlg, GeneralName, PopoMethod};
use cmp_session::CmpError;

use common::Harness;

fn error_fail_info(rsp: &Body) -> cmp_session::status::FailureInfo {
    match rsp {
        Body::Error(content) => content.status_info.fail_info,
        other => panic!("expected an ERROR body, got {}", other.kind()),
    }
}

#[test]
fn test_ra_verified_pop_rejected_by_default() {
    let mut h = Harness::new();
    h.ctx.options.popo_method = PopoMethod::RaVerified;

    let err = h.session().exec_ir().unwrap_err();
    assert!(matches!(err, CmpError::RequestNotAccepted), "got {err}");

    let status = h.ctx.last_status.as_ref().expect("status recorded");
    assert_eq!(status.status, PkiStatus::Rejection);
    assert!(status.fail_info.contains(FailureBit::BadPop));
    // the rejection ends the session without a confirmation round
    assert_eq!(h.transport.transcript_names(), vec!["IR", "IP"]);
}

#[test]
fn test_ra_verified_pop_accepted_when_configured() {
    let mut h = Harness::new();
    h.ctx.options.popo_method = PopoMethod::RaVerified;
    h.srv().options.accept_ra_verified = true;

    let cert = h.session().exec_ir().unwrap();
    assert_eq!(cert, h.client_id.cert);
}

#[test]
fn test_missing_pop_rejected() {
    let mut h = Harness::new();
    h.ctx.options.popo_method = PopoMethod::None;

    let err = h.session().exec_ir().unwrap_err();
    assert!(matches!(err, CmpError::RequestNotAccepted), "got {err}");
    let status = h.ctx.last_status.as_ref().expect("status recorded");
    assert!(status.fail_info.contains(FailureBit::BadPop));
}

#[test]
fn test_rr_accepts_only_matching_cert() {
    let mut h = Harness::new();
    // revoke a certificate the server does not know
    h.ctx.old_cert = Some(h.server_id.cert.clone());

    let err = h.session().exec_rr().unwrap_err();
    assert!(matches!(err, CmpError::UnexpectedBody { .. }), "got {err}");

    let status = h.ctx.last_status.as_ref().expect("status recorded");
    assert_eq!(status.status, PkiStatus::Rejection);
    assert!(status.fail_info.contains(FailureBit::BadRequest));
}

#[test]
fn test_cert_conf_with_wrong_hash_is_refused() {
    let mut h = Harness::new();
    // confirm a different certificate than the one the server issued
    h.ctx.new_cert = Some(h.server_id.cert.clone());
    let conf = body::new_cert_conf(&h.ctx, DigestAlg::Sha256, None, &h.codec, &h.crypto).unwrap();

    let rsp = h
        .transport
        .responder
        .process(&conf, &h.codec, &h.crypto)
        .unwrap();
    assert!(error_fail_info(&rsp.body).contains(FailureBit::BadCertId));
}

#[test]
fn test_second_transaction_refused_while_pending() {
    let mut h = Harness::new();
    h.srv().options.poll_count = 1;

    let first = body::new_ir(&h.ctx, &h.codec, &h.crypto).unwrap();
    let rsp = h
        .transport
        .responder
        .process(&first, &h.codec, &h.crypto)
        .unwrap();
    match &rsp.body {
        Body::Ip(rep) => assert_eq!(rep.responses[0].status.status, PkiStatus::Waiting),
        other => panic!("expected IP, got {}", other.kind()),
    }

    // a second request opens a different transaction id
    let second = body::new_ir(&h.ctx, &h.codec, &h.crypto).unwrap();
    assert_ne!(
        first.header.transaction_id,
        second.header.transaction_id
    );
    let rsp = h
        .transport
        .responder
        .process(&second, &h.codec, &h.crypto)
        .unwrap();
    assert!(error_fail_info(&rsp.body).contains(FailureBit::TransactionIdInUse));
}

#[test]
fn test_non_directory_sender_refused() {
    let mut h = Harness::new();
    let mut req = body::new_ir(&h.ctx, &h.codec, &h.crypto).unwrap();
    req.header.sender = GeneralName::Dns("client.example.net".into());

    let rsp = h
        .transport
        .responder
        .process(&req, &h.codec, &h.crypto)
        .unwrap();
    assert!(error_fail_info(&rsp.body).contains(FailureBit::BadDataFormat));
}

#[test]
fn test_send_error_answers_every_request() {
    let mut h = Harness::new();
    h.srv().options.send_error = true;

    let req = body::new_genm(&h.ctx, Vec::new(), &h.codec, &h.crypto).unwrap();
    let rsp = h
        .transport
        .responder
        .process(&req, &h.codec, &h.crypto)
        .unwrap();
    assert!(matches!(rsp.body, Body::Error(_)));
}
