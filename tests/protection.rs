//! Protection policy over whole sessions
//!
//! MAC- and signature-protected exchanges, and rejection of protection
//! that does not verify.

mod common;

use cmp_session::adapters::Identity;
use cmp_session::body::{self, Body};
use cmp_session::status::FailureBit;
use cmp_session::types::{ProtectionAlg, SecretBytes};

use common::Harness;

#[test]
fn test_mac_protected_session() {
    let mut h = Harness::new();
    h.ctx.options.unprotected_send = false;
    h.ctx.secret = Some(SecretBytes::new(b"shared-pass".to_vec()));
    h.srv().secret = Some(SecretBytes::new(b"shared-pass".to_vec()));
    h.srv().options.accept_unprotected_requests = false;

    let cert = h.session().exec_ir().unwrap();
    assert_eq!(cert, h.client_id.cert);

    // both directions actually went out MAC-protected
    for msg in &h.transport.messages {
        assert!(matches!(
            msg.header.protection_alg,
            Some(ProtectionAlg::PasswordMac { .. })
        ));
        assert!(msg.protection.is_some());
    }
}

#[test]
fn test_signature_protected_session() {
    let ca = Identity::self_signed("CN=test CA", 100);
    let mut h = Harness::new();
    h.ctx.options.unprotected_send = false;
    h.srv().options.accept_unprotected_requests = false;
    // the server trusts the CA that issued the client certificate
    h.srv().trusted = vec![ca.cert.clone()];

    let cert = h.session().exec_ir().unwrap();
    assert_eq!(cert, h.client_id.cert);

    for msg in &h.transport.messages {
        assert!(matches!(
            msg.header.protection_alg,
            Some(ProtectionAlg::Signature { .. })
        ));
    }
}

#[test]
fn test_wrong_mac_secret_is_rejected() {
    let mut h = Harness::new();
    h.ctx.options.unprotected_send = false;
    h.ctx.secret = Some(SecretBytes::new(b"client-pass".to_vec()));
    h.srv().secret = Some(SecretBytes::new(b"other-pass".to_vec()));

    let req = body::new_ir(&h.ctx, &h.codec, &h.crypto).unwrap();
    let rsp = h
        .transport
        .responder
        .process(&req, &h.codec, &h.crypto)
        .unwrap();
    match &rsp.body {
        Body::Error(content) => {
            assert!(content
                .status_info
                .fail_info
                .contains(FailureBit::BadMessageCheck));
        }
        other => panic!("expected an ERROR body, got {}", other.kind()),
    }
}

#[test]
fn test_unknown_signer_is_rejected() {
    let mut h = Harness::new();
    h.ctx.options.unprotected_send = false;
    h.srv().options.accept_unprotected_requests = false;
    // server has no anchors at all, so the client signer cannot chain

    let req = body::new_ir(&h.ctx, &h.codec, &h.crypto).unwrap();
    let rsp = h
        .transport
        .responder
        .process(&req, &h.codec, &h.crypto)
        .unwrap();
    match &rsp.body {
        Body::Error(content) => {
            assert!(content
                .status_info
                .fail_info
                .contains(FailureBit::BadMessageCheck));
        }
        other => panic!("expected an ERROR body, got {}", other.kind()),
    }
}
