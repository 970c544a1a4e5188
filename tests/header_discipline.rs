//! Header discipline across whole transactions
//!
//! Exercises the universal properties: nonce echoing, transaction-id
//! stability, pvno, and the encode round trip of every message the
//! engine constructs.

mod common;

use std::collections::HashSet;

use cmp_session::body;
use cmp_session::header::PVNO;
use cmp_session::ports::Codec;

use common::Harness;

#[test]
fn test_reply_echoes_request_nonce_and_transaction_id() {
    let mut h = Harness::new();
    let req = body::new_ir(&h.ctx, &h.codec, &h.crypto).unwrap();
    let rsp = h
        .transport
        .responder
        .process(&req, &h.codec, &h.crypto)
        .unwrap();

    assert_eq!(rsp.header.recip_nonce.as_ref(), Some(&req.header.sender_nonce));
    assert_eq!(rsp.header.transaction_id, req.header.transaction_id);
    assert_eq!(rsp.header.pvno, PVNO);
}

#[test]
fn test_nonce_discipline_over_polled_session() {
    let mut h = Harness::new();
    h.srv().options.poll_count = 1;
    h.srv().options.check_after_secs = 1;
    h.session().exec_ir().unwrap();

    let messages = &h.transport.messages;
    assert!(messages.len() >= 6);

    // every reply echoes the nonce of its request
    for (req, rsp) in h.transport.exchanges() {
        assert_eq!(
            rsp.header.recip_nonce.as_ref(),
            Some(&req.header.sender_nonce),
            "reply {} does not echo the request nonce",
            rsp.body.kind()
        );
    }

    // every follow-up request echoes the previous reply's nonce
    for pair in h.transport.messages.chunks_exact(2).collect::<Vec<_>>().windows(2) {
        let previous_reply = &pair[0][1];
        let next_request = &pair[1][0];
        assert_eq!(
            next_request.header.recip_nonce.as_ref(),
            Some(&previous_reply.header.sender_nonce)
        );
    }

    // one transaction id across the whole session, chosen by the initiator
    let tid = messages[0].header.transaction_id;
    assert!(messages.iter().all(|m| m.header.transaction_id == tid));

    // sender nonces are fresh per message
    let nonces: HashSet<_> = messages
        .iter()
        .map(|m| m.header.sender_nonce.as_bytes().to_vec())
        .collect();
    assert_eq!(nonces.len(), messages.len());

    // pvno is 2 everywhere
    assert!(messages.iter().all(|m| m.header.pvno == PVNO));
}

#[test]
fn test_encode_round_trip_for_all_session_messages() {
    let mut h = Harness::new();
    h.srv().options.poll_count = 1;
    h.session().exec_ir().unwrap();
    h.session().exec_rr().unwrap();

    for msg in &h.transport.messages {
        let copy = h.codec.dup(msg).unwrap();
        assert_eq!(&copy, msg, "encode round trip altered a {}", msg.body.kind());
    }
}

#[test]
fn test_message_time_is_set() {
    let mut h = Harness::new();
    h.session().exec_ir().unwrap();
    assert!(h.transport.messages.iter().all(|m| m.header.message_time.is_some()));
}
