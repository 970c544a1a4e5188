//! Common test utilities and fixtures for cmp-session tests

#![allow(dead_code)]

use cmp_session::adapters::{Ed25519Crypto, Identity, JsonCodec, Loopback};
use cmp_session::body::CertificationRequest;
use cmp_session::client::Session;
use cmp_session::context::{ClientContext, ServerContext};
use cmp_session::server::Responder;

/// A client context wired against an in-process responder
///
/// The client sends without protection and tolerates unprotected
/// error replies; the server accepts unprotected requests and
/// signature-protects its responses. Protection application and
/// verification has its own dedicated tests.
pub struct Harness {
    pub ctx: ClientContext,
    pub transport: Loopback,
    pub codec: JsonCodec,
    pub crypto: Ed25519Crypto,
    pub client_id: Identity,
    pub server_id: Identity,
}

/// Route engine logs into the test harness output
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let client_id = Identity::generate("CN=test client", "CN=test CA", 7);
        let server_id = Identity::self_signed("CN=test server", 1);

        let mut srv = ServerContext::new();
        srv.options.accept_unprotected_requests = true;
        srv.cert_out = Some(client_id.cert.clone());
        srv.server_cert = Some(server_id.cert.clone());
        srv.private_key = Some(server_id.key.clone());

        let mut ctx = ClientContext::new();
        ctx.options.unprotected_send = true;
        ctx.options.unprotected_errors = true;
        ctx.client_cert = Some(client_id.cert.clone());
        ctx.private_key = Some(client_id.key.clone());
        ctx.old_cert = Some(client_id.cert.clone());
        ctx.new_key = Some(client_id.key_pair());
        ctx.server_cert = Some(server_id.cert.clone());
        ctx.reference = Some(b"test-reference-1".to_vec());

        Harness {
            ctx,
            transport: Loopback::new(Responder::new(srv)),
            codec: JsonCodec::new(),
            crypto: Ed25519Crypto::new(),
            client_id,
            server_id,
        }
    }

    /// Open a session over the harness wiring
    pub fn session(&mut self) -> Session<'_> {
        Session::new(&mut self.ctx, &mut self.transport, &self.codec, &self.crypto)
    }

    /// Server context of the in-process responder
    pub fn srv(&mut self) -> &mut ServerContext {
        &mut self.transport.responder.ctx
    }

    /// A PKCS#10 request matching the client identity
    pub fn csr(&self) -> CertificationRequest {
        CertificationRequest {
            subject: self.client_id.cert.subject.clone(),
            public_key: self.client_id.cert.public_key.clone(),
            raw: b"pkcs10-request".to_vec(),
        }
    }
}
