//! Loopback transport
//!
//! Carries requests to a [`Responder`] living in the same process,
//! round-tripping every message through the codec on both legs so that
//! encoding bugs surface in tests. Records the carried messages for
//! transcript assertions.

use std::time::Duration;

use crate::body::{BodyKind, Message};
use crate::ports::codec::Codec;
use crate::ports::crypto::CryptoProvider;
use crate::ports::transport::{Transport, TransportError};
use crate::server::{Responder, ServerHandlers};

use super::{Ed25519Crypto, JsonCodec};

/// Transport connected directly to an in-process responder
pub struct Loopback<H: ServerHandlers = crate::server::DefaultHandlers> {
    /// The server side of the loop
    pub responder: Responder<H>,
    /// Every message carried, requests and responses interleaved
    pub messages: Vec<Message>,
    codec: Box<dyn Codec>,
    crypto: Box<dyn CryptoProvider>,
}

impl<H: ServerHandlers> Loopback<H> {
    /// Loopback over the default JSON codec and Ed25519 crypto
    pub fn new(responder: Responder<H>) -> Self {
        Self::with_collaborators(
            responder,
            Box::new(JsonCodec::new()),
            Box::new(Ed25519Crypto::new()),
        )
    }

    /// Loopback over caller-provided collaborators
    pub fn with_collaborators(
        responder: Responder<H>,
        codec: Box<dyn Codec>,
        crypto: Box<dyn CryptoProvider>,
    ) -> Self {
        Self {
            responder,
            messages: Vec::new(),
            codec,
            crypto,
        }
    }

    /// Body kinds of all carried messages, in order
    pub fn transcript(&self) -> Vec<BodyKind> {
        self.messages.iter().map(|m| m.body.kind()).collect()
    }

    /// Transcript as protocol names, for compact assertions
    pub fn transcript_names(&self) -> Vec<&'static str> {
        self.messages.iter().map(|m| m.body.kind().name()).collect()
    }

    /// The carried messages as (request, response) pairs
    pub fn exchanges(&self) -> Vec<(&Message, &Message)> {
        self.messages.chunks_exact(2).map(|p| (&p[0], &p[1])).collect()
    }
}

impl<H: ServerHandlers> Transport for Loopback<H> {
    fn round_trip(
        &mut self,
        req: &Message,
        _timeout: Duration,
    ) -> std::result::Result<Message, TransportError> {
        self.messages.push(req.clone());

        let rsp = self
            .responder
            .process(req, self.codec.as_ref(), self.crypto.as_ref())
            .map_err(|e| TransportError::BadReply(e.to_string()))?;

        // re-encode on the way back, as a real wire would
        let rsp = self
            .codec
            .dup(&rsp)
            .map_err(|e| TransportError::BadReply(e.to_string()))?;

        self.messages.push(rsp.clone());
        Ok(rsp)
    }
}
