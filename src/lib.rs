//! # cmp-session - Certificate Management Protocol transaction engine
//!
//! This crate implements the CMP (RFC 4210/4211) transaction layer as a
//! pair of cooperating endpoints: a client that drives certificate
//! lifecycle transactions and a server dispatcher that answers them.
//!
//! ## Features
//!
//! - **Client sessions**: ir/cr/p10cr/kur with polling and certificate
//!   confirmation, rr with polling, genm, and standalone certConf and
//!   error exchanges
//! - **Server dispatch**: a handler table with default behaviors for
//!   certificate requests, polling, revocation, confirmation, and
//!   general messages
//! - **Header discipline**: transaction id and nonce bookkeeping with
//!   the RFC 4210 echo invariants enforced on every reply
//! - **Protection policy**: signature or password-based MAC protection,
//!   with the standard exception list for unprotected error signalling
//! - **Pluggable collaborators**: ASN.1 encoding, cryptography, and the
//!   message transport sit behind ports; in-process adapters are
//!   provided for all three
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//! - `status`: PKIStatus, failure-info bits, and rendering
//! - `header`: PKIHeader construction and reply verification
//! - `body`: typed message bodies and the message catalog
//! - `protect`: protection application and validation policy
//! - `client`: the per-session client transaction engine
//! - `server`: the request dispatcher and handler trait
//! - `context`: per-party configuration and transaction state
//! - `ports` / `adapters`: collaborator interfaces and in-process
//!   implementations

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod adapters;
pub mod body;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod header;
pub mod ports;
pub mod protect;
pub mod server;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use error::{CmpError, Result};
pub use status::{FailureBit, FailureInfo, PkiStatus, PkiStatusInfo};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::body::{Body, BodyKind, Message};
    pub use crate::client::{RevocationOutcome, Session};
    pub use crate::config::{ClientOptions, Opt, ServerOptions};
    pub use crate::context::{CancelHandle, ClientContext, ServerContext};
    pub use crate::error::{CmpError, Result};
    pub use crate::ports::{Codec, CryptoProvider, Transport};
    pub use crate::server::{DefaultHandlers, Responder, ServerHandlers, Services};
    pub use crate::status::{FailureBit, FailureInfo, PkiStatus, PkiStatusInfo};
    pub use crate::types::*;
}
