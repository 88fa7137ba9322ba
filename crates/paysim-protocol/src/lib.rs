//! Wire protocol for Paysim.
//!
//! This crate defines what terminal clients and the emulator say to each
//! other:
//!
//! - **Frames** ([`Frame`]): the inbound `(cmd, req_id, args)` triple.
//! - **Commands** ([`Command`], [`CommandKind`], [`AdviceKind`]): the
//!   typed form of a frame once its name is resolved.
//! - **Envelopes** ([`Ack`], [`ResultEnvelope`], [`ErrorEnvelope`]):
//!   everything the terminal sends back.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, bytes out.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Frame / envelopes) → Terminal (processing)
//! ```
//!
//! Nothing here touches sessions or sockets.

mod codec;
mod command;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use command::{
    AdviceKind, AutoReversalArgs, Command, CommandKind, Inbound, LoginArgs,
    LogoutArgs, LoyaltyArgs, RefundArgs, SaleArgs, TxnRefArgs,
};
pub use error::{CommandError, ProtocolError};
pub use types::{
    Ack, AckStatus, Capabilities, ErrorEnvelope, Frame, Outbound,
    ResultEnvelope, ResultPayload, ResultStatus,
};
