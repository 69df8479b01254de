// msg-intake-core/src/lib.rs
// ============================================================================
// Module: Msg Intake Core Library
// Description: Public API surface for the Msg Intake core.
// Purpose: Expose domain types, validation, and store interfaces.
// Dependencies: crate::{identifiers, interfaces, memstore, message, timefmt, validate}
// ============================================================================

//! ## Overview
//! Msg Intake core provides the domain model for signed inbound messages:
//! strongly typed identifiers, strict payload validation, and the
//! backend-agnostic [`MessageStore`] interface. It is transport-agnostic and
//! integrates through explicit interfaces rather than embedding into the HTTP
//! layer.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identifiers;
pub mod interfaces;
pub mod memstore;
pub mod message;
pub mod timefmt;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::MessageId;
pub use interfaces::InsertOutcome;
pub use interfaces::MessagePage;
pub use interfaces::MessageQuery;
pub use interfaces::MessageStore;
pub use interfaces::SenderCount;
pub use interfaces::SharedMessageStore;
pub use interfaces::StoreError;
pub use interfaces::StoreStats;
pub use memstore::InMemoryMessageStore;
pub use message::InboundMessage;
pub use message::Message;
pub use validate::FieldError;
pub use validate::MAX_TEXT_CHARS;
pub use validate::ValidationErrors;
pub use validate::validate_inbound;
