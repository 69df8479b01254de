// msg-intake-store-sqlite/src/lib.rs
// ============================================================================
// Module: Msg Intake SQLite Store Library
// Description: Public API surface for the SQLite-backed message store.
// Purpose: Expose the durable MessageStore implementation.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! Durable [`msg_intake_core::MessageStore`] backed by `SQLite`. Inserts are
//! idempotent via the primary-key uniqueness constraint on `message_id`;
//! duplicate attempts report a normal outcome rather than an error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteMessageStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
