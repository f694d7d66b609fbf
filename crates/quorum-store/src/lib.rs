//! Storage traits and in-memory backends for quorum.
//!
//! Each concern gets its own narrow trait so callers depend only on the
//! reads and writes they actually perform. The in-memory implementations
//! back the test suites and single-process deployments; a database-backed
//! implementation plugs in behind the same traits.

pub mod credential;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod nonce;
pub mod sync_cache;

pub use credential::{Credential, CredentialStore, MemoryCredentialStore};
pub use directory::{
    MeetingDirectory, MemoryMeetingDirectory, MemoryUserDirectory, NewUser, UserDirectory,
};
pub use error::{StoreError, StoreResult};
pub use ledger::{EventLedger, LedgerEntry, MemoryEventLedger};
pub use nonce::{MemoryNonceCache, NonceCache};
pub use sync_cache::{MemorySyncCacheStore, SyncCacheEntry, SyncCacheStore, SyncKey};
