/// Fjall-based persistence for intake submissions
///
/// One embedded LSM keyspace holds three append-only collections:
///
/// - quote requests (form fields + attachment metadata, never file bytes)
/// - contact messages
/// - newsletter subscribers
///
/// The keyspace is opened once by the server's startup routine, handed to
/// request handlers through `AppState`, and flushed with
/// [`FjallStore::persist`] during graceful shutdown.
///
/// ## Usage
///
/// ```rust,ignore
/// use quotebox::ledger::FjallStore;
///
/// let store = FjallStore::open("data/ledger")?;
/// store.insert_quote(&record)?;
/// let stored = store.get_quote(&record.id)?;
/// ```

pub mod error;
pub mod partitions;
pub mod store;

pub use error::{LedgerError, Result};
pub use partitions::Collection;
pub use store::{FjallStore, StoreStats};
