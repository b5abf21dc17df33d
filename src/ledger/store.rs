use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::api::models::{ContactRecord, QuoteRecord, SubscriberRecord};

use super::error::{LedgerError, Result};
use super::partitions::Collection;

/// Fjall-backed append-only storage for intake submissions
///
/// Opened once at startup and shared by every request through `AppState`.
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    quotes: PartitionHandle,
    contacts: PartitionHandle,
    subscribers: PartitionHandle,
}

impl FjallStore {
    /// Open or create a Fjall store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let open = |collection: Collection| {
            keyspace.open_partition(collection.partition_name(), PartitionCreateOptions::default())
        };

        let quotes = open(Collection::Quotes)?;
        let contacts = open(Collection::Contacts)?;
        let subscribers = open(Collection::Subscribers)?;

        info!("Fjall store opened successfully");
        Ok(Self {
            keyspace,
            quotes,
            contacts,
            subscribers,
        })
    }

    fn partition(&self, collection: Collection) -> &PartitionHandle {
        match collection {
            Collection::Quotes => &self.quotes,
            Collection::Contacts => &self.contacts,
            Collection::Subscribers => &self.subscribers,
        }
    }

    /// Records are write-once; an existing key is an error, never an overwrite
    fn append<T: Serialize>(&self, collection: Collection, id: &str, record: &T) -> Result<()> {
        let partition = self.partition(collection);
        let key = collection.encode_key(id);

        if partition.contains_key(&key)? {
            return Err(LedgerError::DuplicateRecord(id.to_string()));
        }

        partition.insert(key, serde_json::to_vec(record)?)?;
        debug!(collection = collection.partition_name(), id, "Appended record");
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<Option<T>> {
        match self.partition(collection).get(collection.encode_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    pub fn insert_quote(&self, record: &QuoteRecord) -> Result<()> {
        self.append(Collection::Quotes, &record.id, record)
    }

    pub fn get_quote(&self, id: &str) -> Result<Option<QuoteRecord>> {
        self.fetch(Collection::Quotes, id)
    }

    pub fn insert_contact(&self, record: &ContactRecord) -> Result<()> {
        self.append(Collection::Contacts, &record.id, record)
    }

    pub fn insert_subscriber(&self, record: &SubscriberRecord) -> Result<()> {
        self.append(Collection::Subscribers, &record.id, record)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Cheap readiness probe: reads the first key of every partition
    pub fn check(&self) -> Result<()> {
        for collection in Collection::ALL {
            self.partition(collection).first_key_value()?;
        }
        Ok(())
    }

    /// Record counts per partition
    ///
    /// Taken from fjall's approximate lengths, which are exact here since
    /// keys are never overwritten or removed.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            quote_count: self.quotes.approximate_len(),
            contact_count: self.contacts.approximate_len(),
            subscriber_count: self.subscribers.approximate_len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub quote_count: usize,
    pub contact_count: usize,
    pub subscriber_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{FileMeta, QuoteForm};
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn create_test_store() -> (FjallStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path().join("test_ledger")).unwrap();
        (store, temp_dir)
    }

    fn quote(name: &str) -> QuoteRecord {
        QuoteRecord {
            id: Uuid::now_v7().to_string(),
            form: QuoteForm {
                name: name.to_string(),
                email: "jo@x.com".to_string(),
                service: "Web Design".to_string(),
                message: "hi".to_string(),
                ..QuoteForm::default()
            },
            file_meta: Some(FileMeta {
                filename: "brief.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size: 2048,
            }),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_get_quote() {
        let (store, _temp) = create_test_store();
        let record = quote("Jo");

        store.insert_quote(&record).unwrap();
        let retrieved = store.get_quote(&record.id).unwrap().unwrap();

        assert_eq!(retrieved.form, record.form);
        assert_eq!(retrieved.file_meta.unwrap().size, 2048);
    }

    #[test]
    fn test_get_missing_quote() {
        let (store, _temp) = create_test_store();
        assert!(store.get_quote("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_records_are_write_once() {
        let (store, _temp) = create_test_store();
        let record = quote("Jo");

        store.insert_quote(&record).unwrap();
        let mut changed = record.clone();
        changed.form.name = "Someone else".to_string();

        let err = store.insert_quote(&changed).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateRecord(id) if id == record.id));
        assert_eq!(store.get_quote(&record.id).unwrap().unwrap().form.name, "Jo");
    }

    #[test]
    fn test_check_on_empty_and_filled_store() {
        let (store, _temp) = create_test_store();
        store.check().unwrap();

        store.insert_quote(&quote("Jo")).unwrap();
        store.check().unwrap();
    }

    #[test]
    fn test_stats_and_persist() {
        let (store, _temp) = create_test_store();

        store.insert_quote(&quote("Jo")).unwrap();
        store
            .insert_subscriber(&SubscriberRecord {
                id: Uuid::now_v7().to_string(),
                email: "news@x.com".to_string(),
                created_at: Utc::now(),
            })
            .unwrap();
        store.persist().unwrap();

        let stats = store.stats();
        assert_eq!(
            stats,
            StoreStats {
                quote_count: 1,
                contact_count: 0,
                subscriber_count: 1
            }
        );
    }
}
