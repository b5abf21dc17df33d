/// Key layout for Fjall partitions
///
/// Partition structure:
/// - `quotes`: quote:{id} -> QuoteRecord (JSON)
/// - `contacts`: contact:{id} -> ContactRecord (JSON)
/// - `subscribers`: subscriber:{id} -> SubscriberRecord (JSON)
///
/// Ids are UUIDv7, so lexical key order is insertion order.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Quotes,
    Contacts,
    Subscribers,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Quotes, Collection::Contacts, Collection::Subscribers];

    pub fn partition_name(self) -> &'static str {
        match self {
            Collection::Quotes => "quotes",
            Collection::Contacts => "contacts",
            Collection::Subscribers => "subscribers",
        }
    }

    fn key_prefix(self) -> &'static str {
        match self {
            Collection::Quotes => "quote:",
            Collection::Contacts => "contact:",
            Collection::Subscribers => "subscriber:",
        }
    }

    /// Encode a record key: {prefix}{id}
    pub fn encode_key(self, id: &str) -> Vec<u8> {
        format!("{}{}", self.key_prefix(), id).into_bytes()
    }

    /// Decode a record key back into its id
    pub fn decode_key(self, key: &[u8]) -> Option<String> {
        let key_str = std::str::from_utf8(key).ok()?;
        key_str.strip_prefix(self.key_prefix()).map(String::from)
    }
}
