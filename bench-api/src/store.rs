//  STORE.rs
//    by Lut99
//
//  Created:
//    13 Feb 2023, 10:11:36
//  Last edited:
//    20 Feb 2023, 16:27:58
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements the in-memory store of named state documents that an
//!   instance hosts for its peers.
//

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use log::debug;

use specifications::properties::Properties;
use specifications::state::StateItem;

pub use crate::errors::StoreError as Error;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn ports(port: u64) -> Properties { Properties::new().with("Ports", vec![ port ]).with("ServerSetupCompleted", true) }

    #[test]
    fn store_crud() {
        let store: StateStore = StateStore::new();
        assert!(store.get("ServerState").is_none());

        // Create, then find it case-insensitively
        let item: StateItem = store.create("ServerState", ports(6379)).unwrap();
        assert_eq!(item.revision, 0);
        assert_eq!(store.get("serverstate").unwrap().definition, ports(6379));
        assert_eq!(store.create("SERVERSTATE", ports(1)), Err(Error::AlreadyExists{ key: "SERVERSTATE".into() }));

        // Update replaces the whole document
        let item: StateItem = store.update("ServerState", Properties::new().with("Ports", vec![ 1234 ])).unwrap();
        assert_eq!(item.revision, 1);
        assert!(item.get("ServerSetupCompleted").is_none());
        assert!(item.last_modified >= item.created);
        assert_eq!(store.update("Other", ports(1)), Err(Error::NotFound{ key: "Other".into() }));
    }

    #[test]
    fn store_delete_is_idempotent() {
        let store: StateStore = StateStore::new();
        store.create("ServerState", ports(6379)).unwrap();
        assert!(store.delete("ServerState").is_some());
        assert!(store.delete("ServerState").is_none());
        assert!(store.delete("ServerState").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn store_readers_see_whole_documents() {
        let store: Arc<StateStore> = Arc::new(StateStore::new());
        store.create("ServerState", Properties::new().with("A", 0u64).with("B", 0u64)).unwrap();

        // One writer replaces the document with A == B every time; readers must never see them differ
        let writer = {
            let store: Arc<StateStore> = store.clone();
            std::thread::spawn(move || {
                for i in 1..500u64 {
                    store.update("ServerState", Properties::new().with("A", i).with("B", i)).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4).map(|_| {
            let store: Arc<StateStore> = store.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let item: StateItem = store.get("ServerState").unwrap();
                    assert_eq!(item.definition.get_u64("A"), item.definition.get_u64("B"));
                }
            })
        }).collect();

        writer.join().unwrap();
        for r in readers { r.join().unwrap(); }
        assert_eq!(store.get("ServerState").unwrap().revision, 499);
    }
}





/***** LIBRARY *****/
/// The store of state documents hosted by this instance.
///
/// Keys are case-insensitive. Every write replaces the whole document under a single lock, so readers only ever see complete documents.
#[derive(Debug, Default)]
pub struct StateStore {
    /// The documents, keyed by their lowercase key.
    items : RwLock<HashMap<String, StateItem>>,
}

impl StateStore {
    /// Constructor for an empty StateStore.
    #[inline]
    pub fn new() -> Self { Self { items: RwLock::new(HashMap::new()) } }



    /// Returns a copy of the document with the given key, if any.
    pub fn get(&self, key: impl AsRef<str>) -> Option<StateItem> {
        let items = self.items.read().unwrap();
        items.get(&key.as_ref().to_lowercase()).cloned()
    }

    /// Creates a new document.
    ///
    /// # Arguments
    /// - `key`: The key of the new document.
    /// - `definition`: Its contents.
    ///
    /// # Returns
    /// The stored document, including its metadata.
    ///
    /// # Errors
    /// This function errors if a document with the same key already exists.
    pub fn create(&self, key: impl AsRef<str>, definition: Properties) -> Result<StateItem, Error> {
        let key: &str = key.as_ref();
        let mut items = self.items.write().unwrap();
        let lkey: String = key.to_lowercase();
        if items.contains_key(&lkey) { return Err(Error::AlreadyExists{ key: key.into() }); }

        debug!("Creating state document '{}'", key);
        let item: StateItem = StateItem::new(key, definition);
        items.insert(lkey, item.clone());
        Ok(item)
    }

    /// Replaces the contents of an existing document.
    ///
    /// # Arguments
    /// - `key`: The key of the document to replace.
    /// - `definition`: Its new contents.
    ///
    /// # Returns
    /// The stored document, with its revision bumped.
    ///
    /// # Errors
    /// This function errors if there is no document with the given key.
    pub fn update(&self, key: impl AsRef<str>, definition: Properties) -> Result<StateItem, Error> {
        let key: &str = key.as_ref();
        let mut items = self.items.write().unwrap();
        let item: &mut StateItem = match items.get_mut(&key.to_lowercase()) {
            Some(item) => item,
            None       => { return Err(Error::NotFound{ key: key.into() }); },
        };

        debug!("Replacing state document '{}' (revision {})", key, item.revision + 1);
        item.definition     = definition;
        item.revision      += 1;
        item.last_modified  = Utc::now();
        Ok(item.clone())
    }

    /// Removes the document with the given key. Removing an absent document is not an error.
    ///
    /// # Returns
    /// The removed document, if there was one.
    pub fn delete(&self, key: impl AsRef<str>) -> Option<StateItem> {
        let key: &str = key.as_ref();
        let mut items = self.items.write().unwrap();
        let old: Option<StateItem> = items.remove(&key.to_lowercase());
        if old.is_some() { debug!("Deleted state document '{}'", key); }
        old
    }



    /// Returns the number of documents in the store.
    #[inline]
    pub fn len(&self) -> usize { self.items.read().unwrap().len() }

    /// Returns whether the store is empty.
    #[inline]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
