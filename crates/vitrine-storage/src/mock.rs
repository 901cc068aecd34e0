//! In-memory storage backend for tests
//!
//! Records every stored object and deleted key, and can be told to fail
//! uploads or deletes whose key contains a given fragment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;

pub const MOCK_BASE_URL: &str = "https://mock-storage.test";

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone, Default)]
pub struct MockStorage {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    upload_order: Arc<Mutex<Vec<String>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    failing_uploads: Arc<Mutex<Vec<String>>>,
    failing_deletes: Arc<Mutex<Vec<String>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any upload whose key contains `fragment`
    pub fn fail_uploads_matching(&self, fragment: &str) {
        self.failing_uploads
            .lock()
            .unwrap()
            .push(fragment.to_string());
    }

    /// Fail any delete whose key contains `fragment`
    pub fn fail_deletes_matching(&self, fragment: &str) {
        self.failing_deletes
            .lock()
            .unwrap()
            .push(fragment.to_string());
    }

    pub fn insert(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Keys in the order they were uploaded
    pub fn uploaded_keys(&self) -> Vec<String> {
        self.upload_order.lock().unwrap().clone()
    }

    /// Keys passed to `delete`, in call order
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn url_for(key: &str) -> String {
        format!("{}/{}", MOCK_BASE_URL, key)
    }

    fn matches(list: &Mutex<Vec<String>>, key: &str) -> bool {
        list.lock()
            .unwrap()
            .iter()
            .any(|fragment| key.contains(fragment.as_str()))
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        crate::keys::validate_key(storage_key)?;
        if Self::matches(&self.failing_uploads, storage_key) {
            return Err(StorageError::UploadFailed(format!(
                "injected failure for {}",
                storage_key
            )));
        }

        self.objects.lock().unwrap().insert(
            storage_key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        self.upload_order
            .lock()
            .unwrap()
            .push(storage_key.to_string());
        Ok(Self::url_for(storage_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.deleted.lock().unwrap().push(storage_key.to_string());
        if Self::matches(&self.failing_deletes, storage_key) {
            return Err(StorageError::DeleteFailed(format!(
                "injected failure for {}",
                storage_key
            )));
        }
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
