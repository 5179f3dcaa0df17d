//! localStorage backend for the checklist store

use checklist_core::{KeyValueStore, StoreError};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::DomException;

/// Browser `localStorage`
pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    pub fn open() -> Result<Self, StoreError> {
        let window =
            web_sys::window().ok_or_else(|| StoreError::Unavailable("No window".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(|e| StoreError::Unavailable(js_message(&e)))?
            .ok_or_else(|| StoreError::Unavailable("No localStorage".to_string()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage
            .get_item(key)
            .map_err(|e| StoreError::Backend(js_message(&e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.storage
            .set_item(key, value)
            .map_err(|e| classify_write_error(&e))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.storage
            .remove_item(key)
            .map_err(|e| StoreError::Backend(js_message(&e)))
    }
}

fn classify_write_error(error: &JsValue) -> StoreError {
    match error.dyn_ref::<DomException>() {
        Some(exception) if is_quota_error(&exception.name()) => StoreError::QuotaExceeded,
        _ => StoreError::Backend(js_message(error)),
    }
}

/// Browsers disagree on the name of the quota exception
pub(crate) fn is_quota_error(name: &str) -> bool {
    matches!(name, "QuotaExceededError" | "NS_ERROR_DOM_QUOTA_REACHED")
}

/// Best-effort message out of a thrown JS value
pub(crate) fn js_message(value: &JsValue) -> String {
    if let Some(exception) = value.dyn_ref::<DomException>() {
        return format!("{}: {}", exception.name(), exception.message());
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
