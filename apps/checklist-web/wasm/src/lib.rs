//! WASM bindings for the NovaCheck inspection checklist
//!
//! All checklist state lives in Rust behind [`ChecklistApp`]. JavaScript
//! renders the forms from `sectionsJson()`, sends admin edits as JSON
//! commands and triggers report generation.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { ChecklistApp } from './pkg/checklist_wasm.js';
//!
//! await init();
//! const app = new ChecklistApp();
//! const sections = JSON.parse(app.sectionsJson());
//! app.dispatch(JSON.stringify({ type: "AddTask", section_id: sections[0].id, label: "Purger" }));
//! const summary = await app.generateReport();
//! ```
//!
//! Task inputs are found by `data-task-id`, or by `data-section-index` and
//! `data-task-index`; the signature pad is the `#signaturePad` canvas.

pub mod decoder;
pub mod dom;
pub mod download;
pub mod logging;
pub mod storage;

use std::cell::RefCell;
use std::rc::Rc;

use checklist_core::{
    ChecklistCommand, ChecklistState, ChecklistStore, DataUrl, Dispatched, LoadSource, PhotoFile,
    ReportConfig, ReportServices, ReportSnapshot, SignatureSurface,
};
use js_sys::Promise;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::File;

pub use decoder::{BrowserImageDecoder, BrowserTimer};
pub use dom::{CanvasSignature, DomArtifactLocator, DomPhotoFile};
pub use download::DownloadSink;
pub use storage::LocalStorage;

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    logging::init(tracing::Level::INFO);
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// What the UI needs to know after an edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub changed: bool,
    pub persisted: bool,
    /// Set when the edit could not be saved and will be lost on reload
    pub warning: Option<String>,
}

impl From<&Dispatched> for DispatchResult {
    fn from(outcome: &Dispatched) -> Self {
        Self {
            changed: outcome.changed,
            persisted: outcome.persisted.is_ok(),
            warning: outcome.persisted.as_ref().err().map(|e| e.to_string()),
        }
    }
}

struct AppState {
    state: ChecklistState<LocalStorage>,
    config: ReportConfig,
}

/// Main NovaCheck application state
#[wasm_bindgen]
pub struct ChecklistApp {
    inner: Rc<RefCell<AppState>>,
}

#[wasm_bindgen]
impl ChecklistApp {
    /// Load the checklist from localStorage, bootstrapping defaults if needed
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ChecklistApp, JsValue> {
        let storage = LocalStorage::open().map_err(to_js)?;
        let state = ChecklistState::load(ChecklistStore::new(storage));
        match state.source() {
            LoadSource::Defaults { reason: Some(e) } => {
                web_sys::console::warn_1(&format!("Using default checklist: {}", e).into())
            }
            LoadSource::Upgraded => {
                web_sys::console::log_1(&"Upgraded stored checklist to the current format".into())
            }
            _ => {}
        }

        Ok(ChecklistApp {
            inner: Rc::new(RefCell::new(AppState {
                state,
                config: ReportConfig::default(),
            })),
        })
    }

    /// Current checklist as JSON, with section and task ids
    #[wasm_bindgen(js_name = sectionsJson)]
    pub fn sections_json(&self) -> Result<String, JsValue> {
        self.inner.borrow().state.checklist().to_json().map_err(to_js)
    }

    /// Apply an admin edit given as a JSON command
    pub fn dispatch(&self, command_json: &str) -> Result<JsValue, JsValue> {
        let command: ChecklistCommand = serde_json::from_str(command_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid command: {}", e)))?;
        let outcome = self
            .inner
            .borrow_mut()
            .state
            .dispatch(&command)
            .map_err(to_js)?;

        let result = DispatchResult::from(&outcome);
        if let Some(warning) = &result.warning {
            web_sys::console::warn_1(&format!("Checklist not saved: {}", warning).into());
        }
        serde_wasm_bindgen::to_value(&result)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Re-read the checklist from storage
    pub fn reload(&self) {
        self.inner.borrow_mut().state.reload();
    }

    /// Store an image file as the report logo. Resolves with its data URL.
    #[wasm_bindgen(js_name = uploadLogo)]
    pub fn upload_logo(&self, file: File) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let url = DomPhotoFile::new(file)
                .read_data_url()
                .await
                .map_err(to_js)?;
            let data = DataUrl::parse(&url).map_err(to_js)?;
            decoder::image_format(&data).map_err(to_js)?;

            inner
                .borrow()
                .state
                .store()
                .save_logo(&url)
                .map_err(to_js)?;
            Ok(JsValue::from_str(&url))
        })
    }

    /// Stored logo as a data URL
    pub fn logo(&self) -> Option<String> {
        self.inner.borrow().state.store().load_logo()
    }

    #[wasm_bindgen(js_name = clearLogo)]
    pub fn clear_logo(&self) -> Result<(), JsValue> {
        self.inner.borrow().state.store().clear_logo().map_err(to_js)
    }

    /// Override report settings with a (partial) JSON `ReportConfig`
    #[wasm_bindgen(js_name = setConfig)]
    pub fn set_config(&self, config_json: &str) -> Result<(), JsValue> {
        let config = ReportConfig::from_json(config_json).map_err(to_js)?;
        self.inner.borrow_mut().config = config;
        Ok(())
    }

    /// Compile the report from the current form state and download it.
    /// Resolves with `{ filename, pageCount, size }`.
    #[wasm_bindgen(js_name = generateReport)]
    pub fn generate_report(&self) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let (snapshot, config) = {
                let app = inner.borrow();
                (ReportSnapshot::capture(&app.state), app.config.clone())
            };

            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or("No document")?;
            let locator = DomArtifactLocator::new(document.clone());
            let signature = CanvasSignature::find(&document);

            let services = ReportServices {
                decoder: &BrowserImageDecoder,
                timer: &BrowserTimer,
                sink: &DownloadSink,
            };
            let generated = checklist_core::generate_report(
                &snapshot,
                &config,
                &services,
                &locator,
                signature.as_ref().map(|s| s as &dyn SignatureSurface),
            )
            .await
            .map_err(to_js)?;

            serde_wasm_bindgen::to_value(&generated)
                .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
        })
    }
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
