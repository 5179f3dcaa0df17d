//! Hands the rendered report to the browser as a file download

use std::time::Duration;

use async_trait::async_trait;
use checklist_core::{ChecklistError, DocumentSink, Timer};
use js_sys::{Array, Uint8Array};
use wasm_bindgen::JsCast;
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

use crate::decoder::BrowserTimer;
use crate::storage::js_message;

pub const PDF_MIME: &str = "application/pdf";
const REVOKE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadSink;

fn sink_error(e: wasm_bindgen::JsValue) -> ChecklistError {
    ChecklistError::Sink(js_message(&e))
}

#[async_trait(?Send)]
impl DocumentSink for DownloadSink {
    async fn save(&self, filename: &str, bytes: Vec<u8>) -> Result<(), ChecklistError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| ChecklistError::Sink("No document".to_string()))?;

        let parts = Array::new();
        parts.push(&Uint8Array::from(bytes.as_slice()));
        let options = BlobPropertyBag::new();
        options.set_type(PDF_MIME);
        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(sink_error)?;

        let url = Url::create_object_url_with_blob(&blob).map_err(sink_error)?;
        let anchor: HtmlAnchorElement = document
            .create_element("a")
            .map_err(sink_error)?
            .dyn_into()
            .map_err(|_| ChecklistError::Sink("Could not create a download link".to_string()))?;
        anchor.set_href(&url);
        anchor.set_download(filename);
        anchor.click();

        // Some browsers start reading the blob after click() returns
        BrowserTimer.sleep(REVOKE_DELAY).await;
        Url::revoke_object_url(&url).map_err(sink_error)?;
        web_sys::console::log_1(&format!("Downloaded {} ({} bytes)", filename, bytes.len()).into());
        Ok(())
    }
}
