//! Image decoding and timers backed by the browser

use std::time::Duration;

use async_trait::async_trait;
use checklist_core::{ChecklistError, DataUrl, DecodedImage, ImageDecoder, ImageSource, Timer};
use futures::future::{self, FutureExt, LocalBoxFuture};
use image::ImageFormat;
use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Event, HtmlImageElement};

use crate::storage::js_message;

/// Decodes through an `<img>` element, so anything the browser can display
/// is measured the same way it is shown on screen
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserImageDecoder;

#[async_trait(?Send)]
impl ImageDecoder for BrowserImageDecoder {
    async fn decode(&self, source: &ImageSource) -> Result<DecodedImage, ChecklistError> {
        let url = source.to_data_url().await?;
        let data = DataUrl::parse(&url)?;
        let format = image_format(&data)?;

        let img = HtmlImageElement::new()
            .map_err(|e| ChecklistError::ImageDecode(js_message(&e)))?;
        let loaded = load_promise(&img);
        img.set_src(&url);
        JsFuture::from(loaded)
            .await
            .map_err(|e| ChecklistError::ImageDecode(js_message(&e)))?;

        DecodedImage::new(format, img.natural_width(), img.natural_height(), data.bytes)
    }
}

/// Format from the declared MIME type, falling back to sniffing the bytes.
/// Only formats the PDF renderer can embed are accepted.
pub fn image_format(data: &DataUrl) -> Result<ImageFormat, ChecklistError> {
    let format = ImageFormat::from_mime_type(&data.mime)
        .or_else(|| image::guess_format(&data.bytes).ok())
        .ok_or_else(|| {
            ChecklistError::ImageDecode(format!("unsupported image type '{}'", data.mime))
        })?;
    match format {
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif => Ok(format),
        other => Err(ChecklistError::ImageDecode(format!(
            "{:?} images cannot be embedded in the report",
            other
        ))),
    }
}

fn load_promise(img: &HtmlImageElement) -> Promise {
    let img = img.clone();

    Promise::new(&mut move |resolve: Function, reject: Function| {
        let onload = Closure::once(Box::new(move |_event: Event| {
            let _ = resolve.call0(&JsValue::NULL);
        }) as Box<dyn FnOnce(_)>);

        let onerror = Closure::once(Box::new(move |_event: Event| {
            let _ = reject.call1(
                &JsValue::NULL,
                &JsValue::from_str("Browser could not load the image"),
            );
        }) as Box<dyn FnOnce(_)>);

        img.set_onload(Some(onload.as_ref().unchecked_ref()));
        img.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        onload.forget();
        onerror.forget();
    })
}

/// `setTimeout`-based timer
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserTimer;

impl Timer for BrowserTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let Some(window) = web_sys::window() else {
            return future::pending().boxed_local();
        };
        let millis = duration.as_millis().min(i32::MAX as u128) as i32;

        let promise = Promise::new(&mut |resolve: Function, _reject: Function| {
            if window
                .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
                .is_err()
            {
                web_sys::console::warn_1(&"setTimeout failed, decode timeout disabled".into());
            }
        });
        JsFuture::from(promise).map(|_| ()).boxed_local()
    }
}
