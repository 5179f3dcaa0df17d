//! Reading task artifacts and the signature out of the rendered form

use std::rc::Rc;

use async_trait::async_trait;
use checklist_core::{
    ArtifactLocator, ChecklistError, ImageSource, PhotoFile, SignatureSurface, TaskArtifact,
    TaskRef,
};
use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Event, File, FileReader, HtmlCanvasElement, HtmlInputElement};

use crate::storage::js_message;

pub const CHECKBOX: &str = "input[type=\"checkbox\"]";
pub const COMMENT: &str = "input.comment";
pub const PHOTO: &str = "input.photo";
pub const SIGNATURE_CANVAS_ID: &str = "signaturePad";

/// Selector for an input bound to a task by id
pub fn by_task_id(element: &str, at: &TaskRef<'_>) -> String {
    format!("{}[data-task-id=\"{}\"]", element, at.task.id)
}

/// Selector for an input bound to a task by position
pub fn by_position(element: &str, at: &TaskRef<'_>) -> String {
    format!(
        "{}[data-section-index=\"{}\"][data-task-index=\"{}\"]",
        element, at.section_index, at.task_index
    )
}

/// Locates task inputs in the document. Inputs tagged with `data-task-id` win
/// over positional `data-section-index`/`data-task-index` tags.
pub struct DomArtifactLocator {
    document: Document,
}

impl DomArtifactLocator {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn input(&self, element: &str, at: &TaskRef<'_>) -> Option<HtmlInputElement> {
        [by_task_id(element, at), by_position(element, at)]
            .iter()
            .find_map(|selector| self.document.query_selector(selector).ok().flatten())
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
    }
}

impl ArtifactLocator for DomArtifactLocator {
    fn locate(&self, at: &TaskRef<'_>) -> TaskArtifact {
        let completed = self
            .input(CHECKBOX, at)
            .map(|input| input.checked())
            .unwrap_or(false);
        let comment = self
            .input(COMMENT, at)
            .map(|input| input.value())
            .unwrap_or_default();
        let photos = self
            .input(PHOTO, at)
            .and_then(|input| input.files())
            .and_then(|files| files.get(0))
            .map(|file| ImageSource::File(Rc::new(DomPhotoFile::new(file))));

        TaskArtifact::new(completed, &comment, photos)
    }
}

/// A file picked through an `<input type="file">`
pub struct DomPhotoFile {
    file: File,
    name: String,
}

impl DomPhotoFile {
    pub fn new(file: File) -> Self {
        let name = file.name();
        Self { file, name }
    }

    fn read_error(&self, reason: String) -> ChecklistError {
        ChecklistError::Read {
            name: self.name.clone(),
            reason,
        }
    }
}

#[async_trait(?Send)]
impl PhotoFile for DomPhotoFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_data_url(&self) -> Result<String, ChecklistError> {
        let reader = FileReader::new().map_err(|e| self.read_error(js_message(&e)))?;
        let promise = reader_promise(&reader);
        reader
            .read_as_data_url(&self.file)
            .map_err(|e| self.read_error(js_message(&e)))?;

        let result = JsFuture::from(promise)
            .await
            .map_err(|e| self.read_error(js_message(&e)))?;
        result
            .as_string()
            .ok_or_else(|| self.read_error("reader produced no data URL".to_string()))
    }
}

/// Resolves with the reader's result on load, rejects on error
fn reader_promise(reader: &FileReader) -> Promise {
    let reader = reader.clone();

    Promise::new(&mut move |resolve: Function, reject: Function| {
        let reader_for_load = reader.clone();
        let reader_for_error = reader.clone();

        let onload = Closure::once(Box::new(move |_event: Event| {
            let result = reader_for_load.result().unwrap_or(JsValue::NULL);
            let _ = resolve.call1(&JsValue::NULL, &result);
        }) as Box<dyn FnOnce(_)>);

        let onerror = Closure::once(Box::new(move |_event: Event| {
            let reason = reader_for_error
                .error()
                .map(|e| JsValue::from_str(&format!("{}: {}", e.name(), e.message())))
                .unwrap_or_else(|| JsValue::from_str("File could not be read"));
            let _ = reject.call1(&JsValue::NULL, &reason);
        }) as Box<dyn FnOnce(_)>);

        reader.set_onload(Some(onload.as_ref().unchecked_ref()));
        reader.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        onload.forget();
        onerror.forget();
    })
}

/// The signature pad canvas
pub struct CanvasSignature {
    canvas: HtmlCanvasElement,
}

impl CanvasSignature {
    /// Find the signature canvas, if the page has one
    pub fn find(document: &Document) -> Option<Self> {
        document
            .get_element_by_id(SIGNATURE_CANVAS_ID)
            .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
            .map(|canvas| Self { canvas })
    }
}

impl SignatureSurface for CanvasSignature {
    fn rasterize(&self) -> Result<ImageSource, ChecklistError> {
        self.canvas
            .to_data_url()
            .map(ImageSource::DataUrl)
            .map_err(|e| ChecklistError::ImageDecode(js_message(&e)))
    }
}


#[cfg(test)]
#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use checklist_core::Checklist;
    use js_sys::{Array, Uint8Array};
    use wasm_bindgen_test::*;
    use web_sys::{DataTransfer, Element};

    wasm_bindgen_test_configure!(run_in_browser);

    /// Markup mounted into the page for one test, removed on drop
    struct Form {
        document: Document,
        container: Element,
    }

    impl Form {
        fn mount(html: &str) -> Self {
            let document = web_sys::window().unwrap().document().unwrap();
            let container = document.create_element("div").unwrap();
            container.set_inner_html(html);
            document.body().unwrap().append_child(&container).unwrap();
            Self {
                document,
                container,
            }
        }

        fn locate(
            &self,
            checklist: &Checklist,
            section_index: usize,
            task_index: usize,
        ) -> TaskArtifact {
            let section = &checklist.sections()[section_index];
            let at = TaskRef {
                section_index,
                task_index,
                section,
                task: &section.tasks[task_index],
            };
            DomArtifactLocator::new(self.document.clone()).locate(&at)
        }

        fn input(&self, id: &str) -> HtmlInputElement {
            self.document
                .get_element_by_id(id)
                .unwrap()
                .dyn_into::<HtmlInputElement>()
                .unwrap()
        }
    }

    impl Drop for Form {
        fn drop(&mut self) {
            self.container.remove();
        }
    }

    fn file(name: &str, bytes: &[u8]) -> File {
        let parts = Array::new();
        parts.push(&Uint8Array::from(bytes));
        File::new_with_u8_array_sequence(&parts, name).unwrap()
    }

    #[wasm_bindgen_test]
    fn test_missing_inputs_give_empty_artifact() {
        let checklist = Checklist::default_inspection();
        let form = Form::mount("<p>no inputs</p>");

        let artifact = form.locate(&checklist, 0, 0);
        assert!(!artifact.completed);
        assert_eq!(artifact.comment(), None);
        assert!(artifact.photo.is_none());
    }

    #[wasm_bindgen_test]
    fn test_positional_inputs() {
        let checklist = Checklist::default_inspection();
        let form = Form::mount(
            r#"<input type="checkbox" checked data-section-index="1" data-task-index="2">
               <input class="comment" value="  fuite au robinet  " data-section-index="1" data-task-index="2">"#,
        );

        let artifact = form.locate(&checklist, 1, 2);
        assert!(artifact.completed);
        assert_eq!(artifact.comment(), Some("fuite au robinet"));

        // Neighbouring task has no inputs
        let other = form.locate(&checklist, 1, 1);
        assert!(!other.completed);
        assert_eq!(other.comment(), None);
    }

    #[wasm_bindgen_test]
    fn test_task_id_wins_over_position() {
        let checklist = Checklist::default_inspection();
        let task_id = checklist.sections()[0].tasks[0].id;
        let form = Form::mount(&format!(
            r#"<input type="checkbox" checked data-section-index="0" data-task-index="0">
               <input class="comment" value="by position" data-section-index="0" data-task-index="0">
               <input type="checkbox" data-task-id="{id}">
               <input class="comment" value=" by id " data-task-id="{id}">"#,
            id = task_id
        ));

        let artifact = form.locate(&checklist, 0, 0);
        assert!(!artifact.completed);
        assert_eq!(artifact.comment(), Some("by id"));
    }

    #[wasm_bindgen_test]
    fn test_only_first_photo_is_used() {
        let checklist = Checklist::default_inspection();
        let form = Form::mount(
            r#"<input id="photo-input" class="photo" type="file" multiple data-section-index="0" data-task-index="1">"#,
        );

        let transfer = DataTransfer::new().unwrap();
        transfer
            .items()
            .add_with_file(&file("first.png", b"one"))
            .unwrap();
        transfer
            .items()
            .add_with_file(&file("second.png", b"two"))
            .unwrap();
        form.input("photo-input").set_files(Some(&transfer.files()));

        let artifact = form.locate(&checklist, 0, 1);
        match artifact.photo {
            Some(ImageSource::File(photo)) => assert_eq!(photo.name(), "first.png"),
            other => panic!("expected the first file, got {:?}", other),
        }
    }

    #[wasm_bindgen_test]
    fn test_empty_file_input_has_no_photo() {
        let checklist = Checklist::default_inspection();
        let form = Form::mount(
            r#"<input class="photo" type="file" data-section-index="0" data-task-index="0">"#,
        );
        assert!(form.locate(&checklist, 0, 0).photo.is_none());
    }

    #[wasm_bindgen_test]
    async fn test_photo_file_reads_data_url() {
        let photo = DomPhotoFile::new(file("photo.png", &[1, 2, 3]));
        let url = photo.read_data_url().await.unwrap();
        assert!(url.starts_with("data:"));
        assert!(url.ends_with(";base64,AQID"));
    }

    #[wasm_bindgen_test]
    fn test_signature_canvas() {
        let form = Form::mount("<p>no pad</p>");
        assert!(CanvasSignature::find(&form.document).is_none());
        drop(form);

        let form = Form::mount(r#"<canvas id="signaturePad" width="300" height="100"></canvas>"#);
        let signature = CanvasSignature::find(&form.document).unwrap();
        match signature.rasterize().unwrap() {
            ImageSource::DataUrl(url) => assert!(url.starts_with("data:image/png;base64,")),
            other => panic!("expected a data URL, got {:?}", other),
        }
    }
}
