//! PDF materialization of a compiled [`Report`]
//!
//! Each run of blocks between page breaks becomes one page. Report coordinates
//! are millimetres from the top-left corner; PDF user space is points from the
//! bottom-left, so every position is scaled and flipped here.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use chrono::Utc;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegDecoder;
use image::{ExtendedColorType, ImageDecoder as _, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, warn};

use crate::decoder::DecodedImage;
use crate::error::ChecklistError;
use crate::report::{BlockRole, DrawInstruction, Report};

const POINTS_PER_MM: f64 = 72.0 / 25.4;
const FONT_NAME: &[u8] = b"F1";

pub fn mm_to_pt(mm: f64) -> f64 {
    mm * POINTS_PER_MM
}

/// Encode text for a simple font using WinAnsiEncoding.
/// Characters outside the encoding become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => match c {
                '€' => 0x80,
                '‚' => 0x82,
                'ƒ' => 0x83,
                '„' => 0x84,
                '…' => 0x85,
                '†' => 0x86,
                '‡' => 0x87,
                'ˆ' => 0x88,
                '‰' => 0x89,
                'Š' => 0x8A,
                '‹' => 0x8B,
                'Œ' => 0x8C,
                'Ž' => 0x8E,
                '‘' => 0x91,
                '’' => 0x92,
                '“' => 0x93,
                '”' => 0x94,
                '•' => 0x95,
                '–' => 0x96,
                '—' => 0x97,
                '˜' => 0x98,
                '™' => 0x99,
                'š' => 0x9A,
                '›' => 0x9B,
                'œ' => 0x9C,
                'ž' => 0x9E,
                'Ÿ' => 0x9F,
                '\t' | '\n' | '\r' => b' ',
                _ => b'?',
            },
        })
        .collect()
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn text_operations(x: f64, y: f64, font_size: f64, text: &str) -> [Operation; 5] {
    [
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_NAME.to_vec()), real(font_size)],
        ),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Renders reports with lopdf and the standard Helvetica font.
///
/// An image that cannot be embedded is replaced by placeholder text at its
/// position, or dropped when it is the logo.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    title: Option<String>,
    photo_placeholder: String,
    signature_placeholder: String,
    placeholder_font_size: f64,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self {
            title: None,
            photo_placeholder: "[Photo illisible]".to_string(),
            signature_placeholder: "[Signature illisible]".to_string(),
            placeholder_font_size: 10.0,
        }
    }
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document title recorded in the info dictionary
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Text drawn in place of photos and signatures that fail to embed
    pub fn with_placeholders(
        mut self,
        photo: impl Into<String>,
        signature: impl Into<String>,
        font_size: f64,
    ) -> Self {
        self.photo_placeholder = photo.into();
        self.signature_placeholder = signature.into();
        self.placeholder_font_size = font_size;
        self
    }

    fn placeholder(&self, role: BlockRole) -> Option<&str> {
        match role {
            BlockRole::Logo => None,
            BlockRole::Signature => Some(self.signature_placeholder.as_str()),
            _ => Some(self.photo_placeholder.as_str()),
        }
    }

    pub fn render(&self, report: &Report) -> Result<Vec<u8>, ChecklistError> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]));

        let page_width = mm_to_pt(report.page_width);
        let page_height = mm_to_pt(report.page_height);

        let mut page_ids = Vec::new();
        let mut image_count = 0usize;
        for blocks in report.pages() {
            let mut operations = Vec::new();
            let mut xobjects = BTreeMap::new();

            for block in blocks {
                match block {
                    DrawInstruction::Text {
                        x,
                        y,
                        font_size,
                        text,
                        ..
                    } => {
                        operations.extend(text_operations(
                            mm_to_pt(*x),
                            page_height - mm_to_pt(*y),
                            *font_size,
                            text,
                        ));
                    }
                    DrawInstruction::Image {
                        role,
                        x,
                        y,
                        width,
                        height,
                        image,
                    } => {
                        let stream = match image_xobject(image) {
                            Ok(stream) => stream,
                            Err(e) => {
                                warn!("Cannot embed {:?} image: {}", role, e);
                                if let Some(text) = self.placeholder(*role) {
                                    // Baseline one text height below the image's top edge
                                    let baseline = mm_to_pt(*y) + self.placeholder_font_size;
                                    operations.extend(text_operations(
                                        mm_to_pt(*x),
                                        page_height - baseline,
                                        self.placeholder_font_size,
                                        text,
                                    ));
                                }
                                continue;
                            }
                        };
                        image_count += 1;
                        let name = format!("Im{}", image_count);
                        let image_id = doc.add_object(stream);
                        xobjects.insert(name.clone(), image_id);

                        let (w, h) = (mm_to_pt(*width), mm_to_pt(*height));
                        // Image space is anchored at its bottom-left corner
                        let bottom = page_height - mm_to_pt(*y + *height);
                        operations.extend([
                            Operation::new("q", vec![]),
                            Operation::new(
                                "cm",
                                vec![
                                    real(w),
                                    real(0.0),
                                    real(0.0),
                                    real(h),
                                    real(mm_to_pt(*x)),
                                    real(bottom),
                                ],
                            ),
                            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                            Operation::new("Q", vec![]),
                        ]);
                    }
                    DrawInstruction::PageBreak => {}
                }
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

            let mut resources = Dictionary::new();
            let mut fonts = Dictionary::new();
            fonts.set("F1", Object::Reference(font_id));
            resources.set("Font", Object::Dictionary(fonts));
            if !xobjects.is_empty() {
                let mut dict = Dictionary::new();
                for (name, id) in xobjects {
                    dict.set(name.into_bytes(), Object::Reference(id));
                }
                resources.set("XObject", Object::Dictionary(dict));
            }

            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        real(page_width),
                        real(page_height),
                    ]),
                ),
                ("Resources", Object::Dictionary(resources)),
                ("Contents", Object::Reference(content_id)),
            ]);
            page_ids.push(doc.add_object(page));
        }

        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(page_ids.len() as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let info_id = self.info(&mut doc);
        doc.trailer.set("Info", Object::Reference(info_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| ChecklistError::Render(format!("Save failed: {}", e)))?;

        debug!(
            "Rendered '{}': {} pages, {} images, {} bytes",
            report.filename,
            page_ids.len(),
            image_count,
            buffer.len()
        );
        Ok(buffer)
    }

    fn info(&self, doc: &mut Document) -> ObjectId {
        let mut info = Dictionary::new();
        if let Some(title) = &self.title {
            info.set(
                "Title",
                Object::String(encode_win_ansi(title), StringFormat::Literal),
            );
        }
        info.set(
            "Producer",
            Object::String(
                format!("checklist-core {}", env!("CARGO_PKG_VERSION")).into_bytes(),
                StringFormat::Literal,
            ),
        );
        let date = Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
        info.set(
            "CreationDate",
            Object::String(date.into_bytes(), StringFormat::Literal),
        );
        doc.add_object(info)
    }
}

fn image_stream(
    width: u32,
    height: u32,
    color_space: &[u8],
    filter: &[u8],
    data: Vec<u8>,
) -> Stream {
    let dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(width as i64)),
        ("Height", Object::Integer(height as i64)),
        ("ColorSpace", Object::Name(color_space.to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
        ("Filter", Object::Name(filter.to_vec())),
    ]);
    // Data is already encoded with the declared filter
    Stream::new(dict, data).with_compression(false)
}

/// Color space of a JPEG the PDF reader can decode as-is
fn jpeg_passthrough(data: &[u8]) -> Option<&'static [u8]> {
    let decoder = JpegDecoder::new(Cursor::new(data)).ok()?;
    match decoder.original_color_type() {
        ExtendedColorType::Rgb8 => Some(b"DeviceRGB"),
        ExtendedColorType::L8 => Some(b"DeviceGray"),
        _ => None,
    }
}

fn image_xobject(image: &DecodedImage) -> Result<Stream, ChecklistError> {
    if image.format == ImageFormat::Jpeg {
        if let Some(color_space) = jpeg_passthrough(&image.data) {
            return Ok(image_stream(
                image.width,
                image.height,
                color_space,
                b"DCTDecode",
                image.data.clone(),
            ));
        }
    }

    let decoded = image::load_from_memory_with_format(&image.data, image.format)
        .map_err(|e| ChecklistError::Render(format!("Image decode failed: {}", e)))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();

    // Flatten transparency onto a white page
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for pixel in decoded.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u16;
        for channel in [r, g, b] {
            let blended = (channel as u16 * alpha + 255 * (255 - alpha)) / 255;
            rgb.push(blended as u8);
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&rgb)
        .map_err(|e| ChecklistError::Render(format!("Image compression failed: {}", e)))?;
    let compressed = encoder
        .finish()
        .map_err(|e| ChecklistError::Render(format!("Image compression failed: {}", e)))?;

    Ok(image_stream(
        width,
        height,
        b"DeviceRGB",
        b"FlateDecode",
        compressed,
    ))
}
