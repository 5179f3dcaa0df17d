//! Image sources and asynchronous decoding
//!
//! Decoding only has to establish that a source is a usable image and report
//! its intrinsic size; the encoded bytes are kept for the renderer.

use std::fmt;
use std::io::Cursor;
use std::rc::Rc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, ImageReader};

use crate::error::ChecklistError;

/// Parsed `data:` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    /// Parse a base64 `data:<mime>;base64,<payload>` URL
    pub fn parse(url: &str) -> Result<Self, ChecklistError> {
        let rest = url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| ChecklistError::ImageDecode("not a data URL".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ChecklistError::ImageDecode("data URL has no payload".to_string()))?;

        let mut params = header.split(';');
        let mime = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(ChecklistError::ImageDecode(
                "only base64 data URLs are supported".to_string(),
            ));
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| ChecklistError::ImageDecode(format!("invalid base64 payload: {}", e)))?;

        Ok(Self { mime, bytes })
    }

    pub fn encode(mime: &str, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
    }
}

/// A file picked by the user, read lazily
#[async_trait(?Send)]
pub trait PhotoFile {
    fn name(&self) -> &str;

    /// Read the whole file as a data URL
    async fn read_data_url(&self) -> Result<String, ChecklistError>;
}

/// File whose content is already in memory
#[derive(Debug, Clone)]
pub struct InMemoryFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InMemoryFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

fn mime_for(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
}

#[async_trait(?Send)]
impl PhotoFile for InMemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_data_url(&self) -> Result<String, ChecklistError> {
        Ok(DataUrl::encode(mime_for(&self.bytes), &self.bytes))
    }
}

/// File on the local filesystem
#[cfg(feature = "native")]
#[derive(Debug, Clone)]
pub struct DiskFile {
    path: std::path::PathBuf,
    name: String,
}

#[cfg(feature = "native")]
impl DiskFile {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }
}

#[cfg(feature = "native")]
#[async_trait(?Send)]
impl PhotoFile for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_data_url(&self) -> Result<String, ChecklistError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ChecklistError::Read {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(DataUrl::encode(mime_for(&bytes), &bytes))
    }
}

/// Where an image comes from
#[derive(Clone)]
pub enum ImageSource {
    /// Already-available data URL (stored logo, rasterized signature)
    DataUrl(String),
    /// Raw encoded bytes
    Bytes(Vec<u8>),
    /// A file that still has to be read
    File(Rc<dyn PhotoFile>),
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::DataUrl(url) => f
                .debug_tuple("DataUrl")
                .field(&format_args!("{} chars", url.len()))
                .finish(),
            ImageSource::Bytes(bytes) => f
                .debug_tuple("Bytes")
                .field(&format_args!("{} bytes", bytes.len()))
                .finish(),
            ImageSource::File(file) => f.debug_tuple("File").field(&file.name()).finish(),
        }
    }
}

impl ImageSource {
    pub fn file(file: impl PhotoFile + 'static) -> Self {
        ImageSource::File(Rc::new(file))
    }

    /// Short description for log messages
    pub fn describe(&self) -> String {
        match self {
            ImageSource::DataUrl(_) => "data URL".to_string(),
            ImageSource::Bytes(bytes) => format!("{} bytes", bytes.len()),
            ImageSource::File(file) => format!("file '{}'", file.name()),
        }
    }

    /// Resolve the source to a data URL, reading the file if necessary
    pub async fn to_data_url(&self) -> Result<String, ChecklistError> {
        match self {
            ImageSource::DataUrl(url) => Ok(url.clone()),
            ImageSource::Bytes(bytes) => Ok(DataUrl::encode(mime_for(bytes), bytes)),
            ImageSource::File(file) => file.read_data_url().await,
        }
    }

    /// Resolve the source to its encoded bytes
    pub async fn to_bytes(&self) -> Result<Vec<u8>, ChecklistError> {
        match self {
            ImageSource::DataUrl(url) => Ok(DataUrl::parse(url)?.bytes),
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
            ImageSource::File(file) => Ok(DataUrl::parse(&file.read_data_url().await?)?.bytes),
        }
    }
}

/// A verified image with its intrinsic pixel size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Encoded bytes, as received
    pub data: Vec<u8>,
}

impl DecodedImage {
    pub fn new(
        format: ImageFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self, ChecklistError> {
        if width == 0 || height == 0 {
            return Err(ChecklistError::ImageDecode(format!(
                "image has no area ({}x{})",
                width, height
            )));
        }
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    /// Height to draw the image at for the given width, keeping its aspect ratio
    pub fn scaled_height(&self, width: f64) -> f64 {
        width * (self.height as f64 / self.width as f64)
    }
}

/// Turns an [`ImageSource`] into a [`DecodedImage`]. Each call suspends until
/// the image is ready or has failed.
#[async_trait(?Send)]
pub trait ImageDecoder {
    async fn decode(&self, source: &ImageSource) -> Result<DecodedImage, ChecklistError>;
}

/// Decoder built on the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeImageDecoder;

impl NativeImageDecoder {
    pub fn decode_bytes(bytes: Vec<u8>) -> Result<DecodedImage, ChecklistError> {
        let reader = ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| ChecklistError::ImageDecode(e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| ChecklistError::ImageDecode("unrecognized image format".to_string()))?;
        // Full decode so corrupt pixel data is caught here rather than at render time
        let decoded = reader.decode()?;
        DecodedImage::new(format, decoded.width(), decoded.height(), bytes)
    }
}

#[async_trait(?Send)]
impl ImageDecoder for NativeImageDecoder {
    async fn decode(&self, source: &ImageSource) -> Result<DecodedImage, ChecklistError> {
        let bytes = source.to_bytes().await?;
        Self::decode_bytes(bytes)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    /// Encode a solid image of the given size
    pub fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        match format {
            ImageFormat::Jpeg => image::DynamicImage::ImageRgba8(img)
                .to_rgb8()
                .write_to(&mut out, format)
                .unwrap(),
            _ => img.write_to(&mut out, format).unwrap(),
        }
        out.into_inner()
    }

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        encoded(width, height, ImageFormat::Png)
    }
}
