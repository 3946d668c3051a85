use image::RgbImage;
use tracing::debug;

use super::DocumentError;

#[cfg(feature = "ocr-tesseract")]
pub use self::tesseract_backend::TesseractRecognizer;

/// OCR backend turning an RGB buffer into raw text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> Result<String, DocumentError>;
}

/// Name of the backend `DocumentValidator::from_config` wires in.
#[cfg(feature = "ocr-tesseract")]
pub const OCR_BACKEND: &str = "tesseract";
#[cfg(not(feature = "ocr-tesseract"))]
pub const OCR_BACKEND: &str = "none";

/// Stand-in for builds without the `ocr-tesseract` feature. Every document
/// that needs text is recorded as a recognition failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOcrBackend;

impl TextRecognizer for NoOcrBackend {
    fn recognize(&self, _image: &RgbImage) -> Result<String, DocumentError> {
        Err(DocumentError::Recognition(
            "no OCR backend compiled in (enable the ocr-tesseract feature)".to_string(),
        ))
    }
}

#[cfg(feature = "ocr-tesseract")]
mod tesseract_backend {
    use std::fmt::Display;
    use std::path::PathBuf;

    use image::RgbImage;
    use tesseract::Tesseract;

    use super::{DocumentError, TextRecognizer};
    use crate::config::DocumentConfig;

    /// libtesseract recognizer fed the raw RGB frame. An engine is created
    /// per image; handles are not shared between worker threads.
    #[derive(Debug, Clone)]
    pub struct TesseractRecognizer {
        datapath: Option<PathBuf>,
        language: String,
    }

    fn failed(stage: &str, err: impl Display) -> DocumentError {
        DocumentError::Recognition(format!("tesseract {stage} failed: {err}"))
    }

    impl TesseractRecognizer {
        pub fn new(datapath: Option<PathBuf>, language: impl Into<String>) -> Self {
            Self {
                datapath,
                language: language.into(),
            }
        }

        pub fn from_config(config: &DocumentConfig) -> Self {
            Self::new(config.tessdata_dir.clone(), config.ocr_language.clone())
        }

        fn datapath(&self) -> Result<Option<&str>, DocumentError> {
            self.datapath
                .as_deref()
                .map(|path| {
                    path.to_str()
                        .ok_or_else(|| failed("setup", format!("{} is not UTF-8", path.display())))
                })
                .transpose()
        }
    }

    impl TextRecognizer for TesseractRecognizer {
        fn recognize(&self, image: &RgbImage) -> Result<String, DocumentError> {
            let (width, height) = image.dimensions();
            let width = i32::try_from(width).map_err(|err| failed("setup", err))?;
            let height = i32::try_from(height).map_err(|err| failed("setup", err))?;
            let bytes_per_line = width
                .checked_mul(3)
                .ok_or_else(|| failed("setup", "image row exceeds i32"))?;

            let mut engine = Tesseract::new(self.datapath()?, Some(self.language.as_str()))
                .map_err(|err| failed("init", err))?
                .set_frame(image.as_raw(), width, height, 3, bytes_per_line)
                .map_err(|err| failed("image load", err))?;
            engine.get_text().map_err(|err| failed("recognition", err))
        }
    }
}

/// Decodes uploaded bytes and hands a 3-channel image to the recognizer.
pub struct TextExtractor {
    recognizer: Box<dyn TextRecognizer>,
}

impl TextExtractor {
    pub fn new(recognizer: impl TextRecognizer + 'static) -> Self {
        Self {
            recognizer: Box::new(recognizer),
        }
    }

    /// Extracted text, trimmed. Palette, grayscale and alpha images are
    /// converted to RGB before recognition.
    pub fn extract(&self, bytes: &[u8]) -> Result<String, DocumentError> {
        let decoded = image::load_from_memory(bytes)?;
        debug!(
            width = decoded.width(),
            height = decoded.height(),
            color = ?decoded.color(),
            "decoded document image"
        );

        let rgb = decoded.to_rgb8();
        drop(decoded);

        let text = self.recognizer.recognize(&rgb)?;
        Ok(text.trim().to_string())
    }
}
