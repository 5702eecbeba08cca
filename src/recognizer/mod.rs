//! Handwritten text recognition of single lines.
//!
//! The recognizer is an external service. It is constructed once at startup and
//! handed to the coordinator by reference; nothing here holds global model state.

mod http;

pub use http::HttpRecognizer;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::core::errors::RecognitionError;

/// Text read from one line image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
    /// Engine confidence in [0, 1]; 1.0 when the engine does not report one.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl Recognition {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// Text with surrounding whitespace removed; `None` when nothing is left.
    pub fn usable_text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Reads the text of one line crop (dark ink on white).
pub trait LineRecognizer: Send + Sync {
    fn recognize(&self, line: &GrayImage) -> Result<Recognition, RecognitionError>;
}

impl<R: LineRecognizer + ?Sized> LineRecognizer for Box<R> {
    fn recognize(&self, line: &GrayImage) -> Result<Recognition, RecognitionError> {
        (**self).recognize(line)
    }
}
