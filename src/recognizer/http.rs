//! Recognizer reached over HTTP.
//!
//! Each line is POSTed as a PNG body (`Content-Type: image/png`); the service answers
//! with `{ "text": "...", "confidence": 0.93 }`, where `confidence` is optional.

use image::{GrayImage, ImageFormat};
use reqwest::blocking::Client;
use std::io::Cursor;
use tracing::debug;

use super::{LineRecognizer, Recognition};
use crate::core::config::RecognizerConfig;
use crate::core::errors::RecognitionError;

/// Blocking HTTP client for a line recognition service.
#[derive(Debug, Clone)]
pub struct HttpRecognizer {
    client: Client,
    endpoint: String,
}

impl HttpRecognizer {
    /// Builds the client; the configured timeout bounds each request.
    pub fn new(config: &RecognizerConfig) -> Result<Self, RecognitionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Encodes a line crop as PNG.
pub(crate) fn encode_png(line: &GrayImage) -> Result<Vec<u8>, RecognitionError> {
    let mut bytes = Vec::new();
    line.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Parses the service answer.
pub(crate) fn parse_response(body: &str) -> Result<Recognition, RecognitionError> {
    let recognition: Recognition =
        serde_json::from_str(body).map_err(|e| RecognitionError::Malformed(e.to_string()))?;
    if !recognition.confidence.is_finite() {
        return Err(RecognitionError::Malformed(format!(
            "confidence {} is not finite",
            recognition.confidence
        )));
    }
    Ok(recognition)
}

impl LineRecognizer for HttpRecognizer {
    fn recognize(&self, line: &GrayImage) -> Result<Recognition, RecognitionError> {
        let body = encode_png(line)?;
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(body)
            .send()
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(RecognitionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let recognition = parse_response(&text)?;
        debug!(
            width = line.width(),
            height = line.height(),
            chars = recognition.text.chars().count(),
            "line recognized"
        );
        Ok(recognition)
    }
}
