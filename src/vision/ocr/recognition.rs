// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text recognition model
//!
//! Recognizes the text content of cropped text lines with CTC greedy
//! decoding over a character dictionary.

use ndarray::{Array4, ArrayD, IxDyn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use super::preprocessing::REC_INPUT_HEIGHT;
use super::session::{ExecutionDevice, OnnxSession};
use crate::vision::engine::OcrError;

/// Recognition model input height
pub const RECOGNITION_INPUT_HEIGHT: u32 = REC_INPUT_HEIGHT; // 48

/// Recognized text with confidence score
#[derive(Debug, Clone)]
pub struct RecognizedText {
    /// The recognized text content
    pub text: String,
    /// Mean probability of the emitted characters (0.0-1.0)
    pub confidence: f32,
}

impl RecognizedText {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// PaddleOCR text recognition model
pub struct OcrRecognitionModel {
    session: OnnxSession,
    /// Index 0 is the CTC blank
    dictionary: Vec<char>,
}

impl std::fmt::Debug for OcrRecognitionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrRecognitionModel")
            .field("session", &self.session)
            .field("dictionary_size", &self.dictionary.len())
            .finish()
    }
}

impl OcrRecognitionModel {
    /// Load the recognition model (rec_model.onnx) and its dictionary
    pub fn new(
        model_path: &Path,
        dict_path: &Path,
        device: ExecutionDevice,
        intra_threads: usize,
    ) -> Result<Self, OcrError> {
        if !dict_path.exists() {
            return Err(OcrError::ModelNotFound(format!(
                "character dictionary {}",
                dict_path.display()
            )));
        }

        let dictionary = load_dictionary(dict_path)?;
        info!(
            "Loaded character dictionary with {} characters",
            dictionary.len()
        );

        Ok(Self {
            session: OnnxSession::load(model_path, device, intra_threads)?,
            dictionary,
        })
    }

    /// Recognize text from a tensor produced by `preprocess_for_recognition()`
    pub fn recognize(&self, input: &Array4<f32>) -> Result<RecognizedText, OcrError> {
        let shape = input.shape();
        if shape[0] != 1
            || shape[1] != 3
            || shape[2] != RECOGNITION_INPUT_HEIGHT as usize
            || shape[3] < 4
        {
            return Err(OcrError::Inference(format!(
                "Invalid input shape: {:?}, expected [1, 3, {}, W>=4]",
                shape, RECOGNITION_INPUT_HEIGHT
            )));
        }

        let output = self.session.run(input)?;
        debug!("Recognition output shape: {:?}", output.shape());

        ctc_decode(&output, &self.dictionary)
    }
}

/// Load a character dictionary, one character per line
///
/// A blank token is inserted at index 0 and a space is appended, matching
/// the class layout of PP-OCR recognition heads.
fn load_dictionary(path: &Path) -> Result<Vec<char>, OcrError> {
    let reader = BufReader::new(File::open(path)?);
    let mut dictionary = vec!['\0'];

    for line in reader.lines() {
        let line = line?;
        if let Some(ch) = line.trim_end_matches('\r').chars().next() {
            dictionary.push(ch);
        }
    }
    dictionary.push(' ');

    Ok(dictionary)
}

/// CTC greedy (best path) decoding with blank removal and repeat collapse
fn ctc_decode(output: &ArrayD<f32>, dictionary: &[char]) -> Result<RecognizedText, OcrError> {
    let output_shape = output.shape();
    let (seq_len, num_classes, batched) = match *output_shape {
        [1, t, c] => (t, c, true),
        [t, c] => (t, c, false),
        _ => {
            return Err(OcrError::InvalidOutput(format!(
                "Unexpected recognition output shape: {:?}",
                output_shape
            )))
        }
    };

    let mut text = String::new();
    let mut total_confidence = 0.0f32;
    let mut emitted = 0usize;
    let mut prev_index = 0usize;

    for t in 0..seq_len {
        let mut max_prob = f32::NEG_INFINITY;
        let mut max_index = 0usize;

        for c in 0..num_classes {
            let prob = if batched {
                output[IxDyn(&[0, t, c])]
            } else {
                output[IxDyn(&[t, c])]
            };
            if prob > max_prob {
                max_prob = prob;
                max_index = c;
            }
        }

        if max_index != 0 && max_index != prev_index {
            if let Some(&ch) = dictionary.get(max_index) {
                text.push(ch);
                total_confidence += max_prob;
                emitted += 1;
            }
        }
        prev_index = max_index;
    }

    let confidence = if emitted == 0 {
        0.0
    } else {
        (total_confidence / emitted as f32).clamp(0.0, 1.0)
    };

    Ok(RecognizedText { text, confidence })
}
