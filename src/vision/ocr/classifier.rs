// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text line orientation classifier (0 / 180 degrees)

use ndarray::{Array4, ArrayD};
use std::path::Path;

use super::session::{ExecutionDevice, OnnxSession};
use crate::vision::engine::OcrError;

/// Minimum score before a line is treated as upside down
pub const DEFAULT_ROTATE_THRESHOLD: f32 = 0.9;

/// Orientation predicted for one text line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// 0 or 180
    pub angle: u16,
    pub score: f32,
}

impl Orientation {
    pub const UPRIGHT: Orientation = Orientation {
        angle: 0,
        score: 1.0,
    };

    pub fn is_flipped(&self, threshold: f32) -> bool {
        self.angle == 180 && self.score >= threshold
    }
}

#[derive(Debug)]
pub struct AngleClassifier {
    session: OnnxSession,
    threshold: f32,
}

impl AngleClassifier {
    /// Load the classifier model (cls_model.onnx)
    pub fn new(
        model_path: &Path,
        device: ExecutionDevice,
        intra_threads: usize,
    ) -> Result<Self, OcrError> {
        Ok(Self {
            session: OnnxSession::load(model_path, device, intra_threads)?,
            threshold: DEFAULT_ROTATE_THRESHOLD,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Classify a tensor from `preprocess_for_classification()`
    pub fn classify(&self, input: &Array4<f32>) -> Result<Orientation, OcrError> {
        let output = self.session.run(input)?;
        parse_orientation(&output)
    }
}

/// Read a `[1, 2]` softmax output where index 1 means rotated 180 degrees
fn parse_orientation(output: &ArrayD<f32>) -> Result<Orientation, OcrError> {
    let scores: Vec<f32> = output.iter().copied().collect();
    if scores.len() != 2 {
        return Err(OcrError::InvalidOutput(format!(
            "Unexpected classifier output shape: {:?}",
            output.shape()
        )));
    }

    Ok(if scores[1] > scores[0] {
        Orientation {
            angle: 180,
            score: scores[1],
        }
    } else {
        Orientation {
            angle: 0,
            score: scores[0],
        }
    })
}
