// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR pipeline: detection, orientation, recognition
//!
//! Results are emitted in the page-dictionary layout of recent PaddleOCR
//! releases (`rec_texts` / `rec_scores` / `rec_polys`), so they flow through
//! the same normalizer as any other engine output.

use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::classifier::{AngleClassifier, Orientation};
use super::detection::{OcrDetectionModel, TextBox, DETECTION_INPUT_SIZE};
use super::preprocessing::{
    preprocess_for_classification, preprocess_for_detection, preprocess_for_recognition,
    PreprocessInfo,
};
use super::recognition::OcrRecognitionModel;
use super::session::{cuda_available, ExecutionDevice};
use crate::config::EngineConfig;
use crate::vision::engine::{OcrEngine, OcrError, RawResult};
use crate::vision::image_utils::load_image;

/// Lines recognized below this score are dropped
pub const DROP_SCORE: f32 = 0.5;

/// One page of results in dictionary layout
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageResult {
    pub input_path: String,
    pub rec_texts: Vec<String>,
    pub rec_scores: Vec<f32>,
    pub rec_polys: Vec<[[i64; 2]; 4]>,
    pub textline_orientation_angles: Vec<u16>,
}

/// PaddleOCR models running on ONNX Runtime
#[derive(Debug)]
pub struct PaddleOcrModel {
    detection: OcrDetectionModel,
    classifier: Option<AngleClassifier>,
    recognition: OcrRecognitionModel,
    device: ExecutionDevice,
}

impl PaddleOcrModel {
    /// Load all models from `config.model_dir`
    ///
    /// With `use_gpu` the CUDA provider is tried first; any failure other
    /// than a missing model file falls back to CPU.
    pub fn new(config: &EngineConfig) -> Result<Self, OcrError> {
        if config.use_gpu {
            match Self::load(config, ExecutionDevice::Cuda(config.gpu_device_id)) {
                Ok(model) => {
                    info!("✅ PaddleOCR initialized with GPU support");
                    return Ok(model);
                }
                Err(e @ OcrError::ModelNotFound(_)) => return Err(e),
                Err(e) => {
                    warn!("❌ GPU initialization failed: {}", e);
                    info!("🔄 Attempting CPU fallback...");
                }
            }
        }

        let model = Self::load(config, ExecutionDevice::Cpu)?;
        info!("✅ PaddleOCR initialized with CPU");
        Ok(model)
    }

    fn load(config: &EngineConfig, device: ExecutionDevice) -> Result<Self, OcrError> {
        let threads = config.intra_threads;

        let detection = OcrDetectionModel::new(&config.detection_model_path(), device, threads)?;

        let classifier = if config.use_angle_cls {
            Some(AngleClassifier::new(
                &config.classifier_model_path(),
                device,
                threads,
            )?)
        } else {
            None
        };

        let recognition = OcrRecognitionModel::new(
            &config.recognition_model_path(),
            &config.dictionary_path(),
            device,
            threads,
        )?;

        Ok(Self {
            detection,
            classifier,
            recognition,
            device,
        })
    }

    pub fn device(&self) -> ExecutionDevice {
        self.device
    }

    /// Run the full pipeline on a decoded image
    pub fn process(&self, image: &DynamicImage, input_path: &str) -> Result<PageResult, OcrError> {
        let start = Instant::now();
        let info = PreprocessInfo::new(image, DETECTION_INPUT_SIZE);
        let boxes = self.detection.detect(&preprocess_for_detection(image))?;

        let mut page = PageResult {
            input_path: input_path.to_string(),
            ..PageResult::default()
        };

        for text_box in &boxes {
            let Some((quad, crop)) = crop_region(image, text_box, &info) else {
                continue;
            };

            let orientation = match &self.classifier {
                Some(classifier) => classifier.classify(&preprocess_for_classification(&crop))?,
                None => Orientation::UPRIGHT,
            };
            let flipped = self
                .classifier
                .as_ref()
                .is_some_and(|c| orientation.is_flipped(c.threshold()));
            let crop = if flipped { crop.rotate180() } else { crop };

            let recognized = self
                .recognition
                .recognize(&preprocess_for_recognition(&crop))?;
            if recognized.is_empty() || recognized.confidence < DROP_SCORE {
                continue;
            }

            page.rec_texts.push(recognized.text);
            page.rec_scores.push(recognized.confidence);
            page.rec_polys.push(quad);
            page.textline_orientation_angles
                .push(if flipped { 180 } else { 0 });
        }

        debug!(
            "OCR pipeline: {} boxes, {} lines in {} ms",
            boxes.len(),
            page.rec_texts.len(),
            start.elapsed().as_millis()
        );

        Ok(page)
    }
}

/// Map a detection box back onto the source image and crop it
///
/// Returns `None` for boxes that collapse to less than a pixel.
fn crop_region(
    image: &DynamicImage,
    text_box: &TextBox,
    info: &PreprocessInfo,
) -> Option<([[i64; 2]; 4], DynamicImage)> {
    let polygon = text_box.polygon();
    let mut quad = [[0i64; 2]; 4];
    for (corner, point) in quad.iter_mut().zip(polygon.iter()) {
        let (x, y) = info.map_to_original(point[0], point[1]);
        *corner = [x.round() as i64, y.round() as i64];
    }

    let (img_w, img_h) = image.dimensions();
    let x0 = quad[0][0].clamp(0, img_w as i64) as u32;
    let y0 = quad[0][1].clamp(0, img_h as i64) as u32;
    let x1 = quad[2][0].clamp(0, img_w as i64) as u32;
    let y1 = quad[2][1].clamp(0, img_h as i64) as u32;

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some((quad, image.crop_imm(x0, y0, x1 - x0, y1 - y0)))
}

impl OcrEngine for PaddleOcrModel {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn run(&self, image_path: &Path) -> Result<RawResult, OcrError> {
        let (image, image_info) = load_image(image_path)?;
        debug!(
            "Running OCR on {} ({}x{}, {:?})",
            image_path.display(),
            image_info.width,
            image_info.height,
            image_info.format
        );

        let page = self.process(&image, &image_path.to_string_lossy())?;
        let page = serde_json::to_value(page)
            .map_err(|e| OcrError::InvalidOutput(format!("failed to encode page: {}", e)))?;

        Ok(RawResult::Array(vec![page]))
    }

    fn gpu_compiled(&self) -> Result<bool, OcrError> {
        cuda_available()
    }

    fn current_device(&self) -> Result<String, OcrError> {
        Ok(self.device.to_string())
    }
}
