// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text detection model
//!
//! Runs the DB detection network and turns its probability map into
//! quadrilateral text boxes.

use ndarray::{Array4, ArrayViewD, IxDyn};
use std::path::Path;
use tracing::debug;

use super::preprocessing::OCR_INPUT_SIZE;
use super::session::{ExecutionDevice, OnnxSession};
use crate::vision::engine::OcrError;

/// Expected input size for detection model
pub const DETECTION_INPUT_SIZE: u32 = OCR_INPUT_SIZE; // 640x640

/// Pixel probability above which a pixel belongs to text
pub const DEFAULT_PIXEL_THRESHOLD: f32 = 0.3;

/// Mean region probability required to keep a box
pub const DEFAULT_BOX_THRESHOLD: f32 = 0.6;

/// Expansion ratio applied to shrunk DB regions
pub const DEFAULT_UNCLIP_RATIO: f32 = 1.5;

/// Minimum pixel count for a region
const MIN_REGION_PIXELS: usize = 10;

/// A detected text box with location and confidence
#[derive(Debug, Clone)]
pub struct TextBox {
    /// X coordinate of top-left corner (in preprocessed image space)
    pub x: f32,
    /// Y coordinate of top-left corner (in preprocessed image space)
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f32,
}

impl TextBox {
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.confidence > 0.0
    }

    /// Corner points clockwise from top-left
    pub fn polygon(&self) -> [[f32; 2]; 4] {
        let (x1, y1) = (self.x + self.width, self.y + self.height);
        [[self.x, self.y], [x1, self.y], [x1, y1], [self.x, y1]]
    }
}

/// Bounds and score of one connected region of text pixels
#[derive(Debug, Clone, Copy, PartialEq)]
struct Region {
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
    count: usize,
    sum_conf: f32,
}

/// PaddleOCR text detection model
#[derive(Debug)]
pub struct OcrDetectionModel {
    session: OnnxSession,
    pixel_threshold: f32,
    box_threshold: f32,
    unclip_ratio: f32,
}

impl OcrDetectionModel {
    /// Load the detection model (det_model.onnx)
    pub fn new(
        model_path: &Path,
        device: ExecutionDevice,
        intra_threads: usize,
    ) -> Result<Self, OcrError> {
        let session = OnnxSession::load(model_path, device, intra_threads)?;

        Ok(Self {
            session,
            pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
            box_threshold: DEFAULT_BOX_THRESHOLD,
            unclip_ratio: DEFAULT_UNCLIP_RATIO,
        })
    }

    /// Run text detection on a tensor from `preprocess_for_detection()`
    pub fn detect(&self, input: &Array4<f32>) -> Result<Vec<TextBox>, OcrError> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != 3 {
            return Err(OcrError::Inference(format!(
                "Invalid input shape: {:?}, expected [1, 3, H, W]",
                shape
            )));
        }
        let (input_height, input_width) = (shape[2], shape[3]);

        let output = self.session.run(input)?;
        debug!("Detection output shape: {:?}", output.shape());

        let boxes = parse_probability_map(
            output.view(),
            input_height,
            input_width,
            self.pixel_threshold,
            self.box_threshold,
            self.unclip_ratio,
        )?;

        debug!("Detected {} text regions", boxes.len());
        Ok(boxes)
    }
}

/// Turn a `[1, 1, H, W]` or `[1, H, W]` probability map into boxes, sorted
/// top to bottom then left to right
fn parse_probability_map(
    output: ArrayViewD<f32>,
    input_height: usize,
    input_width: usize,
    pixel_threshold: f32,
    box_threshold: f32,
    unclip_ratio: f32,
) -> Result<Vec<TextBox>, OcrError> {
    let output_shape = output.shape().to_vec();
    let (prob_height, prob_width) = match output_shape.as_slice() {
        [1, 1, h, w] => (*h, *w),
        [1, h, w] => (*h, *w),
        _ => {
            return Err(OcrError::InvalidOutput(format!(
                "Unexpected detection output shape: {:?}",
                output_shape
            )))
        }
    };
    let is_4d = output_shape.len() == 4;
    let prob_at = |x: usize, y: usize| -> f32 {
        if is_4d {
            output[IxDyn(&[0, 0, y, x])]
        } else {
            output[IxDyn(&[0, y, x])]
        }
    };

    let scale_y = input_height as f32 / prob_height as f32;
    let scale_x = input_width as f32 / prob_width as f32;

    let mut visited = vec![vec![false; prob_width]; prob_height];
    let mut text_boxes = Vec::new();

    for y in 0..prob_height {
        for x in 0..prob_width {
            if visited[y][x] || prob_at(x, y) < pixel_threshold {
                continue;
            }

            let region = flood_fill(
                &prob_at,
                &mut visited,
                (x, y),
                (prob_width, prob_height),
                pixel_threshold,
            );

            if region.count < MIN_REGION_PIXELS {
                continue;
            }

            let score = region.sum_conf / region.count as f32;
            if score < box_threshold {
                continue;
            }

            let (x0, y0, x1, y1) = unclip(
                region.min_x as f32,
                region.min_y as f32,
                (region.max_x + 1) as f32,
                (region.max_y + 1) as f32,
                unclip_ratio,
                prob_width as f32,
                prob_height as f32,
            );

            let text_box = TextBox {
                x: x0 * scale_x,
                y: y0 * scale_y,
                width: (x1 - x0) * scale_x,
                height: (y1 - y0) * scale_y,
                confidence: score,
            };
            if text_box.is_valid() {
                text_boxes.push(text_box);
            }
        }
    }

    sort_reading_order(&mut text_boxes);
    Ok(text_boxes)
}

/// Iterative 4-connected flood fill from `start`
fn flood_fill<F: Fn(usize, usize) -> f32>(
    prob_at: &F,
    visited: &mut [Vec<bool>],
    start: (usize, usize),
    (width, height): (usize, usize),
    threshold: f32,
) -> Region {
    let mut stack = vec![start];
    let mut region = Region {
        min_x: start.0,
        max_x: start.0,
        min_y: start.1,
        max_y: start.1,
        count: 0,
        sum_conf: 0.0,
    };

    while let Some((x, y)) = stack.pop() {
        if x >= width || y >= height || visited[y][x] {
            continue;
        }

        let prob = prob_at(x, y);
        if prob < threshold {
            continue;
        }

        visited[y][x] = true;
        region.count += 1;
        region.sum_conf += prob;
        region.min_x = region.min_x.min(x);
        region.max_x = region.max_x.max(x);
        region.min_y = region.min_y.min(y);
        region.max_y = region.max_y.max(y);

        if x > 0 {
            stack.push((x - 1, y));
        }
        if x + 1 < width {
            stack.push((x + 1, y));
        }
        if y > 0 {
            stack.push((x, y - 1));
        }
        if y + 1 < height {
            stack.push((x, y + 1));
        }
    }

    region
}

/// Grow a rectangle by `area * ratio / perimeter` on every side, clamped
/// to the map bounds
fn unclip(
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    ratio: f32,
    max_x: f32,
    max_y: f32,
) -> (f32, f32, f32, f32) {
    let (w, h) = (x1 - x0, y1 - y0);
    let perimeter = 2.0 * (w + h);
    if perimeter <= 0.0 {
        return (x0, y0, x1, y1);
    }
    let distance = w * h * ratio / perimeter;
    (
        (x0 - distance).max(0.0),
        (y0 - distance).max(0.0),
        (x1 + distance).min(max_x),
        (y1 + distance).min(max_y),
    )
}

/// Top-to-bottom, then left-to-right; boxes whose tops differ by less than
/// half a line height count as the same line
fn sort_reading_order(boxes: &mut [TextBox]) {
    boxes.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    for i in 1..boxes.len() {
        let mut j = i;
        while j > 0 {
            let (prev, cur) = (&boxes[j - 1], &boxes[j]);
            let same_line = (cur.y - prev.y).abs() < prev.height.min(cur.height) / 2.0;
            if same_line && cur.x < prev.x {
                boxes.swap(j - 1, j);
                j -= 1;
            } else {
                break;
            }
        }
    }
}
