// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for PaddleOCR

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Target size for PaddleOCR detection model
pub const OCR_INPUT_SIZE: u32 = 640;

/// Recognition model input height (PP-OCR English models use 48)
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Maximum width for recognition model input
pub const REC_MAX_WIDTH: u32 = 320;

/// Angle classifier input size (height x width)
pub const CLS_INPUT_HEIGHT: u32 = 48;
pub const CLS_INPUT_WIDTH: u32 = 192;

/// Mean values for detection normalization (ImageNet)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for detection normalization (ImageNet)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Recognition and classification map pixels to [-1, 1]
const REC_MEAN: f32 = 0.5;
const REC_STD: f32 = 0.5;

/// Preprocess an image for OCR detection
///
/// Steps:
/// 1. Resize with aspect ratio preservation to OCR_INPUT_SIZE
/// 2. Pad to square with gray (128) background
/// 3. Normalize with ImageNet mean/std: (pixel/255 - mean) / std
/// 4. Convert to NCHW tensor format [1, 3, H, W]
pub fn preprocess_for_detection(image: &DynamicImage) -> Array4<f32> {
    let resized = resize_with_padding(image, OCR_INPUT_SIZE);
    let rgb = resized.to_rgb8();

    let mut tensor = Array4::zeros((1, 3, OCR_INPUT_SIZE as usize, OCR_INPUT_SIZE as usize));

    for y in 0..OCR_INPUT_SIZE as usize {
        for x in 0..OCR_INPUT_SIZE as usize {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            }
        }
    }

    tensor
}

/// Preprocess a cropped text region for recognition
///
/// Height is fixed at 48, width follows the aspect ratio (4..=320 pixels).
pub fn preprocess_for_recognition(image: &DynamicImage) -> Array4<f32> {
    let (orig_w, orig_h) = image.dimensions();

    let scale = REC_INPUT_HEIGHT as f32 / orig_h.max(1) as f32;
    let new_width = ((orig_w as f32 * scale).round() as u32)
        .min(REC_MAX_WIDTH)
        .max(4);

    let resized = image.resize_exact(
        new_width,
        REC_INPUT_HEIGHT,
        image::imageops::FilterType::Lanczos3,
    );

    normalize_line(&resized.to_rgb8(), new_width as usize, REC_INPUT_HEIGHT as usize)
}

/// Preprocess a cropped text region for the angle classifier
///
/// Resized to height 48 keeping the aspect ratio, then zero-padded on the
/// right to a fixed width of 192.
pub fn preprocess_for_classification(image: &DynamicImage) -> Array4<f32> {
    let (orig_w, orig_h) = image.dimensions();

    let scale = CLS_INPUT_HEIGHT as f32 / orig_h.max(1) as f32;
    let new_width = ((orig_w as f32 * scale).ceil() as u32).clamp(1, CLS_INPUT_WIDTH);

    let resized = image.resize_exact(
        new_width,
        CLS_INPUT_HEIGHT,
        image::imageops::FilterType::Triangle,
    );

    normalize_line(&resized.to_rgb8(), CLS_INPUT_WIDTH as usize, CLS_INPUT_HEIGHT as usize)
}

/// Normalize to [-1, 1] into a `[1, 3, height, width]` tensor; columns past
/// the image width stay zero
fn normalize_line(rgb: &RgbImage, width: usize, height: usize) -> Array4<f32> {
    let mut tensor = Array4::zeros((1, 3, height, width));
    let filled = width.min(rgb.width() as usize);

    for y in 0..height {
        for x in 0..filled {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (pixel[c] as f32 / 255.0 - REC_MEAN) / REC_STD;
            }
        }
    }

    tensor
}

/// Resize image with aspect ratio preservation and padding
///
/// The image is scaled to fit within target_size x target_size
/// while preserving aspect ratio, then padded with gray (128)
/// to reach the target dimensions.
pub fn resize_with_padding(image: &DynamicImage, target_size: u32) -> DynamicImage {
    let (orig_w, orig_h) = image.dimensions();

    if orig_w == 0 || orig_h == 0 {
        return DynamicImage::ImageRgb8(RgbImage::from_pixel(
            target_size,
            target_size,
            Rgb([128, 128, 128]),
        ));
    }

    let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);

    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

    let resized = image.resize_exact(new_w, new_h, image::imageops::FilterType::Lanczos3);
    let rgb = resized.to_rgb8();

    let mut output = RgbImage::from_pixel(target_size, target_size, Rgb([128, 128, 128]));

    let offset_x = (target_size - new_w) / 2;
    let offset_y = (target_size - new_h) / 2;

    for y in 0..new_h {
        for x in 0..new_w {
            output.put_pixel(x + offset_x, y + offset_y, *rgb.get_pixel(x, y));
        }
    }

    DynamicImage::ImageRgb8(output)
}

/// Scaling factor and offsets used during detection preprocessing
///
/// Maps detection results back to original coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PreprocessInfo {
    /// Scale factor applied
    pub scale: f32,
    /// X offset from padding
    pub offset_x: u32,
    /// Y offset from padding
    pub offset_y: u32,
    /// Original image width
    pub original_width: u32,
    /// Original image height
    pub original_height: u32,
}

impl PreprocessInfo {
    pub fn new(image: &DynamicImage, target_size: u32) -> Self {
        let (orig_w, orig_h) = image.dimensions();

        if orig_w == 0 || orig_h == 0 {
            return Self {
                scale: 1.0,
                offset_x: 0,
                offset_y: 0,
                original_width: orig_w,
                original_height: orig_h,
            };
        }

        let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
        let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
        let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            offset_x: (target_size - new_w) / 2,
            offset_y: (target_size - new_h) / 2,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map a point from preprocessed space back to original image space,
    /// clamped to the image bounds
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.offset_x as f32) / self.scale;
        let orig_y = (y - self.offset_y as f32) / self.scale;
        (
            orig_x.clamp(0.0, self.original_width as f32),
            orig_y.clamp(0.0, self.original_height as f32),
        )
    }
}
