use std::sync::{Mutex, PoisonError};

use anyhow::Error;
use opencv::core::{Mat, MatTraitConst};

use crate::config::config::FaceDetectionConfig;
use crate::error::Result;
use crate::utils::coordinate::{FaceBox, RawFaceBox};

/// Opaque face detection model returning one normalized bounding box, or
/// `None` when no face is present.
pub trait FaceBackend: Send {
    fn detect(&mut self, image: &Mat) -> std::result::Result<Option<RawFaceBox>, Error>;
}

/// Wraps a shared face model instance and converts its normalized box to
/// pixel-space head bounds.
pub struct FaceDetectionClient {
    backend: Mutex<Box<dyn FaceBackend>>,
    score_threshold: f32,
    head_top_expansion: f32,
}

impl FaceDetectionClient {
    pub fn new(backend: Box<dyn FaceBackend>, config: FaceDetectionConfig) -> Self {
        FaceDetectionClient {
            backend: Mutex::new(backend),
            score_threshold: config.score_threshold,
            head_top_expansion: config.head_top_expansion,
        }
    }

    /// Runs face detection and expands the box top toward the crown.
    /// Detector boxes cover brow-to-chin; head-height statistics need
    /// crown-to-chin.
    pub fn detect(&self, image: &Mat) -> Result<Option<FaceBox>> {
        let raw = {
            let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
            backend.detect(image)?
        };
        let raw = match raw {
            Some(raw) if raw.score >= self.score_threshold => raw,
            _ => return Ok(None),
        };

        let size = image.size()?;
        let (w, h) = (size.width as f32, size.height as f32);

        let ymin = (raw.ymin * h) as i32;
        let box_height = (raw.height * h) as i32;
        let expansion = (box_height as f32 * self.head_top_expansion) as i32;
        let top = (ymin - expansion).max(0);
        let real_height = box_height + expansion;

        Ok(Some(FaceBox {
            top,
            bottom: top + real_height,
            height: real_height,
            raw_box: (
                (raw.xmin * w) as i32,
                ymin,
                (raw.width * w) as i32,
                box_height,
            ),
        }))
    }
}
