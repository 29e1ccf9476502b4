use std::sync::{Mutex, PoisonError};

use anyhow::Error;
use ndarray::Array2;
use opencv::core::{Mat, MatTraitConst};

use crate::config::config::PoseDetectionConfig;
use crate::error::{PipelineError, Result};
use crate::utils::coordinate::{Keypoint, KeypointIndex, PoseKeypoints};

/// Opaque pose estimation model.
///
/// Implementations return an Nx3 array of normalized `(x, y, visibility)`
/// rows with N >= [`KeypointIndex::COUNT`], or `None` when no body is
/// present. A backend `Err` means the model itself failed.
pub trait PoseBackend: Send {
    fn detect(&mut self, image: &Mat) -> std::result::Result<Option<Array2<f32>>, Error>;
}

/// Wraps a shared pose model instance and converts its raw output into
/// pixel-space keypoints.
///
/// The backend is expensive to construct and not assumed safe for
/// concurrent invocation; the mutex serializes access so one instance can
/// be built at process start and reused across worker threads.
pub struct PoseDetectionClient {
    backend: Mutex<Box<dyn PoseBackend>>,
    pub visibility_threshold: f32,
}

impl PoseDetectionClient {
    pub fn new(backend: Box<dyn PoseBackend>, config: PoseDetectionConfig) -> Self {
        PoseDetectionClient {
            backend: Mutex::new(backend),
            visibility_threshold: config.visibility_threshold,
        }
    }

    /// Runs pose detection and scales the normalized rows to pixel
    /// coordinates. `Ok(None)` means no body was found in the image.
    pub fn detect(&self, image: &Mat) -> Result<Option<PoseKeypoints>> {
        let raw = {
            let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
            backend.detect(image)?
        };
        let raw = match raw {
            Some(raw) => raw,
            None => return Ok(None),
        };

        if raw.nrows() < KeypointIndex::COUNT || raw.ncols() < 3 {
            return Err(PipelineError::InvalidPoseOutput(format!(
                "expected at least {}x3 keypoints, got {}x{}",
                KeypointIndex::COUNT,
                raw.nrows(),
                raw.ncols()
            )));
        }

        let size = image.size()?;
        let (w, h) = (size.width as f32, size.height as f32);
        let points = raw
            .outer_iter()
            .map(|row| Keypoint {
                x: row[0] * w,
                y: row[1] * h,
                visibility: row[2],
            })
            .collect();

        Ok(Some(PoseKeypoints::new(points)))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use opencv::core::{Mat, Scalar, CV_8UC3};

    use super::*;
    use crate::utils::coordinate::KeypointIndex;

    struct FixedBackend(Option<Array2<f32>>);

    impl PoseBackend for FixedBackend {
        fn detect(&mut self, _image: &Mat) -> anyhow::Result<Option<Array2<f32>>> {
            Ok(self.0.clone())
        }
    }

    fn test_image() -> Mat {
        Mat::new_rows_cols_with_default(800, 400, CV_8UC3, Scalar::all(40.0)).unwrap()
    }

    #[test]
    fn scales_normalized_rows_to_pixels() {
        let mut raw = Array2::<f32>::zeros((KeypointIndex::COUNT, 3));
        raw[[KeypointIndex::Nose as usize, 0]] = 0.5;
        raw[[KeypointIndex::Nose as usize, 1]] = 0.25;
        raw[[KeypointIndex::Nose as usize, 2]] = 0.9;

        let client = FixedBackend(Some(raw));
        let client = PoseDetectionClient::new(Box::new(client), PoseDetectionConfig::new());
        let kps = client.detect(&test_image()).unwrap().unwrap();

        let nose = kps.get(KeypointIndex::Nose);
        assert_eq!(nose.x, 200.0);
        assert_eq!(nose.y, 200.0);
        assert_eq!(nose.visibility, 0.9);
    }

    #[test]
    fn no_body_passes_through_as_none() {
        let client = PoseDetectionClient::new(
            Box::new(FixedBackend(None)),
            PoseDetectionConfig::new(),
        );
        assert!(client.detect(&test_image()).unwrap().is_none());
    }

    #[test]
    fn short_output_is_an_error() {
        let raw = Array2::<f32>::zeros((5, 3));
        let client = PoseDetectionClient::new(
            Box::new(FixedBackend(Some(raw))),
            PoseDetectionConfig::new(),
        );
        assert!(matches!(
            client.detect(&test_image()),
            Err(PipelineError::InvalidPoseOutput(_))
        ));
    }
}
