use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoseDetectionConfig {
    /// Keypoints below this visibility are drawn in the low-confidence
    /// color and excluded from skeleton connections.
    pub visibility_threshold: f32,
}

impl PoseDetectionConfig {
    pub fn new() -> Self {
        PoseDetectionConfig {
            visibility_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaceDetectionConfig {
    pub score_threshold: f32,
    /// Face detectors box brow-to-chin. The box top is raised by this
    /// fraction of the box height to approximate crown-to-chin.
    pub head_top_expansion: f32,
}

impl FaceDetectionConfig {
    pub fn new() -> Self {
        FaceDetectionConfig {
            score_threshold: 0.5,
            head_top_expansion: 0.35,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasureConfig {
    pub fallback_head: f32,
    pub fallback_torso: f32,
    pub fallback_legs: f32,
    /// Chin position as a fraction of the head segment when no face box
    /// supplied a detected chin line.
    pub chin_fraction: f32,
    pub fallback_face_aspect: f32,
    /// Face width estimate in eye-to-nose distances when no face box is
    /// available.
    pub eye_nose_face_width_scale: f32,
    /// Heel fallback offset below the ankle, as a fraction of image height.
    pub heel_fallback_ratio: f32,
    /// Foot keypoints may overshoot the frame slightly; y-values beyond
    /// this multiple of the image height are discarded.
    pub foot_overshoot_limit: f32,
}

impl MeasureConfig {
    pub fn new() -> Self {
        MeasureConfig {
            fallback_head: 0.15,
            fallback_torso: 0.35,
            fallback_legs: 0.5,
            chin_fraction: 0.6,
            fallback_face_aspect: 0.7,
            eye_nose_face_width_scale: 4.0,
            heel_fallback_ratio: 0.03,
            foot_overshoot_limit: 1.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WarpConfig {
    pub scale_x_min: f32,
    pub scale_x_max: f32,
}

impl WarpConfig {
    pub fn new() -> Self {
        WarpConfig {
            scale_x_min: 0.6,
            scale_x_max: 1.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CropConfig {
    pub padding_x_ratio: f32,
    pub padding_y_ratio: f32,
    pub padding_floor_px: i32,
    /// The measurement ruler is drawn this far left of the body; the crop
    /// keeps it framed.
    pub ruler_margin_px: i32,
    pub ruler_pad_px: i32,
}

impl CropConfig {
    pub fn new() -> Self {
        CropConfig {
            padding_x_ratio: 0.5,
            padding_y_ratio: 0.2,
            padding_floor_px: 50,
            ruler_margin_px: 60,
            ruler_pad_px: 40,
        }
    }
}
