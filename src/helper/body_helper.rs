use log::debug;
use opencv::core::Size;
use serde::{Deserialize, Serialize};

use crate::config::config::{CropConfig, MeasureConfig};
use crate::utils::coordinate::{CropBounds, FaceBox, KeypointIndex, PoseKeypoints};

/// Pixel-space body measurements for one image.
///
/// Built once from pose keypoints, then amended by the face merge: only
/// `top_y`, `chin_y` and `face_width` may be overridden afterwards.
/// `chin_y` stays `None` unless a face box supplied a detected chin line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Landmarks {
    pub nose_y: i32,
    pub eye_y: i32,
    pub shoulder_y: i32,
    pub hip_y: i32,
    pub knee_y: i32,
    pub ankle_y: i32,
    pub heel_y: i32,
    pub top_y: i32,
    pub chin_y: Option<i32>,
    pub min_x: i32,
    pub max_x: i32,
    pub nose_x: i32,
    pub shoulder_width_px: f32,
    pub hip_width_px: f32,
    pub face_width: f32,
}

impl Landmarks {
    /// Detected chin line, or the estimate at `chin_fraction` of the
    /// head segment. Shared by the ratio calculator and the warper so
    /// both partition the head band identically.
    pub fn chin_or_estimate(&self, chin_fraction: f32) -> i32 {
        self.chin_y.unwrap_or_else(|| {
            self.top_y + ((self.shoulder_y - self.top_y) as f32 * chin_fraction) as i32
        })
    }
}

/// Dimensionless body proportions.
///
/// `head`/`torso`/`legs` and the five `r*` segment ratios each sum to 1
/// under non-degenerate input. `Default` is the all-zero record used when
/// post-warp re-measurement finds no body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BodyRatios {
    pub head: f32,
    pub torso: f32,
    pub legs: f32,
    /// Head height over visible body height. Its reciprocal is the
    /// "heads-tall" figure metric.
    pub head_stat_ratio: f32,
    pub r1_head: f32,
    pub r2_neck: f32,
    pub r3_torso: f32,
    pub r4_thigh: f32,
    pub r5_shin: f32,
    /// Shoulder width in face-width units.
    pub shoulder_heads: f32,
    /// Hip width in face-width units.
    pub hip_heads: f32,
    pub face_aspect_ratio: f32,
}

/// Numeric side of the user-vs-model summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProportionComparison {
    pub user_heads: f32,
    pub model_heads: f32,
    pub heads_diff: f32,
    pub leg_ratio_diff_pct: f32,
}

/// Converts pose keypoints and face boxes into landmark records, body
/// ratios and crop windows.
#[derive(Debug, Clone)]
pub struct BodyHelper {
    measure: MeasureConfig,
    crop: CropConfig,
}

impl BodyHelper {
    pub fn new(in_measure: Option<MeasureConfig>, in_crop: Option<CropConfig>) -> Self {
        BodyHelper {
            measure: in_measure.unwrap_or_else(MeasureConfig::new),
            crop: in_crop.unwrap_or_else(CropConfig::new),
        }
    }

    /// Derives the fixed-field landmark record from pixel keypoints.
    ///
    /// Paired joints use the left/right average. The heel is the lowest
    /// foot point within the overshoot limit, falling back to a fixed
    /// offset below the ankle. The head top is estimated from the
    /// eye-to-nose distance, or from the nose-to-shoulder distance when
    /// the eyes sit below the nose (heavily tilted heads).
    pub fn landmarks(&self, kps: &PoseKeypoints, size: Size) -> Landmarks {
        let h = size.height as f32;

        let nose = kps.get(KeypointIndex::Nose);
        let nose_y = nose.y as i32;
        let eye_y = kps.mid_y(KeypointIndex::LeftEye, KeypointIndex::RightEye) as i32;
        let shoulder_y =
            kps.mid_y(KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder) as i32;
        let hip_y = kps.mid_y(KeypointIndex::LeftHip, KeypointIndex::RightHip) as i32;
        let knee_y = kps.mid_y(KeypointIndex::LeftKnee, KeypointIndex::RightKnee) as i32;
        let ankle_y = kps.mid_y(KeypointIndex::LeftAnkle, KeypointIndex::RightAnkle) as i32;

        let overshoot = h * self.measure.foot_overshoot_limit;
        let lowest_foot = [
            KeypointIndex::LeftHeel,
            KeypointIndex::RightHeel,
            KeypointIndex::LeftFootIndex,
            KeypointIndex::RightFootIndex,
        ]
        .iter()
        .map(|&i| kps.get(i).y)
        .filter(|&y| (0.0..=overshoot).contains(&y))
        .fold(f32::NEG_INFINITY, f32::max);
        let heel_y = if lowest_foot.is_finite() {
            lowest_foot as i32
        } else {
            ankle_y + (h * self.measure.heel_fallback_ratio) as i32
        };

        let shoulder_width_px = (kps.get(KeypointIndex::LeftShoulder).x
            - kps.get(KeypointIndex::RightShoulder).x)
            .abs();
        let hip_width_px =
            (kps.get(KeypointIndex::LeftHip).x - kps.get(KeypointIndex::RightHip).x).abs();

        let dist_eye_nose = nose_y - eye_y;
        let top_y = if dist_eye_nose > 1 {
            (eye_y as f32 - dist_eye_nose as f32 * 2.5).max(0.0) as i32
        } else {
            (nose_y as f32 - (shoulder_y - nose_y) as f32 * 0.8).max(0.0) as i32
        };

        Landmarks {
            nose_y,
            eye_y,
            shoulder_y,
            hip_y,
            knee_y,
            ankle_y,
            heel_y,
            top_y,
            chin_y: None,
            min_x: kps.min_x() as i32,
            max_x: kps.max_x() as i32,
            nose_x: nose.x as i32,
            shoulder_width_px,
            hip_width_px,
            face_width: 0.0,
        }
    }

    /// Folds face detection into the landmark record. With a face box the
    /// head bounds and face width come from the detector and the expanded
    /// box height is returned as the precise head height; without one the
    /// face width is estimated from the eye-to-nose distance and `None`
    /// is returned.
    pub fn merge_face_box(&self, lmk: &mut Landmarks, face: Option<&FaceBox>) -> Option<f32> {
        match face {
            Some(face) => {
                lmk.top_y = face.top;
                lmk.chin_y = Some(face.bottom);
                lmk.face_width = face.raw_box.2 as f32;
                Some(face.height as f32)
            }
            None => {
                lmk.face_width = (lmk.eye_y - lmk.nose_y).abs() as f32
                    * self.measure.eye_nose_face_width_scale;
                None
            }
        }
    }

    /// Computes all body ratios. Never fails: every non-positive
    /// denominator falls back to a documented constant.
    pub fn body_ratios(&self, lmk: &Landmarks, precise_head_height: Option<f32>) -> BodyRatios {
        let head_segment = (lmk.shoulder_y - lmk.top_y) as f32;
        let torso = (lmk.hip_y - lmk.shoulder_y) as f32;
        let legs = (lmk.ankle_y - lmk.hip_y) as f32;
        let total_len = head_segment + torso + legs;

        let stats_head_height = match precise_head_height {
            Some(px) if px > 0.0 => px,
            _ => {
                let eye_to_top = (lmk.eye_y - lmk.top_y) as f32;
                if eye_to_top > 0.0 {
                    eye_to_top * 2.0
                } else {
                    head_segment * 0.6
                }
            }
        };

        let body_height_px = (lmk.heel_y - lmk.top_y).max(1) as f32;
        let head_stat_ratio = stats_head_height / body_height_px;

        let chin_y = lmk.chin_or_estimate(self.measure.chin_fraction);
        let h1_head = (chin_y - lmk.top_y) as f32;
        let h2_neck = (lmk.shoulder_y - chin_y) as f32;
        let h3_torso = torso;
        let h4_thigh = (lmk.knee_y - lmk.hip_y) as f32;
        let h5_shin = (lmk.heel_y - lmk.knee_y) as f32;
        let mut total_5_seg = h1_head + h2_neck + h3_torso + h4_thigh + h5_shin;
        if total_5_seg <= 0.0 {
            total_5_seg = 1.0;
        }

        let mut face_width = if lmk.face_width > 0.0 {
            lmk.face_width
        } else {
            stats_head_height * self.measure.fallback_face_aspect
        };
        if face_width <= 0.0 {
            face_width = 1.0;
        }

        let face_aspect_ratio = if stats_head_height > 0.0 {
            face_width / stats_head_height
        } else {
            self.measure.fallback_face_aspect
        };

        let (head, torso, legs) = if total_len > 0.0 {
            (head_segment / total_len, torso / total_len, legs / total_len)
        } else {
            debug!("degenerate body segments (total {total_len}), using fallback ratios");
            (
                self.measure.fallback_head,
                self.measure.fallback_torso,
                self.measure.fallback_legs,
            )
        };

        BodyRatios {
            head,
            torso,
            legs,
            head_stat_ratio,
            r1_head: h1_head / total_5_seg,
            r2_neck: h2_neck / total_5_seg,
            r3_torso: h3_torso / total_5_seg,
            r4_thigh: h4_thigh / total_5_seg,
            r5_shin: h5_shin / total_5_seg,
            shoulder_heads: lmk.shoulder_width_px / face_width,
            hip_heads: lmk.hip_width_px / face_width,
            face_aspect_ratio,
        }
    }

    /// Padded region of interest around the detected body, widened on the
    /// left so the measurement ruler stays framed. `None` when the
    /// rectangle would be degenerate.
    pub fn crop_bounds(
        &self,
        size: Size,
        kps: &PoseKeypoints,
        lmk: &Landmarks,
    ) -> Option<CropBounds> {
        let min_x = kps.min_x() as i32;
        let max_x = kps.max_x() as i32;
        let min_y = lmk.top_y;
        let max_y = lmk.heel_y;

        let pad_x = (((max_x - min_x) as f32 * self.crop.padding_x_ratio) as i32)
            .max(self.crop.padding_floor_px);
        let pad_y = (((max_y - min_y) as f32 * self.crop.padding_y_ratio) as i32)
            .max(self.crop.padding_floor_px);

        let mut x1 = (min_x - pad_x).max(0);
        let x2 = (max_x + pad_x).min(size.width);
        let y1 = (min_y - pad_y).max(0);
        let y2 = (max_y + pad_y).min(size.height);

        let ruler_x = lmk.min_x - self.crop.ruler_margin_px;
        if ruler_x < x1 {
            x1 = (ruler_x - self.crop.ruler_pad_px).max(0);
        }

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(CropBounds { y1, y2, x1, x2 })
    }
}

/// Body height in head units, rounded to one decimal. 0.0 when the ratio
/// is non-positive.
pub fn heads_tall(head_stat_ratio: f32) -> f32 {
    if head_stat_ratio > 0.0 {
        (10.0 / head_stat_ratio).round() / 10.0
    } else {
        0.0
    }
}

/// Numeric user-vs-model comparison. Text rendering belongs to the caller.
pub fn compare_proportions(user: &BodyRatios, model: &BodyRatios) -> ProportionComparison {
    let user_heads = heads_tall(user.head_stat_ratio);
    let model_heads = heads_tall(model.head_stat_ratio);
    ProportionComparison {
        user_heads,
        model_heads,
        heads_diff: model_heads - user_heads,
        leg_ratio_diff_pct: (model.legs - user.legs) * 100.0,
    }
}
