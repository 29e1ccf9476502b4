use log::debug;
use opencv::core::{vconcat, Mat, MatTraitConst, Rect, Size, Vector};
use opencv::imgproc::{resize, INTER_LINEAR};

use crate::config::config::{MeasureConfig, WarpConfig};
use crate::error::Result;
use crate::helper::body_helper::{BodyRatios, Landmarks};
use crate::utils::image::blank_band;

/// Resizes the five anatomical bands of an image independently so the
/// subject takes on a target set of segment ratios, then applies a
/// bounded horizontal scale to keep the face width plausible.
#[derive(Debug, Clone)]
pub struct SegmentWarper {
    scale_x_min: f32,
    scale_x_max: f32,
    chin_fraction: f32,
}

impl SegmentWarper {
    pub fn new(in_warp: Option<WarpConfig>, in_measure: Option<MeasureConfig>) -> Self {
        let warp = in_warp.unwrap_or_else(WarpConfig::new);
        let measure = in_measure.unwrap_or_else(MeasureConfig::new);
        SegmentWarper {
            scale_x_min: warp.scale_x_min,
            scale_x_max: warp.scale_x_max,
            chin_fraction: measure.chin_fraction,
        }
    }

    /// Rebuilds `image` as seven vertical strips: untouched background
    /// above the head and below the heels, and the five body bands
    /// resampled to the target ratios. The total body extent is
    /// preserved; only its distribution changes. A final horizontal
    /// resize matches the face width implied by the target head band,
    /// clamped to the configured range.
    pub fn warp_to_ratios(
        &self,
        image: &Mat,
        lmk: &Landmarks,
        target: &BodyRatios,
    ) -> Result<Mat> {
        let w = image.cols();
        let h = image.rows();

        let y_top = lmk.top_y.clamp(0, h);
        let y_chin = lmk.chin_or_estimate(self.chin_fraction).clamp(0, h);
        let y_shoulder = lmk.shoulder_y.clamp(0, h);
        let y_hip = lmk.hip_y.clamp(0, h);
        let y_knee = lmk.knee_y.clamp(0, h);
        let y_heel = lmk.heel_y.clamp(0, h);

        let y_starts = [y_top, y_chin, y_shoulder, y_hip, y_knee];
        let src_heights = [
            y_chin - y_top,
            y_shoulder - y_chin,
            y_hip - y_shoulder,
            y_knee - y_hip,
            y_heel - y_knee,
        ];
        let total_src: i32 = src_heights.iter().sum();
        let ratios = [
            target.r1_head,
            target.r2_neck,
            target.r3_torso,
            target.r4_thigh,
            target.r5_shin,
        ];
        let tgt_heights = target_heights(total_src, &ratios);

        let mut strips: Vector<Mat> = Vector::new();
        if y_top > 0 {
            strips.push(Mat::roi(image, Rect::new(0, 0, w, y_top))?.try_clone()?);
        }
        for i in 0..5 {
            if let Some(band) =
                self.resample_band(image, y_starts[i], src_heights[i], tgt_heights[i])?
            {
                strips.push(band);
            }
        }
        if y_heel < h {
            strips.push(Mat::roi(image, Rect::new(0, y_heel, w, h - y_heel))?.try_clone()?);
        }

        if strips.is_empty() {
            return Ok(image.try_clone()?);
        }
        let mut stacked = Mat::default();
        vconcat(&strips, &mut stacked)?;

        let tgt_face_w = tgt_heights[0] as f32 * target.face_aspect_ratio;
        let raw_scale_x = if lmk.face_width > 0.0 {
            tgt_face_w / lmk.face_width
        } else {
            1.0
        };
        let scale_x = raw_scale_x.clamp(self.scale_x_min, self.scale_x_max);
        if scale_x != raw_scale_x {
            debug!("horizontal scale {raw_scale_x:.3} clamped to {scale_x:.3}");
        }

        let new_w = (stacked.cols() as f32 * scale_x).round() as i32;
        if new_w > 0 && new_w != stacked.cols() {
            let mut scaled = Mat::default();
            resize(
                &stacked,
                &mut scaled,
                Size::new(new_w, stacked.rows()),
                0.0,
                0.0,
                INTER_LINEAR,
            )?;
            return Ok(scaled);
        }
        Ok(stacked)
    }

    /// One band at full source width. Empty source regions become
    /// zero-filled placeholders; empty targets are omitted entirely.
    fn resample_band(
        &self,
        image: &Mat,
        y_start: i32,
        src_h: i32,
        tgt_h: i32,
    ) -> Result<Option<Mat>> {
        if tgt_h <= 0 {
            return Ok(None);
        }
        let w = image.cols();
        if src_h <= 0 {
            return Ok(Some(blank_band(tgt_h, w, image)?));
        }
        let band = Mat::roi(image, Rect::new(0, y_start, w, src_h))?;
        let mut resized = Mat::default();
        resize(&band, &mut resized, Size::new(w, tgt_h), 0.0, 0.0, INTER_LINEAR)?;
        Ok(Some(resized))
    }
}

/// Redistributes the source body extent among the five bands.
pub(crate) fn target_heights(total_src: i32, ratios: &[f32; 5]) -> [i32; 5] {
    let mut out = [0i32; 5];
    for (i, r) in ratios.iter().enumerate() {
        out[i] = (total_src as f32 * r).round() as i32;
    }
    out
}

#[cfg(test)]
mod tests {
    use opencv::core::{Mat, MatTraitConst, Scalar, CV_8UC3};

    use super::*;
    use crate::helper::body_helper::{BodyHelper, Landmarks};

    fn source_image() -> Mat {
        Mat::new_rows_cols_with_default(1000, 400, CV_8UC3, Scalar::all(128.0)).unwrap()
    }

    fn source_landmarks() -> Landmarks {
        Landmarks {
            nose_y: 90,
            eye_y: 75,
            shoulder_y: 180,
            hip_y: 420,
            knee_y: 650,
            ankle_y: 850,
            heel_y: 880,
            top_y: 50,
            chin_y: Some(110),
            min_x: 120,
            max_x: 280,
            nose_x: 200,
            shoulder_width_px: 140.0,
            hip_width_px: 110.0,
            face_width: 70.0,
        }
    }

    fn target_ratios() -> BodyRatios {
        BodyRatios {
            r1_head: 0.18,
            r2_neck: 0.07,
            r3_torso: 0.30,
            r4_thigh: 0.25,
            r5_shin: 0.20,
            face_aspect_ratio: 0.7,
            ..BodyRatios::default()
        }
    }

    #[test]
    fn band_heights_are_rounded_and_preserve_the_total() {
        let heights = target_heights(830, &[0.18, 0.07, 0.30, 0.25, 0.20]);
        assert_eq!(heights, [149, 58, 249, 208, 166]);
        assert_eq!(heights.iter().sum::<i32>(), 830);
    }

    #[test]
    fn warp_preserves_vertical_extent_and_scales_width() {
        let warper = SegmentWarper::new(None, None);
        let out = warper
            .warp_to_ratios(&source_image(), &source_landmarks(), &target_ratios())
            .unwrap();

        // 50px top background + 830px body + 120px bottom background
        assert_eq!(out.rows(), 1000);
        // target face width 149 * 0.7 over source face width 70
        assert_eq!(out.cols(), 596);
    }

    #[test]
    fn width_scale_is_clamped_at_both_ends() {
        let warper = SegmentWarper::new(None, None);

        let mut narrow_face = source_landmarks();
        narrow_face.face_width = 10.0; // raw scale ~10.4
        let out = warper
            .warp_to_ratios(&source_image(), &narrow_face, &target_ratios())
            .unwrap();
        assert_eq!(out.cols(), 720); // 400 * 1.8

        let mut wide_face = source_landmarks();
        wide_face.face_width = 1000.0; // raw scale ~0.1
        let out = warper
            .warp_to_ratios(&source_image(), &wide_face, &target_ratios())
            .unwrap();
        assert_eq!(out.cols(), 240); // 400 * 0.6
    }

    #[test]
    fn zero_length_band_becomes_a_placeholder_not_an_error() {
        let mut lmk = source_landmarks();
        lmk.chin_y = Some(lmk.top_y); // head band collapses to nothing
        let warper = SegmentWarper::new(None, None);
        let out = warper
            .warp_to_ratios(&source_image(), &lmk, &target_ratios())
            .unwrap();
        // band totals telescope, so the extent is unchanged
        assert_eq!(out.rows(), 1000);
    }

    #[test]
    fn warping_toward_own_ratios_is_a_near_identity() {
        let lmk = source_landmarks();
        let helper = BodyHelper::new(None, None);
        // face-derived head height equals the head band, as after a merge
        let own = helper.body_ratios(&lmk, Some(60.0));

        let warper = SegmentWarper::new(None, None);
        let out = warper.warp_to_ratios(&source_image(), &lmk, &own).unwrap();
        assert_eq!(out.rows(), 1000);
        assert_eq!(out.cols(), 400);
    }
}
