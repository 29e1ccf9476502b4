use log::debug;
use opencv::core::{Mat, MatTraitConst};

use crate::error::{PipelineError, Result};
use crate::helper::body_helper::{heads_tall, BodyHelper, BodyRatios, Landmarks};
use crate::helper::warp_helper::SegmentWarper;
use crate::modules::face_detection_client::FaceDetectionClient;
use crate::modules::pose_detection_client::PoseDetectionClient;
use crate::render::overlay::{draw_measurements, draw_skeleton};
use crate::utils::image::apply_crop;

/// Output bundle for one request: the warped image, annotated debug
/// copies of all three subjects, and their measured proportions.
#[derive(Debug)]
pub struct WarpResult {
    pub final_result: Mat,
    pub final_result_debug: Mat,
    pub user_debug: Mat,
    pub model_debug: Mat,
    pub user_ratios: BodyRatios,
    pub model_ratios: BodyRatios,
    /// Ratios re-measured on the warped image; all zero when the warped
    /// image yielded no landmarks.
    pub result_ratios: BodyRatios,
    /// Re-measured heads-tall of the warped image, 0.0 on a re-measure
    /// miss.
    pub result_heads: f32,
    pub user_landmarks: Landmarks,
    pub model_landmarks: Landmarks,
}

pub struct ProportionPipeline {
    pose_client: PoseDetectionClient,
    face_client: FaceDetectionClient,
    body_helper: BodyHelper,
    warper: SegmentWarper,
}

impl ProportionPipeline {
    /// new initializes new instance of the pipeline
    pub fn new(
        pose_client: PoseDetectionClient,
        face_client: FaceDetectionClient,
        body_helper: BodyHelper,
        warper: SegmentWarper,
    ) -> Self {
        ProportionPipeline {
            pose_client,
            face_client,
            body_helper,
            warper,
        }
    }

    /// Measures both subjects, warps the model image toward the user's
    /// proportions, re-measures the result, and crops all outputs.
    ///
    /// Fails with [`PipelineError::MissingBodyDetection`] when either
    /// *input* image has no detectable body; every later irregularity
    /// degrades to a best-effort numeric estimate instead.
    pub fn process_visuals(&self, img_user: &Mat, img_model: &Mat) -> Result<WarpResult> {
        // pose landmarks for the body
        let user_kps = self.pose_client.detect(img_user)?;
        let model_kps = self.pose_client.detect(img_model)?;

        // face detection for accurate head size
        let user_face = self.face_client.detect(img_user)?;
        let model_face = self.face_client.detect(img_model)?;

        let (user_kps, model_kps) = match (user_kps, model_kps) {
            (Some(user_kps), Some(model_kps)) => (user_kps, model_kps),
            _ => return Err(PipelineError::MissingBodyDetection),
        };

        let mut user_landmarks = self.body_helper.landmarks(&user_kps, img_user.size()?);
        let user_head_height = self
            .body_helper
            .merge_face_box(&mut user_landmarks, user_face.as_ref());
        let mut model_landmarks = self.body_helper.landmarks(&model_kps, img_model.size()?);
        let model_head_height = self
            .body_helper
            .merge_face_box(&mut model_landmarks, model_face.as_ref());

        let user_ratios = self.body_helper.body_ratios(&user_landmarks, user_head_height);
        let model_ratios = self
            .body_helper
            .body_ratios(&model_landmarks, model_head_height);
        debug!(
            "measured user {:.1} / model {:.1} heads tall",
            heads_tall(user_ratios.head_stat_ratio),
            heads_tall(model_ratios.head_stat_ratio)
        );

        let vis = self.pose_client.visibility_threshold;
        let mut user_debug = img_user.try_clone()?;
        let mut model_debug = img_model.try_clone()?;
        draw_skeleton(&mut user_debug, &user_kps, vis)?;
        draw_skeleton(&mut model_debug, &model_kps, vis)?;
        draw_measurements(
            &mut user_debug,
            &user_landmarks,
            user_ratios.head_stat_ratio,
            user_face.as_ref(),
        )?;
        draw_measurements(
            &mut model_debug,
            &model_landmarks,
            model_ratios.head_stat_ratio,
            model_face.as_ref(),
        )?;

        // warp the model toward the user's proportions
        let mut result_img = self
            .warper
            .warp_to_ratios(img_model, &model_landmarks, &user_ratios)?;

        // re-measure the warped result; the warp is an approximation and
        // only re-detection reports the ratios actually achieved
        let res_kps = self.pose_client.detect(&result_img)?;
        let res_face = self.face_client.detect(&result_img)?;

        let mut result_debug = result_img.try_clone()?;
        let mut result_ratios = BodyRatios::default();
        let mut result_heads = 0.0;
        let mut result_bounds = None;

        match res_kps {
            Some(res_kps) => {
                let mut res_landmarks = self.body_helper.landmarks(&res_kps, result_img.size()?);
                if let Some(face) = res_face.as_ref() {
                    res_landmarks.face_width = face.raw_box.2 as f32;
                }
                let res_head_height = res_face.as_ref().map(|f| f.height as f32);
                result_ratios = self.body_helper.body_ratios(&res_landmarks, res_head_height);
                result_heads = heads_tall(result_ratios.head_stat_ratio);

                draw_skeleton(&mut result_debug, &res_kps, vis)?;
                draw_measurements(
                    &mut result_debug,
                    &res_landmarks,
                    result_ratios.head_stat_ratio,
                    res_face.as_ref(),
                )?;
                result_bounds =
                    self.body_helper
                        .crop_bounds(result_img.size()?, &res_kps, &res_landmarks);
            }
            None => {
                debug!("no body detected in warped result, returning it unannotated");
            }
        }

        // auto-crop every output independently
        let user_bounds = self
            .body_helper
            .crop_bounds(user_debug.size()?, &user_kps, &user_landmarks);
        let user_debug = apply_crop(&user_debug, user_bounds.as_ref())?;

        let model_bounds = self
            .body_helper
            .crop_bounds(model_debug.size()?, &model_kps, &model_landmarks);
        let model_debug = apply_crop(&model_debug, model_bounds.as_ref())?;

        if let Some(bounds) = result_bounds.as_ref() {
            result_img = apply_crop(&result_img, Some(bounds))?;
            result_debug = apply_crop(&result_debug, Some(bounds))?;
        }

        Ok(WarpResult {
            final_result: result_img,
            final_result_debug: result_debug,
            user_debug,
            model_debug,
            user_ratios,
            model_ratios,
            result_ratios,
            result_heads,
            user_landmarks,
            model_landmarks,
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;
    use opencv::core::{Mat, MatTraitConst, Scalar, CV_8UC3};

    use super::*;
    use crate::config::config::{FaceDetectionConfig, PoseDetectionConfig};
    use crate::modules::face_detection_client::FaceBackend;
    use crate::modules::pose_detection_client::PoseBackend;
    use crate::utils::coordinate::{KeypointIndex, RawFaceBox};

    fn set(rows: &mut Array2<f32>, i: KeypointIndex, x: f32, y: f32) {
        rows[[i as usize, 0]] = x;
        rows[[i as usize, 1]] = y;
    }

    /// Normalized keypoints of an upright figure, valid for any image size.
    fn pose_rows() -> Array2<f32> {
        let mut rows = Array2::<f32>::from_elem((KeypointIndex::COUNT, 3), 0.5);
        for mut row in rows.rows_mut() {
            row[2] = 0.9;
        }
        set(&mut rows, KeypointIndex::Nose, 0.50, 0.09);
        set(&mut rows, KeypointIndex::LeftEye, 0.525, 0.075);
        set(&mut rows, KeypointIndex::RightEye, 0.475, 0.075);
        set(&mut rows, KeypointIndex::LeftShoulder, 0.675, 0.18);
        set(&mut rows, KeypointIndex::RightShoulder, 0.325, 0.18);
        set(&mut rows, KeypointIndex::LeftHip, 0.64, 0.42);
        set(&mut rows, KeypointIndex::RightHip, 0.36, 0.42);
        set(&mut rows, KeypointIndex::LeftKnee, 0.625, 0.65);
        set(&mut rows, KeypointIndex::RightKnee, 0.375, 0.65);
        set(&mut rows, KeypointIndex::LeftAnkle, 0.61, 0.85);
        set(&mut rows, KeypointIndex::RightAnkle, 0.39, 0.85);
        set(&mut rows, KeypointIndex::LeftHeel, 0.60, 0.875);
        set(&mut rows, KeypointIndex::RightHeel, 0.40, 0.88);
        set(&mut rows, KeypointIndex::LeftFootIndex, 0.63, 0.87);
        set(&mut rows, KeypointIndex::RightFootIndex, 0.37, 0.872);
        rows
    }

    struct StubPose {
        /// `None` entries simulate a detection miss on that call.
        responses: Vec<Option<Array2<f32>>>,
        call: usize,
    }

    impl StubPose {
        fn always() -> Self {
            StubPose {
                responses: vec![],
                call: 0,
            }
        }

        fn scripted(responses: Vec<Option<Array2<f32>>>) -> Self {
            StubPose { responses, call: 0 }
        }
    }

    impl PoseBackend for StubPose {
        fn detect(&mut self, _image: &Mat) -> anyhow::Result<Option<Array2<f32>>> {
            if self.responses.is_empty() {
                return Ok(Some(pose_rows()));
            }
            let out = self.responses.get(self.call).cloned().flatten();
            self.call += 1;
            Ok(out)
        }
    }

    struct StubFace;

    impl FaceBackend for StubFace {
        fn detect(&mut self, _image: &Mat) -> anyhow::Result<Option<RawFaceBox>> {
            Ok(Some(RawFaceBox {
                xmin: 0.4,
                ymin: 0.05,
                width: 0.175,
                height: 0.06,
                score: 0.9,
            }))
        }
    }

    fn pipeline(pose: StubPose) -> ProportionPipeline {
        ProportionPipeline::new(
            PoseDetectionClient::new(Box::new(pose), PoseDetectionConfig::new()),
            FaceDetectionClient::new(Box::new(StubFace), FaceDetectionConfig::new()),
            BodyHelper::new(None, None),
            SegmentWarper::new(None, None),
        )
    }

    fn test_image() -> Mat {
        Mat::new_rows_cols_with_default(1000, 400, CV_8UC3, Scalar::all(90.0)).unwrap()
    }

    #[test]
    fn full_pipeline_measures_warps_and_crops() {
        let result = pipeline(StubPose::always())
            .process_visuals(&test_image(), &test_image())
            .unwrap();

        let r = &result.user_ratios;
        assert!((r.head + r.torso + r.legs - 1.0).abs() < 1e-5);
        assert!(
            (r.r1_head + r.r2_neck + r.r3_torso + r.r4_thigh + r.r5_shin - 1.0).abs() < 1e-5
        );
        assert!(result.result_heads > 0.0);

        // crop narrowed the outputs but kept full body height
        assert!(result.final_result.cols() < 400);
        assert_eq!(result.final_result.rows(), 1000);
        assert!(result.user_debug.cols() < 400);
        assert_eq!(
            result.final_result.size().unwrap(),
            result.final_result_debug.size().unwrap()
        );
    }

    #[test]
    fn missing_body_in_an_input_is_fatal() {
        let err = pipeline(StubPose::scripted(vec![Some(pose_rows()), None]))
            .process_visuals(&test_image(), &test_image())
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingBodyDetection));
    }

    #[test]
    fn remeasure_miss_on_the_result_is_not_fatal() {
        let pose = StubPose::scripted(vec![Some(pose_rows()), Some(pose_rows()), None]);
        let result = pipeline(pose)
            .process_visuals(&test_image(), &test_image())
            .unwrap();

        assert_eq!(result.result_heads, 0.0);
        assert_eq!(result.result_ratios.head, 0.0);
        assert_eq!(result.result_ratios.r1_head, 0.0);
        // the warped image is still returned, uncropped
        assert!(result.final_result.rows() > 0);
        assert!(result.user_ratios.head > 0.0);
    }
}
