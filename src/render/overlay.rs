use opencv::core::{Mat, MatTraitConst, Point, Rect, Scalar};
use opencv::imgproc::{circle, line, put_text, rectangle, FONT_HERSHEY_SIMPLEX, LINE_8};

use crate::error::Result;
use crate::helper::body_helper::Landmarks;
use crate::utils::coordinate::{FaceBox, KeypointIndex, PoseKeypoints};

/// Skeleton connections (start keypoint, end keypoint).
pub const SKELETON_CONNECTIONS: [(KeypointIndex, KeypointIndex); 20] = [
    // face
    (KeypointIndex::LeftEar, KeypointIndex::LeftEye),
    (KeypointIndex::LeftEye, KeypointIndex::Nose),
    (KeypointIndex::Nose, KeypointIndex::RightEye),
    (KeypointIndex::RightEye, KeypointIndex::RightEar),
    // upper body
    (KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow),
    (KeypointIndex::LeftElbow, KeypointIndex::LeftWrist),
    (KeypointIndex::RightShoulder, KeypointIndex::RightElbow),
    (KeypointIndex::RightElbow, KeypointIndex::RightWrist),
    // torso
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftHip),
    (KeypointIndex::RightShoulder, KeypointIndex::RightHip),
    (KeypointIndex::LeftHip, KeypointIndex::RightHip),
    // lower body
    (KeypointIndex::LeftHip, KeypointIndex::LeftKnee),
    (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle),
    (KeypointIndex::RightHip, KeypointIndex::RightKnee),
    (KeypointIndex::RightKnee, KeypointIndex::RightAnkle),
    // feet
    (KeypointIndex::LeftAnkle, KeypointIndex::LeftHeel),
    (KeypointIndex::LeftHeel, KeypointIndex::LeftFootIndex),
    (KeypointIndex::RightAnkle, KeypointIndex::RightHeel),
    (KeypointIndex::RightHeel, KeypointIndex::RightFootIndex),
];

const DRAWN_KEYPOINTS: [KeypointIndex; 21] = [
    KeypointIndex::Nose,
    KeypointIndex::LeftEye,
    KeypointIndex::RightEye,
    KeypointIndex::LeftEar,
    KeypointIndex::RightEar,
    KeypointIndex::LeftShoulder,
    KeypointIndex::RightShoulder,
    KeypointIndex::LeftElbow,
    KeypointIndex::RightElbow,
    KeypointIndex::LeftWrist,
    KeypointIndex::RightWrist,
    KeypointIndex::LeftHip,
    KeypointIndex::RightHip,
    KeypointIndex::LeftKnee,
    KeypointIndex::RightKnee,
    KeypointIndex::LeftAnkle,
    KeypointIndex::RightAnkle,
    KeypointIndex::LeftHeel,
    KeypointIndex::RightHeel,
    KeypointIndex::LeftFootIndex,
    KeypointIndex::RightFootIndex,
];

// colors in RGB order, matching the decoded image layout
pub const KEYPOINT_COLOR: (i32, i32, i32) = (0, 255, 0);
pub const SKELETON_COLOR: (i32, i32, i32) = (255, 255, 0);
pub const LOW_CONFIDENCE_COLOR: (i32, i32, i32) = (255, 0, 0);

/// The ruler sits this far left of the leftmost keypoint; the crop
/// calculator keeps the same margin framed.
const RULER_OFFSET_PX: i32 = 60;

fn rgb(color: (i32, i32, i32)) -> Scalar {
    Scalar::new(color.0 as f64, color.1 as f64, color.2 as f64, 0.0)
}

/// Draws the raw skeleton over `img` in place.
pub fn draw_skeleton(img: &mut Mat, kps: &PoseKeypoints, visibility_threshold: f32) -> Result<()> {
    for &(a, b) in SKELETON_CONNECTIONS.iter() {
        let pa = kps.get(a);
        let pb = kps.get(b);
        if pa.visibility < visibility_threshold || pb.visibility < visibility_threshold {
            continue;
        }
        line(
            img,
            Point::new(pa.x as i32, pa.y as i32),
            Point::new(pb.x as i32, pb.y as i32),
            rgb(SKELETON_COLOR),
            2,
            LINE_8,
            0,
        )?;
    }

    for &idx in DRAWN_KEYPOINTS.iter() {
        let p = kps.get(idx);
        let color = if p.visibility < visibility_threshold {
            LOW_CONFIDENCE_COLOR
        } else {
            KEYPOINT_COLOR
        };
        circle(
            img,
            Point::new(p.x as i32, p.y as i32),
            4,
            rgb(color),
            -1,
            LINE_8,
            0,
        )?;
    }
    Ok(())
}

/// Draws the calibrated head-unit ruler, head-count tick marks and the
/// top/chin/heel guide lines over `img` in place. Skips everything when
/// the head unit is too small to read.
pub fn draw_measurements(
    img: &mut Mat,
    lmk: &Landmarks,
    head_stat_ratio: f32,
    face: Option<&FaceBox>,
) -> Result<()> {
    let h = img.rows();

    let px_head_h = if head_stat_ratio > 0.0 {
        (head_stat_ratio * h as f32) as i32
    } else {
        0
    };
    if px_head_h < 10 {
        return Ok(());
    }

    let mut ruler_x = lmk.min_x - RULER_OFFSET_PX;
    if ruler_x < 10 {
        ruler_x = 10;
    }

    let top_y = lmk.top_y;
    let bottom_y = lmk.heel_y;

    let yellow = rgb((255, 255, 0));
    let red = rgb((255, 0, 0));
    let green = rgb((0, 255, 0));
    let blue = rgb((0, 0, 255));
    let magenta = rgb((255, 0, 255));

    if let Some(face) = face {
        let (fx, fy, fw, fh) = face.raw_box;
        rectangle(img, Rect::new(fx, fy, fw, fh), red, 2, LINE_8, 0)?;
        put_text(
            img,
            "Face AI",
            Point::new(fx, fy - 10),
            FONT_HERSHEY_SIMPLEX,
            0.5,
            red,
            1,
            LINE_8,
            false,
        )?;
    }

    // one-head-unit reference box
    rectangle(
        img,
        Rect::new(ruler_x, top_y, 40, px_head_h),
        yellow,
        2,
        LINE_8,
        0,
    )?;
    put_text(
        img,
        "1",
        Point::new(ruler_x + 10, top_y + 30),
        FONT_HERSHEY_SIMPLEX,
        0.8,
        yellow,
        2,
        LINE_8,
        false,
    )?;

    let mut current_y = top_y + px_head_h;
    let mut count = 2;
    while current_y < bottom_y + px_head_h {
        line(
            img,
            Point::new(ruler_x, current_y),
            Point::new(ruler_x + 20, current_y),
            red,
            2,
            LINE_8,
            0,
        )?;
        put_text(
            img,
            &count.to_string(),
            Point::new(ruler_x + 25, current_y + 10),
            FONT_HERSHEY_SIMPLEX,
            0.5,
            green,
            1,
            LINE_8,
            false,
        )?;
        current_y += px_head_h;
        count += 1;
    }

    line(
        img,
        Point::new(ruler_x + 10, top_y),
        Point::new(ruler_x + 10, bottom_y),
        blue,
        2,
        LINE_8,
        0,
    )?;

    let nose_x = lmk.nose_x;
    for (y, label, color) in [
        (top_y, "Top", yellow),
        (top_y + px_head_h, "Chin", yellow),
        (bottom_y, "Heel", magenta),
    ] {
        line(
            img,
            Point::new(nose_x - 50, y),
            Point::new(nose_x + 50, y),
            color,
            2,
            LINE_8,
            0,
        )?;
        put_text(
            img,
            label,
            Point::new(nose_x + 55, y + 5),
            FONT_HERSHEY_SIMPLEX,
            0.5,
            color,
            1,
            LINE_8,
            false,
        )?;
    }
    Ok(())
}
