use opencv::core::{Mat, MatTraitConst, Rect, Scalar};
use opencv::imgcodecs::{imdecode, IMREAD_COLOR};
use opencv::imgproc::{cvt_color, COLOR_BGR2RGB};

use crate::error::Result;
use crate::utils::coordinate::CropBounds;

/// Decodes an encoded image buffer (JPEG/PNG) into an RGB `Mat`.
pub fn decode_image(im_bytes: &[u8]) -> Result<Mat> {
    let buf = Mat::from_slice(im_bytes)?;
    let img_bgr = imdecode(&buf, IMREAD_COLOR)?;

    let mut img_rgb = Mat::default();
    cvt_color(&img_bgr, &mut img_rgb, COLOR_BGR2RGB, 0)?;
    Ok(img_rgb)
}

/// Returns the cropped region as a new buffer, or a plain copy when no
/// bounds were computed.
pub fn apply_crop(img: &Mat, bounds: Option<&CropBounds>) -> Result<Mat> {
    match bounds {
        Some(b) => {
            let rect = Rect::new(b.x1, b.y1, b.x2 - b.x1, b.y2 - b.y1);
            Ok(Mat::roi(img, rect)?.try_clone()?)
        }
        None => Ok(img.try_clone()?),
    }
}

/// Zero-filled placeholder strip matching the pixel type of `like`.
pub fn blank_band(rows: i32, cols: i32, like: &Mat) -> Result<Mat> {
    let band = Mat::new_rows_cols_with_default(rows, cols, like.typ(), Scalar::all(0.0))?;
    Ok(band)
}
