use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// No pose landmarks could be obtained for an input image. Fatal for
    /// the request; everything downstream assumes a valid skeleton.
    #[error("could not detect a full body in one of the input images")]
    MissingBodyDetection,

    #[error("opencv error: {0}")]
    OpenCv(#[from] opencv::Error),

    /// The detector backend itself failed. Distinct from a clean
    /// "nothing detected", which is reported as `None` at the boundary.
    #[error("detector backend error: {0}")]
    Backend(#[from] anyhow::Error),

    #[error("invalid pose output: {0}")]
    InvalidPoseOutput(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
