#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Zero-sized image, no integral image requested, non-positive
    /// `dest_size`, `scale_factor <= 1.0`, ...
    #[error("usage error: {0}")]
    Usage(String),

    /// Malformed cascade XML/JSON or a missing required field. No partial
    /// cascade is ever produced for this error.
    #[error("cascade load failed: {0}")]
    Load(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("cascade xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("cascade json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
