//! Error types for the graphics subsystem.
//!
//! Protocol errors are recoverable by design: the manager logs them and
//! drops the offending command, so a bad frame can never stall the
//! terminal stream.

/// Errors that can occur while decoding or storing image data.
#[derive(Debug, thiserror::Error)]
pub enum GraphicsError {
    /// The referenced image is not in the store.
    #[error("no such image: {0}")]
    ImageNotFound(u32),

    /// The `f=` key named a pixel format this implementation does not know.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(u32),

    /// Raw RGB/RGBA data arrived without `s=`/`v=` dimensions.
    #[error("raw pixel data requires explicit width and height")]
    MissingDimensions,

    /// The payload is shorter than the declared dimensions require.
    #[error("pixel buffer too small: {actual} bytes for {width}x{height}")]
    TruncatedPixels {
        actual: usize,
        width: u32,
        height: u32,
    },

    /// Zlib inflate of an `o=z` payload failed.
    #[error("zlib inflate failed: {0}")]
    Inflate(#[from] std::io::Error),

    /// The PNG container could not be decoded.
    #[error("image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The decoded image exceeds the per-image byte limit.
    #[error("image too large: {size} bytes (max {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    /// The `t=` key requested a medium other than direct transmission.
    /// File and shared-memory transfers do not exist in a browser host.
    #[error("unsupported transmission medium")]
    UnsupportedTransmission,

    /// A transmit command carried no payload and no accumulated chunks.
    #[error("no image data supplied")]
    NoData,

    /// Host-provided configuration failed to parse.
    #[error("invalid graphics config: {0}")]
    Config(#[from] serde_json::Error),
}

impl GraphicsError {
    /// The error code carried in a protocol response frame.
    pub fn wire_code(&self) -> &'static str {
        match self {
            GraphicsError::ImageNotFound(_) => "ENOENT",
            GraphicsError::NoData => "ENODATA",
            GraphicsError::UnsupportedTransmission => "EBADTRANS",
            GraphicsError::ImageTooLarge { .. } => "EFBIG",
            GraphicsError::UnsupportedFormat(_)
            | GraphicsError::MissingDimensions
            | GraphicsError::TruncatedPixels { .. }
            | GraphicsError::Config(_) => "EINVAL",
            GraphicsError::Inflate(_) | GraphicsError::ImageDecode(_) => "EBADPNG",
        }
    }
}
