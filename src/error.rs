#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Record is too short, truncated, or structurally unrecognized.
    ///
    /// Recoverable; the caller should advance to the next record and count
    /// it separately from valid traffic.
    #[error("unrecognized or truncated record, skipping")]
    Skip,

    /// The mandatory frame marker is absent where one is required.
    ///
    /// Distinct from [Error::Skip] because it implies the byte source itself
    /// mis-delimited records.
    #[error("invalid syncword")]
    Syncword,

    /// Encode was attempted on a packet with no payload bytes.
    #[error("empty payload")]
    EmptyPayload,

    /// Image reconstruction or export requested for a format this crate
    /// cannot rasterize, e.g. h264.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// A payload is too small for the raster it claims to contain.
    #[error("not enough bytes, actual:{actual} minimum:{minimum}")]
    NotEnoughData { actual: usize, minimum: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
