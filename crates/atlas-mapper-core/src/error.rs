use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid atlas dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid item: {0}")]
    InvalidItem(String),
    #[error(
        "Sprite '{key}' ({width}x{height}, padding {padding}) is too big to fit into a {max_width}x{max_height} atlas"
    )]
    ItemTooLarge {
        key: String,
        width: u32,
        height: u32,
        padding: u32,
        max_width: u32,
        max_height: u32,
    },
    #[error("No progress packing {pending} pending item(s) into a {width}x{height} bin")]
    ZeroProgress {
        pending: usize,
        width: u32,
        height: u32,
    },
    #[error("Failed to replay item '{key}' while rebuilding a {width}x{height} bin")]
    RebuildFailed { key: String, width: u32, height: u32 },
    #[error("Sink protocol violation: {0}")]
    SinkProtocol(String),
    #[error("Unknown pixel format: {0}")]
    UnknownPixelFormat(String),
    #[error("Sprite name '{0}' already exists")]
    DuplicateSprite(String),
    #[error("Invalid atlas manifest: {0}")]
    Manifest(String),
}

pub type Result<T> = std::result::Result<T, MapperError>;
