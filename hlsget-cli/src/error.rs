use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download error: {0}")]
    Download(#[from] hlsget_engine::DownloadError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),
}

impl From<hlsget_engine::HlsError> for AppError {
    fn from(error: hlsget_engine::HlsError) -> Self {
        AppError::Download(error.into())
    }
}

impl From<hlsget_engine::TransportError> for AppError {
    fn from(error: hlsget_engine::TransportError) -> Self {
        AppError::Download(error.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Download(error.into())
    }
}
