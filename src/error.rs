#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device enumeration provider could not be reached or reported
    /// a failure. Recoverable: the current sampling tick is skipped.
    #[error("device enumeration failed: {0}")]
    Enumeration(String),

    /// Initial enumeration produced no devices. Fatal at startup only,
    /// since the monitor would have nothing to serve.
    #[error("no GPU devices found")]
    NoDevices,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task error: {0}")]
    Task(String),
}

impl Error {
    pub(crate) fn enumeration<S: Into<String>>(msg: S) -> Self {
        Error::Enumeration(msg.into())
    }

    pub(crate) fn task<S: Into<String>>(msg: S) -> Self {
        Error::Task(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
