use thiserror::Error;

/// Errors produced by a frame source. All of these are recovered inside the
/// stream supervisor via backoff and reconnect; none of them cross the
/// supervisor boundary.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to open stream: {details}")]
    Connect { details: String },

    #[error("failed to read frame: {details}")]
    Read { details: String },

    #[error("end of stream")]
    EndOfStream,
}

impl SourceError {
    pub fn connect<S: Into<String>>(details: S) -> Self {
        Self::Connect {
            details: details.into(),
        }
    }

    pub fn read<S: Into<String>>(details: S) -> Self {
        Self::Read {
            details: details.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CamviewError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Stream source error: {0}")]
    Source(#[from] SourceError),

    #[error("Display error: {details}")]
    Display { details: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl CamviewError {
    pub fn display<S: Into<String>>(details: S) -> Self {
        Self::Display {
            details: details.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CamviewError>;
