use thiserror::Error;

/// Data defects in the frame database or button definitions. These refuse
/// to run rather than guess; a routine hitting one stops its session
/// through the error exit path, never by crashing the thread.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read frame database: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse frame database: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no frame is defined for id '{0}'")]
    UnknownFrame(String),

    #[error("frame {frame}: button '{button}' has {len} fields, expected [x, y, color]")]
    ButtonArity { frame: String, button: String, len: usize },

    #[error("frame {frame}: button '{button}' has malformed fields, expected [x, y, color]")]
    BadButton { frame: String, button: String },

    #[error("frame {frame}: button '{button}' references unknown color '{color}'")]
    UnknownColor { frame: String, button: String, color: String },

    #[error("frame {frame}: button '{button}' is not defined")]
    MissingButton { frame: String, button: String },

    #[error("frame {frame}: interaction '{name}' is not a point or point list")]
    BadInteraction { frame: String, name: String },

    #[error("frame {frame}: interaction '{name}' is not defined")]
    MissingInteraction { frame: String, name: String },
}
