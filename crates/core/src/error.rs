use crate::lifecycle::LifecycleState;

/// Result alias that carries the custom [`SceneError`] type.
pub type Result<T> = std::result::Result<T, SceneError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Fatal failure while bringing the scene up: the audio envelope could not
    /// be produced or the rendering backend refused the scene. The harness is
    /// expected to cancel the render job.
    #[error("scene initialization failed: {0}")]
    Initialization(String),
    /// A frame update was requested before the envelope became available.
    #[error("scene is not ready (state: {state:?})")]
    NotReady { state: LifecycleState },
    /// Any operation attempted after initialization failed.
    #[error("scene initialization previously failed; no further operation is possible")]
    Failed,
    #[error("scene has been disposed")]
    Disposed,
    /// Decoding or analysing the audio resource failed.
    #[error("audio error: {0}")]
    Audio(String),
    /// The rendering backend rejected a call.
    #[error("render backend error: {0}")]
    Backend(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

impl SceneError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn initialization<T: Into<String>>(msg: T) -> Self {
        Self::Initialization(msg.into())
    }

    pub fn audio<T: Into<String>>(msg: T) -> Self {
        Self::Audio(msg.into())
    }

    pub fn backend<T: Into<String>>(msg: T) -> Self {
        Self::Backend(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error belongs to the fatal initialization category.
    pub fn is_initialization(&self) -> bool {
        matches!(self, Self::Initialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(SceneError::initialization("x")
            .to_string()
            .contains("initialization failed"));
        assert!(SceneError::audio("x").to_string().contains("audio error:"));
        assert!(SceneError::backend("x")
            .to_string()
            .contains("render backend error:"));
        assert!(SceneError::config("x")
            .to_string()
            .contains("invalid configuration:"));
    }

    #[test]
    fn not_ready_names_the_state() {
        let err = SceneError::NotReady {
            state: LifecycleState::AudioLoading,
        };
        assert!(err.to_string().contains("AudioLoading"));
        assert!(!err.is_initialization());
    }

    #[test]
    fn io_errors_convert() {
        let err: SceneError = std::io::Error::other("boom").into();
        assert!(err.to_string().contains("boom"));
    }
}
