use thiserror::Error;

/// Result alias returning a config [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or storing a [`crate::VisionConfig`].
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read the config file from disk.
    #[error("failed to read config from `{path}`")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the config file to disk.
    #[error("failed to write config to `{path}`")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file contents were not valid TOML for this shape.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// The value could not be serialized back to TOML.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}
