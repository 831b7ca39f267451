use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] chainfeed_core::ValidationError),

    #[error(transparent)]
    Registry(#[from] chainfeed_core::RegistryError),

    #[error(transparent)]
    Pipeline(#[from] chainfeed_pipeline::PipelineError),

    #[error(transparent)]
    Store(#[from] chainfeed_store::StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Registry(_) => 3,
            Self::Pipeline(_) | Self::Store(_) => 4,
            Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
