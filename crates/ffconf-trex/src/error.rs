use ffconf_core::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no region declares a variable, nothing to fit")]
    NoRegions,

    #[error("no MC sample is exported, cannot attach the signal norm factor")]
    NoSignalSample,
}

pub type Result<T> = std::result::Result<T, ExportError>;
