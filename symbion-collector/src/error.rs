use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectorError {
    #[error("collector stopped")]
    Stopped,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config YAML invalide: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("config invalide: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("unknown control: {0}")]
    UnknownControl(String),
    #[error("control {control} failed: {message}")]
    Failed { control: String, message: String },
}
