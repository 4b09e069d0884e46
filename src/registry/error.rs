use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("无效的URL: {0}")]
    InvalidUrl(String),
    #[error("任务未找到: {0}")]
    TaskNotFound(String),
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::InvalidUrl(err.to_string())
    }
}
