use std::sync::Arc;

pub type CgiResult<T> = Result<T, CgiError>;

/// Generic error that contains all the different kinds of errors that may occur when using the API
///
/// Contract violations (heap overflow, stale handles used for deletion, calling `next_subpass()`
/// past the last subpass, ...) are not reported through this type. They panic.
#[derive(Debug, Clone)]
pub enum CgiError {
    StringError(String),
    IoError(Arc<std::io::Error>),
    /// Malformed content: DDS files, shader branch descriptors, RON configuration
    ContentError(String),
    /// Compiler diagnostics for a shader branch
    ShaderCompileError(String),
}

impl std::error::Error for CgiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            CgiError::StringError(_) => None,
            CgiError::IoError(ref e) => Some(&**e),
            CgiError::ContentError(_) => None,
            CgiError::ShaderCompileError(_) => None,
        }
    }
}

impl core::fmt::Display for CgiError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            CgiError::StringError(ref e) => e.fmt(fmt),
            CgiError::IoError(ref e) => e.fmt(fmt),
            CgiError::ContentError(ref e) => write!(fmt, "invalid content: {}", e),
            CgiError::ShaderCompileError(ref e) => write!(fmt, "shader compile error: {}", e),
        }
    }
}

impl From<&str> for CgiError {
    fn from(str: &str) -> Self {
        CgiError::StringError(str.to_string())
    }
}

impl From<String> for CgiError {
    fn from(string: String) -> Self {
        CgiError::StringError(string)
    }
}

impl From<std::io::Error> for CgiError {
    fn from(error: std::io::Error) -> Self {
        CgiError::IoError(Arc::new(error))
    }
}
