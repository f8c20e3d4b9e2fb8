use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub path: Option<PathBuf>,
    pub message: String,
    pub is_error: bool,
}

impl ReportLine {
    pub fn new(path: &Path, message: impl Into<String>, is_error: bool) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            message: message.into(),
            is_error,
        }
    }

    pub fn error(path: &Path, message: impl Into<String>) -> Self {
        Self::new(path, message, true)
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            path: None,
            message: message.into(),
            is_error: false,
        }
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}\t{}", path.display(), self.message),
            None => f.write_str(&self.message),
        }
    }
}
