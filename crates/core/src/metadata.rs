use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use thiserror::Error;

pub const ORIGINAL_DATE_TIME_TAG: &str = "DateTimeOriginal";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    EmbeddedTag,
    FilenameCompact,
    FilenameLoose,
    FileModified,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedTimestamp {
    pub source: TimestampSource,
    pub time: DateTime<Local>,
}

pub type TagMap = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum TagReadError {
    #[error("no embedded metadata container")]
    NotThisFormat,
    #[error("metadata could not be read: {0}")]
    Io(#[from] io::Error),
}

pub trait TagReader {
    fn read_tags(&self, path: &Path) -> Result<TagMap, TagReadError>;

    fn original_date_time(&self, path: &Path) -> Option<String> {
        self.read_tags(path)
            .ok()
            .and_then(|mut tags| tags.remove(ORIGINAL_DATE_TIME_TAG))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoTags;

impl TagReader for NoTags {
    fn read_tags(&self, _path: &Path) -> Result<TagMap, TagReadError> {
        Err(TagReadError::NotThisFormat)
    }
}

impl<T: TagReader + ?Sized> TagReader for &T {
    fn read_tags(&self, path: &Path) -> Result<TagMap, TagReadError> {
        (**self).read_tags(path)
    }
}
