use crate::metadata::{TagMap, TagReadError, TagReader};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

const DATE_TAGS: &[(Tag, &str)] = &[
    (Tag::DateTimeOriginal, "DateTimeOriginal"),
    (Tag::DateTimeDigitized, "DateTimeDigitized"),
    (Tag::DateTime, "DateTime"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ExifTagReader;

impl TagReader for ExifTagReader {
    fn read_tags(&self, path: &Path) -> Result<TagMap, TagReadError> {
        let file = File::open(path)?;
        let mut buf = BufReader::new(file);
        let exif = Reader::new()
            .read_from_container(&mut buf)
            .map_err(classify_error)?;

        let mut tags = TagMap::new();
        for (tag, name) in DATE_TAGS {
            let Some(field) = exif.get_field(*tag, In::PRIMARY) else {
                continue;
            };
            if let Some(raw) = ascii_value(&field.value) {
                trace!(path = %path.display(), tag = name, value = %raw, "found EXIF date tag");
                tags.insert((*name).to_string(), raw);
            }
        }

        Ok(tags)
    }
}

fn classify_error(err: exif::Error) -> TagReadError {
    match err {
        exif::Error::Io(err) => TagReadError::Io(err),
        _ => TagReadError::NotThisFormat,
    }
}

// The displayed form reformats dates, so the raw ASCII bytes are used instead.
fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .to_string()
        }),
        _ => None,
    }
}
