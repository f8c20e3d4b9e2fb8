use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Missing,
    Directory,
    Other,
}

pub trait DestinationProbe {
    fn entry_kind(&self, path: &Path) -> EntryKind;

    // Same device and inode; false when either path is missing.
    fn is_same_file(&self, a: &Path, b: &Path) -> bool;

    // Lower-cased base names of every non-directory entry below `dir`.
    fn names_below(&self, dir: &Path) -> io::Result<HashSet<String>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl DestinationProbe for FsProbe {
    fn entry_kind(&self, path: &Path) -> EntryKind {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => EntryKind::Directory,
            Ok(_) => EntryKind::Other,
            Err(_) => EntryKind::Missing,
        }
    }

    fn is_same_file(&self, a: &Path, b: &Path) -> bool {
        same_file::is_same_file(a, b).unwrap_or(false)
    }

    fn names_below(&self, dir: &Path) -> io::Result<HashSet<String>> {
        let mut names = HashSet::new();
        for entry in WalkDir::new(dir).min_depth(1) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            names.insert(entry.file_name().to_string_lossy().to_lowercase());
        }
        Ok(names)
    }
}
