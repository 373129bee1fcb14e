use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Folder,
}

/// One entry of an extracted submission tree.
#[derive(Clone, Debug)]
pub struct DirNode {
    pub name: String,
    pub kind: NodeKind,
    pub path: PathBuf,
    pub children: Vec<DirNode>,
}

/// Reads a directory recursively into a tree, filtering out hidden entries
/// and macOS archive junk (`__MACOSX`).
///
/// An empty `allowed_extensions` list admits every file; otherwise only
/// files with a matching extension (case-insensitive, without the dot) are
/// listed. Directories always recurse. A missing or unreadable directory
/// yields an empty tree rather than an error; unreadable entries are
/// skipped with a warning.
pub fn read_directory_tree(dir: &Path, allowed_extensions: &[&str]) -> Vec<DirNode> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("cannot read directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.file_name().to_string_lossy().into_owned()),
            Err(e) => {
                tracing::warn!("skipping unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|name| !name.starts_with('.') && !name.starts_with("__MACOSX"))
        .collect();
    names.sort();

    names
        .into_iter()
        .filter_map(|name| {
            let full_path = dir.join(&name);
            let metadata = match fs::metadata(&full_path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("skipping {}: {}", full_path.display(), e);
                    return None;
                }
            };

            if metadata.is_dir() {
                let children = read_directory_tree(&full_path, allowed_extensions);
                Some(DirNode {
                    name,
                    kind: NodeKind::Folder,
                    path: full_path,
                    children,
                })
            } else {
                if !extension_allowed(&full_path, allowed_extensions) {
                    return None;
                }
                Some(DirNode {
                    name,
                    kind: NodeKind::File,
                    path: full_path,
                    children: Vec::new(),
                })
            }
        })
        .collect()
}

fn extension_allowed(path: &Path, allowed_extensions: &[&str]) -> bool {
    if allowed_extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}
