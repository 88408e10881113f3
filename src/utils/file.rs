use anyhow::Result;
use std::path::{Path, PathBuf};

/// Kind of a local filesystem path, as seen by a single metadata read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    NotFound,
    RegularFile,
    Directory,
    Other,
}

pub fn classify_path<P: AsRef<Path>>(path: P) -> PathKind {
    match std::fs::metadata(path.as_ref()) {
        Ok(meta) if meta.is_file() => PathKind::RegularFile,
        Ok(meta) if meta.is_dir() => PathKind::Directory,
        Ok(_) => PathKind::Other,
        Err(_) => PathKind::NotFound,
    }
}

/// 取路径最后一段作为文件名，兼容 `/` 和 `\` 分隔符
pub fn file_name_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    match trimmed.rfind(['/', '\\']) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

// 目标文件可能还不存在，此时按父目录的规范路径比较
fn resolved(path: &Path) -> Option<PathBuf> {
    if let Ok(path) = std::fs::canonicalize(path) {
        return Some(path);
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some(std::fs::canonicalize(parent).ok()?.join(path.file_name()?))
}

/// Whether two paths name the same file once links and `..` are resolved.
pub fn same_file<A: AsRef<Path>, B: AsRef<Path>>(a: A, b: B) -> bool {
    match (resolved(a.as_ref()), resolved(b.as_ref())) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

pub fn md5_hex(parts: &[&str]) -> String {
    let mut hasher = md5::Context::new();
    for part in parts {
        hasher.consume(part.as_bytes());
        hasher.consume([0u8]);
    }
    format!("{:x}", hasher.compute())
}

pub fn ensure_parent_dir<P: AsRef<Path>>(file_path: P) -> Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
