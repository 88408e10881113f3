// 递归遍历目录中的普通文件
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lazy walk over every regular file below a root, yielding absolute paths.
///
/// Order is whatever the filesystem hands back; it is stable within one run
/// but nothing should depend on it across platforms. The iterator is consumed
/// once and cannot be restarted.
pub struct DirWalk {
    inner: walkdir::IntoIter,
    skip: Option<PathBuf>,
}

impl DirWalk {
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;
        Ok(Self {
            inner: WalkDir::new(root).min_depth(1).into_iter(),
            skip: None,
        })
    }

    /// Leaves out one file, given by its canonical path.
    pub fn skipping(mut self, path: PathBuf) -> Self {
        self.skip = Some(path);
        self
    }
}

impl Iterator for DirWalk {
    type Item = io::Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(entry) if entry.file_type().is_file() => {
                    if self.skip.as_deref() == Some(entry.path()) {
                        continue;
                    }
                    return Some(Ok(entry.into_path()));
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
