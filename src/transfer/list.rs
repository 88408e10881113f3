// 传输列表文件：每行一个待传输条目
use crate::utils::error::TransferError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DOWNLOAD_LIST_FILE: &str = "dwnld_list.txt";
pub const UPLOAD_LIST_FILE: &str = "STORJ_output_list.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Upload { local_path: PathBuf },
    Download { remote_id: String, remote_name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Upload,
    Download,
}

impl ListKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ListKind::Upload => UPLOAD_LIST_FILE,
            ListKind::Download => DOWNLOAD_LIST_FILE,
        }
    }
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

impl WorkItem {
    fn kind(&self) -> ListKind {
        match self {
            WorkItem::Upload { .. } => ListKind::Upload,
            WorkItem::Download { .. } => ListKind::Download,
        }
    }

    /// `path` for uploads, `id:name` for downloads.
    fn encode(&self) -> io::Result<String> {
        let line = match self {
            WorkItem::Upload { local_path } => local_path
                .to_str()
                .ok_or_else(|| invalid_data(format!("non UTF-8 path: {}", local_path.display())))?
                .to_string(),
            WorkItem::Download {
                remote_id,
                remote_name,
            } => {
                if remote_id.contains(':') {
                    return Err(invalid_data(format!("file id contains ':': {}", remote_id)));
                }
                format!("{}:{}", remote_id, remote_name)
            }
        };
        if line.is_empty() || line.contains(['\n', '\r']) {
            return Err(invalid_data(format!("item cannot be stored on one line: {:?}", line)));
        }
        Ok(line)
    }

    fn decode(kind: ListKind, line: &str) -> io::Result<Self> {
        match kind {
            ListKind::Upload if !line.is_empty() => Ok(WorkItem::Upload {
                local_path: PathBuf::from(line),
            }),
            ListKind::Download => match line.split_once(':') {
                Some((id, name)) if !id.is_empty() => Ok(WorkItem::Download {
                    remote_id: id.to_string(),
                    remote_name: name.to_string(),
                }),
                _ => Err(invalid_data(format!("malformed download entry: {:?}", line))),
            },
            _ => Err(invalid_data("empty upload entry".to_string())),
        }
    }
}

/// On-disk queue of work items for one batch.
pub struct TransferList {
    path: PathBuf,
    kind: ListKind,
    // 顺序读取时复用同一个 reader，记录已读行数
    reader: Option<(BufReader<File>, usize)>,
}

impl TransferList {
    pub fn new<P: AsRef<Path>>(dir: P, kind: ListKind) -> Self {
        Self {
            path: dir.as_ref().join(kind.file_name()),
            kind,
            reader: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn write<I>(&mut self, items: I) -> Result<usize, TransferError>
    where
        I: IntoIterator<Item = WorkItem>,
    {
        self.write_results(items.into_iter().map(Ok))
    }

    /// Replaces the whole file with `items`, returning how many were written.
    /// The first `Err` item aborts the write.
    pub fn write_results<I>(&mut self, items: I) -> Result<usize, TransferError>
    where
        I: IntoIterator<Item = io::Result<WorkItem>>,
    {
        self.reader = None;
        let path = self.path.clone();
        let wrap = |e| TransferError::list_io(&path, e);

        let file = File::create(&self.path).map_err(wrap)?;
        let mut writer = BufWriter::new(file);
        let mut count = 0;

        for item in items {
            let item = item.map_err(wrap)?;
            if item.kind() != self.kind {
                return Err(wrap(invalid_data(format!(
                    "{:?} item in a {:?} list",
                    item.kind(),
                    self.kind
                ))));
            }
            let line = item.encode().map_err(wrap)?;
            writeln!(writer, "{}", line).map_err(wrap)?;
            count += 1;
        }

        writer.flush().map_err(wrap)?;
        Ok(count)
    }

    /// Item number `after_index + 1` (1-based), or `None` once the list is
    /// exhausted.
    pub fn read_next(&mut self, after_index: usize) -> Result<Option<WorkItem>, TransferError> {
        let path = self.path.clone();
        let wrap = |e| TransferError::list_io(&path, e);

        let reusable = matches!(&self.reader, Some((_, consumed)) if *consumed == after_index);
        if !reusable {
            let file = File::open(&self.path).map_err(wrap)?;
            let mut reader = BufReader::new(file);
            let mut skipped = 0;
            let mut line = String::new();
            while skipped < after_index {
                line.clear();
                if reader.read_line(&mut line).map_err(wrap)? == 0 {
                    self.reader = Some((reader, skipped));
                    return Ok(None);
                }
                skipped += 1;
            }
            self.reader = Some((reader, after_index));
        }

        let Some((reader, consumed)) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut line = String::new();
        if reader.read_line(&mut line).map_err(wrap)? == 0 {
            return Ok(None);
        }
        *consumed += 1;

        let line = line.trim_end_matches(['\n', '\r']);
        WorkItem::decode(self.kind, line).map(Some).map_err(wrap)
    }

    #[cfg(test)]
    fn count(&self) -> Result<usize, TransferError> {
        let file = File::open(&self.path).map_err(|e| TransferError::list_io(&self.path, e))?;
        let mut count = 0;
        for line in BufReader::new(file).lines() {
            line.map_err(|e| TransferError::list_io(&self.path, e))?;
            count += 1;
        }
        Ok(count)
    }

    /// Removes the list file; a missing file is not an error.
    pub fn delete(&mut self) -> Result<(), TransferError> {
        self.reader = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TransferError::list_io(&self.path, e)),
        }
    }
}
