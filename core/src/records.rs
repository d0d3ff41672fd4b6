//! Reading and writing the JSON record collection.

use crate::book::Book;
use crate::error::RecordsError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Load every book from a collection file, or from all `*.json` files under a
/// directory in sorted path order.
pub fn load_collection<P: AsRef<Path>>(path: P) -> Result<Vec<Book>, RecordsError> {
    let path = path.as_ref();
    let mut files: Vec<PathBuf> = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(p.to_path_buf());
            }
        }
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        return Err(RecordsError::NotFound(path.to_path_buf()));
    }

    let mut books = Vec::new();
    for file in files {
        let mut batch = read_file(&file)?;
        tracing::debug!(file = %file.display(), records = batch.len(), "read record file");
        books.append(&mut batch);
    }
    Ok(books)
}

fn read_file(path: &Path) -> Result<Vec<Book>, RecordsError> {
    let f = File::open(path).map_err(|source| RecordsError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_reader(BufReader::new(f))
        .map_err(|source| RecordsError::Json { path: path.to_path_buf(), source })
}

/// Write books as one pretty-printed JSON array.
pub fn save_collection<P: AsRef<Path>>(path: P, books: &[Book]) -> Result<(), RecordsError> {
    let path = path.as_ref();
    let io_err = |source| RecordsError::Io { path: path.to_path_buf(), source };
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
    }
    let f = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut out, books)
        .map_err(|source| RecordsError::Json { path: path.to_path_buf(), source })?;
    out.flush().map_err(io_err)?;
    Ok(())
}
