//! Archive assembly.
//!
//! Bundles every successfully produced item file into one ZIP at a
//! job-scoped path. Entry names carry the playlist index as a prefix, so
//! two items with identical titles never collide and the entry order is
//! deterministic. Re-assembly truncates and rewrites the same file; it
//! never appends duplicate entries.

use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::FileOptions;
use zip::CompressionMethod;

use plpack_models::archive_entry_name;

use crate::error::{EngineError, EngineResult};
use crate::store::ItemOutput;

/// Archive file name inside a job directory.
const ARCHIVE_FILE_NAME: &str = "bundle.zip";

/// Assemble the job archive from the given item outputs.
///
/// Runs on the blocking pool; ZIP writing is pure file I/O. Any failure
/// (missing input, disk full, ZIP error) surfaces as a packaging error.
pub(crate) async fn assemble(job_dir: &Path, outputs: &[ItemOutput]) -> EngineResult<PathBuf> {
    let archive_path = job_dir.join(ARCHIVE_FILE_NAME);

    let mut outputs: Vec<ItemOutput> = outputs.to_vec();
    outputs.sort_by_key(|o| o.index);

    let path = archive_path.clone();
    let entries = outputs.len();

    tokio::task::spawn_blocking(move || write_archive(&path, &outputs))
        .await
        .map_err(|e| EngineError::packaging(format!("archive task failed: {}", e)))??;

    debug!(archive = %archive_path.display(), entries, "Assembled job archive");
    Ok(archive_path)
}

fn write_archive(archive_path: &Path, outputs: &[ItemOutput]) -> EngineResult<()> {
    // Create truncates: re-assembly starts from an empty archive
    let file = std::fs::File::create(archive_path)
        .map_err(|e| EngineError::packaging(format!("cannot create archive: {}", e)))?;
    let mut writer = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for output in outputs {
        let extension = output
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let entry_name = archive_entry_name(output.index, &output.title, extension);

        writer
            .start_file(entry_name, options)
            .map_err(|e| EngineError::packaging(format!("cannot start entry: {}", e)))?;

        let mut source = std::fs::File::open(&output.path).map_err(|e| {
            EngineError::packaging(format!("cannot read {}: {}", output.path.display(), e))
        })?;
        std::io::copy(&mut source, &mut writer)
            .map_err(|e| EngineError::packaging(format!("cannot write entry: {}", e)))?;
    }

    writer
        .finish()
        .map_err(|e| EngineError::packaging(format!("cannot finalize archive: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    async fn seed_outputs(dir: &Path) -> Vec<ItemOutput> {
        let a = dir.join("002.mp4");
        let b = dir.join("005.mp4");
        tokio::fs::write(&a, b"second item bytes").await.unwrap();
        tokio::fs::write(&b, b"fifth item bytes").await.unwrap();

        vec![
            // Deliberately unsorted; assembly orders by index
            ItemOutput {
                index: 5,
                title: "Fifth Song".to_string(),
                path: b,
            },
            ItemOutput {
                index: 2,
                title: "Second Song".to_string(),
                path: a,
            },
        ]
    }

    fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let file = std::fs::File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            entries.push((entry.name().to_string(), contents));
        }
        entries
    }

    #[tokio::test]
    async fn test_assemble_orders_and_names_entries() {
        let dir = TempDir::new().unwrap();
        let outputs = seed_outputs(dir.path()).await;

        let archive = assemble(dir.path(), &outputs).await.unwrap();
        let entries = read_entries(&archive);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "002_Second_Song.mp4");
        assert_eq!(entries[0].1, b"second item bytes");
        assert_eq!(entries[1].0, "005_Fifth_Song.mp4");
        assert_eq!(entries[1].1, b"fifth item bytes");
    }

    #[tokio::test]
    async fn test_reassembly_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let outputs = seed_outputs(dir.path()).await;

        let first = assemble(dir.path(), &outputs).await.unwrap();
        let first_entries = read_entries(&first);

        let second = assemble(dir.path(), &outputs).await.unwrap();
        let second_entries = read_entries(&second);

        assert_eq!(first, second);
        // Identical entry set: same names, same contents, no duplicates
        assert_eq!(first_entries, second_entries);
    }

    #[tokio::test]
    async fn test_missing_input_is_a_packaging_error() {
        let dir = TempDir::new().unwrap();
        let outputs = vec![ItemOutput {
            index: 1,
            title: "Ghost".to_string(),
            path: dir.path().join("does-not-exist.mp4"),
        }];

        let err = assemble(dir.path(), &outputs).await.unwrap_err();
        assert!(matches!(err, EngineError::Packaging { .. }));
    }
}
