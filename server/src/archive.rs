/*
 * Copyright 2024 Download Service Contributors
 */

//! Flat zip assembly for multi-file and folder jobs (§4.6.1 step 5).

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Zips every regular file under `tmp_folder` into `zip_path`, with archive
/// entry names relative to `tmp_folder` -- the "flat zip archive rooted at
/// tmp_folder" from §4.6.1.
pub fn zip_directory(tmp_folder: &Path, zip_path: &Path) -> Result<()> {
    let file = File::create(zip_path).with_context(|| format!("creating archive {:?}", zip_path))?;
    let mut zw = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut buf = Vec::new();
    for entry in WalkDir::new(tmp_folder).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let rel = path.strip_prefix(tmp_folder).with_context(|| format!("relativising {:?}", path))?;
        let name = rel.to_string_lossy().replace('\\', "/");

        zw.start_file(name, options).with_context(|| format!("starting zip entry for {:?}", path))?;
        buf.clear();
        File::open(path).and_then(|mut f| f.read_to_end(&mut buf)).with_context(|| format!("reading {:?}", path))?;
        zw.write_all(&buf).with_context(|| format!("writing zip entry for {:?}", path))?;
    }

    zw.finish().context("finishing archive")?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::io::Read as _;

    use super::*;

    #[test]
    fn zips_every_file_with_relative_names() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj_1");
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::write(root.join("a/b.txt"), b"hello").unwrap();
        std::fs::write(root.join("a/c.txt"), b"world").unwrap();

        let zip_path = dir.path().join("proj_1.zip");
        zip_directory(&root, &zip_path).unwrap();

        let f = File::open(&zip_path).unwrap();
        let mut zr = zip::ZipArchive::new(f).unwrap();
        let mut names: Vec<String> = (0..zr.len()).map(|i| zr.by_index(i).unwrap().name().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["a/b.txt".to_string(), "a/c.txt".to_string()]);

        let mut contents = String::new();
        zr.by_name("a/b.txt").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello");
    }
}
