//! Hand-built packages for reader and writer tests.

use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

/// Zips `(part name, content)` pairs into an in-memory package.
pub(crate) fn build_package(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Writes a package built by [`build_package`] to `path`.
pub(crate) fn write_package(path: &Path, entries: &[(&str, &str)]) {
    std::fs::write(path, build_package(entries)).unwrap();
}
