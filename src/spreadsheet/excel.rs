//! Office Open XML package helpers shared by the reader and the writers
use crate::error::SheetError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use zip::ZipArchive;

/// XML tag name for relationship elements in Excel files
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Signature of an OLE compound file: legacy `.xls` or an encrypted `.xlsx`
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub(crate) type PackageReader = BufReader<File>;

/// Opens an `.xlsx` file as a ZIP archive
///
/// # Arguments
/// * `path` - Path to the workbook
///
/// # Returns
/// The archive handle, positioned at the start of the file
pub(crate) fn open_package(path: &Path) -> Result<ZipArchive<PackageReader>, SheetError> {
    let mut reader = BufReader::new(File::open(path)?);
    if is_compound_file(&mut reader)? {
        Err(SpreadsheetError::CompoundFileError(path.display().to_string()))?;
    }
    Ok(ZipArchive::new(reader)?)
}

/// Loads relationships of one package part
///
/// # Arguments
/// * `zip` - Zip archive handle
/// * `path` - Path to the relationships XML file within the archive
/// * `kind_suffix` - Relationship type suffix to keep, e.g. `/worksheet`
///
/// # Returns
/// Mapping of relationship IDs to normalized part paths
pub(crate) fn load_relationships<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    path: &str,
    kind_suffix: &str,
) -> Result<HashMap<String, String>, SheetError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with(kind_suffix)).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Maps `cellXfs` entries to cell types using custom and built-in formats
///
/// # Arguments
/// * `format_indexes` - `numFmtId` of each `xf`, in style-id order
/// * `custom_formats` - Custom format mappings defined in the workbook
/// * `is_1904` - Whether the workbook uses the 1904 date system
pub(crate) fn load_number_formats(
    format_indexes: Vec<String>,
    custom_formats: HashMap<String, CellType>,
    is_1904: bool,
) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Normalizes a relationship target to a path inside the archive
pub(crate) fn to_zip_path(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Checks for the OLE compound file signature and rewinds the reader
fn is_compound_file<R: Read + Seek>(reader: &mut R) -> Result<bool, SheetError> {
    let mut signature = [0u8; 8];
    let matches = match reader.read_exact(&mut signature) {
        Ok(()) => signature == CFB_SIGNATURE,
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(error) => Err(error)?,
    };
    reader.seek(SeekFrom::Start(0))?;
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::build_package;
    use std::io::Cursor;

    #[test]
    fn zip_paths() {
        assert_eq!(to_zip_path("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("xl/styles.xml"), "xl/styles.xml");
    }

    #[test]
    fn compound_files_are_detected() {
        let mut encrypted = Cursor::new([CFB_SIGNATURE.to_vec(), vec![0u8; 16]].concat());
        assert!(is_compound_file(&mut encrypted).unwrap());
        assert_eq!(encrypted.position(), 0);

        let mut short = Cursor::new(vec![1u8, 2, 3]);
        assert!(!is_compound_file(&mut short).unwrap());
    }

    #[test]
    fn relationships_filtered_by_kind() {
        let rels = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;
        let bytes = build_package(&[("xl/_rels/workbook.xml.rels", rels)]);
        let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let relationships = load_relationships(&mut zip, "xl/_rels/workbook.xml.rels", "/worksheet").unwrap();
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships["rId1"], "xl/worksheets/sheet1.xml");
    }
}
