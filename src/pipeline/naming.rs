//! Output names derived from input names.
//!
//! LibreOffice names its output after the input's base name with the last
//! extension swapped for the target format's. The handler must predict that
//! name to find the file afterwards and to pick the upload key, so both use
//! the rules here.

/// `report.docx` → `report.pdf`; `archive.tar.doc` → `archive.tar.pdf`.
///
/// A name without a `.` gets `.pdf` appended.
pub fn pdf_file_name(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(dot) => format!("{}.pdf", &file_name[..dot]),
        None => format!("{file_name}.pdf"),
    }
}

/// Apply [`pdf_file_name`] to the last segment of an object key, keeping
/// its "directory" prefix.
pub fn pdf_key(key: &str) -> String {
    match key.rfind('/') {
        Some(slash) => format!("{}{}", &key[..=slash], pdf_file_name(&key[slash + 1..])),
        None => pdf_file_name(key),
    }
}
