use crate::error::IngestError;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// An uploaded PDF: a file name and its raw bytes. Consumed once by
/// extraction and not retained afterwards.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl DocumentSource {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<DocumentSource>, IngestError> {
    let mut documents = Vec::with_capacity(paths.len());

    for path in paths {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
            })?;

        documents.push(DocumentSource::new(name, fs::read(path)?));
    }

    Ok(documents)
}

/// Discovers and reads every PDF under `folder`, in sorted path order.
pub fn load_folder(folder: &Path) -> Result<Vec<DocumentSource>, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::NoDocuments(folder.display().to_string()));
    }

    load_documents(&files)
}

#[cfg(test)]
mod tests {
    use super::{discover_pdf_files, load_folder};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"not a pdf"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn load_folder_fails_without_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = load_folder(dir.path());
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn load_folder_keeps_upload_order() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("b.pdf"), b"second")?;
        fs::write(dir.path().join("a.pdf"), b"first")?;

        let documents = load_folder(dir.path())?;
        assert_eq!(documents[0].name, "a.pdf");
        assert_eq!(documents[1].name, "b.pdf");
        assert_eq!(documents[0].bytes, b"first");
        Ok(())
    }
}
