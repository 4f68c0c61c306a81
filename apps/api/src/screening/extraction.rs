//! Text Extractor: turns uploads (single files or ZIP entries) into plain text.
//!
//! Failures are captured per document: one unreadable file never aborts its siblings.
//! Extraction runs on the blocking pool, one task per document.

use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use zip::ZipArchive;

const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt"];
const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const MACOS_METADATA_DIR: &str = "__MACOSX";
const DOCX_BODY_PART: &str = "word/document.xml";
/// Default cap on the inflated size of one archive entry or DOCX body.
pub const DEFAULT_MAX_ENTRY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("document contains no extractable text")]
    Empty,

    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("corrupt or unreadable document: {0}")]
    Corrupt(String),

    #[error("unreadable archive: {0}")]
    Archive(String),

    #[error("text extraction crashed")]
    Panicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
    Zip,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "txt" => Some(DocumentFormat::Text),
            "zip" => Some(DocumentFormat::Zip),
            _ => None,
        }
    }

    /// Declared extension first, then magic bytes, then UTF-8 text.
    pub fn detect(name: &str, bytes: &[u8]) -> Result<Self, ExtractionError> {
        let ext = extension_of(name);
        if let Some(format) = ext.and_then(Self::from_extension) {
            return Ok(format);
        }
        if bytes.starts_with(PDF_MAGIC) {
            Ok(DocumentFormat::Pdf)
        } else if bytes.starts_with(ZIP_MAGIC) {
            if is_docx_package(bytes) {
                Ok(DocumentFormat::Docx)
            } else {
                Ok(DocumentFormat::Zip)
            }
        } else if std::str::from_utf8(bytes).is_ok() {
            Ok(DocumentFormat::Text)
        } else {
            Err(ExtractionError::Unsupported(
                ext.unwrap_or("unknown").to_string(),
            ))
        }
    }
}

/// One uploaded file, as received.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Bytes,
}

/// A resume after extraction. `text` is computed once and never changes.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub text: Result<String, ExtractionError>,
}

/// An expanded upload waiting for extraction, or already known to be unreadable.
#[derive(Debug)]
struct Pending {
    name: String,
    source: Result<(DocumentFormat, Bytes), ExtractionError>,
}

/// Expands archives and extracts every document concurrently.
/// Returns one `Document` per expanded upload, in upload order.
/// No single entry or DOCX body may inflate past `max_entry_bytes`.
pub async fn extract_all(uploads: Vec<Upload>, max_entry_bytes: usize) -> Vec<Document> {
    let pending = expand_uploads(uploads, max_entry_bytes);
    let total = pending.len();

    let mut names = Vec::with_capacity(total);
    let mut texts: Vec<Option<Result<String, ExtractionError>>> = vec![None; total];
    let mut tasks = JoinSet::new();

    for (index, item) in pending.into_iter().enumerate() {
        names.push(item.name);
        match item.source {
            Ok((format, bytes)) => {
                tasks.spawn_blocking(move || {
                    let text = panic::catch_unwind(AssertUnwindSafe(|| {
                        extract_text(format, &bytes, max_entry_bytes)
                    }))
                    .unwrap_or(Err(ExtractionError::Panicked));
                    (index, text)
                });
            }
            Err(error) => texts[index] = Some(Err(error)),
        }
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, text)) => texts[index] = Some(text),
            Err(e) => warn!("Extraction task did not complete: {e}"),
        }
    }

    let documents: Vec<Document> = names
        .into_iter()
        .zip(texts)
        .map(|(name, text)| Document {
            name,
            text: text.unwrap_or(Err(ExtractionError::Panicked)),
        })
        .collect();

    let readable = documents.iter().filter(|d| d.text.is_ok()).count();
    info!("Extracted text from {readable}/{total} documents");
    documents
}

fn expand_uploads(uploads: Vec<Upload>, max_entry_bytes: usize) -> Vec<Pending> {
    let mut pending = Vec::new();
    for upload in uploads {
        match DocumentFormat::detect(&upload.name, &upload.bytes) {
            Ok(DocumentFormat::Zip) => match expand_archive(
                &upload.name,
                &upload.bytes,
                max_entry_bytes,
            ) {
                Ok(entries) if entries.is_empty() => {
                    warn!("Archive {} holds no resumes", upload.name);
                    pending.push(Pending {
                        name: upload.name,
                        source: Err(ExtractionError::Archive(
                            "no resumes in archive".to_string(),
                        )),
                    });
                }
                Ok(entries) => {
                    info!(
                        "Archive {} expanded into {} documents",
                        upload.name,
                        entries.len()
                    );
                    pending.extend(entries);
                }
                Err(error) => {
                    warn!("Could not open archive {}: {error}", upload.name);
                    pending.push(Pending {
                        name: upload.name,
                        source: Err(error),
                    });
                }
            },
            Ok(format) => pending.push(Pending {
                name: upload.name,
                source: Ok((format, upload.bytes)),
            }),
            Err(error) => pending.push(Pending {
                name: upload.name,
                source: Err(error),
            }),
        }
    }
    pending
}

/// Entries are named by their path inside the archive, so equal basenames stay distinct.
fn expand_archive(
    archive_name: &str,
    bytes: &[u8],
    max_entry_bytes: usize,
) -> Result<Vec<Pending>, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Archive(e.to_string()))?;

    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                entries.push(Pending {
                    name: format!("{archive_name}#{i}"),
                    source: Err(ExtractionError::Archive(e.to_string())),
                });
                continue;
            }
        };

        if entry.is_dir() || !is_resume_entry(entry.name()) {
            debug!("Skipping archive entry {}", entry.name());
            continue;
        }

        let name = entry.name().replace('\\', "/").trim_start_matches('/').to_string();
        let source = match extension_of(&name).and_then(DocumentFormat::from_extension) {
            None => Err(ExtractionError::Unsupported(name.clone())),
            Some(format) => {
                let declared = entry.size();
                match read_capped(&mut entry, declared, max_entry_bytes) {
                    Ok(Some(buf)) => Ok((format, Bytes::from(buf))),
                    Ok(None) => {
                        warn!(
                            "Archive entry {name} in {archive_name} exceeds {max_entry_bytes} bytes"
                        );
                        Err(ExtractionError::Archive("entry too large".to_string()))
                    }
                    Err(e) => Err(ExtractionError::Archive(e.to_string())),
                }
            }
        };
        entries.push(Pending { name, source });
    }
    Ok(entries)
}

/// Reads at most `limit` bytes. `None` when the declared or actual size is over the limit.
fn read_capped(
    reader: impl Read,
    declared: u64,
    limit: usize,
) -> std::io::Result<Option<Vec<u8>>> {
    let limit = limit as u64;
    if declared > limit {
        return Ok(None);
    }
    let mut buf = Vec::new();
    reader.take(limit + 1).read_to_end(&mut buf)?;
    if buf.len() as u64 > limit {
        return Ok(None);
    }
    Ok(Some(buf))
}

/// A ZIP whose body part marks it as a Word document.
fn is_docx_package(bytes: &[u8]) -> bool {
    ZipArchive::new(Cursor::new(bytes))
        .map(|archive| archive.file_names().any(|name| name == DOCX_BODY_PART))
        .unwrap_or(false)
}

/// Accepted extension, outside macOS metadata folders, not a hidden or `._` file.
fn is_resume_entry(path: &str) -> bool {
    if path.split('/').any(|part| part == MACOS_METADATA_DIR) {
        return false;
    }
    let name = basename(path);
    if name.starts_with('.') {
        return false;
    }
    extension_of(name)
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn extension_of(name: &str) -> Option<&str> {
    let (stem, ext) = basename(name).rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// Extracts plain text from one document. Whitespace-only output is `Empty`.
pub fn extract_text(
    format: DocumentFormat,
    bytes: &[u8],
    max_entry_bytes: usize,
) -> Result<String, ExtractionError> {
    let text = match format {
        DocumentFormat::Pdf => extract_pdf_text(bytes)?,
        DocumentFormat::Docx => extract_docx_text(bytes, max_entry_bytes)?,
        DocumentFormat::Text => String::from_utf8_lossy(bytes).into_owned(),
        DocumentFormat::Zip => return Err(ExtractionError::Unsupported("nested zip".to_string())),
    };

    let text = tidy_whitespace(&text);
    if text.is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(text)
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractionError::Corrupt("missing %PDF- header".to_string()));
    }
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractionError::Corrupt(e.to_string()))
}

fn extract_docx_text(bytes: &[u8], max_body_bytes: usize) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Corrupt(format!("not a DOCX archive: {e}")))?;

    let mut body = archive
        .by_name(DOCX_BODY_PART)
        .map_err(|_| ExtractionError::Corrupt(format!("missing {DOCX_BODY_PART}")))?;
    let declared = body.size();
    let raw = read_capped(&mut body, declared, max_body_bytes)
        .map_err(|e| ExtractionError::Corrupt(e.to_string()))?
        .ok_or_else(|| ExtractionError::Corrupt(format!("{DOCX_BODY_PART} is too large")))?;
    let xml = String::from_utf8(raw).map_err(|e| ExtractionError::Corrupt(e.to_string()))?;

    let mut reader = XmlReader::from_str(&xml);
    let mut buf = Vec::new();
    let mut output = String::new();
    let mut in_text_node = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text_node = true,
                b"w:tab" => output.push('\t'),
                b"w:br" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"w:tab" => output.push('\t'),
                b"w:br" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_node {
                    let value = e
                        .unescape()
                        .map_err(|err| ExtractionError::Corrupt(err.to_string()))?;
                    output.push_str(&value);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text_node = false,
                b"w:p" => output.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ExtractionError::Corrupt(format!(
                    "failed to parse DOCX XML: {err}"
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(output)
}

/// Collapses whitespace runs inside each line and drops blank lines.
fn tidy_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const LIMIT: usize = 1024 * 1024;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        );
        build_zip(&[(DOCX_BODY_PART, xml.as_bytes())])
    }

    fn upload(name: &str, bytes: impl Into<Bytes>) -> Upload {
        Upload {
            name: name.to_string(),
            bytes: bytes.into(),
        }
    }

    #[test]
    fn test_detect_format_by_extension_then_magic() {
        assert_eq!(
            DocumentFormat::detect("CV.PDF", b"whatever").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::detect("resume", b"%PDF-1.7 ...").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::detect("batch", b"PK\x03\x04rest").unwrap(),
            DocumentFormat::Zip
        );
        assert_eq!(
            DocumentFormat::detect("notes", b"plain words").unwrap(),
            DocumentFormat::Text
        );
        assert!(matches!(
            DocumentFormat::detect("photo.jpg", &[0xff, 0xd8, 0xff, 0xe0, 0x80]),
            Err(ExtractionError::Unsupported(ext)) if ext == "jpg"
        ));
    }

    #[test]
    fn test_extract_plain_text_tidies_whitespace() {
        let text =
            extract_text(DocumentFormat::Text, b"  Jane   Doe \n\n\tGo  engineer\n", LIMIT).unwrap();
        assert_eq!(text, "Jane Doe\nGo engineer");
    }

    #[test]
    fn test_blank_document_is_empty_error() {
        assert_eq!(
            extract_text(DocumentFormat::Text, b" \n\t \n", LIMIT),
            Err(ExtractionError::Empty)
        );
    }

    #[test]
    fn test_pdf_without_header_is_corrupt() {
        assert!(matches!(
            extract_text(DocumentFormat::Pdf, b"definitely not a pdf", LIMIT),
            Err(ExtractionError::Corrupt(_))
        ));
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let docx = build_docx(&["Jane Doe", "github.com/jdoe", "Go &amp; Rust"]);
        let text = extract_text(DocumentFormat::Docx, &docx, LIMIT).unwrap();
        assert_eq!(text, "Jane Doe\ngithub.com/jdoe\nGo & Rust");
    }

    #[test]
    fn test_docx_without_body_is_corrupt() {
        let zip = build_zip(&[("word/styles.xml", b"<x/>")]);
        assert!(matches!(
            extract_text(DocumentFormat::Docx, &zip, LIMIT),
            Err(ExtractionError::Corrupt(_))
        ));
    }

    #[test]
    fn test_archive_skips_metadata_hidden_and_foreign_files() {
        let docx = build_docx(&["Bob"]);
        let zip = build_zip(&[
            ("resumes/alice.txt", b"Alice resume"),
            ("__MACOSX/resumes/._alice.txt", b"junk"),
            ("resumes/.DS_Store.txt", b"junk"),
            ("resumes/notes.md", b"# notes"),
            ("resumes/bob.docx", &docx),
        ]);
        let pending = expand_uploads(vec![upload("batch.zip", zip)], LIMIT);
        let names: Vec<&str> = pending.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["resumes/alice.txt", "resumes/bob.docx"]);
        assert!(pending.iter().all(|p| p.source.is_ok()));
    }

    #[test]
    fn test_corrupt_archive_becomes_one_failed_document() {
        let pending = expand_uploads(
            vec![upload("batch.zip", &b"PK\x03\x04 garbage"[..])],
            LIMIT,
        );
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, "batch.zip");
        assert!(matches!(pending[0].source, Err(ExtractionError::Archive(_))));
    }

    #[tokio::test]
    async fn test_one_bad_document_does_not_affect_siblings() {
        let documents = extract_all(
            vec![
                upload("first.txt", &b"First resume"[..]),
                upload("broken.pdf", &b"%PDF-1.4 this is not really a pdf"[..]),
                upload("third.txt", &b"Third resume"[..]),
            ],
            LIMIT,
        )
        .await;

        assert_eq!(documents.len(), 3);
        assert_eq!(documents[0].name, "first.txt");
        assert_eq!(documents[0].text.as_deref(), Ok("First resume"));
        assert_eq!(documents[1].name, "broken.pdf");
        assert!(documents[1].text.is_err());
        assert_eq!(documents[2].text.as_deref(), Ok("Third resume"));
    }

    #[tokio::test]
    async fn test_archive_entries_keep_archive_order() {
        let zip = build_zip(&[("b.txt", b"Bee"), ("a.txt", b"Ay")]);
        let documents = extract_all(
            vec![upload("all.zip", zip), upload("c.txt", &b"Cee"[..])],
            LIMIT,
        )
        .await;
        let names: Vec<&str> = documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt", "c.txt"]);
    }

    #[test]
    fn test_oversized_entry_fails_alone() {
        let mut big = b"Jane ".to_vec();
        big.resize(LIMIT + 1, b' ');
        let zip = build_zip(&[("big.txt", &big[..]), ("small.txt", b"Small resume")]);

        let pending = expand_uploads(vec![upload("batch.zip", zip)], LIMIT);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].name, "big.txt");
        assert!(matches!(
            &pending[0].source,
            Err(ExtractionError::Archive(msg)) if msg == "entry too large"
        ));
        assert!(pending[1].source.is_ok());
    }

    #[test]
    fn test_oversized_docx_body_is_corrupt() {
        let docx = build_docx(&["Jane Doe"]);
        assert!(matches!(
            extract_text(DocumentFormat::Docx, &docx, 16),
            Err(ExtractionError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_archive_without_resumes_is_reported() {
        let zip = build_zip(&[("notes.md", b"# notes")]);
        let documents = extract_all(vec![upload("batch.zip", zip)], LIMIT).await;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].name, "batch.zip");
        assert_eq!(
            documents[0].text,
            Err(ExtractionError::Archive("no resumes in archive".to_string()))
        );
    }

    #[tokio::test]
    async fn test_docx_without_extension_is_read_as_docx() {
        let docx = build_docx(&["Jane Doe", "github.com/jdoe"]);
        assert_eq!(
            DocumentFormat::detect("resume", &docx).unwrap(),
            DocumentFormat::Docx
        );
        let documents = extract_all(vec![upload("resume", docx)], LIMIT).await;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].text.as_deref(), Ok("Jane Doe\ngithub.com/jdoe"));
    }

    #[test]
    fn test_same_basename_in_different_folders_stays_distinct() {
        let zip = build_zip(&[("a/resume.txt", b"First"), ("b/resume.txt", b"Second")]);
        let pending = expand_uploads(vec![upload("batch.zip", zip)], LIMIT);
        let names: Vec<&str> = pending.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a/resume.txt", "b/resume.txt"]);
    }
}
