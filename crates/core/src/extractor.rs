use crate::documents::DocumentSource;
use crate::error::IngestError;
use lopdf::Document;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, document: &DocumentSource) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, document: &DocumentSource) -> Result<Vec<PageText>, IngestError> {
        let parsed = Document::load_mem(&document.bytes).map_err(|error| {
            IngestError::Extraction {
                name: document.name.clone(),
                details: error.to_string(),
            }
        })?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in parsed.get_pages() {
            let text = parsed
                .extract_text(&[page_no])
                .map_err(|error| IngestError::Extraction {
                    name: document.name.clone(),
                    details: format!("page {page_no}: {error}"),
                })?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

/// Concatenates every page of every document into one corpus string, in
/// upload order, with no separator between pages or documents. That can glue
/// the last word of one page to the first word of the next; the upstream
/// behavior is preserved on purpose.
///
/// The whole batch fails on the first unreadable document; no partial corpus
/// is ever returned.
pub fn extract_corpus<X: PdfExtractor>(
    extractor: &X,
    documents: &[DocumentSource],
) -> Result<String, IngestError> {
    let mut corpus = String::new();

    for document in documents {
        for page in extractor.extract_pages(document)? {
            corpus.push_str(&page.text);
        }
    }

    Ok(corpus)
}
