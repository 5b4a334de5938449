pub mod chunking;
pub mod condense;
pub mod conversation;
pub mod documents;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod index;
pub mod models;

pub use chunking::{chunk_text, ChunkerConfig};
pub use condense::{condense_prompt, condense_question};
pub use conversation::{ConversationEngine, EngineOptions, Session, DEFAULT_RETRIEVAL_K};
pub use documents::{discover_pdf_files, load_documents, load_folder, DocumentSource};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{ChatError, IngestError};
pub use extractor::{extract_corpus, LopdfExtractor, PageText, PdfExtractor};
pub use generation::{ChatCompletionsClient, Generator, DEFAULT_GENERATION_MODEL};
pub use index::VectorIndex;
pub use models::{ChatMessage, Role, ScoredChunk, Turn, VectorEntry};
