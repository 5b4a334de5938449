use crate::chunking::{chunk_text, ChunkerConfig};
use crate::condense::condense_question;
use crate::documents::DocumentSource;
use crate::embeddings::Embedder;
use crate::error::ChatError;
use crate::extractor::{extract_corpus, PdfExtractor};
use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::models::{ChatMessage, ScoredChunk, Turn};
use tracing::{debug, info};

pub const DEFAULT_RETRIEVAL_K: usize = 6;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub chunking: ChunkerConfig,
    pub top_k: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkerConfig::default(),
            top_k: DEFAULT_RETRIEVAL_K,
        }
    }
}

/// The single active (index, history) pair for one conversation. Both start
/// unset; a successful build installs the index and empties the history, and
/// the history then grows one turn per successful ask.
#[derive(Default)]
pub struct Session {
    index: Option<VectorIndex>,
    history: Vec<Turn>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an index has been built, i.e. whether `ask` is allowed.
    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Flattens the history into an alternating message list, user first,
    /// in insertion order. Roles are tagged explicitly rather than inferred
    /// from list position.
    pub fn transcript(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() * 2);
        for turn in &self.history {
            messages.push(ChatMessage::user(turn.question.clone()));
            messages.push(ChatMessage::assistant(turn.answer.clone()));
        }
        messages
    }
}

/// Orchestrates condensation, retrieval, and answer generation over an
/// injected session. One in-flight action at a time; `&mut self` makes the
/// single-mutator rule a compile-time fact.
pub struct ConversationEngine<X, E, G>
where
    X: PdfExtractor,
    E: Embedder,
    G: Generator,
{
    extractor: X,
    embedder: E,
    generator: G,
    options: EngineOptions,
    session: Session,
}

impl<X, E, G> ConversationEngine<X, E, G>
where
    X: PdfExtractor,
    E: Embedder + Sync,
    G: Generator + Sync,
{
    pub fn new(extractor: X, embedder: E, generator: G, options: EngineOptions) -> Self {
        Self {
            extractor,
            embedder,
            generator,
            options,
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Extracts, chunks, embeds, and indexes a fresh document batch. The
    /// session is only touched after the whole pipeline succeeds: the new
    /// index replaces any prior one and the history resets, since old turns
    /// refer to a corpus that no longer backs retrieval. On failure the
    /// session keeps its last good state.
    pub async fn process(&mut self, documents: &[DocumentSource]) -> Result<usize, ChatError> {
        let corpus = extract_corpus(&self.extractor, documents)?;
        let chunks = chunk_text(&corpus, &self.options.chunking)?;
        let index = VectorIndex::build(&chunks, &self.embedder).await?;
        let entries = index.len();

        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "built fresh index"
        );

        self.session.index = Some(index);
        self.session.history.clear();
        Ok(entries)
    }

    /// Adopts an already-built index (e.g. restored from disk). Same session
    /// transition as a fresh build: history resets.
    pub fn attach_index(&mut self, index: VectorIndex) {
        info!(entries = index.len(), "attached persisted index");
        self.session.index = Some(index);
        self.session.history.clear();
    }

    /// Answers one question: condense against the history, retrieve the
    /// top-k supporting passages, generate an answer conditioned on both,
    /// then append the turn. A failure at any step appends nothing.
    pub async fn ask(&mut self, question: &str) -> Result<Turn, ChatError> {
        let index = self.session.index.as_ref().ok_or(ChatError::NotReady)?;

        let standalone =
            condense_question(&self.generator, &self.session.history, question).await?;
        debug!(standalone = %standalone, "condensed follow-up question");

        let passages = index
            .search(&self.embedder, &standalone, self.options.top_k)
            .await?;
        debug!(passages = passages.len(), "retrieved supporting passages");

        let messages = answer_messages(&passages, &self.session.history, &standalone);
        let answer = self.generator.generate(&messages).await?;

        let turn = Turn::new(question, answer);
        self.session.history.push(turn.clone());
        Ok(turn)
    }
}

/// Builds the answer-generation call: retrieved context as the system
/// message, prior turns as alternating chat messages, then the standalone
/// question.
fn answer_messages(
    passages: &[ScoredChunk],
    history: &[Turn],
    standalone_question: &str,
) -> Vec<ChatMessage> {
    let mut context = String::new();
    for passage in passages {
        context.push_str(&passage.text);
        context.push_str("\n\n");
    }

    let system = format!(
        "Use the following pieces of context to answer the question at the \
         end. If you don't know the answer, just say that you don't know, \
         don't try to make up an answer.\n\n{context}"
    );

    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(system));
    for turn in history {
        messages.push(ChatMessage::user(turn.question.clone()));
        messages.push(ChatMessage::assistant(turn.answer.clone()));
    }
    messages.push(ChatMessage::user(standalone_question.to_string()));
    messages
}

#[cfg(test)]
mod tests {
    use super::{ConversationEngine, EngineOptions};
    use crate::chunking::ChunkerConfig;
    use crate::documents::DocumentSource;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::{ChatError, IngestError};
    use crate::extractor::{PageText, PdfExtractor};
    use crate::generation::Generator;
    use crate::models::{ChatMessage, Role};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Treats the "pdf bytes" as utf-8 text, one page per document.
    struct PlainTextExtractor;

    impl PdfExtractor for PlainTextExtractor {
        fn extract_pages(&self, document: &DocumentSource) -> Result<Vec<PageText>, IngestError> {
            Ok(vec![PageText {
                number: 1,
                text: String::from_utf8_lossy(&document.bytes).into_owned(),
            }])
        }
    }

    struct ScriptedGenerator {
        replies: Mutex<Vec<String>>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedGenerator {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|reply| reply.to_string()).collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call(&self, index: usize) -> Vec<ChatMessage> {
            self.calls.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "answer".to_string()))
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _messages: &[ChatMessage]) -> Result<String, ChatError> {
            Err(ChatError::Generation("model overloaded".to_string()))
        }
    }

    fn engine_with(
        generator: ScriptedGenerator,
    ) -> ConversationEngine<PlainTextExtractor, CharacterNgramEmbedder, ScriptedGenerator> {
        ConversationEngine::new(
            PlainTextExtractor,
            CharacterNgramEmbedder::default(),
            generator,
            EngineOptions {
                chunking: ChunkerConfig {
                    size: 60,
                    overlap: 12,
                    ..ChunkerConfig::default()
                },
                top_k: 3,
            },
        )
    }

    fn manual() -> DocumentSource {
        DocumentSource::new(
            "manual.pdf",
            b"The turbine spins at high speed.\nBearings need regular oiling.\nCompressors feed the intake.\n".to_vec(),
        )
    }

    #[tokio::test]
    async fn ask_before_process_fails_and_leaves_history_empty() {
        let mut engine = engine_with(ScriptedGenerator::new(&[]));

        let result = engine.ask("What spins?").await;
        assert!(matches!(result, Err(ChatError::NotReady)));
        assert!(!engine.session().is_ready());
        assert!(engine.session().history().is_empty());
    }

    #[tokio::test]
    async fn asks_append_turns_in_order_and_transcript_alternates() {
        let mut engine = engine_with(ScriptedGenerator::new(&[
            "It is the turbine.",
            "Bearings need oiling.",
            "Compressors feed it.",
        ]));

        engine.process(&[manual()]).await.unwrap();
        assert!(engine.session().is_ready());

        engine.ask("What spins?").await.unwrap();
        engine.ask("What needs oiling?").await.unwrap();
        engine.ask("What feeds the intake?").await.unwrap();

        let history = engine.session().history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].question, "What spins?");
        assert_eq!(history[0].answer, "It is the turbine.");
        assert_eq!(history[2].question, "What feeds the intake?");

        let transcript = engine.session().transcript();
        assert_eq!(transcript.len(), 6);
        for (position, message) in transcript.iter().enumerate() {
            let expected = if position % 2 == 0 {
                Role::User
            } else {
                Role::Assistant
            };
            assert_eq!(message.role, expected);
        }
        assert_eq!(transcript[0].content, "What spins?");
        assert_eq!(transcript[1].content, "It is the turbine.");
    }

    #[tokio::test]
    async fn second_ask_condenses_against_the_history() {
        let engine_generator = ScriptedGenerator::new(&[
            "The turbine.",
            "How fast does the turbine spin?",
            "Very fast.",
        ]);
        let mut engine = engine_with(engine_generator);

        engine.process(&[manual()]).await.unwrap();

        // First ask has no history, so only the answer call happens.
        engine.ask("What spins?").await.unwrap();
        assert_eq!(engine.session().history().len(), 1);

        // Second ask adds a condensation call before the answer call.
        let turn = engine.ask("How fast does it spin?").await.unwrap();
        assert_eq!(turn.question, "How fast does it spin?");
        assert_eq!(turn.answer, "Very fast.");

        let generator = &engine.generator;
        assert_eq!(generator.call_count(), 3);

        let condense_call = generator.call(1);
        assert_eq!(condense_call.len(), 1);
        assert!(condense_call[0].content.contains("Standalone question:"));
        assert!(condense_call[0].content.contains("Human: What spins?"));

        // The answer call carries the condensed question, not the raw one.
        let answer_call = generator.call(2);
        assert_eq!(
            answer_call.last().unwrap().content,
            "How fast does the turbine spin?"
        );
        assert_eq!(answer_call[0].role, Role::System);
    }

    #[tokio::test]
    async fn reprocess_clears_the_history() {
        let mut engine = engine_with(ScriptedGenerator::new(&["First answer."]));

        engine.process(&[manual()]).await.unwrap();
        engine.ask("What spins?").await.unwrap();
        assert_eq!(engine.session().history().len(), 1);

        engine.process(&[manual()]).await.unwrap();
        assert!(engine.session().is_ready());
        assert!(engine.session().history().is_empty());
    }

    #[tokio::test]
    async fn failed_generation_appends_nothing() {
        let mut engine = ConversationEngine::new(
            PlainTextExtractor,
            CharacterNgramEmbedder::default(),
            FailingGenerator,
            EngineOptions::default(),
        );

        engine.process(&[manual()]).await.unwrap();
        let result = engine.ask("What spins?").await;

        assert!(matches!(result, Err(ChatError::Generation(_))));
        assert!(engine.session().history().is_empty());
    }

    struct RefusingExtractor;

    impl PdfExtractor for RefusingExtractor {
        fn extract_pages(&self, document: &DocumentSource) -> Result<Vec<PageText>, IngestError> {
            Err(IngestError::Extraction {
                name: document.name.clone(),
                details: "unreadable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn failed_process_leaves_session_unindexed() {
        let mut engine = ConversationEngine::new(
            RefusingExtractor,
            CharacterNgramEmbedder::default(),
            ScriptedGenerator::new(&[]),
            EngineOptions::default(),
        );

        let result = engine.process(&[manual()]).await;
        assert!(matches!(
            result,
            Err(ChatError::Ingest(IngestError::Extraction { .. }))
        ));
        assert!(!engine.session().is_ready());
        assert!(engine.session().history().is_empty());
    }
}
