use crate::error::ChatError;
use crate::generation::Generator;
use crate::models::{ChatMessage, Turn};

/// Formats the conversation so far plus the follow-up into a rewrite
/// instruction for the generation collaborator.
pub fn condense_prompt(history: &[Turn], question: &str) -> String {
    let mut chat_history = String::new();
    for turn in history {
        chat_history.push_str("Human: ");
        chat_history.push_str(&turn.question);
        chat_history.push('\n');
        chat_history.push_str("Assistant: ");
        chat_history.push_str(&turn.answer);
        chat_history.push('\n');
    }

    format!(
        "Given the following conversation and a follow up question, rephrase \
         the follow up question to be a standalone question, in its original \
         language.\nChat History:\n{chat_history}Follow Up Input: {question}\n\
         Standalone question:"
    )
}

/// Rewrites a follow-up question so a retriever can use it without the
/// conversation context. With no history there is nothing to resolve and the
/// question passes through verbatim, without a generation call. The
/// collaborator's reply is returned unmodified; its failures propagate
/// unchanged with no retry.
pub async fn condense_question<G>(
    generator: &G,
    history: &[Turn],
    question: &str,
) -> Result<String, ChatError>
where
    G: Generator + Sync + ?Sized,
{
    if history.is_empty() {
        return Ok(question.to_string());
    }

    let prompt = condense_prompt(history, question);
    generator
        .generate(&[ChatMessage::user(prompt)])
        .await
}

#[cfg(test)]
mod tests {
    use super::{condense_prompt, condense_question};
    use crate::error::ChatError;
    use crate::generation::Generator;
    use crate::models::{ChatMessage, Turn};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingGenerator {
        reply: String,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl RecordingGenerator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _messages: &[ChatMessage]) -> Result<String, ChatError> {
            Err(ChatError::Generation("model overloaded".to_string()))
        }
    }

    #[tokio::test]
    async fn empty_history_passes_the_question_through() {
        let generator = RecordingGenerator::new("unused");
        let standalone = condense_question(&generator, &[], "What is a turbine?")
            .await
            .unwrap();

        assert_eq!(standalone, "What is a turbine?");
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn history_is_rendered_into_the_prompt() {
        let history = vec![Turn::new("What is a turbine?", "A rotary engine.")];
        let prompt = condense_prompt(&history, "How efficient is it?");

        assert!(prompt.contains("Human: What is a turbine?"));
        assert!(prompt.contains("Assistant: A rotary engine."));
        assert!(prompt.contains("Follow Up Input: How efficient is it?"));
        assert!(prompt.ends_with("Standalone question:"));
    }

    #[tokio::test]
    async fn reply_is_returned_unmodified() {
        let generator = RecordingGenerator::new("  How efficient is a turbine?  ");
        let history = vec![Turn::new("What is a turbine?", "A rotary engine.")];

        let standalone = condense_question(&generator, &history, "How efficient is it?")
            .await
            .unwrap();

        assert_eq!(standalone, "  How efficient is a turbine?  ");
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn generation_failure_propagates() {
        let history = vec![Turn::new("q", "a")];
        let result = condense_question(&FailingGenerator, &history, "follow up").await;
        assert!(matches!(result, Err(ChatError::Generation(_))));
    }
}
