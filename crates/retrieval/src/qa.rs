//! Question answering over retrieved context
//!
//! All retrieved chunks are "stuffed" into one prompt together with the
//! question, and the engine answers in a single completion.

use tracing::debug;

use common::error::Result;
use inference_engine::InferenceEngine;
use crate::document::Document;
use crate::ingester::VectorIndex;

/// Number of chunks retrieved when the caller does not say
pub const DEFAULT_NUM_SOURCE_DOCS: usize = 4;

const DEFAULT_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:";

/// Answer text plus the chunks it was generated from, most relevant first
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub source_documents: Vec<Document>,
}

/// Template with `{context}` and `{question}` slots
#[derive(Debug, Clone)]
pub struct StuffPrompt {
    template: String,
}

impl Default for StuffPrompt {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl StuffPrompt {
    /// Wraps a template with `{context}` and `{question}` slots
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Concatenates the chunk contents, separated by blank lines
    pub fn context(documents: &[Document]) -> String {
        documents
            .iter()
            .map(|d| d.page_content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Fills both slots, leaving placeholders inside chunk text alone
    pub fn render(&self, question: &str, documents: &[Document]) -> String {
        let context = Self::context(documents);
        match self.template.split_once("{question}") {
            Some((head, tail)) => {
                format!("{}{}{}", head.replace("{context}", &context), question, tail)
            }
            None => self.template.replace("{context}", &context),
        }
    }

    /// Retrieves `k` chunks for `question` and asks `engine` to answer from them
    pub async fn answer(
        &self,
        engine: &dyn InferenceEngine,
        index: &dyn VectorIndex,
        question: &str,
        k: usize,
    ) -> Result<Answer> {
        let source_documents = index.retrieve(question, k).await?;
        debug!("Retrieved {} chunks for question", source_documents.len());

        let prompt = self.render(question, &source_documents);
        let answer = engine.generate(&prompt).await?;

        Ok(Answer {
            answer,
            source_documents,
        })
    }
}
