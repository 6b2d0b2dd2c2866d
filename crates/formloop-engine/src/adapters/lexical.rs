//! Paragraph index with term-overlap retrieval.
//!
//! The index is plain JSON so cache entries stay inspectable. Answers are
//! synthesized by the model from the best matching chunks.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

use formloop_llm::{LlmBackend, Message};
use formloop_utils::error::RunError;

use super::{LlmSettings, complete};
use crate::collaborators::{DocumentIndexer, IndexHandle, QueryAnswerer};

/// Chunks handed to the model per question.
pub const TOP_K: usize = 5;

const INDEX_VERSION: u32 = 1;
const MAX_CHUNK_CHARS: usize = 800;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("static regex"));
static TERM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("static regex"));

/// Words that appear in every question and carry no signal.
const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "answer", "are", "be", "candidate", "feedback", "field", "for",
    "how", "in", "is", "it", "of", "on", "or", "question", "the", "this", "to", "what", "with",
    "would", "you", "your",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalIndex {
    pub version: u32,
    pub chunks: Vec<Chunk>,
}

fn terms(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    TERM.find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Split a paragraph into pieces of at most `MAX_CHUNK_CHARS` on line
/// boundaries. A single overlong line stays whole.
fn split_paragraph(paragraph: &str) -> Vec<String> {
    if paragraph.len() <= MAX_CHUNK_CHARS {
        return vec![paragraph.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for line in paragraph.lines() {
        if !current.is_empty() && current.len() + line.len() + 1 > MAX_CHUNK_CHARS {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

impl LexicalIndex {
    #[must_use]
    pub fn build(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n");
        let chunks = PARAGRAPH_BREAK
            .split(&normalized)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .flat_map(split_paragraph)
            .enumerate()
            .map(|(id, text)| Chunk { id, text })
            .collect();
        Self {
            version: INDEX_VERSION,
            chunks,
        }
    }

    /// Up to `k` chunks sharing the most distinct terms with `query`, in
    /// descending score then document order. Falls back to the leading
    /// chunks when nothing overlaps.
    #[must_use]
    pub fn top_k(&self, query: &str, k: usize) -> Vec<&Chunk> {
        let query_terms = terms(query);
        let mut scored: Vec<(usize, &Chunk)> = self
            .chunks
            .iter()
            .map(|chunk| {
                let chunk_terms = terms(&chunk.text);
                (query_terms.intersection(&chunk_terms).count(), chunk)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        if scored.is_empty() {
            return self.chunks.iter().take(k).collect();
        }
        scored.sort_by(|(sa, ca), (sb, cb)| sb.cmp(sa).then(ca.id.cmp(&cb.id)));
        scored.into_iter().take(k).map(|(_, chunk)| chunk).collect()
    }
}

/// Builds a [`LexicalIndex`] and serializes it as JSON.
#[derive(Debug, Default)]
pub struct LexicalIndexer;

impl LexicalIndexer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentIndexer for LexicalIndexer {
    async fn index_document(&self, bytes: &[u8]) -> Result<Vec<u8>, RunError> {
        let index = LexicalIndex::build(&String::from_utf8_lossy(bytes));
        debug!(chunks = index.chunks.len(), "Built lexical index");
        serde_json::to_vec(&index).map_err(|e| RunError::collaborator("index_document", e))
    }
}

/// Retrieves chunks for a question and asks the model to answer from them.
pub struct LexicalAnswerer {
    backend: Arc<dyn LlmBackend>,
    settings: LlmSettings,
    loaded: Mutex<HashMap<String, Arc<LexicalIndex>>>,
}

impl LexicalAnswerer {
    pub fn new(backend: Arc<dyn LlmBackend>, settings: LlmSettings) -> Self {
        Self {
            backend,
            settings,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    async fn load(&self, handle: &IndexHandle) -> Result<Arc<LexicalIndex>, RunError> {
        if let Some(index) = self
            .loaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&handle.cache_key)
        {
            return Ok(Arc::clone(index));
        }

        let bytes = tokio::fs::read(&handle.artifact_path)
            .await
            .map_err(|e| RunError::collaborator("load_index", e))?;
        let index: LexicalIndex =
            serde_json::from_slice(&bytes).map_err(|e| RunError::collaborator("load_index", e))?;
        let index = Arc::new(index);
        self.loaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle.cache_key.clone(), Arc::clone(&index));
        Ok(index)
    }
}

const ANSWER_SYSTEM_PROMPT: &str = "You answer questions about a job candidate using only the \
     resume excerpts provided. If the excerpts do not contain the answer, say so briefly.";

fn answer_prompt(question: &str, chunks: &[&Chunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n---\n");
    format!(
        "<context>\n{context}\n</context>\n\n{question}\n\n\
         Reply with the value to enter in the form field, without extra commentary."
    )
}

#[async_trait]
impl QueryAnswerer for LexicalAnswerer {
    async fn answer_query(&self, index: &IndexHandle, question: &str) -> Result<String, RunError> {
        let loaded = self.load(index).await?;
        let chunks = loaded.top_k(question, TOP_K);
        let answer = complete(
            self.backend.as_ref(),
            &self.settings,
            "answer_query",
            vec![
                Message::system(ANSWER_SYSTEM_PROMPT),
                Message::user(answer_prompt(question, &chunks)),
            ],
        )
        .await?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::ScriptedBackend;
    use std::time::Duration;
    use tempfile::TempDir;

    const RESUME: &str = "Ana Lin\nSoftware Engineer\n\n\
                          Experience\nAcme Corp, 2019-2024, backend services in Rust\n\n\
                          Education\nBSc Computer Science, University of Lisbon\n\n\
                          Contact\nana.lin@example.com";

    #[test]
    fn test_build_splits_paragraphs() {
        let index = LexicalIndex::build(RESUME);
        assert_eq!(index.version, 1);
        assert_eq!(index.chunks.len(), 4);
        assert_eq!(index.chunks[0].text, "Ana Lin\nSoftware Engineer");
        assert_eq!(index.chunks[3].id, 3);
    }

    #[test]
    fn test_long_paragraph_is_split_on_lines() {
        let line = "x".repeat(300);
        let paragraph = vec![line.as_str(); 5].join("\n");
        let index = LexicalIndex::build(&paragraph);
        assert!(index.chunks.len() > 1);
        assert!(index.chunks.iter().all(|c| c.text.len() <= MAX_CHUNK_CHARS));
    }

    #[test]
    fn test_top_k_prefers_overlap() {
        let index = LexicalIndex::build(RESUME);
        let question = "How would you answer this question about the candidate? \
                        <field>Education</field>";
        let top = index.top_k(question, 2);
        assert_eq!(top[0].text.lines().next(), Some("Education"));
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn test_top_k_falls_back_to_leading_chunks() {
        let index = LexicalIndex::build(RESUME);
        let top = index.top_k("zzz qqq", 2);
        assert_eq!(top.iter().map(|c| c.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_answer_uses_published_index() {
        let temp = TempDir::new().unwrap();
        let bytes = LexicalIndexer::new()
            .index_document(RESUME.as_bytes())
            .await
            .unwrap();
        let artifact_path = temp.path().join("index.json");
        std::fs::write(&artifact_path, bytes).unwrap();
        let handle = IndexHandle {
            cache_key: "k".into(),
            artifact_path,
        };

        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(" ana.lin@example.com \n".into()),
            Ok("Lin".into()),
        ]));
        let answerer = LexicalAnswerer::new(
            backend.clone(),
            LlmSettings {
                model: String::new(),
                timeout: Duration::from_secs(5),
            },
        );

        let answer = answerer
            .answer_query(&handle, "<field>Contact email</field>")
            .await
            .unwrap();
        assert_eq!(answer, "ana.lin@example.com");

        // Second question is served from the in-memory copy.
        std::fs::remove_file(&handle.artifact_path).unwrap();
        assert_eq!(
            answerer.answer_query(&handle, "<field>Last Name</field>").await.unwrap(),
            "Lin"
        );

        let seen = backend.seen.lock().unwrap();
        assert!(seen[0].messages[1].content.contains("ana.lin@example.com"));
    }
}
