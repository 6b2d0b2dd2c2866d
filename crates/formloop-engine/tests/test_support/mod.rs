//! Stub collaborators and fixtures shared by the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use formloop_engine::{
    Collaborators, DecisionOracle, DocumentIndexer, Engine, EngineOptions, FormFieldExtractor,
    IndexHandle, QueryAnswerer,
};
use formloop_utils::error::RunError;

pub struct StubExtractor {
    pub fields: Vec<String>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl FormFieldExtractor for StubExtractor {
    async fn extract_fields(&self, _form_text: &str) -> Result<Vec<String>, RunError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fields.clone())
    }
}

#[derive(Default)]
pub struct CountingIndexer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl DocumentIndexer for CountingIndexer {
    async fn index_document(&self, bytes: &[u8]) -> Result<Vec<u8>, RunError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(bytes.to_vec())
    }
}

/// Answers per field in order; the last scripted answer repeats.
#[derive(Default)]
pub struct ScriptedAnswerer {
    answers: Mutex<HashMap<String, VecDeque<String>>>,
    pub asked: Mutex<Vec<String>>,
    pub delay: Option<Duration>,
    pub fail_on: Option<String>,
}

impl ScriptedAnswerer {
    pub fn new(script: &[(&str, &[&str])]) -> Self {
        let answers = script
            .iter()
            .map(|(field, answers)| {
                (
                    (*field).to_string(),
                    answers.iter().map(|a| (*a).to_string()).collect(),
                )
            })
            .collect();
        Self {
            answers: Mutex::new(answers),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_on(mut self, field: &str) -> Self {
        self.fail_on = Some(field.to_string());
        self
    }

    pub fn asked_count(&self, field: &str) -> usize {
        self.asked
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.as_str() == field)
            .count()
    }
}

fn field_of(question: &str) -> String {
    question
        .split_once("<field>")
        .and_then(|(_, rest)| rest.split_once("</field>"))
        .map(|(field, _)| field.to_string())
        .unwrap_or_default()
}

#[async_trait]
impl QueryAnswerer for ScriptedAnswerer {
    async fn answer_query(&self, _index: &IndexHandle, question: &str) -> Result<String, RunError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let field = field_of(question);
        self.asked.lock().unwrap().push(field.clone());
        if self.fail_on.as_deref() == Some(field.as_str()) {
            return Err(RunError::collaborator("answer_query", "model unavailable"));
        }
        let mut answers = self.answers.lock().unwrap();
        let queue = answers.entry(field.clone()).or_default();
        let answer = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(answer.unwrap_or_else(|| format!("unknown {field}")))
    }
}

/// Replays verdict tokens; `ACCEPT` once the script runs out.
#[derive(Default)]
pub struct ScriptedOracle {
    tokens: Mutex<VecDeque<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: Mutex::new(tokens.iter().map(|t| (*t).to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(&self, _draft: &str, _feedback: &str) -> Result<String, RunError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "ACCEPT".to_string()))
    }
}

pub struct Harness {
    pub temp: TempDir,
    pub source: PathBuf,
    pub form: PathBuf,
    pub extractor: Arc<StubExtractor>,
    pub indexer: Arc<CountingIndexer>,
    pub answerer: Arc<ScriptedAnswerer>,
    pub oracle: Arc<ScriptedOracle>,
}

impl Harness {
    /// Resume `Ana Lee` with a two-field form; the answerer first reports
    /// `Lee`, then `Lin` when asked again.
    pub fn name_scenario(oracle: ScriptedOracle) -> Self {
        Self::new(
            &["First Name", "Last Name"],
            ScriptedAnswerer::new(&[
                ("First Name", &["Ana"][..]),
                ("Last Name", &["Lee", "Lin"][..]),
            ]),
            oracle,
        )
    }

    pub fn new(fields: &[&str], answerer: ScriptedAnswerer, oracle: ScriptedOracle) -> Self {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("resume.txt");
        let form = temp.path().join("form.md");
        std::fs::write(&source, "Ana Lee\nSoftware Engineer\n").unwrap();
        std::fs::write(&form, "| First Name | |\n| Last Name | |\n").unwrap();

        Self {
            temp,
            source,
            form,
            extractor: Arc::new(StubExtractor {
                fields: fields.iter().map(|f| (*f).to_string()).collect(),
                calls: AtomicUsize::new(0),
            }),
            indexer: Arc::new(CountingIndexer::default()),
            answerer: Arc::new(answerer),
            oracle: Arc::new(oracle),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            extractor: self.extractor.clone(),
            indexer: self.indexer.clone(),
            answerer: self.answerer.clone(),
            oracle: self.oracle.clone(),
        }
    }

    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            cache_dir: self.temp.path().join("cache"),
            ..EngineOptions::default()
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine_with(self.options())
    }

    pub fn engine_with(&self, options: EngineOptions) -> Engine {
        Engine::new(self.collaborators(), options).unwrap()
    }
}
