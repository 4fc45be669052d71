//! Retrieval question answering over character annotations for one key item.

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::ai::{self, AiConfig};
use crate::error::PlotlineError;
use crate::prompts;
use crate::splitter::RecursiveSplitter;
use crate::store::VectorStore;

pub const DEFAULT_ITEM: &str = "Musical Note Hairpin";
pub const DEFAULT_TOP_K: usize = 4;

const ANSWER_TEMPERATURE: f64 = 0.7;
const QUESTION_PROMPT: &str = "\nEnter your question (or 'exit' to quit): ";
const GOODBYE: &str = "Exiting.\n";

/// Single-line JSON with a space after every `,` and `:`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, w: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { w.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, w: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { w.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, w: &mut W) -> io::Result<()> {
        w.write_all(b": ")
    }
}

fn to_spaced_json(value: &Value) -> Result<String, PlotlineError> {
    let mut buf = Vec::new();
    value.serialize(&mut serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// One document per character whose annotations mention `item`, rendered as
/// `Episode {episode}: {details}`. Non-ASCII text is written as is.
pub fn load_documents(doc: &Value, item: &str) -> Result<Vec<String>, PlotlineError> {
    let Some(episodes) = doc.as_object() else { return Ok(vec![]) };

    let mut documents = Vec::new();
    for (episode, content) in episodes {
        let Some(characters) = content.get("characters").and_then(Value::as_object) else {
            debug!(episode = %episode, "no characters, skipping");
            continue;
        };
        for details in characters.values() {
            if mentions_item(details.get("Interactions_with_Key_Items"), item) {
                documents.push(format!("Episode {episode}: {}", to_spaced_json(details)?));
            }
        }
    }
    Ok(documents)
}

fn mentions_item(interactions: Option<&Value>, item: &str) -> bool {
    match interactions {
        Some(Value::Object(m)) => m.contains_key(item),
        Some(Value::Array(a)) => a.iter().any(|v| v.as_str() == Some(item)),
        Some(Value::String(s)) => s.contains(item),
        _ => false,
    }
}

pub struct QaSystem {
    cfg: AiConfig,
    store: VectorStore,
    top_k: usize,
}

impl QaSystem {
    /// Chunk and embed `documents`.
    pub async fn build(
        cfg: AiConfig,
        documents: &[String],
        splitter: &RecursiveSplitter,
        top_k: usize,
    ) -> Result<Self, PlotlineError> {
        let chunks = splitter.split_text(&documents.join("\n"));
        let store = VectorStore::from_texts(&cfg, chunks).await?;
        if store.is_empty() {
            warn!("no text to index, answers will have no context");
        }
        info!(documents = documents.len(), chunks = store.len(), "index built");
        Ok(Self { cfg, store, top_k })
    }

    pub fn chunk_count(&self) -> usize {
        self.store.len()
    }

    /// Retrieve the closest chunks and ask the model with them as context.
    pub async fn answer(&self, question: &str) -> Result<String, PlotlineError> {
        let r = ai::get_embeddings(&self.cfg, &[question.to_string()]).await?;
        let query_emb = r
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| PlotlineError::AiBackend("no embedding for question".into()))?;

        let hits = self.store.search(&query_emb, self.top_k);
        debug!(hits = hits.len(), best = ?hits.first().map(|h| h.1), "retrieved");
        let context = hits.iter().map(|(text, _)| *text).collect::<Vec<_>>().join("\n\n");

        let system = prompts::answer_system(&context);
        let r = ai::llm_chat_as(&self.cfg, "answer", &system, question, ANSWER_TEMPERATURE).await?;
        r.log_usage("answer");
        Ok(r.content)
    }
}

/// Read questions line by line until `exit` (any case) or end of input.
///
/// A failed question is reported and the loop keeps going.
pub async fn ask_loop<R, W>(qa: &QaSystem, input: R, mut output: W) -> Result<(), PlotlineError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(QUESTION_PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };
        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") {
            output.write_all(GOODBYE.as_bytes()).await?;
            break;
        }
        if query.is_empty() {
            continue;
        }

        match qa.answer(query).await {
            Ok(answer) => output.write_all(format!("Answer: {answer}\n").as_bytes()).await?,
            Err(e) => {
                warn!(error = %e, "question failed");
                output.write_all(format!("Error: {e}\n").as_bytes()).await?;
            }
        }
    }
    output.flush().await?;
    Ok(())
}
