//! # Search Basic Example
//!
//! Runs the hybrid search pipeline end to end over a handful of notes.
//!
//! Uses `InMemoryStore` for chunks, sources and keyword retrieval, plus a
//! deterministic `MockDenseRetriever` (hashed bag-of-words vectors), so it
//! runs with **zero API keys**.
//!
//! Run: `cargo run --example search_basic`
//! Set `KB_SEARCH_LOG=debug` to watch each stage.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use kb_search::{
    Chunk, ChunkId, InMemoryStore, QueryPart, RetrievalRequest, Retriever, ScoreMap,
    SearchConfig, SearchFilters, SearchPipeline, SourceMeta, TemplateHydeGenerator,
};

// ---------------------------------------------------------------------------
// MockDenseRetriever: hashed bag-of-words cosine similarity
// ---------------------------------------------------------------------------

const DIMENSIONS: usize = 64;

fn embed(text: &str) -> Vec<f32> {
    let mut emb = vec![0.0f32; DIMENSIONS];
    let lower = text.to_lowercase();
    for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let hash = word.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        emb[(hash % DIMENSIONS as u64) as usize] += 1.0;
    }
    let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        emb.iter_mut().for_each(|x| *x /= norm);
    }
    emb
}

struct MockDenseRetriever {
    index: Vec<(ChunkId, Vec<f32>)>,
}

impl MockDenseRetriever {
    fn new(chunks: &[Chunk]) -> Self {
        let index = chunks
            .iter()
            .map(|c| (c.id.clone(), embed(c.content.as_deref().unwrap_or_default())))
            .collect();
        Self { index }
    }
}

#[async_trait::async_trait]
impl Retriever for MockDenseRetriever {
    fn name(&self) -> &str {
        "mock-dense"
    }

    async fn retrieve(&self, request: &RetrievalRequest<'_>) -> kb_search::Result<ScoreMap> {
        // Sum the embeddings of every text input (query, expansions, HyDE).
        let mut query = vec![0.0f32; DIMENSIONS];
        for text in request.inputs.iter().filter_map(QueryPart::as_text) {
            for (q, e) in query.iter_mut().zip(embed(text)) {
                *q += e;
            }
        }

        let mut scored: Vec<(ChunkId, f64)> = self
            .index
            .iter()
            .map(|(id, emb)| {
                let dot: f32 = emb.iter().zip(&query).map(|(a, b)| a * b).sum();
                (id.clone(), f64::from(dot))
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(request.limit);
        Ok(scored.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kb_telemetry::init_telemetry("search_basic")?;

    // -- 1. Load sources and chunks into the in-memory store ---------------
    let now = Utc::now();
    let notes = [
        (
            1,
            "Notes on AI alignment",
            3.0,
            10,
            "Alignment research asks how machine learning systems can be made to pursue \
             intended goals.",
        ),
        (
            2,
            "Bread baking log",
            1.0,
            400,
            "Sourdough needs a lively starter, long fermentation, and a very hot oven.",
        ),
        (
            3,
            "LessWrong: Rationality basics",
            2.0,
            45,
            "Rationality is about updating beliefs with evidence, as in Bayes' theorem.",
        ),
        (
            4,
            "Email from Mom",
            1.0,
            2,
            "Mom asked about the family reunion and whether grandma can come.",
        ),
        (
            5,
            "ML reading list",
            1.0,
            120,
            "Deep learning, transformers and reinforcement learning papers to read.",
        ),
    ];

    let store = Arc::new(InMemoryStore::new());
    let mut chunks = Vec::new();
    for (id, title, popularity, age_days, text) in notes {
        store
            .insert_source(
                SourceMeta::new(id)
                    .with_title(title)
                    .with_popularity(popularity)
                    .with_inserted_at(now - Duration::days(age_days)),
            )
            .await;
        let chunk = Chunk::new(format!("chunk-{id}"), id, text);
        let modality = if title.starts_with("LessWrong") {
            "forum"
        } else if title.starts_with("Email") {
            "mail"
        } else {
            "doc"
        };
        store.insert_chunk(chunk.clone(), Some(modality)).await;
        chunks.push(chunk);
    }

    // -- 2. Build the pipeline -----------------------------------------------
    // The store doubles as the lexical retriever; HyDE uses the template
    // generator so nothing leaves the process.
    let pipeline = SearchPipeline::builder()
        .dense_retriever(Arc::new(MockDenseRetriever::new(&chunks)))
        .lexical_retriever(store.clone())
        .chunk_store(store.clone())
        .source_store(store)
        .hyde_generator(Arc::new(TemplateHydeGenerator::default()))
        .build()?;

    // -- 3. Query ------------------------------------------------------------
    let config = SearchConfig::builder().limit(3).previews(true).use_hyde(true).build()?;
    let queries = [
        "ML alignment",
        "something on lesswrong about rationality",
        "I remember reading about sourdough starter",
        "what did mom say about the reunion",
    ];

    for query in queries {
        println!("\nQuery: \"{query}\"");
        let results = pipeline
            .search(&[QueryPart::text(query)], &BTreeSet::new(), &SearchFilters::new(), &config)
            .await?;
        if results.is_empty() {
            println!("  (no results)");
        }
        for (i, result) in results.iter().enumerate() {
            let preview = result
                .chunks
                .first()
                .and_then(|c| c.preview.as_deref())
                .map(|p| p.chars().take(70).collect::<String>())
                .unwrap_or_default();
            println!(
                "  {}. [score={:.4}] {} | {}",
                i + 1,
                result.search_score,
                result.title.as_deref().unwrap_or("(untitled)"),
                preview,
            );
        }
    }

    println!("\nDone.");
    Ok(())
}
