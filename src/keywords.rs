//! Per-chunk keyword extraction (spec §4.5), bounded to T threads per
//! document (spec §5). The concrete model is out of scope; this module
//! defines the trait plus the bounded-parallel fan-out over a document's
//! chunks, matching the teacher's pattern of a small thread-pool-bounded
//! fan-out (e.g. the worker-pool `Semaphore` idiom in
//! `cli/commands/scrape.rs`, generalized here to a per-document, not
//! per-run, bound).

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const DEFAULT_MAX_KEYWORDS: usize = 5;

/// Implementations must not panic; per-chunk failures are swallowed by
/// `extract_keywords_bounded` and reported as zero keywords (spec §4.5).
pub trait KeywordExtractor: Send + Sync + 'static {
    fn extract(&self, text: &str, max_keywords: usize) -> Vec<String>;
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "with", "this", "from", "are", "was", "were", "have", "has",
    "had", "not", "but", "you", "your", "they", "their", "its", "into", "about", "which", "will",
    "shall", "can", "all", "any", "been", "being", "than", "then", "them", "when", "what", "who",
    "how", "where", "each", "more", "also", "such", "other", "these", "those", "there",
];

/// Frequency-ranked keyword extractor used when no real model is wired in,
/// playing the same always-present-fallback role `HashEmbedder` plays for
/// `Embedder` (spec §1: "concrete ... keyword ML models (pluggable
/// interfaces only)" -- this is the pluggable default, not the model).
pub struct FrequencyKeywordExtractor;

impl KeywordExtractor for FrequencyKeywordExtractor {
    fn extract(&self, text: &str, max_keywords: usize) -> Vec<String> {
        use std::collections::HashMap;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.len() < 4 {
                continue;
            }
            let lower = word.to_lowercase();
            if STOPWORDS.contains(&lower.as_str()) {
                continue;
            }
            *counts.entry(lower).or_insert(0) += 1;
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(max_keywords)
            .map(|(word, _)| word)
            .collect()
    }
}

/// Runs `extractor.extract` over every chunk text, bounded to at most
/// `max_concurrency` (= T) chunks in flight at once. A panicking extractor
/// call yields an empty keyword list for that chunk rather than failing the
/// document (spec §4.5: "Per-chunk failures are swallowed").
pub async fn extract_keywords_bounded<E: KeywordExtractor>(
    extractor: Arc<E>,
    texts: Vec<String>,
    max_concurrency: usize,
    max_keywords: usize,
) -> Vec<Vec<String>> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut set = JoinSet::new();

    for (index, text) in texts.into_iter().enumerate() {
        let extractor = Arc::clone(&extractor);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore open");
            let keywords =
                tokio::task::spawn_blocking(move || extractor.extract(&text, max_keywords))
                    .await
                    .unwrap_or_default();
            (index, keywords)
        });
    }

    let mut results = vec![Vec::new(); set.len()];
    while let Some(joined) = set.join_next().await {
        if let Ok((index, keywords)) = joined {
            results[index] = keywords;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercaseKeywords;

    impl KeywordExtractor for UppercaseKeywords {
        fn extract(&self, text: &str, max_keywords: usize) -> Vec<String> {
            text.split_whitespace()
                .take(max_keywords)
                .map(|w| w.to_uppercase())
                .collect()
        }
    }

    #[tokio::test]
    async fn extraction_preserves_order_and_bounds_concurrency() {
        let extractor = Arc::new(UppercaseKeywords);
        let texts = vec![
            "alpha beta".to_string(),
            "gamma delta epsilon".to_string(),
            "zeta".to_string(),
        ];
        let results = extract_keywords_bounded(extractor, texts, 2, 5).await;
        assert_eq!(results[0], vec!["ALPHA", "BETA"]);
        assert_eq!(results[1], vec!["GAMMA", "DELTA", "EPSILON"]);
        assert_eq!(results[2], vec!["ZETA"]);
    }

    #[test]
    fn frequency_extractor_ranks_by_count_and_ignores_stopwords() {
        let extractor = FrequencyKeywordExtractor;
        let keywords = extractor.extract(
            "chunking chunking overlap chunking embedding embedding with the page",
            3,
        );
        assert_eq!(keywords, vec!["chunking", "embedding", "overlap"]);
    }

    #[test]
    fn frequency_extractor_swallows_empty_text() {
        let extractor = FrequencyKeywordExtractor;
        assert!(extractor.extract("", 5).is_empty());
    }
}
