pub mod backend;

use log::info;

pub use backend::{
    DEFAULT_OLLAMA_URL, DEFAULT_SYSTEM_PROMPT, MAX_INPUT_CHARS, OllamaBackend, OpenAiBackend,
    SummarizeError, SummaryBackend,
};

/// Below this estimate the whole text goes to the backend in one call.
pub const DIRECT_TOKEN_THRESHOLD: usize = 6000;

/// Token budget per chunk on the map-reduce path.
pub const CHUNK_TOKEN_BUDGET: usize = 5000;

/// Characters per token, shared by the estimator and the chunker so the
/// single-pass vs. map-reduce decision stays consistent.
const CHARS_PER_TOKEN: usize = 4;

/// Rough token estimate for sizing decisions only. Never fails.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / CHARS_PER_TOKEN).max(1)
}

/// Split into ordered chunks of at most `max_tokens * 4` characters.
/// Concatenating the chunks reproduces the input exactly.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let approx_chars = (max_tokens * CHARS_PER_TOKEN).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == approx_chars {
            chunks.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(text[start..].to_string());
    }
    chunks
}

/// Summarize text of any length with one resulting string.
///
/// Short inputs get a single direct backend call. Long ones are chunked, each
/// chunk summarized on its own, and the partial summaries compressed by one
/// final combine call. Two levels only; the combine pass is never re-chunked.
pub fn summarize_long_text(
    backend: &dyn SummaryBackend,
    text: &str,
) -> Result<String, SummarizeError> {
    let tokens = estimate_tokens(text);
    if tokens < DIRECT_TOKEN_THRESHOLD {
        return backend.summarize(text, None);
    }

    let chunks = chunk_text(text, CHUNK_TOKEN_BUDGET);
    info!("map-reduce: ~{tokens} tokens across {} chunks", chunks.len());

    let mut partials = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        info!("summarizing chunk {}/{}", i + 1, chunks.len());
        partials.push(backend.summarize(chunk, None)?);
    }

    let combined = partials.join("\n\n");
    backend.summarize(
        &format!(
            "Combine and compress these partial summaries into one under 150 words:\n{combined}"
        ),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every prompt it receives and answers with a fixed marker.
    struct RecordingBackend {
        calls: RefCell<Vec<String>>,
    }

    impl RecordingBackend {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl SummaryBackend for RecordingBackend {
        fn summarize(
            &self,
            text: &str,
            _system_prompt: Option<&str>,
        ) -> Result<String, SummarizeError> {
            let mut calls = self.calls.borrow_mut();
            calls.push(text.to_string());
            Ok(format!("summary-{}", calls.len()))
        }
    }

    #[test]
    fn estimate_is_positive_and_total() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
        assert!(estimate_tokens("\u{0}\u{fffd}\u{1f4e7}…") >= 1);
    }

    #[test]
    fn chunks_round_trip_exactly() {
        let inputs = [
            String::new(),
            "short".to_string(),
            "é".repeat(9),
            "word ".repeat(5000),
        ];
        for input in inputs {
            for budget in [1, 2, 5000] {
                let rejoined = chunk_text(&input, budget).concat();
                assert_eq!(rejoined, input);
            }
        }
    }

    #[test]
    fn chunks_respect_character_budget() {
        let text = "a".repeat(45);
        let chunks = chunk_text(&text, 5);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    }

    #[test]
    fn short_text_fits_one_chunk() {
        assert_eq!(chunk_text("hello", 5000), vec!["hello".to_string()]);
    }

    #[test]
    fn short_text_is_one_backend_call() {
        let backend = RecordingBackend::new();
        let out = summarize_long_text(&backend, "a short email body").unwrap();
        assert_eq!(out, "summary-1");
        assert_eq!(backend.calls.borrow().len(), 1);
    }

    #[test]
    fn long_text_makes_n_plus_one_calls() {
        // 48000 chars ≈ 12000 tokens: over the 6000 threshold, 3 chunks of
        // 20000 chars at the 5000-token budget.
        let text = "z".repeat(48_000);
        let backend = RecordingBackend::new();
        let out = summarize_long_text(&backend, &text).unwrap();

        let calls = backend.calls.borrow();
        assert_eq!(calls.len(), 4);
        assert_eq!(out, "summary-4");

        // combine pass sees the partials in chunk order
        let combine = calls.last().unwrap();
        assert!(combine.starts_with("Combine and compress"));
        let p1 = combine.find("summary-1").unwrap();
        let p2 = combine.find("summary-2").unwrap();
        let p3 = combine.find("summary-3").unwrap();
        assert!(p1 < p2 && p2 < p3);
    }

    #[test]
    fn threshold_boundary_goes_map_reduce() {
        // exactly 6000 estimated tokens is not below the threshold
        let text = "y".repeat(24_000);
        let backend = RecordingBackend::new();
        summarize_long_text(&backend, &text).unwrap();
        // two 20000/4000-char chunks plus the combine pass
        assert_eq!(backend.calls.borrow().len(), 3);
    }

    #[test]
    fn backend_failure_propagates() {
        struct FailingBackend;
        impl SummaryBackend for FailingBackend {
            fn summarize(
                &self,
                _text: &str,
                _system_prompt: Option<&str>,
            ) -> Result<String, SummarizeError> {
                Err(SummarizeError::Backend("http 500".to_string()))
            }
        }
        let err = summarize_long_text(&FailingBackend, "hello").unwrap_err();
        assert!(matches!(err, SummarizeError::Backend(_)));
    }
}
