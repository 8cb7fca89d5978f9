use anyhow::Result;
use log::{debug, info};

use crate::digest::{Digest, SummaryRecord, format_summary_md};
use crate::extract::{extract_plain_text, parse_headers};
use crate::gmail::types::Message;
use crate::summarize::{SummaryBackend, estimate_tokens, summarize_long_text};

const PERMALINK_BASE: &str = "https://mail.google.com/mail/u/0/#inbox/";

/// Read side of the mail provider, behind a trait so the pipeline can run
/// against an in-memory source in tests.
pub trait MailSource {
    /// Ids of messages matching `query`, at most `max_results` of them.
    fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<String>>;
    /// Full message record, payload tree included.
    fn get_message(&self, id: &str) -> Result<Message>;
}

pub struct DigestOutcome {
    /// Messages actually summarized; skipped ones don't count.
    pub summarized: usize,
    pub markdown: String,
}

/// Fetch matching messages, summarize the ones with readable text, and render
/// the digest. Messages with no extractable text are skipped silently. A
/// backend failure aborts the run.
pub fn fetch_and_summarize(
    source: &dyn MailSource,
    backend: &dyn SummaryBackend,
    query: &str,
    max_results: u32,
) -> Result<DigestOutcome> {
    let ids = source.list_messages(query, max_results)?;
    if ids.is_empty() {
        return Ok(DigestOutcome {
            summarized: 0,
            markdown: "# No messages matched your query.\n".to_string(),
        });
    }

    let mut digest = Digest::new();
    let mut summarized = 0;

    for id in ids {
        let message = source.get_message(&id)?;
        let Some(payload) = message.payload.as_ref() else {
            debug!("message {id}: no payload, skipping");
            continue;
        };

        let headers = parse_headers(payload);
        let text = extract_plain_text(payload);
        if text.is_empty() {
            debug!("message {id}: no extractable text, skipping");
            continue;
        }

        info!(
            "summarizing message {id} (~{} tokens)",
            estimate_tokens(&text)
        );
        let summary = summarize_long_text(backend, &text)?;

        let record = SummaryRecord {
            subject: headers
                .get("subject")
                .cloned()
                .unwrap_or_else(|| "(no subject)".to_string()),
            from: headers
                .get("from")
                .cloned()
                .unwrap_or_else(|| "(unknown sender)".to_string()),
            date: headers.get("date").cloned().unwrap_or_default(),
            id: message.id.clone(),
            permalink: Some(format!("{PERMALINK_BASE}{}", message.id)),
            summary,
        };
        digest.push(format_summary_md(&record));
        summarized += 1;
    }

    Ok(DigestOutcome {
        summarized,
        markdown: digest.render(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::types::{Header, MessagePart, PartBody};
    use crate::summarize::SummarizeError;
    use base64::{Engine as _, engine::general_purpose};

    struct FixedSource {
        messages: Vec<Message>,
    }

    impl MailSource for FixedSource {
        fn list_messages(&self, _query: &str, max_results: u32) -> Result<Vec<String>> {
            Ok(self
                .messages
                .iter()
                .take(max_results as usize)
                .map(|m| m.id.clone())
                .collect())
        }

        fn get_message(&self, id: &str) -> Result<Message> {
            self.messages
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such message {id}"))
        }
    }

    struct EchoBackend;

    impl SummaryBackend for EchoBackend {
        fn summarize(
            &self,
            text: &str,
            _system_prompt: Option<&str>,
        ) -> Result<String, SummarizeError> {
            Ok(format!("[summary of {} chars]", text.len()))
        }
    }

    fn text_message(id: &str, subject: &str, body: &str) -> Message {
        Message {
            id: id.to_string(),
            payload: Some(MessagePart {
                mime_type: Some("text/plain".to_string()),
                body: Some(PartBody {
                    data: Some(general_purpose::URL_SAFE_NO_PAD.encode(body)),
                }),
                headers: vec![
                    Header {
                        name: "Subject".to_string(),
                        value: subject.to_string(),
                    },
                    Header {
                        name: "From".to_string(),
                        value: "sender@example.com".to_string(),
                    },
                    Header {
                        name: "Date".to_string(),
                        value: "Mon, 25 Aug 2025 10:00:00 +0000".to_string(),
                    },
                ],
                ..Default::default()
            }),
        }
    }

    fn empty_message(id: &str) -> Message {
        Message {
            id: id.to_string(),
            payload: Some(MessagePart::default()),
        }
    }

    #[test]
    fn summarizes_and_counts_only_readable_messages() {
        let source = FixedSource {
            messages: vec![
                text_message("m1", "First", "body one"),
                empty_message("m2"),
                text_message("m3", "Third", "body three"),
            ],
        };

        let outcome = fetch_and_summarize(&source, &EchoBackend, "in:inbox", 10).unwrap();
        assert_eq!(outcome.summarized, 2);
        assert!(outcome.markdown.contains("### First"));
        assert!(outcome.markdown.contains("### Third"));
        assert!(!outcome.markdown.contains("m2"));
        assert!(
            outcome
                .markdown
                .contains("- **Link:** https://mail.google.com/mail/u/0/#inbox/m1")
        );
    }

    #[test]
    fn missing_headers_get_placeholders() {
        let mut msg = text_message("m1", "ignored", "hello");
        msg.payload.as_mut().unwrap().headers.clear();
        let source = FixedSource {
            messages: vec![msg],
        };

        let outcome = fetch_and_summarize(&source, &EchoBackend, "", 10).unwrap();
        assert!(outcome.markdown.contains("### (no subject)"));
        assert!(outcome.markdown.contains("(unknown sender)"));
    }

    #[test]
    fn empty_result_set_renders_placeholder_digest() {
        let source = FixedSource { messages: vec![] };
        let outcome = fetch_and_summarize(&source, &EchoBackend, "from:nobody", 10).unwrap();
        assert_eq!(outcome.summarized, 0);
        assert_eq!(outcome.markdown, "# No messages matched your query.\n");
    }

    #[test]
    fn respects_max_results() {
        let source = FixedSource {
            messages: vec![
                text_message("m1", "One", "a"),
                text_message("m2", "Two", "b"),
            ],
        };
        let outcome = fetch_and_summarize(&source, &EchoBackend, "", 1).unwrap();
        assert_eq!(outcome.summarized, 1);
        assert!(!outcome.markdown.contains("### Two"));
    }

    #[test]
    fn backend_error_aborts_the_run() {
        struct FailingBackend;
        impl SummaryBackend for FailingBackend {
            fn summarize(
                &self,
                _text: &str,
                _system_prompt: Option<&str>,
            ) -> Result<String, SummarizeError> {
                Err(SummarizeError::Backend("timeout".to_string()))
            }
        }

        let source = FixedSource {
            messages: vec![text_message("m1", "One", "a")],
        };
        assert!(fetch_and_summarize(&source, &FailingBackend, "", 10).is_err());
    }
}
