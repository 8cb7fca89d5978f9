use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::gmail::types::{Message, MessageRef};
use crate::pipeline::MailSource;

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Thin Gmail REST client over a bearer access token.
pub struct GmailClient {
    http: Client,
    access_token: String,
}

#[derive(Deserialize)]
struct ListResponse {
    // absent when nothing matches the query
    #[serde(default)]
    messages: Vec<MessageRef>,
}

impl GmailClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            http,
            access_token: access_token.into(),
        })
    }

    /// Ids of messages matching a Gmail search query, newest first.
    pub fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>> {
        let max_results = max_results.to_string();
        let resp: ListResponse = self
            .http
            .get(format!("{API_BASE}/messages"))
            .bearer_auth(&self.access_token)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(resp.messages.into_iter().map(|m| m.id).collect())
    }

    /// Full message record including the payload tree.
    pub fn get_full_message(&self, id: &str) -> Result<Message> {
        let msg = self
            .http
            .get(format!("{API_BASE}/messages/{id}"))
            .bearer_auth(&self.access_token)
            .query(&[("format", "full")])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(msg)
    }
}

impl MailSource for GmailClient {
    fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<String>> {
        self.list_message_ids(query, max_results)
    }

    fn get_message(&self, id: &str) -> Result<Message> {
        self.get_full_message(id)
    }
}
