//! HTTP bulk-load calls.
//!
//! These feed the cache on screen entry (conversation list, initial message
//! history) and create conversations. The realtime connection handles
//! everything after that. A response body of `{"error": ...}` maps to
//! [`ClientError::Upstream`]; callers leave the store unmodified in that
//! case, so a failed load never leaves a collection partially populated.

use serde::Deserialize;

use palaver_shared::{Conversation, ConversationRequest, Message};

use crate::error::{ClientError, Result};

/// Client for the conversation/message HTTP API.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Every endpoint answers either its payload or an `{error}` object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse<T> {
    Failure(ErrorBody),
    Success(T),
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T> {
        match self {
            ApiResponse::Success(value) => Ok(value),
            ApiResponse::Failure(body) => Err(ClientError::Upstream(body.error)),
        }
    }
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.into(),
        }
    }

    /// `GET /conversations/{username}`: all conversations for the user.
    pub async fn fetch_conversations(&self, username: &str) -> Result<Vec<Conversation>> {
        let url = format!("{}/conversations/{username}", self.base);
        let response: ApiResponse<Vec<Conversation>> =
            self.http.get(&url).send().await?.json().await?;
        response.into_result()
    }

    /// `GET /messages/{conversationId}?limit=N`: most recent messages.
    pub async fn fetch_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<Message>> {
        let url = format!("{}/messages/{conversation_id}", self.base);
        let response: ApiResponse<Vec<Message>> = self
            .http
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    /// `POST /conversation`: create a conversation and get the full record
    /// back.
    pub async fn create_conversation(
        &self,
        name: &str,
        users: Vec<String>,
    ) -> Result<Conversation> {
        let url = format!("{}/conversation", self.base);
        let body = ConversationRequest {
            name: name.to_string(),
            users,
        };
        let response: ApiResponse<Conversation> =
            self.http.post(&url).json(&body).send().await?.json().await?;
        response.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_wins_over_payload() {
        let response: ApiResponse<Vec<Conversation>> =
            serde_json::from_str(r#"{"error":"unknown user"}"#).unwrap();
        match response.into_result() {
            Err(ClientError::Upstream(reason)) => assert_eq!(reason, "unknown user"),
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn test_payload_parses_as_success() {
        let response: ApiResponse<Vec<Conversation>> = serde_json::from_str(
            r#"[{"conversationId":"c1","name":"hiking","users":["alice"],"creationDateTime":1}]"#,
        )
        .unwrap();
        let conversations = response.into_result().unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].conversation_id, "c1");
    }
}
