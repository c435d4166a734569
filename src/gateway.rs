//! Chat platform REST boundary.
//!
//! The rest of the crate talks to the platform through the `ChatGateway`
//! trait; `RestGateway` is the production implementation over reqwest.
//! Payloads are plain data so that rendering stays testable without HTTP.

use crate::ids::{ChannelId, InteractionToken, MessageId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Component {
    Select {
        custom_id: String,
        placeholder: String,
        options: Vec<SelectOption>,
    },
    Button {
        custom_id: String,
        label: String,
    },
}

/// An outbound message body: plain text, an embed, interactive components,
/// or any combination.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OutgoingMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Messaging primitives the bot needs from the platform.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Reply to an interaction, visible only to the invoking user.
    async fn reply_ephemeral(
        &self,
        token: &InteractionToken,
        message: OutgoingMessage,
    ) -> Result<()>;

    /// Post a message to a channel, returning its id.
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId>;

    /// Edit a previously posted message in place.
    async fn edit_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        body: OutgoingMessage,
    ) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct PostedMessage {
    id: String,
}

/// Production gateway speaking the platform's REST API.
pub struct RestGateway {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl RestGateway {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

#[async_trait]
impl ChatGateway for RestGateway {
    async fn reply_ephemeral(
        &self,
        token: &InteractionToken,
        message: OutgoingMessage,
    ) -> Result<()> {
        #[derive(Serialize)]
        struct EphemeralReply<'a> {
            ephemeral: bool,
            #[serde(flatten)]
            message: &'a OutgoingMessage,
        }

        self.http
            .post(self.url(&format!("/interactions/{}/reply", token.0)))
            .bearer_auth(&self.token)
            .json(&EphemeralReply {
                ephemeral: true,
                message: &message,
            })
            .send()
            .await
            .context("send ephemeral reply")?
            .error_for_status()
            .context("ephemeral reply rejected")?;
        Ok(())
    }

    async fn post_message(
        &self,
        channel: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId> {
        let posted: PostedMessage = self
            .http
            .post(self.url(&format!("/channels/{channel}/messages")))
            .bearer_auth(&self.token)
            .json(&message)
            .send()
            .await
            .context("post message")?
            .error_for_status()
            .context("post message rejected")?
            .json()
            .await
            .context("parse posted message")?;
        Ok(MessageId(posted.id))
    }

    async fn edit_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        body: OutgoingMessage,
    ) -> Result<()> {
        self.http
            .patch(self.url(&format!("/channels/{channel}/messages/{message}")))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("edit message")?
            .error_for_status()
            .context("edit message rejected")?;
        Ok(())
    }
}
