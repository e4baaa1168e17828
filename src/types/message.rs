//! Messages exchanged between contexts over the broadcast channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::card::CardInfo;
use super::checkpoint::CheckpointList;
use super::countdown::CountdownTarget;
use crate::Result;

/// Envelope sent over the broadcast channel.
///
/// Serialized as `{ "id": <kind>, "data": <payload> }` so the same frames can
/// be exchanged with a JavaScript front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "id", content = "data", rename_all = "camelCase")]
pub enum BroadcastMessage {
    /// Complete replacement snapshot of the checkpoint list.
    Panels(CheckpointList),
    /// Card metadata, forwarded untouched.
    CardInfo(CardInfo),
    /// The countdown computed by the worker.
    Countdown(CountdownTarget),
    /// Body text of a diagnostic notification to show immediately.
    NotifyTest(String),
}

impl BroadcastMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            BroadcastMessage::Panels(_) => MessageKind::Panels,
            BroadcastMessage::CardInfo(_) => MessageKind::CardInfo,
            BroadcastMessage::Countdown(_) => MessageKind::Countdown,
            BroadcastMessage::NotifyTest(_) => MessageKind::NotifyTest,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Discriminant of a [`BroadcastMessage`], used to route subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "typescript", derive(specta::Type))]
pub enum MessageKind {
    Panels,
    CardInfo,
    Countdown,
    NotifyTest,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Panels => "panels",
            MessageKind::CardInfo => "cardInfo",
            MessageKind::Countdown => "countdown",
            MessageKind::NotifyTest => "notifyTest",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
