//! Time card aggregate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::checkpoint::CheckpointList;

/// Card metadata (crew, car number, event name, ...).
///
/// Carried as an opaque JSON object: the countdown core only forwards it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardInfo(pub Map<String, Value>);

impl CardInfo {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A complete time card: metadata plus the checkpoint list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(default)]
    pub info: CardInfo,
    #[serde(default)]
    pub checkpoints: CheckpointList,
}

impl Card {
    pub fn new(info: CardInfo, checkpoints: CheckpointList) -> Self {
        Self { info, checkpoints }
    }

    /// Display title taken from the metadata, if any.
    pub fn title(&self) -> &str {
        self.info.get_str("name").unwrap_or("untitled card")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_deserializes_with_missing_sections() {
        let card: Card = serde_json::from_str(r#"{"info":{"name":"Rajd Dolnośląski"}}"#).unwrap();
        assert_eq!(card.title(), "Rajd Dolnośląski");
        assert!(card.checkpoints.is_empty());

        let blank: Card = serde_json::from_str("{}").unwrap();
        assert_eq!(blank.title(), "untitled card");
    }

    #[test]
    fn checkpoints_are_normalized_on_load() {
        let card: Card = serde_json::from_str(
            r#"{"checkpoints":[{"number":1,"provisionalStartTime":34200000,"drivingTime":300000}]}"#,
        )
        .unwrap();
        assert_eq!(card.checkpoints[0].arrival_time, 34_500_000);
    }
}
