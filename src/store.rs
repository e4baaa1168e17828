//! Local card persistence.
//!
//! A card is stored as one pretty-printed JSON document and always written as
//! a complete snapshot. Writes go to a sibling temporary file that is renamed
//! over the target, so a reader never sees half a card.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::types::Card;
use crate::{RallyError, Result};

/// JSON file holding one [`Card`].
#[derive(Debug, Clone)]
pub struct CardStore {
    path: PathBuf,
}

impl CardStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the card. Checkpoints are normalized on the way in.
    pub fn load(&self) -> Result<Card> {
        let text = fs::read_to_string(&self.path).map_err(|err| RallyError::store_error(&self.path, err))?;
        let card: Card = serde_json::from_str(&text)?;
        debug!(path = %self.path.display(), checkpoints = card.checkpoints.len(), "Card loaded");
        Ok(card)
    }

    /// Read the card, or start from an empty one.
    ///
    /// A missing file is the normal first run. An unreadable or malformed file
    /// is logged and otherwise treated the same way.
    pub fn load_or_default(&self) -> Card {
        match self.load() {
            Ok(card) => card,
            Err(RallyError::Store { ref source, .. }) if source.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored card, starting empty");
                Card::default()
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Stored card unusable, starting empty");
                Card::default()
            }
        }
    }

    /// Replace the stored card with `card`.
    pub fn save(&self, card: &Card) -> Result<()> {
        let text = serde_json::to_string_pretty(card)?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| RallyError::store_error(parent, err))?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, format!("{text}\n")).map_err(|err| RallyError::store_error(&staging, err))?;
        fs::rename(&staging, &self.path).map_err(|err| RallyError::store_error(&self.path, err))?;
        debug!(path = %self.path.display(), checkpoints = card.checkpoints.len(), "Card saved");
        Ok(())
    }
}
