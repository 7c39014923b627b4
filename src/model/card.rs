//! Card identity used to look prices up

use serde::{Deserialize, Serialize};

/// Identity of the card being priced
///
/// Supplied by the recognition layer and passed by value into the
/// orchestrator. There are no mutating methods; the `with_*` builders consume
/// and return a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardQuery {
    /// Card name as printed (e.g., "Pikachu VMAX")
    pub name: String,

    /// Set or series name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    /// Collector number within the series (e.g., "044/185")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,

    /// Game identifier such as "pokemon" or "yugioh"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_type: Option<String>,
}

impl CardQuery {
    /// Creates a query from a card name alone
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series: None,
            card_number: None,
            game_type: None,
        }
    }

    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = non_empty(series.into());
        self
    }

    pub fn with_card_number(mut self, card_number: impl Into<String>) -> Self {
        self.card_number = non_empty(card_number.into());
        self
    }

    pub fn with_game_type(mut self, game_type: impl Into<String>) -> Self {
        self.game_type = non_empty(game_type.into().to_lowercase());
        self
    }

    /// Returns the identity fields in a normalized, order-stable form
    ///
    /// Used for cache key derivation so that "Pikachu VMAX " and
    /// "pikachu vmax" address the same entry.
    pub fn identity_fields(&self) -> [String; 4] {
        [
            normalize(&self.name),
            self.series.as_deref().map(normalize).unwrap_or_default(),
            self.card_number.as_deref().map(normalize).unwrap_or_default(),
            self.game_type.as_deref().map(normalize).unwrap_or_default(),
        ]
    }
}

impl std::fmt::Display for CardQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(series) = &self.series {
            write!(f, " [{}]", series)?;
        }
        if let Some(number) = &self.card_number {
            write!(f, " #{}", number)?;
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
