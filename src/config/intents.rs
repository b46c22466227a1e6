use crate::error::ConfigError;
use log::{ info, warn };
use serde::{ Deserialize, Serialize };
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct RawIntent {
    tag: String,
    patterns: Vec<String>,
    responses: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "RawIntent")]
pub struct Intent {
    pub tag: String,
    pub patterns: Vec<String>,
    pub responses: Vec<String>,
    #[serde(skip)]
    folded: Vec<String>,
}

impl From<RawIntent> for Intent {
    fn from(raw: RawIntent) -> Self {
        let folded = raw.patterns
            .iter()
            .map(|p| p.to_lowercase())
            .collect();
        Self {
            tag: raw.tag,
            patterns: raw.patterns,
            responses: raw.responses,
            folded,
        }
    }
}

impl Intent {
    /// True when any pattern, case-folded, occurs inside `normalized`.
    /// `normalized` must already be lowercase.
    pub fn matches(&self, normalized: &str) -> bool {
        self.folded.iter().any(|pattern| normalized.contains(pattern.as_str()))
    }
}

#[derive(Deserialize)]
struct RawIntents {
    intents: Vec<Intent>,
}

/// The loaded intent table. Order is significant: earlier intents win when
/// several could match the same message.
///
/// Every way of building one, including deserializing it directly, runs
/// validation.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(try_from = "RawIntents")]
pub struct Intents {
    intents: Vec<Intent>,
}

impl TryFrom<RawIntents> for Intents {
    type Error = ConfigError;

    fn try_from(raw: RawIntents) -> Result<Self, Self::Error> {
        let intents = Self { intents: raw.intents };
        intents.validate()?;
        Ok(intents)
    }
}

impl Intents {
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let raw: RawIntents = serde_json::from_str(document)?;
        Self::try_from(raw)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Intent> {
        self.intents.iter()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn get(&self, tag: &str) -> Option<&Intent> {
        self.intents.iter().find(|intent| intent.tag == tag)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, intent) in self.intents.iter().enumerate() {
            if intent.tag.trim().is_empty() {
                return Err(ConfigError::InvalidIntent {
                    index,
                    reason: "tag is empty".to_string(),
                });
            }
            if intent.responses.is_empty() {
                return Err(ConfigError::InvalidIntent {
                    index,
                    reason: format!("intent '{}' has no responses", intent.tag),
                });
            }
            if intent.patterns.is_empty() {
                warn!("Intent '{}' has no patterns and can never match", intent.tag);
            }
            if intent.patterns.iter().any(|p| p.is_empty()) {
                warn!("Intent '{}' has an empty pattern; it will match every message", intent.tag);
            }
            if !seen.insert(intent.tag.as_str()) {
                warn!("Duplicate intent tag '{}'; the earlier entry takes priority", intent.tag);
            }
        }
        Ok(())
    }
}

pub fn load_intents<P: AsRef<Path>>(path: P) -> Result<Intents, ConfigError> {
    let path = path.as_ref();
    let document = fs::read_to_string(path).map_err(|source| ConfigError::IntentsIo {
        path: path.display().to_string(),
        source,
    })?;
    let intents = Intents::from_json(&document)?;
    info!("Loaded {} intents from {}", intents.len(), path.display());
    Ok(intents)
}
