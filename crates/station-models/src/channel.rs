//! Always-on channel slots and the catalog assets they play.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Content family of a channel slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ChannelKind {
    /// Looped rain video with its own ambient audio track.
    #[serde(rename = "rain")]
    Rain,
    /// Looped background video over the lofi playlist.
    #[serde(rename = "lofi-bg")]
    LofiBackground,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Rain => "rain",
            ChannelKind::LofiBackground => "lofi-bg",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rain" => Ok(ChannelKind::Rain),
            "lofi-bg" | "lofi" => Ok(ChannelKind::LofiBackground),
            other => Err(ModelError::UnknownChannelKind(other.to_string())),
        }
    }
}

/// One logical stream slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ChannelSlot {
    pub name: String,
    pub kind: ChannelKind,
}

impl ChannelSlot {
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Three rain slots and two lofi slots.
pub fn default_slots() -> Vec<ChannelSlot> {
    vec![
        ChannelSlot::new("Rain-1", ChannelKind::Rain),
        ChannelSlot::new("Rain-2", ChannelKind::Rain),
        ChannelSlot::new("Rain-3", ChannelKind::Rain),
        ChannelSlot::new("Lofi-4", ChannelKind::LofiBackground),
        ChannelSlot::new("Lofi-5", ChannelKind::LofiBackground),
    ]
}

/// Asset record served by the central catalog API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAsset {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub video_url: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub ai_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_slots() {
        let slots = default_slots();
        assert_eq!(slots.len(), 5);
        assert_eq!(
            slots.iter().filter(|s| s.kind == ChannelKind::Rain).count(),
            3
        );
        assert_eq!(slots[3].name, "Lofi-4");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("rain".parse::<ChannelKind>().unwrap(), ChannelKind::Rain);
        assert_eq!(
            "lofi-bg".parse::<ChannelKind>().unwrap(),
            ChannelKind::LofiBackground
        );
        assert!("ocean".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn test_asset_from_catalog_json() {
        let json = r#"{"_id":"a1","title":"Storm","videoUrl":"https://cdn/x.mp4","audioUrl":"https://cdn/x.mp3"}"#;
        let asset: ChannelAsset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.id, "a1");
        assert_eq!(asset.audio_url.as_deref(), Some("https://cdn/x.mp3"));
        assert!(asset.ai_description.is_none());
    }
}
