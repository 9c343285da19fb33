//! Creative concept returned by the text generator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ModelResult;

/// Title used when generation keeps failing and the fallback policy is active.
pub const FALLBACK_TITLE: &str = "Default fallback content";

pub const FALLBACK_DESCRIPTION: &str =
    "Lofi beats to relax, study and sleep. Streaming live from Relax Station.";

pub const FALLBACK_IMAGE_PROMPT: &str =
    "cozy anime bedroom at night, rain on the window, warm desk lamp, lofi aesthetic";

/// Structured output requested from the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct CreativeConcept {
    /// Short explanation of the chosen theme.
    #[serde(default)]
    pub concept_reasoning: String,

    /// Video title.
    #[validate(length(min = 1))]
    pub title: String,

    /// Video description.
    #[validate(length(min = 1))]
    pub description: String,

    /// Prompt handed to the image generator.
    #[validate(length(min = 1))]
    pub image_prompt: String,
}

impl CreativeConcept {
    /// Hard-coded concept used by the fallback policy.
    pub fn fallback() -> Self {
        Self {
            concept_reasoning: "Fallback content".to_string(),
            title: FALLBACK_TITLE.to_string(),
            description: FALLBACK_DESCRIPTION.to_string(),
            image_prompt: FALLBACK_IMAGE_PROMPT.to_string(),
        }
    }

    /// Validate, also rejecting whitespace-only fields.
    pub fn checked(self) -> ModelResult<Self> {
        self.validate()?;
        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("image_prompt", &self.image_prompt),
        ] {
            if value.trim().is_empty() {
                return Err(crate::ModelError::validation(format!("{field} is blank")));
            }
        }
        Ok(self)
    }

    pub fn is_fallback(&self) -> bool {
        self.title == FALLBACK_TITLE
    }
}
