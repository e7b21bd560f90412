use crate::api::gemini::{self, InlineImage};
use crate::config::{self, Config};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const FALLBACK_VOICE_DIRECTION: &str = "Apologetic robot";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub narration: String,
    pub visual_prompt: String,
    pub voice_direction: String,
}

/// Ordered plan entries. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryPlan {
    pub items: Vec<PlanEntry>,
    #[serde(skip)]
    pub is_fallback: bool,
}

impl StoryPlan {
    pub fn from_json(text: &str) -> Result<Self> {
        let items: Vec<PlanEntry> =
            serde_json::from_str(text).with_context(|| "Failed to parse story plan JSON")?;
        if items.is_empty() {
            anyhow::bail!("Story plan is empty");
        }
        if items.iter().any(|e| e.narration.trim().is_empty()) {
            anyhow::bail!("Story plan has an entry without narration");
        }
        Ok(Self {
            items,
            is_fallback: false,
        })
    }

    pub fn fallback(topic: &str) -> Self {
        Self {
            items: vec![PlanEntry {
                narration: format!(
                    "I attempted to tell a story about {}, but the plans were lost in the ether.",
                    topic
                ),
                visual_prompt: format!(
                    "Static and glitching digital screen with the words '{}'",
                    topic
                ),
                voice_direction: FALLBACK_VOICE_DIRECTION.to_string(),
            }],
            is_fallback: true,
        }
    }

    /// All narrations joined into one script.
    pub fn script(&self) -> String {
        self.items
            .iter()
            .map(|e| e.narration.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn build_prompt(topic: &str, character_description: &str, with_image: bool) -> String {
    let character = if with_image {
        "Look at the character in the attached image. This is the protagonist. \
         The dialogue and tone should match the visual vibe of the character in the image."
            .to_string()
    } else {
        character_description.to_string()
    };

    format!(
        "You are an expert cinematographic storyteller and director.\n\n\
         Topic: {}\n\
         Character: {}\n\n\
         Create a compelling, multi-part video story based on this topic.\n\
         Break the story into a sequence of video segments.\n\
         Each segment must be short enough to narrate in an 8-second video clip (MAXIMUM 12 words). Keep dialogue concise.\n\n\
         Return ONLY a JSON array of objects with exactly these string fields:\n\
         [{{\"narration\": \"The exact spoken text for this segment.\", \
         \"visual_prompt\": \"A detailed visual description of the scene for an AI video generator.\", \
         \"voice_direction\": \"Emotion or tone direction for the voice actor.\"}}]\n",
        topic, character
    )
}

pub struct StoryPlanner {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl StoryPlanner {
    pub fn new(cfg: &Config, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: cfg.planner_endpoint.clone(),
            model: cfg.planner_model.clone(),
            api_key,
        })
    }

    /// Resolve the credential from the environment or `~/.config/mirage/.env`.
    /// A missing credential is fatal to the caller.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let key = config::resolve_api_key(&config::config_dir().join(".env"))?;
        Self::new(cfg, key)
    }

    /// Plan a story. Any request, shape or parse failure yields
    /// [`StoryPlan::fallback`].
    pub async fn plan(
        &self,
        topic: &str,
        character_description: &str,
        reference_image: Option<&Path>,
    ) -> StoryPlan {
        match self.try_plan(topic, character_description, reference_image).await {
            Ok(plan) => {
                logok(format!("Story plan received: {} segments", plan.items.len()));
                plan
            }
            Err(err) => {
                logw(format!("Story planning failed: {:#}", err));
                StoryPlan::fallback(topic)
            }
        }
    }

    async fn try_plan(
        &self,
        topic: &str,
        character_description: &str,
        reference_image: Option<&Path>,
    ) -> Result<StoryPlan> {
        let image = match reference_image {
            Some(path) => match InlineImage::load(path).await {
                Ok(image) => Some(image),
                Err(err) => {
                    logw(format!("Failed to load character image for planner: {:#}", err));
                    None
                }
            },
            None => None,
        };

        let prompt = build_prompt(topic, character_description, image.is_some());
        let body = gemini::build_request_body(&prompt, image.as_ref());

        logi(format!("Requesting story plan from {}...", self.model));
        let text =
            gemini::generate_content(&self.client, &self.endpoint, &self.model, &self.api_key, &body)
                .await?;
        StoryPlan::from_json(&gemini::strip_fences(&text))
    }
}
