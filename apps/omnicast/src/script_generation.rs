//! Script generation - ask a remote text model to write a podcast script
//!
//! Thin client around a Pollinations-style chat endpoint: the prompt is
//! sent as a single system message and the response body is the script.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::CastConfig;
use crate::error::ScriptError;
use crate::voices::HostStyle;

// ============================================================================
// GENERATION OPTIONS
// ============================================================================

/// Case-insensitive match on a label, with `-` or `_` accepted for spaces
fn parse_choice<T: Copy>(value: &str, all: &[T], label: fn(&T) -> &'static str) -> Result<T, String> {
    let wanted = value.trim().to_lowercase().replace(['-', '_'], " ");
    all.iter()
        .copied()
        .find(|choice| label(choice).to_lowercase().replace('-', " ") == wanted)
        .ok_or_else(|| {
            let labels: Vec<_> = all.iter().map(label).collect();
            format!("unknown value '{}', expected one of: {}", value, labels.join(", "))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScriptFormat {
    #[default]
    #[serde(rename = "Solo Commentary")]
    SoloCommentary,
    #[serde(rename = "Interview Style")]
    InterviewStyle,
    Educational,
    Storytelling,
    #[serde(rename = "News Brief")]
    NewsBrief,
}

impl ScriptFormat {
    pub const ALL: [ScriptFormat; 5] = [
        ScriptFormat::SoloCommentary,
        ScriptFormat::InterviewStyle,
        ScriptFormat::Educational,
        ScriptFormat::Storytelling,
        ScriptFormat::NewsBrief,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ScriptFormat::SoloCommentary => "Solo Commentary",
            ScriptFormat::InterviewStyle => "Interview Style",
            ScriptFormat::Educational => "Educational",
            ScriptFormat::Storytelling => "Storytelling",
            ScriptFormat::NewsBrief => "News Brief",
        }
    }
}

/// Target episode length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EpisodeLength {
    #[serde(rename = "5-10 mins")]
    Short,
    #[default]
    #[serde(rename = "15-20 mins")]
    Medium,
    #[serde(rename = "30+ mins")]
    Long,
}

impl EpisodeLength {
    pub const ALL: [EpisodeLength; 3] = [EpisodeLength::Short, EpisodeLength::Medium, EpisodeLength::Long];

    pub fn label(&self) -> &'static str {
        match self {
            EpisodeLength::Short => "5-10 mins",
            EpisodeLength::Medium => "15-20 mins",
            EpisodeLength::Long => "30+ mins",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tone {
    Professional,
    #[default]
    Conversational,
    Humorous,
    Inspirational,
}

impl Tone {
    pub const ALL: [Tone; 4] = [
        Tone::Professional,
        Tone::Conversational,
        Tone::Humorous,
        Tone::Inspirational,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tone::Professional => "Professional",
            Tone::Conversational => "Conversational",
            Tone::Humorous => "Humorous",
            Tone::Inspirational => "Inspirational",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Audience {
    #[default]
    General,
    #[serde(rename = "Business Professionals")]
    BusinessProfessionals,
    Students,
    #[serde(rename = "Tech Enthusiasts")]
    TechEnthusiasts,
    #[serde(rename = "Creative Community")]
    CreativeCommunity,
}

impl Audience {
    pub const ALL: [Audience; 5] = [
        Audience::General,
        Audience::BusinessProfessionals,
        Audience::Students,
        Audience::TechEnthusiasts,
        Audience::CreativeCommunity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Audience::General => "General",
            Audience::BusinessProfessionals => "Business Professionals",
            Audience::Students => "Students",
            Audience::TechEnthusiasts => "Tech Enthusiasts",
            Audience::CreativeCommunity => "Creative Community",
        }
    }
}

macro_rules! choice_traits {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_choice(s, &Self::ALL, Self::label)
            }
        }
    )*};
}

choice_traits!(ScriptFormat, EpisodeLength, Tone, Audience);

/// Optional script elements offered to the user
pub const AVAILABLE_ELEMENTS: [&str; 5] = [
    "Opening Hook",
    "Sponsor Segments",
    "Q&A Section",
    "Call-to-Action",
    "Closing Summary",
];

/// Everything that shapes the prompt besides the topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub format: ScriptFormat,
    pub duration: EpisodeLength,
    pub tone: Tone,
    pub host_style: HostStyle,
    pub audience: Audience,
    /// 1 (simple) - 5 (expert)
    pub complexity: u8,
    pub elements: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            format: ScriptFormat::default(),
            duration: EpisodeLength::default(),
            tone: Tone::default(),
            host_style: HostStyle::Single,
            audience: Audience::default(),
            complexity: 3,
            elements: vec!["Opening Hook".to_string(), "Call-to-Action".to_string()],
        }
    }
}

impl GenerationOptions {
    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.complexity = complexity.clamp(1, 5);
        self
    }
}

/// Prompt sent to the script endpoint
pub fn build_prompt(topic: &str, options: &GenerationOptions) -> String {
    let hosts = match options.host_style {
        HostStyle::Multiple => "Include dialogue between multiple hosts.",
        HostStyle::Single => "Single host format.",
    };
    format!(
        "Generate a {} {} podcast script about: {}.\n\
         Tone: {}.\n\
         Include: {}.\n\
         Target audience: {}.\n\
         Complexity: {}.\n\
         {}",
        options.duration,
        options.format,
        topic,
        options.tone,
        options.elements.join(", "),
        options.audience,
        options.complexity.clamp(1, 5),
        hosts
    )
}

// ============================================================================
// GENERATED SCRIPT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub content: String,
    pub topic: String,
    pub options: GenerationOptions,
    pub generated_at: DateTime<Utc>,
}

// ============================================================================
// GENERATOR
// ============================================================================

#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        options: &GenerationOptions,
    ) -> Result<GeneratedScript, ScriptError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
}

/// Client for the Pollinations text endpoint
#[derive(Debug, Clone)]
pub struct PollinationsScriptClient {
    url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    token: Option<String>,
    client: HttpClient,
}

impl PollinationsScriptClient {
    pub fn new(config: &CastConfig) -> Result<Self, ScriptError> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            url: config.script_url.clone(),
            model: config.script_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            token: None,
            client,
        })
    }

    /// Attach a bearer token; empty tokens are ignored
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    fn build_request(&self, prompt: &str) -> Result<reqwest::Request, ScriptError> {
        let body = ChatRequest {
            messages: vec![ChatMessage {
                role: "system",
                content: prompt,
            }],
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        Ok(request.build()?)
    }
}

#[async_trait]
impl ScriptGenerator for PollinationsScriptClient {
    async fn generate(
        &self,
        topic: &str,
        options: &GenerationOptions,
    ) -> Result<GeneratedScript, ScriptError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ScriptError::EmptyTopic);
        }

        let prompt = build_prompt(topic, options);
        ::log::info!(
            "Requesting {} script about '{}' ({} chars prompt)",
            options.format,
            topic,
            prompt.len()
        );

        let response = self.client.execute(self.build_request(&prompt)?).await?;
        let status = response.status();
        if !status.is_success() {
            ::log::error!("Script endpoint returned {}", status);
            return Err(ScriptError::Status(status.as_u16()));
        }

        let content = response.text().await?;
        ::log::debug!("Script response: {} chars", content.len());

        Ok(GeneratedScript {
            content,
            topic: topic.to_string(),
            options: options.clone(),
            generated_at: Utc::now(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
