//! Google Gemini `generateContent` backend.
//!
//! When no model is configured, [`discover_model`] asks the API which models
//! the key can use and picks one with [`select_model`].

use super::ScriptGenerator;
use crate::config::{LlmConfig, Provider};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use tracing::{debug, info, warn};

/// Models tried in order when discovering; the first one offered wins.
pub const PREFERRED_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"];

pub struct GeminiGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, serde::Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, serde::Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, serde::Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, serde::Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, serde::Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, serde::Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl GeminiGenerator {
    pub fn new(client: Client, config: &LlmConfig, api_key: String) -> Self {
        let model = config.effective_model();
        let bare = model.trim_start_matches("models/");
        GeminiGenerator {
            client,
            endpoint: format!(
                "{}/models/{bare}:generateContent",
                config.effective_base_url()
            ),
            api_key,
            model: bare.to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub(crate) fn request<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }
}

/// Joins the text parts of the first candidate in a `generateContent` body.
pub fn parse_response(body: &str) -> Result<String> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|source| Error::ResponseParse {
            provider: "gemini".to_string(),
            source,
        })?;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(Error::EmptyResponse("gemini".to_string()));
    }
    Ok(text)
}

/// Names of the models in a `models.list` body that support `generateContent`.
pub fn parse_model_list(body: &str) -> Result<Vec<String>> {
    let list: ModelList = serde_json::from_str(body).map_err(|source| Error::ResponseParse {
        provider: "gemini".to_string(),
        source,
    })?;
    Ok(list
        .models
        .into_iter()
        .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
        .map(|m| m.name)
        .collect())
}

/// Picks a model from `available`, with or without the `models/` prefix.
///
/// [`PREFERRED_MODELS`] are tried in order; failing those, the first name
/// containing `gemini` is used. `None` when nothing matches.
///
/// # Examples
///
/// ```
/// use trivy_autofix::llm::gemini::select_model;
///
/// let available = ["models/gemini-pro".to_string(), "models/gemini-1.5-pro".to_string()];
/// assert_eq!(select_model(&available).as_deref(), Some("gemini-1.5-pro"));
/// ```
pub fn select_model(available: &[String]) -> Option<String> {
    let bare: Vec<&str> = available
        .iter()
        .map(|name| name.trim_start_matches("models/"))
        .collect();

    if let Some(preferred) = PREFERRED_MODELS.iter().find(|p| bare.contains(*p)) {
        return Some(preferred.to_string());
    }
    let fallback = bare.iter().find(|name| name.contains("gemini"))?;
    warn!("no preferred Gemini model available, falling back to {fallback}");
    Some(fallback.to_string())
}

/// Lists the models the key can call `generateContent` on.
pub fn list_models(client: &Client, base_url: &str, api_key: &str) -> Result<Vec<String>> {
    let url = format!("{base_url}/models?pageSize=1000");
    debug!("GET {url}");
    let response = client.get(&url).header("x-goog-api-key", api_key).send()?;

    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(Error::Api {
            provider: "gemini".to_string(),
            status: status.as_u16(),
            body,
        });
    }
    parse_model_list(&body)
}

/// Chooses a model for a key by listing what it can use.
///
/// Never fails: listing errors and empty lists fall back to the provider's
/// default model with a warning.
pub fn discover_model(client: &Client, base_url: &str, api_key: &str) -> String {
    let default = Provider::Gemini.default_model();
    match list_models(client, base_url, api_key) {
        Ok(available) => match select_model(&available) {
            Some(model) => {
                info!("using Gemini model {model}");
                model
            }
            None => {
                warn!(
                    "none of {} listed models is a Gemini model, using {default}",
                    available.len()
                );
                default.to_string()
            }
        },
        Err(e) => {
            warn!("could not list Gemini models ({e}), using {default}");
            default.to_string()
        }
    }
}

impl ScriptGenerator for GeminiGenerator {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        debug!("POST {} ({} chars)", self.endpoint, prompt.len());
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request(prompt))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(Error::Api {
                provider: self.provider().to_string(),
                status: status.as_u16(),
                body,
            });
        }
        parse_response(&body)
    }
}
