//! Session templates: prompts, recognition hints, and quick actions.
//!
//! A template is a TOML file describing how a kind of session (meeting,
//! lecture, interview, …) should be analyzed.  Lookup order for a template
//! name:
//!
//! 1. an explicit filesystem path (anything containing a separator or ending
//!    in `.toml`),
//! 2. `<templates_dir>/<name>.toml` (user overrides),
//! 3. the built-in default, embedded at compile time.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The built-in general-purpose template.
const BUILTIN_DEFAULT: &str = include_str!("../templates/default.toml");

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Descriptive header of a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// BCP-47 tag used to pick the Whisper model (`"en"`, `"zh-TW"`, …).
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en".into()
}

/// A numbered on-demand query the user can fire during the session.
///
/// Actions are invoked by their 1-based position in the template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickAction {
    /// Short label shown in the action list.
    pub label: String,
    /// Prompt with `{digest_markdown}` / `{recent_transcript}` placeholders.
    pub prompt_template: String,
}

/// A parsed session template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTemplate {
    /// System message for every digest conversation.
    pub system_prompt: String,
    /// Periodic digest user message (`{line_count}`, `{new_lines}`,
    /// `{user_context}`).
    pub digest_user_template: String,
    /// Final digest user message (adds `{full_transcript}`).
    pub final_user_template: String,
    /// Domain vocabulary fed to the recognizer as an initial prompt.
    #[serde(default)]
    pub recognition_hints: Vec<String>,
    pub metadata: TemplateMetadata,
    #[serde(default)]
    pub quick_actions: Vec<QuickAction>,
}

// ---------------------------------------------------------------------------
// TemplateError
// ---------------------------------------------------------------------------

/// Errors raised while loading a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("failed to read template file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse template: {0}")]
    Parse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl SessionTemplate {
    /// Parse a template from TOML text.
    pub fn parse(content: &str) -> Result<Self, TemplateError> {
        Ok(toml::from_str(content)?)
    }

    /// The built-in default template.
    pub fn builtin_default() -> Self {
        // The embedded file is validated by tests; a parse failure here is a
        // build defect, not a runtime condition.
        Self::parse(BUILTIN_DEFAULT).expect("built-in template must parse")
    }

    /// Resolve `name` using the lookup order described in the module docs.
    pub fn resolve(name: &str, templates_dir: &Path) -> Result<Self, TemplateError> {
        // 1. Explicit path
        if name.contains(std::path::MAIN_SEPARATOR) || name.ends_with(".toml") {
            let path = Path::new(name);
            if path.exists() {
                return Self::parse(&std::fs::read_to_string(path)?);
            }
            return Err(TemplateError::NotFound(name.to_string()));
        }

        // 2. User template directory
        let user_path = templates_dir.join(format!("{name}.toml"));
        if user_path.exists() {
            return Self::parse(&std::fs::read_to_string(user_path)?);
        }

        // 3. Built-in
        if name == "default" {
            return Ok(Self::builtin_default());
        }

        Err(TemplateError::NotFound(name.to_string()))
    }

    /// Quick action by 1-based position, as typed by the user.
    pub fn quick_action(&self, number: usize) -> Option<&QuickAction> {
        if number == 0 {
            return None;
        }
        self.quick_actions.get(number - 1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
