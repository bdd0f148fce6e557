use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Audience-specific presentation style applied to every instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NeuroFeature {
    #[default]
    Off,
    Dyslexia,
    Adhd,
    Autism,
}

impl NeuroFeature {
    pub fn as_str(self) -> &'static str {
        match self {
            NeuroFeature::Off => "none",
            NeuroFeature::Dyslexia => "dyslexia",
            NeuroFeature::Adhd => "adhd",
            NeuroFeature::Autism => "autism",
        }
    }
}

// Unknown modes stored by newer popups degrade to no enrichment.
impl From<String> for NeuroFeature {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "dyslexia" => NeuroFeature::Dyslexia,
            "adhd" => NeuroFeature::Adhd,
            "autism" => NeuroFeature::Autism,
            _ => NeuroFeature::Off,
        }
    }
}

impl From<NeuroFeature> for String {
    fn from(feature: NeuroFeature) -> Self {
        feature.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub neuro_feature: NeuroFeature,
    pub theme: String,
    pub realtime_proofreader: bool,
    pub autocomplete_on_tab: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            neuro_feature: NeuroFeature::Off,
            theme: "dark".to_string(),
            realtime_proofreader: false,
            autocomplete_on_tab: true,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Accessibility {
    pub font: String,
    /// The options slider stores its value as a string.
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub spacing: f64,
    pub enable_ocr: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a number, got \"{s}\""))),
    }
}

impl Default for Accessibility {
    fn default() -> Self {
        Self {
            font: "default".to_string(),
            spacing: 1.4,
            enable_ocr: false,
            extra: Map::new(),
        }
    }
}

/// The last selection the page reported, used as extra prompt context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_selected_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// Snapshot of the persisted user configuration.
///
/// Keys the broker does not understand (for example `apiConfig`) are kept in
/// `extra` so a snapshot survives a round trip through the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserConfig {
    pub user_preferences: UserPreferences,
    pub accessibility: Accessibility,
    pub context: SelectionContext,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parse one top-level section, falling back to its defaults when the stored
/// value does not fit.
fn section<T: DeserializeOwned + Default>(items: &mut Map<String, Value>, key: &str) -> T {
    let Some(raw) = items.remove(key) else {
        return T::default();
    };
    match serde_json::from_value(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(section = key, error=%e, "ignoring malformed config section");
            T::default()
        }
    }
}

impl UserConfig {
    /// Build a snapshot from raw storage items.
    ///
    /// Each section is parsed on its own, so a malformed `accessibility` never
    /// costs the user their `userPreferences` or `context`.
    pub fn from_storage(mut items: Map<String, Value>) -> Self {
        let user_preferences = section(&mut items, "userPreferences");
        let accessibility = section(&mut items, "accessibility");
        let context = section(&mut items, "context");
        Self {
            user_preferences,
            accessibility,
            context,
            extra: items,
        }
    }

    pub fn neuro_feature(&self) -> NeuroFeature {
        self.user_preferences.neuro_feature
    }

    pub fn last_selected_text(&self) -> Option<&str> {
        self.context
            .last_selected_text
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}
