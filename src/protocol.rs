//! The delimiter protocol between the prompt and the model's answer.
//!
//! The model is asked to answer with a single line of fields separated by
//! [`DELIMITER`]. Which fields, and in which order, depends on the
//! [`ProtocolVersion`]. Parsing never fails: text that does not follow the
//! protocol is wrapped into a minimal fallback article instead.

use crate::models::ParsedArticle;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Field separator. Chosen to never appear in prose or HTML.
pub const DELIMITER: &str = "||||";

/// Title used when the model's answer could not be split.
pub const FALLBACK_TITLE: &str = "Actualidad Internacional";

/// Image directive used when the model gave none.
pub const FALLBACK_DIRECTIVE: &str = "world news";

// ```html, ```json, bare ``` ...
static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("fence regex"));

/// One positional field of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    ImageDirective,
    Category,
    Location,
    Body,
}

/// What kind of image directive the model should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// One English keyword, for photo searches.
    Keyword,
    /// One English sentence describing a scene, for image synthesis.
    Scene,
}

impl Field {
    /// Placeholder shown to the model in the output template.
    pub fn placeholder(self, directive: DirectiveKind) -> &'static str {
        match (self, directive) {
            (Field::Title, _) => "TITULO",
            (Field::ImageDirective, DirectiveKind::Keyword) => "KEYWORD_FOTO_INGLES",
            (Field::ImageDirective, DirectiveKind::Scene) => "DESCRIPCION_VISUAL_INGLES",
            (Field::Category, _) => "CATEGORIA",
            (Field::Location, _) => "UBICACION",
            (Field::Body, _) => "CONTENIDO_HTML",
        }
    }
}

/// Which fields the model is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolVersion {
    /// title, image directive, body
    #[default]
    Minimal,
    /// title, image directive, category, location, body
    Extended,
    /// title, body
    TitleBody,
}

const MINIMAL: &[Field] = &[Field::Title, Field::ImageDirective, Field::Body];
const EXTENDED: &[Field] = &[
    Field::Title,
    Field::ImageDirective,
    Field::Category,
    Field::Location,
    Field::Body,
];
const TITLE_BODY: &[Field] = &[Field::Title, Field::Body];

impl ProtocolVersion {
    /// Field schema, in answer order.
    pub fn fields(self) -> &'static [Field] {
        match self {
            ProtocolVersion::Minimal => MINIMAL,
            ProtocolVersion::Extended => EXTENDED,
            ProtocolVersion::TitleBody => TITLE_BODY,
        }
    }

    /// `TITULO||||KEYWORD_FOTO_INGLES||||CONTENIDO_HTML` and friends.
    pub fn output_template(self, directive: DirectiveKind) -> String {
        self.fields()
            .iter()
            .map(|f| f.placeholder(directive))
            .collect::<Vec<_>>()
            .join(DELIMITER)
    }
}

/// Remove code fences and language tags the model wraps its answer in.
pub fn strip_artifacts(raw: &str) -> String {
    FENCE.replace_all(raw, "").trim().to_string()
}

/// Split the model's answer into an article.
///
/// Surplus trailing fields are ignored. If there are fewer fields than the
/// protocol requires, or the body is empty, the answer (with code fences
/// removed) is published as a single paragraph under a generic title.
///
/// # Arguments
///
/// * `raw_text` - The backend's answer, exactly as received
/// * `version` - Which positional fields the prompt asked for
///
/// # Returns
///
/// Always a populated [`ParsedArticle`]; this function cannot fail.
#[instrument(level = "info", skip(raw_text), fields(bytes = raw_text.len()))]
pub fn parse(raw_text: &str, version: ProtocolVersion) -> ParsedArticle {
    let cleaned = strip_artifacts(raw_text);
    let parts: Vec<&str> = cleaned.split(DELIMITER).map(str::trim).collect();
    let schema = version.fields();

    if parts.len() < schema.len() {
        warn!(
            found = parts.len(),
            required = schema.len(),
            preview = %truncate_for_log(raw_text, 200),
            "Answer does not follow the delimiter protocol; using fallback article"
        );
        return fallback(&cleaned);
    }
    if parts.len() > schema.len() {
        debug!(surplus = parts.len() - schema.len(), "Ignoring surplus trailing fields");
    }

    let mut title = String::new();
    let mut directive = String::new();
    let mut category = None;
    let mut location = None;
    let mut body = String::new();

    for (field, value) in schema.iter().zip(&parts) {
        let value = value.to_string();
        match field {
            Field::Title => title = value,
            Field::ImageDirective => directive = value,
            Field::Category => category = Some(value).filter(|v| !v.is_empty()),
            Field::Location => location = Some(value).filter(|v| !v.is_empty()),
            Field::Body => body = value,
        }
    }

    if body.is_empty() {
        warn!("Answer has an empty body; using fallback article");
        return fallback(&cleaned);
    }
    if title.is_empty() {
        title = FALLBACK_TITLE.to_string();
    }
    if directive.is_empty() {
        directive = if schema.contains(&Field::ImageDirective) {
            FALLBACK_DIRECTIVE.to_string()
        } else {
            title.clone()
        };
    }

    ParsedArticle {
        title,
        image_directive: directive,
        category,
        location,
        body_html: body,
    }
}

/// Deterministic article for answers that ignored the protocol.
///
/// `text` should already have gone through [`strip_artifacts`].
pub fn fallback(text: &str) -> ParsedArticle {
    ParsedArticle {
        title: FALLBACK_TITLE.to_string(),
        image_directive: FALLBACK_DIRECTIVE.to_string(),
        category: None,
        location: None,
        body_html: format!("<p>{text}</p>"),
    }
}
