//! Narrative - an ordered collection of templates, plus the exported
//! configuration shape for save/load round-trips.
//!
//! The narrative is a thin container. Every operation takes an explicit
//! index; there is no ambient "currently focused" template.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{NlgError, Result};
use crate::highlight::GrammarError;
use crate::template::Template;
use crate::token::Token;

/// An ordered sequence of templates edited together.
#[derive(Clone, Debug, Default)]
pub struct Narrative {
    templates: Vec<Template>,
    name: Option<String>,
}

impl Narrative {
    /// Create an empty narrative.
    pub fn new() -> Self {
        Self::default()
    }

    /// The narrative's user-facing name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the narrative's name.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name.filter(|n| !n.is_empty());
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the narrative has no templates.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Append a template.
    pub fn push(&mut self, template: Template) {
        self.templates.push(template);
    }

    /// Insert a template at `index`, shifting later templates down.
    /// An index past the end appends.
    pub fn insert(&mut self, index: usize, template: Template) {
        let index = index.min(self.templates.len());
        self.templates.insert(index, template);
    }

    /// Remove and return the template at `index`, if present.
    pub fn remove(&mut self, index: usize) -> Option<Template> {
        if index < self.templates.len() {
            Some(self.templates.remove(index))
        } else {
            None
        }
    }

    /// The template at `index`.
    pub fn get(&self, index: usize) -> Option<&Template> {
        self.templates.get(index)
    }

    /// Mutable access to the template at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Template> {
        self.templates.get_mut(index)
    }

    /// Iterate over the templates in order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    /// Assembled template texts in order, as sent to the renderer service.
    pub fn assembled_templates(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.assembled()).collect()
    }

    /// Export the narrative as a save/load configuration.
    pub fn export(&self) -> NarrativeConfig {
        NarrativeConfig {
            name: self.name.clone(),
            config: self.templates.iter().map(TemplateConfig::from).collect(),
        }
    }

    /// Rebuild a narrative from an exported configuration.
    ///
    /// Every template is re-synthesized; given an identical catalog and
    /// data context, the assembled texts come out byte-identical to the
    /// exported ones.
    pub fn import(config: NarrativeConfig) -> Result<Self> {
        let mut narrative = Narrative::new();
        narrative.set_name(config.name);
        for record in config.config {
            narrative.push(record.into_template()?);
        }
        debug!(templates = narrative.len(), "imported narrative config");
        Ok(narrative)
    }
}

/// Exported configuration for a whole narrative.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NarrativeConfig {
    /// Narrative name.
    #[serde(default)]
    pub name: Option<String>,
    /// Template records in narrative order.
    pub config: Vec<TemplateConfig>,
}

/// Exported configuration for one template.
///
/// Tokens are stored as an ordered list of records, each carrying its own
/// placeholder; this is the explicit tagged representation of the
/// placeholder-to-token mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// The sentence with placeholders embedded.
    pub text: String,
    /// Token records in insertion order.
    pub tokenmap: Vec<Token>,
    /// Boolean-guard condition.
    #[serde(default)]
    pub condition: Option<String>,
    /// Extra-args value for the preamble.
    #[serde(default)]
    pub fh_args: Value,
    /// Whether the extra-args preamble is emitted.
    #[serde(rename = "setFHArgs", default)]
    pub set_fh_args: bool,
    /// Assembled template text at export time.
    #[serde(default)]
    pub template: String,
    /// Rendered text at export time, if a render had been applied. Grammar
    /// errors index into this when present, else into `text`.
    #[serde(default)]
    pub rendered_text: Option<String>,
    /// Preview markup at export time.
    #[serde(rename = "previewHTML", default)]
    pub preview_html: String,
    /// Grammar-error spans at export time.
    #[serde(rename = "grmerr", default)]
    pub grammar_errors: Vec<GrammarError>,
    /// Template name.
    #[serde(default)]
    pub name: Option<String>,
}

impl From<&Template> for TemplateConfig {
    fn from(template: &Template) -> Self {
        Self {
            text: template.source_text().to_string(),
            tokenmap: template.tokens().to_vec(),
            condition: template.condition().map(str::to_string),
            fh_args: template.extra_args().clone(),
            set_fh_args: template.emits_extra_args_setter(),
            template: template.assembled().to_string(),
            rendered_text: template.rendered_text().map(str::to_string),
            preview_html: template.preview().to_string(),
            grammar_errors: template.grammar_errors().to_vec(),
            name: template.name().map(str::to_string),
        }
    }
}

impl TemplateConfig {
    /// Rebuild and re-synthesize the template this record describes.
    pub fn into_template(self) -> Result<Template> {
        // Token invariants are revalidated on the way in: a hand-edited
        // config is no more trusted than a tokenizer payload.
        for token in &self.tokenmap {
            token.enabled_candidate()?;
        }
        let mut template = Template::new(self.text, self.tokenmap)?;
        template.set_name(self.name);
        if self.condition.is_some() {
            template.set_condition(self.condition)?;
        }
        if self.set_fh_args || !self.fh_args.is_null() {
            template.set_extra_args(self.fh_args, self.set_fh_args)?;
        }
        template.synthesize()?;
        if self.rendered_text.is_some() || !self.grammar_errors.is_empty() {
            // Offsets index the text that was active at export time: the
            // rendered text when a render had been applied, else the source.
            let base = self
                .rendered_text
                .as_deref()
                .unwrap_or_else(|| template.source_text());
            if let Some(bad) = self.grammar_errors.iter().find(|e| !e.fits(base)) {
                return Err(NlgError::InvalidTokenizerResponse {
                    reason: format!(
                        "grammar-error span {}..{} does not fit its base text",
                        bad.offset,
                        bad.offset + bad.length
                    ),
                });
            }
            template.restore_render_state(self.rendered_text, self.grammar_errors);
        }
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Candidate;
    use pretty_assertions::assert_eq;

    fn template(text: &str, placeholder: &str, expr: &str) -> Template {
        let token = Token::new(placeholder, vec![Candidate::new(expr, true)], vec![]).unwrap();
        let mut template = Template::new(text, vec![token]).unwrap();
        template.synthesize().unwrap();
        template
    }

    #[test]
    fn test_push_get_remove() {
        let mut narrative = Narrative::new();
        narrative.push(template("Sales grew by X.", "X", "df.growth"));
        narrative.push(template("Profit fell by Y.", "Y", "df.profit"));
        assert_eq!(narrative.len(), 2);
        assert_eq!(
            narrative.get(1).unwrap().source_text(),
            "Profit fell by Y."
        );

        let removed = narrative.remove(0).unwrap();
        assert_eq!(removed.source_text(), "Sales grew by X.");
        assert_eq!(narrative.len(), 1);
        assert!(narrative.remove(5).is_none());
    }

    #[test]
    fn test_assembled_templates_in_order() {
        let mut narrative = Narrative::new();
        narrative.push(template("Sales grew by X.", "X", "df.growth"));
        narrative.push(template("Profit fell by Y.", "Y", "df.profit"));
        assert_eq!(
            narrative.assembled_templates(),
            vec![
                "Sales grew by {{ df.growth }}.",
                "Profit fell by {{ df.profit }}."
            ]
        );
    }

    #[test]
    fn test_insert_shifts_and_clamps() {
        let mut narrative = Narrative::new();
        narrative.push(template("Sales grew by X.", "X", "df.growth"));
        narrative.push(template("Profit fell by Y.", "Y", "df.profit"));

        narrative.insert(1, template("Margins held at Z.", "Z", "df.margin"));
        assert_eq!(narrative.len(), 3);
        assert_eq!(narrative.get(1).unwrap().source_text(), "Margins held at Z.");
        assert_eq!(narrative.get(2).unwrap().source_text(), "Profit fell by Y.");

        // Past-the-end insert appends.
        narrative.insert(99, template("Costs rose by W.", "W", "df.cost"));
        assert_eq!(narrative.get(3).unwrap().source_text(), "Costs rose by W.");
    }

    #[test]
    fn test_round_trip_preserves_rendered_state() {
        let mut narrative = Narrative::new();
        narrative.push(template("Sales grew by X.", "X", "df.growth"));

        let tmpl = narrative.get_mut(0).unwrap();
        tmpl.apply_render(
            tmpl.revision(),
            "Sales grew by 4.2 percent.".to_string(),
            vec![GrammarError::new(14, 11, "spell out percent signs")],
        )
        .unwrap();

        let json = serde_json::to_string(&narrative.export()).unwrap();
        let config: NarrativeConfig = serde_json::from_str(&json).unwrap();
        let restored = Narrative::import(config).unwrap();

        let original = narrative.get(0).unwrap();
        let roundtripped = restored.get(0).unwrap();
        assert_eq!(roundtripped.rendered_text(), Some("Sales grew by 4.2 percent."));
        assert_eq!(roundtripped.grammar_errors(), original.grammar_errors());
        assert_eq!(roundtripped.assembled(), original.assembled());
        assert_eq!(roundtripped.preview(), original.preview());
    }

    #[test]
    fn test_import_rejects_errors_outside_rendered_text() {
        let record = TemplateConfig {
            text: "Sales grew by X.".to_string(),
            tokenmap: template("Sales grew by X.", "X", "df.growth")
                .tokens()
                .to_vec(),
            condition: None,
            fh_args: Value::Null,
            set_fh_args: false,
            template: String::new(),
            rendered_text: Some("tiny".to_string()),
            preview_html: String::new(),
            grammar_errors: vec![GrammarError::new(0, 99, "overflow")],
            name: None,
        };
        let err = record.into_template().unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKENIZER_RESPONSE");
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut narrative = Narrative::new();
        narrative.set_name(Some("quarterly".to_string()));

        let mut first = template("Sales grew by X.", "X", "df.growth");
        first.bind_variable("X", "g").unwrap();
        first.set_condition(Some("g > 0".to_string())).unwrap();
        narrative.push(first);

        let mut second = template("Profit fell by Y.", "Y", "df.profit");
        second
            .set_extra_args(serde_json::json!({"_sort": ["-profit"]}), true)
            .unwrap();
        narrative.push(second);

        let exported = narrative.export();
        let json = serde_json::to_string(&exported).unwrap();
        let reloaded: NarrativeConfig = serde_json::from_str(&json).unwrap();
        let restored = Narrative::import(reloaded).unwrap();

        assert_eq!(restored.name(), Some("quarterly"));
        assert_eq!(restored.len(), narrative.len());
        for (original, roundtripped) in narrative.iter().zip(restored.iter()) {
            assert_eq!(original.assembled(), roundtripped.assembled());
            assert_eq!(original.preview(), roundtripped.preview());
        }
    }

    #[test]
    fn test_import_rejects_corrupt_tokens() {
        let mut config = template("Sales grew by X.", "X", "df.growth")
            .tokens()
            .to_vec();
        // Simulate a hand-edited config that disabled every candidate.
        let json = serde_json::to_string(&config.remove(0)).unwrap();
        let corrupted = json.replace("\"enabled\":true", "\"enabled\":false");
        let token: Token = serde_json::from_str(&corrupted).unwrap();

        let record = TemplateConfig {
            text: "Sales grew by X.".to_string(),
            tokenmap: vec![token],
            condition: None,
            fh_args: Value::Null,
            set_fh_args: false,
            template: String::new(),
            rendered_text: None,
            preview_html: String::new(),
            grammar_errors: vec![],
            name: None,
        };
        let err = record.into_template().unwrap_err();
        assert_eq!(err.code(), "INVARIANT_VIOLATION");
    }
}
