//! Template - a sentence with replaceable token spans.
//!
//! A template owns its source text and tokens, and derives two strings from
//! them: the assembled template-language text and the annotated preview.
//! Derived state is only ever replaced on full success; a failed edit leaves
//! the previously-good `assembled`/`preview` untouched.
//!
//! Synthesis is span-based: every placeholder is located once against the
//! immutable source text, spans are validated for presence and non-overlap,
//! and the output is materialized in a single pass. Placeholders must be
//! unique and non-overlapping; the engine fails rather than guessing an
//! order-dependent precedence.

use serde_json::Value;
use tracing::debug;

use crate::catalog::{GrammarCatalog, Inflection};
use crate::emit;
use crate::error::{NlgError, Result};
use crate::highlight::{self, GrammarError};
use crate::token::Token;

/// A sentence template: source text, tokens, and derived output.
#[derive(Clone, Debug, Default)]
pub struct Template {
    source_text: String,
    /// Tokens in insertion order; placeholders are unique.
    tokens: Vec<Token>,
    condition: Option<String>,
    extra_args: Value,
    emit_extra_args_setter: bool,
    assembled: String,
    rendered_text: Option<String>,
    grammar_errors: Vec<GrammarError>,
    preview: String,
    name: Option<String>,
    /// Bumped on every successful synthesis; render responses are keyed to
    /// the revision they were requested against.
    revision: u64,
}

/// A placeholder's resolved location in the source text.
struct PlaceholderSpan {
    token_index: usize,
    start: usize,
    end: usize,
}

impl Template {
    /// Build a template from source text and tokens.
    ///
    /// Each placeholder must occur in the source text, be unique among the
    /// template's tokens, and not overlap any other placeholder's first
    /// occurrence. Derived state starts empty; call
    /// [`synthesize`](Self::synthesize) to populate it.
    pub fn new(source_text: impl Into<String>, tokens: Vec<Token>) -> Result<Self> {
        let template = Self {
            source_text: source_text.into(),
            tokens,
            ..Default::default()
        };
        template.placeholder_spans()?;
        Ok(template)
    }

    /// The sentence with placeholders embedded.
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Tokens in insertion order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Look up a token by placeholder.
    pub fn token(&self, placeholder: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.placeholder() == placeholder)
    }

    /// The boolean-guard condition, if any.
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// The extra-args value injected by the preamble.
    pub fn extra_args(&self) -> &Value {
        &self.extra_args
    }

    /// Whether the extra-args preamble is emitted.
    pub fn emits_extra_args_setter(&self) -> bool {
        self.emit_extra_args_setter
    }

    /// The assembled template-language text.
    pub fn assembled(&self) -> &str {
        &self.assembled
    }

    /// Externally-supplied rendered text, if any.
    pub fn rendered_text(&self) -> Option<&str> {
        self.rendered_text.as_deref()
    }

    /// Grammar-error spans into the active base text.
    pub fn grammar_errors(&self) -> &[GrammarError] {
        &self.grammar_errors
    }

    /// The annotated preview markup.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// The user-facing label. No semantic effect on assembly.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current synthesis revision, used to key render responses.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // -------------------------------------------------------------------
    // Editing operations. Each addresses a token by placeholder, applies
    // the edit, and re-synthesizes.
    // -------------------------------------------------------------------

    /// Select a token's candidate by text and re-synthesize.
    pub fn select_candidate(&mut self, placeholder: &str, text: &str) -> Result<()> {
        self.token_mut(placeholder)?.select_candidate(text)?;
        self.synthesize()
    }

    /// Replace a token's inflection chain wholesale and re-synthesize.
    pub fn set_inflections(
        &mut self,
        placeholder: &str,
        inflections: Vec<Inflection>,
    ) -> Result<()> {
        self.token_mut(placeholder)?.set_inflections(inflections);
        self.synthesize()
    }

    /// Replace a token's inflections with catalog features and re-synthesize.
    pub fn apply_features<S: AsRef<str>>(
        &mut self,
        placeholder: &str,
        catalog: &GrammarCatalog,
        features: &[S],
    ) -> Result<()> {
        self.token_mut(placeholder)?
            .apply_features(catalog, features)?;
        self.synthesize()
    }

    /// Bind a token's value to a named variable and re-synthesize.
    ///
    /// Follows token binding rules: an empty name or an existing binding
    /// leaves the token unchanged (and skips re-synthesis).
    pub fn bind_variable(&mut self, placeholder: &str, name: &str) -> Result<()> {
        if self.token_mut(placeholder)?.bind_variable(name) {
            self.synthesize()?;
        }
        Ok(())
    }

    /// Clear a token's variable binding and re-synthesize.
    pub fn unbind_variable(&mut self, placeholder: &str) -> Result<()> {
        self.token_mut(placeholder)?.unbind_variable();
        self.synthesize()
    }

    /// Toggle a token's ignored flag and re-synthesize.
    pub fn set_ignored(&mut self, placeholder: &str, ignored: bool) -> Result<()> {
        self.token_mut(placeholder)?.set_ignored(ignored);
        self.synthesize()
    }

    /// Set or clear the boolean-guard condition and re-synthesize.
    pub fn set_condition(&mut self, condition: Option<String>) -> Result<()> {
        self.condition = condition.filter(|c| !c.is_empty());
        self.synthesize()
    }

    /// Set the extra-args value and whether the preamble is emitted, then
    /// re-synthesize.
    pub fn set_extra_args(&mut self, extra_args: Value, emit_setter: bool) -> Result<()> {
        self.extra_args = extra_args;
        self.emit_extra_args_setter = emit_setter;
        self.synthesize()
    }

    /// Set the user-facing label. Labels do not affect assembly, so no
    /// re-synthesis happens.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name.filter(|n| !n.is_empty());
    }

    // -------------------------------------------------------------------
    // Synthesis
    // -------------------------------------------------------------------

    /// Assemble the template-language text and refresh the preview.
    ///
    /// Idempotent for unchanged state: the output is recomputed from the
    /// source text every time, so conditions and preambles never wrap twice.
    pub fn synthesize(&mut self) -> Result<()> {
        let spans = self.placeholder_spans()?;

        // Build fragments first so every token's cache is refreshed even
        // when its span contributes an interpolated variable instead.
        let mut fragments = Vec::with_capacity(self.tokens.len());
        for token in &mut self.tokens {
            fragments.push(token.build_fragment()?);
        }

        let mut body = String::with_capacity(self.source_text.len());
        let mut cursor = 0;
        for span in &spans {
            let token = &self.tokens[span.token_index];
            body.push_str(&self.source_text[cursor..span.start]);
            match token.bound_variable() {
                // Ignored tokens contribute the raw placeholder even when
                // bound; there is nothing to extract.
                Some(variable) if !token.is_ignored() => {
                    body.push_str(&emit::interpolate(variable));
                }
                _ => body.push_str(&fragments[span.token_index]),
            }
            cursor = span.end;
        }
        body.push_str(&self.source_text[cursor..]);

        let mut assembled = String::new();
        for token in &self.tokens {
            if token.is_ignored() {
                continue;
            }
            if let Some(variable) = token.bound_variable() {
                let expression = token.chained_expression()?;
                assembled.push_str(&emit::set_statement(variable, &expression));
                assembled.push('\n');
            }
        }
        assembled.push_str(&body);

        if let Some(condition) = &self.condition {
            assembled = emit::condition_block(condition, &assembled);
        }
        if self.emit_extra_args_setter {
            assembled = format!("{}{}", emit::extra_args_setter(&self.extra_args), assembled);
        }

        self.assembled = assembled;
        self.revision += 1;
        debug!(
            revision = self.revision,
            tokens = self.tokens.len(),
            "synthesized template"
        );
        self.refresh_preview();
        Ok(())
    }

    /// Recompute the annotated preview from current state.
    ///
    /// The base text is the rendered text when present, else the source
    /// text. Grammar-error offsets index into that same base text.
    pub fn refresh_preview(&mut self) {
        let base = self.rendered_text.as_deref().unwrap_or(&self.source_text);
        let placeholders: Vec<&str> = self.tokens.iter().map(|t| t.placeholder()).collect();
        self.preview = highlight::annotate(base, &placeholders, &self.grammar_errors);
    }

    /// Apply a renderer response.
    ///
    /// `requested_revision` is the revision the assembled text had when the
    /// render was requested; a stale response is rejected so a late reply
    /// can never clobber the state of a newer edit. On any failure the
    /// existing rendered/annotated state is left unchanged.
    pub fn apply_render(
        &mut self,
        requested_revision: u64,
        rendered_text: String,
        grammar_errors: Vec<GrammarError>,
    ) -> Result<()> {
        if requested_revision != self.revision {
            return Err(NlgError::RenderFailed {
                reason: format!(
                    "stale render response (requested revision {}, template at {})",
                    requested_revision, self.revision
                ),
            });
        }
        if let Some(bad) = grammar_errors.iter().find(|e| !e.fits(&rendered_text)) {
            return Err(NlgError::RenderFailed {
                reason: format!(
                    "grammar-error span {}..{} does not fit rendered text",
                    bad.offset,
                    bad.offset + bad.length
                ),
            });
        }
        self.rendered_text = Some(rendered_text);
        self.grammar_errors = grammar_errors;
        self.refresh_preview();
        Ok(())
    }

    /// Replace the grammar-error list (offsets into the active base text)
    /// and refresh the preview. Used at ingestion, before any render.
    pub(crate) fn set_grammar_errors(&mut self, errors: Vec<GrammarError>) {
        self.grammar_errors = errors;
        self.refresh_preview();
    }

    /// Restore previously rendered state, as when loading a saved
    /// configuration. The caller has already validated the error spans
    /// against the base text the render state implies. The preview is
    /// recomputed rather than trusted from the saved record.
    pub(crate) fn restore_render_state(
        &mut self,
        rendered_text: Option<String>,
        errors: Vec<GrammarError>,
    ) {
        self.rendered_text = rendered_text;
        self.grammar_errors = errors;
        self.refresh_preview();
    }

    fn token_mut(&mut self, placeholder: &str) -> Result<&mut Token> {
        self.tokens
            .iter_mut()
            .find(|t| t.placeholder() == placeholder)
            .ok_or_else(|| NlgError::PlaceholderNotFound {
                placeholder: placeholder.to_string(),
            })
    }

    /// Locate every placeholder's first occurrence in the source text and
    /// validate uniqueness and non-overlap.
    fn placeholder_spans(&self) -> Result<Vec<PlaceholderSpan>> {
        let mut spans = Vec::with_capacity(self.tokens.len());
        for (token_index, token) in self.tokens.iter().enumerate() {
            let placeholder = token.placeholder();
            if placeholder.is_empty() {
                return Err(NlgError::PlaceholderNotFound {
                    placeholder: String::new(),
                });
            }
            if self.tokens[..token_index]
                .iter()
                .any(|t| t.placeholder() == placeholder)
            {
                return Err(NlgError::OverlappingPlaceholders {
                    first: placeholder.to_string(),
                    second: placeholder.to_string(),
                });
            }
            let start = self.source_text.find(placeholder).ok_or_else(|| {
                NlgError::PlaceholderNotFound {
                    placeholder: placeholder.to_string(),
                }
            })?;
            spans.push(PlaceholderSpan {
                token_index,
                start,
                end: start + placeholder.len(),
            });
        }
        spans.sort_by_key(|s| s.start);
        for pair in spans.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(NlgError::OverlappingPlaceholders {
                    first: self.tokens[pair[0].token_index].placeholder().to_string(),
                    second: self.tokens[pair[1].token_index].placeholder().to_string(),
                });
            }
        }
        Ok(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Candidate;
    use pretty_assertions::assert_eq;

    fn growth_template() -> Template {
        let token = Token::new(
            "X",
            vec![Candidate::new("df.growth", true)],
            vec![],
        )
        .unwrap();
        Template::new("Sales grew by X.", vec![token]).unwrap()
    }

    #[test]
    fn test_end_to_end_example() {
        let mut template = growth_template();
        template.synthesize().unwrap();
        assert_eq!(template.assembled(), "Sales grew by {{ df.growth }}.");
    }

    #[test]
    fn test_variable_binding() {
        let mut template = growth_template();
        template.synthesize().unwrap();
        template.bind_variable("X", "g").unwrap();
        assert_eq!(
            template.assembled(),
            "{% set g = df.growth %}\nSales grew by {{ g }}."
        );
    }

    #[test]
    fn test_unbind_restores_inline_interpolation() {
        let mut template = growth_template();
        template.synthesize().unwrap();
        template.bind_variable("X", "g").unwrap();
        template.unbind_variable("X").unwrap();
        assert_eq!(template.assembled(), "Sales grew by {{ df.growth }}.");
    }

    #[test]
    fn test_conditional_wrapping_idempotent() {
        let mut template = growth_template();
        template.set_condition(Some("df.growth > 0".to_string())).unwrap();
        let first = template.assembled().to_string();
        template.synthesize().unwrap();
        assert_eq!(template.assembled(), first);
        assert_eq!(
            first,
            "{% if df.growth > 0 %}\nSales grew by {{ df.growth }}.\n{% end %}"
        );
    }

    #[test]
    fn test_condition_wraps_declarations() {
        let mut template = growth_template();
        template.bind_variable("X", "g").unwrap();
        template.set_condition(Some("g > 0".to_string())).unwrap();
        assert_eq!(
            template.assembled(),
            "{% if g > 0 %}\n{% set g = df.growth %}\nSales grew by {{ g }}.\n{% end %}"
        );
    }

    #[test]
    fn test_extra_args_preamble_is_outermost() {
        let mut template = growth_template();
        template.set_condition(Some("true".to_string())).unwrap();
        template
            .set_extra_args(serde_json::json!({"_limit": 10}), true)
            .unwrap();
        assert_eq!(
            template.assembled(),
            "{% set fh_args = {\"_limit\":10} %}\n\
             {% set df = U.grmfilter(orgdf, fh_args.copy()) %}\n\
             {% if true %}\nSales grew by {{ df.growth }}.\n{% end %}"
        );
    }

    #[test]
    fn test_ignored_token_passes_placeholder_through() {
        let mut template = growth_template();
        template.set_ignored("X", true).unwrap();
        assert_eq!(template.assembled(), "Sales grew by X.");
        template.set_ignored("X", false).unwrap();
        assert_eq!(template.assembled(), "Sales grew by {{ df.growth }}.");
    }

    #[test]
    fn test_candidate_change_rewrites_fragment() {
        let token = Token::new(
            "X",
            vec![
                Candidate::new("df.growth", true),
                Candidate::new("df.sales.mean()", false),
            ],
            vec![],
        )
        .unwrap();
        let mut template = Template::new("Sales grew by X.", vec![token]).unwrap();
        template.synthesize().unwrap();
        template.select_candidate("X", "df.sales.mean()").unwrap();
        assert_eq!(template.assembled(), "Sales grew by {{ df.sales.mean() }}.");
    }

    #[test]
    fn test_multiple_tokens_in_text_order() {
        let city = Token::new(
            "Paris",
            vec![Candidate::new("df.city", true)],
            vec![],
        )
        .unwrap();
        let sales = Token::new(
            "120",
            vec![Candidate::new("df.sales", true)],
            vec![],
        )
        .unwrap();
        let mut template =
            Template::new("Paris sold 120 units.", vec![city, sales]).unwrap();
        template.synthesize().unwrap();
        assert_eq!(
            template.assembled(),
            "{{ df.city }} sold {{ df.sales }} units."
        );
    }

    #[test]
    fn test_missing_placeholder_rejected() {
        let token = Token::new("Y", vec![Candidate::new("df.y", true)], vec![]).unwrap();
        let err = Template::new("Sales grew by X.", vec![token]).unwrap_err();
        assert_eq!(err.code(), "PLACEHOLDER_NOT_FOUND");
    }

    #[test]
    fn test_overlapping_placeholders_rejected() {
        let long = Token::new("cat sat", vec![Candidate::new("a", true)], vec![]).unwrap();
        let short = Token::new("cat", vec![Candidate::new("b", true)], vec![]).unwrap();
        let err = Template::new("The cat sat.", vec![long, short]).unwrap_err();
        assert_eq!(err.code(), "OVERLAPPING_PLACEHOLDERS");
    }

    #[test]
    fn test_failed_synthesis_preserves_derived_state() {
        let mut template = growth_template();
        template.synthesize().unwrap();
        let assembled = template.assembled().to_string();
        let preview = template.preview().to_string();
        let revision = template.revision();

        let err = template.select_candidate("X", "nope").unwrap_err();
        assert_eq!(err.code(), "NO_SUCH_CANDIDATE");
        assert_eq!(template.assembled(), assembled);
        assert_eq!(template.preview(), preview);
        assert_eq!(template.revision(), revision);
    }

    #[test]
    fn test_preview_highlights_source_before_render() {
        let mut template = growth_template();
        template.synthesize().unwrap();
        assert_eq!(
            template.preview(),
            "Sales grew by <span style=\"background-color:#c8f442\">X</span>."
        );
    }

    #[test]
    fn test_apply_render_updates_preview() {
        let mut template = growth_template();
        template.synthesize().unwrap();
        let revision = template.revision();
        template
            .apply_render(
                revision,
                "Sales grew by 4.2%.".to_string(),
                vec![GrammarError::new(14, 4, "number agreement")],
            )
            .unwrap();
        assert_eq!(template.rendered_text(), Some("Sales grew by 4.2%."));
        assert!(template.preview().contains("background-color:#ed7171"));
        assert!(template.preview().contains("4.2%"));
    }

    #[test]
    fn test_stale_render_rejected() {
        let mut template = growth_template();
        template.synthesize().unwrap();
        let stale = template.revision();
        template.set_condition(Some("true".to_string())).unwrap();

        let err = template
            .apply_render(stale, "whatever".to_string(), vec![])
            .unwrap_err();
        assert_eq!(err.code(), "RENDER_FAILED");
        assert_eq!(template.rendered_text(), None);
    }

    #[test]
    fn test_failed_render_preserves_state() {
        let mut template = growth_template();
        template.synthesize().unwrap();
        let preview = template.preview().to_string();
        let err = template
            .apply_render(
                template.revision(),
                "tiny".to_string(),
                vec![GrammarError::new(0, 99, "overflow")],
            )
            .unwrap_err();
        assert_eq!(err.code(), "RENDER_FAILED");
        assert_eq!(template.rendered_text(), None);
        assert_eq!(template.preview(), preview);
    }
}
