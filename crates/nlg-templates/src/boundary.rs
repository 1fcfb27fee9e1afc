//! Boundary types for the external tokenizer and renderer services.
//!
//! The engine does not tokenize text or execute templates; both jobs belong
//! to external services. This module deserializes their payloads, validates
//! the shape the engine relies on, and converts them into engine types.
//! Malformed tokenizer payloads fail with `InvalidTokenizerResponse`;
//! renderer failures are applied through [`Template::apply_render`] and
//! never partially overwrite good state.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::catalog::Inflection;
use crate::error::{NlgError, Result};
use crate::highlight::GrammarError;
use crate::template::Template;
use crate::token::{Candidate, Token};

/// Per-sentence payload returned by the tokenizer service.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenizerResponse {
    /// The sentence's source text.
    pub text: String,
    /// Placeholder to token payload. JSON object order is not trusted;
    /// tokens are ordered by their position in the text instead.
    pub tokenmap: HashMap<String, TokenPayload>,
    /// Inflection chains keyed by placeholder, for the plain-list payload
    /// shape that carries them separately.
    #[serde(default)]
    pub inflections: HashMap<String, Vec<Inflection>>,
    /// Extra-args metadata for the preamble.
    #[serde(default)]
    pub fh_args: Value,
    /// Whether the extra-args preamble should be emitted.
    #[serde(rename = "setFHArgs", default)]
    pub set_fh_args: bool,
    /// Grammar errors found in the source text, if any.
    #[serde(rename = "grmerr", default)]
    pub grammar_errors: Option<Vec<GrammarError>>,
}

/// A token's payload inside a tokenizer response.
///
/// Tokenizers emit either a bare candidate list (with inflections delivered
/// in the response-level map) or a richer object. Both collapse into one
/// explicit [`Token`] here at the boundary.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum TokenPayload {
    /// Just the candidate list.
    Candidates(Vec<Candidate>),
    /// Candidate list with an embedded inflection chain.
    Detailed {
        /// Substitution candidates.
        tokenlist: Vec<Candidate>,
        /// Inflection chain.
        #[serde(default)]
        inflections: Vec<Inflection>,
    },
}

/// Per-template payload returned by the renderer service.
#[derive(Clone, Debug, Deserialize)]
pub struct RenderResponse {
    /// The rendered text.
    pub text: String,
    /// Grammar errors with offsets into the rendered text.
    #[serde(rename = "grmerr", default)]
    pub grammar_errors: Vec<GrammarError>,
}

impl TokenizerResponse {
    /// Validate the payload and build a synthesized [`Template`] from it.
    pub fn into_template(self) -> Result<Template> {
        let mut keyed: Vec<(usize, Token)> = Vec::with_capacity(self.tokenmap.len());
        for (placeholder, payload) in self.tokenmap {
            let position = self.text.find(&placeholder).ok_or_else(|| invalid(format!(
                "placeholder '{}' does not occur in the source text",
                placeholder
            )))?;
            let (candidates, inflections) = match payload {
                TokenPayload::Candidates(candidates) => {
                    let inflections = self
                        .inflections
                        .get(&placeholder)
                        .cloned()
                        .unwrap_or_default();
                    (candidates, inflections)
                }
                TokenPayload::Detailed {
                    tokenlist,
                    inflections,
                } => (tokenlist, inflections),
            };
            if candidates.is_empty() {
                return Err(invalid(format!(
                    "placeholder '{}' has an empty candidate list",
                    placeholder
                )));
            }
            let token = Token::new(placeholder, candidates, inflections)
                .map_err(|e| invalid(e.to_string()))?;
            keyed.push((position, token));
        }
        // Deterministic insertion order: textual position, independent of
        // JSON object iteration order.
        keyed.sort_by_key(|(position, _)| *position);
        let tokens = keyed.into_iter().map(|(_, token)| token).collect();

        let mut template =
            Template::new(self.text, tokens).map_err(|e| invalid(e.to_string()))?;
        if !self.fh_args.is_null() || self.set_fh_args {
            template.set_extra_args(self.fh_args, self.set_fh_args)?;
        }
        template.synthesize()?;

        if let Some(errors) = self.grammar_errors {
            let base = template.source_text();
            if let Some(bad) = errors.iter().find(|e| !e.fits(base)) {
                return Err(invalid(format!(
                    "grammar-error span {}..{} does not fit source text",
                    bad.offset,
                    bad.offset + bad.length
                )));
            }
            template.set_grammar_errors(errors);
        }

        debug!(
            tokens = template.tokens().len(),
            "ingested tokenizer response"
        );
        Ok(template)
    }
}

impl RenderResponse {
    /// Apply this response to the template it was rendered for.
    ///
    /// `requested_revision` is the template revision captured when the
    /// render request was issued; stale responses are rejected.
    pub fn apply_to(self, template: &mut Template, requested_revision: u64) -> Result<()> {
        template.apply_render(requested_revision, self.text, self.grammar_errors)
    }
}

fn invalid(reason: String) -> NlgError {
    NlgError::InvalidTokenizerResponse { reason }
}
