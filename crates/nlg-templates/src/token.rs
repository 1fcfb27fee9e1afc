//! Token - one replaceable span of a sentence.
//!
//! A token owns its substitution candidates (exactly one enabled at a time)
//! and the inflection chain applied to the enabled candidate. Tokens carry no
//! back-pointer to their template; re-synthesis is owned by [`Template`],
//! which exposes placeholder-addressed editing operations.
//!
//! [`Template`]: crate::template::Template

use serde::{Deserialize, Serialize};

use crate::catalog::{GrammarCatalog, Inflection};
use crate::emit;
use crate::error::{NlgError, Result};

/// One concrete substitution option for a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// The expression text this candidate substitutes.
    #[serde(rename = "tmpl")]
    pub text: String,
    /// Whether this candidate is the active selection.
    #[serde(default)]
    pub enabled: bool,
}

impl Candidate {
    /// Build a candidate.
    pub fn new(text: impl Into<String>, enabled: bool) -> Self {
        Self {
            text: text.into(),
            enabled,
        }
    }
}

/// A marked, replaceable span within a sentence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The literal substring this token replaces in the source text.
    #[serde(rename = "text")]
    placeholder: String,
    /// Substitution options; exactly one is enabled at all times.
    #[serde(rename = "tokenlist")]
    candidates: Vec<Candidate>,
    /// Grammatical transformations chained in list order.
    #[serde(default)]
    inflections: Vec<Inflection>,
    /// If set, the token's value is extracted into this named variable
    /// instead of being interpolated inline.
    #[serde(rename = "varname", default)]
    bound_variable: Option<String>,
    /// If true, the token contributes its raw placeholder text verbatim.
    #[serde(default)]
    ignored: bool,
    /// Cached result of the last fragment build.
    #[serde(rename = "template", default)]
    fragment: String,
}

impl Token {
    /// Build a token, enforcing the exactly-one-enabled invariant.
    pub fn new(
        placeholder: impl Into<String>,
        candidates: Vec<Candidate>,
        inflections: Vec<Inflection>,
    ) -> Result<Self> {
        let token = Self {
            placeholder: placeholder.into(),
            candidates,
            inflections,
            bound_variable: None,
            ignored: false,
            fragment: String::new(),
        };
        token.enabled_candidate()?;
        Ok(token)
    }

    /// The placeholder text this token replaces.
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// The substitution candidates.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// The inflection chain.
    pub fn inflections(&self) -> &[Inflection] {
        &self.inflections
    }

    /// The bound variable name, if any.
    pub fn bound_variable(&self) -> Option<&str> {
        self.bound_variable.as_deref()
    }

    /// Whether the token is ignored.
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// The fragment cached by the last [`build_fragment`](Self::build_fragment).
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// The currently enabled candidate.
    ///
    /// Fails fast with `InvariantViolation` if zero or more than one
    /// candidate is enabled, rather than silently picking one.
    pub fn enabled_candidate(&self) -> Result<&Candidate> {
        let enabled: Vec<&Candidate> = self.candidates.iter().filter(|c| c.enabled).collect();
        match enabled.as_slice() {
            [candidate] => Ok(candidate),
            _ => Err(NlgError::InvariantViolation {
                placeholder: self.placeholder.clone(),
                enabled: enabled.len(),
            }),
        }
    }

    /// Enable the candidate whose text equals `text`, disabling all others.
    pub fn select_candidate(&mut self, text: &str) -> Result<()> {
        if !self.candidates.iter().any(|c| c.text == text) {
            return Err(NlgError::NoSuchCandidate {
                placeholder: self.placeholder.clone(),
                text: text.to_string(),
            });
        }
        for candidate in &mut self.candidates {
            candidate.enabled = candidate.text == text;
        }
        Ok(())
    }

    /// Replace the inflection chain wholesale.
    pub fn set_inflections(&mut self, inflections: Vec<Inflection>) {
        self.inflections = inflections;
    }

    /// Replace the inflection chain with features resolved from a catalog,
    /// in the order supplied.
    pub fn apply_features<S: AsRef<str>>(
        &mut self,
        catalog: &GrammarCatalog,
        features: &[S],
    ) -> Result<()> {
        self.inflections = catalog.resolve(features)?;
        Ok(())
    }

    /// Bind the token's value to a named variable.
    ///
    /// A no-op if `name` is empty or a binding already exists: the first
    /// bound name wins, and re-binding requires an explicit unbind first.
    /// Returns whether the binding was applied.
    pub fn bind_variable(&mut self, name: &str) -> bool {
        if name.is_empty() || self.bound_variable.is_some() {
            return false;
        }
        self.bound_variable = Some(name.to_string());
        true
    }

    /// Clear the variable binding.
    pub fn unbind_variable(&mut self) {
        self.bound_variable = None;
    }

    /// Toggle whether the token contributes its raw placeholder text.
    pub fn set_ignored(&mut self, ignored: bool) {
        self.ignored = ignored;
    }

    /// The enabled candidate's text run through the inflection chain, with
    /// no interpolation delimiters.
    pub fn chained_expression(&self) -> Result<String> {
        let mut expr = self.enabled_candidate()?.text.clone();
        for inflection in &self.inflections {
            expr = emit::inflection_call(&expr, inflection);
        }
        Ok(expr)
    }

    /// Build this token's template fragment and cache it.
    ///
    /// Ignored tokens yield the literal placeholder. Bound tokens yield the
    /// bare chained expression (it is referenced by name elsewhere);
    /// otherwise the expression is wrapped in interpolation delimiters.
    pub fn build_fragment(&mut self) -> Result<String> {
        let fragment = if self.ignored {
            self.placeholder.clone()
        } else {
            let expr = self.chained_expression()?;
            if self.bound_variable.is_some() {
                expr
            } else {
                emit::interpolate(&expr)
            }
        };
        self.fragment = fragment.clone();
        Ok(fragment)
    }
}
