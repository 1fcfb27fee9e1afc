//! nlg-templates: template synthesis for natural-language narratives.
//!
//! The engine converts a sentence containing marked, replaceable spans
//! (tokens) into parameterized template source, and produces an annotated
//! preview of the sentence with tokens and grammar errors highlighted:
//! - Token fragments: candidate selection, chained grammatical inflections,
//!   optional variable binding, ignore/restore
//! - Sentence synthesis: span-based placeholder substitution, variable
//!   declarations, conditional wrapping, extra-args preamble
//! - Preview annotation: single-pass span markup with a deterministic
//!   overlap policy
//! - Narrative: an ordered template collection with a serde save/load
//!   configuration that round-trips byte-identical assembled text
//! - Boundary types for the external tokenizer and renderer services
//!
//! The engine generates template source; it never executes it. Tokenizing
//! raw text and rendering templates against data belong to external
//! services, ingested through [`boundary`].
//!
//! # Example
//!
//! ```
//! use nlg_templates::{Candidate, Template, Token};
//!
//! let token = Token::new("X", vec![Candidate::new("df.growth", true)], vec![])?;
//! let mut template = Template::new("Sales grew by X.", vec![token])?;
//! template.synthesize()?;
//! assert_eq!(template.assembled(), "Sales grew by {{ df.growth }}.");
//!
//! template.bind_variable("X", "g")?;
//! assert_eq!(
//!     template.assembled(),
//!     "{% set g = df.growth %}\nSales grew by {{ g }}."
//! );
//! # Ok::<(), nlg_templates::NlgError>(())
//! ```

pub mod boundary;
pub mod catalog;
pub mod emit;
pub mod error;
pub mod highlight;
pub mod narrative;
pub mod template;
pub mod token;

// Re-export commonly used types
pub use boundary::{RenderResponse, TokenPayload, TokenizerResponse};
pub use catalog::{GrammarCatalog, Inflection};
pub use error::{NlgError, Result};
pub use highlight::GrammarError;
pub use narrative::{Narrative, NarrativeConfig, TemplateConfig};
pub use template::Template;
pub use token::{Candidate, Token};
