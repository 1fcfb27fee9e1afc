//! Emission helpers for the target template language.
//!
//! The engine only *generates* template source; it never executes it. The
//! surface emitted here must match the downstream renderer exactly:
//!
//! - Interpolation: `{{ <expr> }}`
//! - Variable declaration: `{% set <name> = <expr> %}`
//! - Conditional block: `{% if <cond> %} ... {% end %}`

use serde_json::Value;

use crate::catalog::Inflection;

/// Wrap an expression in interpolation delimiters.
pub fn interpolate(expr: &str) -> String {
    format!("{{{{ {} }}}}", expr)
}

/// Build a variable-declaration statement.
pub fn set_statement(name: &str, expr: &str) -> String {
    format!("{{% set {} = {} %}}", name, expr)
}

/// Wrap a template body in a conditional block with an explicit terminator.
pub fn condition_block(condition: &str, body: &str) -> String {
    format!("{{% if {} %}}\n{}\n{{% end %}}", condition, body)
}

/// Rewrite an expression through one inflection.
///
/// `source == "str"` means a method-style call appended to the expression;
/// anything else is a function-style call on the source module. Chaining is
/// the caller's job: later inflections wrap the result of earlier ones.
pub fn inflection_call(expr: &str, inflection: &Inflection) -> String {
    if inflection.source == "str" {
        format!("{}.{}()", expr, inflection.func_name)
    } else {
        format!("{}.{}({})", inflection.source, inflection.func_name, expr)
    }
}

/// Build the two-line extra-args preamble.
///
/// The first line declares the extra-args value as a JSON literal; the second
/// declares the filtered data value. `U.grmfilter` is referenced symbolically
/// only - the engine never calls it.
pub fn extra_args_setter(extra_args: &Value) -> String {
    let mut preamble = format!("{{% set fh_args = {} %}}\n", extra_args);
    preamble.push_str("{% set df = U.grmfilter(orgdf, fh_args.copy()) %}\n");
    preamble
}

/// Escape arbitrary literal text into a safe regular-expression pattern.
pub fn escape_literal(text: &str) -> String {
    regex::escape(text)
}
