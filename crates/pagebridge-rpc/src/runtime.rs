// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The page side of the bridge: the bootstrap runtime and the scripts native
// code posts into the page to drive it.
//
// Every native→page message is a call into `window.<namespace>`:
//
// ```text
// window.pagebridge._receive("<encoded result>");
// window.pagebridge._evaluate(3, () => (<expression>));
// ```
//
// `extract_received` and `parse_evaluate` invert those two forms. They exist
// for embedders that play the page's part themselves (the headless engine).

use pagebridge_core::config::BridgeConfig;
use pagebridge_core::error::{BridgeError, Result};
use pagebridge_core::types::CallId;
use serde_json::Value;

use crate::serializer::Serializer;

const RUNTIME_TEMPLATE: &str = include_str!("runtime.js");

/// The bootstrap script installing `window.<namespace>` in a document.
pub fn bootstrap_script(config: &BridgeConfig, serializer: &dyn Serializer, post: &str) -> String {
    RUNTIME_TEMPLATE
        .replace("__NAMESPACE__", &config.namespace)
        .replace("__POST__", post)
        .replace("__ENCODE__", serializer.page_encoder())
        .replace("__DECODE__", serializer.page_decoder())
        .replace("__FREEZE__", if config.freeze_runtime { "true" } else { "false" })
}

/// Script delivering one encoded envelope to the runtime.
pub fn receive_script(namespace: &str, encoded: &str) -> String {
    let literal = Value::String(encoded.to_owned()).to_string();
    format!("window.{namespace}._receive({literal});")
}

/// Script evaluating `expression` and posting its result under `id`.
pub fn evaluate_script(namespace: &str, id: CallId, expression: &str) -> String {
    format!("window.{namespace}._evaluate({id}, () => ({expression}));")
}

/// Inverse of [`receive_script`].
pub fn extract_received(namespace: &str, script: &str) -> Option<String> {
    let prefix = format!("window.{namespace}._receive(");
    let literal = script.strip_prefix(&prefix)?.strip_suffix(");")?;
    serde_json::from_str(literal).ok()
}

/// Inverse of [`evaluate_script`]: the call id and the expression.
pub fn parse_evaluate(namespace: &str, script: &str) -> Option<(CallId, String)> {
    let prefix = format!("window.{namespace}._evaluate(");
    let rest = script.strip_prefix(&prefix)?.strip_suffix("));")?;
    let (id, expression) = rest.split_once(", () => (")?;
    Some((CallId(id.parse().ok()?), expression.to_owned()))
}

/// Substitute encoded `args` into the `{}` placeholders of `template`.
///
/// `{{` and `}}` produce literal braces; any other brace is copied through.
/// The placeholder count must equal the argument count.
pub fn format_expression(
    serializer: &dyn Serializer,
    template: &str,
    args: &[Value],
) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut args_iter = args.iter();
    let mut placeholders = 0;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('{', Some('{')) => {
                chars.next();
                out.push('{');
            }
            ('}', Some('}')) => {
                chars.next();
                out.push('}');
            }
            ('{', Some('}')) => {
                chars.next();
                placeholders += 1;
                if let Some(arg) = args_iter.next() {
                    out.push_str(&serializer.encode_value(arg)?);
                }
            }
            _ => out.push(c),
        }
    }

    if placeholders != args.len() {
        return Err(BridgeError::TemplateArity {
            expected: placeholders,
            actual: args.len(),
        });
    }
    Ok(out)
}
