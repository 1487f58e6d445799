//! Parse the reference and literal mini-syntax found inside attribute values using PEST.

use crate::reference::{Deref, RefMode, Scope};
use crate::registry::ExternalRef;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct RefParser;

/// Parse a scoped dereference operand such as `$a.b#` or `%?c`.
pub fn parse_deref(source: &str) -> Result<Deref, String> {
    let pairs = RefParser::parse(Rule::deref, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;

    let mut scope = None;
    let mut modes = Vec::new();
    let mut path = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::sibling_scope => scope = Some(Scope::Sibling),
            Rule::interface_scope => scope = Some(Scope::Interface),
            Rule::size_mode => modes.push(RefMode::Size),
            Rule::exists_mode => modes.push(RefMode::Exists),
            Rule::path => path = inner.as_str().to_string(),
            _ => {}
        }
    }
    let scope = scope.ok_or("deref: missing scope")?;
    Ok(Deref {
        scope,
        mode: single_mode(&modes)?,
        path,
    })
}

/// Parse a scope-less member path with an optional size/exists modifier.
pub fn parse_ref_path(source: &str) -> Result<(RefMode, String), String> {
    let pairs = RefParser::parse(Rule::ref_path, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;

    let mut modes = Vec::new();
    let mut path = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::size_mode => modes.push(RefMode::Size),
            Rule::exists_mode => modes.push(RefMode::Exists),
            Rule::path => path = inner.as_str().to_string(),
            _ => {}
        }
    }
    Ok((single_mode(&modes)?, path))
}

/// Parse a dot-qualified external name, optionally prefixed with `@Schema.`.
pub fn parse_external_ref(source: &str) -> Result<ExternalRef, String> {
    let pairs = RefParser::parse(Rule::external_ref, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;

    let mut schema = None;
    let mut path = String::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::schema_prefix => {
                let name = inner.into_inner().next().ok_or("schema prefix: name")?;
                schema = Some(name.as_str().to_string());
            }
            Rule::path => path = inner.as_str().to_string(),
            _ => {}
        }
    }
    Ok(ExternalRef { schema, path })
}

/// Parse a `[min, max]` literal into its two trimmed bounds.
pub fn parse_range(source: &str) -> Result<(String, String), String> {
    let pairs = RefParser::parse(Rule::range, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    let mut bounds = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::range_bound)
        .map(|p| p.as_str().to_string());
    let min = bounds.next().ok_or("range: min")?;
    let max = bounds.next().ok_or("range: max")?;
    Ok((min, max))
}

fn single_mode(modes: &[RefMode]) -> Result<RefMode, String> {
    match modes {
        [] => Ok(RefMode::Value),
        [m] => Ok(*m),
        _ => Err("only one of size (#) or exists (?) modifier is allowed".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deref_forms() {
        let d = parse_deref("$a.b").expect("parse");
        assert_eq!(d.scope, Scope::Sibling);
        assert_eq!(d.mode, RefMode::Value);
        assert_eq!(d.path, "a.b");

        let d = parse_deref("$a.b#").expect("parse");
        assert_eq!(d.mode, RefMode::Size);
        assert_eq!(d.path, "a.b");

        let d = parse_deref("%?flags").expect("parse");
        assert_eq!(d.scope, Scope::Interface);
        assert_eq!(d.mode, RefMode::Exists);
    }

    #[test]
    fn deref_rejects_garbage() {
        assert!(parse_deref("a.b").is_err());
        assert!(parse_deref("$").is_err());
        assert!(parse_deref("$a..b").is_err());
        assert!(parse_deref("$#a#").is_err());
        assert!(parse_deref("$ a").is_err());
    }

    #[test]
    fn member_path_modes() {
        assert_eq!(
            parse_ref_path("#a.b").expect("parse"),
            (RefMode::Size, "a.b".to_string())
        );
        assert_eq!(
            parse_ref_path("a?").expect("parse"),
            (RefMode::Exists, "a".to_string())
        );
    }

    #[test]
    fn external_ref_with_schema() {
        let r = parse_external_ref("@Other.ns.Field").expect("parse");
        assert_eq!(r.schema.as_deref(), Some("Other"));
        assert_eq!(r.path, "ns.Field");

        let r = parse_external_ref("ns.Field").expect("parse");
        assert_eq!(r.schema, None);
        assert!(parse_external_ref("ns.").is_err());
        assert!(parse_external_ref("1abc").is_err());
    }

    #[test]
    fn range_literal() {
        assert_eq!(
            parse_range("[ -5, 0x10 ]").expect("parse"),
            ("-5".to_string(), "0x10".to_string())
        );
        assert!(parse_range("[1 2]").is_err());
        assert!(parse_range("1, 2").is_err());
    }
}
