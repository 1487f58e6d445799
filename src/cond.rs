//! Boolean conditions over field values.
//!
//! A condition is either a single expression (`$status = 5`, `$len# > 0`, `!$?opt`) or an
//! `and`/`or` list of at least two sub-conditions. Expressions are tokenized on the first
//! unescaped occurrence of the first operator found, trying `!=`, `>=`, `<=`, `=`, `>`, `<`
//! in that order. The left operand is always a dereference.

use std::fmt;

use crate::common;
use crate::context::{Feature, ParseEnv};
use crate::error::{Result, SchemaError};
use crate::field::{Field, Kind};
use crate::reference::{self, Deref, RefDescriptor, RefKind, RefMode, Scope};
use crate::schema::Interface;
use crate::xml::XmlNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Ne,
    Ge,
    Le,
    Eq,
    Gt,
    Lt,
}

impl CmpOp {
    /// Tokenization priority.
    const ORDER: [CmpOp; 6] = [CmpOp::Ne, CmpOp::Ge, CmpOp::Le, CmpOp::Eq, CmpOp::Gt, CmpOp::Lt];

    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Ne => "!=",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
            CmpOp::Eq => "=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(String),
    Deref(Deref),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{}", v),
            Operand::Deref(d) => write!(f, "{}", d),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CondExpr {
    Compare {
        left: Deref,
        op: CmpOp,
        right: Operand,
    },
    /// Bare `$x` or negated `!$x` check.
    Check { negated: bool, operand: Deref },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CondList {
    pub kind: ListKind,
    pub children: Vec<Cond>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Expr(CondExpr),
    List(CondList),
}

fn invalid(loc: &str, text: &str, why: &str) -> SchemaError {
    SchemaError::InvalidCondition(format!("{}: \"{}\": {}", loc, text, why))
}

/// Position of the first occurrence of `pat` not preceded by a backslash.
fn find_unescaped(text: &str, pat: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(off) = text[from..].find(pat) {
        let pos = from + off;
        if pos == 0 || text.as_bytes()[pos - 1] != b'\\' {
            return Some(pos);
        }
        from = pos + pat.len();
    }
    None
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn parse_deref(text: &str, loc: &str, whole: &str) -> Result<Deref> {
    Deref::parse(text).map_err(|_| invalid(loc, whole, "expected a $ or % dereference"))
}

impl CondExpr {
    /// Parse a textual expression; `loc` prefixes error messages.
    pub fn parse(text: &str, loc: &str) -> Result<CondExpr> {
        let text = text.trim();
        if text.is_empty() {
            return Err(invalid(loc, text, "empty condition"));
        }

        let found = CmpOp::ORDER
            .iter()
            .find_map(|op| find_unescaped(text, op.as_str()).map(|pos| (*op, pos)));

        let Some((op, pos)) = found else {
            return match text.strip_prefix('!') {
                Some(rest) => Ok(CondExpr::Check {
                    negated: true,
                    operand: parse_deref(rest.trim(), loc, text)?,
                }),
                None => Ok(CondExpr::Check {
                    negated: false,
                    operand: parse_deref(text, loc, text)?,
                }),
            };
        };

        if pos == 0 {
            return Err(invalid(loc, text, "missing left operand"));
        }
        let left = text[..pos].trim();
        let right = text[pos + op.as_str().len()..].trim();
        if left.is_empty() || right.is_empty() {
            return Err(invalid(loc, text, "both operands are required"));
        }
        if !left.starts_with(['$', '%']) {
            return Err(invalid(loc, text, "left operand must be a dereference"));
        }
        let left = parse_deref(left, loc, text)?;
        let right = if right.starts_with(['$', '%']) {
            Operand::Deref(parse_deref(right, loc, text)?)
        } else {
            Operand::Value(unescape(right))
        };
        Ok(CondExpr::Compare { left, op, right })
    }

    fn derefs(&self) -> Vec<&Deref> {
        match self {
            CondExpr::Compare { left, right, .. } => {
                let mut v = vec![left];
                if let Operand::Deref(d) = right {
                    v.push(d);
                }
                v
            }
            CondExpr::Check { operand, .. } => vec![operand],
        }
    }

    pub fn verify(&self, siblings: &[Field], env: &ParseEnv<'_>, loc: &str) -> Result<()> {
        let text = self.to_string();
        for d in self.derefs() {
            if d.scope == Scope::Interface && !env.ctx.supports(Feature::InterfaceRef) {
                return Err(SchemaError::UnsupportedFeature(format!(
                    "{}: \"{}\": interface references are not supported by DSL version {}",
                    loc, text, env.ctx.dsl_version
                )));
            }
        }

        match self {
            CondExpr::Check { operand, .. } => {
                if operand.mode == RefMode::Exists && !env.ctx.supports(Feature::ExistsCheckInCond) {
                    return Err(SchemaError::UnsupportedFeature(format!(
                        "{}: \"{}\": existence checks are not supported by DSL version {}",
                        loc, text, env.ctx.dsl_version
                    )));
                }
                let matches = resolve_operand(operand, siblings, env.interfaces, loc, &text)?;
                let ok = matches
                    .iter()
                    .any(|m| matches!(m.kind, RefKind::InnerValue | RefKind::Exists));
                if !ok {
                    return Err(invalid(
                        loc,
                        &text,
                        "a check must reference an inner value or use the ? modifier",
                    ));
                }
                Ok(())
            }
            CondExpr::Compare { left, right, .. } => {
                if left.mode == RefMode::Size {
                    if !env.ctx.supports(Feature::SizeCompInCond) {
                        return Err(SchemaError::UnsupportedFeature(format!(
                            "{}: \"{}\": size comparison is not supported by DSL version {}",
                            loc, text, env.ctx.dsl_version
                        )));
                    }
                    resolve_operand(left, siblings, env.interfaces, loc, &text)?;
                    return match right {
                        Operand::Value(v) if common::parse_i128(v).is_some() => Ok(()),
                        _ => Err(invalid(loc, &text, "size must be compared to an integer")),
                    };
                }
                if left.mode == RefMode::Exists {
                    return Err(invalid(loc, &text, "existence check cannot be compared"));
                }

                let lefts: Vec<_> = resolve_operand(left, siblings, env.interfaces, loc, &text)?
                    .into_iter()
                    .filter(|m| m.kind == RefKind::Field)
                    .collect();
                if lefts.is_empty() {
                    return Err(invalid(loc, &text, "left operand must reference a field"));
                }

                let comparable = match right {
                    Operand::Deref(r) => {
                        let rights: Vec<_> = resolve_operand(r, siblings, env.interfaces, loc, &text)?
                            .into_iter()
                            .filter(|m| m.kind == RefKind::Field)
                            .collect();
                        lefts.iter().any(|l| {
                            rights.iter().any(|r| match (l.field, r.field) {
                                (Some(lf), Some(rf)) => lf.is_comparable_to_field(rf),
                                _ => false,
                            })
                        })
                    }
                    Operand::Value(v) => lefts
                        .iter()
                        .filter_map(|l| l.field)
                        .any(|f| value_comparable(f, v, env)),
                };
                if !comparable {
                    return Err(invalid(loc, &text, "operands are not comparable"));
                }
                Ok(())
            }
        }
    }
}

fn resolve_operand<'a>(
    deref: &Deref,
    siblings: &'a [Field],
    interfaces: &'a [Interface],
    loc: &str,
    text: &str,
) -> Result<Vec<RefDescriptor<'a>>> {
    let matches = reference::resolve_deref(deref, siblings, interfaces);
    if matches.is_empty() {
        return Err(SchemaError::InvalidReference(format!(
            "{}: \"{}\": cannot resolve \"{}\"",
            loc, text, deref
        )));
    }
    Ok(matches)
}

/// Literal comparability, falling back to external value references.
fn value_comparable(field: &Field, value: &str, env: &ParseEnv<'_>) -> bool {
    if field.is_comparable_to_value(value) {
        return true;
    }
    let target = field.dereferenced();
    if let Some(reference) = value.strip_prefix('^') {
        return match target.kind() {
            Kind::String => env.registry.str_to_string(&env.ctx.name, reference).is_some(),
            Kind::Data => env.registry.str_to_data(&env.ctx.name, reference).is_some(),
            _ => false,
        };
    }
    if !common::is_valid_ref_name(value) || !env.ctx.supports(Feature::ValueReference) {
        return false;
    }
    match target.kind() {
        Kind::Int | Kind::Enum => env.registry.str_to_numeric(&env.ctx.name, value).is_some(),
        Kind::Float => env.registry.str_to_fp(&env.ctx.name, value).is_some(),
        Kind::Set => env.registry.str_to_bool(&env.ctx.name, value).is_some(),
        _ => false,
    }
}

impl fmt::Display for CondExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CondExpr::Compare { left, op, right } => write!(f, "{} {} {}", left, op.as_str(), right),
            CondExpr::Check { negated, operand } => {
                write!(f, "{}{}", if *negated { "!" } else { "" }, operand)
            }
        }
    }
}

impl Cond {
    /// Parse `<cond>`, `<and>` or `<or>` element.
    pub fn from_node(node: &XmlNode) -> Result<Cond> {
        match node.name.as_str() {
            "cond" => Ok(Cond::Expr(CondExpr::parse(&node.value()?, &node.loc())?)),
            "and" | "or" => {
                let kind = if node.name == "and" {
                    ListKind::And
                } else {
                    ListKind::Or
                };
                let children = node
                    .children
                    .iter()
                    .map(Cond::from_node)
                    .collect::<Result<Vec<_>>>()?;
                if children.len() < 2 {
                    return Err(invalid(
                        &node.loc(),
                        &node.name,
                        "at least two conditions are required",
                    ));
                }
                Ok(Cond::List(CondList { kind, children }))
            }
            other => Err(invalid(&node.loc(), other, "unexpected condition element")),
        }
    }

    pub fn parse(text: &str, loc: &str) -> Result<Cond> {
        CondExpr::parse(text, loc).map(Cond::Expr)
    }

    /// Check every expression against `siblings` and the interfaces in `env`.
    pub fn verify(&self, siblings: &[Field], env: &ParseEnv<'_>, loc: &str) -> Result<()> {
        match self {
            Cond::Expr(expr) => expr.verify(siblings, env, loc),
            Cond::List(list) => {
                if list.children.len() < 2 {
                    return Err(SchemaError::InvalidCondition(format!(
                        "{}: condition list needs at least two members",
                        loc
                    )));
                }
                list.children
                    .iter()
                    .try_for_each(|c| c.verify(siblings, env, loc))
            }
        }
    }

    pub fn references_interfaces(&self) -> bool {
        match self {
            Cond::Expr(expr) => expr.derefs().iter().any(|d| d.scope == Scope::Interface),
            Cond::List(list) => list.children.iter().any(Cond::references_interfaces),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_priority() {
        let e = CondExpr::parse("$a >= 5", "t").expect("parse");
        assert!(matches!(e, CondExpr::Compare { op: CmpOp::Ge, .. }));
        let e = CondExpr::parse("$a != $b", "t").expect("parse");
        match e {
            CondExpr::Compare { op, right, .. } => {
                assert_eq!(op, CmpOp::Ne);
                assert!(matches!(right, Operand::Deref(_)));
            }
            _ => panic!("expected comparison"),
        }
    }

    #[test]
    fn escaped_operator_is_skipped() {
        let e = CondExpr::parse("$s = a\\=b", "t").expect("parse");
        match e {
            CondExpr::Compare { right, .. } => assert_eq!(right, Operand::Value("a=b".to_string())),
            _ => panic!("expected comparison"),
        }
    }

    #[test]
    fn checks_and_errors() {
        assert!(matches!(
            CondExpr::parse("!$flags.B0", "t").expect("parse"),
            CondExpr::Check { negated: true, .. }
        ));
        assert!(matches!(
            CondExpr::parse("$?opt", "t").expect("parse"),
            CondExpr::Check { negated: false, .. }
        ));
        assert!(CondExpr::parse("= 5", "t").is_err());
        assert!(CondExpr::parse("5 = $a", "t").is_err());
        assert!(CondExpr::parse("$a =", "t").is_err());
        assert!(CondExpr::parse("", "t").is_err());
    }
}
