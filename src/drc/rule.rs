//! Rule model and rule file parsing
//!
//! A rule file is a sequence of s-expressions:
//!
//! ```text
//! (version 1)
//! (rule "clearance-power"
//!     (layer outer)
//!     (condition "A.NetClass == 'Power'")
//!     (constraint clearance (min 0.5mm)))
//! ```
//!
//! Parsing yields [`Rule`]s in declaration order; ordering by specificity is
//! done by the compiler.

use super::condition::{parse_length, Condition};
use super::error::ParseError;
use super::sexpr::{parse_sexprs, SExp};
use super::types::{Constraint, ConstraintOrigin, ConstraintType, MinOptMax};
use crate::board::{DisallowKind, Layer, LayerSet};

/// Highest rule language version this parser understands
pub const RULES_VERSION: u32 = 1;

/// Index of a rule in its [`RuleSet`](super::compiler::RuleSet) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub usize);

/// A parsed rule; immutable once compiled
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub layer_mask: LayerSet,
    pub condition: Option<Condition>,
    pub constraints: Vec<Constraint>,
    /// Position among the rules of the same origin, in source order
    pub declaration: usize,
    pub origin: ConstraintOrigin,
}

impl Rule {
    pub fn new(name: &str, declaration: usize, origin: ConstraintOrigin) -> Self {
        Self {
            name: name.to_string(),
            layer_mask: LayerSet::all(),
            condition: None,
            constraints: Vec::new(),
            declaration,
            origin,
        }
    }

    /// Number of predicates in the condition; unconditional rules score zero
    pub fn priority(&self) -> u32 {
        self.condition.as_ref().map_or(0, |c| c.predicate_count())
    }

    /// Ordering key: more predicates first, then narrower layer mask,
    /// then later declaration
    pub fn specificity_key(&self) -> (std::cmp::Reverse<u32>, u32, std::cmp::Reverse<usize>) {
        (
            std::cmp::Reverse(self.priority()),
            self.layer_mask.count(),
            std::cmp::Reverse(self.declaration),
        )
    }

    pub fn constraint(&self, kind: ConstraintType) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.kind == kind)
    }
}

/// Parse rule file text into rules, in declaration order
pub fn parse_rules(text: &str) -> Result<Vec<Rule>, ParseError> {
    let mut rules = Vec::new();
    for node in parse_sexprs(text)? {
        match node.head() {
            Some("version") => parse_version(&node)?,
            Some("rule") => {
                let rule = parse_rule(&node, rules.len())?;
                rules.push(rule);
            }
            Some(other) => {
                return Err(node.error(format!("unexpected '{}', expected 'rule' or 'version'", other)))
            }
            None => return Err(node.error("expected '(rule ...)' or '(version ...)'")),
        }
    }
    Ok(rules)
}

fn list_items<'a>(node: &'a SExp) -> &'a [SExp] {
    node.as_list().unwrap_or(&[])
}

fn parse_version(node: &SExp) -> Result<(), ParseError> {
    let items = list_items(node);
    let Some(arg) = items.get(1) else {
        return Err(node.error("missing version number"));
    };
    let version: u32 = arg
        .as_atom()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| arg.error("version must be a number"))?;
    if version > RULES_VERSION {
        return Err(arg.error(format!("unsupported rules version {}", version)));
    }
    Ok(())
}

fn parse_rule(node: &SExp, declaration: usize) -> Result<Rule, ParseError> {
    let items = list_items(node);
    let name = items
        .get(1)
        .and_then(|n| n.as_text())
        .ok_or_else(|| node.error("rule is missing a name"))?;
    let mut rule = Rule::new(name, declaration, ConstraintOrigin::Authored);
    let mut has_layer = false;

    for clause in &items[2..] {
        match clause.head() {
            Some("layer") => {
                if has_layer {
                    return Err(clause.error("duplicate layer clause"));
                }
                rule.layer_mask = parse_layer(clause)?;
                has_layer = true;
            }
            Some("condition") => {
                if rule.condition.is_some() {
                    return Err(clause.error("duplicate condition clause"));
                }
                rule.condition = Some(parse_condition(clause)?);
            }
            Some("constraint") => {
                let constraint = parse_constraint(clause, name)?;
                if rule.constraint(constraint.kind).is_some() {
                    return Err(clause.error(format!("duplicate {} constraint", constraint.kind)));
                }
                rule.constraints.push(constraint);
            }
            Some(other) => return Err(clause.error(format!("unknown rule clause '{}'", other))),
            None => return Err(clause.error("expected a rule clause")),
        }
    }

    if rule.constraints.is_empty() {
        return Err(node.error(format!("rule '{}' has no constraints", name)));
    }
    Ok(rule)
}

fn parse_layer(clause: &SExp) -> Result<LayerSet, ParseError> {
    let items = list_items(clause);
    let Some(arg) = items.get(1) else {
        return Err(clause.error("missing layer name"));
    };
    if items.len() > 2 {
        return Err(items[2].error("layer clause takes a single layer"));
    }
    let text = arg.as_text().ok_or_else(|| arg.error("expected a layer name"))?;
    match text {
        "outer" => Ok(LayerSet::outer_copper()),
        "inner" => Ok(LayerSet::inner_copper()),
        "*.Cu" | "copper" => Ok(LayerSet::all_copper()),
        name => Layer::from_name(name)
            .map(|l| LayerSet::empty().with(l))
            .ok_or_else(|| arg.error(format!("unknown layer '{}'", name))),
    }
}

fn parse_condition(clause: &SExp) -> Result<Condition, ParseError> {
    let items = list_items(clause);
    match items.get(1) {
        Some(SExp::Str { text, line, column }) if items.len() == 2 => {
            // Expression offsets start after the opening quote
            Condition::parse(text, *line, column + 1)
        }
        Some(other) => Err(other.error("condition must be a single quoted expression")),
        None => Err(clause.error("missing condition expression")),
    }
}

fn parse_constraint(clause: &SExp, rule_name: &str) -> Result<Constraint, ParseError> {
    let items = list_items(clause);
    let Some(type_node) = items.get(1) else {
        return Err(clause.error("missing constraint type"));
    };
    let keyword = type_node.as_atom().ok_or_else(|| type_node.error("expected a constraint type"))?;
    let kind = ConstraintType::from_keyword(keyword)
        .ok_or_else(|| type_node.error(format!("unknown constraint type '{}'", keyword)))?;

    let mut constraint = Constraint::new(kind, MinOptMax::default(), rule_name);

    if kind == ConstraintType::Keepout {
        for arg in &items[2..] {
            let word = arg.as_atom().ok_or_else(|| arg.error("expected an item type"))?;
            let disallow = DisallowKind::from_keyword(word)
                .ok_or_else(|| arg.error(format!("unknown item type '{}'", word)))?;
            constraint.disallow = constraint.disallow.with(disallow);
        }
    } else {
        for arg in &items[2..] {
            let bound = arg.head().ok_or_else(|| arg.error("expected (min|opt|max value)"))?;
            let args = list_items(arg);
            let value_node = match args {
                [_, value] => value,
                _ => return Err(arg.error(format!("'{}' takes exactly one value", bound))),
            };
            let value = value_node
                .as_text()
                .and_then(parse_length)
                .ok_or_else(|| value_node.error("expected a length such as 0.2mm"))?;
            let slot = match bound {
                "min" => &mut constraint.value.min,
                "opt" => &mut constraint.value.opt,
                "max" => &mut constraint.value.max,
                other => return Err(arg.error(format!("unknown constraint bound '{}'", other))),
            };
            if slot.is_some() {
                return Err(arg.error(format!("duplicate '{}' value", bound)));
            }
            *slot = Some(value);
        }
    }

    constraint.validate().map_err(|message| clause.error(message))?;
    Ok(constraint)
}
