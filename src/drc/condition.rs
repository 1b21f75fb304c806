//! Rule condition expressions
//!
//! A condition such as `A.NetClass == 'Power' && L == 'F.Cu'` is parsed once,
//! when rules are compiled, into an [`Expr`] tree. Evaluation is a pure
//! function of the two items and the optional query layer and never fails:
//! anything that cannot be resolved evaluates to [`Value::Undefined`], and an
//! undefined condition does not match.

use super::error::ParseError;
use super::settings::DesignSettings;
use crate::board::{BoardItem, ItemGeometry, Layer, ViaType, DEFAULT_NET_CLASS};

/// Which side of the queried pair a property refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Type,
    NetClass,
    NetName,
    Layer,
    Reference,
    Width,
    Drill,
    Diameter,
}

impl Property {
    fn from_name(name: &str) -> Option<Property> {
        let prop = match name.to_ascii_lowercase().as_str() {
            "type" => Property::Type,
            "netclass" => Property::NetClass,
            "netname" => Property::NetName,
            "layer" => Property::Layer,
            "reference" => Property::Reference,
            "width" => Property::Width,
            "drill" | "hole" => Property::Drill,
            "diameter" | "size" => Property::Diameter,
            _ => return None,
        };
        Some(prop)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    ExistsOnLayer(Layer),
    IsPlated,
    IsMicroVia,
    Var(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Parsed condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Bool(bool),
    Num(f64),
    Str(String),
    /// `L`: the layer the query is made for
    QueryLayer,
    Property(ItemRef, Property),
    Method(ItemRef, Method),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
}

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Bool(bool),
    Num(f64),
    Str(String),
}

/// Items and layer a condition is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub a: &'a BoardItem,
    pub b: Option<&'a BoardItem>,
    pub layer: Option<Layer>,
    /// When set, net classes it does not define read as the default class
    pub settings: Option<&'a DesignSettings>,
}

impl<'a> EvalContext<'a> {
    fn item(&self, which: ItemRef) -> Option<&'a BoardItem> {
        match which {
            ItemRef::A => Some(self.a),
            ItemRef::B => self.b,
        }
    }
}

impl Expr {
    /// Number of leaf predicates; the specificity measure for rule ordering
    pub fn predicate_count(&self) -> u32 {
        match self {
            Expr::And(l, r) | Expr::Or(l, r) => l.predicate_count() + r.predicate_count(),
            Expr::Not(e) => e.predicate_count(),
            Expr::Bool(_) | Expr::Num(_) | Expr::Str(_) => 0,
            Expr::QueryLayer
            | Expr::Property(..)
            | Expr::Method(..)
            | Expr::Compare(..)
            | Expr::In(..) => 1,
        }
    }

    /// Net class names compared against literally (`A.NetClass == 'X'`)
    pub fn referenced_net_classes(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_net_classes(&mut names);
        names
    }

    fn collect_net_classes(&self, out: &mut Vec<String>) {
        let is_net_class = |e: &Expr| matches!(e, Expr::Property(_, Property::NetClass));
        match self {
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_net_classes(out);
                r.collect_net_classes(out);
            }
            Expr::Not(e) => e.collect_net_classes(out),
            Expr::Compare(CmpOp::Eq | CmpOp::Ne, l, r) => match (l.as_ref(), r.as_ref()) {
                (p, Expr::Str(s)) | (Expr::Str(s), p) if is_net_class(p) => out.push(s.clone()),
                _ => {}
            },
            Expr::In(l, list) if is_net_class(l.as_ref()) => {
                out.extend(list.iter().filter_map(|e| match e {
                    Expr::Str(s) => Some(s.clone()),
                    _ => None,
                }));
            }
            _ => {}
        }
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Value {
        match self {
            Expr::Bool(b) => Value::Bool(*b),
            Expr::Num(n) => Value::Num(*n),
            Expr::Str(s) => Value::Str(s.clone()),
            Expr::QueryLayer => match ctx.layer {
                Some(layer) => Value::Str(layer.name().to_string()),
                None => Value::Undefined,
            },
            Expr::Property(which, prop) => match ctx.item(*which) {
                Some(item) => property_value(item, *prop, ctx.settings),
                None => Value::Undefined,
            },
            Expr::Method(which, method) => match ctx.item(*which) {
                Some(item) => method_value(item, method),
                None => Value::Undefined,
            },
            Expr::Not(e) => match e.evaluate(ctx) {
                Value::Bool(b) => Value::Bool(!b),
                _ => Value::Undefined,
            },
            Expr::And(l, r) => match (l.evaluate(ctx), r.evaluate(ctx)) {
                (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
                (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
                _ => Value::Undefined,
            },
            Expr::Or(l, r) => match (l.evaluate(ctx), r.evaluate(ctx)) {
                (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
                (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
                _ => Value::Undefined,
            },
            Expr::Compare(op, l, r) => compare(*op, &l.evaluate(ctx), &r.evaluate(ctx)),
            Expr::In(l, list) => {
                let needle = l.evaluate(ctx);
                if needle == Value::Undefined {
                    return Value::Undefined;
                }
                let found = list
                    .iter()
                    .any(|e| compare(CmpOp::Eq, &needle, &e.evaluate(ctx)) == Value::Bool(true));
                Value::Bool(found)
            }
        }
    }
}

fn property_value(item: &BoardItem, prop: Property, settings: Option<&DesignSettings>) -> Value {
    let num = |v: Option<f64>| v.map(Value::Num).unwrap_or(Value::Undefined);
    match prop {
        Property::Type => Value::Str(item.kind().type_name().to_string()),
        Property::NetClass => {
            let name = item.net_class_name();
            match settings {
                Some(s) if !s.has_net_class(name) => Value::Str(DEFAULT_NET_CLASS.to_string()),
                _ => Value::Str(name.to_string()),
            }
        }
        Property::NetName => match &item.net {
            Some(net) => Value::Str(net.clone()),
            None => Value::Undefined,
        },
        Property::Layer => match item.layer() {
            Some(layer) => Value::Str(layer.name().to_string()),
            None => Value::Undefined,
        },
        Property::Reference => match &item.footprint {
            Some(reference) => Value::Str(reference.clone()),
            None => Value::Undefined,
        },
        Property::Width => num(item.width()),
        Property::Drill => num(item.drill()),
        Property::Diameter => num(item.diameter()),
    }
}

fn method_value(item: &BoardItem, method: &Method) -> Value {
    match method {
        Method::ExistsOnLayer(layer) => Value::Bool(item.layers.contains(*layer)),
        Method::IsPlated => Value::Bool(item.is_plated()),
        Method::IsMicroVia => Value::Bool(matches!(
            item.geometry,
            ItemGeometry::Via { via_type: ViaType::Micro, .. }
        )),
        Method::Var(name) => match item.variables.get(name) {
            Some(value) => Value::Str(value.clone()),
            None => {
                tracing::trace!("Item {} has no text variable '{}'", item.id, name);
                Value::Undefined
            }
        },
    }
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> Value {
    match (l, r) {
        (Value::Num(a), Value::Num(b)) => {
            let eq = (a - b).abs() < 1e-9;
            Value::Bool(match op {
                CmpOp::Eq => eq,
                CmpOp::Ne => !eq,
                CmpOp::Lt => a < b && !eq,
                CmpOp::Le => a < b || eq,
                CmpOp::Gt => a > b && !eq,
                CmpOp::Ge => a > b || eq,
            })
        }
        (Value::Str(a), Value::Str(b)) => {
            let eq = wildcard_match(b, a) || wildcard_match(a, b);
            match op {
                CmpOp::Eq => Value::Bool(eq),
                CmpOp::Ne => Value::Bool(!eq),
                _ => Value::Undefined,
            }
        }
        (Value::Bool(a), Value::Bool(b)) => match op {
            CmpOp::Eq => Value::Bool(a == b),
            CmpOp::Ne => Value::Bool(a != b),
            _ => Value::Undefined,
        },
        _ => Value::Undefined,
    }
}

/// Case-insensitive match of `text` against `pattern` with `*` and `?`
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let t: Vec<char> = text.to_lowercase().chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

// ---------------------------------------------------------------------------
// Lexer

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(f64),
    Dot,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Op(&'static str),
}

/// Parse a length with an optional unit suffix into millimetres
pub fn parse_length(text: &str) -> Option<f64> {
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number.parse().ok()?;
    let scale = match unit.to_ascii_lowercase().as_str() {
        "" | "mm" => 1.0,
        "mil" | "mils" | "th" => 0.0254,
        "in" | "\"" => 25.4,
        "um" => 0.001,
        _ => return None,
    };
    Some(value * scale)
}

fn tokenize(text: &str) -> Result<Vec<(Tok, usize)>, (usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let tok = match two.as_str() {
            "==" | "!=" | "<=" | ">=" | "&&" | "||" => {
                i += 2;
                Tok::Op(match two.as_str() {
                    "==" => "==",
                    "!=" => "!=",
                    "<=" => "<=",
                    ">=" => ">=",
                    "&&" => "&&",
                    _ => "||",
                })
            }
            _ => {
                i += 1;
                match c {
                    '<' => Tok::Op("<"),
                    '>' => Tok::Op(">"),
                    '!' => Tok::Op("!"),
                    '.' if !chars.get(i).is_some_and(|n| n.is_ascii_digit()) => Tok::Dot,
                    ',' => Tok::Comma,
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    '\'' => {
                        let mut s = String::new();
                        loop {
                            match chars.get(i) {
                                None => return Err((start, "unterminated string".to_string())),
                                Some('\'') => {
                                    i += 1;
                                    break;
                                }
                                Some(ch) => {
                                    s.push(*ch);
                                    i += 1;
                                }
                            }
                        }
                        Tok::Str(s)
                    }
                    c if c.is_ascii_digit() || c == '.' => {
                        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                            i += 1;
                        }
                        let literal: String = chars[start..i].iter().collect();
                        match parse_length(&literal) {
                            Some(v) => Tok::Num(v),
                            None => return Err((start, format!("invalid number '{}'", literal))),
                        }
                    }
                    c if c.is_alphabetic() || c == '_' => {
                        while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                            i += 1;
                        }
                        Tok::Ident(chars[start..i].iter().collect())
                    }
                    other => return Err((start, format!("unexpected character '{}'", other))),
                }
            }
        };
        tokens.push((tok, start));
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser

struct Parser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
    end: usize,
}

type PResult<T> = Result<T, (usize, String)>;

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, o)| *o).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        tok
    }

    fn expect(&mut self, tok: Tok, what: &str) -> PResult<()> {
        let at = self.offset();
        match self.next() {
            Some(t) if t == tok => Ok(()),
            _ => Err((at, format!("expected {}", what))),
        }
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Tok::Op("||")) {
            self.next();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Tok::Op("&&")) {
            self.next();
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.peek() == Some(&Tok::Op("!")) {
            self.next();
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let lhs = self.parse_primary()?;
        if matches!(self.peek(), Some(Tok::Ident(word)) if word == "in") {
            self.next();
            self.expect(Tok::LBrace, "'{' after 'in'")?;
            let mut list = Vec::new();
            if self.peek() != Some(&Tok::RBrace) {
                loop {
                    list.push(self.parse_primary()?);
                    if self.peek() == Some(&Tok::Comma) {
                        self.next();
                    } else {
                        break;
                    }
                }
            }
            self.expect(Tok::RBrace, "'}'")?;
            return Ok(Expr::In(Box::new(lhs), list));
        }
        let op = match self.peek() {
            Some(Tok::Op("==")) => CmpOp::Eq,
            Some(Tok::Op("!=")) => CmpOp::Ne,
            Some(Tok::Op("<")) => CmpOp::Lt,
            Some(Tok::Op("<=")) => CmpOp::Le,
            Some(Tok::Op(">")) => CmpOp::Gt,
            Some(Tok::Op(">=")) => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.next();
        let rhs = self.parse_primary()?;
        Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let at = self.offset();
        match self.next() {
            Some(Tok::LParen) => {
                let e = self.parse_or()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(e)
            }
            Some(Tok::Num(n)) => Ok(Expr::Num(n)),
            Some(Tok::Str(s)) => Ok(Expr::Str(s)),
            Some(Tok::Ident(word)) => match word.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "L" => Ok(Expr::QueryLayer),
                "A" | "B" => {
                    let which = if word == "A" { ItemRef::A } else { ItemRef::B };
                    self.expect(Tok::Dot, "'.' after item reference")?;
                    self.parse_member(which)
                }
                _ => Err((at, format!("unknown identifier '{}'", word))),
            },
            Some(_) => Err((at, "unexpected token".to_string())),
            None => Err((at, "unexpected end of expression".to_string())),
        }
    }

    fn parse_member(&mut self, which: ItemRef) -> PResult<Expr> {
        let at = self.offset();
        let name = match self.next() {
            Some(Tok::Ident(name)) => name,
            _ => return Err((at, "expected property name".to_string())),
        };

        if self.peek() != Some(&Tok::LParen) {
            return Property::from_name(&name)
                .map(|p| Expr::Property(which, p))
                .ok_or((at, format!("unrecognized item property '{}'", name)));
        }

        self.next();
        let arg_at = self.offset();
        let arg = match self.peek().cloned() {
            Some(Tok::Str(s)) => {
                self.next();
                Some(s)
            }
            _ => None,
        };
        self.expect(Tok::RParen, "')'")?;

        let method = match (name.as_str(), arg) {
            ("existsOnLayer", Some(layer_name)) => match Layer::from_name(&layer_name) {
                Some(layer) => Method::ExistsOnLayer(layer),
                None => return Err((arg_at, format!("unrecognized layer '{}'", layer_name))),
            },
            ("isPlated", None) => Method::IsPlated,
            ("isMicroVia", None) => Method::IsMicroVia,
            ("Var" | "getVar", Some(var)) => Method::Var(var),
            ("existsOnLayer" | "Var" | "getVar", None) => {
                return Err((arg_at, format!("{}() expects a string argument", name)))
            }
            ("isPlated" | "isMicroVia", Some(_)) => {
                return Err((arg_at, format!("{}() takes no arguments", name)))
            }
            _ => return Err((at, format!("unrecognized item function '{}'", name))),
        };
        Ok(Expr::Method(which, method))
    }
}

/// A compiled rule condition
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    text: String,
    expr: Expr,
}

impl Condition {
    /// Parse `text`; `line`/`column` locate its first character in the rule file
    pub fn parse(text: &str, line: usize, column: usize) -> Result<Condition, ParseError> {
        let err = |(offset, message): (usize, String)| {
            ParseError::new(line, column + offset, format!("condition: {}", message))
        };
        let tokens = tokenize(text).map_err(err)?;
        if tokens.is_empty() {
            return Err(ParseError::new(line, column, "condition: empty expression"));
        }
        let end = text.chars().count();
        let mut parser = Parser { tokens, pos: 0, end };
        let expr = parser.parse_or().map_err(err)?;
        if parser.pos < parser.tokens.len() {
            return Err(err((parser.offset(), "unexpected trailing input".to_string())));
        }
        Ok(Condition { text: text.to_string(), expr })
    }

    /// Wrap an already built expression; `text` is what traces display
    pub(crate) fn from_expr(text: String, expr: Expr) -> Condition {
        Condition { text, expr }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn predicate_count(&self) -> u32 {
        self.expr.predicate_count()
    }

    /// Evaluate for one ordering of the pair
    pub fn evaluate(&self, a: &BoardItem, b: Option<&BoardItem>, layer: Option<Layer>) -> bool {
        self.evaluate_with(None, a, b, layer)
    }

    fn evaluate_with(
        &self,
        settings: Option<&DesignSettings>,
        a: &BoardItem,
        b: Option<&BoardItem>,
        layer: Option<Layer>,
    ) -> bool {
        let ctx = EvalContext { a, b, layer, settings };
        self.expr.evaluate(&ctx) == Value::Bool(true)
    }

    /// Match the pair in either order
    pub fn matches(&self, a: &BoardItem, b: Option<&BoardItem>, layer: Option<Layer>) -> bool {
        self.matches_with(None, a, b, layer)
    }

    /// Like [`matches`](Self::matches), with net classes missing from
    /// `settings` read as the default class, so comparisons against an
    /// undefined class are false
    pub fn matches_in(
        &self,
        settings: &DesignSettings,
        a: &BoardItem,
        b: Option<&BoardItem>,
        layer: Option<Layer>,
    ) -> bool {
        self.matches_with(Some(settings), a, b, layer)
    }

    fn matches_with(
        &self,
        settings: Option<&DesignSettings>,
        a: &BoardItem,
        b: Option<&BoardItem>,
        layer: Option<Layer>,
    ) -> bool {
        if self.evaluate_with(settings, a, b, layer) {
            return true;
        }
        match b {
            Some(b) => self.evaluate_with(settings, b, Some(a), layer),
            None => false,
        }
    }
}
