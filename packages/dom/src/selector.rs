//! # CSS Selectors
//!
//! Parses selector lists and matches them against [`Document`] elements.
//!
//! Supported syntax:
//!
//! - type, universal, `#id`, `.class`
//! - attributes: `[a]`, `[a=v]`, `[a~=v]`, `[a|=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`, with an `i` flag
//! - combinators: descendant, `>`, `+`, `~`
//! - pseudo-classes: `:first-child`, `:last-child`, `:only-child`, `:first-of-type`,
//!   `:last-of-type`, `:nth-child()`, `:nth-last-child()`, `:nth-of-type()`, `:empty`,
//!   `:root`, `:checked`, `:disabled`, `:not()`, `:is()`
//! - selector lists separated by `,`
//!
//! Matching runs right to left: the last compound is tested against the
//! candidate, then combinators walk up or back through the tree.

use crate::document::Document;
use crate::error::SelectorError;
use crate::node::{NodeData, NodeId};

/// Comma separated list of complex selectors
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList(pub Vec<ComplexSelector>);

/// Compound selectors joined by combinators
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSelector {
    pub compounds: Vec<CompoundSelector>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`
    pub combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `a b`
    Descendant,
    /// `a > b`
    Child,
    /// `a + b`
    NextSibling,
    /// `a ~ b`
    SubsequentSibling,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompoundSelector {
    /// `None` for universal / omitted
    pub tag: Option<String>,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeSelector>,
    pub pseudo_classes: Vec<PseudoClass>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSelector {
    pub name: String,
    pub operator: Option<(AttributeOperator, String)>,
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperator {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PseudoClass {
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    NthChild(NthExpression),
    NthLastChild(NthExpression),
    NthOfType(NthExpression),
    Empty,
    Root,
    Checked,
    Disabled,
    Not(SelectorList),
    Is(SelectorList),
}

/// `An+B`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NthExpression {
    pub a: i32,
    pub b: i32,
}

impl NthExpression {
    pub fn parse(input: &str) -> Option<Self> {
        let s: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        match s.as_str() {
            "odd" => return Some(Self { a: 2, b: 1 }),
            "even" => return Some(Self { a: 2, b: 0 }),
            "" => return None,
            _ => {}
        }

        match s.split_once('n') {
            Some((a, b)) => {
                let a = match a {
                    "" | "+" => 1,
                    "-" => -1,
                    other => other.parse().ok()?,
                };
                let b = if b.is_empty() {
                    0
                } else {
                    if !b.starts_with('+') && !b.starts_with('-') {
                        return None;
                    }
                    b.parse().ok()?
                };
                Some(Self { a, b })
            }
            None => Some(Self { a: 0, b: s.parse().ok()? }),
        }
    }

    /// `position` is 1-based
    pub fn matches(&self, position: i32) -> bool {
        if self.a == 0 {
            return position == self.b;
        }
        let diff = position - self.b;
        diff % self.a == 0 && diff / self.a >= 0
    }
}

// ----------------------------------------------------------------------
// Parsing
// ----------------------------------------------------------------------

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut parser = Parser::new(input);
        let list = parser.parse_list()?;
        parser.skip_whitespace();
        if let Some(c) = parser.peek() {
            return Err(parser.error(format!("unexpected '{}'", c)));
        }
        Ok(list)
    }

    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.0.iter().any(|complex| complex.matches(doc, id))
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> SelectorError {
        SelectorError::new(self.pos, message)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<SelectorList, SelectorError> {
        let mut selectors = vec![self.parse_complex()?];
        loop {
            self.skip_whitespace();
            if !self.eat(',') {
                break;
            }
            selectors.push(self.parse_complex()?);
        }
        Ok(SelectorList(selectors))
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        self.skip_whitespace();
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::NextSibling,
                Some('~') => Combinator::SubsequentSibling,
                Some(',') | Some(')') | None => break,
                Some(_) if had_space => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            };
            if combinator != Combinator::Descendant {
                self.bump();
                self.skip_whitespace();
            }
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector, SelectorError> {
        let start = self.pos;
        let mut compound = CompoundSelector::default();

        if self.eat('*') {
            // universal
        } else if self.peek().is_some_and(is_ident_start) {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.ids.push(self.parse_ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attributes.push(self.parse_attribute()?);
                }
                Some(':') => {
                    self.bump();
                    compound.pseudo_classes.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected selector, found '{}'", c)),
                None => self.error("expected selector, found end of input"),
            });
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let mut ident = String::new();
        match self.peek() {
            Some(c) if is_ident_start(c) => {}
            Some('-') => {}
            Some(c) => return Err(self.error(format!("expected identifier, found '{}'", c))),
            None => return Err(self.error("expected identifier, found end of input")),
        }
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                ident.push(self.parse_escape()?);
            } else if is_ident_char(c) {
                self.bump();
                ident.push(c);
            } else {
                break;
            }
        }
        if ident.is_empty() || ident == "-" {
            return Err(self.error("empty identifier"));
        }
        Ok(ident)
    }

    fn parse_escape(&mut self) -> Result<char, SelectorError> {
        let mut hex = String::new();
        while hex.len() < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            hex.push(self.bump().unwrap_or_default());
        }
        if hex.is_empty() {
            return self.bump().ok_or_else(|| self.error("unterminated escape"));
        }
        // A single whitespace terminates a hex escape.
        if self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        let code = u32::from_str_radix(&hex, 16).map_err(|_| self.error("bad escape"))?;
        Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn parse_attribute(&mut self) -> Result<AttributeSelector, SelectorError> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        if self.eat(']') {
            return Ok(AttributeSelector {
                name,
                operator: None,
                case_insensitive: false,
            });
        }

        let operator = match self.bump() {
            Some('=') => AttributeOperator::Equals,
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                if !self.eat('=') {
                    return Err(self.error("expected '='"));
                }
                match c {
                    '~' => AttributeOperator::Includes,
                    '|' => AttributeOperator::DashMatch,
                    '^' => AttributeOperator::Prefix,
                    '$' => AttributeOperator::Suffix,
                    _ => AttributeOperator::Substring,
                }
            }
            _ => return Err(self.error("expected attribute operator")),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                self.parse_string(q)?
            }
            _ => self.parse_ident()?,
        };
        self.skip_whitespace();

        let mut case_insensitive = false;
        if let Some(flag @ ('i' | 'I' | 's' | 'S')) = self.peek() {
            self.bump();
            case_insensitive = flag.eq_ignore_ascii_case(&'i');
            self.skip_whitespace();
        }

        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }

        Ok(AttributeSelector {
            name,
            operator: Some((operator, value)),
            case_insensitive,
        })
    }

    fn parse_string(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => value.push(self.parse_escape()?),
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn parse_pseudo(&mut self) -> Result<PseudoClass, SelectorError> {
        if self.peek() == Some(':') {
            return Err(self.error("pseudo-elements cannot be targeted"));
        }
        let name = self.parse_ident()?.to_ascii_lowercase();

        if !self.eat('(') {
            return match name.as_str() {
                "first-child" => Ok(PseudoClass::FirstChild),
                "last-child" => Ok(PseudoClass::LastChild),
                "only-child" => Ok(PseudoClass::OnlyChild),
                "first-of-type" => Ok(PseudoClass::FirstOfType),
                "last-of-type" => Ok(PseudoClass::LastOfType),
                "empty" => Ok(PseudoClass::Empty),
                "root" => Ok(PseudoClass::Root),
                "checked" => Ok(PseudoClass::Checked),
                "disabled" => Ok(PseudoClass::Disabled),
                other => Err(self.error(format!("unsupported pseudo-class ':{}'", other))),
            };
        }

        let pseudo = match name.as_str() {
            "not" | "is" | "where" => {
                let list = self.parse_list()?;
                if name == "not" {
                    PseudoClass::Not(list)
                } else {
                    PseudoClass::Is(list)
                }
            }
            "nth-child" | "nth-last-child" | "nth-of-type" => {
                let mut arg = String::new();
                while let Some(c) = self.peek() {
                    if c == ')' {
                        break;
                    }
                    arg.push(c);
                    self.bump();
                }
                let expr = NthExpression::parse(&arg)
                    .ok_or_else(|| self.error(format!("invalid An+B expression '{}'", arg.trim())))?;
                match name.as_str() {
                    "nth-child" => PseudoClass::NthChild(expr),
                    "nth-last-child" => PseudoClass::NthLastChild(expr),
                    _ => PseudoClass::NthOfType(expr),
                }
            }
            other => return Err(self.error(format!("unsupported pseudo-class ':{}()'", other))),
        };

        self.skip_whitespace();
        if !self.eat(')') {
            return Err(self.error("expected ')'"));
        }
        Ok(pseudo)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

// ----------------------------------------------------------------------
// Matching
// ----------------------------------------------------------------------

impl ComplexSelector {
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        match self.compounds.len() {
            0 => false,
            n => self.matches_from(doc, n - 1, id),
        }
    }

    fn matches_from(&self, doc: &Document, index: usize, id: NodeId) -> bool {
        if !self.compounds[index].matches(doc, id) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match self.combinators[index - 1] {
            Combinator::Child => doc
                .parent_element(id)
                .is_some_and(|p| self.matches_from(doc, index - 1, p)),
            Combinator::Descendant => {
                let mut current = doc.parent_element(id);
                while let Some(ancestor) = current {
                    if self.matches_from(doc, index - 1, ancestor) {
                        return true;
                    }
                    current = doc.parent_element(ancestor);
                }
                false
            }
            Combinator::NextSibling => doc
                .previous_element_sibling(id)
                .is_some_and(|s| self.matches_from(doc, index - 1, s)),
            Combinator::SubsequentSibling => {
                let mut current = doc.previous_element_sibling(id);
                while let Some(sibling) = current {
                    if self.matches_from(doc, index - 1, sibling) {
                        return true;
                    }
                    current = doc.previous_element_sibling(sibling);
                }
                false
            }
        }
    }
}

impl CompoundSelector {
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(elem) = doc.element(id) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if &elem.tag != tag {
                return false;
            }
        }
        if !self.ids.iter().all(|i| elem.id() == Some(i.as_str())) {
            return false;
        }
        if !self.classes.iter().all(|c| elem.has_class(c)) {
            return false;
        }
        if !self
            .attributes
            .iter()
            .all(|a| a.matches(elem.attr(&a.name)))
        {
            return false;
        }
        self.pseudo_classes.iter().all(|p| p.matches(doc, id))
    }
}

impl AttributeSelector {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let Some((op, expected)) = &self.operator else {
            return true;
        };

        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), expected.to_lowercase())
        } else {
            (actual.to_string(), expected.clone())
        };

        match op {
            AttributeOperator::Equals => actual == expected,
            AttributeOperator::Includes => {
                !expected.is_empty() && actual.split_ascii_whitespace().any(|w| w == expected)
            }
            AttributeOperator::DashMatch => {
                actual == expected || actual.starts_with(&format!("{}-", expected))
            }
            AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttributeOperator::Substring => !expected.is_empty() && actual.contains(&expected),
        }
    }
}

impl PseudoClass {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        match self {
            PseudoClass::FirstChild => position(doc, id, false, false) == 1,
            PseudoClass::LastChild => position(doc, id, true, false) == 1,
            PseudoClass::OnlyChild => doc.element_siblings(id).len() == 1,
            PseudoClass::FirstOfType => position(doc, id, false, true) == 1,
            PseudoClass::LastOfType => position(doc, id, true, true) == 1,
            PseudoClass::NthChild(e) => e.matches(position(doc, id, false, false)),
            PseudoClass::NthLastChild(e) => e.matches(position(doc, id, true, false)),
            PseudoClass::NthOfType(e) => e.matches(position(doc, id, false, true)),
            PseudoClass::Empty => doc.children(id).iter().all(|c| match doc.node(*c).map(|n| &n.data) {
                Some(NodeData::Text(t)) => t.is_empty(),
                Some(NodeData::Comment(_)) => true,
                _ => false,
            }),
            PseudoClass::Root => doc.parent(id) == Some(doc.root()),
            PseudoClass::Checked => doc.has_attr(id, "checked") || doc.has_attr(id, "selected"),
            PseudoClass::Disabled => doc.has_attr(id, "disabled"),
            PseudoClass::Not(list) => !list.matches(doc, id),
            PseudoClass::Is(list) => list.matches(doc, id),
        }
    }
}

/// 1-based position among element siblings
fn position(doc: &Document, id: NodeId, from_end: bool, same_type: bool) -> i32 {
    let tag = doc.tag_name(id);
    let mut siblings: Vec<NodeId> = doc
        .element_siblings(id)
        .into_iter()
        .filter(|s| !same_type || doc.tag_name(*s) == tag)
        .collect();
    if from_end {
        siblings.reverse();
    }
    siblings
        .iter()
        .position(|s| *s == id)
        .map(|p| p as i32 + 1)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compound() {
        let list = SelectorList::parse("div#main.card.wide[data-x='1']").unwrap();
        let compound = &list.0[0].compounds[0];
        assert_eq!(compound.tag.as_deref(), Some("div"));
        assert_eq!(compound.ids, vec!["main"]);
        assert_eq!(compound.classes, vec!["card", "wide"]);
        assert_eq!(compound.attributes[0].name, "data-x");
    }

    #[test]
    fn test_parse_combinators() {
        let list = SelectorList::parse("ul > li + li ~ li a").unwrap();
        assert_eq!(
            list.0[0].combinators,
            vec![
                Combinator::Child,
                Combinator::NextSibling,
                Combinator::SubsequentSibling,
                Combinator::Descendant,
            ]
        );
    }

    #[test]
    fn test_parse_escaped_identifier() {
        let list = SelectorList::parse(r"#a\:b, .\31 23").unwrap();
        assert_eq!(list.0[0].compounds[0].ids, vec!["a:b"]);
        assert_eq!(list.0[1].compounds[0].classes, vec!["123"]);
    }

    #[test]
    fn test_invalid_selectors_rejected() {
        for bad in ["", "div >", ".", "#", "[x", "a::before", ":hover", "a,,b", "div)"] {
            assert!(SelectorList::parse(bad).is_err(), "expected error for {:?}", bad);
        }
    }

    #[test]
    fn test_nth_expressions() {
        assert_eq!(NthExpression::parse("odd"), Some(NthExpression { a: 2, b: 1 }));
        assert_eq!(NthExpression::parse("2n + 1"), Some(NthExpression { a: 2, b: 1 }));
        assert_eq!(NthExpression::parse("-n+3"), Some(NthExpression { a: -1, b: 3 }));
        assert_eq!(NthExpression::parse("4"), Some(NthExpression { a: 0, b: 4 }));
        assert_eq!(NthExpression::parse("n"), Some(NthExpression { a: 1, b: 0 }));
        assert!(NthExpression::parse("2n1").is_none());

        let first_three = NthExpression { a: -1, b: 3 };
        assert!(first_three.matches(1));
        assert!(first_three.matches(3));
        assert!(!first_three.matches(4));
    }
}
