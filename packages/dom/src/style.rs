//! Inline style declarations (the `style` attribute)
//!
//! Declarations are tokenized with `cssparser`, so `;` inside blocks,
//! functions or strings never splits a declaration. Values keep their source
//! text exactly; only the property name is normalized. Malformed declarations
//! are dropped the way browsers drop them.

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};

/// One `property: value [!important]` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// Ordered list of declarations, last write per property wins
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleDeclarations {
    declarations: Vec<Declaration>,
}

impl StyleDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(css_text: &str) -> Self {
        let mut input = ParserInput::new(css_text);
        let mut parser = Parser::new(&mut input);
        let mut style = Self::new();

        while !parser.is_exhausted() {
            let before = parser.position();
            let parsed = parser.parse_until_after(Delimiter::Semicolon, parse_declaration);
            if let Ok((property, value, important)) = parsed {
                style.set(&property, value, important);
            }
            if parser.position() == before {
                break;
            }
        }
        style
    }

    /// Whether `value` stays one declaration's value once written into a
    /// `style` attribute (no top-level `;`)
    pub fn is_single_value(value: &str) -> bool {
        let mut input = ParserInput::new(value);
        let mut parser = Parser::new(&mut input);
        while let Ok(token) = parser.next() {
            if matches!(token, Token::Semicolon) {
                return false;
            }
        }
        true
    }

    pub fn get(&self, property: &str) -> Option<&Declaration> {
        let property = normalize_property(property);
        self.declarations.iter().find(|d| d.property == property)
    }

    pub fn value(&self, property: &str) -> Option<&str> {
        self.get(property).map(|d| d.value.as_str())
    }

    /// Set a property, keeping its position if already declared
    pub fn set(&mut self, property: &str, value: &str, important: bool) {
        let property = normalize_property(property);
        let value = value.trim().to_string();
        match self.declarations.iter_mut().find(|d| d.property == property) {
            Some(existing) => {
                existing.value = value;
                existing.important = important;
            }
            None => self.declarations.push(Declaration {
                property,
                value,
                important,
            }),
        }
    }

    pub fn remove(&mut self, property: &str) -> Option<Declaration> {
        let property = normalize_property(property);
        let pos = self.declarations.iter().position(|d| d.property == property)?;
        Some(self.declarations.remove(pos))
    }

    /// Put back a declaration captured earlier, or remove the property
    pub fn restore(&mut self, property: &str, previous: Option<&Declaration>) {
        match previous {
            Some(d) => self.set(&d.property, &d.value, d.important),
            None => {
                self.remove(property);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    /// Serialize like `CSSStyleDeclaration.cssText`
    pub fn to_css_text(&self) -> String {
        self.declarations
            .iter()
            .map(|d| {
                if d.important {
                    format!("{}: {} !important;", d.property, d.value)
                } else {
                    format!("{}: {};", d.property, d.value)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Custom properties (`--x`) are case-sensitive, everything else is not
fn normalize_property(property: &str) -> String {
    let property = property.trim();
    if property.starts_with("--") {
        property.to_string()
    } else {
        property.to_ascii_lowercase()
    }
}

/// `property: value [!important]` up to the next top-level `;`
fn parse_declaration<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<(String, &'i str, bool), ParseError<'i, ()>> {
    let property = parser.expect_ident()?.to_string();
    parser.expect_colon()?;

    let start = parser.position();
    let mut value_end = None;
    loop {
        let before = parser.position();
        let Ok(bang) = parser.next().map(|token| matches!(token, Token::Delim('!'))) else {
            break;
        };
        if bang
            && parser
                .try_parse(|p| p.expect_ident_matching("important"))
                .is_ok()
            && parser.is_exhausted()
        {
            value_end = Some(before);
            break;
        }
    }

    let (value, important) = match value_end {
        Some(end) => (parser.slice(start..end), true),
        None => (parser.slice_from(start), false),
    };
    let value = value.trim();
    if property.is_empty() || value.is_empty() {
        return Err(parser.new_custom_error(()));
    }
    Ok((property, value, important))
}
