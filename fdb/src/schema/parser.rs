//! Recursive-descent parser for the schema grammar.
//!
//! A schema file is a list of `keyword:Type;` declarations followed by a
//! forest of bracketed rule blocks. A rule block is
//! `[ predicate, predicate, … [ subrule ] … ]` and a predicate is one of
//! `k`, `k=v`, `k=v1/v2`, `k?default`, `k-default` or `k:Type` combined
//! with any of the former. `#` starts a comment running to end of line.

use std::collections::BTreeSet;

use error::{ErrorKind, Result};
use schema::matcher::{Matcher, Predicate};
use schema::rule::Rule;
use types::TypesRegistry;

pub struct SchemaParser {
	chars: Vec<char>,
	position: usize,
	line: usize,
}

impl SchemaParser {
	pub fn new(text: &str) -> SchemaParser {
		SchemaParser {
			chars: text.chars().collect(),
			position: 0,
			line: 0,
		}
	}

	fn error(&self, msg: String) -> ::error::Error {
		ErrorKind::SchemaSyntax(self.line + 1, msg).into()
	}

	// current character without consuming it, '\0' at end of input
	fn raw_peek(&self) -> char {
		self.chars.get(self.position).cloned().unwrap_or('\0')
	}

	fn advance(&mut self) {
		if self.raw_peek() == '\n' {
			self.line += 1;
		}
		self.position += 1;
	}

	// next significant character: skips whitespace and # comments
	fn peek(&mut self) -> char {
		loop {
			let c = self.raw_peek();
			if c.is_whitespace() {
				self.advance();
			} else if c == '#' {
				while self.raw_peek() != '\n' && self.raw_peek() != '\0' {
					self.advance();
				}
			} else {
				return c;
			}
		}
	}

	fn consume(&mut self, expected: char) -> Result<()> {
		let c = self.peek();
		if c != expected {
			return Err(self.error(format!("expected `{}`, found `{}`", expected, c)));
		}
		self.advance();
		Ok(())
	}

	// an identifier or value; in keyword position '-' terminates
	fn parse_ident(&mut self, value: bool, empty_ok: bool) -> Result<String> {
		self.peek();

		let mut s = String::new();
		loop {
			let c = self.raw_peek();
			match c {
				'\0' | '/' | '=' | ',' | ';' | ':' | '[' | ']' | '?' | '#' => break,
				'-' if !value => break,
				c if c.is_whitespace() => break,
				c => {
					self.advance();
					s.push(c);
				}
			}
		}

		if s.is_empty() && !empty_ok {
			return Err(self.error(format!("unexpected `{}`", self.raw_peek())));
		}
		Ok(s)
	}

	fn parse_types(&mut self, registry: &mut TypesRegistry) -> Result<()> {
		loop {
			let name = self.parse_ident(false, true)?;
			if name.is_empty() {
				return Ok(());
			}
			self.consume(':')?;
			let type_name = self.parse_ident(false, false)?;
			self.consume(';')?;
			registry.add(&name, &type_name)
				.map_err(|e| self.error(e.to_string()))?;
		}
	}

	fn parse_predicate(&mut self, registry: &mut TypesRegistry) -> Result<Predicate> {
		let keyword = self.parse_ident(false, false)?;

		let mut c = self.peek();

		if c == ':' {
			self.advance();
			let type_name = self.parse_ident(false, false)?;
			registry.add(&keyword, &type_name)
				.map_err(|e| self.error(e.to_string()))?;
			c = self.peek();
		}

		if c == '?' {
			self.advance();
			let default = self.parse_ident(true, true)?;
			return Ok(Predicate::new(&keyword, Matcher::Optional(default)));
		}

		if c == '-' {
			self.advance();
			if !registry.binds(&keyword) {
				registry.add(&keyword, "Ignore").expect("Ignore is a known type; qed");
			}
			let default = self.parse_ident(true, true)?;
			return Ok(Predicate::new(&keyword, Matcher::Hidden(default)));
		}

		if c != ',' && c != '[' && c != ']' {
			self.consume('=')?;

			let mut values = BTreeSet::new();
			values.insert(self.parse_ident(true, false)?);
			while self.peek() == '/' {
				self.advance();
				values.insert(self.parse_ident(true, false)?);
			}

			let matcher = if values.len() == 1 {
				Matcher::Value(values.into_iter().next().expect("one value; qed"))
			} else {
				Matcher::Any(values)
			};
			return Ok(Predicate::new(&keyword, matcher));
		}

		Ok(Predicate::new(&keyword, Matcher::Always))
	}

	fn parse_rule(&mut self) -> Result<Rule> {
		self.consume('[')?;
		let line = self.line + 1;

		let mut predicates = Vec::new();
		let mut children = Vec::new();
		let mut registry = TypesRegistry::new();

		if self.peek() == ']' {
			self.advance();
			return Ok(Rule::new(line, predicates, children, registry));
		}

		loop {
			let c = self.peek();

			if c == '\0' {
				return Err(self.error("unexpected end of schema inside a rule".into()));
			}

			if c == '[' {
				while self.peek() == '[' {
					children.push(self.parse_rule()?);
				}
			} else {
				predicates.push(self.parse_predicate(&mut registry)?);
				while self.peek() == ',' {
					self.advance();
					predicates.push(self.parse_predicate(&mut registry)?);
				}
			}

			if self.peek() == ']' {
				self.advance();
				return Ok(Rule::new(line, predicates, children, registry));
			}
		}
	}

	/// Parses the whole schema text into type declarations and rules.
	pub fn parse(mut self) -> Result<(TypesRegistry, Vec<Rule>)> {
		let mut registry = TypesRegistry::new();
		let mut rules = Vec::new();

		self.parse_types(&mut registry)?;

		while self.peek() == '[' {
			rules.push(self.parse_rule()?);
		}

		let c = self.peek();
		if c != '\0' {
			return Err(self.error(format!("trailing characters starting with `{}`", c)));
		}

		Ok((registry, rules))
	}
}

#[cfg(test)]
mod tests {
	use types::Type;
	use super::SchemaParser;

	#[test]
	fn test_parse_types_and_rules() {
		let text = "
			# keyword types
			date: Date;
			time: Time;

			[ class=od, expver, stream=oper/dacl, date, time
				[ type, levtype
					[ step, param ]]]
		";

		let (registry, rules) = SchemaParser::new(text).parse().unwrap();
		assert_eq!(registry.lookup("date"), Type::Date);
		assert_eq!(registry.lookup("time"), Type::Time);
		assert_eq!(rules.len(), 1);
		assert_eq!(rules[0].children().len(), 1);
		assert_eq!(rules[0].children()[0].children().len(), 1);
	}

	#[test]
	fn test_hidden_predicate_gets_ignore_type() {
		let text = "[ class, quantile-
			[ type [ step ]]]";
		let (_, rules) = SchemaParser::new(text).parse().unwrap();
		assert_eq!(rules[0].registry().lookup("quantile"), Type::Ignore);
	}

	#[test]
	fn test_inline_type() {
		let text = "[ class, step:Step=0/6 [ type [ param ]]]";
		let (_, rules) = SchemaParser::new(text).parse().unwrap();
		assert_eq!(rules[0].registry().lookup("step"), Type::Step);
	}

	#[test]
	fn test_syntax_errors() {
		assert!(SchemaParser::new("[ class").parse().is_err());
		assert!(SchemaParser::new("date Date;").parse().is_err());
		assert!(SchemaParser::new("[ = ]").parse().is_err());
		assert!(SchemaParser::new("[ class ] junk").parse().is_err());
		assert!(SchemaParser::new("step: Hovercraft; [ class [ a [ b ]]]").parse().is_err());
	}
}
