//! Error message templates.
//!
//! `{}` takes the next payload value, `{N}` takes payload value `N`, `{{` and `}}` are literal
//! braces.
use super::error::CheckifyError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Slot(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Template, CheckifyError> {
        let malformed = |reason: &str| CheckifyError::MalformedTemplate {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = vec![];
        let mut text = String::new();
        let mut next_slot = 0;
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '}' => return Err(malformed("unmatched `}`")),
                '{' => {
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            Some(_) => return Err(malformed("placeholders are `{}` or `{N}`")),
                            None => return Err(malformed("unterminated placeholder")),
                        }
                    }
                    let slot = if digits.is_empty() {
                        next_slot += 1;
                        next_slot - 1
                    } else {
                        digits
                            .parse()
                            .map_err(|_| malformed("placeholder index too large"))?
                    };
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Template {
            source: source.to_string(),
            segments,
        })
    }

    /// A template without placeholders. Braces in `text` are kept as-is.
    pub fn literal(text: &str) -> Template {
        Template {
            source: text.replace('{', "{{").replace('}', "}}"),
            segments: vec![Segment::Text(text.to_string())],
        }
    }

    /// Number of payload values this template reads
    pub fn slots(&self) -> usize {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Slot(i) => Some(i + 1),
                Segment::Text(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn expect_payload(&self, given: usize) -> Result<(), CheckifyError> {
        let expected = self.slots();
        if expected > given {
            return Err(CheckifyError::PayloadMismatch {
                template: self.source.clone(),
                expected,
                given,
            });
        }
        Ok(())
    }

    /// Substitute `values` into the template.
    /// Slots with no corresponding value render as `<missing>`.
    pub fn render<T: fmt::Display>(&self, values: &[T]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(i) => match values.get(*i) {
                    Some(v) => out.push_str(&v.to_string()),
                    None => out.push_str("<missing>"),
                },
            }
        }
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
