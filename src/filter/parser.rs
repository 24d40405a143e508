use regex::{Regex, RegexBuilder};
use std::fmt;

/// Attribute name that switches a clause to tag-group semantics
pub const TAGS_ATTRIBUTE: &str = "tags";

/// Attribute matched by a bare word with no `attr:` prefix
pub const SHORTHAND_ATTRIBUTE: &str = "nodename";

/// Characters that turn a single unquoted value into a regex.
/// A lone `.` is not enough, so hostnames and IPs stay literal.
const REGEX_METACHARS: [char; 8] = ['*', '?', '[', ']', '(', ')', '^', '$'];

/// How the tags inside one group combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagGroupKind {
    /// Every tag must be present (`web+production`)
    And,
    /// A single bare tag (`staging`)
    Or,
}

/// One OR-alternative of a tag clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagGroup {
    pub kind: TagGroupKind,
    pub tags: Vec<String>,
}

/// The candidate values of a clause
#[derive(Debug, Clone)]
pub enum ClauseValues {
    /// Case-insensitive equality against any of the values
    Literal(Vec<String>),
    /// Case-insensitive regex search. `regex` is `None` when the pattern
    /// failed to compile; the clause then compares `source` literally.
    Pattern {
        source: String,
        regex: Option<Regex>,
    },
    /// Any of the groups must match the node's tag set
    Tags(Vec<TagGroup>),
}

impl PartialEq for ClauseValues {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ClauseValues::Literal(a), ClauseValues::Literal(b)) => a == b,
            (ClauseValues::Pattern { source: a, .. }, ClauseValues::Pattern { source: b, .. }) => {
                a == b
            }
            (ClauseValues::Tags(a), ClauseValues::Tags(b)) => a == b,
            _ => false,
        }
    }
}

/// A single parsed condition (e.g. `proxmox_status: running` or `!tags: dev`)
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    /// Attribute to test, or [`TAGS_ATTRIBUTE`]
    pub attribute: String,
    /// Whether the clause result is inverted (prefixed with `!`)
    pub negate: bool,
    pub values: ClauseValues,
}

impl FilterClause {
    /// Build a clause from an attribute and its raw value text.
    ///
    /// Returns `None` when the value holds nothing to match against.
    pub fn new(attribute: &str, negate: bool, raw_value: &str) -> Option<Self> {
        let values = if attribute == TAGS_ATTRIBUTE {
            let groups = parse_tag_groups(raw_value);
            if groups.is_empty() {
                return None;
            }
            ClauseValues::Tags(groups)
        } else {
            let mut values: Vec<(String, bool)> = split_top_level(raw_value, ',')
                .into_iter()
                .map(unquote)
                .filter(|(value, quoted)| *quoted || !value.is_empty())
                .collect();

            match values.len() {
                0 => return None,
                1 if !values[0].1 && looks_like_regex(&values[0].0) => {
                    let (source, _) = values.remove(0);
                    let regex = compile_pattern(&source);
                    ClauseValues::Pattern { source, regex }
                }
                _ => ClauseValues::Literal(values.into_iter().map(|(v, _)| v).collect()),
            }
        };

        Some(FilterClause {
            attribute: attribute.to_string(),
            negate,
            values,
        })
    }

    /// `nodename: word` clause for a bare word. Always literal.
    pub fn shorthand(word: &str, negate: bool) -> Self {
        let (value, _) = unquote(word);
        FilterClause {
            attribute: SHORTHAND_ATTRIBUTE.to_string(),
            negate,
            values: ClauseValues::Literal(vec![value]),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self.values, ClauseValues::Pattern { .. })
    }

    pub fn is_tag(&self) -> bool {
        matches!(self.values, ClauseValues::Tags(_))
    }
}

impl fmt::Display for FilterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            write!(f, "!")?;
        }
        write!(f, "{}: ", self.attribute)?;
        match &self.values {
            ClauseValues::Literal(values) => {
                let rendered: Vec<String> = values
                    .iter()
                    .map(|v| {
                        if v.is_empty() || v.contains([',', ' ', '"']) {
                            format!("'{v}'")
                        } else if looks_like_regex(v) {
                            format!("\"{v}\"")
                        } else {
                            v.clone()
                        }
                    })
                    .collect();
                write!(f, "{}", rendered.join(","))
            }
            ClauseValues::Pattern { source, .. } => write!(f, "{source}"),
            ClauseValues::Tags(groups) => {
                let rendered: Vec<String> = groups.iter().map(|g| g.tags.join("+")).collect();
                write!(f, "{}", rendered.join(","))
            }
        }
    }
}

/// A complete filter expression; clauses combine with AND logic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpression {
    pub clauses: Vec<FilterClause>,
}

impl FilterExpression {
    /// Parse a filter expression. Never fails; empty input matches everything.
    ///
    /// A clause value runs until the next token that opens a `[!]attr:`
    /// clause, so unquoted values may contain spaces.
    pub fn parse(s: &str) -> Self {
        let tokens = split_preserving_quotes(s);
        let mut clauses = Vec::new();
        let mut pending_negate = false;
        let mut i = 0;

        while i < tokens.len() {
            let (start, token) = tokens[i];
            i += 1;

            if token == "!" {
                pending_negate = true;
                continue;
            }

            let (bang, body) = match token.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, token),
            };
            let negate = std::mem::take(&mut pending_negate) || bang;

            let Some((attribute, rest)) = split_attribute(body) else {
                clauses.push(FilterClause::shorthand(body, negate));
                continue;
            };

            let value_start = start + token.len() - rest.len();
            let mut value_end = start + token.len();
            if rest.trim().is_empty() {
                if let Some(&(next_start, next)) = tokens.get(i) {
                    if !opens_empty_clause(next) {
                        value_end = next_start + next.len();
                        i += 1;
                    }
                }
            }
            while i < tokens.len() && !starts_clause(&tokens[i..]) {
                let (next_start, next) = tokens[i];
                value_end = next_start + next.len();
                i += 1;
            }

            match FilterClause::new(attribute, negate, &s[value_start..value_end]) {
                Some(clause) => clauses.push(clause),
                None => tracing::warn!(
                    "Ignoring filter clause '{}' with no value; it matches every node",
                    token
                ),
            }
        }

        FilterExpression { clauses }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

/// Parse a filter string into its ordered clause list
pub fn parse_filter(s: &str) -> Vec<FilterClause> {
    FilterExpression::parse(s).clauses
}

/// Split `attr:rest` when the text before the first colon is a valid
/// attribute name.
fn split_attribute(token: &str) -> Option<(&str, &str)> {
    let (name, rest) = token.split_once(':')?;
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    valid.then_some((name, rest))
}

/// `attr:` (or `!attr:`) with its value in a following token
fn opens_empty_clause(token: &str) -> bool {
    let body = token.strip_prefix('!').unwrap_or(token);
    token == "!" || split_attribute(body).is_some_and(|(_, rest)| rest.is_empty())
}

fn opens_clause(token: &str) -> bool {
    let body = token.strip_prefix('!').unwrap_or(token);
    split_attribute(body).is_some()
}

/// The remaining tokens begin a new clause, either `[!]attr:...` or a
/// lone `!` followed by one
fn starts_clause(tokens: &[(usize, &str)]) -> bool {
    match tokens {
        [(_, "!"), (_, next), ..] => opens_clause(next),
        [(_, token), ..] => opens_clause(token),
        [] => false,
    }
}

fn looks_like_regex(value: &str) -> bool {
    value.contains(REGEX_METACHARS)
}

fn compile_pattern(source: &str) -> Option<Regex> {
    match RegexBuilder::new(source).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::debug!(
                "Invalid regex '{}' in node filter, comparing literally: {}",
                source,
                e
            );
            None
        }
    }
}

fn parse_tag_groups(raw: &str) -> Vec<TagGroup> {
    split_top_level(raw, ',')
        .into_iter()
        .filter_map(|group| {
            let tags: Vec<String> = split_top_level(group, '+')
                .into_iter()
                .map(|tag| unquote(tag).0)
                .filter(|tag| !tag.is_empty())
                .collect();
            let kind = match tags.len() {
                0 => return None,
                1 => TagGroupKind::Or,
                _ => TagGroupKind::And,
            };
            Some(TagGroup { kind, tags })
        })
        .collect()
}

/// Trim whitespace and one pair of matching surrounding quotes.
/// The flag reports whether quotes were removed.
fn unquote(s: &str) -> (String, bool) {
    let trimmed = s.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return (trimmed[1..trimmed.len() - 1].to_string(), true);
        }
    }
    (trimmed.to_string(), false)
}

/// Split on `sep` outside of quoted spans
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == sep => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            None if is_quote(c) && opens_quote(prev) => quote = Some(c),
            None => {}
        }
        prev = Some(c);
    }
    parts.push(&s[start..]);

    parts
}

/// Split a string by whitespace while preserving quoted segments.
/// Each token is returned with its byte offset into `s`.
fn split_preserving_quotes(s: &str) -> Vec<(usize, &str)> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c.is_whitespace() => {
                if i > start {
                    parts.push((start, &s[start..i]));
                }
                start = i + c.len_utf8();
            }
            None if is_quote(c) && opens_quote(prev) => quote = Some(c),
            None => {}
        }
        prev = Some(c);
    }

    if start < s.len() {
        parts.push((start, &s[start..]));
    }

    parts
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'')
}

/// Quotes only delimit a value; an apostrophe inside a word is literal
fn opens_quote(prev: Option<char>) -> bool {
    prev.is_none_or(|p| p.is_whitespace() || matches!(p, ':' | ',' | '+' | '!'))
}
