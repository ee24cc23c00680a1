//! Document search expressions.
//!
//! Both query syntaxes parse into the same [`Query`] tree, which compiles to
//! a single case-insensitive substring predicate over the documents table.

use diesel::dsl::not;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use serde::Deserialize;

use crate::access::DocumentPredicate;
use crate::schema::documents;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Simplified,
    Precise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    Content,
}

const TITLE_OR_CONTENT: &[Field] = &[Field::Title, Field::Content];
const ANY_TEXT: &[Field] = &[Field::Title, Field::Description, Field::Content];
const CONTENT_ONLY: &[Field] = &[Field::Content];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Matches every row.
    All,
    /// `needle` occurs in at least one of `fields`.
    Match {
        fields: &'static [Field],
        needle: String,
    },
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
}

impl Query {
    fn matching(fields: &'static [Field], needle: &str) -> Self {
        Query::Match {
            fields,
            needle: needle.to_string(),
        }
    }

    fn negate(self) -> Self {
        Query::Not(Box::new(self))
    }

    fn all_of(mut parts: Vec<Query>) -> Self {
        match parts.len() {
            0 => Query::All,
            1 => parts.remove(0),
            _ => Query::And(parts),
        }
    }

    fn any_of(mut parts: Vec<Query>) -> Self {
        match parts.len() {
            0 => Query::All,
            1 => parts.remove(0),
            _ => Query::Or(parts),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Query::All)
    }

    pub fn parse(input: &str, mode: SearchMode) -> Self {
        match mode {
            SearchMode::Simplified => parse_simplified(input),
            SearchMode::Precise => parse_precise(input),
        }
    }

    pub fn to_predicate(&self) -> DocumentPredicate {
        match self {
            Query::All => Box::new(true.into_sql::<Bool>()),
            Query::Match { fields, needle } => {
                let pattern = like_pattern(needle);
                fields
                    .iter()
                    .map(|field| field_matches(*field, &pattern))
                    .reduce(|acc, next| -> DocumentPredicate { Box::new(acc.or(next)) })
                    .unwrap_or_else(|| Box::new(false.into_sql::<Bool>()))
            }
            Query::And(parts) => parts
                .iter()
                .map(Query::to_predicate)
                .reduce(|acc, next| -> DocumentPredicate { Box::new(acc.and(next)) })
                .unwrap_or_else(|| Box::new(true.into_sql::<Bool>())),
            Query::Or(parts) => parts
                .iter()
                .map(Query::to_predicate)
                .reduce(|acc, next| -> DocumentPredicate { Box::new(acc.or(next)) })
                .unwrap_or_else(|| Box::new(false.into_sql::<Bool>())),
            Query::Not(inner) => Box::new(not(inner.to_predicate())),
        }
    }
}

fn field_matches(field: Field, pattern: &str) -> DocumentPredicate {
    let pattern = pattern.to_string();
    match field {
        Field::Title => Box::new(documents::title.ilike(pattern)),
        // Nullable columns are guarded so a negated match still holds for NULL.
        Field::Description => Box::new(
            documents::description
                .is_not_null()
                .and(documents::description.assume_not_null().ilike(pattern)),
        ),
        Field::Content => Box::new(
            documents::content_extract
                .is_not_null()
                .and(documents::content_extract.assume_not_null().ilike(pattern)),
        ),
    }
}

/// Wraps `needle` for a substring ILIKE, escaping its wildcards.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// `+term` is required in title or content, `-term` must not appear in
/// title or content, a bare term may appear in title, description or
/// content. Required and optional terms widen each other; exclusions
/// always narrow.
pub fn parse_simplified(input: &str) -> Query {
    let mut required = Vec::new();
    let mut optional = Vec::new();
    let mut excluded = Vec::new();

    for token in input.split_whitespace() {
        if let Some(term) = token.strip_prefix('+') {
            if !term.is_empty() {
                required.push(Query::matching(TITLE_OR_CONTENT, term));
            }
        } else if let Some(term) = token.strip_prefix('-') {
            if !term.is_empty() {
                excluded.push(Query::matching(TITLE_OR_CONTENT, term));
            }
        } else {
            optional.push(Query::matching(ANY_TEXT, token));
        }
    }

    let positive = match (required.is_empty(), optional.is_empty()) {
        (true, true) => Query::All,
        (false, true) => Query::all_of(required),
        (true, false) => Query::any_of(optional),
        (false, false) => Query::Or(vec![Query::all_of(required), Query::any_of(optional)]),
    };

    if excluded.is_empty() {
        return positive;
    }

    let exclusion = Query::any_of(excluded).negate();
    if positive.is_all() {
        exclusion
    } else {
        Query::And(vec![exclusion, positive])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
    Not,
    Near,
}

/// Quoted phrases must all occur in the extracted content. The remaining
/// words are folded left to right; `and`, `or`, `not` and `near` switch how
/// every following word joins the accumulated expression. `near` has no
/// proximity semantics and behaves like `and`.
pub fn parse_precise(input: &str) -> Query {
    let (phrases, remainder) = split_phrases(input);

    let mut connective = Connective::And;
    let mut terms: Option<Query> = None;
    for token in remainder.split_whitespace() {
        match token.to_ascii_lowercase().as_str() {
            "and" => connective = Connective::And,
            "or" => connective = Connective::Or,
            "not" => connective = Connective::Not,
            "near" => connective = Connective::Near,
            _ => {
                let term = Query::matching(CONTENT_ONLY, token);
                terms = Some(match (terms, connective) {
                    (None, Connective::Not) => term.negate(),
                    (None, _) => term,
                    (Some(acc), Connective::And | Connective::Near) => {
                        Query::And(vec![acc, term])
                    }
                    (Some(acc), Connective::Or) => Query::Or(vec![acc, term]),
                    (Some(acc), Connective::Not) => Query::And(vec![acc, term.negate()]),
                });
            }
        }
    }

    let mut parts: Vec<Query> = phrases
        .iter()
        .map(|phrase| Query::matching(CONTENT_ONLY, phrase))
        .collect();
    parts.extend(terms);
    Query::all_of(parts)
}

/// Pulls out `"quoted phrases"`. An unterminated quote is left as plain
/// words.
fn split_phrases(input: &str) -> (Vec<String>, String) {
    let segments: Vec<&str> = input.split('"').collect();
    let closed = if segments.len() % 2 == 0 {
        segments.len() - 1
    } else {
        segments.len()
    };

    let mut phrases = Vec::new();
    let mut remainder = String::new();
    for (index, segment) in segments.iter().enumerate() {
        let inside_quotes = index % 2 == 1 && index < closed;
        if inside_quotes {
            let phrase = segment.trim();
            if !phrase.is_empty() {
                phrases.push(phrase.to_string());
            }
            remainder.push(' ');
        } else {
            remainder.push_str(segment);
            remainder.push(' ');
        }
    }
    (phrases, remainder)
}
