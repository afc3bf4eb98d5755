//! GraphQL query text and response decoding.
//!
//! Kept free of I/O so both shapes can be checked without a server.

use crate::{LookupError, SUGGESTION_LIMIT};
use serde::Deserialize;
use serde_json::Value;
use wfo_pages_model::{Name, Taxon};

/// A GraphQL string literal. JSON string escaping is a subset of GraphQL's.
pub fn string_literal(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

pub fn suggestion_query(terms: &str) -> String {
    format!(
        r#"query{{
    taxonNameSuggestion(termsString: {terms} limit: {limit}){{
        id
        fullNameStringHtml
        fullNameStringPlain
        currentPreferredUsage{{
            id
            hasName{{
                id
                fullNameStringHtml
                fullNameStringPlain
            }}
            partsCount
        }}
    }}
}}"#,
        terms = string_literal(terms),
        limit = SUGGESTION_LIMIT,
    )
}

pub fn detail_query(concept_id: &str) -> String {
    format!(
        r#"query{{
    taxonConceptById(taxonId: {taxon_id}){{
        id
        hasName{{
            ...NameParts
        }}
        hasSynonym{{
            ...NameParts
        }}
        path{{
            id
            hasName{{
                ...NameParts
            }}
        }}
        hasPart{{
            id
            hasName{{
                ...NameParts
            }}
        }}
    }}
}}
fragment NameParts on TaxonName {{
    id
    fullNameStringHtml
    fullNameStringPlain
}}"#,
        taxon_id = string_literal(concept_id),
    )
}

/// Request body posted to the endpoint.
pub fn request_body(query: &str) -> Value {
    serde_json::json!({ "query": query })
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionData {
    taxon_name_suggestion: Option<Vec<Name>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailData {
    taxon_concept_by_id: Option<Taxon>,
}

fn error_detail(errors: &[GraphQlError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    format!(" (server errors: {})", messages.join("; "))
}

pub fn decode_suggestions(value: Value) -> Result<Vec<Name>, LookupError> {
    let envelope: Envelope<SuggestionData> =
        serde_json::from_value(value).map_err(|e| LookupError::Decode(e.to_string()))?;
    let detail = error_detail(envelope.errors.as_deref().unwrap_or_default());
    envelope
        .data
        .and_then(|d| d.taxon_name_suggestion)
        .ok_or(LookupError::MissingData {
            field: "data.taxonNameSuggestion",
            detail,
        })
}

pub fn decode_detail(value: Value) -> Result<Taxon, LookupError> {
    let envelope: Envelope<DetailData> =
        serde_json::from_value(value).map_err(|e| LookupError::Decode(e.to_string()))?;
    let detail = error_detail(envelope.errors.as_deref().unwrap_or_default());
    envelope
        .data
        .and_then(|d| d.taxon_concept_by_id)
        .ok_or(LookupError::MissingData {
            field: "data.taxonConceptById",
            detail,
        })
}
