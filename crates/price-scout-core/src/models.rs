//! Core data types shared by the frame parser, tracker, store, and projector.
//!
//! Everything in here is plain data. Items and statuses are immutable once
//! constructed by the parser; the tracker and store own the only mutable
//! copies for the lifetime of one search session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one backend data source (a store).
///
/// The canonical form is lower-case with all whitespace removed, so the
/// display name carried by progress events (`"Real Plaza"`) and the store
/// key carried by result items (`"realplaza"`) resolve to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    pub fn new(raw: &str) -> Self {
        let canonical: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        SourceId(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SourceId {
    fn from(raw: String) -> Self {
        SourceId::new(&raw)
    }
}

impl From<&str> for SourceId {
    fn from(raw: &str) -> Self {
        SourceId::new(raw)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A known store: canonical id plus the name shown in the status panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: SourceId,
    pub display_name: String,
}

impl SourceDescriptor {
    pub fn new(display_name: &str) -> Self {
        Self {
            id: SourceId::new(display_name),
            display_name: display_name.to_string(),
        }
    }
}

/// The nine stores queried by the backend at design time.
pub fn default_sources() -> Vec<SourceDescriptor> {
    [
        "Ripley",
        "Falabella",
        "Oechsle",
        "Estilos",
        "Tailoy",
        "Real Plaza",
        "Plaza Vea",
        "Hiraoka",
        "Metro",
    ]
    .iter()
    .map(|name| SourceDescriptor::new(name))
    .collect()
}

/// Result ordering. Exactly one criterion is applied at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[serde(alias = "precioAsc")]
    PriceAsc,
    #[serde(alias = "precioDesc")]
    PriceDesc,
    #[serde(alias = "descuentoDesc")]
    DiscountDesc,
    #[serde(alias = "recomendados")]
    Recommended,
    #[default]
    None,
}

impl SortOrder {
    /// Value sent in the `sort` query parameter.
    pub fn as_wire(&self) -> &'static str {
        match self {
            SortOrder::PriceAsc => "priceAsc",
            SortOrder::PriceDesc => "priceDesc",
            SortOrder::DiscountDesc => "discountDesc",
            SortOrder::Recommended => "recommended",
            SortOrder::None => "none",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priceAsc" | "price-asc" | "precioAsc" => Ok(SortOrder::PriceAsc),
            "priceDesc" | "price-desc" | "precioDesc" => Ok(SortOrder::PriceDesc),
            "discountDesc" | "discount-desc" | "descuentoDesc" => Ok(SortOrder::DiscountDesc),
            "recommended" | "recomendados" => Ok(SortOrder::Recommended),
            "none" | "" => Ok(SortOrder::None),
            other => Err(format!(
                "unknown sort order '{}'. Use priceAsc, priceDesc, discountDesc, recommended, or none.",
                other
            )),
        }
    }
}

/// One logical search request. Replacing it means starting a new session.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub sort_preference: SortOrder,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, sort_preference: SortOrder) -> Self {
        Self {
            text: text.into(),
            sort_preference,
        }
    }
}

/// Completion state of a single source within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pending,
    Ok,
    Failed,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }
}

/// Per-source status shown in the status panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub source: SourceId,
    pub display_name: String,
    pub outcome: Outcome,
    pub result_count: u64,
    pub elapsed_seconds: f64,
    /// Backend marker text for non-success outcomes (e.g. `"Sin resultados"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SourceStatus {
    pub fn pending(source: SourceId, display_name: impl Into<String>) -> Self {
        Self {
            source,
            display_name: display_name.into(),
            outcome: Outcome::Pending,
            result_count: 0,
            elapsed_seconds: 0.0,
            detail: None,
        }
    }
}

/// One product offer returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultItem {
    pub name: String,
    pub price: f64,
    pub source: SourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub detail_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_canonicalizes_display_names() {
        assert_eq!(SourceId::new("Real Plaza"), SourceId::new("realplaza"));
        assert_eq!(SourceId::new(" Plaza  Vea "), SourceId::new("plazavea"));
        assert_eq!(SourceId::new("Ripley").as_str(), "ripley");
    }

    #[test]
    fn default_universe_has_nine_stores() {
        let sources = default_sources();
        assert_eq!(sources.len(), 9);
        assert_eq!(sources[5].id.as_str(), "realplaza");
        assert_eq!(sources[5].display_name, "Real Plaza");
    }

    #[test]
    fn sort_order_accepts_legacy_names() {
        assert_eq!("precioAsc".parse::<SortOrder>(), Ok(SortOrder::PriceAsc));
        assert_eq!("recomendados".parse::<SortOrder>(), Ok(SortOrder::Recommended));
        assert_eq!("discountDesc".parse::<SortOrder>(), Ok(SortOrder::DiscountDesc));
        assert!("cheapest".parse::<SortOrder>().is_err());

        let parsed: SortOrder = serde_json::from_str("\"descuentoDesc\"").unwrap();
        assert_eq!(parsed, SortOrder::DiscountDesc);
    }
}
