//! Declarative per-field merge strategies for document upserts.
//!
//! Every mutable collection has a merge table mapping each top-level field
//! to one of three strategies. Tables are validated for completeness at
//! startup (`validate()`): a field added to a domain type without a merge
//! decision is a startup error, not a silent overwrite.
//!
//! All strategies are commutative and order-independent (union, max) or
//! last-writer scalar overwrites, so concurrent runs touching the same
//! document converge regardless of interleaving.

use serde_json::Value;

use crate::error::WindfallError;
use crate::types::{Article, Event, Opportunity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Take the incoming value, unless it is null (null never erases data).
    Overwrite,
    /// Union incoming array elements into the existing array, no duplicates.
    UnionArray,
    /// Keep the numeric maximum of existing and incoming.
    Max,
}

pub struct MergeTable {
    pub collection: &'static str,
    pub key_field: &'static str,
    pub fields: &'static [(&'static str, MergeStrategy)],
}

impl MergeTable {
    pub fn strategy_for(&self, field: &str) -> Option<MergeStrategy> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, s)| *s)
    }
}

use MergeStrategy::*;

pub const ARTICLE_MERGE: MergeTable = MergeTable {
    collection: "articles",
    key_field: "link",
    fields: &[
        ("id", Overwrite),
        ("title", Overwrite),
        ("link", Overwrite),
        ("source", Overwrite),
        ("country", Overwrite),
        ("status", Overwrite),
        ("headline_score", Overwrite),
        ("headline_rationale", Overwrite),
        ("content_score", Overwrite),
        ("content_summary", Overwrite),
        ("key_individuals", UnionArray),
        ("trail", Overwrite),
        ("scraped_at", Overwrite),
    ],
};

pub const EVENT_MERGE: MergeTable = MergeTable {
    collection: "events",
    key_field: "event_key",
    fields: &[
        ("event_key", Overwrite),
        ("headline", Overwrite),
        ("summary", Overwrite),
        ("country", Overwrite),
        ("classification", Overwrite),
        ("source_links", UnionArray),
        ("highest_relevance_score", Max),
        ("key_individuals", UnionArray),
        ("opportunity_names", UnionArray),
        ("created_at", Overwrite),
    ],
};

pub const OPPORTUNITY_MERGE: MergeTable = MergeTable {
    collection: "opportunities",
    key_field: "name",
    fields: &[
        ("name", Overwrite),
        ("biography", Overwrite),
        ("reasons_to_contact", UnionArray),
        ("wealth_estimate_musd", Max),
        ("contact_email", Overwrite),
        ("embedding", Overwrite),
        ("event_keys", UnionArray),
        ("first_seen", Overwrite),
        ("last_updated", Overwrite),
    ],
};

/// Check every merge table against a serialized sample of its domain type:
/// each top-level field must have exactly one strategy, and the table must
/// not name fields the type no longer has. Called once at startup.
pub fn validate() -> Result<(), WindfallError> {
    let article = serde_json::to_value(Article::new("t", "l", "s", "c"))
        .map_err(|e| WindfallError::Validation(e.to_string()))?;
    let event = serde_json::to_value(sample_event())
        .map_err(|e| WindfallError::Validation(e.to_string()))?;
    let opportunity = serde_json::to_value(Opportunity::new("n", "b"))
        .map_err(|e| WindfallError::Validation(e.to_string()))?;

    for (table, sample) in [
        (&ARTICLE_MERGE, &article),
        (&EVENT_MERGE, &event),
        (&OPPORTUNITY_MERGE, &opportunity),
    ] {
        let doc = sample
            .as_object()
            .ok_or_else(|| WindfallError::Validation("sample doc is not an object".into()))?;
        for field in doc.keys() {
            if table.strategy_for(field).is_none() {
                return Err(WindfallError::Validation(format!(
                    "merge table for '{}' has no strategy for field '{}'",
                    table.collection, field
                )));
            }
        }
        for (field, _) in table.fields {
            if !doc.contains_key(*field) {
                return Err(WindfallError::Validation(format!(
                    "merge table for '{}' names unknown field '{}'",
                    table.collection, field
                )));
            }
        }
        if table.strategy_for(table.key_field).is_none() {
            return Err(WindfallError::Validation(format!(
                "merge table for '{}' missing key field '{}'",
                table.collection, table.key_field
            )));
        }
    }
    Ok(())
}

/// Merge `incoming` into `existing` per the table. Both must be JSON objects.
pub fn apply(table: &MergeTable, existing: &mut Value, incoming: &Value) {
    let incoming_obj = match incoming.as_object() {
        Some(o) => o,
        None => return,
    };
    let existing_obj = match existing.as_object_mut() {
        Some(o) => o,
        None => return,
    };

    for (field, new_value) in incoming_obj {
        let strategy = table.strategy_for(field).unwrap_or(Overwrite);
        match strategy {
            Overwrite => {
                if !new_value.is_null() {
                    existing_obj.insert(field.clone(), new_value.clone());
                }
            }
            UnionArray => {
                let merged = union_arrays(existing_obj.get(field), new_value);
                existing_obj.insert(field.clone(), merged);
            }
            Max => {
                // Keep whichever operand is larger, verbatim, so integer
                // fields stay integers in the stored document.
                let old = existing_obj.get(field).and_then(Value::as_f64);
                let new = new_value.as_f64();
                let take_incoming = match (old, new) {
                    (Some(o), Some(n)) => n > o,
                    (None, Some(_)) => true,
                    _ => false,
                };
                if take_incoming {
                    existing_obj.insert(field.clone(), new_value.clone());
                }
            }
        }
    }
}

fn sample_event() -> Event {
    Event {
        event_key: "k".to_string(),
        headline: String::new(),
        summary: String::new(),
        country: String::new(),
        classification: String::new(),
        source_links: Vec::new(),
        highest_relevance_score: 0,
        key_individuals: Vec::new(),
        opportunity_names: Vec::new(),
        created_at: chrono::Utc::now(),
    }
}

fn union_arrays(existing: Option<&Value>, incoming: &Value) -> Value {
    let mut out: Vec<Value> = existing
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if let Some(new_items) = incoming.as_array() {
        for item in new_items {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }
    }
    Value::Array(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tables_are_complete() {
        validate().expect("merge tables must cover every field");
    }

    #[test]
    fn union_adds_each_element_at_most_once() {
        let mut existing = json!({"event_keys": ["a", "b"]});
        apply(
            &OPPORTUNITY_MERGE,
            &mut existing,
            &json!({"event_keys": ["b", "c"]}),
        );
        assert_eq!(existing["event_keys"], json!(["a", "b", "c"]));

        // Re-applying the same merge is a no-op (set semantics).
        apply(
            &OPPORTUNITY_MERGE,
            &mut existing,
            &json!({"event_keys": ["b", "c"]}),
        );
        assert_eq!(existing["event_keys"], json!(["a", "b", "c"]));
    }

    #[test]
    fn wealth_estimate_never_decreases() {
        let mut existing = json!({"wealth_estimate_musd": 200.0});
        apply(
            &OPPORTUNITY_MERGE,
            &mut existing,
            &json!({"wealth_estimate_musd": 150.0}),
        );
        assert_eq!(existing["wealth_estimate_musd"].as_f64(), Some(200.0));

        apply(
            &OPPORTUNITY_MERGE,
            &mut existing,
            &json!({"wealth_estimate_musd": 300.0}),
        );
        assert_eq!(existing["wealth_estimate_musd"].as_f64(), Some(300.0));
    }

    #[test]
    fn max_keeps_integer_fields_integral() {
        let mut existing = json!({"highest_relevance_score": 75});
        apply(
            &EVENT_MERGE,
            &mut existing,
            &json!({"highest_relevance_score": 80}),
        );
        assert_eq!(existing["highest_relevance_score"], json!(80));
        assert!(existing["highest_relevance_score"].is_u64());

        // Losing merges leave the stored (integer) value untouched too.
        apply(
            &EVENT_MERGE,
            &mut existing,
            &json!({"highest_relevance_score": 60}),
        );
        assert_eq!(existing["highest_relevance_score"], json!(80));
        assert!(existing["highest_relevance_score"].is_u64());

        // The merged doc still deserializes into the domain type's u8.
        let score: u8 =
            serde_json::from_value(existing["highest_relevance_score"].clone()).unwrap();
        assert_eq!(score, 80);
    }

    #[test]
    fn overwrite_skips_null() {
        let mut existing = json!({"contact_email": "a@b.ch", "biography": "old"});
        apply(
            &OPPORTUNITY_MERGE,
            &mut existing,
            &json!({"contact_email": null, "biography": "new"}),
        );
        assert_eq!(existing["contact_email"], json!("a@b.ch"));
        assert_eq!(existing["biography"], json!("new"));
    }

    #[test]
    fn merge_is_order_independent_for_monotone_fields() {
        let a = json!({"wealth_estimate_musd": 150.0, "event_keys": ["x"]});
        let b = json!({"wealth_estimate_musd": 300.0, "event_keys": ["y"]});

        let mut ab = json!({"wealth_estimate_musd": 0.0, "event_keys": []});
        apply(&OPPORTUNITY_MERGE, &mut ab, &a);
        apply(&OPPORTUNITY_MERGE, &mut ab, &b);

        let mut ba = json!({"wealth_estimate_musd": 0.0, "event_keys": []});
        apply(&OPPORTUNITY_MERGE, &mut ba, &b);
        apply(&OPPORTUNITY_MERGE, &mut ba, &a);

        assert_eq!(ab["wealth_estimate_musd"], ba["wealth_estimate_musd"]);
        let mut keys_ab: Vec<_> = ab["event_keys"].as_array().unwrap().clone();
        let mut keys_ba: Vec<_> = ba["event_keys"].as_array().unwrap().clone();
        keys_ab.sort_by_key(|v| v.as_str().unwrap().to_string());
        keys_ba.sort_by_key(|v| v.as_str().unwrap().to_string());
        assert_eq!(keys_ab, keys_ba);
    }
}
