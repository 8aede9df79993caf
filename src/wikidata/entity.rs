//! Relation extraction from Wikibase REST entity documents.

use serde_json::Value;
use std::collections::BTreeSet;

/// Item-valued relations taken from one entity document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRelations {
    /// (property id, target entity id) in statement order
    pub relations: Vec<(String, String)>,
    /// Property and target ids whose labels still need resolving
    pub ids_to_resolve: BTreeSet<String>,
}

/// Take the first statement of each property whose value is an item,
/// stopping after `limit` relations.
pub fn parse_entity_relations(entity: &Value, limit: usize) -> EntityRelations {
    let mut out = EntityRelations::default();

    let Some(statements) = entity.get("statements").and_then(Value::as_object) else {
        return out;
    };

    for (prop_id, claim_group) in statements {
        if out.relations.len() >= limit {
            break;
        }

        let Some(claim) = claim_group.as_array().and_then(|claims| claims.first()) else {
            continue;
        };
        let content = claim.pointer("/value/content");

        let target = match content {
            Some(Value::String(s)) if s.starts_with('Q') => Some(s.clone()),
            Some(Value::Object(obj)) => obj.get("id").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };

        if let Some(target) = target {
            out.ids_to_resolve.insert(prop_id.clone());
            out.ids_to_resolve.insert(target.clone());
            out.relations.push((prop_id.clone(), target));
        }
    }

    out
}

/// Number of sitelinks on an entity document.
pub fn sitelink_count(entity: &Value) -> u64 {
    entity
        .get("sitelinks")
        .and_then(Value::as_object)
        .map(|links| links.len() as u64)
        .unwrap_or(0)
}

/// English (or requested language) label from an entity document.
pub fn entity_label(entity: &Value, language: &str) -> Option<String> {
    entity
        .get("labels")
        .and_then(|labels| labels.get(language))
        .and_then(Value::as_str)
        .map(str::to_string)
}
