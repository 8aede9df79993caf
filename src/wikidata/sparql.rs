//! SPARQL level queries against the Wikidata Query Service.
//!
//! One query fetches the item-valued direct claims for a whole set of
//! anchor entities, either outgoing (`Forward`) or incoming (`Reverse`).

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

/// Rows requested per anchor entity before the client-side cap applies.
/// Prolific entities would otherwise starve smaller ones under the
/// service's arbitrary row ordering.
const ROWS_PER_ANCHOR: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SparqlResponse {
    #[serde(default)]
    pub results: SparqlResults,
}

#[derive(Debug, Default, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SparqlTerm {
    pub value: String,
}

pub type Binding = HashMap<String, SparqlTerm>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Anchors are subjects; discovers targets.
    Forward,
    /// Anchors are objects; discovers sources.
    Reverse,
}

impl Direction {
    fn anchor_var(&self) -> &'static str {
        match self {
            Direction::Forward => "source",
            Direction::Reverse => "target",
        }
    }
}

/// Edges and metadata returned by one level fetch.
#[derive(Debug, Clone, Default)]
pub struct LevelFetch {
    /// (source, property, target)
    pub edges: Vec<(String, String, String)>,
    pub labels: HashMap<String, String>,
    /// Entities discovered on the far side of the anchors
    pub discovered: BTreeSet<String>,
    pub sitelinks: HashMap<String, u64>,
}

/// Build the level query. Callers must pass validated entity ids only.
pub fn level_query(anchors: &BTreeSet<String>, direction: Direction, language: &str) -> String {
    let values = anchors
        .iter()
        .map(|id| format!("wd:{}", id))
        .collect::<Vec<_>>()
        .join(" ");
    let total_limit = ROWS_PER_ANCHOR * anchors.len().max(1);

    format!(
        r#"
SELECT ?source ?prop ?target ?sourceLabel ?propLabel ?targetLabel ?sourceSitelinks ?targetSitelinks
WHERE {{
  VALUES ?{anchor} {{ {values} }}
  ?source ?wdt ?target .
  ?prop wikibase:directClaim ?wdt .
  OPTIONAL {{ ?source wikibase:sitelinks ?sourceSitelinks . }}
  OPTIONAL {{ ?target wikibase:sitelinks ?targetSitelinks . }}
  FILTER(ISIRI(?target))
  FILTER(STRSTARTS(STR(?target), STR(wd:)))
  FILTER(STRSTARTS(STR(?source), STR(wd:)))
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "{language}". }}
}}
LIMIT {total_limit}
"#,
        anchor = direction.anchor_var(),
        values = values,
        language = language,
        total_limit = total_limit,
    )
}

/// Last path segment of an entity URI, e.g. `http://www.wikidata.org/entity/Q42` -> `Q42`.
pub fn local_id(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

fn term<'a>(binding: &'a Binding, name: &str) -> Option<&'a str> {
    binding.get(name).map(|t| t.value.as_str())
}

fn parse_count(binding: &Binding, name: &str) -> Option<u64> {
    term(binding, name).map(|v| v.parse::<u64>().unwrap_or(0))
}

/// Turn result rows into edges, keeping at most `per_anchor_limit` per anchor.
/// Rows whose anchor is not one of `anchors` are ignored.
pub fn collect_level(
    bindings: &[Binding],
    anchors: &BTreeSet<String>,
    direction: Direction,
    per_anchor_limit: usize,
) -> LevelFetch {
    let mut out = LevelFetch::default();
    let mut per_anchor: HashMap<String, usize> = HashMap::new();

    for binding in bindings {
        let (Some(source_uri), Some(prop_uri), Some(target_uri)) = (
            term(binding, "source"),
            term(binding, "prop"),
            term(binding, "target"),
        ) else {
            continue;
        };

        let source = local_id(source_uri).to_string();
        let prop = local_id(prop_uri).to_string();
        let target = local_id(target_uri).to_string();

        let (anchor, discovered) = match direction {
            Direction::Forward => (&source, &target),
            Direction::Reverse => (&target, &source),
        };
        if !anchors.contains(anchor) {
            continue;
        }

        let count = per_anchor.entry(anchor.clone()).or_insert(0);
        if *count >= per_anchor_limit {
            continue;
        }
        *count += 1;

        if let Some(n) = parse_count(binding, "sourceSitelinks") {
            out.sitelinks.insert(source.clone(), n);
        }
        if let Some(n) = parse_count(binding, "targetSitelinks") {
            out.sitelinks.insert(target.clone(), n);
        }

        for (id, var) in [(&source, "sourceLabel"), (&prop, "propLabel"), (&target, "targetLabel")] {
            match term(binding, var) {
                Some(label) => {
                    out.labels.insert(id.clone(), label.to_string());
                }
                None => {
                    out.labels.entry(id.clone()).or_insert_with(|| id.clone());
                }
            }
        }

        out.discovered.insert(discovered.clone());
        out.edges.push((source, prop, target));
    }

    out
}
