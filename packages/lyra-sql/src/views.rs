use std::collections::HashMap;

use serde::Serialize;

use crate::error::{Result, SqlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Uuid,
    Text,
    Integer,
}

#[derive(Debug, Clone, Copy)]
pub struct ViewParam {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewTemplate {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    sql: &'static str,
    #[serde(skip)]
    params: &'static [ViewParam],
}

fn looks_like_uuid(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

fn quote_text(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl ViewTemplate {
    /// Substitutes `:name` placeholders with literal, type-checked SQL —
    /// safe because every value is validated against its declared kind
    /// before being embedded (UUIDs against the canonical hyphenated hex
    /// shape, integers via `str::parse`, free text via quote-doubling),
    /// not because the caller's input is trusted.
    pub fn render(&self, params: &HashMap<String, serde_json::Value>) -> Result<String> {
        let mut sql = self.sql.to_string();
        for param in self.params {
            let provided = params.get(param.name);
            let literal = match (provided, param.required) {
                (None, true) => return Err(SqlError::MissingParam(param.name.to_string())),
                (None, false) => "NULL".to_string(),
                (Some(value), _) => render_value(param, value)?,
            };
            sql = sql.replace(&format!(":{}", param.name), &literal);
        }
        Ok(sql)
    }
}

fn render_value(param: &ViewParam, value: &serde_json::Value) -> Result<String> {
    match param.kind {
        ParamKind::Uuid => {
            let text = value.as_str().ok_or_else(|| SqlError::Forbidden(format!("{} must be a string", param.name)))?;
            if !looks_like_uuid(text) {
                return Err(SqlError::Forbidden(format!("{} is not a valid id", param.name)));
            }
            Ok(quote_text(text))
        }
        ParamKind::Text => {
            let text = value.as_str().ok_or_else(|| SqlError::Forbidden(format!("{} must be a string", param.name)))?;
            Ok(quote_text(text))
        }
        ParamKind::Integer => {
            let n = value.as_i64().ok_or_else(|| SqlError::Forbidden(format!("{} must be an integer", param.name)))?;
            Ok(n.to_string())
        }
    }
}

const CONTRADICTIONS: ViewTemplate = ViewTemplate {
    name: "contradictions",
    description: "Claims with both supporting and refuting evidence edges",
    sql: "SELECT c.id AS claim_id, c.claim_text, \
          SUM(CASE WHEN e.relation = 'supports' THEN 1 ELSE 0 END) AS supporting_edges, \
          SUM(CASE WHEN e.relation = 'refutes' THEN 1 ELSE 0 END) AS refuting_edges \
          FROM claims c JOIN edges e ON e.target_id = c.id AND e.edge_kind = 'fragment_claim' \
          WHERE c.task_id = :task_id GROUP BY c.id \
          HAVING supporting_edges > 0 AND refuting_edges > 0 ORDER BY refuting_edges DESC",
    params: &[ViewParam { name: "task_id", kind: ParamKind::Uuid, required: true }],
};

const HUB_PAGES: ViewTemplate = ViewTemplate {
    name: "hub_pages",
    description: "Pages most frequently cited by other pages",
    sql: "SELECT p.id AS page_id, p.url, p.domain, COUNT(*) AS inbound_citations \
          FROM edges e JOIN pages p ON p.id = e.target_id \
          WHERE e.edge_kind = 'page_cites' GROUP BY p.id ORDER BY inbound_citations DESC",
    params: &[],
};

const CITATION_FLOW: ViewTemplate = ViewTemplate {
    name: "citation_flow",
    description: "Citation counts between citing and cited domains",
    sql: "SELECT src.domain AS citing_domain, tgt.domain AS cited_domain, COUNT(*) AS citation_count \
          FROM edges e JOIN pages src ON src.id = e.source_id JOIN pages tgt ON tgt.id = e.target_id \
          WHERE e.edge_kind = 'page_cites' GROUP BY src.domain, tgt.domain ORDER BY citation_count DESC",
    params: &[],
};

const EVIDENCE_TIMELINE: ViewTemplate = ViewTemplate {
    name: "evidence_timeline",
    description: "Evidence edges into a claim in chronological order",
    sql: "SELECT e.id AS edge_id, e.relation, e.nli_confidence, e.created_at, p.domain, p.url \
          FROM edges e JOIN fragments f ON f.id = e.source_id JOIN pages p ON p.id = f.page_id \
          WHERE e.target_id = :claim_id AND e.edge_kind = 'fragment_claim' ORDER BY e.created_at ASC",
    params: &[ViewParam { name: "claim_id", kind: ParamKind::Uuid, required: true }],
};

const OUTDATED_EVIDENCE: ViewTemplate = ViewTemplate {
    name: "outdated_evidence",
    description: "Claims whose newest supporting evidence predates a cutoff year",
    sql: "SELECT c.id AS claim_id, c.claim_text, MAX(json_extract(p.metadata_json, '$.year')) AS latest_year \
          FROM claims c JOIN edges e ON e.target_id = c.id AND e.edge_kind = 'fragment_claim' AND e.relation = 'supports' \
          JOIN fragments f ON f.id = e.source_id JOIN pages p ON p.id = f.page_id \
          GROUP BY c.id HAVING latest_year IS NOT NULL AND latest_year < :before_year",
    params: &[ViewParam { name: "before_year", kind: ParamKind::Integer, required: true }],
};

const CONTROVERSY_BY_ERA: ViewTemplate = ViewTemplate {
    name: "controversy_by_era",
    description: "Supports vs. refutes edge counts bucketed by source publication year",
    sql: "SELECT json_extract(p.metadata_json, '$.year') AS year, \
          SUM(CASE WHEN e.relation = 'supports' THEN 1 ELSE 0 END) AS supports, \
          SUM(CASE WHEN e.relation = 'refutes' THEN 1 ELSE 0 END) AS refutes \
          FROM edges e JOIN fragments f ON f.id = e.source_id JOIN pages p ON p.id = f.page_id \
          WHERE e.edge_kind = 'fragment_claim' GROUP BY year ORDER BY year ASC",
    params: &[],
};

const SOURCE_AUTHORITY: ViewTemplate = ViewTemplate {
    name: "source_authority",
    description: "Domains ranked by combined claim rejection rate",
    sql: "SELECT host, category, total_claims, security_rejected_claims, manual_rejected_claims, \
          CAST(security_rejected_claims + manual_rejected_claims AS REAL) / NULLIF(total_claims, 0) AS combined_rejection_rate \
          FROM domain_state ORDER BY combined_rejection_rate ASC",
    params: &[],
};

const TEMPLATES: &[ViewTemplate] =
    &[CONTRADICTIONS, HUB_PAGES, CITATION_FLOW, EVIDENCE_TIMELINE, OUTDATED_EVIDENCE, CONTROVERSY_BY_ERA, SOURCE_AUTHORITY];

pub fn find(name: &str) -> Option<ViewTemplate> {
    TEMPLATES.iter().find(|t| t.name == name).copied()
}

pub fn all() -> Vec<ViewTemplate> {
    TEMPLATES.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn contradictions_renders_with_a_valid_uuid() {
        let mut params = HashMap::new();
        params.insert("task_id".to_string(), json!("11111111-1111-1111-1111-111111111111"));
        let sql = CONTRADICTIONS.render(&params).unwrap();
        assert!(sql.contains("'11111111-1111-1111-1111-111111111111'"));
        assert!(!sql.contains(":task_id"));
    }

    #[test]
    fn contradictions_rejects_malformed_uuid() {
        let mut params = HashMap::new();
        params.insert("task_id".to_string(), json!("'; DROP TABLE claims; --"));
        let result = CONTRADICTIONS.render(&params);
        assert!(matches!(result, Err(SqlError::Forbidden(_))));
    }

    #[test]
    fn missing_required_param_errors() {
        let result = CONTRADICTIONS.render(&HashMap::new());
        assert!(matches!(result, Err(SqlError::MissingParam(_))));
    }

    #[test]
    fn list_views_covers_the_named_templates() {
        let names: Vec<&str> = all().iter().map(|t| t.name).collect();
        for expected in ["contradictions", "hub_pages", "citation_flow", "evidence_timeline", "outdated_evidence", "controversy_by_era", "source_authority"] {
            assert!(names.contains(&expected), "missing view {expected}");
        }
    }

    #[test]
    fn outdated_evidence_accepts_integer_param() {
        let mut params = HashMap::new();
        params.insert("before_year".to_string(), json!(2015));
        let sql = OUTDATED_EVIDENCE.render(&params).unwrap();
        assert!(sql.contains("< 2015"));
    }
}
