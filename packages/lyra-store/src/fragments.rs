use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::pool::EvidenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Body,
    Abstract,
    PdfText,
}

impl FragmentKind {
    fn as_str(self) -> &'static str {
        match self {
            FragmentKind::Body => "body",
            FragmentKind::Abstract => "abstract",
            FragmentKind::PdfText => "pdf_text",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "abstract" => FragmentKind::Abstract,
            "pdf_text" => FragmentKind::PdfText,
            _ => FragmentKind::Body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: Uuid,
    pub page_id: Uuid,
    pub text_content: String,
    pub text_hash: String,
    pub span: (i64, i64),
    pub kind: FragmentKind,
}

#[derive(FromRow)]
struct FragmentRow {
    id: String,
    page_id: String,
    text_content: String,
    text_hash: String,
    span_start: i64,
    span_end: i64,
    kind: String,
}

impl FragmentRow {
    fn into_fragment(self) -> Result<Fragment> {
        Ok(Fragment {
            id: Uuid::parse_str(&self.id).map_err(|_| StoreError::CorruptJson("fragments.id".into()))?,
            page_id: Uuid::parse_str(&self.page_id)
                .map_err(|_| StoreError::CorruptJson("fragments.page_id".into()))?,
            text_content: self.text_content,
            text_hash: self.text_hash,
            span: (self.span_start, self.span_end),
            kind: FragmentKind::parse(&self.kind),
        })
    }
}

const FRAGMENT_COLUMNS: &str = "id, page_id, text_content, text_hash, span_start, span_end, kind";

impl EvidenceStore {
    /// Inserts a fragment, or returns the existing row for the same
    /// `(page_id, text_hash)` pair without re-inserting (spec section 3:
    /// "never re-inserted if text_hash seen").
    pub async fn insert_fragment(
        &self,
        page_id: Uuid,
        text_content: &str,
        text_hash: &str,
        span: (i64, i64),
        kind: FragmentKind,
    ) -> Result<Fragment> {
        if let Some(existing) = sqlx::query_as::<_, FragmentRow>(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM fragments WHERE page_id = ? AND text_hash = ?"
        ))
        .bind(page_id.to_string())
        .bind(text_hash)
        .fetch_optional(self.pool())
        .await?
        {
            return existing.into_fragment();
        }

        let fragment = Fragment {
            id: lyra_core::new_id(),
            page_id,
            text_content: text_content.to_string(),
            text_hash: text_hash.to_string(),
            span,
            kind,
        };

        sqlx::query(
            "INSERT INTO fragments (id, page_id, text_content, text_hash, span_start, span_end, kind) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(fragment.id.to_string())
        .bind(fragment.page_id.to_string())
        .bind(&fragment.text_content)
        .bind(&fragment.text_hash)
        .bind(fragment.span.0)
        .bind(fragment.span.1)
        .bind(fragment.kind.as_str())
        .execute(self.pool())
        .await?;

        sqlx::query("INSERT INTO fragments_fts (fragment_id, text_content) VALUES (?, ?)")
            .bind(fragment.id.to_string())
            .bind(&fragment.text_content)
            .execute(self.pool())
            .await
            .ok();

        Ok(fragment)
    }

    pub async fn get_fragment(&self, id: Uuid) -> Result<Option<Fragment>> {
        let row = sqlx::query_as::<_, FragmentRow>(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM fragments WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(self.pool())
        .await?;
        row.map(FragmentRow::into_fragment).transpose()
    }

    pub async fn fragments_for_page(&self, page_id: Uuid) -> Result<Vec<Fragment>> {
        let rows = sqlx::query_as::<_, FragmentRow>(&format!(
            "SELECT {FRAGMENT_COLUMNS} FROM fragments WHERE page_id = ? ORDER BY span_start"
        ))
        .bind(page_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(FragmentRow::into_fragment).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::NewPage;

    async fn sample_page(store: &EvidenceStore) -> Uuid {
        store
            .upsert_page(NewPage {
                url: "https://example.com/a".to_string(),
                doi: None,
                domain: "example.com".to_string(),
                title: None,
                metadata: serde_json::json!({}),
                warc_path: None,
                har_path: None,
                screenshot_path: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn repeat_text_hash_within_page_does_not_duplicate() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let page_id = sample_page(&store).await;
        let first = store
            .insert_fragment(page_id, "Water boils at 100C.", "hash-1", (0, 21), FragmentKind::Body)
            .await
            .unwrap();
        let second = store
            .insert_fragment(page_id, "Water boils at 100C.", "hash-1", (0, 21), FragmentKind::Body)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.fragments_for_page(page_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_text_hash_on_a_different_page_is_a_distinct_fragment() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let page_a = sample_page(&store).await;
        let page_b = store
            .upsert_page(NewPage {
                url: "https://example.com/b".to_string(),
                doi: None,
                domain: "example.com".to_string(),
                title: None,
                metadata: serde_json::json!({}),
                warc_path: None,
                har_path: None,
                screenshot_path: None,
            })
            .await
            .unwrap()
            .id;
        let first = store
            .insert_fragment(page_a, "Shared text.", "hash-x", (0, 12), FragmentKind::Body)
            .await
            .unwrap();
        let second = store
            .insert_fragment(page_b, "Shared text.", "hash-x", (0, 12), FragmentKind::Body)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
    }
}
