use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::pool::EvidenceStore;

#[derive(Debug, Clone)]
pub struct Page {
    pub id: Uuid,
    pub url: String,
    pub doi: Option<String>,
    pub domain: String,
    pub title: Option<String>,
    pub metadata: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub warc_path: Option<String>,
    pub har_path: Option<String>,
    pub screenshot_path: Option<String>,
}

#[derive(FromRow)]
struct PageRow {
    id: String,
    url: String,
    doi: Option<String>,
    domain: String,
    title: Option<String>,
    metadata_json: String,
    fetched_at: String,
    warc_path: Option<String>,
    har_path: Option<String>,
    screenshot_path: Option<String>,
}

impl PageRow {
    fn into_page(self) -> Result<Page> {
        Ok(Page {
            id: Uuid::parse_str(&self.id).map_err(|_| StoreError::CorruptJson("pages.id".into()))?,
            url: self.url,
            doi: self.doi,
            domain: self.domain,
            title: self.title,
            metadata: serde_json::from_str(&self.metadata_json).unwrap_or(serde_json::json!({})),
            fetched_at: DateTime::parse_from_rfc3339(&self.fetched_at)
                .map_err(|_| StoreError::CorruptJson("pages.fetched_at".into()))?
                .with_timezone(&Utc),
            warc_path: self.warc_path,
            har_path: self.har_path,
            screenshot_path: self.screenshot_path,
        })
    }
}

const PAGE_COLUMNS: &str =
    "id, url, doi, domain, title, metadata_json, fetched_at, warc_path, har_path, screenshot_path";

/// New page observation, prior to dedup. `doi`/`url` drive the dedup key;
/// archive paths are best-effort and may be filled in later.
pub struct NewPage {
    pub url: String,
    pub doi: Option<String>,
    pub domain: String,
    pub title: Option<String>,
    pub metadata: serde_json::Value,
    pub warc_path: Option<String>,
    pub har_path: Option<String>,
    pub screenshot_path: Option<String>,
}

impl EvidenceStore {
    /// Inserts a page, or returns the existing row if one already matches
    /// by DOI (when present) or by URL otherwise — a page is never
    /// overwritten; on a repeat observation, `metadata` is shallow-merged
    /// into the existing JSON object rather than replacing it (spec
    /// section 3 invariant: "never overwritten ... metadata may be
    /// merged").
    pub async fn upsert_page(&self, new_page: NewPage) -> Result<Page> {
        let existing = if let Some(doi) = new_page.doi.as_deref() {
            self.find_page_by_doi(doi).await?
        } else {
            None
        };
        let existing = match existing {
            Some(page) => Some(page),
            None => self.find_page_by_url(&new_page.url).await?,
        };

        if let Some(mut page) = existing {
            if let (Some(existing_obj), Some(incoming_obj)) =
                (page.metadata.as_object_mut(), new_page.metadata.as_object())
            {
                for (key, value) in incoming_obj {
                    existing_obj.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            sqlx::query("UPDATE pages SET metadata_json = ? WHERE id = ?")
                .bind(page.metadata.to_string())
                .bind(page.id.to_string())
                .execute(self.pool())
                .await?;
            return Ok(page);
        }

        let page = Page {
            id: lyra_core::new_id(),
            url: new_page.url,
            doi: new_page.doi,
            domain: new_page.domain,
            title: new_page.title,
            metadata: new_page.metadata,
            fetched_at: lyra_core::now(),
            warc_path: new_page.warc_path,
            har_path: new_page.har_path,
            screenshot_path: new_page.screenshot_path,
        };

        sqlx::query(
            "INSERT INTO pages (id, url, doi, domain, title, metadata_json, fetched_at, warc_path, har_path, screenshot_path) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(page.id.to_string())
        .bind(&page.url)
        .bind(&page.doi)
        .bind(&page.domain)
        .bind(&page.title)
        .bind(page.metadata.to_string())
        .bind(page.fetched_at.to_rfc3339())
        .bind(&page.warc_path)
        .bind(&page.har_path)
        .bind(&page.screenshot_path)
        .execute(self.pool())
        .await?;

        Ok(page)
    }

    pub async fn find_page_by_url(&self, url: &str) -> Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE url = ?"))
            .bind(url)
            .fetch_optional(self.pool())
            .await?;
        row.map(PageRow::into_page).transpose()
    }

    pub async fn find_page_by_doi(&self, doi: &str) -> Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE doi = ?"))
            .bind(doi)
            .fetch_optional(self.pool())
            .await?;
        row.map(PageRow::into_page).transpose()
    }

    pub async fn get_page(&self, id: Uuid) -> Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(PageRow::into_page).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(url: &str, doi: Option<&str>) -> NewPage {
        NewPage {
            url: url.to_string(),
            doi: doi.map(str::to_string),
            domain: "example.com".to_string(),
            title: Some("Title".to_string()),
            metadata: serde_json::json!({"authors": ["A. Author"]}),
            warc_path: None,
            har_path: None,
            screenshot_path: None,
        }
    }

    #[tokio::test]
    async fn repeat_url_observation_reuses_the_same_row() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let first = store.upsert_page(sample("https://example.com/a", None)).await.unwrap();
        let second = store.upsert_page(sample("https://example.com/a", None)).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn doi_takes_precedence_over_url_for_dedup() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let first = store
            .upsert_page(sample("https://example.com/a", Some("10.1/abc")))
            .await
            .unwrap();
        // Same DOI, different URL (e.g. a mirror) still dedups to the same page.
        let second = store
            .upsert_page(sample("https://mirror.example.com/a", Some("10.1/abc")))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.url, "https://example.com/a");
    }

    #[tokio::test]
    async fn metadata_is_merged_not_overwritten() {
        let store = EvidenceStore::in_memory().await.unwrap();
        let mut first_new = sample("https://example.com/a", None);
        first_new.metadata = serde_json::json!({"year": 2020});
        store.upsert_page(first_new).await.unwrap();

        let mut second_new = sample("https://example.com/a", None);
        second_new.metadata = serde_json::json!({"venue": "journal"});
        let merged = store.upsert_page(second_new).await.unwrap();

        assert_eq!(merged.metadata["year"], 2020);
        assert_eq!(merged.metadata["venue"], "journal");
    }
}
