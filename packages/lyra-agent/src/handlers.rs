//! One [`JobHandler`] per [`JobKind`], registered against the scheduler
//! at startup. Each handler is a thin adapter: pull the job's `input`
//! out of its `serde_json::Value`, call into the real library crate,
//! persist the result, and enqueue whatever follow-on job the pipeline
//! needs next (spec 4.8's job graph).

use std::sync::Arc;

use anyhow::{anyhow, Context};
use futures::future::BoxFuture;
use lyra_core::{DomainCategory, JobKind, NliRelation};
use lyra_extract::{merge_duplicate_claims, split_into_fragments, ExtractedClaim, FragmentConfig};
use lyra_fetch::{FetchOptions, FetchOutcome};
use lyra_nli::NliClient;
use lyra_scheduler::{JobHandler, JobOutcome, JobResult, Scheduler};
use lyra_store::{ClaimAdoptionStatus, FragmentKind, Job, NewPage, TargetType};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::collaborators::Collaborators;

const EMBED_MODEL_ID: &str = "lyra-default-embed-v1";

fn host_of(url: &str) -> anyhow::Result<String> {
    Url::parse(url)?
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("url {url} has no host"))
}

fn require_task_id(job: &Job) -> anyhow::Result<uuid::Uuid> {
    job.task_id.ok_or_else(|| anyhow!("job {} has no task_id", job.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_core::JobState;

    #[test]
    fn host_of_extracts_the_host() {
        assert_eq!(host_of("https://example.gov/path?q=1").unwrap(), "example.gov");
    }

    #[test]
    fn host_of_rejects_a_hostless_url() {
        assert!(host_of("not a url").is_err());
    }

    fn job_with_task(task_id: Option<uuid::Uuid>) -> Job {
        Job {
            id: uuid::Uuid::new_v4(),
            kind: JobKind::Fetch,
            priority: 0,
            input: serde_json::json!({}),
            state: JobState::Queued,
            enqueued_at: lyra_core::now(),
            started_at: None,
            output: None,
            cause_id: None,
            parent_id: None,
            task_id,
        }
    }

    #[test]
    fn require_task_id_rejects_a_taskless_job() {
        assert!(require_task_id(&job_with_task(None)).is_err());
    }

    #[test]
    fn require_task_id_returns_the_task() {
        let task_id = uuid::Uuid::new_v4();
        assert_eq!(require_task_id(&job_with_task(Some(task_id))).unwrap(), task_id);
    }
}

/// Registers every job handler against `scheduler`. Called once at
/// startup, before `recover()`/`run()`.
pub fn register_all(scheduler: &Scheduler, collaborators: Arc<Collaborators>) {
    scheduler.register_handler(JobKind::Serp, serp_handler(collaborators.clone()));
    scheduler.register_handler(JobKind::Fetch, fetch_handler(collaborators.clone()));
    scheduler.register_handler(JobKind::Extract, extract_handler(collaborators.clone()));
    scheduler.register_handler(JobKind::Embed, embed_handler(collaborators.clone()));
    scheduler.register_handler(JobKind::LlmExtract, llm_extract_handler(collaborators.clone()));
    scheduler.register_handler(JobKind::Nli, nli_handler(collaborators.clone()));
    scheduler.register_handler(JobKind::Compose, compose_handler(collaborators.clone()));
    scheduler.register_handler(JobKind::Rank, rank_handler(collaborators));
}

fn serp_handler(collaborators: Arc<Collaborators>) -> JobHandler {
    Arc::new(move |job: Job, _cancel: CancellationToken| -> BoxFuture<'static, JobResult> {
        let collaborators = collaborators.clone();
        Box::pin(async move {
            let task_id = require_task_id(&job)?;
            let search_id: uuid::Uuid = serde_json::from_value(
                job.input.get("search_id").cloned().ok_or_else(|| anyhow!("serp job missing search_id"))?,
            )?;
            let query = job
                .input
                .get("query")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("serp job missing query"))?
                .to_string();

            let search = collaborators
                .store
                .get_search(search_id)
                .await?
                .ok_or_else(|| anyhow!("unknown search {search_id}"))?;
            let options: lyra_search::SearchOptions =
                serde_json::from_value(search.options_json.clone()).unwrap_or_default();

            let engine = collaborators.search.choose_engine().context("no usable search engine")?;
            let items = collaborators.search.search_paginated(task_id, &query, &engine, &options).await?;

            for item in &items {
                let domain = host_of(&item.url).unwrap_or_default();
                collaborators
                    .scheduler
                    .enqueue(
                        JobKind::Fetch,
                        serde_json::json!({"url": item.url, "domain": domain, "search_id": search_id}),
                        Some(job.id),
                        Some(task_id),
                    )
                    .await?;
            }

            let harvest_rate = if items.is_empty() { 0.0 } else { 1.0 };
            collaborators.store.set_search_status(search_id, "done", harvest_rate).await?;

            Ok(JobOutcome::Done(serde_json::json!({"results": items.len()})))
        })
    })
}

fn fetch_handler(collaborators: Arc<Collaborators>) -> JobHandler {
    Arc::new(move |job: Job, _cancel: CancellationToken| -> BoxFuture<'static, JobResult> {
        let collaborators = collaborators.clone();
        Box::pin(async move {
            let task_id = require_task_id(&job)?;
            let url = job
                .input
                .get("url")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("fetch job missing url"))?
                .to_string();
            let domain = host_of(&url)?;

            let outcome = collaborators.fetcher.fetch(&url, task_id, &FetchOptions::new()).await?;
            match outcome {
                FetchOutcome::Blocked(_) => Ok(JobOutcome::AwaitingAuth),
                FetchOutcome::Success(result) => {
                    let page = collaborators
                        .store
                        .upsert_page(NewPage {
                            url: result.final_url.clone(),
                            doi: None,
                            domain,
                            title: None,
                            metadata: serde_json::json!({"content_type": result.content_type, "status": result.status}),
                            warc_path: result.archive_refs.warc_path.clone(),
                            har_path: result.archive_refs.har_path.clone(),
                            screenshot_path: result.archive_refs.screenshot_path.clone(),
                        })
                        .await?;

                    collaborators
                        .scheduler
                        .enqueue(
                            JobKind::Extract,
                            serde_json::json!({"page_id": page.id, "body": result.body}),
                            Some(job.id),
                            Some(task_id),
                        )
                        .await?;

                    Ok(JobOutcome::Done(serde_json::json!({"page_id": page.id})))
                }
            }
        })
    })
}

fn extract_handler(collaborators: Arc<Collaborators>) -> JobHandler {
    Arc::new(move |job: Job, _cancel: CancellationToken| -> BoxFuture<'static, JobResult> {
        let collaborators = collaborators.clone();
        Box::pin(async move {
            let task_id = require_task_id(&job)?;
            let page_id: uuid::Uuid = serde_json::from_value(
                job.input.get("page_id").cloned().ok_or_else(|| anyhow!("extract job missing page_id"))?,
            )?;
            let body = job
                .input
                .get("body")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("extract job missing body"))?;

            let body_text = lyra_extract::extract_body_text(body);
            let fragments = split_into_fragments(&body_text, &FragmentConfig::default());

            let mut offset: i64 = 0;
            for fragment in &fragments {
                let start = offset;
                let end = start + fragment.text.len() as i64;
                offset = end;
                let stored = collaborators
                    .store
                    .insert_fragment(page_id, &fragment.text, &fragment.text_hash, (start, end), FragmentKind::Body)
                    .await?;
                collaborators
                    .scheduler
                    .enqueue(
                        JobKind::Embed,
                        serde_json::json!({"fragment_id": stored.id}),
                        Some(job.id),
                        Some(task_id),
                    )
                    .await?;
            }

            collaborators
                .scheduler
                .enqueue(
                    JobKind::LlmExtract,
                    serde_json::json!({"page_id": page_id, "body_text": body_text}),
                    Some(job.id),
                    Some(task_id),
                )
                .await?;

            Ok(JobOutcome::Done(serde_json::json!({"fragment_count": fragments.len()})))
        })
    })
}

fn embed_handler(collaborators: Arc<Collaborators>) -> JobHandler {
    Arc::new(move |job: Job, _cancel: CancellationToken| -> BoxFuture<'static, JobResult> {
        let collaborators = collaborators.clone();
        Box::pin(async move {
            if let Some(raw) = job.input.get("fragment_id") {
                let fragment_id: uuid::Uuid = serde_json::from_value(raw.clone())?;
                let fragment = collaborators
                    .store
                    .get_fragment(fragment_id)
                    .await?
                    .ok_or_else(|| anyhow!("unknown fragment {fragment_id}"))?;
                let vector = collaborators.llm_client.embed(&fragment.text_content).await?;
                collaborators
                    .store
                    .put_embedding(TargetType::Fragment, fragment_id, EMBED_MODEL_ID, &vector)
                    .await?;
                return Ok(JobOutcome::Done(serde_json::json!({"fragment_id": fragment_id})));
            }

            let claim_id: uuid::Uuid = serde_json::from_value(
                job.input.get("claim_id").cloned().ok_or_else(|| anyhow!("embed job missing fragment_id/claim_id"))?,
            )?;
            let claim = collaborators
                .store
                .get_claim(claim_id)
                .await?
                .ok_or_else(|| anyhow!("unknown claim {claim_id}"))?;
            let vector = collaborators.llm_client.embed(&claim.claim_text).await?;
            collaborators.store.put_embedding(TargetType::Claim, claim_id, EMBED_MODEL_ID, &vector).await?;
            Ok(JobOutcome::Done(serde_json::json!({"claim_id": claim_id})))
        })
    })
}

fn llm_extract_handler(collaborators: Arc<Collaborators>) -> JobHandler {
    Arc::new(move |job: Job, _cancel: CancellationToken| -> BoxFuture<'static, JobResult> {
        let collaborators = collaborators.clone();
        Box::pin(async move {
            let task_id = require_task_id(&job)?;
            let page_id: uuid::Uuid = serde_json::from_value(
                job.input.get("page_id").cloned().ok_or_else(|| anyhow!("llm_extract job missing page_id"))?,
            )?;
            let body_text = job
                .input
                .get("body_text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow!("llm_extract job missing body_text"))?;

            let raw_claims = collaborators.llm_client.extract_claims(body_text).await?;
            let mut extracted = Vec::with_capacity(raw_claims.len());
            for text in raw_claims {
                let embedding = collaborators.llm_client.embed(&text).await?;
                extracted.push(ExtractedClaim { text, embedding });
            }
            let merged = merge_duplicate_claims(extracted);

            for claim in &merged {
                let row = collaborators.store.insert_claim(task_id, &claim.text).await?;
                collaborators
                    .store
                    .put_embedding(TargetType::Claim, row.id, EMBED_MODEL_ID, &claim.embedding)
                    .await?;
                collaborators
                    .scheduler
                    .enqueue(
                        JobKind::Nli,
                        serde_json::json!({"claim_id": row.id, "page_id": page_id}),
                        Some(job.id),
                        Some(task_id),
                    )
                    .await?;
            }

            Ok(JobOutcome::Done(serde_json::json!({"claims": merged.len()})))
        })
    })
}

fn nli_handler(collaborators: Arc<Collaborators>) -> JobHandler {
    Arc::new(move |job: Job, _cancel: CancellationToken| -> BoxFuture<'static, JobResult> {
        let collaborators = collaborators.clone();
        Box::pin(async move {
            let claim_id: uuid::Uuid = serde_json::from_value(
                job.input.get("claim_id").cloned().ok_or_else(|| anyhow!("nli job missing claim_id"))?,
            )?;
            let page_id: uuid::Uuid = serde_json::from_value(
                job.input.get("page_id").cloned().ok_or_else(|| anyhow!("nli job missing page_id"))?,
            )?;

            let claim = collaborators
                .store
                .get_claim(claim_id)
                .await?
                .ok_or_else(|| anyhow!("unknown claim {claim_id}"))?;
            let page = collaborators.store.get_page(page_id).await?.ok_or_else(|| anyhow!("unknown page {page_id}"))?;
            let fragments = collaborators.store.fragments_for_page(page_id).await?;

            let category = match collaborators.store.get_domain_state(&page.domain).await? {
                Some(state) => state.category,
                None => DomainCategory::from_tld_heuristic(&page.domain),
            };

            let mut edges_created = 0usize;
            for fragment in &fragments {
                let prediction = collaborators.nli_client.classify(&fragment.text_content, &claim.claim_text).await?;
                let label = match prediction.label {
                    NliRelation::Supports => "supports",
                    NliRelation::Refutes => "refutes",
                    NliRelation::Neutral => "neutral",
                };
                collaborators
                    .store
                    .insert_nli_edge(fragment.id, claim_id, prediction.label, label, prediction.confidence, category, category)
                    .await?;
                edges_created += 1;
            }

            Ok(JobOutcome::Done(serde_json::json!({"edges": edges_created})))
        })
    })
}

fn rank_handler(collaborators: Arc<Collaborators>) -> JobHandler {
    Arc::new(move |job: Job, _cancel: CancellationToken| -> BoxFuture<'static, JobResult> {
        let collaborators = collaborators.clone();
        Box::pin(async move {
            let task_id = require_task_id(&job)?;
            let claims = collaborators.store.claims_for_task(task_id).await?;
            let mut candidates = Vec::with_capacity(claims.len());
            for claim in &claims {
                let embedding = collaborators.store.get_embedding(TargetType::Claim, claim.id, EMBED_MODEL_ID).await?;
                candidates.push(lyra_rank::Candidate {
                    text: claim.claim_text.clone(),
                    embedding,
                    item: claim.id,
                });
            }
            let query = job.input.get("query").and_then(|v| v.as_str()).unwrap_or("");
            let query_embedding = collaborators.llm_client.embed(query).await.unwrap_or_default();
            let ranked = lyra_rank::rank(query, &query_embedding, candidates, &lyra_rank::RankConfig::default());

            Ok(JobOutcome::Done(serde_json::json!({"ranked": ranked.len()})))
        })
    })
}

fn compose_handler(collaborators: Arc<Collaborators>) -> JobHandler {
    Arc::new(move |job: Job, _cancel: CancellationToken| -> BoxFuture<'static, JobResult> {
        let collaborators = collaborators.clone();
        Box::pin(async move {
            let task_id = require_task_id(&job)?;
            let claims = collaborators.store.claims_for_task(task_id).await?;
            let mut adopted = 0usize;
            let mut rejected = 0usize;
            for claim in &claims {
                match claim.adoption_status {
                    ClaimAdoptionStatus::Adopted => {
                        collaborators.store.get_claim_confidence(claim.id).await?;
                        adopted += 1;
                    }
                    ClaimAdoptionStatus::NotAdopted => rejected += 1,
                }
            }
            info!(task_id = %task_id, adopted, rejected, "task composed");
            Ok(JobOutcome::Done(serde_json::json!({"claims_adopted": adopted, "claims_rejected": rejected})))
        })
    })
}
