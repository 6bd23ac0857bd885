use crate::clients::{OpenAiClient, WebsiteClient};
use crate::core::{DirectoryStore, Listing, Stage, StageReport, TaskStatus, TaskType};
use crate::domain::model::ListingId;
use crate::utils::error::Result;
use crate::utils::html;
use async_trait::async_trait;
use std::sync::Arc;

pub const FETCH_FAILED: &str = "Failed to fetch website content";
pub const NO_CONTENT: &str = "No content found on website";
pub const GENERATION_FAILED: &str = "Failed to generate content";

pub fn description_prompt(website_content: &str) -> String {
    format!(
        "You are a professional content writer for jewelry stores. Using only the following content from the jeweler's website, \
write a natural, engaging 100-word description of the business. Focus on their history, expertise, and specialties.\n\
Maintain their authentic voice while making the content concise and compelling. Do not invent or assume any details \
not present in the source material.\n\nSource content:\n{}\n",
        website_content
    )
}

pub fn differentiator_prompt(website_content: &str) -> String {
    format!(
        "You are a professional content writer for jewelry stores. Using only the following content from the jeweler's website, \
write a focused 100-word passage about what makes this jeweler unique compared to others. Highlight specific services, \
approaches, or philosophies that set them apart. Focus only on concrete differentiators mentioned in their content, \
avoiding generic claims or assumptions.\n\nSource content:\n{}\n",
        website_content
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub post_content: String,
    pub what_makes_us_different: String,
}

impl GeneratedContent {
    pub fn about_page_text(&self) -> String {
        format!(
            "{}\n\nWhat Makes Us Different:\n{}",
            self.post_content, self.what_makes_us_different
        )
    }

    pub fn apply_to(&self, listing: &mut Listing) {
        listing.about_page_text = Some(self.about_page_text());
        listing.blurb = Some(self.post_content.clone());
        listing.post_content = Some(self.post_content.clone());
        listing.what_makes_us_different = Some(self.what_makes_us_different.clone());
        listing.updated_at = chrono::Utc::now();
    }
}

/// Stage 2: turns jeweller websites into listing copy.
pub struct EnrichStage {
    store: Arc<dyn DirectoryStore>,
    website: WebsiteClient,
    openai: OpenAiClient,
    batch_size: usize,
    limit: Option<usize>,
}

impl EnrichStage {
    pub fn new(store: Arc<dyn DirectoryStore>, website: WebsiteClient, openai: OpenAiClient) -> Self {
        Self {
            store,
            website,
            openai,
            batch_size: 10,
            limit: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Home page, or the about page when one is linked and reachable.
    async fn source_text(&self, url: &str) -> std::result::Result<String, &'static str> {
        let home = self.website.try_fetch(url).await.ok_or(FETCH_FAILED)?;

        let page = match html::find_about_page_url(&home, url) {
            Some(about_url) => {
                tracing::debug!("About page for {}: {}", url, about_url);
                self.website.try_fetch(&about_url).await.unwrap_or(home)
            }
            None => home,
        };

        let text = html::extract_about_content(&page);
        if text.is_empty() {
            return Err(NO_CONTENT);
        }
        Ok(text)
    }

    async fn generate(&self, website_content: &str) -> Option<GeneratedContent> {
        let post_content = match self
            .openai
            .generate_blurb(&description_prompt(website_content))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Error generating blurb: {}", e);
                return None;
            }
        };
        let what_makes_us_different = match self
            .openai
            .generate_blurb(&differentiator_prompt(website_content))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Error generating blurb: {}", e);
                return None;
            }
        };

        Some(GeneratedContent {
            post_content,
            what_makes_us_different,
        })
    }

    async fn process_listing(&self, mut listing: Listing) -> Result<bool> {
        tracing::info!("🌐 Processing website: {}", listing.website_url);

        let task_id = self
            .store
            .insert_task(
                TaskType::ProcessWebsite,
                serde_json::json!({
                    "listing_id": listing.listing_id,
                    "website_url": listing.website_url,
                }),
            )
            .await?;
        self.store
            .update_task_status(task_id, TaskStatus::Processing, None)
            .await?;

        let outcome = match self.source_text(&listing.website_url).await {
            Ok(text) => self.generate(&text).await.ok_or(GENERATION_FAILED),
            Err(reason) => Err(reason),
        };

        match outcome {
            Ok(content) => {
                content.apply_to(&mut listing);
                self.store.update_listing(listing.clone()).await?;
                self.store
                    .update_task_status(task_id, TaskStatus::Completed, None)
                    .await?;
                tracing::info!("Updated listing {} with website content", listing.listing_id);
                Ok(true)
            }
            Err(reason) => {
                self.store
                    .update_task_status(task_id, TaskStatus::Failed, Some(reason.to_string()))
                    .await?;
                tracing::warn!("No content found for listing {}: {}", listing.listing_id, reason);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl Stage for EnrichStage {
    fn name(&self) -> &'static str {
        "enrich"
    }

    async fn run(&self) -> Result<StageReport> {
        let mut report = StageReport::default();
        let mut failed: Vec<ListingId> = Vec::new();

        loop {
            let remaining = match self.limit {
                Some(limit) if report.processed >= limit => break,
                Some(limit) => (limit - report.processed).min(self.batch_size),
                None => self.batch_size,
            };

            let batch = self
                .store
                .listings_needing_enrichment(remaining, &failed)
                .await?;
            if batch.is_empty() {
                tracing::info!("No more listings to process");
                break;
            }

            for listing in batch {
                let listing_id = listing.listing_id;
                let ok = self.process_listing(listing).await?;
                if !ok {
                    failed.push(listing_id);
                }
                report.record(ok);
            }
        }

        Ok(report)
    }
}
