//! Public book search API client (`GET /volumes`).

use std::time::Duration;

use async_trait::async_trait;
use shelf_kernel::settings::CatalogSettings;

use super::models::SearchPage;
use super::normalize::{normalize_volumes, VolumeList};
use super::provider::{BookLookup, CatalogError};
use super::query::{is_blank, SearchLimits};

pub struct VolumesClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limits: SearchLimits,
}

impl VolumesClient {
    pub fn new(settings: &CatalogSettings) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.public_base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            limits: SearchLimits::from(settings),
        })
    }

    async fn fetch(&self, query: &str, offset: u32, limit: u32) -> Result<VolumeList, CatalogError> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", query.to_string()),
            ("startIndex", offset.to_string()),
            ("maxResults", limit.to_string()),
            ("printType", "books".to_string()),
            ("orderBy", "relevance".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }

        tracing::debug!(
            %query,
            offset,
            limit,
            key = if self.api_key.is_some() { "set" } else { "not_set" },
            "volumes request"
        );

        let response = self
            .client
            .get(format!("{}/volumes", self.base_url))
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        Ok(response.json::<VolumeList>().await?)
    }
}

#[async_trait]
impl BookLookup for VolumesClient {
    fn name(&self) -> &'static str {
        "volumes"
    }

    async fn search(&self, query: &str, offset: u32, limit: u32) -> SearchPage {
        tracing::info!(provider = self.name(), %query, offset, limit, "search started");

        if is_blank(query) {
            tracing::warn!(provider = self.name(), "empty query received");
            return SearchPage::empty();
        }

        if !self.limits.accepts_offset(offset) {
            tracing::warn!(
                provider = self.name(),
                requested = offset,
                maximum = self.limits.max_start_index,
                "start index exceeds maximum"
            );
            return SearchPage::empty();
        }

        let limit = self.limits.clamp_limit(limit);

        match self.fetch(query, offset, limit).await {
            Ok(list) => {
                let items = normalize_volumes(list.items);
                tracing::info!(
                    provider = self.name(),
                    %query,
                    total_items = list.total_items,
                    returned = items.len(),
                    "search response received"
                );
                SearchPage {
                    items,
                    total_items: list.total_items,
                }
            }
            Err(error) => {
                tracing::error!(provider = self.name(), %query, %error, "search failed");
                SearchPage::empty()
            }
        }
    }
}
