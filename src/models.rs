/// Model catalog: listing from the provider plus supplementary-details
/// hydration from a models.dev-style document, cached for the process
/// lifetime.
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::ProviderConfig;
use crate::error::BridgeError;
use crate::protocol::{ModelDetailsProvider, ModelDevDetails, ModelsResponse};
use crate::transport::{HttpTransport, RETRY_MAX_ATTEMPTS};

pub const DEFAULT_CONTEXT_LENGTH: u64 = 128_000;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u64 = 16_000;

const DEFAULT_FAMILY: &str = "synthetic";
const DEFAULT_VERSION: &str = "1.0.0";

/// What a model can do, as far as the adapter cares.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelCapabilities {
    pub tool_calling: bool,
    pub image_input: bool,
    pub supports_thinking: bool,
}

/// A model as presented to the host.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub tooltip: String,
    pub detail: String,
    pub family: String,
    pub version: String,
    pub max_input_tokens: u64,
    pub max_output_tokens: u64,
    pub capabilities: ModelCapabilities,
}

impl ModelInfo {
    /// Fallback info for a listed model with no supplementary details.
    #[must_use]
    pub fn defaults_for(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            tooltip: "Synthetic".to_string(),
            detail: "Synthetic.new".to_string(),
            family: DEFAULT_FAMILY.to_string(),
            version: DEFAULT_VERSION.to_string(),
            max_input_tokens: DEFAULT_CONTEXT_LENGTH,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            capabilities: ModelCapabilities::default(),
        }
    }
}

type DetailsMap = FxHashMap<String, ModelDevDetails>;

/// Catalog service. The details cache is process-wide and read-through:
/// concurrent lookups may race to fetch, but only the first result is
/// installed and entries are never mutated afterwards.
pub struct ModelCatalog {
    transport: Arc<HttpTransport>,
    base_url: String,
    details_url: String,
    details_provider: String,
    details: RwLock<Option<Arc<DetailsMap>>>,
}

impl ModelCatalog {
    #[must_use]
    pub fn new(transport: Arc<HttpTransport>, config: &ProviderConfig) -> Self {
        Self {
            transport,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            details_url: config.api.model_details_url.clone(),
            details_provider: config.api.model_details_provider.clone(),
            details: RwLock::new(None),
        }
    }

    /// List the provider's models, hydrated with supplementary details
    /// where available.
    ///
    /// # Errors
    ///
    /// Returns a transport/upstream error when the listing request fails.
    /// Hydration failures are not errors; affected models fall back to
    /// defaults.
    pub async fn list_models(&self, api_key: &str) -> Result<Vec<ModelInfo>, BridgeError> {
        let url = format!("{}/models", self.base_url);
        let listing: ModelsResponse = self.transport.get_json(&url, Some(api_key)).await?;
        tracing::debug!(count = listing.data.len(), "fetched model listing");

        let mut infos = Vec::with_capacity(listing.data.len());
        for item in listing.data {
            let info = self
                .hydrate(&item.id)
                .await
                .unwrap_or_else(|| ModelInfo::defaults_for(&item.id));
            infos.push(info);
        }
        Ok(infos)
    }

    /// Hydrate one model id from the supplementary details document.
    ///
    /// Returns `None` when the document is unavailable, the model is not in
    /// it, or its details say it cannot call tools (such models keep the
    /// conservative defaults).
    pub async fn hydrate(&self, model_id: &str) -> Option<ModelInfo> {
        let details_map = self.details_map().await?;
        let details = details_map.get(model_id)?;
        if !details.tool_call {
            tracing::debug!(model_id, "model does not support tool calling; using defaults");
            return None;
        }

        let name = details.name.clone().unwrap_or_else(|| model_id.to_string());
        let limits = details.limit.clone().unwrap_or_default();
        let image_input = details
            .modalities
            .as_ref()
            .is_some_and(|m| m.input.iter().any(|kind| kind == "image"));

        Some(ModelInfo {
            id: model_id.to_string(),
            name: name.clone(),
            tooltip: name,
            detail: "Synthetic.new".to_string(),
            family: DEFAULT_FAMILY.to_string(),
            version: DEFAULT_VERSION.to_string(),
            max_input_tokens: limits.context.unwrap_or(DEFAULT_CONTEXT_LENGTH),
            max_output_tokens: limits.output.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            capabilities: ModelCapabilities {
                tool_calling: details.tool_call,
                image_input,
                supports_thinking: details.reasoning,
            },
        })
    }

    /// Read-check-populate on the process-wide details cache.
    async fn details_map(&self) -> Option<Arc<DetailsMap>> {
        if let Some(map) = self.details.read().clone() {
            return Some(map);
        }

        let document: FxHashMap<String, ModelDetailsProvider> = match self
            .transport
            .get_json_with_retry(&self.details_url, None, RETRY_MAX_ATTEMPTS)
            .await
        {
            Ok(document) => document,
            Err(err) => {
                tracing::warn!("failed to fetch model details: {err}");
                return None;
            }
        };

        let map = Arc::new(
            document
                .get(&self.details_provider)
                .map(|provider| provider.models.clone())
                .unwrap_or_default(),
        );
        if map.is_empty() {
            tracing::warn!(
                provider = %self.details_provider,
                "model details document has no entries for provider"
            );
        }

        let mut slot = self.details.write();
        if let Some(existing) = slot.as_ref() {
            // Another lookup won the race; keep its map.
            return Some(Arc::clone(existing));
        }
        *slot = Some(Arc::clone(&map));
        Some(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_unhydrated_model() {
        let info = ModelInfo::defaults_for("mystery-model");
        assert_eq!(info.id, "mystery-model");
        assert_eq!(info.name, "mystery-model");
        assert_eq!(info.max_input_tokens, DEFAULT_CONTEXT_LENGTH);
        assert_eq!(info.max_output_tokens, DEFAULT_MAX_OUTPUT_TOKENS);
        assert!(!info.capabilities.tool_calling);
        assert!(!info.capabilities.supports_thinking);
    }

    #[test]
    fn test_details_document_parses_provider_subtree() {
        let raw = r#"{
            "synthetic": {
                "models": {
                    "big-thinker": {
                        "name": "Big Thinker",
                        "reasoning": true,
                        "tool_call": true,
                        "modalities": {"input": ["text", "image"], "output": ["text"]},
                        "limit": {"context": 200000, "output": 32000}
                    },
                    "no-tools": {"name": "No Tools", "tool_call": false}
                }
            },
            "other": {"models": {}}
        }"#;
        let document: FxHashMap<String, ModelDetailsProvider> =
            serde_json::from_str(raw).unwrap();
        let models = &document.get("synthetic").unwrap().models;
        let details = models.get("big-thinker").unwrap();
        assert!(details.reasoning);
        assert!(details.tool_call);
        assert_eq!(details.limit.as_ref().unwrap().context, Some(200_000));
        assert!(!models.get("no-tools").unwrap().tool_call);
    }
}
