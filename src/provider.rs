/// The host-facing chat provider: ties configuration, key storage, the
/// model catalog, request construction, and the streaming decoder into the
/// entry points a host calls.
use std::sync::Arc;

use crate::auth::{ensure_api_key, SecretStore};
use crate::config::ProviderConfig;
use crate::decode::decode_chat_stream;
use crate::error::BridgeError;
use crate::host::{CancelToken, HostCapabilities, HostMessage, PartSink};
use crate::models::{ModelCatalog, ModelInfo};
use crate::request::{build_chat_request, RequestOptions};
use crate::transport::HttpTransport;

pub struct ChatProvider {
    config: ProviderConfig,
    transport: Arc<HttpTransport>,
    catalog: ModelCatalog,
}

impl ChatProvider {
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the HTTP client cannot be
    /// built.
    pub fn new(config: ProviderConfig) -> Result<Self, BridgeError> {
        let transport = Arc::new(HttpTransport::new(
            &config.api.user_agent,
            config.api.timeout,
        )?);
        let catalog = ModelCatalog::new(Arc::clone(&transport), &config);
        Ok(Self {
            config,
            transport,
            catalog,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// List available models, hydrated with supplementary details.
    ///
    /// # Errors
    ///
    /// Returns an auth error when no API key is stored, or a
    /// transport/upstream error when the listing request fails.
    pub async fn list_models(
        &self,
        secrets: &dyn SecretStore,
    ) -> Result<Vec<ModelInfo>, BridgeError> {
        let api_key = ensure_api_key(secrets)?;
        self.catalog.list_models(&api_key).await
    }

    /// Stream one chat response, reporting parts to `sink` as they arrive.
    ///
    /// Resolves once the stream is fully drained or cancelled. Pre-flight
    /// failures (validation, token gate, connection, non-2xx) surface before
    /// any part is emitted; a strict-flush violation mid-stream aborts with
    /// [`BridgeError::ToolArguments`] without retracting already-emitted
    /// parts.
    ///
    /// # Errors
    ///
    /// See [`BridgeError`] for the failure taxonomy.
    pub async fn stream_response(
        &self,
        model: &ModelInfo,
        messages: &[HostMessage],
        options: &RequestOptions,
        secrets: &dyn SecretStore,
        sink: &mut dyn PartSink,
        cancel: &CancelToken,
    ) -> Result<(), BridgeError> {
        let api_key = ensure_api_key(secrets)?;
        let request = build_chat_request(model, messages, options, &self.config)?;
        let body = serde_json::to_vec(&request)
            .map_err(|err| BridgeError::InvalidRequest(format!("unserializable request: {err}")))?;

        let url = format!(
            "{}/chat/completions",
            self.config.api.base_url.trim_end_matches('/')
        );
        tracing::debug!(model = %model.id, url = %url, "opening chat stream");
        let byte_stream = self
            .transport
            .open_chat_stream(&url, &api_key, body)
            .await?;

        let capabilities = HostCapabilities {
            thinking_parts: self.config.features.thinking_parts,
        };
        decode_chat_stream(byte_stream, capabilities, sink, cancel).await
    }
}
