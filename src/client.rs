//! Network clients.
//!
//! A [`NetworkClient`] binds one transport to client-level defaults (timeouts,
//! retry settings, headers, decoder, user agent, codec overrides). Per-request
//! params win over those defaults, except headers, which are layered.

use std::sync::Arc;

use http::HeaderValue;

use crate::codec::CodecRegistry;
use crate::config::{ClientConfig, TransportKind};
use crate::error::{Error, Result};
use crate::http::headers::{construct_headers, HeaderSource};
use crate::http::request::{Body, CommonParams, RequestParams};
use crate::http::response::ResponseHandle;
use crate::http::Engine;
use crate::transport::socket::default_user_agent;
use crate::transport::{
    FetchOptions, FetchTransport, SocketOptions, SocketTransport, Transport,
};

/// Client-level defaults.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub common: CommonParams,
    /// Explicit `User-Agent`, replacing any transport default.
    pub user_agent: Option<String>,
    /// Appended to the default socket user agent.
    pub service_name: Option<String>,
    /// Consulted before the default codecs when encoding request bodies.
    pub codecs: Option<CodecRegistry>,
}

impl ClientOptions {
    /// Keep every option set here, filling the rest from `fallback`.
    pub fn or(self, fallback: &ClientOptions) -> Self {
        Self {
            common: self.common.or(&fallback.common),
            user_agent: self.user_agent.or_else(|| fallback.user_agent.clone()),
            service_name: self.service_name.or_else(|| fallback.service_name.clone()),
            codecs: self.codecs.or_else(|| fallback.codecs.clone()),
        }
    }
}

/// Issues requests through one transport with shared defaults.
#[derive(Debug, Clone)]
pub struct NetworkClient {
    transport: Arc<dyn Transport>,
    options: ClientOptions,
    /// Transport-specific user agent used when none is configured.
    default_user_agent: Option<String>,
    engine: Engine,
}

impl NetworkClient {
    /// Bind any transport. No user agent is sent unless configured.
    pub fn new(transport: Arc<dyn Transport>, options: ClientOptions) -> Result<Self> {
        Self::build(transport, options, None)
    }

    /// Pooled socket client with default pool settings.
    pub fn socket(options: ClientOptions) -> Result<Self> {
        Self::socket_with(SocketOptions::default(), options)
    }

    pub fn socket_with(socket: SocketOptions, options: ClientOptions) -> Result<Self> {
        let user_agent = default_user_agent(options.service_name.as_deref());
        Self::build(Arc::new(SocketTransport::new(socket)), options, Some(user_agent))
    }

    pub fn fetch(fetch: FetchOptions, options: ClientOptions) -> Result<Self> {
        Self::build(Arc::new(FetchTransport::new(fetch)), options, None)
    }

    /// Build the client a configuration file describes.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let options = ClientOptions {
            common: config.common_params()?,
            user_agent: config.user_agent.clone(),
            service_name: config.service_name.clone(),
            codecs: None,
        };

        match config.transport.kind {
            TransportKind::Socket => Self::socket_with(config.socket_options(), options),
            TransportKind::Fetch => Self::fetch(config.fetch_options(), options),
        }
    }

    fn build(
        transport: Arc<dyn Transport>,
        options: ClientOptions,
        default_user_agent: Option<String>,
    ) -> Result<Self> {
        let mut engine = Engine::new();
        if let Some(user_agent) = options.user_agent.as_ref().or(default_user_agent.as_ref()) {
            let value = HeaderValue::from_str(user_agent)
                .map_err(|_| Error::InvalidHeader(format!("user-agent: {user_agent}")))?;
            engine = engine.with_user_agent(value);
        }
        if let Some(codecs) = &options.codecs {
            engine = engine.with_codecs(codecs.clone());
        }

        Ok(Self {
            transport,
            options,
            default_user_agent,
            engine,
        })
    }

    /// A client over the same transport whose unset options come from `augmented`.
    ///
    /// Options already set on this client keep precedence.
    pub fn augment(&self, augmented: ClientOptions) -> Result<Self> {
        let options = self.options.clone().or(&augmented);
        Self::build(self.transport.clone(), options, self.default_user_agent.clone())
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Issue a request, applying client defaults.
    pub async fn request(&self, url: &str, mut params: RequestParams) -> Result<ResponseHandle> {
        let headers = match (params.common.headers.take(), self.options.common.headers.clone()) {
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => Some(only),
            (Some(request), Some(client)) => Some(construct_headers([Some(request), Some(client)])),
        };

        params.common = CommonParams {
            headers,
            ..params.common.or(&self.options.common)
        };

        self.engine.request(self.transport.as_ref(), url, params).await
    }

    pub async fn get(&self, url: &str) -> Result<ResponseHandle> {
        self.request(url, RequestParams::get()).await
    }

    pub async fn post(&self, url: &str, body: impl Into<Body>) -> Result<ResponseHandle> {
        self.request(url, RequestParams::post().with_body(body)).await
    }
}

impl From<HeaderSource> for ClientOptions {
    fn from(headers: HeaderSource) -> Self {
        ClientOptions {
            common: CommonParams {
                headers: Some(headers),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn socket_client_has_default_user_agent() {
        let client = NetworkClient::socket(ClientOptions {
            service_name: Some("ledger".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.engine.user_agent().unwrap(),
            "Fetch Engine (socket-client,ledger)"
        );
    }

    #[test]
    fn fetch_client_sends_no_default_user_agent() {
        let client = NetworkClient::fetch(FetchOptions::default(), ClientOptions::default()).unwrap();
        assert!(client.engine.user_agent().is_none());
    }

    #[test]
    fn explicit_user_agent_wins() {
        let client = NetworkClient::socket(ClientOptions {
            user_agent: Some("custom/1.0".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.engine.user_agent().unwrap(), "custom/1.0");
    }

    #[test]
    fn invalid_user_agent_is_rejected() {
        let result = NetworkClient::socket(ClientOptions {
            user_agent: Some("bad\nagent".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn augment_keeps_existing_options() {
        let client = NetworkClient::socket(ClientOptions {
            common: CommonParams {
                timeout: Some(Duration::from_secs(5)),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();

        let augmented = client
            .augment(ClientOptions {
                common: CommonParams {
                    timeout: Some(Duration::from_secs(1)),
                    retry_attempts: Some(4),
                    ..Default::default()
                },
                user_agent: Some("augmented/1".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(augmented.options().common.timeout, Some(Duration::from_secs(5)));
        assert_eq!(augmented.options().common.retry_attempts, Some(4));
        assert_eq!(augmented.engine.user_agent().unwrap(), "augmented/1");
        assert!(Arc::ptr_eq(augmented.transport(), client.transport()));
    }

    #[test]
    fn augment_fills_defaults_left_by_config() {
        let mut config = ClientConfig::default();
        config.timeouts.read_ms = 1_000;
        let client = NetworkClient::from_config(&config).unwrap();

        let augmented = client
            .augment(ClientOptions {
                common: CommonParams {
                    timeout: Some(Duration::from_secs(2)),
                    read_timeout: Some(Duration::from_secs(9)),
                    retry_attempts: Some(3),
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();

        let common = &augmented.options().common;
        assert_eq!(common.timeout, Some(Duration::from_secs(2)));
        assert_eq!(common.read_timeout, Some(Duration::from_secs(1)));
        assert_eq!(common.retry_attempts, Some(3));
    }
}
