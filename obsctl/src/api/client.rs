use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Certificate, Client, Method, RequestBuilder, Response};
use tokio::sync::Mutex;
use tracing::{Instrument, Span};
use url::Url;

use crate::auth::{Acquired, OidcAuthenticator};
use crate::config::{ContextRef, OidcConfig, SharedStore, TenantContext, Token};
use crate::error::{Error, Result};

/// Where a client writes the tokens it mints.
#[derive(Clone)]
pub struct TokenSink {
    store: SharedStore,
    context: ContextRef,
}

impl TokenSink {
    pub fn new(store: SharedStore, context: ContextRef) -> Self {
        Self { store, context }
    }

    async fn persist(&self, token: Token) -> Result<()> {
        self.store
            .lock()
            .await
            .update_token(&self.context, token)
    }
}

/// Builds HTTP clients for one tenant: custom trust anchors plus bearer tokens kept fresh
/// by an [`OidcAuthenticator`].
pub struct AuthenticatedClientFactory {
    authenticator: Arc<OidcAuthenticator>,
    deadline: Option<Duration>,
    span: Span,
}

impl AuthenticatedClientFactory {
    pub fn new(authenticator: Arc<OidcAuthenticator>, span: Span) -> Self {
        Self {
            authenticator,
            deadline: None,
            span,
        }
    }

    /// Applied as the request timeout of every client built.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Builds a client for `tenant` against `base_url`, authenticating right away so that
    /// bad credentials fail here rather than on the first request. Tokens minted now or
    /// later are handed to `sink` before they are used.
    pub async fn client(
        &self,
        base_url: Url,
        tenant: &TenantContext,
        sink: Option<TokenSink>,
    ) -> Result<AuthenticatedClient> {
        let span = tracing::debug_span!(parent: &self.span, "client", tenant = %tenant.tenant);
        let http = self.http_client(tenant.ca_file.as_deref())?;

        let oidc = match &tenant.oidc {
            Some(oidc) => {
                oidc.ensure_complete()?;
                Some(Mutex::new(oidc.clone()))
            }
            None => {
                span.in_scope(|| tracing::debug!("no OIDC configuration, requests go out unauthenticated"));
                None
            }
        };

        let client = AuthenticatedClient {
            http,
            base_url,
            authenticator: self.authenticator.clone(),
            oidc,
            sink,
            deadline: self.deadline,
            span,
        };
        client.current_token().await?;
        Ok(client)
    }

    /// Client for a context already stored in `store`; refreshed tokens are written back to it.
    pub async fn for_context(
        &self,
        store: &SharedStore,
        context: &ContextRef,
    ) -> Result<AuthenticatedClient> {
        let (url, tenant) = {
            let store = store.lock().await;
            let (api, tenant) = context.resolve(store.config())?;
            (api.url.clone(), tenant.clone())
        };
        let sink = TokenSink::new(store.clone(), context.clone());
        self.client(url, &tenant, Some(sink)).await
    }

    fn http_client(&self, ca_file: Option<&[u8]>) -> Result<Client> {
        let mut builder = Client::builder();
        if let Some(pem) = ca_file {
            let certificate =
                Certificate::from_pem(pem).map_err(|err| Error::validation("CA file", err.to_string()))?;
            builder = builder.add_root_certificate(certificate);
        }
        if let Some(deadline) = self.deadline {
            builder = builder.timeout(deadline);
        }
        builder
            .build()
            .map_err(|err| Error::validation("HTTP client configuration", err.to_string()))
    }
}

/// HTTP client that authorizes every request with a valid token of its tenant.
pub struct AuthenticatedClient {
    http: Client,
    base_url: Url,
    authenticator: Arc<OidcAuthenticator>,
    oidc: Option<Mutex<OidcConfig>>,
    sink: Option<TokenSink>,
    deadline: Option<Duration>,
    span: Span,
}

impl AuthenticatedClient {
    /// Build the full URL for `path` below the API base URL
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Unauthorized request builder; pass it to [`Self::send`].
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Returns a valid token, minting and persisting a new one first when needed.
    /// The token held in memory only changes once the new one is persisted.
    pub async fn current_token(&self) -> Result<Option<Token>> {
        let Some(oidc) = &self.oidc else {
            return Ok(None);
        };

        let mut oidc = oidc.lock().await;
        match self.authenticator.token(&oidc).await? {
            Acquired::Cached(token) => Ok(Some(token)),
            Acquired::Minted(token) => {
                if let Some(sink) = &self.sink {
                    sink.persist(token.clone()).await?;
                }
                oidc.token = Some(token.clone());
                Ok(Some(token))
            }
        }
    }

    /// The OIDC configuration including the latest token, for callers that persist it themselves.
    pub async fn oidc(&self) -> Option<OidcConfig> {
        match &self.oidc {
            Some(oidc) => Some(oidc.lock().await.clone()),
            None => None,
        }
    }

    /// Authorize and dispatch `request`.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match self.current_token().await? {
            Some(token) => request.header(AUTHORIZATION, token.authorization()),
            None => request,
        };

        let request = request
            .build()
            .map_err(|err| Error::validation("request", err.to_string()))?;
        let url = request.url().to_string();

        self.http
            .execute(request)
            .instrument(tracing::debug_span!(parent: &self.span, "request", %url))
            .await
            .map_err(|err| match self.deadline {
                Some(deadline) if err.is_timeout() => Error::Timeout(deadline),
                _ => Error::Request {
                    url,
                    message: err.to_string(),
                },
            })
    }

    /// Perform a GET request and return the body of a successful response
    pub async fn get(&self, path: &str) -> Result<String> {
        let response = self.send(self.request(Method::GET, path)).await?;
        Self::handle_response(response).await
    }

    async fn handle_response(response: Response) -> Result<String> {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await.map_err(|err| Error::Request {
            url: url.clone(),
            message: err.to_string(),
        })?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(Error::Status { url, status, body })
        }
    }
}
