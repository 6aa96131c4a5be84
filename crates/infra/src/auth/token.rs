//! Bearer token caching with single-flight refresh

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use repolink_common::resilience::{Clock, SystemClock};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{AuthError, AuthScheme, CredentialProvider};

/// Lifetime assumed when a token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Upper bound on a single exchange unless configured otherwise.
const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Token returned by an exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_in: Duration,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Grant transport that trades configured credentials for an access token.
#[async_trait]
pub trait TokenExchanger: Send + Sync + 'static {
    async fn exchange(&self) -> Result<AccessToken, AuthError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Parse a token endpoint response shared by both grant types.
///
/// `expires_in` is read as seconds.
pub(crate) async fn read_token_response(response: reqwest::Response) -> Result<AccessToken, AuthError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(AuthError::Exchange {
            status: Some(status.as_u16()),
            message: describe_token_error(&body),
        });
    }

    let parsed: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| AuthError::InvalidResponse(format!("malformed token response: {e}")))?;
    if parsed.access_token.is_empty() {
        return Err(AuthError::InvalidResponse("empty access_token".into()));
    }

    Ok(AccessToken {
        value: parsed.access_token,
        expires_in: parsed.expires_in.map(Duration::from_secs).unwrap_or(DEFAULT_TOKEN_LIFETIME),
    })
}

fn describe_token_error(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return "token endpoint rejected the request".to_string();
    };
    let code = value.get("error").and_then(|v| v.as_str()).unwrap_or("unknown_error");
    match value.get("error_description").and_then(|v| v.as_str()) {
        Some(description) => format!("{code}: {description}"),
        None => code.to_string(),
    }
}

//==============================================================================
// Token cache
//==============================================================================

type RefreshFuture = Shared<BoxFuture<'static, Result<AccessToken, AuthError>>>;

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn needs_refresh(&self, now: Instant, threshold: Duration) -> bool {
        now + threshold >= self.expires_at
    }
}

#[derive(Default)]
struct TokenState {
    current: Option<CachedToken>,
    pending: Option<(u64, RefreshFuture)>,
    generation: u64,
}

/// Cached bearer token with single-flight refresh.
///
/// The first caller that finds the token absent or within
/// `refresh_threshold` of expiry starts an exchange and parks a shared
/// handle to it. Every caller arriving while it runs awaits the same handle,
/// so N concurrent callers cause exactly one exchange.
///
/// An exchange that outlives `exchange_timeout` fails with
/// [`AuthError::Transport`], so a hung token endpoint never pins the
/// pending handle.
pub struct TokenCache<C: Clock = SystemClock> {
    state: Mutex<TokenState>,
    refresh_threshold: Duration,
    exchange_timeout: Duration,
    exchanges: AtomicU64,
    clock: C,
}

impl TokenCache<SystemClock> {
    pub fn new(refresh_threshold: Duration) -> Self {
        Self::with_clock(refresh_threshold, SystemClock)
    }
}

impl<C: Clock> TokenCache<C> {
    pub fn with_clock(refresh_threshold: Duration, clock: C) -> Self {
        Self {
            state: Mutex::new(TokenState::default()),
            refresh_threshold,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            exchanges: AtomicU64::new(0),
            clock,
        }
    }

    #[must_use]
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Current token, refreshing through `exchanger` when needed.
    pub async fn access_token(&self, exchanger: &Arc<dyn TokenExchanger>) -> Result<String, AuthError> {
        let (generation, refresh) = {
            let mut state = self.state.lock();
            let now = self.clock.now();

            if let Some(token) = state.current.as_ref() {
                if !token.needs_refresh(now, self.refresh_threshold) {
                    return Ok(token.value.clone());
                }
            }

            match state.pending.as_ref() {
                Some((generation, refresh)) => (*generation, refresh.clone()),
                None => {
                    state.generation += 1;
                    let generation = state.generation;
                    let exchanger = Arc::clone(exchanger);
                    let deadline = self.exchange_timeout;
                    let refresh = async move {
                        tokio::time::timeout(deadline, exchanger.exchange()).await.unwrap_or_else(
                            |_| {
                                Err(AuthError::Transport(format!(
                                    "token exchange timed out after {}ms",
                                    deadline.as_millis()
                                )))
                            },
                        )
                    }
                    .boxed()
                    .shared();
                    state.pending = Some((generation, refresh.clone()));
                    self.exchanges.fetch_add(1, Ordering::Relaxed);
                    debug!(generation, "starting token refresh");
                    (generation, refresh)
                }
            }
        };

        let result = refresh.await;

        let mut state = self.state.lock();
        if matches!(state.pending, Some((pending, _)) if pending == generation) {
            state.pending = None;
            match &result {
                Ok(token) => {
                    state.current = Some(CachedToken {
                        value: token.value.clone(),
                        expires_at: self.clock.now() + token.expires_in,
                    });
                    info!(expires_in_secs = token.expires_in.as_secs(), "access token refreshed");
                }
                Err(error) => warn!(error = %error, "token refresh failed"),
            }
        }

        result.map(|token| token.value)
    }

    /// Forget the cached token; an in-flight refresh is left to finish.
    pub fn invalidate(&self) {
        self.state.lock().current = None;
    }

    /// Number of exchanges started since construction.
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    /// Whether a token is cached and outside the refresh threshold.
    pub fn has_valid_token(&self) -> bool {
        let now = self.clock.now();
        self.state
            .lock()
            .current
            .as_ref()
            .is_some_and(|token| !token.needs_refresh(now, self.refresh_threshold))
    }
}

//==============================================================================
// Bearer provider
//==============================================================================

/// Bearer-token provider backed by a [`TokenExchanger`].
pub struct TokenCredentials<C: Clock = SystemClock> {
    scheme: AuthScheme,
    exchanger: Arc<dyn TokenExchanger>,
    cache: TokenCache<C>,
}

impl<C: Clock> TokenCredentials<C> {
    pub fn new(scheme: AuthScheme, exchanger: Arc<dyn TokenExchanger>, cache: TokenCache<C>) -> Self {
        Self { scheme, exchanger, cache }
    }

    pub fn cache(&self) -> &TokenCache<C> {
        &self.cache
    }
}

#[async_trait]
impl<C: Clock> CredentialProvider for TokenCredentials<C> {
    fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    async fn ensure_valid(&self) -> Result<(), AuthError> {
        self.cache.access_token(&self.exchanger).await.map(|_| ())
    }

    async fn auth_headers(&self) -> Result<HeaderMap, AuthError> {
        let token = self.cache.access_token(&self.exchanger).await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| AuthError::InvalidResponse("access token is not a valid header".into()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    fn invalidate(&self) {
        debug!(scheme = %self.scheme, "invalidating cached token");
        self.cache.invalidate();
    }
}
