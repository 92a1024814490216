use std::{fmt, time::Duration};

use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use url::Url;

use super::{HttpError, Method, Route};

/// The authenticated request layer underneath [`InteractionsHttp`]
///
/// Implementations own network I/O, retries and rate limiting.  A successful
/// call with an empty body should resolve to [`Value::Null`].
///
/// [`InteractionsHttp`]: super::InteractionsHttp
#[async_trait::async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Perform a single request
    async fn request(&self, route: &Route, body: Option<&Value>) -> Result<Value, HttpError>;
}

impl From<Method> for reqwest::Method {
    fn from(value: Method) -> Self {
        match value {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Patch => Self::PATCH,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
        }
    }
}

#[derive(Clone)]
struct BotToken(String);

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotToken").finish_non_exhaustive()
    }
}

/// A [`Transport`] issuing requests directly with [`reqwest`], authenticated
/// with a bot token
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base: Url,
    token: BotToken,
}

impl ReqwestTransport {
    /// Construct a new transport for the given API base URL
    ///
    /// # Errors
    /// This function returns an error if the underlying client cannot be
    /// initialized.
    pub fn new(
        token: impl Into<String>,
        base: Url,
        timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let timeout = timeout.unwrap_or(Duration::from_secs(10));
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base,
            token: BotToken(token.into()),
        })
    }

    fn url(&self, route: &Route) -> String {
        format!(
            "{}{}",
            self.base.as_str().trim_end_matches('/'),
            route.resolved_path()
        )
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(level = "trace", skip(self, body), fields(%route))]
    async fn request(&self, route: &Route, body: Option<&Value>) -> Result<Value, HttpError> {
        let send_err = |source: reqwest::Error| HttpError::Send {
            route: route.to_string(),
            source,
        };

        let mut req = self
            .client
            .request(route.method().into(), self.url(route))
            .header(AUTHORIZATION, format!("Bot {}", self.token.0));

        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req.send().await.map_err(send_err)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(send_err)?;

        if !status.is_success() {
            return Err(HttpError::Status {
                route: route.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|source| HttpError::Decode {
            route: route.to_string(),
            source,
        })
    }
}
