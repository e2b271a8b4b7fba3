//! Remote rule-service client
//!
//! [`RemoteApi`] is the seam the engine depends on; [`HttpRemoteClient`] is
//! the production implementation. The list endpoint is paginated with a
//! continuation link; every call carries a bearer token and is bounded by
//! the configured timeout, with transient failures retried under the
//! crate's retry policy.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::model::{RemoteRule, RulePage};
use crate::retry::RetryPolicy;
use crate::settings::RemoteSettings;
use crate::{Error, Result};

/// Read access to the deployed rule set of an (organization, environment).
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch every deployed rule, following pagination until exhausted.
    async fn fetch_rules(&self, org: &str, env: &str) -> Result<Vec<RemoteRule>>;

    /// Fetch one rule with the fields the list endpoint omits
    /// (entity mappings, custom details).
    async fn fetch_rule_detail(&self, org: &str, env: &str, rule_id: &str) -> Result<RemoteRule>;
}

/// HTTP implementation of [`RemoteApi`].
pub struct HttpRemoteClient {
    http: reqwest::Client,
    settings: RemoteSettings,
    token: String,
    retry: RetryPolicy,
}

impl HttpRemoteClient {
    /// Build a client from settings, reading the bearer token from the
    /// configured environment variable.
    pub fn new(settings: RemoteSettings) -> Result<Self> {
        let token = settings.token()?;
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::transient(e.to_string()))?;
        let retry = RetryPolicy::with_max_attempts(settings.max_attempts);

        Ok(Self {
            http,
            settings,
            token,
            retry,
        })
    }

    fn rules_url(&self, org: &str, env: &str) -> String {
        format!(
            "{}/orgs/{}/environments/{}/rules?api-version={}",
            self.settings.base_url.trim_end_matches('/'),
            org,
            env,
            self.settings.api_version
        )
    }

    fn rule_detail_url(&self, org: &str, env: &str, rule_id: &str) -> String {
        format!(
            "{}/orgs/{}/environments/{}/rules/{}?api-version={}",
            self.settings.base_url.trim_end_matches('/'),
            org,
            env,
            rule_id,
            self.settings.api_version
        )
    }

    /// One GET with auth, status classification, and JSON decoding.
    /// Retried under the policy; 404 handling is left to the caller via
    /// the returned `Api { status: 404, .. }`.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.retry
            .run(|| async {
                let response = self
                    .http
                    .get(url)
                    .bearer_auth(&self.token)
                    .send()
                    .await
                    .map_err(classify_transport)?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(classify_status(status.as_u16(), body));
                }

                response
                    .json::<T>()
                    .await
                    .map_err(|e| Error::Decode {
                        message: e.to_string(),
                    })
            })
            .await
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteClient {
    async fn fetch_rules(&self, org: &str, env: &str) -> Result<Vec<RemoteRule>> {
        let mut rules = Vec::new();
        let mut url = self.rules_url(org, env);
        let mut pages = 0usize;

        loop {
            let page: RulePage = self.get_json(&url).await.map_err(|e| match e {
                // A 404 on the collection means the environment itself is unknown.
                Error::Api { status: 404, .. } => Error::EnvironmentNotFound {
                    org: org.to_string(),
                    env: env.to_string(),
                },
                other => other,
            })?;

            pages += 1;
            rules.extend(page.value);

            match page.next_link {
                Some(next) => url = next,
                None => break,
            }
        }

        tracing::debug!(org, env, pages, count = rules.len(), "fetched deployed rules");
        Ok(rules)
    }

    async fn fetch_rule_detail(&self, org: &str, env: &str, rule_id: &str) -> Result<RemoteRule> {
        let url = self.rule_detail_url(org, env, rule_id);
        self.get_json(&url).await
    }
}

fn classify_transport(error: reqwest::Error) -> Error {
    // Connection problems and timeouts are retryable; anything the server
    // answered is classified by status instead.
    Error::transient(error.to_string())
}

fn classify_status(status: u16, body: String) -> Error {
    let message = if body.is_empty() {
        "no response body".to_string()
    } else {
        body.chars().take(200).collect()
    };

    match status {
        401 | 403 => Error::Auth { status },
        408 | 429 => Error::Transient {
            message: format!("status {status}: {message}"),
        },
        s if s >= 500 => Error::Transient {
            message: format!("status {status}: {message}"),
        },
        _ => Error::Api { status, message },
    }
}
