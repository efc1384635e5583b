//! PCO People API client
//!
//! Every outbound call goes through the shared [`SlidingWindowLimiter`], then
//! HTTP Basic auth. A 429 answer is retried a bounded number of times, waiting
//! for `Retry-After` seconds when PCO sends them and backing off exponentially
//! otherwise.

use pcoq_common::config::PcoSection;
use pcoq_common::SlidingWindowLimiter;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::person::{dedupe_by_id, Document, Person};

const USER_AGENT: &str = concat!("pcoq/", env!("CARGO_PKG_VERSION"));

/// Largest page PCO serves
pub const MAX_PAGE_SIZE: usize = 100;
pub const NAME_SEARCH_LIMIT: usize = 10;
pub const EMAIL_SEARCH_LIMIT: usize = 10;
pub const PHONE_SEARCH_LIMIT: usize = 10;
pub const GRADE_SEARCH_LIMIT: usize = 50;
pub const MEMBERSHIP_SEARCH_LIMIT: usize = 50;

/// PCO client errors
#[derive(Debug, Error)]
pub enum PcoError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("PCO API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("PCO rate limit still exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl PcoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PcoError::Api { status: 404, .. })
    }
}

/// Settings for [`PcoClient`]
#[derive(Clone)]
pub struct PcoClientConfig {
    pub base_url: String,
    pub application_id: String,
    pub secret: String,
    pub max_requests_per_second: u32,
    pub max_retries: u32,
    pub default_retry_after: Duration,
    pub max_backoff: Duration,
    pub timeout: Duration,
}

impl PcoClientConfig {
    pub fn from_section(
        section: &PcoSection,
        application_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: section.base_url.clone(),
            application_id: application_id.into(),
            secret: secret.into(),
            max_requests_per_second: section.max_requests_per_second,
            max_retries: section.max_retries,
            default_retry_after: Duration::from_millis(section.default_retry_after_ms),
            max_backoff: Duration::from_millis(section.max_backoff_ms),
            timeout: Duration::from_secs(section.timeout_secs),
        }
    }
}

// Credentials stay out of logs
impl fmt::Debug for PcoClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcoClientConfig")
            .field("base_url", &self.base_url)
            .field("application_id", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("max_requests_per_second", &self.max_requests_per_second)
            .field("max_retries", &self.max_retries)
            .field("default_retry_after", &self.default_retry_after)
            .field("max_backoff", &self.max_backoff)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Contact sub-resource created under a person
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildResource {
    PhoneNumber {
        number: String,
        location: String,
        primary: bool,
    },
    Email {
        address: String,
        location: String,
        primary: bool,
    },
    Address {
        street: String,
        city: String,
        state: String,
        zip: String,
        location: String,
    },
}

impl ChildResource {
    fn collection(&self) -> &'static str {
        match self {
            ChildResource::PhoneNumber { .. } => "phone_numbers",
            ChildResource::Email { .. } => "emails",
            ChildResource::Address { .. } => "addresses",
        }
    }

    fn resource_type(&self) -> &'static str {
        match self {
            ChildResource::PhoneNumber { .. } => "PhoneNumber",
            ChildResource::Email { .. } => "Email",
            ChildResource::Address { .. } => "Address",
        }
    }

    fn attributes(&self) -> Value {
        match self {
            ChildResource::PhoneNumber {
                number,
                location,
                primary,
            } => json!({"number": number, "location": location, "primary": primary}),
            ChildResource::Email {
                address,
                location,
                primary,
            } => json!({"address": address, "location": location, "primary": primary}),
            ChildResource::Address {
                street,
                city,
                state,
                zip,
                location,
            } => json!({
                "street": street,
                "city": city,
                "state": state,
                "zip": zip,
                "country": "US",
                "location": location,
            }),
        }
    }

    /// Short label used in bulk update messages, e.g. "Mobile phone"
    pub fn label(&self) -> String {
        match self {
            ChildResource::PhoneNumber { location, .. } => format!("{} phone", location),
            ChildResource::Email { location, .. } => format!("{} email", location),
            ChildResource::Address { location, .. } => format!("{} address", location),
        }
    }
}

/// Delay before retrying a 429
///
/// `Retry-After` seconds win when the header is an integer; otherwise the
/// default doubles per prior retry. Either way the result is capped.
pub fn retry_delay(
    retry_after: Option<&str>,
    attempt: u32,
    default: Duration,
    max_backoff: Duration,
) -> Duration {
    let delay = match retry_after.and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(secs) => Duration::from_secs(secs),
        None => default.saturating_mul(2u32.saturating_pow(attempt)),
    };
    delay.min(max_backoff)
}

/// Page size for a search: 0 or missing means the default, and PCO caps pages at 100
pub fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    match limit {
        None | Some(0) => default,
        Some(n) => n.min(MAX_PAGE_SIZE),
    }
}

/// Digits of a phone number, dropping a leading US country code
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    match digits.strip_prefix('1') {
        Some(rest) if digits.len() == 11 => rest.to_string(),
        _ => digits,
    }
}

/// Query strings tried for a phone search
///
/// Ten-digit numbers are tried as bare digits, `(AAA) PPP-NNNN` and
/// `AAA PPP NNNN`. Anything else is sent once as typed.
pub fn phone_variants(phone: &str) -> Vec<String> {
    let digits = normalize_phone(phone);
    if digits.len() != 10 {
        return vec![phone.trim().to_string()];
    }

    let (area, rest) = digits.split_at(3);
    let (prefix, line) = rest.split_at(3);
    vec![
        digits.clone(),
        format!("({}) {}-{}", area, prefix, line),
        format!("{} {} {}", area, prefix, line),
    ]
}

/// PCO person ids are decimal numbers
pub fn is_valid_person_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

/// Rate-limited PCO People API client
///
/// Cheap to clone; clones share the HTTP pool and the limiter.
#[derive(Clone)]
pub struct PcoClient {
    http: reqwest::Client,
    config: Arc<PcoClientConfig>,
    limiter: Arc<SlidingWindowLimiter>,
}

impl PcoClient {
    pub fn new(config: PcoClientConfig) -> Result<Self, PcoError> {
        let limiter = Arc::new(SlidingWindowLimiter::new(config.max_requests_per_second));
        Self::with_limiter(config, limiter)
    }

    /// Client sharing an existing limiter
    pub fn with_limiter(
        config: PcoClientConfig,
        limiter: Arc<SlidingWindowLimiter>,
    ) -> Result<Self, PcoError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
            limiter,
        })
    }

    pub fn config(&self) -> &PcoClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Issue one logical call, retrying on 429
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<reqwest::Response, PcoError> {
        let url = self.url(path);
        let mut attempt: u32 = 0;

        loop {
            let waited = self.limiter.acquire().await;
            if !waited.is_zero() {
                debug!(waited_ms = waited.as_millis() as u64, %url, "Held back by rate limiter");
            }

            let mut request = self
                .http
                .request(method.clone(), &url)
                .basic_auth(&self.config.application_id, Some(&self.config.secret))
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(%method, %url, attempt, "Calling PCO API");
            let response = request.send().await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            if attempt >= self.config.max_retries {
                warn!(%url, attempts = attempt + 1, "PCO rate limit retries exhausted");
                return Err(PcoError::RateLimited {
                    attempts: attempt + 1,
                });
            }

            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok());
            let delay = retry_delay(
                retry_after,
                attempt,
                self.config.default_retry_after,
                self.config.max_backoff,
            );
            warn!(
                %url,
                retry_after = retry_after.unwrap_or(""),
                delay_ms = delay.as_millis() as u64,
                attempt = attempt + 1,
                "PCO returned 429, retrying"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Decode a successful body, or turn a failure status into [`PcoError::Api`]
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PcoError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(PcoError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| PcoError::Parse(e.to_string()))
    }

    async fn list_people(
        &self,
        filters: &[(&str, String)],
        limit: usize,
    ) -> Result<Vec<Person>, PcoError> {
        let mut query = filters.to_vec();
        query.push(("per_page", limit.to_string()));

        let response = self.send(Method::GET, "people", &query, None).await?;
        let document: Document<Vec<Person>> = Self::read_json(response).await?;

        let mut people = document.data.unwrap_or_default();
        people.truncate(limit);
        Ok(people)
    }

    pub async fn search_by_name(
        &self,
        first_name: &str,
        last_name: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Person>, PcoError> {
        let limit = clamp_limit(limit, NAME_SEARCH_LIMIT);
        self.list_people(
            &[
                ("where[first_name]", first_name.to_string()),
                ("where[last_name]", last_name.to_string()),
            ],
            limit,
        )
        .await
    }

    pub async fn search_by_email(
        &self,
        email: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Person>, PcoError> {
        let limit = clamp_limit(limit, EMAIL_SEARCH_LIMIT);
        self.list_people(&[("where[emails_address]", email.to_string())], limit)
            .await
    }

    /// Search by phone across the formats PCO may have stored
    ///
    /// Variants run one after another. A failing variant is skipped; only when
    /// all of them fail is the last error returned.
    pub async fn search_by_phone(
        &self,
        phone: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Person>, PcoError> {
        let limit = clamp_limit(limit, PHONE_SEARCH_LIMIT);
        let mut found = Vec::new();
        let mut last_error = None;
        let mut any_succeeded = false;

        for variant in phone_variants(phone) {
            match self
                .list_people(&[("where[phone_numbers_number]", variant.clone())], limit)
                .await
            {
                Ok(people) => {
                    any_succeeded = true;
                    found.extend(people);
                }
                Err(e) => {
                    warn!(variant = %variant, error = %e, "Phone search variant failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_succeeded => Err(e),
            _ => {
                let mut people = dedupe_by_id(found);
                people.truncate(limit);
                Ok(people)
            }
        }
    }

    pub async fn search_by_grade(
        &self,
        grade: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Person>, PcoError> {
        let limit = clamp_limit(limit, GRADE_SEARCH_LIMIT);
        self.list_people(&[("where[grade]", grade.to_string())], limit)
            .await
    }

    pub async fn search_by_membership(
        &self,
        membership: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Person>, PcoError> {
        let limit = clamp_limit(limit, MEMBERSHIP_SEARCH_LIMIT);
        self.list_people(&[("where[membership]", membership.to_string())], limit)
            .await
    }

    /// Fetch a person with phone numbers, emails and addresses
    ///
    /// `Ok(None)` when PCO answers 404 or the id could not be a PCO id.
    pub async fn get_person(&self, id: &str) -> Result<Option<Person>, PcoError> {
        let id = id.trim();
        if !is_valid_person_id(id) {
            debug!(person_id = %id, "Not a PCO person id, skipping lookup");
            return Ok(None);
        }

        let response = self
            .send(
                Method::GET,
                &format!("people/{}", id),
                &[("include", "phone_numbers,emails,addresses".to_string())],
                None,
            )
            .await?;

        let document: Document<Person> = match Self::read_json(response).await {
            Ok(document) => document,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(document.data.map(|mut person| {
            person.attach_included(document.included);
            person
        }))
    }

    pub async fn create_person(&self, attributes: &Map<String, Value>) -> Result<Person, PcoError> {
        let body = json!({"data": {"type": "Person", "attributes": attributes}});
        let response = self.send(Method::POST, "people", &[], Some(&body)).await?;
        let document: Document<Person> = Self::read_json(response).await?;

        document
            .data
            .ok_or_else(|| PcoError::Parse("create response carried no person".to_string()))
    }

    pub async fn update_person(
        &self,
        id: &str,
        attributes: &Map<String, Value>,
    ) -> Result<(), PcoError> {
        let body = json!({"data": {"type": "Person", "id": id, "attributes": attributes}});
        let response = self
            .send(Method::PATCH, &format!("people/{}", id), &[], Some(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PcoError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Add a phone number, email or address to an existing person
    pub async fn create_child(
        &self,
        person_id: &str,
        child: &ChildResource,
    ) -> Result<(), PcoError> {
        let body = json!({"data": {"type": child.resource_type(), "attributes": child.attributes()}});
        let path = format!("people/{}/{}", person_id, child.collection());
        let response = self.send(Method::POST, &path, &[], Some(&body)).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PcoError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}
