//! Purpose: Blocking client that moves entities between a verbose-OData service and typed values.
//! Exports: `ApiConnection`, `ConnectionConfig`, `HttpExecutor`, `HttpRequest`, `HttpResponse`,
//! Exports: `Method`, `TokenProvider`, `StaticToken`, `UreqExecutor`.
//! Role: Composes transport, token provider, envelope codec, and serializer.
//! Invariants: Updates with nothing to write send no request.
//! Invariants: Collection reads follow `$skiptoken` pages until the service stops returning one.
//! Invariants: Tokens are attached as bearer headers and never logged.
use super::serializer::{self, EncodeOptions};
use crate::core::diff::changed_fields;
use crate::core::dynamic::DynamicJsonView;
use crate::core::entity::{Entity, Record};
use crate::core::envelope;
use crate::core::error::{Error, ErrorKind};
use crate::core::tracking::NestedLookup;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

type ApiResult<T> = Result<T, Error>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub url: &'a Url,
    pub token: Option<&'a str>,
    pub body: Option<&'a str>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request. Non-2xx statuses are responses, not errors.
pub trait HttpExecutor {
    fn execute(&self, request: &HttpRequest<'_>) -> ApiResult<HttpResponse>;
}

/// Supplies the bearer token for each request; acquisition and refresh live elsewhere.
pub trait TokenProvider {
    fn bearer_token(&self) -> ApiResult<Option<String>>;
}

#[derive(Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> ApiResult<Option<String>> {
        Ok(self.token.clone())
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    base_url: Url,
    timeout: Duration,
    user_agent: String,
}

impl ConnectionConfig {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let mut url = Url::parse(base_url).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid base url")
                .with_field("base_url")
                .with_hint("Use a full URL such as https://host/api/v1/123/.")
                .with_source(err)
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported url scheme '{}'", url.scheme()))
                .with_field("base_url")
                .with_hint("Use http or https."));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self {
            base_url: url,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("vodata/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Resolves a resource path (optionally with a query) against the base url.
    pub fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid resource path '{path}'"))
                    .with_source(err)
            })
    }
}

pub struct UreqExecutor {
    agent: ureq::Agent,
}

impl UreqExecutor {
    pub fn new(config: &ConnectionConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout())
            .user_agent(config.user_agent())
            .build();
        Self { agent }
    }
}

impl HttpExecutor for UreqExecutor {
    fn execute(&self, request: &HttpRequest<'_>) -> ApiResult<HttpResponse> {
        let mut call = self
            .agent
            .request(request.method.as_str(), request.url.as_str())
            .set("Accept", "application/json");
        if let Some(token) = request.token {
            call = call.set("Authorization", &format!("Bearer {token}"));
        }
        let response = match request.body {
            Some(body) => call
                .set("Content-Type", "application/json")
                .send_string(body),
            None => call.call(),
        };
        match response {
            Ok(resp) => read_response(resp.status(), resp),
            Err(ureq::Error::Status(code, resp)) => read_response(code, resp),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_source(err)),
        }
    }
}

fn read_response(status: u16, response: ureq::Response) -> ApiResult<HttpResponse> {
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_status(status)
            .with_source(err)
    })?;
    Ok(HttpResponse { status, body })
}

pub struct ApiConnection<E = UreqExecutor, P = StaticToken> {
    config: ConnectionConfig,
    executor: E,
    tokens: P,
    encode_options: EncodeOptions,
}

impl<P: TokenProvider> ApiConnection<UreqExecutor, P> {
    pub fn connect(config: ConnectionConfig, tokens: P) -> Self {
        let executor = UreqExecutor::new(&config);
        Self::new(config, executor, tokens)
    }
}

impl<E: HttpExecutor, P: TokenProvider> ApiConnection<E, P> {
    pub fn new(config: ConnectionConfig, executor: E, tokens: P) -> Self {
        Self {
            config,
            executor,
            tokens,
            encode_options: EncodeOptions::default(),
        }
    }

    pub fn with_encode_options(mut self, options: EncodeOptions) -> Self {
        self.encode_options = options;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn get_entity<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let body = self.send(Method::Get, &self.config.endpoint(path)?, None)?;
        serializer::decode(&envelope::unwrap_object(&body)?)
    }

    /// Reads every page of a collection.
    pub fn get_entities<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Vec<T>> {
        let mut entities = Vec::new();
        for body in self.pages(path)? {
            let page: Vec<T> = serializer::decode_list(Some(&envelope::unwrap_array(&body)?))?;
            entities.extend(page);
        }
        Ok(entities)
    }

    pub fn get_dynamic(&self, path: &str) -> ApiResult<DynamicJsonView> {
        let body = self.send(Method::Get, &self.config.endpoint(path)?, None)?;
        serializer::wrap_dynamic(&envelope::unwrap_object(&body)?)
    }

    pub fn get_dynamic_list(&self, path: &str) -> ApiResult<Vec<DynamicJsonView>> {
        let mut views = Vec::new();
        for body in self.pages(path)? {
            let page = envelope::unwrap_array(&body)?;
            views.extend(serializer::wrap_dynamic_list(&page)?);
        }
        Ok(views)
    }

    /// Posts the full encoding of `entity` and decodes the created entity, if echoed back.
    ///
    /// An entity with no writable fields sends nothing and returns `Ok(None)`.
    pub fn create<T: Entity>(
        &self,
        path: &str,
        entity: &T,
    ) -> ApiResult<Option<T>> {
        let Some(payload) = serializer::encode_with(entity, &self.encode_options) else {
            debug!(entity = entity.entity_type().name, "nothing to create");
            return Ok(None);
        };
        let body = self.send(Method::Post, &self.config.endpoint(path)?, Some(&payload))?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        serializer::decode(&envelope::unwrap_object(&body)?).map(Some)
    }

    /// Puts only the changed fields; returns whether a request was sent.
    pub fn update<T: Record>(
        &self,
        path: &str,
        original: &T,
        current: &T,
        lookup: &dyn NestedLookup,
    ) -> ApiResult<bool> {
        let payload = serializer::encode_diff_with(original, current, lookup, &self.encode_options);
        let Some(payload) = payload.filter(|payload| payload != "{}") else {
            debug!(entity = current.entity_type().name, "no changes to send");
            return Ok(false);
        };
        debug!(
            entity = current.entity_type().name,
            fields = ?changed_fields(original, current),
            "sending update"
        );
        self.send(Method::Put, &self.config.endpoint(path)?, Some(&payload))?;
        Ok(true)
    }

    pub fn delete(&self, path: &str) -> ApiResult<()> {
        self.send(Method::Delete, &self.config.endpoint(path)?, None)?;
        Ok(())
    }

    fn pages(&self, path: &str) -> ApiResult<Vec<String>> {
        let first = self.config.endpoint(path)?;
        let mut bodies = Vec::new();
        let mut seen = HashSet::new();
        let mut url = first.clone();
        loop {
            let body = self.send(Method::Get, &url, None)?;
            let token = envelope::extract_continuation_token(&body)?;
            bodies.push(body);
            let Some(token) = token else {
                break;
            };
            if !seen.insert(token.clone()) {
                warn!(token = %token, "service repeated a continuation token; stopping");
                break;
            }
            url = with_skip_token(&first, &token);
        }
        debug!(pages = bodies.len(), "collection read complete");
        Ok(bodies)
    }

    fn send(&self, method: Method, url: &Url, body: Option<&str>) -> ApiResult<String> {
        let token = self.tokens.bearer_token()?;
        debug!(method = method.as_str(), url = %url, "sending request");
        let response = self.executor.execute(&HttpRequest {
            method,
            url,
            token: token.as_deref(),
            body,
        })?;
        check_status(method, url, response)
    }
}

fn with_skip_token(url: &Url, token: &str) -> Url {
    let mut next = url.clone();
    let query = match url.query() {
        Some(query) if !query.is_empty() => format!("{query}&{}{token}", envelope::SKIP_TOKEN_PARAM),
        _ => format!("{}{token}", envelope::SKIP_TOKEN_PARAM),
    };
    next.set_query(Some(&query));
    next
}

fn check_status(method: Method, url: &Url, response: HttpResponse) -> ApiResult<String> {
    if response.is_success() {
        return Ok(response.body);
    }
    let status = response.status;
    let kind = error_kind_from_status(status);
    let mut err = Error::new(kind)
        .with_message(format!(
            "{} {} failed with status {status}",
            method.as_str(),
            url.path()
        ))
        .with_status(status);
    let preview: String = response.body.chars().take(ERROR_BODY_PREVIEW).collect();
    if !preview.trim().is_empty() {
        err = err.with_hint(preview);
    }
    Err(err)
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        _ => ErrorKind::Io,
    }
}
