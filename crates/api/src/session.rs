use std::collections::HashMap;
use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    response::Response,
};
use uuid::Uuid;

use marketlens_core::page::AnalysisPage;

pub const COOKIE_NAME: &str = "marketlens_session";

/// Browser session keyed by the `marketlens_session` cookie. A request
/// without a valid cookie gets a fresh id, which [`Session::attach`] hands
/// back to the client.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub id: Uuid,
    fresh: bool,
}

impl Session {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match cookie_value(headers) {
            Some(id) => Self { id, fresh: false },
            None => Self {
                id: Uuid::new_v4(),
                fresh: true,
            },
        }
    }

    pub fn attach(self, mut response: Response) -> Response {
        if !self.fresh {
            return response;
        }
        let cookie = format!("{COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax", self.id);
        match HeaderValue::from_str(&cookie) {
            Ok(v) => {
                response.headers_mut().append(SET_COOKIE, v);
            }
            Err(e) => tracing::error!(error = %e, "invalid session cookie header"),
        }
        response
    }
}

fn cookie_value(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// Idle pages older than this are dropped on the next insert.
pub const SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);
pub const MAX_SESSIONS: usize = 10_000;

struct StoredPage {
    page: AnalysisPage,
    last_seen: Instant,
}

/// Per-session analysis pages, bounded by idle time and entry count. Pages
/// with a submission in flight are never evicted.
pub struct SessionStore {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<Uuid, StoredPage>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_TTL, MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
        }
    }

    /// The session's page, created on first use.
    pub fn page(&mut self, id: Uuid) -> &mut AnalysisPage {
        if !self.entries.contains_key(&id) {
            self.make_room();
        }
        let stored = self.entries.entry(id).or_insert_with(|| StoredPage {
            page: AnalysisPage::default(),
            last_seen: Instant::now(),
        });
        stored.last_seen = Instant::now();
        &mut stored.page
    }

    /// The session's page if it is still stored.
    pub fn existing(&mut self, id: Uuid) -> Option<&mut AnalysisPage> {
        self.entries.get_mut(&id).map(|stored| &mut stored.page)
    }

    fn make_room(&mut self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, v| v.page.form.is_loading() || v.last_seen.elapsed() <= ttl);
        if self.entries.len() < self.max_entries {
            return;
        }
        let victim = self
            .entries
            .iter()
            .filter(|(_, v)| !v.page.form.is_loading())
            .min_by_key(|(_, v)| v.last_seen)
            .map(|(k, _)| *k);
        if let Some(victim) = victim {
            self.entries.remove(&victim);
            tracing::debug!(session = %victim, "evicted idle session");
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
