//! TMDB (The Movie Database) provider.
//!
//! Implements [`MovieShowProvider`] by querying the TMDB v3 REST API.
//!
//! Features:
//! - Token-bucket rate limiting at 4 requests / second via [`governor`].
//! - Automatic retry on HTTP 429 with `Retry-After` header support (max 3 retries).
//! - 30-second request timeout.
//! - HTTP 404 is "not found" (`Ok(None)`), every other failure is an error.
//! - Title searches are disambiguated by exact title, then release year, then
//!   the caller's known IMDB id.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use marquee_common::ExternalIds;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::TmdbConfig;
use crate::metadata::provider::{Credit, Movie, MovieShowProvider, Person, Show};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(4) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct TmdbSearchResponse<T> {
    #[serde(default)]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbFindResponse {
    #[serde(default)]
    movie_results: Vec<TmdbMovieSearchResult>,
    #[serde(default)]
    tv_results: Vec<TmdbTvSearchResult>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieSearchResult {
    id: u64,
    title: Option<String>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvSearchResult {
    id: u64,
    name: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetail {
    id: u64,
    title: Option<String>,
    release_date: Option<String>,
    imdb_id: Option<String>,
    credits: Option<TmdbCredits>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetail {
    id: u64,
    name: Option<String>,
    first_air_date: Option<String>,
    external_ids: Option<TmdbExternalIds>,
    credits: Option<TmdbCredits>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisodeDetail {
    id: u64,
    external_ids: Option<TmdbExternalIds>,
    credits: Option<TmdbCredits>,
}

#[derive(Debug, Default, Deserialize)]
struct TmdbCredits {
    #[serde(default)]
    cast: Vec<TmdbCast>,
    #[serde(default)]
    guest_stars: Vec<TmdbCast>,
}

#[derive(Debug, Deserialize)]
struct TmdbCast {
    id: Option<u64>,
    name: Option<String>,
    character: Option<String>,
    profile_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbExternalIds {
    imdb_id: Option<String>,
    tvdb_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TmdbPerson {
    id: u64,
    name: Option<String>,
    imdb_id: Option<String>,
}

/// A search hit reduced to what disambiguation needs.
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    id: u64,
    title: String,
    date: Option<String>,
}

impl From<TmdbMovieSearchResult> for Candidate {
    fn from(r: TmdbMovieSearchResult) -> Self {
        Self {
            id: r.id,
            title: r.title.unwrap_or_default(),
            date: r.release_date,
        }
    }
}

impl From<TmdbTvSearchResult> for Candidate {
    fn from(r: TmdbTvSearchResult) -> Self {
        Self {
            id: r.id,
            title: r.name.unwrap_or_default(),
            date: r.first_air_date,
        }
    }
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// TMDB movie/show provider.
///
/// Wraps the TMDB v3 REST API with built-in rate limiting and retry logic.
///
/// # Examples
///
/// ```no_run
/// use marquee::config::TmdbConfig;
/// use marquee::metadata::providers::TmdbProvider;
///
/// let config = TmdbConfig {
///     api_key: "your-api-key".into(),
///     ..Default::default()
/// };
/// let provider = TmdbProvider::new(&config).unwrap();
/// ```
pub struct TmdbProvider {
    client: reqwest::Client,
    api_key: String,
    language: String,
    base_url: String,
    rate_limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TmdbProvider {
    /// Create a new TMDB provider from its configuration.
    ///
    /// Rate limiting is configured at 4 requests per second.
    pub fn new(config: &TmdbConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(REQUESTS_PER_SECOND)),
        })
    }

    /// Returns `true` when the provider has an API key.
    pub fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Execute a GET request with rate limiting and 429-retry logic.
    ///
    /// Returns `None` for HTTP 404.
    async fn get(&self, url: &str) -> anyhow::Result<Option<reqwest::Response>> {
        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            let resp = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("TMDB request failed: {}", self.redact(url)))?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(
                    retry = retries,
                    wait_secs = wait,
                    "TMDB returned 429, backing off"
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if resp.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            let resp = resp
                .error_for_status()
                .with_context(|| format!("TMDB request returned error: {}", self.redact(url)))?;

            return Ok(Some(resp));
        }
    }

    /// GET `url` and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> anyhow::Result<Option<T>> {
        let Some(resp) = self.get(url).await? else {
            debug!(what, "TMDB has no such resource");
            return Ok(None);
        };

        let body = resp
            .json()
            .await
            .with_context(|| format!("failed to parse TMDB {what} response"))?;
        Ok(Some(body))
    }

    /// Build a full API URL with the API key and language query parameters.
    fn url(&self, path: &str, extra_params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}{path}?api_key={}&language={}",
            self.base_url, self.api_key, self.language
        );
        for (key, value) in extra_params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoded(value));
        }
        url
    }

    /// `url` with the API key removed, for logs and error messages.
    fn redact(&self, url: &str) -> String {
        if self.api_key.is_empty() {
            url.to_string()
        } else {
            url.replace(&self.api_key, "***")
        }
    }

    /// Find a TMDB entry by an external id.
    async fn find(&self, external_id: &str, source: &str) -> anyhow::Result<Option<TmdbFindResponse>> {
        let url = self.url(
            &format!("/find/{}", urlencoded(external_id)),
            &[("external_source", source)],
        );
        debug!(url = %self.redact(&url), "TMDB find");
        self.get_json(&url, "find").await
    }

    async fn search_movie_id(&self, title: &str, year: Option<u16>, known: &ExternalIds) -> anyhow::Result<Option<u64>> {
        if let Some(imdb) = known.imdb() {
            let found = self.find(imdb, "imdb_id").await?;
            if let Some(hit) = found.and_then(|f| f.movie_results.into_iter().next()) {
                return Ok(Some(hit.id));
            }
        }

        let year_str = year.map(|y| y.to_string());
        let mut params = vec![("query", title)];
        if let Some(ref y) = year_str {
            params.push(("year", y.as_str()));
        }
        let url = self.url("/search/movie", &params);
        debug!(url = %self.redact(&url), "TMDB search movie");

        let body: Option<TmdbSearchResponse<TmdbMovieSearchResult>> =
            self.get_json(&url, "movie search").await?;
        let candidates = body
            .map(|b| b.results.into_iter().map(Candidate::from).collect())
            .unwrap_or_default();
        Ok(disambiguate(candidates, title, year))
    }

    async fn search_show_id(&self, show: &str, year: Option<u16>, known: &ExternalIds) -> anyhow::Result<Option<u64>> {
        let lookups = [(known.tvdb(), "tvdb_id"), (known.imdb(), "imdb_id")];
        for (id, source) in lookups {
            let Some(id) = id else { continue };
            let found = self.find(id, source).await?;
            if let Some(hit) = found.and_then(|f| f.tv_results.into_iter().next()) {
                return Ok(Some(hit.id));
            }
        }

        let year_str = year.map(|y| y.to_string());
        let mut params = vec![("query", show)];
        if let Some(ref y) = year_str {
            params.push(("first_air_date_year", y.as_str()));
        }
        let url = self.url("/search/tv", &params);
        debug!(url = %self.redact(&url), "TMDB search TV");

        let body: Option<TmdbSearchResponse<TmdbTvSearchResult>> =
            self.get_json(&url, "TV search").await?;
        let candidates = body
            .map(|b| b.results.into_iter().map(Candidate::from).collect())
            .unwrap_or_default();
        Ok(disambiguate(candidates, show, year))
    }
}

/// Pick the single candidate matching `title` (exactly, else ignoring case),
/// narrowed by release year when several match.
fn disambiguate(candidates: Vec<Candidate>, title: &str, year: Option<u16>) -> Option<u64> {
    let exact: Vec<&Candidate> = candidates.iter().filter(|c| c.title == title).collect();
    let mut matches = if exact.is_empty() {
        candidates
            .iter()
            .filter(|c| c.title.to_lowercase() == title.to_lowercase())
            .collect()
    } else {
        exact
    };

    if matches.len() > 1 {
        if let Some(year) = year {
            matches.retain(|c| parse_year(&c.date) == Some(year));
        }
    }

    match matches.as_slice() {
        [only] => Some(only.id),
        _ => None,
    }
}

/// `true` unless both sides name an imdb id and they differ.
fn imdb_agrees(known: &ExternalIds, found: Option<&str>) -> bool {
    match (known.imdb(), found.filter(|f| !f.is_empty())) {
        (Some(known), Some(found)) => known == found,
        _ => true,
    }
}

/// Minimal percent-encoding for query parameter values.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

const HEX: [u8; 16] = *b"0123456789ABCDEF";

/// Extract a four-digit year from a date string like `"2023-04-15"`.
fn parse_year(date: &Option<String>) -> Option<u16> {
    date.as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse::<u16>().ok())
}

/// Convert a TMDB image path fragment to a full URL.
fn image_url(path: &str) -> String {
    format!("{TMDB_IMAGE_BASE}{path}")
}

fn to_credit(cast: TmdbCast) -> Credit {
    Credit {
        character: cast.character.unwrap_or_default(),
        name: cast.name.unwrap_or_default(),
        profile_path: cast.profile_path.map(|p| image_url(&p)),
        person_id: cast.id.map(|id| id.to_string()),
    }
}

fn to_external_ids(ext: Option<TmdbExternalIds>, tmdb_id: u64) -> ExternalIds {
    let ext = ext.unwrap_or(TmdbExternalIds {
        imdb_id: None,
        tvdb_id: None,
    });
    ExternalIds {
        imdb: ext.imdb_id.filter(|id| !id.is_empty()),
        tvdb: ext.tvdb_id.map(|id| id.to_string()),
        tmdb: Some(tmdb_id.to_string()),
    }
}

#[async_trait]
impl MovieShowProvider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    async fn get_movie(&self, id: &str) -> anyhow::Result<Option<Movie>> {
        let url = self.url(
            &format!("/movie/{}", urlencoded(id)),
            &[("append_to_response", "credits")],
        );
        debug!(url = %self.redact(&url), "TMDB get movie");

        let Some(detail) = self.get_json::<TmdbMovieDetail>(&url, "movie detail").await? else {
            return Ok(None);
        };

        Ok(Some(Movie {
            id: detail.id.to_string(),
            title: detail.title.unwrap_or_default(),
            release_date: detail.release_date,
            imdb_id: detail.imdb_id.filter(|id| !id.is_empty()),
            cast: detail
                .credits
                .unwrap_or_default()
                .cast
                .into_iter()
                .map(to_credit)
                .collect(),
        }))
    }

    async fn search_movie(
        &self,
        title: &str,
        year: Option<u16>,
        known: &ExternalIds,
    ) -> anyhow::Result<Option<Movie>> {
        let Some(id) = self.search_movie_id(title, year, known).await? else {
            debug!(title, ?year, "No unambiguous TMDB movie match");
            return Ok(None);
        };

        let movie = self.get_movie(&id.to_string()).await?;
        Ok(movie.filter(|m| {
            let agrees = imdb_agrees(known, m.imdb_id.as_deref());
            if !agrees {
                debug!(title, tmdb_id = %m.id, "TMDB match has a different imdb id; discarding");
            }
            agrees
        }))
    }

    async fn get_show(
        &self,
        id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> anyhow::Result<Option<Show>> {
        let url = self.url(
            &format!("/tv/{}", urlencoded(id)),
            &[("append_to_response", "external_ids,credits")],
        );
        debug!(url = %self.redact(&url), "TMDB get TV show");

        let Some(detail) = self.get_json::<TmdbTvDetail>(&url, "TV detail").await? else {
            return Ok(None);
        };

        let mut show = Show {
            id: detail.id.to_string(),
            name: detail.name.unwrap_or_default(),
            first_air_date: detail.first_air_date,
            season,
            episode,
            show_ids: to_external_ids(detail.external_ids, detail.id),
            episode_ids: ExternalIds::default(),
            cast: detail
                .credits
                .unwrap_or_default()
                .cast
                .into_iter()
                .map(to_credit)
                .collect(),
            guest_stars: Vec::new(),
        };

        if let Some((s, e)) = season.zip(episode) {
            let url = self.url(
                &format!("/tv/{}/season/{s}/episode/{e}", urlencoded(id)),
                &[("append_to_response", "external_ids,credits")],
            );
            debug!(url = %self.redact(&url), "TMDB get TV episode");

            match self.get_json::<TmdbEpisodeDetail>(&url, "TV episode").await? {
                Some(ep) => {
                    show.episode_ids = to_external_ids(ep.external_ids, ep.id);
                    let credits = ep.credits.unwrap_or_default();
                    if !credits.cast.is_empty() {
                        show.cast = credits.cast.into_iter().map(to_credit).collect();
                    }
                    show.guest_stars = credits.guest_stars.into_iter().map(to_credit).collect();
                }
                None => debug!(show_id = id, season = s, episode = e, "TMDB has no such episode"),
            }
        }

        Ok(Some(show))
    }

    async fn search_show(
        &self,
        show: &str,
        year: Option<u16>,
        known: &ExternalIds,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> anyhow::Result<Option<Show>> {
        let Some(id) = self.search_show_id(show, year, known).await? else {
            debug!(show, ?year, "No unambiguous TMDB show match");
            return Ok(None);
        };

        let found = self.get_show(&id.to_string(), season, episode).await?;
        Ok(found.filter(|s| imdb_agrees(known, s.show_ids.imdb())))
    }

    async fn get_person(&self, id: &str) -> anyhow::Result<Option<Person>> {
        let url = self.url(&format!("/person/{}", urlencoded(id)), &[]);
        debug!(url = %self.redact(&url), "TMDB get person");

        let person = self.get_json::<TmdbPerson>(&url, "person").await?;
        Ok(person.map(|p| Person {
            id: p.id.to_string(),
            name: p.name.unwrap_or_default(),
            imdb_id: p.imdb_id.filter(|id| !id.is_empty()),
        }))
    }
}
