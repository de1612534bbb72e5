//! Typed catalog queries on top of the gateway.
//!
//! Each query owns a deterministic cache key built from the gateway's reserved
//! prefix, the kind of query and its normalized parameters, so identical
//! logical queries always land in the same cache slot.

use crate::api::{AnimeEntry, Genre, MangaEntry, NewsArticle, Params};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::Gateway;
use serde::de::DeserializeOwned;
use shared::CacheConfig;
use tracing::info;

/// Cache validity windows, in minutes, per kind of query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Searches, top lists and per-genre/studio listings
    pub listing: i64,
    /// Single-title details and news
    pub details: i64,
    /// Genre lists
    pub genres: i64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            listing: 30,
            details: 60,
            genres: 24 * 60,
        }
    }
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            listing: config.listing_ttl_minutes,
            details: config.details_ttl_minutes,
            genres: config.genres_ttl_minutes,
        }
    }
}

/// Media kind served by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Anime,
    Manga,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Anime => "anime",
            MediaKind::Manga => "manga",
        }
    }
}

/// Anime and manga queries against the remote catalog
#[derive(Clone)]
pub struct Catalog {
    gateway: Gateway,
    ttls: CacheTtls,
}

impl Catalog {
    pub fn new(gateway: Gateway, ttls: CacheTtls) -> Self {
        Self { gateway, ttls }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    // ========== Anime ==========

    /// Search anime by title
    pub async fn search_anime(&self, query: &str) -> GatewayResult<Vec<AnimeEntry>> {
        self.search(MediaKind::Anime, query).await
    }

    /// Full anime details by MAL ID
    pub async fn anime_by_id(&self, mal_id: u32) -> GatewayResult<AnimeEntry> {
        self.by_id(MediaKind::Anime, mal_id).await
    }

    /// Anime tagged with a genre
    pub async fn anime_by_genre(&self, genre_id: u32, page: u32) -> GatewayResult<Vec<AnimeEntry>> {
        self.by_genre(MediaKind::Anime, genre_id, page).await
    }

    /// Anime genre list
    pub async fn anime_genres(&self) -> GatewayResult<Vec<Genre>> {
        self.genres(MediaKind::Anime).await
    }

    /// Anime produced by a studio
    pub async fn anime_by_studio(&self, studio_id: u32, page: u32) -> GatewayResult<Vec<AnimeEntry>> {
        self.filtered(MediaKind::Anime, "studio", "producers", studio_id, page).await
    }

    /// Top anime, paginated
    pub async fn top_anime(&self, limit: u32, page: u32) -> GatewayResult<Vec<AnimeEntry>> {
        self.top(MediaKind::Anime, limit, page).await
    }

    /// News about an anime
    pub async fn anime_news(&self, mal_id: u32) -> GatewayResult<Vec<NewsArticle>> {
        self.news(MediaKind::Anime, mal_id).await
    }

    // ========== Manga ==========

    /// Search manga by title
    pub async fn search_manga(&self, query: &str) -> GatewayResult<Vec<MangaEntry>> {
        self.search(MediaKind::Manga, query).await
    }

    /// Full manga details by MAL ID
    pub async fn manga_by_id(&self, mal_id: u32) -> GatewayResult<MangaEntry> {
        self.by_id(MediaKind::Manga, mal_id).await
    }

    /// Manga tagged with a genre
    pub async fn manga_by_genre(&self, genre_id: u32, page: u32) -> GatewayResult<Vec<MangaEntry>> {
        self.by_genre(MediaKind::Manga, genre_id, page).await
    }

    /// Manga genre list
    pub async fn manga_genres(&self) -> GatewayResult<Vec<Genre>> {
        self.genres(MediaKind::Manga).await
    }

    /// Top manga, paginated
    pub async fn top_manga(&self, limit: u32, page: u32) -> GatewayResult<Vec<MangaEntry>> {
        self.top(MediaKind::Manga, limit, page).await
    }

    /// News about a manga
    pub async fn manga_news(&self, mal_id: u32) -> GatewayResult<Vec<NewsArticle>> {
        self.news(MediaKind::Manga, mal_id).await
    }

    // ========== Shared query shapes ==========

    async fn search<T: DeserializeOwned>(&self, kind: MediaKind, query: &str) -> GatewayResult<T> {
        let query = query.trim();
        info!(kind = kind.as_str(), query = query, "Searching catalog");
        self.fetch(
            &format!("/{}", kind.as_str()),
            self.key(&["search", kind.as_str(), &normalize_query(query)]),
            self.ttls.listing,
            vec![("q".to_string(), query.to_string())],
        )
        .await
    }

    async fn by_id<T: DeserializeOwned>(&self, kind: MediaKind, mal_id: u32) -> GatewayResult<T> {
        self.fetch(
            &format!("/{}/{}", kind.as_str(), mal_id),
            self.key(&[kind.as_str(), &mal_id.to_string()]),
            self.ttls.details,
            Vec::new(),
        )
        .await
    }

    async fn by_genre<T: DeserializeOwned>(
        &self,
        kind: MediaKind,
        genre_id: u32,
        page: u32,
    ) -> GatewayResult<T> {
        self.filtered(kind, "genre", "genres", genre_id, page).await
    }

    /// Listing of `kind` narrowed by one id-valued query parameter
    async fn filtered<T: DeserializeOwned>(
        &self,
        kind: MediaKind,
        tag: &str,
        param: &str,
        id: u32,
        page: u32,
    ) -> GatewayResult<T> {
        info!(kind = kind.as_str(), filter = tag, id = id, page = page, "Fetching filtered listing");
        self.fetch(
            &format!("/{}", kind.as_str()),
            self.key(&[tag, kind.as_str(), &id.to_string(), &page.to_string()]),
            self.ttls.listing,
            vec![
                (param.to_string(), id.to_string()),
                ("page".to_string(), page.to_string()),
            ],
        )
        .await
    }

    async fn genres(&self, kind: MediaKind) -> GatewayResult<Vec<Genre>> {
        self.fetch(
            &format!("/genres/{}", kind.as_str()),
            self.key(&["genres", kind.as_str()]),
            self.ttls.genres,
            Vec::new(),
        )
        .await
    }

    async fn top<T: DeserializeOwned>(&self, kind: MediaKind, limit: u32, page: u32) -> GatewayResult<T> {
        info!(kind = kind.as_str(), limit = limit, page = page, "Fetching top list");
        self.fetch(
            &format!("/top/{}", kind.as_str()),
            self.key(&["top", kind.as_str(), &limit.to_string(), &page.to_string()]),
            self.ttls.listing,
            vec![
                ("limit".to_string(), limit.to_string()),
                ("page".to_string(), page.to_string()),
            ],
        )
        .await
    }

    async fn news(&self, kind: MediaKind, mal_id: u32) -> GatewayResult<Vec<NewsArticle>> {
        self.fetch(
            &format!("/{}/{}/news", kind.as_str(), mal_id),
            self.key(&["news", kind.as_str(), &mal_id.to_string()]),
            self.ttls.details,
            Vec::new(),
        )
        .await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        cache_key: String,
        ttl_minutes: i64,
        params: Params,
    ) -> GatewayResult<T> {
        let data = self
            .gateway
            .fetch(endpoint, &cache_key, ttl_minutes, params)
            .await?;
        serde_json::from_value(data).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    fn key(&self, parts: &[&str]) -> String {
        format!("{}{}", self.gateway.settings().key_prefix, parts.join("_"))
    }
}

/// Lower-case and collapse whitespace so equivalent searches share a key
fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
