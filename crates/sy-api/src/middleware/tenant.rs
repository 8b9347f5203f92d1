//! Tenant resolution middleware.
//!
//! Resolves the tenant for each request before any handler runs, then
//! installs it in the per-task identity slot so the whole downstream call
//! tree (handlers, repositories, background awaits) shares one tenant.
//!
//! Resolution priority, most to least trusted:
//! 1. Verified principal claim (set by the auth layer)
//! 2. Subdomain against the configured base domain
//! 3. `X-Tenant-ID` header
//! 4. `tenant` query parameter
//! 5. Explicitly configured default tenant
//!
//! The lookup is a pure read of the tenant directory completed before the
//! slot is installed, so resolution itself never runs inside a tenant scope
//! and cannot observe a half-installed one. Unresolvable and non-operational
//! tenants both yield 404; callers cannot distinguish "no such school" from
//! "suspended school" by probing.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lru::LruCache;
use std::{
    num::NonZeroUsize,
    sync::Arc,
    time::{Duration, Instant},
};
use sy_core::{
    auth::Principal,
    db::TenantRepository,
    scope,
    tenant::{Tenant, TenantContext},
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Header name for explicit tenant ID specification.
pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";

/// Query parameter carrying a tenant code.
pub const TENANT_QUERY_PARAM: &str = "tenant";

/// Paths that bypass tenant resolution.
const BYPASS_PATHS: &[&str] = &["/health", "/ready", "/live"];

/// Default cache TTL in seconds.
const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Default cache capacity.
const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Subdomains never treated as tenant codes.
const RESERVED_SUBDOMAINS: &[&str] = &["www", "api", "admin", "app", "static", "cdn", "assets"];

/// Cached tenant entry with TTL.
#[derive(Clone)]
struct CachedTenant {
    tenant: Tenant,
    cached_at: Instant,
}

impl CachedTenant {
    fn new(tenant: Tenant) -> Self {
        Self {
            tenant,
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Tenant cache with configurable TTL and capacity.
///
/// Lifecycle changes (suspension in particular) take effect within one TTL;
/// `invalidate` makes them immediate for in-process admin flows.
pub struct TenantCache {
    by_code: RwLock<LruCache<String, CachedTenant>>,
    by_id: RwLock<LruCache<Uuid, CachedTenant>>,
    ttl: Duration,
}

impl TenantCache {
    /// Creates a new tenant cache with the given capacity and TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            by_code: RwLock::new(LruCache::new(cap)),
            by_id: RwLock::new(LruCache::new(cap)),
            ttl,
        }
    }

    /// Creates a new tenant cache with default settings.
    pub fn default_cache() -> Self {
        Self::new(
            DEFAULT_CACHE_CAPACITY,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        )
    }

    async fn get_by_code(&self, code: &str) -> Option<Tenant> {
        let mut cache = self.by_code.write().await;
        if let Some(cached) = cache.get(code) {
            if !cached.is_expired(self.ttl) {
                return Some(cached.tenant.clone());
            }
            cache.pop(code);
        }
        None
    }

    async fn get_by_id(&self, id: Uuid) -> Option<Tenant> {
        let mut cache = self.by_id.write().await;
        if let Some(cached) = cache.get(&id) {
            if !cached.is_expired(self.ttl) {
                return Some(cached.tenant.clone());
            }
            cache.pop(&id);
        }
        None
    }

    async fn insert(&self, tenant: &Tenant) {
        let cached = CachedTenant::new(tenant.clone());
        {
            let mut by_code = self.by_code.write().await;
            by_code.put(tenant.code.clone(), cached.clone());
        }
        {
            let mut by_id = self.by_id.write().await;
            by_id.put(tenant.id, cached);
        }
    }

    /// Invalidates a tenant from both caches.
    pub async fn invalidate(&self, tenant_id: Uuid, code: &str) {
        {
            let mut by_code = self.by_code.write().await;
            by_code.pop(code);
        }
        {
            let mut by_id = self.by_id.write().await;
            by_id.pop(&tenant_id);
        }
    }
}

/// Source a tenant was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    /// Verified principal claim.
    Claim,
    /// Subdomain against the configured base domain.
    Subdomain,
    /// X-Tenant-ID header.
    Header,
    /// `tenant` query parameter.
    QueryParam,
    /// Explicitly configured default tenant.
    Default,
}

/// Error type for tenant resolution failures.
#[derive(Debug)]
pub enum TenantResolutionError {
    /// Tenant not found, or request carried no tenant signal at all.
    NotFound,
    /// Tenant exists but is suspended or archived.
    NotOperational,
    /// Internal error during resolution.
    Internal(String),
}

impl IntoResponse for TenantResolutionError {
    fn into_response(self) -> Response {
        // 404 for both missing and non-operational tenants so probing cannot
        // enumerate which schools exist.
        match self {
            TenantResolutionError::NotFound | TenantResolutionError::NotOperational => {
                (StatusCode::NOT_FOUND, "Not Found").into_response()
            }
            TenantResolutionError::Internal(msg) => {
                warn!(error = %msg, "Internal tenant resolution error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

/// Configuration for tenant resolution.
#[derive(Clone)]
pub struct TenantResolutionConfig {
    /// Whether requests without a resolvable tenant are rejected.
    pub require_tenant: bool,
    /// Base domain for subdomain extraction (e.g., "schoolyard.app").
    pub base_domain: Option<String>,
    /// Default tenant code for single-school deployments. This is the only
    /// fallback; with none configured, unresolvable requests fail.
    pub default_tenant_code: Option<String>,
    /// Cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Cache capacity.
    pub cache_capacity: usize,
}

impl Default for TenantResolutionConfig {
    fn default() -> Self {
        Self {
            require_tenant: true,
            base_domain: std::env::var("SY_BASE_DOMAIN").ok(),
            default_tenant_code: std::env::var("SY_DEFAULT_TENANT").ok(),
            cache_ttl_secs: std::env::var("SY_TENANT_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
            cache_capacity: std::env::var("SY_TENANT_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CACHE_CAPACITY),
        }
    }
}

/// Tenant resolver with directory lookup and caching.
#[derive(Clone)]
pub struct TenantResolver {
    repo: Arc<dyn TenantRepository>,
    cache: Arc<TenantCache>,
    config: TenantResolutionConfig,
}

impl TenantResolver {
    /// Creates a new tenant resolver.
    pub fn new(repo: Arc<dyn TenantRepository>, config: TenantResolutionConfig) -> Self {
        let cache = Arc::new(TenantCache::new(
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        ));
        Self { repo, cache, config }
    }

    /// Creates a tenant resolver with default config.
    pub fn with_defaults(repo: Arc<dyn TenantRepository>) -> Self {
        Self::new(repo, TenantResolutionConfig::default())
    }

    /// The resolver's cache, for invalidation on tenant updates.
    pub fn cache(&self) -> &TenantCache {
        &self.cache
    }

    /// Resolves the tenant for a request.
    ///
    /// Returns `Ok(None)` for bypass paths and, when tenants are optional,
    /// for requests with no tenant signal.
    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        path: &str,
        query: Option<&str>,
        principal: Option<&Principal>,
    ) -> Result<Option<(TenantContext, TenantSource)>, TenantResolutionError> {
        if should_bypass_path(path) {
            debug!(path = %path, "Bypassing tenant resolution for path");
            return Ok(None);
        }

        // Verified claim wins over everything the client can spoof.
        if let Some(tenant_id) = principal.and_then(|p| p.tenant_id) {
            debug!(tenant_id = %tenant_id, "Resolving tenant from principal claim");
            return self
                .resolve_by_id(tenant_id)
                .await
                .map(|ctx| Some((ctx, TenantSource::Claim)));
        }

        if let Some(code) = self.extract_subdomain(headers) {
            debug!(code = %code, "Resolving tenant from subdomain");
            return self
                .resolve_by_code(&code)
                .await
                .map(|ctx| Some((ctx, TenantSource::Subdomain)));
        }

        if let Some(tenant_id) = extract_header_tenant_id(headers) {
            debug!(tenant_id = %tenant_id, "Resolving tenant from header");
            return self
                .resolve_by_id(tenant_id)
                .await
                .map(|ctx| Some((ctx, TenantSource::Header)));
        }

        if let Some(code) = query.and_then(extract_query_tenant_code) {
            debug!(code = %code, "Resolving tenant from query parameter");
            return self
                .resolve_by_code(&code)
                .await
                .map(|ctx| Some((ctx, TenantSource::QueryParam)));
        }

        if let Some(ref default_code) = self.config.default_tenant_code {
            debug!(code = %default_code, "Using configured default tenant");
            return self
                .resolve_by_code(default_code)
                .await
                .map(|ctx| Some((ctx, TenantSource::Default)));
        }

        if self.config.require_tenant {
            Err(TenantResolutionError::NotFound)
        } else {
            Ok(None)
        }
    }

    /// Extracts a tenant code from the Host subdomain.
    fn extract_subdomain(&self, headers: &HeaderMap) -> Option<String> {
        let base_domain = self.config.base_domain.as_ref()?;

        let host = headers
            .get(axum::http::header::HOST)
            .and_then(|h| h.to_str().ok())?;

        // Strip port if present
        let host = host.split(':').next()?;

        if !host.ends_with(base_domain.as_str()) {
            return None;
        }

        let subdomain = host.strip_suffix(base_domain.as_str())?.trim_end_matches('.');

        // No nested subdomains
        if subdomain.is_empty() || subdomain.contains('.') {
            return None;
        }

        if RESERVED_SUBDOMAINS.contains(&subdomain) {
            return None;
        }

        Some(subdomain.to_string())
    }

    async fn resolve_by_code(&self, code: &str) -> Result<TenantContext, TenantResolutionError> {
        if let Some(tenant) = self.cache.get_by_code(code).await {
            return tenant_to_context(tenant);
        }

        let tenant = self
            .repo
            .get_by_code(code)
            .await
            .map_err(|e| TenantResolutionError::Internal(e.to_string()))?
            .ok_or(TenantResolutionError::NotFound)?;

        self.cache.insert(&tenant).await;
        tenant_to_context(tenant)
    }

    async fn resolve_by_id(&self, id: Uuid) -> Result<TenantContext, TenantResolutionError> {
        if let Some(tenant) = self.cache.get_by_id(id).await {
            return tenant_to_context(tenant);
        }

        let tenant = self
            .repo
            .get(id)
            .await
            .map_err(|e| TenantResolutionError::Internal(e.to_string()))?
            .ok_or(TenantResolutionError::NotFound)?;

        self.cache.insert(&tenant).await;
        tenant_to_context(tenant)
    }
}

/// Converts a tenant to a request context, checking operational status.
fn tenant_to_context(tenant: Tenant) -> Result<TenantContext, TenantResolutionError> {
    if !tenant.is_operational() {
        return Err(TenantResolutionError::NotOperational);
    }
    Ok(TenantContext::from_tenant(&tenant))
}

/// Checks if a path should bypass tenant resolution.
fn should_bypass_path(path: &str) -> bool {
    BYPASS_PATHS
        .iter()
        .any(|bypass| path == *bypass || path.starts_with(&format!("{}/", bypass)))
}

/// Extracts a tenant ID from the X-Tenant-ID header.
fn extract_header_tenant_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(TENANT_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Extracts a tenant code from a raw query string.
fn extract_query_tenant_code(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == TENANT_QUERY_PARAM && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Axum extractor for the resolved tenant context.
///
/// Rejects with 404 when no tenant was resolved for the request.
pub struct RequireTenant(pub TenantContext);

#[async_trait]
impl<S> FromRequestParts<S> for RequireTenant
where
    S: Send + Sync,
{
    type Rejection = TenantResolutionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .map(RequireTenant)
            .ok_or(TenantResolutionError::NotFound)
    }
}

/// Optional tenant context extractor, for endpoints that serve both scoped
/// and platform-level requests.
pub struct OptionalTenant(pub Option<TenantContext>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalTenant
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalTenant(
            parts.extensions.get::<TenantContext>().cloned(),
        ))
    }
}

/// Middleware that resolves the tenant and runs the rest of the stack inside
/// the identity slot.
///
/// The slot covers `next.run(..)` entirely, so extractors, handlers, and
/// repository calls all observe the same tenant for the request's lifetime.
pub async fn tenant_resolution_middleware(
    resolver: TenantResolver,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    let headers = request.headers().clone();
    let principal = request.extensions().get::<Principal>().cloned();

    match resolver
        .resolve(&headers, &path, query.as_deref(), principal.as_ref())
        .await
    {
        Ok(Some((context, source))) => {
            let tenant_id = context.tenant_id;
            request.extensions_mut().insert(context.clone());

            info!(
                tenant_id = %tenant_id,
                tenant_code = %context.tenant_code,
                source = ?source,
                "Tenant resolved"
            );

            scope::with_tenant(tenant_id, next.run(request)).await
        }
        Ok(None) => {
            debug!(path = %path, "Request proceeding without tenant context");
            next.run(request).await
        }
        Err(e) => {
            warn!(path = %path, error = ?e, "Tenant resolution failed");
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use sy_core::db::mocks::MockTenantRepository;
    use sy_core::tenant::TenantStatus;

    fn resolver_with(config: TenantResolutionConfig) -> TenantResolver {
        TenantResolver::new(Arc::new(MockTenantRepository::new()), config)
    }

    fn resolver_with_tenants(
        tenants: Vec<Tenant>,
        config: TenantResolutionConfig,
    ) -> TenantResolver {
        TenantResolver::new(Arc::new(MockTenantRepository::with_tenants(tenants)), config)
    }

    fn base_config() -> TenantResolutionConfig {
        TenantResolutionConfig {
            require_tenant: true,
            base_domain: Some("schoolyard.test".to_string()),
            default_tenant_code: None,
            cache_ttl_secs: 60,
            cache_capacity: 100,
        }
    }

    #[test]
    fn bypass_paths() {
        assert!(should_bypass_path("/health"));
        assert!(should_bypass_path("/health/detailed"));
        assert!(should_bypass_path("/ready"));
        assert!(should_bypass_path("/live"));

        assert!(!should_bypass_path("/healthz"));
        assert!(!should_bypass_path("/api/health"));
        assert!(!should_bypass_path("/api/v1/students"));
        assert!(!should_bypass_path("/"));
    }

    #[test]
    fn subdomain_extraction() {
        let resolver = resolver_with(base_config());

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::HOST,
            HeaderValue::from_static("hilltop.schoolyard.test"),
        );
        assert_eq!(
            resolver.extract_subdomain(&headers),
            Some("hilltop".to_string())
        );

        // Port is stripped
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::HOST,
            HeaderValue::from_static("hilltop.schoolyard.test:8080"),
        );
        assert_eq!(
            resolver.extract_subdomain(&headers),
            Some("hilltop".to_string())
        );

        // Bare base domain
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::HOST,
            HeaderValue::from_static("schoolyard.test"),
        );
        assert_eq!(resolver.extract_subdomain(&headers), None);

        // Reserved subdomains
        for sub in RESERVED_SUBDOMAINS {
            let mut headers = HeaderMap::new();
            let host = format!("{}.schoolyard.test", sub);
            headers.insert(
                axum::http::header::HOST,
                HeaderValue::from_str(&host).unwrap(),
            );
            assert_eq!(resolver.extract_subdomain(&headers), None);
        }

        // Nested subdomains
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::HOST,
            HeaderValue::from_static("a.b.schoolyard.test"),
        );
        assert_eq!(resolver.extract_subdomain(&headers), None);

        // Different domain
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::HOST,
            HeaderValue::from_static("hilltop.other.test"),
        );
        assert_eq!(resolver.extract_subdomain(&headers), None);
    }

    #[test]
    fn header_tenant_id_extraction() {
        let tenant_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            TENANT_ID_HEADER,
            HeaderValue::from_str(&tenant_id.to_string()).unwrap(),
        );
        assert_eq!(extract_header_tenant_id(&headers), Some(tenant_id));

        let mut headers = HeaderMap::new();
        headers.insert(TENANT_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_eq!(extract_header_tenant_id(&headers), None);

        assert_eq!(extract_header_tenant_id(&HeaderMap::new()), None);
    }

    #[test]
    fn query_tenant_code_extraction() {
        assert_eq!(
            extract_query_tenant_code("tenant=hilltop"),
            Some("hilltop".to_string())
        );
        assert_eq!(
            extract_query_tenant_code("page=2&tenant=hilltop&sort=name"),
            Some("hilltop".to_string())
        );
        assert_eq!(extract_query_tenant_code("tenant="), None);
        assert_eq!(extract_query_tenant_code("tenantx=hilltop"), None);
        assert_eq!(extract_query_tenant_code(""), None);
    }

    #[tokio::test]
    async fn claim_beats_header_and_subdomain() {
        let claimed = Tenant::new("claimed", "Claimed School").unwrap();
        let other = Tenant::new("other", "Other School").unwrap();
        let claimed_id = claimed.id;
        let other_id = other.id;

        let resolver = resolver_with_tenants(vec![claimed, other], base_config());

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::HOST,
            HeaderValue::from_static("other.schoolyard.test"),
        );
        headers.insert(
            TENANT_ID_HEADER,
            HeaderValue::from_str(&other_id.to_string()).unwrap(),
        );

        let principal = Principal::for_tenant(Uuid::new_v4(), claimed_id);
        let (ctx, source) = resolver
            .resolve(&headers, "/api/v1/students", None, Some(&principal))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ctx.tenant_id, claimed_id);
        assert_eq!(source, TenantSource::Claim);
    }

    #[tokio::test]
    async fn header_beats_query_param() {
        let by_header = Tenant::new("by-header", "Header School").unwrap();
        let by_query = Tenant::new("by-query", "Query School").unwrap();
        let header_id = by_header.id;

        let resolver = resolver_with_tenants(vec![by_header, by_query], base_config());

        let mut headers = HeaderMap::new();
        headers.insert(
            TENANT_ID_HEADER,
            HeaderValue::from_str(&header_id.to_string()).unwrap(),
        );

        let (ctx, source) = resolver
            .resolve(&headers, "/api/v1/students", Some("tenant=by-query"), None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ctx.tenant_id, header_id);
        assert_eq!(source, TenantSource::Header);
    }

    #[tokio::test]
    async fn unresolvable_request_fails_closed() {
        let resolver = resolver_with(base_config());
        let result = resolver
            .resolve(&HeaderMap::new(), "/api/v1/students", None, None)
            .await;
        assert!(matches!(result, Err(TenantResolutionError::NotFound)));
    }

    #[tokio::test]
    async fn default_tenant_must_be_configured_explicitly() {
        let tenant = Tenant::new("solo", "Solo School").unwrap();
        let tenant_id = tenant.id;
        let config = TenantResolutionConfig {
            default_tenant_code: Some("solo".to_string()),
            ..base_config()
        };
        let resolver = resolver_with_tenants(vec![tenant], config);

        let (ctx, source) = resolver
            .resolve(&HeaderMap::new(), "/api/v1/students", None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ctx.tenant_id, tenant_id);
        assert_eq!(source, TenantSource::Default);
    }

    #[tokio::test]
    async fn suspended_tenant_reads_as_not_found() {
        let mut tenant = Tenant::new("frozen", "Frozen School").unwrap();
        tenant.update_status(TenantStatus::Suspended);
        let resolver = resolver_with_tenants(vec![tenant], base_config());

        let result = resolver
            .resolve(
                &HeaderMap::new(),
                "/api/v1/students",
                Some("tenant=frozen"),
                None,
            )
            .await;
        assert!(matches!(result, Err(TenantResolutionError::NotOperational)));
        assert_eq!(
            TenantResolutionError::NotOperational
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn unknown_tenant_and_suspended_tenant_are_indistinguishable() {
        let mut suspended = Tenant::new("frozen", "Frozen School").unwrap();
        suspended.update_status(TenantStatus::Suspended);
        let resolver = resolver_with_tenants(vec![suspended], base_config());

        let missing = resolver
            .resolve(
                &HeaderMap::new(),
                "/api/v1/students",
                Some("tenant=ghost"),
                None,
            )
            .await
            .unwrap_err()
            .into_response();
        let frozen = resolver
            .resolve(
                &HeaderMap::new(),
                "/api/v1/students",
                Some("tenant=frozen"),
                None,
            )
            .await
            .unwrap_err()
            .into_response();

        assert_eq!(missing.status(), frozen.status());
    }

    #[tokio::test]
    async fn bypass_path_resolves_to_none() {
        let resolver = resolver_with(base_config());
        let result = resolver
            .resolve(&HeaderMap::new(), "/health", None, None)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn cache_serves_repeat_lookups() {
        let tenant = Tenant::new("cached", "Cached School").unwrap();
        let repo = Arc::new(MockTenantRepository::with_tenants(vec![tenant]));
        let resolver = TenantResolver::new(repo.clone(), base_config());

        resolver.resolve_by_code("cached").await.unwrap();

        // A repository outage no longer affects cached codes.
        repo.fail_with(sy_core::db::DbError::Connection("down".to_string()));
        assert!(resolver.resolve_by_code("cached").await.is_ok());
        assert!(matches!(
            resolver.resolve_by_code("uncached").await,
            Err(TenantResolutionError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn cache_entries_expire() {
        let tenant = Tenant::new("brief", "Brief School").unwrap();
        let cache = TenantCache::new(10, Duration::from_millis(20));
        cache.insert(&tenant).await;

        assert!(cache.get_by_code("brief").await.is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get_by_code("brief").await.is_none());
    }

    #[tokio::test]
    async fn cache_evicts_least_recently_used() {
        let cache = TenantCache::new(2, Duration::from_secs(60));
        let t1 = Tenant::new("one", "One").unwrap();
        let t2 = Tenant::new("two", "Two").unwrap();
        let t3 = Tenant::new("three", "Three").unwrap();

        cache.insert(&t1).await;
        cache.insert(&t2).await;
        cache.insert(&t3).await;

        assert!(cache.get_by_code("one").await.is_none());
        assert!(cache.get_by_code("two").await.is_some());
        assert!(cache.get_by_code("three").await.is_some());
    }

    #[tokio::test]
    async fn cache_invalidation_is_immediate() {
        let tenant = Tenant::new("gone", "Gone School").unwrap();
        let cache = TenantCache::new(10, Duration::from_secs(60));
        cache.insert(&tenant).await;

        cache.invalidate(tenant.id, "gone").await;
        assert!(cache.get_by_code("gone").await.is_none());
        assert!(cache.get_by_id(tenant.id).await.is_none());
    }
}
