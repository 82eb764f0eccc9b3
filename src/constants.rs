// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers keeps the defaults in one place.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address for the interception server
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1";

/// Default listen port for the interception server
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Path of the worker status endpoint served by the interception server
pub const STATUS_ENDPOINT_PATH: &str = "/__tsubame/status";

/// Path of the liveness endpoint served by the interception server
pub const HEALTH_ENDPOINT_PATH: &str = "/__tsubame/health";

// =============================================================================
// Route defaults
// =============================================================================

/// Default HTTP method a route applies to
pub const DEFAULT_ROUTE_METHOD: &str = "GET";

/// Default maximum number of entries per runtime cache
pub const DEFAULT_MAX_ENTRIES: u32 = 200;

/// Default maximum entry age in seconds (24 hours)
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 24 * 60 * 60;

/// Response statuses stored by default
pub const DEFAULT_CACHEABLE_STATUSES: &[u16] = &[200];

// =============================================================================
// Precache defaults
// =============================================================================

/// Name of the cache holding precached assets
pub const PRECACHE_NAME: &str = "precache";

/// Root document that must precache for offline readiness
pub const ROOT_DOCUMENT_URL: &str = "/";

/// Default offline substitute page
pub const DEFAULT_OFFLINE_URL: &str = "/offline";

/// Directory index tried when a directory URL is not precached
pub const DEFAULT_DIRECTORY_INDEX: &str = "index.html";

/// Query parameters ignored when matching precached URLs
pub const DEFAULT_IGNORED_URL_PARAMETERS: &[&str] = &["^utm_", "^fbclid$"];

/// Maximum number of concurrent precache fetches during install
pub const DEFAULT_PRECACHE_CONCURRENCY: usize = 8;

// =============================================================================
// Reload defaults
// =============================================================================

/// How often a pending SIGHUP reload request is checked for
pub const RELOAD_CHECK_INTERVAL_MS: u64 = 500;

// =============================================================================
// Outer delivery headers
// =============================================================================

/// Cache-Control directive for dynamic, non-cacheable responses
pub const NO_STORE_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

/// Security headers attached to every delivered response
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
];

/// Response header naming where an intercepted response came from
pub const SOURCE_HEADER: &str = "x-tsubame-source";
