//! URL-based request classification

use super::Strategy;
use crate::cache::Partition;
use crate::http::Request;

/// What kind of resource a request is after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Deploy-time asset: scripts, styles, icons, the manifest
    StaticAsset,
    /// User-uploaded media and non-icon images
    UserMedia,
    /// API endpoint or dynamic data view
    ApiDynamic,
    /// HTML page navigation
    HtmlPage,
    /// State-changing request
    Mutation,
    /// Anything else
    Other,
}

impl RequestClass {
    /// Strategy and cache partition for this class
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::StaticAsset => Strategy::CacheFirst(Partition::StaticAssets),
            Self::UserMedia => Strategy::CacheFirst(Partition::DynamicPages),
            Self::ApiDynamic => Strategy::NetworkFirst(Partition::ApiResponses),
            Self::HtmlPage | Self::Other => Strategy::NetworkFirst(Partition::DynamicPages),
            Self::Mutation => Strategy::NetworkOnly,
        }
    }
}

/// URL prefixes served as immutable static assets
const STATIC_ASSET_PREFIXES: [&str; 3] = [
    "/static/js/",
    "/static/styles/",
    "/static/images/icons/",
];

/// URL prefixes for API endpoints and dynamic data views
const API_DYNAMIC_PREFIXES: [&str; 7] = [
    "/api/",
    "/check_user_status/",
    "/get_follow_data/",
    "/inbox/",
    "/conversation/",
    "/profile/",
    "/room/",
];

/// Classify a request from its method, URL path and Accept header.
///
/// Mutations win over everything; a POST to an API path is still a
/// mutation. URL rules are prefix matches on the origin-relative path,
/// query string excluded.
#[must_use]
pub fn classify(request: &Request) -> RequestClass {
    if request.method.is_mutation() {
        return RequestClass::Mutation;
    }

    let path = request.url.split('?').next().unwrap_or(&request.url);

    if path == "/static/manifest.json"
        || STATIC_ASSET_PREFIXES.iter().any(|p| path.starts_with(p))
    {
        return RequestClass::StaticAsset;
    }

    // Non-icon images and uploads: cacheable but not deploy-immutable
    if path.starts_with("/images/")
        || path.starts_with("/media/")
        || path.starts_with("/static/images/")
    {
        return RequestClass::UserMedia;
    }

    if API_DYNAMIC_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return RequestClass::ApiDynamic;
    }

    if request.accepts_html() {
        return RequestClass::HtmlPage;
    }

    RequestClass::Other
}
