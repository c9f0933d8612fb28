//! Shared User-Agent strings for resolver and download HTTP clients.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/grabber";

/// Mobile browser User-Agent presented to provider pages.
///
/// Share pages are built for phones; desktop or tool agents get an app-install
/// interstitial without the embedded media data.
const MOBILE_BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 13; Pixel 7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36";

/// Default User-Agent for media download requests (identifies the tool).
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("grabber/{version} (+{PROJECT_UA_URL})")
}

/// User-Agent used by every provider resolver.
#[must_use]
pub(crate) fn mobile_browser_user_agent() -> &'static str {
    MOBILE_BROWSER_USER_AGENT
}
