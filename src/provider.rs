//! Supported video-sharing providers and their fixed attributes.
//!
//! Every piece of per-provider variability outside of page scraping lives
//! here: the marker token a shared link must carry, the companion app's
//! package id, and the download subdirectory media is filed under.

use std::fmt;

/// A third-party video-sharing service links can be resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    /// Chingari (`chingari.io`)
    Chingari,
    /// Likee (`likee.video`)
    Likee,
    /// Roposo (`roposo.com`)
    Roposo,
}

impl Provider {
    /// All supported providers in a stable order.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Chingari, Self::Likee, Self::Roposo]
    }

    /// Human-readable provider name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Chingari => "Chingari",
            Self::Likee => "Likee",
            Self::Roposo => "Roposo",
        }
    }

    /// Lowercase identifier used in logs, CLI arguments and generated filenames.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Chingari => "chingari",
            Self::Likee => "likee",
            Self::Roposo => "roposo",
        }
    }

    /// Token that must appear in the host or path of a shared link.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        self.slug()
    }

    /// Package identifier of the provider's companion app.
    #[must_use]
    pub const fn app_package(self) -> &'static str {
        match self {
            Self::Chingari => "io.chingari.app",
            Self::Likee => "video.like",
            Self::Roposo => "com.roposo.android",
        }
    }

    /// Subdirectory of the download root that this provider's media is saved under.
    ///
    /// Distinct per provider so identically named files never collide across services.
    #[must_use]
    pub const fn directory_name(self) -> &'static str {
        match self {
            Self::Chingari => "ChingariDownloads",
            Self::Likee => "LikeeDownloads",
            Self::Roposo => "RoposoDownloads",
        }
    }

    /// Looks up a provider by slug or display name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::all()
            .into_iter()
            .find(|p| p.slug().eq_ignore_ascii_case(name))
    }

    /// Returns the provider whose marker appears in the given URL's host or path.
    #[must_use]
    pub fn detect(url: &url::Url) -> Option<Self> {
        Self::all().into_iter().find(|p| p.matches_url(url))
    }

    /// Returns true if the URL's host or path carries this provider's marker.
    #[must_use]
    pub fn matches_url(self, url: &url::Url) -> bool {
        let marker = self.marker();
        let host_matches = url
            .host_str()
            .is_some_and(|host| host.to_ascii_lowercase().contains(marker));
        host_matches || url.path().to_ascii_lowercase().contains(marker)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
