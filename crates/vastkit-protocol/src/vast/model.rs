//! VAST document model
//!
//! A deliberately small projection of a VAST response: wrapper redirects,
//! tracking URLs, and the media files a player can choose from. Everything
//! else in the document is ignored.

use serde::{Deserialize, Serialize};

/// A parsed VAST response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VastDocument {
    /// The `version` attribute of the `<VAST>` root, when present
    pub version: Option<String>,
    /// The ad, or `None` when the document held neither InLine nor Wrapper
    /// (including malformed XML)
    pub ad: Option<VastAd>,
    /// The response text as received, for debugging and re-serving
    pub raw: String,
}

impl VastDocument {
    pub fn is_wrapper(&self) -> bool {
        matches!(self.ad, Some(VastAd::Wrapper(_)))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.ad, Some(VastAd::Inline(_)))
    }

    /// Impression URLs at this level
    pub fn impressions(&self) -> &[String] {
        match &self.ad {
            Some(VastAd::Wrapper(w)) => &w.impressions,
            Some(VastAd::Inline(i)) => &i.impressions,
            None => &[],
        }
    }

    /// Error pixel URLs at this level
    pub fn error_urls(&self) -> &[String] {
        match &self.ad {
            Some(VastAd::Wrapper(w)) => &w.errors,
            Some(VastAd::Inline(i)) => &i.errors,
            None => &[],
        }
    }

    /// Tracking event URLs at this level
    pub fn tracking_events(&self) -> &[String] {
        match &self.ad {
            Some(VastAd::Wrapper(w)) => &w.tracking_events,
            Some(VastAd::Inline(i)) => &i.tracking_events,
            None => &[],
        }
    }
}

/// The two ad shapes VAST defines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VastAd {
    /// Redirect to another ad server, carrying its own tracking URLs
    Wrapper(WrapperAd),
    /// A terminal ad with playable media files
    Inline(InlineAd),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WrapperAd {
    /// Redirect target; a wrapper without one is unresolvable
    pub ad_tag_uri: Option<String>,
    pub impressions: Vec<String>,
    pub errors: Vec<String>,
    pub tracking_events: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineAd {
    pub impressions: Vec<String>,
    pub errors: Vec<String>,
    pub tracking_events: Vec<String>,
    pub media_files: Vec<MediaFile>,
}

/// One playable rendition of the creative
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub url: String,
    /// `progressive` or `streaming`
    pub delivery: Option<String>,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Kbps; renditions without one sort after those that declare it
    pub bitrate: Option<u32>,
}
