//! Media file selection strategies
//!
//! Ties keep the first encountered candidate, and renditions without a
//! bitrate sort after those that declare one, for both the highest and
//! lowest strategies.

use std::sync::Arc;

use super::model::MediaFile;

/// How to pick one rendition from an inline ad's media files
#[derive(Clone, Default)]
pub enum SelectionStrategy {
    /// Highest declared bitrate
    #[default]
    HighestBitrate,
    /// Lowest declared bitrate
    LowestBitrate,
    /// Largest pixel area, preferring mp4 over webm and bitrate as tiebreak
    BestQuality,
    /// Caller-supplied selector returning an index into the slice
    Custom(Arc<dyn Fn(&[MediaFile]) -> Option<usize> + Send + Sync>),
}

impl std::fmt::Debug for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighestBitrate => write!(f, "HighestBitrate"),
            Self::LowestBitrate => write!(f, "LowestBitrate"),
            Self::BestQuality => write!(f, "BestQuality"),
            Self::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl SelectionStrategy {
    /// Select a rendition; `None` when the slice is empty or a custom
    /// selector declines (or returns an out-of-range index)
    pub fn select<'a>(&self, media_files: &'a [MediaFile]) -> Option<&'a MediaFile> {
        match self {
            Self::HighestBitrate => pick_by(media_files, |a, b| a.bitrate > b.bitrate),
            Self::LowestBitrate => pick_by(media_files, |a, b| {
                // Option orders None first; flip so missing bitrates lose.
                match (a.bitrate, b.bitrate) {
                    (Some(a), Some(b)) => a < b,
                    (Some(_), None) => true,
                    _ => false,
                }
            }),
            Self::BestQuality => pick_by(media_files, |a, b| quality_rank(a) > quality_rank(b)),
            Self::Custom(selector) => selector(media_files)
                .and_then(|index| media_files.get(index)),
        }
    }
}

/// (area, codec preference, bitrate) with missing fields ranking lowest
fn quality_rank(media: &MediaFile) -> (u64, u8, Option<u32>) {
    let area = u64::from(media.width.unwrap_or(0)) * u64::from(media.height.unwrap_or(0));
    let codec = match media.mime_type.as_deref() {
        Some("video/mp4") => 2,
        Some("video/webm") => 1,
        _ => 0,
    };
    (area, codec, media.bitrate)
}

/// First element no later element strictly beats
fn pick_by<'a>(
    media_files: &'a [MediaFile],
    beats: impl Fn(&MediaFile, &MediaFile) -> bool,
) -> Option<&'a MediaFile> {
    let mut best: Option<&MediaFile> = None;
    for candidate in media_files {
        match best {
            Some(current) if !beats(candidate, current) => {}
            _ => best = Some(candidate),
        }
    }
    best
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn media(url: &str, bitrate: Option<u32>) -> MediaFile {
        MediaFile {
            url: url.to_string(),
            bitrate,
            ..MediaFile::default()
        }
    }

    #[test]
    fn test_highest_bitrate() {
        let files = [
            media("low", Some(500)),
            media("high", Some(2000)),
            media("mid", Some(1000)),
        ];
        let picked = SelectionStrategy::HighestBitrate.select(&files);
        assert_eq!(picked.map(|m| m.url.as_str()), Some("high"));
    }

    #[test]
    fn test_lowest_bitrate_skips_missing() {
        let files = [
            media("unknown", None),
            media("low", Some(500)),
            media("high", Some(2000)),
        ];
        let picked = SelectionStrategy::LowestBitrate.select(&files);
        assert_eq!(picked.map(|m| m.url.as_str()), Some("low"));
    }

    #[test]
    fn test_ties_keep_first_encountered() {
        let files = [media("first", Some(1000)), media("second", Some(1000))];
        let picked = SelectionStrategy::HighestBitrate.select(&files);
        assert_eq!(picked.map(|m| m.url.as_str()), Some("first"));
    }

    #[test]
    fn test_missing_bitrate_sorts_last_for_highest() {
        let files = [media("unknown", None), media("known", Some(100))];
        let picked = SelectionStrategy::HighestBitrate.select(&files);
        assert_eq!(picked.map(|m| m.url.as_str()), Some("known"));
    }

    #[test]
    fn test_best_quality_prefers_area_then_codec() {
        let hd_webm = MediaFile {
            url: "hd-webm".to_string(),
            mime_type: Some("video/webm".to_string()),
            width: Some(1920),
            height: Some(1080),
            ..MediaFile::default()
        };
        let hd_mp4 = MediaFile {
            url: "hd-mp4".to_string(),
            mime_type: Some("video/mp4".to_string()),
            width: Some(1920),
            height: Some(1080),
            ..MediaFile::default()
        };
        let sd_mp4 = MediaFile {
            url: "sd-mp4".to_string(),
            mime_type: Some("video/mp4".to_string()),
            width: Some(640),
            height: Some(360),
            ..MediaFile::default()
        };

        let files = [sd_mp4, hd_webm, hd_mp4];
        let picked = SelectionStrategy::BestQuality.select(&files);
        assert_eq!(picked.map(|m| m.url.as_str()), Some("hd-mp4"));
    }

    #[test]
    fn test_custom_selector_bounds_checked() {
        let files = [media("only", Some(100))];
        let strategy = SelectionStrategy::Custom(Arc::new(|media: &[MediaFile]| {
            Some(media.len() + 10)
        }));
        assert!(strategy.select(&files).is_none());
    }

    #[test]
    fn test_empty_slice_selects_nothing() {
        assert!(SelectionStrategy::HighestBitrate.select(&[]).is_none());
    }
}
