//! Streaming VAST parser
//!
//! Pulls the wrapper/inline structure out of a VAST response with a single
//! pass over the XML events. Malformed XML never fails the parse: the result
//! is a document whose `ad` is `None`, which the resolver reports as a
//! response containing neither InLine nor Wrapper.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::model::{InlineAd, MediaFile, VastAd, VastDocument, WrapperAd};

#[derive(Clone, Copy, PartialEq)]
enum Capture {
    AdTagUri,
    Impression,
    Error,
    Tracking,
    MediaFile,
}

#[derive(Clone, Copy, PartialEq)]
enum AdShape {
    Wrapper,
    Inline,
}

#[derive(Default)]
struct DocumentBuilder {
    version: Option<String>,
    shape: Option<AdShape>,
    ad_tag_uri: Option<String>,
    impressions: Vec<String>,
    errors: Vec<String>,
    tracking_events: Vec<String>,
    media_files: Vec<MediaFile>,
    pending_media: Option<MediaFile>,
    capture: Option<Capture>,
}

impl DocumentBuilder {
    fn open(&mut self, element: &BytesStart<'_>) {
        match element.name().as_ref() {
            b"VAST" => {
                self.version = attribute(element, b"version");
            }
            b"Wrapper" => self.shape = Some(AdShape::Wrapper),
            b"InLine" => self.shape = Some(AdShape::Inline),
            b"VASTAdTagURI" => self.capture = Some(Capture::AdTagUri),
            b"Impression" => self.capture = Some(Capture::Impression),
            b"Error" => self.capture = Some(Capture::Error),
            b"Tracking" => self.capture = Some(Capture::Tracking),
            b"MediaFile" => {
                self.pending_media = Some(MediaFile {
                    url: String::new(),
                    delivery: attribute(element, b"delivery"),
                    mime_type: attribute(element, b"type"),
                    width: numeric_attribute(element, b"width"),
                    height: numeric_attribute(element, b"height"),
                    bitrate: numeric_attribute(element, b"bitrate"),
                });
                self.capture = Some(Capture::MediaFile);
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match self.capture {
            Some(Capture::AdTagUri) => self.ad_tag_uri = Some(text.to_string()),
            Some(Capture::Impression) => self.impressions.push(text.to_string()),
            Some(Capture::Error) => self.errors.push(text.to_string()),
            Some(Capture::Tracking) => self.tracking_events.push(text.to_string()),
            Some(Capture::MediaFile) => {
                if let Some(media) = self.pending_media.as_mut() {
                    media.url.push_str(text);
                }
            }
            None => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        if name == b"MediaFile" {
            if let Some(media) = self.pending_media.take() {
                if !media.url.is_empty() {
                    self.media_files.push(media);
                }
            }
        }
        self.capture = None;
    }

    fn finish(self, raw: String) -> VastDocument {
        let ad = match self.shape {
            Some(AdShape::Wrapper) => Some(VastAd::Wrapper(WrapperAd {
                ad_tag_uri: self.ad_tag_uri,
                impressions: self.impressions,
                errors: self.errors,
                tracking_events: self.tracking_events,
            })),
            Some(AdShape::Inline) => Some(VastAd::Inline(InlineAd {
                impressions: self.impressions,
                errors: self.errors,
                tracking_events: self.tracking_events,
                media_files: self.media_files,
            })),
            None => None,
        };
        VastDocument {
            version: self.version,
            ad,
            raw,
        }
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

fn numeric_attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<u32> {
    attribute(element, name).and_then(|value| value.trim().parse().ok())
}

/// Parse a VAST response; never fails
pub fn parse(bytes: &[u8]) -> VastDocument {
    let raw = String::from_utf8_lossy(bytes).into_owned();
    let mut reader = Reader::from_reader(bytes);
    let mut builder = DocumentBuilder::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => builder.open(&element),
            Ok(Event::Text(text)) => {
                if let Ok(text) = text.unescape() {
                    builder.text(&text);
                }
            }
            Ok(Event::CData(cdata)) => {
                let raw = cdata.into_inner();
                builder.text(&String::from_utf8_lossy(&raw));
            }
            Ok(Event::End(element)) => builder.close(element.name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("Malformed VAST XML: {e}");
                return VastDocument {
                    version: None,
                    ad: None,
                    raw,
                };
            }
            Ok(_) => {}
        }
        buf.clear();
    }

    builder.finish(raw)
}
