//! VAST URL macros and IAB error codes
//!
//! Tracking and error URLs carry bracketed macros that must be substituted
//! before firing. `[CACHEBUSTING]` gets a fresh random value on every fire,
//! while `[TIMESTAMP]` comes from the session so all pixels of one request
//! agree.

use rand::RngExt;

use crate::context::SessionContext;
use crate::error::ProtocolError;

/// XML parsing error
pub const ERROR_XML_PARSE: u32 = 100;
/// VAST schema validation error
pub const ERROR_SCHEMA_VALIDATION: u32 = 101;
/// VAST version of response not supported
pub const ERROR_VERSION_UNSUPPORTED: u32 = 102;
/// General wrapper error
pub const ERROR_WRAPPER_GENERAL: u32 = 300;
/// Timeout or failure fetching the wrapped VAST URI
pub const ERROR_WRAPPER_FETCH: u32 = 301;
/// Wrapper limit reached
pub const ERROR_WRAPPER_LIMIT: u32 = 302;
/// No ads in the VAST response after the wrapper chain
pub const ERROR_NO_ADS: u32 = 303;
/// General linear error
pub const ERROR_LINEAR_GENERAL: u32 = 400;
/// Problem displaying the media file
pub const ERROR_MEDIA_FILE: u32 = 405;
/// Undefined error
pub const ERROR_UNDEFINED: u32 = 900;

/// IAB error code for a resolution failure
pub fn error_code_for(error: &ProtocolError) -> u32 {
    match error {
        ProtocolError::Parse(_) | ProtocolError::Decode(_) => ERROR_XML_PARSE,
        ProtocolError::MissingAdTagUri => ERROR_WRAPPER_GENERAL,
        ProtocolError::DepthExceeded { .. } => ERROR_WRAPPER_LIMIT,
        ProtocolError::Timeout
        | ProtocolError::Network(_)
        | ProtocolError::Http(_)
        | ProtocolError::HttpStatus(_)
        | ProtocolError::ServerError(_)
        | ProtocolError::RateLimited
        | ProtocolError::ServiceUnavailable
        | ProtocolError::AllUpstreamsFailed => ERROR_WRAPPER_FETCH,
        _ => ERROR_UNDEFINED,
    }
}

/// Substitute bracketed macros into a tracking or error URL
///
/// `[ERRORCODE]` is only replaced when a code is given, so impression URLs
/// that happen to carry the macro keep it verbatim.
pub fn substitute(url: &str, error_code: Option<u32>, ctx: &SessionContext) -> String {
    let mut url = url.replace("[TIMESTAMP]", &ctx.timestamp_ms().to_string());
    if url.contains("[CACHEBUSTING]") {
        let bust: u32 = rand::rng().random_range(100_000_000..=999_999_999);
        url = url.replace("[CACHEBUSTING]", &bust.to_string());
    }
    if let Some(code) = error_code {
        url = url.replace("[ERRORCODE]", &code.to_string());
    }
    url
}
