//! VAST parsing, wrapper chain resolution, and creative selection

pub mod macros;
mod model;
mod parser;
mod resolver;
mod selection;

pub use model::{InlineAd, MediaFile, VastAd, VastDocument, WrapperAd};
pub use parser::parse;
pub use resolver::{VastChainConfig, VastResolutionResult, VastResolver};
pub use selection::SelectionStrategy;

use crate::error::Result;
use crate::upstream::Codec;

/// Codec decoding VAST XML responses
///
/// Decoding never fails: malformed XML becomes a document without an ad,
/// which the resolver turns into a parse failure with context.
#[derive(Debug, Clone, Copy, Default)]
pub struct VastCodec;

impl Codec<VastDocument> for VastCodec {
    fn decode(&self, bytes: &[u8]) -> Result<VastDocument> {
        Ok(parser::parse(bytes))
    }
}
