//! Dynamic analysis hand-off
//!
//! Render units (stored HTML responses) are handed to a [`Renderer`], which
//! may drive a browser over the page. The crawler only consumes what comes
//! back: links with their base URL, IDs of responses captured while the page
//! navigated, and HTML fragments still to be mined.

use crate::frontier::{RenderOutput, RenderUnit};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Analyzes one render unit
    async fn render(&self, unit: &RenderUnit) -> Result<RenderOutput>;
}

/// Renderer that finds nothing
///
/// Used when no browser is attached: render units are completed immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

#[async_trait]
impl Renderer for NullRenderer {
    async fn render(&self, unit: &RenderUnit) -> Result<RenderOutput> {
        tracing::trace!("No renderer attached, skipping {}", unit.base_url);
        Ok(RenderOutput::default())
    }
}
