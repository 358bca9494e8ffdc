//! Render one scheduled payload: body plus optional export.

use crate::error::RenderError;
use crate::export::export_payload;
use crate::resolver::VariableResolver;
use crate::template::render;
use payload_core::{FormattingOptions, PayloadContext, PayloadDefinition};
use rand::RngCore;
use tracing::debug;

/// Builds message bodies from payload definitions.
///
/// The builder holds only the document-wide formatting defaults, so one
/// instance can be shared by all workers.
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    formatting: FormattingOptions,
}

impl PayloadBuilder {
    pub fn new(formatting: FormattingOptions) -> Self {
        Self { formatting }
    }

    pub fn formatting(&self) -> &FormattingOptions {
        &self.formatting
    }

    /// Render the payload text and export it when an export rule is enabled.
    pub fn build_text(
        &self,
        payload: &PayloadDefinition,
        context: &PayloadContext,
    ) -> Result<String, RenderError> {
        let mut rng = rand::thread_rng();
        self.build_text_with_rng(payload, context, &mut rng)
    }

    /// Same as [`build_text`](Self::build_text) with a caller-supplied RNG.
    pub fn build_text_with_rng(
        &self,
        payload: &PayloadDefinition,
        context: &PayloadContext,
        rng: &mut dyn RngCore,
    ) -> Result<String, RenderError> {
        let mut resolver = (!payload.variables.is_empty())
            .then(|| VariableResolver::new(&payload.variables, &self.formatting, context, rng));

        let content = render(&payload.template, context, resolver.as_mut())?;

        let exported = export_payload(payload, context, &content, |path_template| {
            render(path_template, context, resolver.as_mut())
        })?;
        if let Some(path) = exported {
            debug!(
                "Exported payload #{} ({}) to {}",
                context.index,
                context.template_file_name,
                path.display()
            );
        }

        Ok(content)
    }

    /// Render the payload as UTF-8 bytes for publishing.
    pub fn build_body(
        &self,
        payload: &PayloadDefinition,
        context: &PayloadContext,
    ) -> Result<Vec<u8>, RenderError> {
        Ok(self.build_text(payload, context)?.into_bytes())
    }
}
