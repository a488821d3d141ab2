//! # render-adapters
//!
//! `AskamaRenderer` turns page contexts into HTML through compiled askama
//! templates, and into JSON for the catalog and thread APIs.

mod templates;

use askama::Template;
use bytes::Bytes;
use domains::{DomainError, OutputFormat, PageContext, PostView, Result, TemplateRenderer};
use serde::Serialize;

use templates::{BoardPageTemplate, CatalogTemplate, FrontTemplate, ThreadTemplate};

#[derive(Serialize)]
struct ThreadJson<'a> {
    posts: Vec<&'a PostView>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AskamaRenderer;

impl AskamaRenderer {
    pub fn new() -> Self {
        Self
    }

    fn html(&self, page: &PageContext) -> askama::Result<String> {
        match page {
            PageContext::BoardPage(ctx) => BoardPageTemplate::new(ctx).render(),
            PageContext::Catalog(ctx) => CatalogTemplate { ctx }.render(),
            PageContext::Thread(ctx) => ThreadTemplate::new(ctx).render(),
            PageContext::Front(ctx) => FrontTemplate { ctx }.render(),
        }
    }

    fn json(&self, page: &PageContext) -> serde_json::Result<Vec<u8>> {
        match page {
            // catalog.json is the list of pages, like the HTML catalog
            PageContext::Catalog(ctx) => serde_json::to_vec(&ctx.pages),
            PageContext::Thread(ctx) => {
                let thread = &ctx.thread;
                let posts = std::iter::once(&thread.op).chain(&thread.replies).collect();
                serde_json::to_vec(&ThreadJson { posts })
            }
            other => serde_json::to_vec(other),
        }
    }
}

impl TemplateRenderer for AskamaRenderer {
    fn render(&self, page: &PageContext, format: OutputFormat) -> Result<Bytes> {
        let template = page.template_name();
        let rendered = match format {
            OutputFormat::Html => self.html(page).map(String::into_bytes).map_err(|e| e.to_string()),
            OutputFormat::Json => self.json(page).map_err(|e| e.to_string()),
        };
        rendered.map(Bytes::from).map_err(|reason| {
            tracing::error!(template, %format, %reason, "template rendering failed");
            DomainError::build(format!("{template}.{format}"), reason)
        })
    }
}
