//! Askama templates, one per artifact kind.
//!
//! Templates only see flattened helpers built here, so they never need to
//! destructure options or walk nested thread structures.

use askama::Template;
use domains::{BoardPageContext, CatalogContext, FrontPageContext, PostView, ThreadPageContext, ThreadView};

/// Web path under the site's web root.
pub(crate) fn site_path(web_root: &str, rel: &str) -> String {
    let root = web_root.trim_end_matches('/');
    format!("{}/{}", root, rel.trim_start_matches('/'))
}

pub(crate) struct PageLink {
    pub number: usize,
    pub href: String,
    pub current: bool,
}

/// A thread with its op and shown replies in display order.
pub(crate) struct ThreadBlock<'a> {
    pub thread: &'a ThreadView,
    pub posts: Vec<&'a PostView>,
}

impl<'a> ThreadBlock<'a> {
    pub fn new(thread: &'a ThreadView) -> Self {
        let posts = std::iter::once(&thread.op).chain(&thread.replies).collect();
        Self { thread, posts }
    }
}

#[derive(Template)]
#[template(path = "board_page.html")]
pub(crate) struct BoardPageTemplate<'a> {
    pub ctx: &'a BoardPageContext,
    pub threads: Vec<ThreadBlock<'a>>,
    pub pages: Vec<PageLink>,
}

impl<'a> BoardPageTemplate<'a> {
    pub fn new(ctx: &'a BoardPageContext) -> Self {
        let pages = ctx
            .page_numbers()
            .into_iter()
            .map(|number| {
                let rel = if number == 1 {
                    format!("{}/", ctx.board.dir)
                } else {
                    format!("{}/{}.html", ctx.board.dir, number)
                };
                PageLink {
                    number,
                    href: site_path(&ctx.site.web_root, &rel),
                    current: number == ctx.page,
                }
            })
            .collect();
        Self {
            ctx,
            threads: ctx.threads.iter().map(ThreadBlock::new).collect(),
            pages,
        }
    }
}

#[derive(Template)]
#[template(path = "catalog.html")]
pub(crate) struct CatalogTemplate<'a> {
    pub ctx: &'a CatalogContext,
}

#[derive(Template)]
#[template(path = "thread.html")]
pub(crate) struct ThreadTemplate<'a> {
    pub ctx: &'a ThreadPageContext,
    pub block: ThreadBlock<'a>,
    pub board_href: String,
}

impl<'a> ThreadTemplate<'a> {
    pub fn new(ctx: &'a ThreadPageContext) -> Self {
        Self {
            ctx,
            block: ThreadBlock::new(&ctx.thread),
            board_href: site_path(&ctx.site.web_root, &format!("{}/", ctx.board.dir)),
        }
    }
}

#[derive(Template)]
#[template(path = "front.html")]
pub(crate) struct FrontTemplate<'a> {
    pub ctx: &'a FrontPageContext,
}
