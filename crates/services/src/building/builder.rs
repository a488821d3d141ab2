//! # PageBuilder
//!
//! Regenerates the static artifacts of the site from committed state. Every
//! build reads the store afresh, so concurrent rebuilds converge on the latest
//! data, and identical data renders to identical bytes.

use std::sync::Arc;

use domains::{
    Board, BoardPageContext, CatalogContext, CatalogPage, ContentStore, DomainError, FrontPageContext,
    OutputFormat, PageContext, Result, SiteFilesystem, SiteSettings, SiteView, TemplateRenderer,
    ThreadOverview, ThreadPageContext,
};
use tracing::{debug, error, info};

use super::views::{catalog_thread, recent_post_view, site_view, thread_view};
use crate::paginator::{paginate, sort_for_listing, Page};

pub const FRONT_PAGE: &str = "index.html";

/// `index.html` for the first page, `<n>.html` after that.
pub fn board_page_path(board_dir: &str, page: usize) -> String {
    if page <= 1 {
        format!("{}/index.html", board_dir)
    } else {
        format!("{}/{}.html", board_dir, page)
    }
}

pub fn catalog_path(board_dir: &str, format: OutputFormat) -> String {
    format!("{}/catalog.{}", board_dir, format.extension())
}

pub fn thread_path(board_dir: &str, thread_id: i64, format: OutputFormat) -> String {
    format!("{}/res/{}.{}", board_dir, thread_id, format.extension())
}

/// What a full rebuild touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub boards: usize,
    pub board_pages: usize,
    pub threads: usize,
}

pub struct PageBuilder {
    content: Arc<dyn ContentStore>,
    renderer: Arc<dyn TemplateRenderer>,
    files: Arc<dyn SiteFilesystem>,
    settings: Arc<SiteSettings>,
}

impl PageBuilder {
    pub fn new(
        content: Arc<dyn ContentStore>,
        renderer: Arc<dyn TemplateRenderer>,
        files: Arc<dyn SiteFilesystem>,
        settings: Arc<SiteSettings>,
    ) -> Self {
        Self { content, renderer, files, settings }
    }

    /// Board pages plus catalog.
    pub async fn build_board(&self, board: &Board) -> Result<usize> {
        let pages = self.build_board_pages(board).await?;
        self.build_catalog(board).await?;
        Ok(pages)
    }

    /// Writes every board page and removes numbered pages left over from a
    /// time the board had more threads. Returns the page count.
    pub async fn build_board_pages(&self, board: &Board) -> Result<usize> {
        let policy = self.settings.policy_for(&board.dir);
        let site = self.site().await?;
        let threads = self.listing(board).await?;

        let mut pages = paginate(threads, policy.threads_per_page)?;
        if pages.is_empty() {
            pages.push(Page { number: 1, items: Vec::new() });
        }
        let num_pages = pages.len();

        for page in pages {
            let mut views = Vec::with_capacity(page.items.len());
            for overview in &page.items {
                let limit = if overview.thread.stickied {
                    policy.sticky_replies_on_board_page
                } else {
                    policy.replies_on_board_page
                };
                let replies = if limit == 0 {
                    Vec::new()
                } else {
                    self.content.latest_replies(overview.thread.id, limit).await?
                };
                views.push(thread_view(
                    &self.settings.web_root,
                    &board.dir,
                    &overview.thread,
                    &overview.top_post,
                    &replies,
                    overview.reply_count,
                    overview.image_count,
                ));
            }
            let context = PageContext::BoardPage(BoardPageContext {
                site: site.clone(),
                board: board.clone(),
                page: page.number,
                num_pages,
                threads: views,
            });
            self.publish(board_page_path(&board.dir, page.number), &context, OutputFormat::Html)
                .await?;
        }

        self.remove_stale_pages(board, num_pages).await?;
        debug!(board = %board.dir, num_pages, "built board pages");
        Ok(num_pages)
    }

    pub async fn build_catalog(&self, board: &Board) -> Result<()> {
        let policy = self.settings.policy_for(&board.dir);
        let site = self.site().await?;
        let threads = self.listing(board).await?;
        let web_root = &self.settings.web_root;

        let pages = paginate(threads, policy.catalog_threads_per_page)?
            .into_iter()
            .map(|page| CatalogPage {
                number: page.number,
                threads: page
                    .items
                    .iter()
                    .map(|overview| catalog_thread(web_root, &board.dir, overview))
                    .collect(),
            })
            .collect();
        let context = PageContext::Catalog(CatalogContext { site, board: board.clone(), pages });

        self.publish(catalog_path(&board.dir, OutputFormat::Html), &context, OutputFormat::Html)
            .await?;
        self.publish(catalog_path(&board.dir, OutputFormat::Json), &context, OutputFormat::Json)
            .await
    }

    /// Writes `res/<id>.html` and `res/<id>.json` for one thread.
    pub async fn build_thread(&self, board: &Board, thread_id: i64) -> Result<()> {
        let thread = self.content.thread_by_id(thread_id).await?;
        let mut posts = self.content.thread_posts(thread_id).await?.into_iter();
        let op = posts
            .next()
            .ok_or_else(|| DomainError::not_found("top post", thread_id))?;
        let replies: Vec<_> = posts.collect();
        let image_count = replies.iter().map(|r| r.uploads.len() as i64).sum();

        let view = thread_view(
            &self.settings.web_root,
            &board.dir,
            &thread,
            &op,
            &replies,
            replies.len() as i64,
            image_count,
        );
        let context = PageContext::Thread(ThreadPageContext {
            site: self.site().await?,
            board: board.clone(),
            thread: view,
        });

        self.publish(thread_path(&board.dir, thread_id, OutputFormat::Html), &context, OutputFormat::Html)
            .await?;
        self.publish(thread_path(&board.dir, thread_id, OutputFormat::Json), &context, OutputFormat::Json)
            .await
    }

    pub async fn remove_thread_pages(&self, board: &Board, thread_id: i64) -> Result<()> {
        for format in [OutputFormat::Html, OutputFormat::Json] {
            let path = thread_path(&board.dir, thread_id, format);
            self.files
                .remove_file(&path)
                .await
                .map_err(|e| DomainError::build(path, e))?;
        }
        Ok(())
    }

    /// Site-wide page listing the newest posts across every board.
    pub async fn build_front_page(&self) -> Result<()> {
        let site = self.site().await?;
        let recent_posts = self
            .content
            .recent_posts(self.settings.max_recent_posts)
            .await?
            .iter()
            .map(|recent| recent_post_view(&self.settings.web_root, recent))
            .collect();
        let context = PageContext::Front(FrontPageContext { site, recent_posts });
        self.publish(FRONT_PAGE.to_string(), &context, OutputFormat::Html).await
    }

    /// Board pages, catalog and every thread page of one board.
    pub async fn rebuild_board(&self, board: &Board) -> Result<RebuildSummary> {
        let board_pages = self.build_board(board).await?;
        let threads = self.content.board_threads(board.id).await?;
        for overview in &threads {
            self.build_thread(board, overview.thread.id).await?;
        }
        info!(board = %board.dir, board_pages, threads = threads.len(), "rebuilt board");
        Ok(RebuildSummary { boards: 1, board_pages, threads: threads.len() })
    }

    /// Every board, then the front page.
    pub async fn rebuild_all(&self) -> Result<RebuildSummary> {
        let mut summary = RebuildSummary::default();
        for board in self.content.list_boards().await? {
            let built = self.rebuild_board(&board).await?;
            summary.boards += built.boards;
            summary.board_pages += built.board_pages;
            summary.threads += built.threads;
        }
        self.build_front_page().await?;
        Ok(summary)
    }

    async fn site(&self) -> Result<SiteView> {
        let boards = self.content.list_boards().await?;
        Ok(site_view(&self.settings, &boards))
    }

    async fn listing(&self, board: &Board) -> Result<Vec<ThreadOverview>> {
        let mut threads = self.content.board_threads(board.id).await?;
        sort_for_listing(&mut threads, |overview| &overview.thread);
        Ok(threads)
    }

    async fn remove_stale_pages(&self, board: &Board, num_pages: usize) -> Result<()> {
        let names = self
            .files
            .list_dir(&board.dir)
            .await
            .map_err(|e| DomainError::build(board.dir.clone(), e))?;
        for name in names {
            let Some(number) = name
                .strip_suffix(".html")
                .and_then(|stem| stem.parse::<usize>().ok())
            else {
                continue;
            };
            if number < 2 || number > num_pages {
                let path = format!("{}/{}", board.dir, name);
                self.files
                    .remove_file(&path)
                    .await
                    .map_err(|e| DomainError::build(path, e))?;
            }
        }
        Ok(())
    }

    /// Renders first and writes only on success, so a failed render never
    /// replaces a good page.
    async fn publish(&self, path: String, page: &PageContext, format: OutputFormat) -> Result<()> {
        let bytes = match self.renderer.render(page, format) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(artifact = %path, template = page.template_name(), error = %e, "render failed");
                return Err(DomainError::build(path, e));
            }
        };
        if let Err(e) = self.files.write_artifact(&path, bytes).await {
            error!(artifact = %path, error = %e, "artifact write failed");
            return Err(DomainError::build(path, e));
        }
        debug!(artifact = %path, "wrote artifact");
        Ok(())
    }
}
