//! # PublicationPipeline
//!
//! Every mutation follows the same shape: validate, pass the moderation gate
//! where visitors are involved, commit through the store, then rebuild the
//! pages that show the change. Files written ahead of a commit are removed
//! only once the commit has definitely failed.

use std::collections::HashMap;
use std::sync::Arc;

use domains::{
    Board, Clock, ContentStore, DomainError, ErrorContext, IncomingFile, IpBan, MediaStore,
    ModerationStore, NewBoard, NewPost, Post, PostEdit, PublicationError, Result, SiteFilesystem,
    SiteSettings, SpamChecker, Staff, TemplateRenderer, Thread, ThreadAttribute, Upload,
};
use tracing::{info, warn};

use super::locks::SubmissionLocks;
use super::registry::{actions, ActionRegistry};
use super::requests::{BanRequest, Credential, DeletionReceipt, PostReceipt, Submission};
use crate::building::{PageBuilder, RebuildSummary};
use crate::moderation::{BanLifecycle, Candidate, ModerationGate, ReportLifecycle, UploadCandidate};
use crate::posting::uploads::{checksum, clean_original_filename, validate_upload};
use crate::posting::{
    format_message, hash_password_blocking, parse_email, parse_name, referenced_posts, verify_password_blocking,
    EmailCommand,
};

const MAX_BOARD_DIR_LEN: usize = 16;
const MAX_SUBJECT_LEN: usize = 100;

/// The capabilities the pipeline is wired with.
#[derive(Clone)]
pub struct Ports {
    pub content: Arc<dyn ContentStore>,
    pub moderation: Arc<dyn ModerationStore>,
    pub media: Arc<dyn MediaStore>,
    pub files: Arc<dyn SiteFilesystem>,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub spam: Arc<dyn SpamChecker>,
    pub clock: Arc<dyn Clock>,
}

pub struct PublicationPipeline {
    content: Arc<dyn ContentStore>,
    moderation: Arc<dyn ModerationStore>,
    media: Arc<dyn MediaStore>,
    clock: Arc<dyn Clock>,
    settings: Arc<SiteSettings>,
    registry: Arc<ActionRegistry>,
    gate: ModerationGate,
    builder: PageBuilder,
    bans: BanLifecycle,
    reports: ReportLifecycle,
    locks: SubmissionLocks,
}

impl PublicationPipeline {
    pub fn new(ports: Ports, settings: Arc<SiteSettings>, registry: Arc<ActionRegistry>) -> Self {
        let gate = ModerationGate::new(
            ports.content.clone(),
            ports.moderation.clone(),
            ports.spam.clone(),
            ports.clock.clone(),
            settings.clone(),
        );
        let builder = PageBuilder::new(
            ports.content.clone(),
            ports.renderer.clone(),
            ports.files.clone(),
            settings.clone(),
        );
        let bans = BanLifecycle::new(ports.moderation.clone(), ports.clock.clone(), registry.clone());
        let reports = ReportLifecycle::new(
            ports.content.clone(),
            ports.moderation.clone(),
            ports.clock.clone(),
            registry.clone(),
        );
        Self {
            content: ports.content,
            moderation: ports.moderation,
            media: ports.media,
            clock: ports.clock,
            settings,
            registry,
            gate,
            builder,
            bans,
            reports,
            locks: SubmissionLocks::new(),
        }
    }

    pub fn builder(&self) -> &PageBuilder {
        &self.builder
    }

    pub fn bans(&self) -> &BanLifecycle {
        &self.bans
    }

    pub fn reports(&self) -> &ReportLifecycle {
        &self.reports
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Publishes a visitor's post and regenerates the thread, its board and
    /// the front page.
    pub async fn submit_post(&self, submission: Submission) -> std::result::Result<PostReceipt, PublicationError> {
        let mut ctx = ErrorContext::new().with("boardid", submission.board_id);
        if let Some(thread_id) = submission.thread_id {
            ctx.insert("threadid", thread_id);
        }
        let result = self.submit(submission, &mut ctx).await;
        self.locks.prune();
        result.map_err(|e| PublicationError::new(e, ctx))
    }

    async fn submit(&self, submission: Submission, ctx: &mut ErrorContext) -> Result<PostReceipt> {
        let board = self.content.board_by_id(submission.board_id).await?;
        ctx.insert("boardDir", board.dir.clone());
        let policy = self.settings.policy_for(&board.dir);

        let message = submission.message.trim().to_string();
        check_message_length(&message, &board, ctx)?;
        if submission.subject.chars().count() > MAX_SUBJECT_LEN {
            return Err(DomainError::validation("Subject is too long"));
        }
        let is_new_thread = submission.thread_id.is_none();
        if is_new_thread && submission.file.is_none() && policy.new_threads_require_upload {
            return Err(DomainError::validation("Upload required for new threads"));
        }
        if message.is_empty() && submission.file.is_none() {
            return Err(DomainError::validation("Your post must have an upload or a comment"));
        }
        let file = match submission.file {
            Some(file) => {
                let original_filename = clean_original_filename(&file.original_filename);
                validate_upload(&original_filename, file.data.len(), policy)?;
                Some(IncomingFile { original_filename, ..file })
            }
            None => None,
        };
        if let Some(thread_id) = submission.thread_id {
            let thread = self.content.thread_by_id(thread_id).await?;
            if thread.board_id != board.id {
                return Err(DomainError::not_found("thread", thread_id));
            }
            if thread.locked {
                return Err(DomainError::Conflict("Thread is locked".into()));
            }
        }

        let parsed_name = parse_name(&submission.name, &self.settings.tripcode_secret);
        let (email, command) = parse_email(&submission.email);
        let file_checksum = file.as_ref().map(|f| checksum(&f.data));

        // held until the insert commits
        let guard = self.locks.acquire(&submission.ip).await;

        let mut candidate = Candidate {
            board: board.clone(),
            thread_id: submission.thread_id,
            ip: submission.ip.clone(),
            name: parsed_name.name.clone(),
            tripcode: parsed_name.tripcode.clone(),
            email: email.clone(),
            message,
            referer: submission.referer.clone(),
            user_agent: submission.user_agent.clone(),
            upload: file.as_ref().zip(file_checksum.as_ref()).map(|(f, sum)| UploadCandidate {
                original_filename: f.original_filename.clone(),
                checksum: sum.clone(),
            }),
        };
        let decision = self.gate.evaluate(&mut candidate).await?;
        if !decision.is_accepted() {
            return Err(DomainError::Rejected {
                verdict: decision.verdict,
                reason: decision.reason,
                ban: decision.ban,
            });
        }

        let message_raw = candidate.message;
        let links = self.resolve_references(&board, &message_raw).await?;
        let message_html = format_message(&message_raw, &self.settings.web_root, &board.dir, &links);
        let password = hash_password_blocking(submission.password.clone()).await?;
        let now = self.clock.now();

        let stored = match (file, file_checksum) {
            (Some(file), Some(sum)) => {
                let thumbnail = if is_new_thread { policy.op_thumbnail } else { policy.reply_thumbnail };
                let catalog = is_new_thread.then_some(policy.catalog_thumbnail);
                Some(self.media.store_upload(&board.dir, file, sum, thumbnail, catalog).await?)
            }
            _ => None,
        };

        let new_post = NewPost {
            board_id: board.id,
            thread_id: submission.thread_id,
            ip: submission.ip.clone(),
            name: parsed_name.name,
            tripcode: parsed_name.tripcode,
            email,
            subject: submission.subject.trim().to_string(),
            message_raw,
            message: message_html,
            password,
            created_on: now,
            bump: command != Some(EmailCommand::Sage),
        };
        let inserted = match self
            .content
            .insert_post(new_post, stored.as_ref().map(|s| s.upload.clone()))
            .await
        {
            Ok(inserted) => inserted,
            Err(e) => {
                warn!(ip = %submission.ip, board = %board.dir, error = %e, "post insert failed");
                if let Some(stored) = &stored {
                    if let Err(cleanup) = self.media.remove_paths(&stored.written).await {
                        warn!(error = %cleanup, paths = ?stored.written, "could not remove orphaned upload");
                    }
                }
                return Err(e);
            }
        };
        drop(guard);

        ctx.insert("postid", inserted.post.id);
        ctx.insert("threadid", inserted.thread.id);
        info!(
            post_id = inserted.post.id,
            thread_id = inserted.thread.id,
            board = %board.dir,
            "post published"
        );

        self.builder.build_thread(&board, inserted.thread.id).await?;
        self.builder.build_board(&board).await?;
        self.builder.build_front_page().await?;

        let redirect = if command == Some(EmailCommand::Noko) {
            self.post_link(&board, &inserted.post)
        } else {
            self.board_link(&board)
        };
        Ok(PostReceipt {
            post: inserted.post,
            thread: inserted.thread,
            upload: inserted.upload,
            redirect,
        })
    }

    /// Replaces a post's message. Visitors need the post's password; staff
    /// need the edit action.
    pub async fn edit_post(
        &self,
        post_id: i64,
        credential: Credential<'_>,
        message: &str,
    ) -> std::result::Result<Post, PublicationError> {
        let mut ctx = ErrorContext::new().with("postid", post_id);
        self.edit(post_id, credential, message, &mut ctx)
            .await
            .map_err(|e| PublicationError::new(e, ctx))
    }

    async fn edit(&self, post_id: i64, credential: Credential<'_>, message: &str, ctx: &mut ErrorContext) -> Result<Post> {
        let post = self.content.post_by_id(post_id).await?;
        self.authorize(credential, &post, actions::EDIT_POST).await?;
        let board = self.board_of(&post, ctx).await?;

        let message = message.trim();
        check_message_length(message, &board, ctx)?;
        if message.is_empty() && !self.has_uploads(&post).await? {
            return Err(DomainError::validation("Your post must have an upload or a comment"));
        }
        let filters = self.moderation.active_word_filters(board.id).await?;
        let message_raw = self.gate.patterns().apply_word_filters(message, &filters);
        let links = self.resolve_references(&board, &message_raw).await?;
        let message_html = format_message(&message_raw, &self.settings.web_root, &board.dir, &links);

        let updated = self
            .content
            .update_post(
                post.id,
                PostEdit {
                    message_raw,
                    message: message_html,
                    modified_on: self.clock.now(),
                },
            )
            .await?;
        info!(post_id, board = %board.dir, "post edited");

        self.builder.build_thread(&board, updated.thread_id).await?;
        self.builder.build_board(&board).await?;
        self.builder.build_front_page().await?;
        Ok(updated)
    }

    /// Deletes a post, or only its files when `files_only` is set. Deleting a
    /// top post takes the whole thread and its pages with it.
    pub async fn delete_post(
        &self,
        post_id: i64,
        credential: Credential<'_>,
        files_only: bool,
    ) -> std::result::Result<DeletionReceipt, PublicationError> {
        let mut ctx = ErrorContext::new().with("postid", post_id);
        self.delete(post_id, credential, files_only, &mut ctx)
            .await
            .map_err(|e| PublicationError::new(e, ctx))
    }

    async fn delete(
        &self,
        post_id: i64,
        credential: Credential<'_>,
        files_only: bool,
        ctx: &mut ErrorContext,
    ) -> Result<DeletionReceipt> {
        let post = self.content.post_by_id(post_id).await?;
        self.authorize(credential, &post, actions::DELETE_POSTS).await?;
        let board = self.board_of(&post, ctx).await?;

        if files_only {
            let uploads = self.content.delete_post_uploads(post.id).await?;
            for upload in &uploads {
                self.remove_committed_upload(&board, upload).await;
            }
            info!(post_id, files = uploads.len(), board = %board.dir, "post files deleted");
            self.builder.build_thread(&board, post.thread_id).await?;
            self.builder.build_board(&board).await?;
            self.builder.build_front_page().await?;
            return Ok(DeletionReceipt {
                post_id,
                thread_id: post.thread_id,
                thread_removed: false,
                removed_posts: 0,
                removed_files: uploads.len(),
            });
        }

        let deleted = self.content.delete_post(post.id).await?;
        for upload in &deleted.removed_uploads {
            self.remove_committed_upload(&board, upload).await;
        }
        info!(
            post_id,
            thread_removed = deleted.thread_removed,
            posts = deleted.removed_post_ids.len(),
            board = %board.dir,
            "post deleted"
        );

        if deleted.thread_removed {
            self.builder.remove_thread_pages(&board, post.thread_id).await?;
        } else {
            self.builder.build_thread(&board, post.thread_id).await?;
        }
        self.builder.build_board(&board).await?;
        self.builder.build_front_page().await?;

        Ok(DeletionReceipt {
            post_id,
            thread_id: post.thread_id,
            thread_removed: deleted.thread_removed,
            removed_posts: deleted.removed_post_ids.len(),
            removed_files: deleted.removed_uploads.len(),
        })
    }

    pub async fn set_thread_attribute(
        &self,
        staff: &Staff,
        thread_id: i64,
        attribute: ThreadAttribute,
        value: bool,
    ) -> std::result::Result<Thread, PublicationError> {
        let ctx = ErrorContext::new()
            .with("threadid", thread_id)
            .with("attribute", attribute.to_string());
        self.toggle_attribute(staff, thread_id, attribute, value)
            .await
            .map_err(|e| PublicationError::new(e, ctx))
    }

    async fn toggle_attribute(&self, staff: &Staff, thread_id: i64, attribute: ThreadAttribute, value: bool) -> Result<Thread> {
        self.registry.get(actions::THREAD_ATTRIBUTES, staff.rank)?;
        let thread = self.content.set_thread_attribute(thread_id, attribute, value).await?;
        let board = self.content.board_by_id(thread.board_id).await?;
        info!(thread_id, %attribute, value, staff = %staff.username, "thread attribute changed");

        self.builder.build_thread(&board, thread.id).await?;
        self.builder.build_board(&board).await?;
        Ok(thread)
    }

    /// Issues an IP ban and, when asked, marks the offending post and
    /// regenerates the pages showing it.
    pub async fn issue_ban(&self, staff: &Staff, request: BanRequest) -> std::result::Result<IpBan, PublicationError> {
        let mut ctx = ErrorContext::new().with("ip", request.ban.ip.clone());
        if let Some(post_id) = request.post_id {
            ctx.insert("postid", post_id);
        }
        self.ban(staff, request, &mut ctx)
            .await
            .map_err(|e| PublicationError::new(e, ctx))
    }

    async fn ban(&self, staff: &Staff, request: BanRequest, ctx: &mut ErrorContext) -> Result<IpBan> {
        self.registry.get(actions::BANS, staff.rank)?;
        let ban = self.bans.issue_ip_ban(staff, request.ban).await?;
        ctx.insert("banid", ban.id);

        if let (Some(post_id), Some(message)) = (request.post_id, request.banned_message) {
            let post = self.content.set_banned_message(post_id, &message).await?;
            let board = self.board_of(&post, ctx).await?;
            self.builder.build_thread(&board, post.thread_id).await?;
            self.builder.build_board(&board).await?;
        }
        Ok(ban)
    }

    pub async fn create_board(&self, board: NewBoard) -> std::result::Result<Board, PublicationError> {
        let ctx = ErrorContext::new().with("boardDir", board.dir.clone());
        self.new_board(board)
            .await
            .map_err(|e| PublicationError::new(e, ctx))
    }

    async fn new_board(&self, mut board: NewBoard) -> Result<Board> {
        board.dir = board.dir.trim().to_string();
        if board.dir.is_empty()
            || board.dir.len() > MAX_BOARD_DIR_LEN
            || !board.dir.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(DomainError::validation("Board directory must be 1-16 letters or digits"));
        }
        if board.title.trim().is_empty() {
            return Err(DomainError::validation("Board title is required"));
        }
        if board.max_message_length <= 0 {
            board.max_message_length = self.settings.policy_for(&board.dir).max_message_length as i64;
        }

        let created = self.content.create_board(board).await?;
        info!(board = %created.dir, board_id = created.id, "board created");
        self.builder.build_board(&created).await?;
        self.builder.build_front_page().await?;
        Ok(created)
    }

    /// Regenerates one board completely.
    pub async fn rebuild_board(&self, board_dir: &str) -> std::result::Result<RebuildSummary, PublicationError> {
        let ctx = ErrorContext::new().with("boardDir", board_dir);
        let result = async {
            let board = self.content.board_by_dir(board_dir).await?;
            self.builder.rebuild_board(&board).await
        }
        .await;
        result.map_err(|e| PublicationError::new(e, ctx))
    }

    /// Regenerates every board and the front page.
    pub async fn rebuild_all(&self) -> std::result::Result<RebuildSummary, PublicationError> {
        self.builder.rebuild_all().await.map_err(PublicationError::from)
    }

    async fn authorize(&self, credential: Credential<'_>, post: &Post, action: &str) -> Result<()> {
        match credential {
            Credential::Password(password) => {
                if verify_password_blocking(password.to_string(), post.password.clone()).await {
                    Ok(())
                } else {
                    Err(DomainError::Unauthorized("Incorrect password".into()))
                }
            }
            Credential::Staff(staff) => self.registry.get(action, staff.rank).map(|_| ()),
        }
    }

    async fn has_uploads(&self, post: &Post) -> Result<bool> {
        let posts = self.content.thread_posts(post.thread_id).await?;
        Ok(posts
            .iter()
            .any(|p| p.post.id == post.id && !p.uploads.is_empty()))
    }

    async fn board_of(&self, post: &Post, ctx: &mut ErrorContext) -> Result<Board> {
        let thread = self.content.thread_by_id(post.thread_id).await?;
        let board = self.content.board_by_id(thread.board_id).await?;
        ctx.insert("boardDir", board.dir.clone());
        Ok(board)
    }

    /// Thread IDs of the `>>N` references that point into this board.
    async fn resolve_references(&self, board: &Board, message: &str) -> Result<HashMap<i64, i64>> {
        let mut links = HashMap::new();
        for id in referenced_posts(message) {
            let post = match self.content.post_by_id(id).await {
                Ok(post) => post,
                Err(DomainError::NotFound(..)) => continue,
                Err(e) => return Err(e),
            };
            let thread = self.content.thread_by_id(post.thread_id).await?;
            if thread.board_id == board.id {
                links.insert(id, thread.id);
            }
        }
        Ok(links)
    }

    /// The row is gone already, so a failure here only leaves a stray file.
    async fn remove_committed_upload(&self, board: &Board, upload: &Upload) {
        if let Err(e) = self.media.remove_upload(&board.dir, upload).await {
            warn!(board = %board.dir, file = %upload.filename, error = %e, "could not remove upload files");
        }
    }

    fn board_link(&self, board: &Board) -> String {
        format!("{}/{}/", self.settings.web_root.trim_end_matches('/'), board.dir)
    }

    fn post_link(&self, board: &Board, post: &Post) -> String {
        let thread = format!(
            "{}/{}/res/{}.html",
            self.settings.web_root.trim_end_matches('/'),
            board.dir,
            post.top_post_id()
        );
        if post.is_top_post {
            thread
        } else {
            format!("{}#{}", thread, post.id)
        }
    }
}

fn check_message_length(message: &str, board: &Board, ctx: &mut ErrorContext) -> Result<()> {
    if message.len() as i64 > board.max_message_length {
        ctx.insert("messageLength", message.len());
        ctx.insert("maxMessageLength", board.max_message_length);
        return Err(DomainError::validation("Message is too long"));
    }
    Ok(())
}
