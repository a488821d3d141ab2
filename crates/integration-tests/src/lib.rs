//! Shared harness for the end-to-end tests: a real pipeline over an in-memory
//! SQLite store, a temporary document root and a clock the tests move by hand.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use domains::{Board, Clock, IncomingFile, NewBoard, NewIpBan, SiteSettings, SpamChecker, Staff, StaffRank};
use render_adapters::AskamaRenderer;
use services::{ActionRegistry, PostReceipt, Ports, PublicationPipeline, Submission};
use storage_adapters::{LocalMediaStore, LocalSiteFilesystem, NoSpamCheck, SqliteStore};
use tempfile::TempDir;

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct TestSite {
    pub pipeline: PublicationPipeline,
    pub store: Arc<SqliteStore>,
    pub clock: Arc<ManualClock>,
    pub settings: Arc<SiteSettings>,
    root: TempDir,
}

impl TestSite {
    pub async fn new() -> Self {
        Self::build(|_| {}, Arc::new(NoSpamCheck)).await
    }

    pub async fn with_settings(configure: impl FnOnce(&mut SiteSettings)) -> Self {
        Self::build(configure, Arc::new(NoSpamCheck)).await
    }

    pub async fn with_spam_checker(spam: Arc<dyn SpamChecker>) -> Self {
        Self::build(|_| {}, spam).await
    }

    async fn build(configure: impl FnOnce(&mut SiteSettings), spam: Arc<dyn SpamChecker>) -> Self {
        let root = tempfile::tempdir().expect("temp document root");
        let mut settings = SiteSettings {
            document_root: root.path().to_path_buf(),
            site_name: "boardsmith test".into(),
            site_host: "localhost".into(),
            check_referer: false,
            tripcode_secret: "test-secret".into(),
            ..SiteSettings::default()
        };
        configure(&mut settings);
        let settings = Arc::new(settings);

        let store = Arc::new(SqliteStore::in_memory().await.expect("in-memory store"));
        let files = LocalSiteFilesystem::from_settings(&settings);
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));

        let ports = Ports {
            content: store.clone(),
            moderation: store.clone(),
            media: Arc::new(LocalMediaStore::new(files.clone())),
            files: Arc::new(files),
            renderer: Arc::new(AskamaRenderer::new()),
            spam,
            clock: clock.clone(),
        };
        let pipeline = PublicationPipeline::new(ports, settings.clone(), Arc::new(ActionRegistry::with_defaults()));

        Self { pipeline, store, clock, settings, root }
    }

    pub async fn board(&self, dir: &str) -> Board {
        self.pipeline
            .create_board(NewBoard {
                dir: dir.into(),
                title: format!("Board {dir}"),
                subtitle: String::new(),
                description: String::new(),
                max_message_length: 0,
            })
            .await
            .expect("create board")
    }

    /// Submits and then moves the clock past every cooldown.
    pub async fn post(&self, submission: Submission) -> PostReceipt {
        let receipt = self.pipeline.submit_post(submission).await.expect("post accepted");
        self.clock.advance(Duration::minutes(1));
        receipt
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).is_file()
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).unwrap_or_else(|e| panic!("reading {relative}: {e}"))
    }

    /// File names directly under `relative`, sorted.
    pub fn list(&self, relative: &str) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(self.path(relative)) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

pub fn new_thread(board: &Board, message: &str) -> Submission {
    Submission {
        board_id: board.id,
        thread_id: None,
        name: String::new(),
        email: String::new(),
        subject: String::new(),
        message: message.into(),
        password: "hunter2".into(),
        ip: "203.0.113.10".into(),
        referer: Some("http://localhost/".into()),
        user_agent: "Mozilla/5.0".into(),
        file: None,
    }
}

pub fn reply(board: &Board, thread_id: i64, message: &str) -> Submission {
    Submission {
        thread_id: Some(thread_id),
        ..new_thread(board, message)
    }
}

pub fn staff(rank: StaffRank) -> Staff {
    Staff {
        id: 1,
        username: "mod".into(),
        rank,
    }
}

pub fn ip_ban(board_id: Option<i64>, ip: &str, now: DateTime<Utc>) -> NewIpBan {
    NewIpBan {
        board_id,
        ip: ip.into(),
        expires_at: now + Duration::days(3),
        appeal_at: now + Duration::days(1),
        permanent: false,
        can_appeal: true,
        message: "spamming".into(),
        staff_note: String::new(),
    }
}

pub fn png(width: u32, height: u32) -> Bytes {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode test png");
    Bytes::from(out.into_inner())
}

pub fn upload(name: &str, data: Bytes) -> IncomingFile {
    IncomingFile {
        original_filename: name.into(),
        data,
        is_spoilered: false,
    }
}
