pub mod builder;
pub mod views;

pub use builder::{board_page_path, catalog_path, thread_path, PageBuilder, RebuildSummary, FRONT_PAGE};
