//! Declarative description of the board settings, consumed by a generic
//! settings editor instead of inspecting struct fields at runtime.

use serde::Serialize;

use crate::BoardConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    Boolean,
    /// Whole seconds.
    Seconds,
    /// Pixels.
    Dimension,
    /// Comma-separated values.
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: &'static str,
    pub description: &'static str,
}

const fn field(name: &'static str, kind: FieldKind, default: &'static str, description: &'static str) -> FieldDescriptor {
    FieldDescriptor { name, kind, default, description }
}

pub const BOARD_CONFIG_FIELDS: &[FieldDescriptor] = &[
    field("threads_per_page", FieldKind::Integer, "15", "Threads shown on each board page"),
    field("catalog_threads_per_page", FieldKind::Integer, "50", "Threads grouped into each catalog page"),
    field("new_thread_cooldown", FieldKind::Seconds, "30", "Wait before the same IP may start another thread"),
    field("reply_cooldown", FieldKind::Seconds, "7", "Wait before the same IP may post again"),
    field("max_message_length", FieldKind::Integer, "8192", "Longest accepted message, in bytes"),
    field("replies_on_board_page", FieldKind::Integer, "3", "Latest replies previewed under each thread"),
    field("sticky_replies_on_board_page", FieldKind::Integer, "1", "Latest replies previewed under stickied threads"),
    field("new_threads_require_upload", FieldKind::Boolean, "false", "Refuse new threads without a file"),
    field("thumb_width", FieldKind::Dimension, "200", "Opening post thumbnail width"),
    field("thumb_height", FieldKind::Dimension, "200", "Opening post thumbnail height"),
    field("reply_thumb_width", FieldKind::Dimension, "125", "Reply thumbnail width"),
    field("reply_thumb_height", FieldKind::Dimension, "125", "Reply thumbnail height"),
    field("catalog_thumb_width", FieldKind::Dimension, "50", "Catalog thumbnail width"),
    field("catalog_thumb_height", FieldKind::Dimension, "50", "Catalog thumbnail height"),
    field(
        "allowed_extensions",
        FieldKind::List,
        "gif,jpg,jpeg,jfif,png,webp,webm,mp4",
        "File extensions accepted for upload",
    ),
];

/// A descriptor paired with a board's current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorRow {
    pub field: FieldDescriptor,
    pub value: String,
    pub is_default: bool,
}

pub fn editor_rows(config: &BoardConfig) -> Vec<EditorRow> {
    BOARD_CONFIG_FIELDS
        .iter()
        .map(|field| {
            let value = config.value_of(field.name).unwrap_or_default();
            EditorRow {
                field: *field,
                is_default: value == field.default,
                value,
            }
        })
        .collect()
}
