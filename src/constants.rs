//! Application-wide constants
//!
//! Single source of truth for storage locations and import parsing
//! literals shared across modules.

/// Persistent storage locations
pub mod storage {
    /// Subdirectory of the platform data dir holding all documents
    pub const APP_DIR: &str = "lucky-draw";

    /// Roster document file name
    pub const PARTICIPANTS_FILE: &str = "participants.json";

    /// Draw configuration document file name
    pub const CONFIG_FILE: &str = "config.json";

    /// History document file name
    pub const HISTORY_FILE: &str = "history.json";
}

/// Bulk import parsing constants
pub mod import {
    /// First-column values (compared case-insensitively after trimming)
    /// that mark a line as a header row to be skipped
    pub const HEADER_ALIASES: &[&str] = &["name", "participant", "weight", "姓名", "名字"];
}
