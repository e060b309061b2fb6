//! Directory listing entries, sorting and labels

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Label used for directories in the type column and when sorting by type
pub const DIRECTORY_LABEL: &str = "Folder";

/// One file-or-directory record returned by a browse call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

impl DirEntry {
    pub fn file(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            is_directory: false,
            size,
            modified_time: None,
            permissions: None,
        }
    }

    pub fn directory(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_directory: true,
            size: 0,
            modified_time: None,
            permissions: None,
        }
    }

    pub fn with_modified(mut self, modified: &str) -> Self {
        self.modified_time = Some(modified.to_string());
        self
    }

    /// Modification time in milliseconds since the epoch.
    ///
    /// Missing or unparseable timestamps count as the epoch so they sort first.
    pub fn modified_millis(&self) -> i64 {
        self.modified_time
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(0)
    }

    pub fn extension(&self) -> &str {
        extension(&self.name)
    }

    pub fn type_label(&self) -> String {
        if self.is_directory {
            DIRECTORY_LABEL.to_string()
        } else {
            file_type_label(&self.name)
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.is_directory {
            return "📁";
        }
        match self.extension().to_lowercase().as_str() {
            "txt" | "doc" | "docx" | "pdf" => "📝",
            "xls" | "xlsx" | "ppt" | "pptx" => "📊",
            "jpg" | "jpeg" | "png" | "gif" => "🖼",
            "mp3" | "wav" => "🎵",
            "mp4" | "avi" => "🎬",
            "zip" | "rar" | "7z" => "📦",
            _ => "📄",
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Text after the last dot, unless the dot is the first character
pub fn extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[idx + 1..],
        _ => "",
    }
}

/// Human readable file type for a file name
pub fn file_type_label(name: &str) -> String {
    let ext = extension(name).to_lowercase();
    let known = match ext.as_str() {
        "txt" => "Text document",
        "doc" | "docx" => "Word document",
        "pdf" => "PDF document",
        "xls" | "xlsx" => "Excel spreadsheet",
        "ppt" | "pptx" => "PowerPoint presentation",
        "jpg" | "jpeg" => "JPEG image",
        "png" => "PNG image",
        "gif" => "GIF image",
        "mp3" => "MP3 audio",
        "wav" => "WAV audio",
        "mp4" => "MP4 video",
        "avi" => "AVI video",
        "zip" => "ZIP archive",
        "rar" => "RAR archive",
        "7z" => "7Z archive",
        "" => return "File".to_string(),
        _ => return format!("{} file", ext.to_uppercase()),
    };
    known.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Size,
    Date,
    Type,
}

impl SortField {
    pub fn display_name(&self) -> &'static str {
        match self {
            SortField::Name => "Name",
            SortField::Size => "Size",
            SortField::Date => "Date",
            SortField::Type => "Type",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            SortField::Name => SortField::Size,
            SortField::Size => SortField::Date,
            SortField::Date => SortField::Type,
            SortField::Type => SortField::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggle(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ascending",
            SortDirection::Desc => "descending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Grid,
}

impl ViewMode {
    pub fn toggle(&self) -> Self {
        match self {
            ViewMode::List => ViewMode::Grid,
            ViewMode::Grid => ViewMode::List,
        }
    }
}

/// Active sort field and direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    /// Choosing the active field flips direction, a new field starts ascending
    pub fn choose(&mut self, field: SortField) {
        if self.field == field {
            self.direction = self.direction.toggle();
        } else {
            self.field = field;
            self.direction = SortDirection::Asc;
        }
    }

    pub fn toggle_direction(&mut self) {
        self.direction = self.direction.toggle();
    }

    pub fn compare(&self, a: &DirEntry, b: &DirEntry) -> Ordering {
        if self.field != SortField::Type {
            match (a.is_directory, b.is_directory) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => {}
            }
        }

        let primary = match self.field {
            SortField::Name => natural_cmp(&a.name, &b.name),
            SortField::Size => a.size.cmp(&b.size),
            SortField::Date => a.modified_millis().cmp(&b.modified_millis()),
            SortField::Type => natural_cmp(&type_key(a), &type_key(b)),
        };

        match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        }
    }
}

fn type_key(entry: &DirEntry) -> String {
    if entry.is_directory {
        DIRECTORY_LABEL.to_lowercase()
    } else {
        entry.extension().to_lowercase()
    }
}

/// Case-insensitive comparison that orders digit runs numerically
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    alphanumeric_sort::compare_str(a.to_lowercase(), b.to_lowercase())
}

/// Display order for a listing as indices into `entries`.
///
/// The sort is stable, so equal entries keep their listing order and the
/// result is identical for identical input.
pub fn sorted_order(entries: &[DirEntry], sort: SortState) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| sort.compare(&entries[a], &entries[b]));
    order
}

/// One-line summary of a listing for the status bar
pub fn status_summary(entries: &[DirEntry], selected: usize) -> String {
    let folders = entries.iter().filter(|e| e.is_directory).count();
    let files = entries.len() - folders;

    let mut summary = match (folders, files) {
        (0, 0) => "Empty folder".to_string(),
        (f, 0) => format!("{} folders", f),
        (0, n) => format!("{} files", n),
        (f, n) => format!("{} folders, {} files", f, n),
    };

    if selected > 0 {
        summary.push_str(&format!(" | {} selected", selected));
    }

    summary
}
