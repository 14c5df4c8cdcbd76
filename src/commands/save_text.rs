use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::command::Command;
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, ValidationError};
use crate::record::Record;

use super::SAVE_TEXT;

pub const SAVE_FOLDER_KEY: &str = "save_folder";
pub const DEFAULT_FOLDER: &str = "./output/captures";

/// Make a user tag safe for a filename.
///
/// Spaces become underscores, anything other than alphanumerics and
/// underscores is dropped, and edge underscores are trimmed. Returns `None`
/// when nothing is left.
pub fn sanitize_tag(tag: &str) -> Option<String> {
    let cleaned: String = tag
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    let cleaned = cleaned.trim_matches('_');
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// `YYYYMMDDHHMMSS.mmm[_tag].txt`
fn capture_filename(at: DateTime<Local>, tag: Option<&str>) -> String {
    let stamp = at.format("%Y%m%d%H%M%S");
    let millis = at.timestamp_subsec_millis().min(999);
    match tag {
        Some(tag) => format!("{stamp}.{millis:03}_{tag}.txt"),
        None => format!("{stamp}.{millis:03}.txt"),
    }
}

/// Write the page's rendered text to a timestamped file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveText {
    tag: Option<String>,
    folder: Option<String>,
}

impl SaveText {
    pub fn new(tag: Option<&str>, folder: Option<&str>) -> Self {
        Self {
            tag: tag.and_then(sanitize_tag),
            folder: folder.filter(|f| !f.is_empty()).map(str::to_string),
        }
    }

    pub fn from_record(record: &Record) -> Result<Self, ValidationError> {
        Ok(Self::new(record.str_param("tag")?, record.str_param("folder")?))
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Explicit folder, then the `save_folder` setting, then the default.
    fn resolve_folder(&self, ctx: &ExecutionContext) -> PathBuf {
        if let Some(folder) = &self.folder {
            return PathBuf::from(folder);
        }
        match &ctx.settings {
            Some(settings) => PathBuf::from(settings.get_str(SAVE_FOLDER_KEY, DEFAULT_FOLDER)),
            None => PathBuf::from(DEFAULT_FOLDER),
        }
    }
}

impl Command for SaveText {
    fn kind(&self) -> &str {
        SAVE_TEXT
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        let surface = ctx.surface.as_deref().ok_or(ExecutionError::NoSurface)?;
        let page = surface.current_page().ok_or(ExecutionError::NoPage)?;
        let text = page
            .rendered_text()
            .map_err(|source| ExecutionError::Extraction { what: "text", source })?;

        let folder = self.resolve_folder(ctx);
        std::fs::create_dir_all(&folder).map_err(|source| ExecutionError::Io {
            path: folder.clone(),
            source,
        })?;

        let output = folder.join(capture_filename(Local::now(), self.tag()));
        std::fs::write(&output, text).map_err(|source| ExecutionError::Io {
            path: output.clone(),
            source,
        })?;
        ctx.log(format!("Saved TEXT to: {}", output.display()));
        Ok(())
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new(SAVE_TEXT);
        if let Some(tag) = &self.tag {
            record = record.with("tag", tag.clone());
        }
        if let Some(folder) = &self.folder {
            record = record.with("folder", folder.clone());
        }
        record
    }

    fn describe(&self) -> String {
        match &self.tag {
            Some(tag) => format!("SaveText(tag={tag})"),
            None => "SaveText()".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{AutomationSurface, MemorySurface};
    use chrono::TimeZone;
    use serde_json::{Map, Value, json};
    use std::sync::Arc;

    #[test]
    fn tags_are_sanitized() {
        assert_eq!(sanitize_tag("  multi word "), Some("multi_word".into()));
        assert_eq!(sanitize_tag("google search!"), Some("google_search".into()));
        assert_eq!(sanitize_tag("_a-b_c_"), Some("ab_c".into()));
        assert_eq!(sanitize_tag("!!!"), None);
        assert_eq!(sanitize_tag(" _ "), None);
    }

    #[test]
    fn filename_has_millisecond_stamp() {
        let at = Local.with_ymd_and_hms(2025, 12, 22, 18, 56, 23).unwrap()
            + chrono::Duration::milliseconds(7);
        assert_eq!(capture_filename(at, None), "20251222185623.007.txt");
        assert_eq!(
            capture_filename(at, Some("results")),
            "20251222185623.007_results.txt"
        );
    }

    #[test]
    fn record_keeps_sanitized_tag_and_folder() {
        let cmd = SaveText::from_record(
            &Record::new(SAVE_TEXT).with("tag", "multi word").with("folder", "caps"),
        )
        .unwrap();
        assert_eq!(cmd.tag(), Some("multi_word"));
        assert_eq!(
            serde_json::to_value(cmd.to_record()).unwrap(),
            json!({"command": "save_text", "tag": "multi_word", "folder": "caps"})
        );
        assert_eq!(SaveText::from_record(&cmd.to_record()).unwrap(), cmd);
        assert_eq!(
            SaveText::from_record(&Record::new(SAVE_TEXT).with("tag", "?!")).unwrap(),
            SaveText::default()
        );
    }

    #[test]
    fn folder_falls_back_to_settings() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("from_settings");
        let mut settings = Map::new();
        settings.insert(
            SAVE_FOLDER_KEY.into(),
            Value::String(folder.to_string_lossy().into_owned()),
        );

        let mut surface = MemorySurface::new().with_page("https://a.example", "<p>x</p>", "visible");
        surface.navigate("https://a.example").unwrap();
        let mut ctx = ExecutionContext::new()
            .with_surface(surface)
            .with_settings(Arc::new(settings));

        SaveText::new(Some("probe"), None).execute(&mut ctx).unwrap();

        let files: Vec<_> = std::fs::read_dir(&folder)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("_probe.txt"), "{name}");
        assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "visible");
    }

    #[test]
    fn same_millisecond_collision_overwrites_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut surface = MemorySurface::new();
        surface.navigate("https://a.example").unwrap();
        let mut ctx = ExecutionContext::new().with_surface(surface);
        let cmd = SaveText::new(Some("same"), dir.path().to_str());

        for _ in 0..5 {
            cmd.execute(&mut ctx).unwrap();
        }

        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert!((1..=5).contains(&count));
    }
}
