use std::path::PathBuf;

use crate::command::Command;
use crate::context::ExecutionContext;
use crate::error::{ExecutionError, ValidationError};
use crate::record::Record;

use super::SAVE_MARKUP;

pub const DEFAULT_FILENAME: &str = "page.html";
pub const DEFAULT_PATH: &str = ".";

/// Write the current page's raw markup to `path/filename`, overwriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveMarkup {
    filename: String,
    path: String,
}

impl Default for SaveMarkup {
    fn default() -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_string(),
            path: DEFAULT_PATH.to_string(),
        }
    }
}

impl SaveMarkup {
    pub fn new(filename: impl Into<String>, path: impl Into<String>) -> Self {
        let filename = filename.into();
        let path = path.into();
        Self {
            filename: if filename.is_empty() { DEFAULT_FILENAME.to_string() } else { filename },
            path: if path.is_empty() { DEFAULT_PATH.to_string() } else { path },
        }
    }

    /// `tag` from the line syntax is not a parameter of this kind and is ignored.
    pub fn from_record(record: &Record) -> Result<Self, ValidationError> {
        let filename = record.str_param("filename")?.unwrap_or(DEFAULT_FILENAME);
        let path = record.str_param("path")?.unwrap_or(DEFAULT_PATH);
        Ok(Self::new(filename, path))
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.path).join(&self.filename)
    }
}

impl Command for SaveMarkup {
    fn kind(&self) -> &str {
        SAVE_MARKUP
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        let surface = ctx.surface.as_deref().ok_or(ExecutionError::NoSurface)?;
        let page = surface.current_page().ok_or(ExecutionError::NoPage)?;
        let markup = page
            .markup()
            .map_err(|source| ExecutionError::Extraction { what: "markup", source })?;

        let dir = PathBuf::from(&self.path);
        std::fs::create_dir_all(&dir).map_err(|source| ExecutionError::Io {
            path: dir.clone(),
            source,
        })?;

        let output = self.output_path();
        ctx.log(format!("Saving HTML to: {}", output.display()));
        std::fs::write(&output, markup).map_err(|source| ExecutionError::Io {
            path: output.clone(),
            source,
        })?;
        ctx.log(format!("HTML saved successfully: {}", output.display()));
        Ok(())
    }

    fn to_record(&self) -> Record {
        Record::new(SAVE_MARKUP)
            .with("filename", self.filename.clone())
            .with("path", self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{AutomationSurface, MemorySurface};
    use assert_matches::assert_matches;

    #[test]
    fn defaults_apply_and_tag_is_ignored() {
        let cmd = SaveMarkup::from_record(&Record::new(SAVE_MARKUP).with("tag", "panda")).unwrap();
        assert_eq!(cmd, SaveMarkup::default());
        assert_eq!(
            cmd.to_record(),
            Record::new(SAVE_MARKUP)
                .with("filename", "page.html")
                .with("path", ".")
        );
    }

    #[test]
    fn writes_markup_creating_directories() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("nested/out");
        let mut surface = MemorySurface::new().with_page("https://a.example", "<p>hi</p>", "hi");
        surface.navigate("https://a.example").unwrap();
        let mut ctx = ExecutionContext::new().with_surface(surface);

        let cmd = SaveMarkup::new("a.html", out_dir.to_string_lossy());
        cmd.execute(&mut ctx).unwrap();
        assert_eq!(std::fs::read_to_string(out_dir.join("a.html")).unwrap(), "<p>hi</p>");

        // Second save overwrites.
        std::fs::write(out_dir.join("a.html"), "stale").unwrap();
        cmd.execute(&mut ctx).unwrap();
        assert_eq!(std::fs::read_to_string(out_dir.join("a.html")).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn fails_without_page_or_surface() {
        let cmd = SaveMarkup::default();
        assert_matches!(
            cmd.execute(&mut ExecutionContext::new()),
            Err(ExecutionError::NoSurface)
        );
        assert_matches!(
            cmd.execute(&mut ExecutionContext::new().with_surface(MemorySurface::new())),
            Err(ExecutionError::NoPage)
        );
    }
}
