//! Minijinja rendering of the post body.
//!
//! The template source is either a file chosen in configuration or the
//! built-in [`DEFAULT_TEMPLATE`]. Syntax is checked once when the template is
//! constructed; a fresh environment is built per render since there is only
//! one template and it is rendered once per file.

use std::path::Path;

use serde::Serialize;

use crate::contract::FileMetadata;
use crate::error::TemplateError;

pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/post.html");

/// Variables available inside the post template.
#[derive(Debug, Clone, Serialize)]
pub struct PostContext<'a> {
    pub file_name: &'a str,
    pub brief_description: &'a str,
    pub download_link: &'a str,
    pub download_label: &'a str,
    pub file_metadata: &'a FileMetadata,
}

#[derive(Debug, Clone)]
pub struct PostTemplate {
    source: String,
}

impl PostTemplate {
    pub fn from_source(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        minijinja::Environment::new()
            .template_from_str(&source)
            .map_err(|e| TemplateError::Syntax(e.to_string()))?;
        Ok(Self { source })
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_source(source)
    }

    pub fn builtin() -> Self {
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
        }
    }

    pub fn render(&self, ctx: &PostContext<'_>) -> Result<String, TemplateError> {
        minijinja::Environment::new()
            .render_str(&self.source, ctx)
            .map_err(|e| TemplateError::Render(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> FileMetadata {
        FileMetadata {
            size: "2048".into(),
            mime_type: "application/octet-stream".into(),
        }
    }

    #[test]
    fn builtin_template_renders_every_field() {
        let meta = metadata();
        let ctx = PostContext {
            file_name: "GPU-boardview-x.bin",
            brief_description: "A graphics card boardview.",
            download_link: "https://exe.io/abc",
            download_label: "Download Boardview",
            file_metadata: &meta,
        };
        let html = PostTemplate::builtin().render(&ctx).unwrap();
        assert!(html.contains("GPU-boardview-x.bin"));
        assert!(html.contains("A graphics card boardview."));
        assert!(html.contains("https://exe.io/abc"));
        assert!(html.contains("Download Boardview"));
        assert!(html.contains("2048"));
    }

    #[test]
    fn builtin_template_parses() {
        assert!(PostTemplate::from_source(DEFAULT_TEMPLATE).is_ok());
    }

    #[test]
    fn empty_description_is_omitted() {
        let meta = metadata();
        let ctx = PostContext {
            file_name: "x.bin",
            brief_description: "",
            download_link: "https://example.com",
            download_label: "Download Schematic",
            file_metadata: &meta,
        };
        let html = PostTemplate::builtin().render(&ctx).unwrap();
        assert!(!html.contains("class=\"description\""));
    }

    #[test]
    fn invalid_syntax_is_rejected_up_front() {
        let err = PostTemplate::from_source("{% if %}").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = PostTemplate::load(Path::new("/definitely/not/here.html")).unwrap_err();
        assert!(matches!(err, TemplateError::Read { .. }));
    }

    #[test]
    fn load_reads_custom_template() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "<h1>{{ file_name }}</h1>").unwrap();
        let tpl = PostTemplate::load(file.path()).unwrap();
        let meta = metadata();
        let ctx = PostContext {
            file_name: "x.bin",
            brief_description: "",
            download_link: "",
            download_label: "",
            file_metadata: &meta,
        };
        assert_eq!(tpl.render(&ctx).unwrap(), "<h1>x.bin</h1>");
    }
}
