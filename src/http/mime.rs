//! File extension to content type mapping.

use std::collections::HashMap;

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";
pub const TEXT_JAVASCRIPT: &str = "text/javascript";
pub const TEXT_CSS: &str = "text/css";
pub const TEXT_CSV: &str = "text/csv";
pub const APPLICATION_OCTET: &str = "application/octet-stream";
pub const APPLICATION_JAVASCRIPT: &str = "application/javascript";
pub const APPLICATION_TAR: &str = "application/x-tar";
pub const APPLICATION_JSON: &str = "application/json";
pub const IMAGE_JPEG: &str = "image/jpeg";
pub const IMAGE_PNG: &str = "image/png";
pub const IMAGE_GIF: &str = "image/gif";
pub const IMAGE_SVG: &str = "image/svg+xml";
pub const ANY: &str = "*/*";

/// Extension → content type table.
#[derive(Debug, Clone)]
pub struct Mime {
    types: HashMap<String, String>,
}

impl Mime {
    pub fn new() -> Self {
        let defaults = [
            ("jpg", IMAGE_JPEG),
            ("jpeg", IMAGE_JPEG),
            ("png", IMAGE_PNG),
            ("gif", IMAGE_GIF),
            ("js", APPLICATION_JAVASCRIPT),
            ("json", APPLICATION_JSON),
            ("tar", APPLICATION_TAR),
            ("css", TEXT_CSS),
            ("csv", TEXT_CSV),
            ("htm", TEXT_HTML),
            ("html", TEXT_HTML),
            ("svg", IMAGE_SVG),
            ("ico", "image/vnd.microsoft.icon"),
            ("otf", "application/x-font-otf"),
            ("ttf", "application/x-font-ttf"),
        ];
        Self {
            types: defaults
                .into_iter()
                .map(|(ext, ty)| (ext.to_string(), ty.to_string()))
                .collect(),
        }
    }

    /// Content type for an extension. Unknown extensions map to `text/<ext>`.
    pub fn get(&self, ext: &str) -> String {
        let ext = normalize(ext);
        match self.types.get(&ext) {
            Some(ty) => ty.clone(),
            None => format!("text/{ext}"),
        }
    }

    /// Register or override a content type.
    pub fn add(&mut self, ext: &str, content_type: impl Into<String>) {
        self.types.insert(normalize(ext), content_type.into());
    }

    /// Build `type/subtype[+suffix...][;q=x.y]`. The weight is omitted when not positive.
    pub fn make_mime(mime_type: &str, sub_type: &str, suffixes: &[&str], q_factor: f32) -> String {
        let mut mime = format!("{mime_type}/{sub_type}");
        for suffix in suffixes {
            mime.push('+');
            mime.push_str(suffix);
        }
        if q_factor > 0.0 {
            mime.push_str(&format!(";q={q_factor:.1}"));
        }
        mime
    }
}

impl Default for Mime {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        let mime = Mime::new();
        assert_eq!(mime.get("html"), TEXT_HTML);
        assert_eq!(mime.get("JPG"), IMAGE_JPEG);
        assert_eq!(mime.get(".json"), APPLICATION_JSON);
        assert_eq!(mime.get("ico"), "image/vnd.microsoft.icon");
    }

    #[test]
    fn test_unknown_extension_falls_back_to_text() {
        let mime = Mime::new();
        assert_eq!(mime.get("md"), "text/md");
    }

    #[test]
    fn test_add_overrides() {
        let mut mime = Mime::new();
        mime.add("js", TEXT_JAVASCRIPT);
        mime.add("wasm", "application/wasm");
        assert_eq!(mime.get("js"), TEXT_JAVASCRIPT);
        assert_eq!(mime.get("wasm"), "application/wasm");
    }

    #[test]
    fn test_make_mime() {
        assert_eq!(Mime::make_mime("application", "json", &[], 0.0), "application/json");
        assert_eq!(
            Mime::make_mime("application", "vnd.api", &["json", "gzip"], 0.8),
            "application/vnd.api+json+gzip;q=0.8"
        );
        assert_eq!(Mime::make_mime("text", "html", &[], -1.0), "text/html");
    }
}
