use std::fmt;

/// Text shown when the model answered without any text parts.
pub const EMPTY_SUMMARY_FALLBACK: &str =
    "No summary returned. Please check the file or try another document.";

/// Name offered for the downloadable copy of a summary.
pub const SUMMARY_FILE_NAME: &str = "summary.txt";

/// MIME type used when neither the object name nor storage tell us better.
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// The requested output shape for a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryStyle {
    #[default]
    Lines,
    Paragraphs,
    Custom,
}

impl SummaryStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStyle::Lines => "lines",
            SummaryStyle::Paragraphs => "paragraphs",
            SummaryStyle::Custom => "custom",
        }
    }

    /// Inclusive bounds for the numeric parameter, if the style has one.
    pub fn count_range(&self) -> Option<(u8, u8)> {
        match self {
            SummaryStyle::Lines => Some((1, 20)),
            SummaryStyle::Paragraphs => Some((1, 5)),
            SummaryStyle::Custom => None,
        }
    }

    /// Clamps `value` into the style's range. Custom keeps the value as-is.
    pub fn clamp_count(&self, value: u8) -> u8 {
        match self.count_range() {
            Some((min, max)) => value.clamp(min, max),
            None => value,
        }
    }
}

impl fmt::Display for SummaryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SummaryStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lines" => Ok(SummaryStyle::Lines),
            "paragraphs" => Ok(SummaryStyle::Paragraphs),
            "custom" => Ok(SummaryStyle::Custom),
            other => Err(format!("Unknown summary style: '{}'", other)),
        }
    }
}

/// Builds the instruction sent next to the uploaded file.
///
/// A custom style with a non-blank prompt sends that prompt verbatim.
/// Everything else asks for `{value} {style}` of summary.
pub fn build_prompt(style: SummaryStyle, value: u8, custom_prompt: &str) -> String {
    let custom_prompt = custom_prompt.trim();
    if style == SummaryStyle::Custom && !custom_prompt.is_empty() {
        return custom_prompt.to_string();
    }

    format!(
        "Give me a summary of this PDF file in {} {}.",
        value,
        style.as_str()
    )
}

/// Picks the MIME type to declare when uploading an object for generation.
///
/// The extension wins, then whatever storage reported, then PDF.
pub fn guess_mime_type(object_name: &str, reported: Option<&str>) -> String {
    let extension = object_name
        .rsplit('/')
        .next()
        .and_then(|base| base.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase());

    let by_extension = match extension.as_deref() {
        Some("pdf") => Some("application/pdf"),
        Some("txt") | Some("log") => Some("text/plain"),
        Some("md") | Some("markdown") => Some("text/markdown"),
        Some("csv") => Some("text/csv"),
        Some("html") | Some("htm") => Some("text/html"),
        Some("xml") => Some("text/xml"),
        Some("rtf") => Some("text/rtf"),
        Some("json") => Some("application/json"),
        Some("js") => Some("text/javascript"),
        Some("css") => Some("text/css"),
        Some("py") => Some("text/x-python"),
        Some("png") => Some("image/png"),
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("webp") => Some("image/webp"),
        Some("mp3") => Some("audio/mpeg"),
        Some("wav") => Some("audio/wav"),
        Some("mp4") => Some("video/mp4"),
        _ => None,
    };

    if let Some(mime) = by_extension {
        return mime.to_string();
    }

    match reported.map(str::trim) {
        Some(mime) if !mime.is_empty() && mime != "application/octet-stream" => {
            // Drop parameters such as "; charset=utf-8"
            mime.split(';').next().unwrap_or(mime).trim().to_string()
        }
        _ => DEFAULT_MIME_TYPE.to_string(),
    }
}

/// Most filesystems reject names longer than 255 bytes.
const MAX_LOCAL_NAME_BYTES: usize = 200;
const MAX_KEPT_EXTENSION_BYTES: usize = 16;

fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Local file name for a downloaded object: its last path component,
/// shortened to fit the filesystem while keeping the extension.
pub fn local_file_name(object_name: &str) -> String {
    let base = object_name.rsplit('/').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_control() || c == '\\' { '_' } else { c })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => return "object".to_string(),
        _ if cleaned.len() <= MAX_LOCAL_NAME_BYTES => return cleaned,
        _ => {}
    }

    match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= MAX_KEPT_EXTENSION_BYTES => {
            let stem = truncate_at_char_boundary(stem, MAX_LOCAL_NAME_BYTES - ext.len() - 1);
            format!("{}.{}", stem, ext)
        }
        _ => truncate_at_char_boundary(&cleaned, MAX_LOCAL_NAME_BYTES).to_string(),
    }
}

/// A generated summary ready to be displayed and offered for download.
#[derive(Debug, Clone)]
pub struct SummaryResult {
    pub object_name: String,
    pub text: String,
    pub file_name: String,
}

impl SummaryResult {
    pub fn new(object_name: impl Into<String>, text: Option<String>) -> Self {
        let text = text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| EMPTY_SUMMARY_FALLBACK.to_string());

        Self {
            object_name: object_name.into(),
            text,
            file_name: SUMMARY_FILE_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_lines() {
        assert_eq!(
            build_prompt(SummaryStyle::Lines, 3, ""),
            "Give me a summary of this PDF file in 3 lines."
        );
    }

    #[test]
    fn test_build_prompt_ignores_custom_text_for_paragraphs() {
        assert_eq!(
            build_prompt(SummaryStyle::Paragraphs, 2, "list the authors"),
            "Give me a summary of this PDF file in 2 paragraphs."
        );
    }

    #[test]
    fn test_build_prompt_custom_uses_prompt_verbatim() {
        assert_eq!(
            build_prompt(SummaryStyle::Custom, 3, "  List every author.  "),
            "List every author."
        );
    }

    #[test]
    fn test_build_prompt_custom_without_prompt_falls_back() {
        assert_eq!(
            build_prompt(SummaryStyle::Custom, 4, "   "),
            "Give me a summary of this PDF file in 4 custom."
        );
    }

    #[test]
    fn test_clamp_count_per_style() {
        assert_eq!(SummaryStyle::Lines.clamp_count(0), 1);
        assert_eq!(SummaryStyle::Lines.clamp_count(25), 20);
        assert_eq!(SummaryStyle::Paragraphs.clamp_count(9), 5);
        assert_eq!(SummaryStyle::Custom.clamp_count(42), 42);
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("Lines".parse::<SummaryStyle>(), Ok(SummaryStyle::Lines));
        assert_eq!(
            " paragraphs ".parse::<SummaryStyle>(),
            Ok(SummaryStyle::Paragraphs)
        );
        assert!("bullets".parse::<SummaryStyle>().is_err());
    }

    #[test]
    fn test_guess_mime_type_prefers_extension() {
        assert_eq!(
            guess_mime_type("reports/q3.PDF", Some("text/plain")),
            "application/pdf"
        );
        assert_eq!(guess_mime_type("notes.md", None), "text/markdown");
    }

    #[test]
    fn test_guess_mime_type_uses_reported_type() {
        assert_eq!(
            guess_mime_type("reports/q3", Some("text/plain; charset=utf-8")),
            "text/plain"
        );
    }

    #[test]
    fn test_guess_mime_type_defaults_to_pdf() {
        assert_eq!(
            guess_mime_type("archive.bin", Some("application/octet-stream")),
            DEFAULT_MIME_TYPE
        );
        assert_eq!(guess_mime_type("no_extension", None), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_local_file_name() {
        assert_eq!(local_file_name("a/b/report.pdf"), "report.pdf");
        assert_eq!(local_file_name("report.pdf"), "report.pdf");
        assert_eq!(local_file_name("folder/"), "object");
        assert_eq!(local_file_name("weird\\name.txt"), "weird_name.txt");
    }

    #[test]
    fn test_local_file_name_caps_long_names() {
        let long = format!("reports/{}.pdf", "a".repeat(300));
        let name = local_file_name(&long);
        assert_eq!(name.len(), MAX_LOCAL_NAME_BYTES);
        assert!(name.ends_with("aaa.pdf"));

        // Multi-byte characters are never split
        let accented = local_file_name(&"é".repeat(150));
        assert!(accented.len() <= MAX_LOCAL_NAME_BYTES);
        assert!(accented.chars().all(|c| c == 'é'));

        let no_ext = local_file_name(&"b".repeat(400));
        assert_eq!(no_ext.len(), MAX_LOCAL_NAME_BYTES);
    }

    #[test]
    fn test_summary_result_fallback() {
        let empty = SummaryResult::new("doc.pdf", None);
        assert_eq!(empty.text, EMPTY_SUMMARY_FALLBACK);
        assert_eq!(empty.file_name, "summary.txt");

        let blank = SummaryResult::new("doc.pdf", Some("  \n".to_string()));
        assert_eq!(blank.text, EMPTY_SUMMARY_FALLBACK);

        let real = SummaryResult::new("doc.pdf", Some("Short summary.".to_string()));
        assert_eq!(real.text, "Short summary.");
    }
}
