//! Markdown rendering for vault notes.
//!
//! Notes append to one daily file per calendar day; each capture becomes a
//! timestamped section.

use chrono::{DateTime, Utc};

/// Render one voice note section.
pub fn format_voice_note(timestamp: &DateTime<Utc>, text: &str, tags: &[String]) -> String {
    let tag_str = if tags.is_empty() {
        String::new()
    } else {
        let joined = tags
            .iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>()
            .join(" ");
        format!(" {}", joined)
    };

    format!(
        "## \u{1F399}\u{FE0F} {}\n{}{}\n\n",
        timestamp.format("%H:%M"),
        text,
        tag_str
    )
}

/// Path of the daily note inside the vault.
pub fn daily_note_path(folder: &str, date: &DateTime<Utc>) -> String {
    format!("{}/{}.md", folder, date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 29, 9, 5, 0).unwrap()
    }

    #[test]
    fn test_format_without_tags() {
        let note = format_voice_note(&sample_time(), "Toi can mua sua", &[]);
        assert_eq!(note, "## \u{1F399}\u{FE0F} 09:05\nToi can mua sua\n\n");
    }

    #[test]
    fn test_format_with_tags() {
        let tags = vec!["viec-nha".to_string(), "mua-sam".to_string()];
        let note = format_voice_note(&sample_time(), "nho mua trung", &tags);
        assert!(note.ends_with("nho mua trung #viec-nha #mua-sam\n\n"));
    }

    #[test]
    fn test_daily_note_path() {
        assert_eq!(
            daily_note_path("Tuyet", &sample_time()),
            "Tuyet/2026-08-29.md"
        );
    }
}
