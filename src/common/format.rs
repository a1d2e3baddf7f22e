use colored::*;

/// Format bytes into human-readable size string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format size with color based on magnitude
pub fn format_size_colored(bytes: u64) -> ColoredString {
    let s = format_size(bytes);
    const GB: u64 = 1024 * 1024 * 1024;
    const MB100: u64 = 100 * 1024 * 1024;

    if bytes >= GB {
        s.red().bold()
    } else if bytes >= MB100 {
        s.yellow()
    } else {
        s.white()
    }
}

/// Format a path for display, replacing home directory with ~
pub fn format_path(path: &std::path::Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

/// Length above which progress labels are shortened
pub const LABEL_MAX: usize = 45;
const LABEL_HEAD: usize = 15;
const LABEL_TAIL: usize = 25;

/// Shorten a path label for a single status line.
///
/// Keeps the first 15 and last 25 characters around `...` once the
/// label exceeds 45 characters. Works on chars, not bytes.
pub fn truncate_middle(s: &str) -> String {
    let count = s.chars().count();
    if count <= LABEL_MAX {
        return s.to_string();
    }
    let head: String = s.chars().take(LABEL_HEAD).collect();
    let tail: String = s.chars().skip(count - LABEL_TAIL).collect();
    format!("{}...{}", head, tail)
}

/// Progress label for a path: home-relative, then shortened
pub fn progress_label(path: &std::path::Path) -> String {
    truncate_middle(&format_path(path))
}

/// Format a duration in seconds
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor() as u64;
        let remaining = secs - (mins as f64 * 60.0);
        format!("{}m {:.0}s", mins, remaining)
    }
}

/// Truncate a string to max length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        ".".repeat(max_len)
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
        assert_eq!(format_size(1099511627776), "1.00 TB");
    }

    #[test]
    fn test_truncate_middle_short_untouched() {
        assert_eq!(truncate_middle("~/Library/Caches"), "~/Library/Caches");
        let exactly = "a".repeat(LABEL_MAX);
        assert_eq!(truncate_middle(&exactly), exactly);
    }

    #[test]
    fn test_truncate_middle_long() {
        let long = "/Library/Caches/com.apple.something/very/deep/nested/file.db";
        let short = truncate_middle(long);
        assert_eq!(short.chars().count(), LABEL_HEAD + 3 + LABEL_TAIL);
        assert!(short.starts_with("/Library/Caches"));
        assert_eq!(short, "/Library/Caches.../very/deep/nested/file.db");
        assert!(short.contains("..."));
    }

    #[test]
    fn test_truncate_middle_multibyte() {
        let long = "é".repeat(60);
        let short = truncate_middle(&long);
        assert_eq!(short.chars().count(), 43);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
    }
}
