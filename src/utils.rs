use crate::error::{Result, ScraperError};
pub use crate::log_info;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const SNAPSHOT_PREFIX: &str = "listing-";

pub fn ensure_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Writes the rendered DOM to `<dir>/listing-<n>.html`, numbering after the
/// highest snapshot already there.
pub fn save_snapshot(dir: &Path, html: &str) -> Result<PathBuf> {
    ensure_directory(dir)?;

    let mut next = 1;
    for entry in fs::read_dir(dir)? {
        if let Some(number) = snapshot_number(&entry?.path()) {
            next = next.max(number + 1);
        }
    }

    let path = dir.join(format!("{}{}.html", SNAPSHOT_PREFIX, next));
    fs::write(&path, html)?;

    log_info!("[utils] Saved DOM snapshot to {}", path.display());
    Ok(path)
}

/// Reads every file matching a glob pattern, ordered by snapshot number
/// and then by path.
pub fn read_snapshots(pattern: &str) -> Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry.map_err(|e| std::io::Error::new(e.error().kind(), e.to_string()))?;
        if path.is_file() {
            let content = fs::read_to_string(&path)?;
            files.push((path, content));
        }
    }

    if files.is_empty() {
        return Err(ScraperError::NoSnapshots(pattern.to_string()).into());
    }

    files.sort_by(|(a_path, _), (b_path, _)| {
        let a_num = snapshot_number(a_path).unwrap_or(0);
        let b_num = snapshot_number(b_path).unwrap_or(0);
        a_num.cmp(&b_num).then_with(|| a_path.cmp(b_path))
    });

    Ok(files)
}

fn snapshot_number(path: &Path) -> Option<usize> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|name| name.strip_prefix(SNAPSHOT_PREFIX))
        .and_then(|rest| rest.strip_suffix(".html"))
        .and_then(|num| num.parse().ok())
}

/// Serializes as a JSON object whose keys keep the vector's order.
pub struct ByPath<V>(pub Vec<(String, V)>);

impl<V: serde::Serialize> serde::Serialize for ByPath<V> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(path, value)| (path, value)))
    }
}

/// Serializes `data` as JSON to stdout. Non-ASCII text is written as is.
pub fn write_json(data: &impl serde::Serialize, pretty: bool) -> Result<()> {
    let json_string = if pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(json_string.as_bytes())?;
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn snapshots_are_numbered_after_existing_ones() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("listing-7.html"), "old").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let path = save_snapshot(dir.path(), "<html></html>").unwrap();

        assert_eq!(path, dir.path().join("listing-8.html"));
        assert_eq!(fs::read_to_string(path).unwrap(), "<html></html>");
    }

    #[test]
    fn creates_missing_snapshot_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("snapshots/anime");

        let path = save_snapshot(&nested, "<p></p>").unwrap();

        assert_eq!(path, nested.join("listing-1.html"));
    }

    #[test]
    fn reads_snapshots_in_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        for n in [10, 2, 1] {
            fs::write(dir.path().join(format!("listing-{}.html", n)), n.to_string()).unwrap();
        }
        let pattern = format!("{}/*.html", dir.path().display());

        let files = read_snapshots(&pattern).unwrap();

        let contents: Vec<&str> = files.iter().map(|(_, c)| c.as_str()).collect();
        assert_eq!(contents, vec!["1", "2", "10"]);
    }

    #[test]
    fn by_path_keeps_snapshot_order() {
        let by_path = ByPath(vec![
            ("listing-2.html".to_string(), vec![1]),
            ("listing-10.html".to_string(), vec![2]),
        ]);

        let json = serde_json::to_string(&by_path).unwrap();

        assert_eq!(json, r#"{"listing-2.html":[1],"listing-10.html":[2]}"#);
    }

    #[test]
    fn no_matching_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.html", dir.path().display());

        let err = read_snapshots(&pattern).unwrap_err();

        assert!(matches!(err, AppError::Scraper(ScraperError::NoSnapshots(_))));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = read_snapshots("snapshots/[").unwrap_err();
        assert!(matches!(err, AppError::Pattern(_)));
    }
}
