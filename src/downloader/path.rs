//! Path normalization (§6): every path handed to a file open is run
//! through this so a parser-provided album name or filename with
//! filesystem-illegal characters never reaches `fs::File::create`.

use once_cell::sync::Lazy;
use regex::Regex;

static DRIVE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]:[\\/]?").unwrap());
static ILLEGAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"|?*\x00-\x1F]"#).unwrap());

/// Replaces filesystem-illegal characters within each path component
/// with `_`, preserving a Windows drive prefix and collapsing empty
/// components from doubled separators. Idempotent: `normalize(normalize(p)) == normalize(p)`.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let (prefix, rest, separator, leading_slash) = if let Some(m) = DRIVE_PREFIX.find(path) {
        let matched = m.as_str();
        let sep = if matched.contains('\\') { '\\' } else { '/' };
        (matched.to_string(), &path[matched.len()..], sep, false)
    } else if let Some(stripped) = path.strip_prefix('/') {
        ("".to_string(), stripped, '/', true)
    } else {
        let sep = if path.contains('\\') { '\\' } else { '/' };
        ("".to_string(), path, sep, false)
    };

    let normalized = rest
        .split(['\\', '/'])
        .filter(|part| !part.is_empty())
        .map(normalize_component)
        .collect::<Vec<_>>()
        .join(&separator.to_string());

    if !prefix.is_empty() {
        format!("{prefix}{normalized}")
    } else if leading_slash {
        format!("{separator}{normalized}")
    } else {
        normalized
    }
}

fn normalize_component(part: &str) -> String {
    ILLEGAL_CHARS.replace_all(part, "_").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_illegal_characters() {
        assert_eq!(normalize_path("bad:name?"), "bad_name_");
    }

    #[test]
    fn preserves_windows_drive_prefix() {
        assert_eq!(normalize_path(r"D:\abc:def\ghi?"), r"D:\abc_def\ghi_");
    }

    #[test]
    fn collapses_empty_components() {
        assert_eq!(normalize_path("a//b///c"), "a/b/c");
    }

    #[test]
    fn preserves_unix_absolute_prefix() {
        assert_eq!(normalize_path("/a/b:c"), "/a/b_c");
    }

    #[test]
    fn is_idempotent() {
        for p in ["bad:name?", r"D:\abc:def\ghi?", "a//b///c", "/a/b:c", "plain/name"] {
            let once = normalize_path(p);
            let twice = normalize_path(&once);
            assert_eq!(once, twice);
        }
    }
}
