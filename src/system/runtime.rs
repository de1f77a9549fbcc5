// src/system/runtime.rs

use crate::constants::{BUNDLED_DIR_NAME, RUNTIME_FILENAME, SCRIPT_EXTENSION};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

static RUNTIME_SCRIPT: &str = include_str!("../../runtime/runtime.sh");

/// Scripts shipped inside the binary, as `(file name, content)`.
static BUNDLED_SCRIPTS: &[(&str, &str)] = &[
    ("build.sh", include_str!("../../scripts/build.sh")),
    ("deploy.sh", include_str!("../../scripts/deploy.sh")),
    ("install.sh", include_str!("../../scripts/install.sh")),
    ("login.sh", include_str!("../../scripts/login.sh")),
    ("pull.sh", include_str!("../../scripts/pull.sh")),
    ("smoke-test.sh", include_str!("../../scripts/smoke-test.sh")),
];

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Could not prepare '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> RuntimeError + '_ {
    move |source| RuntimeError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Writes `content` to `path` unless the file already holds the same bytes (compared by
/// blake3 hash). Returns whether the file was (re)written.
pub fn write_if_changed(path: &Path, content: &[u8], executable: bool) -> Result<bool, RuntimeError> {
    let wanted = blake3::hash(content);
    let unchanged = fs::read(path)
        .map(|existing| blake3::hash(&existing) == wanted)
        .unwrap_or(false);

    if unchanged {
        log::trace!("'{}' is up to date.", path.display());
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        fs::write(path, content).map_err(io_error(path))?;
        log::debug!(
            "Wrote '{}' ({} bytes, blake3 {}).",
            path.display(),
            content.len(),
            hex::encode(wanted.as_bytes())
        );
    }

    if executable {
        set_executable(path)?;
    }
    Ok(!unchanged)
}

/// Sets mode 0755 on Unix.
#[cfg(unix)]
pub(crate) fn set_executable(path: &Path) -> Result<(), RuntimeError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(io_error(path))
}

#[cfg(not(unix))]
pub(crate) fn set_executable(_path: &Path) -> Result<(), RuntimeError> {
    Ok(())
}

/// Materializes the runtime wrapper into the cache directory and returns its path.
pub fn prepare_runtime(cache_dir: &Path) -> Result<PathBuf, RuntimeError> {
    let runtime_path = cache_dir.join(RUNTIME_FILENAME);
    write_if_changed(&runtime_path, RUNTIME_SCRIPT.as_bytes(), true)?;
    Ok(runtime_path)
}

/// Materializes the bundled scripts into `<cache>/bundled` and returns that directory.
/// Scripts left over from an older build are removed.
pub fn prepare_bundled_scripts(cache_dir: &Path) -> Result<PathBuf, RuntimeError> {
    let bundled_dir = cache_dir.join(BUNDLED_DIR_NAME);
    fs::create_dir_all(&bundled_dir).map_err(io_error(&bundled_dir))?;

    let mut embedded: HashSet<&str> = HashSet::new();
    for (name, content) in BUNDLED_SCRIPTS {
        write_if_changed(&bundled_dir.join(name), content.as_bytes(), true)?;
        embedded.insert(*name);
    }

    let entries = fs::read_dir(&bundled_dir).map_err(io_error(&bundled_dir))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_script = path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXTENSION);
        let known = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| embedded.contains(n));
        if is_script && !known {
            log::debug!("Removing stale bundled script '{}'.", path.display());
            fs::remove_file(&path).map_err(io_error(&path))?;
        }
    }

    Ok(bundled_dir)
}

/// Variables that appear (or changed) between two `export -p` snapshots.
/// Unreadable snapshots yield no variables.
pub fn read_exports(pre_file: &Path, post_file: &Path) -> HashMap<String, String> {
    let pre = fs::read_to_string(pre_file).unwrap_or_default();
    let Ok(post) = fs::read_to_string(post_file) else {
        log::debug!("No post-run environment snapshot at '{}'.", post_file.display());
        return HashMap::new();
    };
    diff_exports(&pre, &post)
}

pub fn diff_exports(pre: &str, post: &str) -> HashMap<String, String> {
    let before: HashSet<String> = declarations(pre).into_iter().collect();
    declarations(post)
        .into_iter()
        .filter(|declaration| !before.contains(declaration))
        .filter_map(|declaration| parse_export_line(&declaration))
        .collect()
}

/// Splits an `export -p` listing into declarations. Older bash versions print a
/// double-quoted value with raw newlines, so a line that does not open a new declaration
/// continues the previous one.
fn declarations(listing: &str) -> Vec<String> {
    let mut grouped: Vec<String> = Vec::new();
    for line in listing.lines() {
        let opens = line.starts_with("declare -") || line.starts_with("export ");
        match grouped.last_mut() {
            Some(current) if !opens => {
                current.push('\n');
                current.push_str(line);
            }
            _ => grouped.push(line.to_string()),
        }
    }
    grouped
}

/// Parses `declare -x NAME="value"` (bash) or `export NAME='value'` (POSIX sh).
/// Declarations without a value are ignored.
pub fn parse_export_line(line: &str) -> Option<(String, String)> {
    let rest = line
        .strip_prefix("declare -x ")
        .or_else(|| line.strip_prefix("export "))?;
    let (name, raw) = rest.split_once('=')?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name.to_string(), unquote(raw)))
}

fn unquote(raw: &str) -> String {
    if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        let mut value = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => value.push(next),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => value.push('\\'),
                }
            } else {
                value.push(c);
            }
        }
        value
    } else if let Some(inner) = raw.strip_prefix("$'").and_then(|r| r.strip_suffix('\'')) {
        unescape_ansi_c(inner)
    } else if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        inner.replace(r"'\''", "'")
    } else {
        raw.to_string()
    }
}

/// Decodes the body of a bash `$'...'` string. Bash uses this quoting in `export -p`
/// for values holding newlines or other control characters. Numeric escapes are bytes,
/// so the result is decoded as UTF-8 at the end.
fn unescape_ansi_c(inner: &str) -> String {
    let mut bytes: Vec<u8> = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    let mut buf = [0u8; 4];

    while let Some(c) = chars.next() {
        if c != '\\' {
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let Some(escape) = chars.next() else {
            bytes.push(b'\\');
            break;
        };
        match escape {
            'a' => bytes.push(0x07),
            'b' => bytes.push(0x08),
            'e' | 'E' => bytes.push(0x1b),
            'f' => bytes.push(0x0c),
            'n' => bytes.push(b'\n'),
            'r' => bytes.push(b'\r'),
            't' => bytes.push(b'\t'),
            'v' => bytes.push(0x0b),
            '\\' | '\'' | '"' | '?' => bytes.extend(u8::try_from(escape)),
            '0'..='7' => {
                let mut value = escape.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.extend(u8::try_from(value & 0xff));
            }
            'x' => match take_hex(&mut chars, 2) {
                Some(value) => bytes.extend(u8::try_from(value & 0xff)),
                None => bytes.extend_from_slice(b"\\x"),
            },
            'u' | 'U' => {
                let width = if escape == 'u' { 4 } else { 8 };
                match take_hex(&mut chars, width).and_then(char::from_u32) {
                    Some(decoded) => {
                        bytes.extend_from_slice(decoded.encode_utf8(&mut buf).as_bytes());
                    }
                    None => {
                        bytes.push(b'\\');
                        bytes.extend(u8::try_from(escape));
                    }
                }
            }
            'c' => match chars.next() {
                Some(control) => bytes.extend(u8::try_from(u32::from(control) & 0x1f)),
                None => bytes.extend_from_slice(b"\\c"),
            },
            other => {
                bytes.push(b'\\');
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Reads up to `max` hex digits. `None` when there is none.
fn take_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, max: usize) -> Option<u32> {
    let mut value: Option<u32> = None;
    for _ in 0..max {
        let Some(digit) = chars.peek().and_then(|d| d.to_digit(16)) else {
            break;
        };
        value = Some(value.unwrap_or(0) * 16 + digit);
        chars.next();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_bash_and_posix_lines() {
        assert_eq!(
            parse_export_line(r#"declare -x URL="https://x.dev/a b""#),
            Some(("URL".into(), "https://x.dev/a b".into()))
        );
        assert_eq!(
            parse_export_line(r#"declare -x Q="say \"hi\" \$HOME""#),
            Some(("Q".into(), r#"say "hi" $HOME"#.into()))
        );
        assert_eq!(
            parse_export_line("export NAME='it'\\''s'"),
            Some(("NAME".into(), "it's".into()))
        );
        assert_eq!(parse_export_line("declare -x ONLY_DECLARED"), None);
        assert_eq!(parse_export_line("echo hi"), None);
    }

    #[test]
    fn test_parse_ansi_c_quoted_values() {
        assert_eq!(
            parse_export_line(r"declare -x NOTES=$'line1\nline2'"),
            Some(("NOTES".into(), "line1\nline2".into()))
        );
        assert_eq!(
            parse_export_line(r#"declare -x MIX=$'a\tb \\ it\'s \"q\" \101\x42\u00e9'"#),
            Some(("MIX".into(), "a\tb \\ it's \"q\" AB\u{e9}".into()))
        );
        assert_eq!(
            parse_export_line(r"declare -x BELL=$'\a\e[0m\cA'"),
            Some(("BELL".into(), "\u{7}\u{1b}[0m\u{1}".into()))
        );
    }

    #[test]
    fn test_diff_joins_values_spanning_lines() {
        let pre = "declare -x HOME=\"/root\"\n";
        let post = "declare -x HOME=\"/root\"\ndeclare -x NOTES=\"one\ntwo\"\ndeclare -x NEXT=\"x\"\n";
        let exports = diff_exports(pre, post);
        assert_eq!(exports["NOTES"], "one\ntwo");
        assert_eq!(exports["NEXT"], "x");
        assert!(!exports.contains_key("HOME"));
    }

    #[test]
    fn test_diff_keeps_new_and_changed_variables() {
        let pre = "declare -x HOME=\"/root\"\ndeclare -x MODE=\"dev\"\n";
        let post = "declare -x HOME=\"/root\"\ndeclare -x MODE=\"prod\"\ndeclare -x TOKEN=\"abc\"\n";
        let exports = diff_exports(pre, post);
        assert_eq!(exports.len(), 2);
        assert_eq!(exports["MODE"], "prod");
        assert_eq!(exports["TOKEN"], "abc");
    }

    #[test]
    fn test_read_exports_without_snapshot_is_empty() {
        let dir = tempdir().unwrap();
        let exports = read_exports(&dir.path().join("pre"), &dir.path().join("post"));
        assert!(exports.is_empty());
    }

    #[test]
    fn test_write_if_changed_skips_identical_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runtime.sh");
        assert!(write_if_changed(&path, b"echo one", true).unwrap());
        assert!(!write_if_changed(&path, b"echo one", true).unwrap());
        assert!(write_if_changed(&path, b"echo two", true).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo two");
    }

    #[cfg(unix)]
    #[test]
    fn test_runtime_is_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = prepare_runtime(dir.path()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_bundled_scripts_replace_stale_files() {
        let dir = tempdir().unwrap();
        let bundled = dir.path().join(BUNDLED_DIR_NAME);
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("removed-long-ago.sh"), "echo old").unwrap();

        let prepared = prepare_bundled_scripts(dir.path()).unwrap();
        assert_eq!(prepared, bundled);
        assert!(!bundled.join("removed-long-ago.sh").exists());
        assert_eq!(
            fs::read_dir(&bundled).unwrap().count(),
            BUNDLED_SCRIPTS.len()
        );
    }

    #[test]
    fn test_every_script_in_the_scripts_dir_is_embedded() {
        let scripts_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scripts");
        let mut on_disk: Vec<String> = fs::read_dir(scripts_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        on_disk.sort();
        let embedded: Vec<String> = BUNDLED_SCRIPTS.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(on_disk, embedded);
    }
}
