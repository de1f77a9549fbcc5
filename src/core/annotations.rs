// src/core/annotations.rs

use crate::constants::ANNOTATION_NAMESPACE;
use crate::models::{
    Requirement, Script, ScriptArg, ScriptId, ScriptOpt, ScriptOrigin, StdinMode,
};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref ARG_RE: Regex = namespaced(r"arg[ \t]+(?P<name>[A-Za-z0-9_]+)[ \t]+(?P<description>.+)$");
    static ref OPT_RE: Regex = namespaced(r"opt[ \t]+(?P<json>.+)$");
    static ref REQUIRES_RE: Regex = namespaced(r"requires[ \t]+(?P<tokens>.+)$");
}

/// Builds a multi-line regex for `@<namespace>.<rest>`.
/// The patterns are literals, so a failure here is a programming error caught by the tests.
#[allow(clippy::panic)]
fn namespaced(rest: &str) -> Regex {
    let pattern = format!(r"(?m)@{}\.{}", regex::escape(ANNOTATION_NAMESPACE), rest);
    Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid annotation regex {}: {}", pattern, e))
}

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("Invalid option in '{path}': {source}\n  -> {json}")]
    InvalidOption {
        path: String,
        json: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Dependency '{reference}' in '{path}' uses a parent directory reference, which is not allowed")]
    ParentReference { path: String, reference: String },
    #[error("Option '{option}' in '{path}' uses base directory argument '{arg}', which the script does not declare")]
    UnknownBaseDirArg {
        path: String,
        option: String,
        arg: String,
    },
}

/// Returns the trimmed value of the first `@vercel.<field> <value>` line, if any.
pub fn read_field(content: &str, field: &str) -> Option<String> {
    let pattern = format!(
        r"(?m)@{}\.{}[ \t]+(.+)$",
        regex::escape(ANNOTATION_NAMESPACE),
        regex::escape(field)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Every `@vercel.arg NAME description` line, in file order.
pub fn read_args(content: &str) -> Vec<ScriptArg> {
    ARG_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let name = caps.name("name")?.as_str().to_string();
            let description = caps.name("description")?.as_str().trim().to_string();
            Some(ScriptArg { name, description })
        })
        .collect()
}

/// Every `@vercel.opt {json}` line, in file order. The first malformed payload fails the script.
pub fn read_opts(content: &str, path: &str) -> Result<Vec<ScriptOpt>, AnnotationError> {
    OPT_RE
        .captures_iter(content)
        .filter_map(|caps| caps.name("json"))
        .map(|json| {
            let json = json.as_str().trim();
            serde_json::from_str::<ScriptOpt>(json).map_err(|source| AnnotationError::InvalidOption {
                path: path.to_string(),
                json: json.to_string(),
                source,
            })
        })
        .collect()
}

/// Every `@vercel.requires <script> VAR...` line, in file order.
pub fn read_requires(content: &str, path: &str) -> Result<Vec<Requirement>, AnnotationError> {
    let mut requirements = Vec::new();
    for caps in REQUIRES_RE.captures_iter(content) {
        let Some(tokens) = caps.name("tokens") else {
            continue;
        };
        let mut tokens = tokens.as_str().split_whitespace();
        let Some(script) = tokens.next() else {
            continue;
        };
        requirements.push(Requirement {
            script: normalize_reference(script, path)?,
            variables: tokens.map(str::to_string).collect(),
        });
    }
    Ok(requirements)
}

/// Space-separated `@vercel.after` references, normalized.
pub fn read_after(content: &str, path: &str) -> Result<Vec<String>, AnnotationError> {
    let mut names: Vec<String> = Vec::new();
    for token in read_field(content, "after").unwrap_or_default().split_whitespace() {
        let name = normalize_reference(token, path)?;
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

pub fn read_stdin_mode(content: &str) -> StdinMode {
    match read_field(content, "stdin").as_deref() {
        Some("inherit") => StdinMode::Inherit,
        _ => StdinMode::Captured,
    }
}

/// Strips a leading `./` and rejects references that climb out of the script's directory.
fn normalize_reference(reference: &str, path: &str) -> Result<String, AnnotationError> {
    if reference.starts_with("../") {
        return Err(AnnotationError::ParentReference {
            path: path.to_string(),
            reference: reference.to_string(),
        });
    }
    Ok(reference
        .strip_prefix("./")
        .unwrap_or(reference)
        .to_string())
}

/// Parses a script's text into a validated `Script`.
///
/// A missing `name` annotation falls back to the file name. Options are checked against
/// the script's own arguments, so a worktree option always points at a declared argument.
pub fn parse_script(
    content: &str,
    id: ScriptId,
    origin: ScriptOrigin,
) -> Result<Script, AnnotationError> {
    let path = id.to_string();
    log::trace!("Parsing annotations of {}", path);

    let args = read_args(content);
    let opts = read_opts(content, &path)?;
    for opt in &opts {
        if let ScriptOpt::Worktree { name, base_dir_arg, .. } = opt
            && !args.iter().any(|arg| &arg.name == base_dir_arg)
        {
            return Err(AnnotationError::UnknownBaseDirArg {
                path,
                option: name.clone(),
                arg: base_dir_arg.clone(),
            });
        }
    }

    let script = Script {
        name: read_field(content, "name").unwrap_or_else(|| id.file_name().to_string()),
        description: read_field(content, "description"),
        dependency_names: read_after(content, &path)?,
        requires: read_requires(content, &path)?,
        stdin_mode: read_stdin_mode(content),
        origin,
        args,
        opts,
        id,
    };

    log::debug!(
        "Parsed '{}': {} args, {} opts, after {:?}, {} requirement(s)",
        script.name,
        script.args.len(),
        script.opts.len(),
        script.dependency_names,
        script.requires.len()
    );
    Ok(script)
}
