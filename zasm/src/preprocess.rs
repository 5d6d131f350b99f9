//! INCLUDE expansion, run before the lexer ever sees the source.
//!
//! Expansion is purely textual: each `INCLUDE "file"` line is replaced by
//! the file's content, recursively. Failures leave a comment marker in
//! place of the directive so the lines of the including file keep
//! advancing predictably, and are reported alongside.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::diag::Diagnostic;

/// Hard ceiling on include nesting.
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// Stub files below this size are candidates for pseudo-symlink
/// redirection.
const STUB_MAX_LEN: usize = 512;
const STUB_LIMIT: usize = 8;

/// Supplies the content of included files. Injected so expansion is
/// testable without a filesystem.
pub trait IncludeResolver {
    /// Resolve `name` against the including file's directory and the
    /// configured search path. Returns the path nested includes resolve
    /// against, plus the file content.
    fn resolve(
        &self,
        name: &str,
        from_dir: &Path,
        include_paths: &[PathBuf],
    ) -> Option<(PathBuf, String)>;
}

/// The production resolver. Tiny single-line files whose content names an
/// existing file are followed transparently — the surrogate Git checks
/// out in place of a symlink on filesystems without them — while nested
/// includes keep resolving relative to the surrogate's own location.
pub struct FsResolver;

impl IncludeResolver for FsResolver {
    fn resolve(
        &self,
        name: &str,
        from_dir: &Path,
        include_paths: &[PathBuf],
    ) -> Option<(PathBuf, String)> {
        let path = find(name, from_dir, include_paths)?;
        let content = fs::read_to_string(&path).ok()?;
        let content = follow_stubs(&path, content, 0);
        Some((path, content))
    }
}

fn find(name: &str, from_dir: &Path, include_paths: &[PathBuf]) -> Option<PathBuf> {
    let named = PathBuf::from(name);
    if named.is_absolute() {
        return if named.is_file() { Some(named) } else { None };
    }
    let local = from_dir.join(name);
    if local.is_file() {
        return Some(local);
    }
    include_paths
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn follow_stubs(path: &Path, content: String, depth: usize) -> String {
    if depth >= STUB_LIMIT || content.len() >= STUB_MAX_LEN {
        return content;
    }
    let trimmed = content.trim();
    let path_like = !trimmed.is_empty()
        && trimmed.lines().count() == 1
        && !trimmed.contains(char::is_whitespace)
        && !trimmed.contains(';')
        && (trimmed.contains('/') || trimmed.contains('.'));
    if !path_like {
        return content;
    }
    // a real symlink was already followed by the OS when the file was read
    if fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
    {
        return content;
    }
    let target = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(trimmed);
    match fs::read_to_string(&target) {
        Ok(next) => follow_stubs(&target, next, depth + 1),
        Err(_) => content,
    }
}

/// Read an `INCLUDE "file"` / `INCLUDE 'file'` directive off a line,
/// allowing a trailing comment.
fn include_target(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let (keyword, rest) = match trimmed.get(..7) {
        Some(head) => (head, &trimmed[7..]),
        None => return None,
    };
    if !keyword.eq_ignore_ascii_case("include") {
        return None;
    }
    if !rest.starts_with(|c: char| c == ' ' || c == '\t') {
        return None;
    }
    let rest = rest.trim_start();
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let body = &rest[1..];
    let end = body.find(quote)?;
    let tail = body[end + 1..].trim();
    if !tail.is_empty() && !tail.starts_with(';') {
        return None;
    }
    Some(&body[..end])
}

/// Expand all includes. Errors come back as plain message strings, the
/// shape embedders asked for; `Assembler::assemble_file` keeps the
/// structured diagnostics instead.
pub fn preprocess(
    source: &str,
    origin: &Path,
    include_paths: &[PathBuf],
) -> (String, Vec<String>) {
    let (text, diags) = preprocess_with(source, origin, include_paths, &FsResolver);
    (text, diags.iter().map(|d| d.to_string()).collect())
}

pub fn preprocess_with(
    source: &str,
    origin: &Path,
    include_paths: &[PathBuf],
    resolver: &dyn IncludeResolver,
) -> (String, Vec<Diagnostic>) {
    let mut out = String::new();
    let mut errors = Vec::new();
    let mut active = HashSet::new();
    active.insert(canonical(origin));

    expand(
        source,
        origin,
        include_paths,
        resolver,
        0,
        &mut active,
        &mut out,
        &mut errors,
    );

    (out, errors)
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[allow(clippy::too_many_arguments)]
fn expand(
    source: &str,
    current: &Path,
    include_paths: &[PathBuf],
    resolver: &dyn IncludeResolver,
    depth: usize,
    active: &mut HashSet<PathBuf>,
    out: &mut String,
    errors: &mut Vec<Diagnostic>,
) {
    let from_dir = current
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    for (i, line) in source.lines().enumerate() {
        let number = (i + 1) as u32;
        let target = match include_target(line) {
            Some(target) => target,
            None => {
                out.push_str(line);
                out.push('\n');
                continue;
            }
        };

        if depth + 1 >= MAX_INCLUDE_DEPTH {
            errors.push(Diagnostic::error(
                number,
                format!("Includes nested deeper than {} levels", MAX_INCLUDE_DEPTH),
            ));
            out.push_str(&format!("; include skipped (too deep): {}\n", target));
            continue;
        }

        match resolver.resolve(target, &from_dir, include_paths) {
            None => {
                errors.push(Diagnostic::error(
                    number,
                    format!("Include file not found: '{}'", target),
                ));
                out.push_str(&format!("; include not found: {}\n", target));
            }
            Some((path, content)) => {
                let key = canonical(&path);
                if active.contains(&key) {
                    errors.push(Diagnostic::error(
                        number,
                        format!("Circular include of '{}'", target),
                    ));
                    out.push_str(&format!("; include skipped (circular): {}\n", target));
                    continue;
                }
                debug!("including {}", path.display());
                active.insert(key.clone());
                expand(
                    &content,
                    &path,
                    include_paths,
                    resolver,
                    depth + 1,
                    active,
                    out,
                    errors,
                );
                active.remove(&key);
            }
        }
    }
}
