//! Parser for the plan document format described in §6.1.
//!
//! A plan is a `# Title` heading, a `## Goal` section of free text, and one
//! `##`/`###` section per step. Each step section carries `**Content**`,
//! `**Files**`, and `**Success Criteria**` sub-blocks, plus an optional
//! `**Depends on**` sub-block naming earlier step titles. A `**Files**` line
//! may be a literal path or a glob, expanded against the workspace root.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::plan::{Plan, PlanStep};

const MIN_SUCCESS_CRITERIA: usize = 2;
const MAX_SUCCESS_CRITERIA: usize = 5;

/// Parse a full plan document into a [`Plan`] (§4.5).
///
/// Rejects with `InvalidPlan` when the document has no steps, or any step
/// has a success-criteria count outside `2..=5`. Glob entries in a step's
/// `**Files**` block are expanded against `workspace`; literal paths are
/// kept as-is even when the file does not exist yet (a step may create it).
pub fn parse(document: &str, workspace: &Path) -> CoreResult<Plan> {
    let lines: Vec<&str> = document.lines().collect();
    let headings = collect_headings(&lines);

    let title = headings
        .iter()
        .find(|h| h.level == 1)
        .map(|h| h.text.clone())
        .unwrap_or_else(|| "Untitled Plan".to_string());

    let goal_heading = headings.iter().find(|h| h.level >= 2 && h.text.eq_ignore_ascii_case("goal"));
    let goal = match goal_heading {
        Some(h) => body_between(&lines, h.line, next_heading_line(&headings, h.line)).join("\n").trim().to_string(),
        None => String::new(),
    };

    let step_headings: Vec<&Heading> = headings
        .iter()
        .filter(|h| h.level >= 2 && !h.text.eq_ignore_ascii_case("goal"))
        .collect();

    if step_headings.is_empty() {
        return Err(CoreError::InvalidPlan("plan has no steps".into()));
    }

    let mut titles_seen: Vec<String> = Vec::new();
    let mut steps = Vec::with_capacity(step_headings.len());

    for (i, heading) in step_headings.iter().enumerate() {
        let index = i + 1;
        let end = next_heading_line(&headings, heading.line);
        let body = body_between(&lines, heading.line, end);
        let sub_blocks = collect_sub_blocks(&body);

        let content = sub_blocks.get("content").cloned().unwrap_or_default().join("\n").trim().to_string();

        let allowlist: Vec<PathBuf> = sub_blocks
            .get("files")
            .map(|lines| {
                lines
                    .iter()
                    .map(|l| strip_bullet(l))
                    .filter(|l| !l.is_empty())
                    .flat_map(|entry| {
                        if is_glob(&entry) {
                            expand_glob(workspace, &entry)
                        } else {
                            vec![PathBuf::from(entry)]
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let success_criteria: Vec<String> = sub_blocks
            .get("success criteria")
            .map(|lines| {
                lines
                    .iter()
                    .map(|l| strip_bullet(l))
                    .filter(|l| !l.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if success_criteria.len() < MIN_SUCCESS_CRITERIA || success_criteria.len() > MAX_SUCCESS_CRITERIA {
            return Err(CoreError::InvalidPlan(format!(
                "step \"{}\" has {} success criteria, expected 2-5",
                heading.text,
                success_criteria.len()
            )));
        }

        let dependencies: Vec<usize> = sub_blocks
            .get("depends on")
            .map(|lines| {
                lines
                    .iter()
                    .flat_map(|l| strip_bullet(l).split(',').map(|s| s.trim().to_string()).collect::<Vec<_>>())
                    .filter(|name| !name.is_empty())
                    .filter_map(|name| titles_seen.iter().position(|t| t.eq_ignore_ascii_case(&name)).map(|pos| pos + 1))
                    .collect()
            })
            .unwrap_or_default();

        titles_seen.push(heading.text.clone());
        steps.push(PlanStep {
            index,
            title: heading.text.clone(),
            content,
            allowlist,
            success_criteria,
            dependencies,
        });
    }

    Ok(Plan {
        id: slugify(&title),
        title,
        goal,
        steps,
    })
}

struct Heading {
    level: u8,
    text: String,
    line: usize,
}

fn collect_headings(lines: &[&str]) -> Vec<Heading> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("### ") {
                Some(Heading { level: 3, text: rest.trim().to_string(), line: i })
            } else if let Some(rest) = trimmed.strip_prefix("## ") {
                Some(Heading { level: 2, text: rest.trim().to_string(), line: i })
            } else if let Some(rest) = trimmed.strip_prefix("# ") {
                Some(Heading { level: 1, text: rest.trim().to_string(), line: i })
            } else {
                None
            }
        })
        .collect()
}

fn next_heading_line(headings: &[Heading], after: usize) -> usize {
    headings
        .iter()
        .map(|h| h.line)
        .find(|&l| l > after)
        .unwrap_or(usize::MAX)
}

fn body_between<'a>(lines: &'a [&'a str], start: usize, end: usize) -> Vec<&'a str> {
    let end = end.min(lines.len());
    lines[start + 1..end].to_vec()
}

/// Split a step body into sub-blocks keyed by lowercased `**Label**` markers.
fn collect_sub_blocks(body: &[&str]) -> std::collections::HashMap<String, Vec<String>> {
    let mut blocks = std::collections::HashMap::new();
    let mut current: Option<String> = None;
    for line in body {
        let trimmed = line.trim();
        if let Some(label) = parse_label(trimmed) {
            current = Some(label);
            continue;
        }
        if let Some(key) = &current {
            if !trimmed.is_empty() {
                blocks.entry(key.clone()).or_insert_with(Vec::new).push(trimmed.to_string());
            }
        }
    }
    blocks
}

fn parse_label(trimmed: &str) -> Option<String> {
    let stripped = trimmed.strip_prefix("**")?.strip_suffix("**")?;
    Some(stripped.trim().to_lowercase())
}

fn strip_bullet(line: &str) -> String {
    line.trim()
        .trim_start_matches("- ")
        .trim_start_matches("* ")
        .trim()
        .to_string()
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

fn is_glob(entry: &str) -> bool {
    entry.contains('*') || entry.contains('?') || entry.contains('[')
}

/// Expand a `/`-separated glob (segments may use `*`/`?`, and `**` matches
/// zero or more directories) against files that exist under `workspace`.
fn expand_glob(workspace: &Path, pattern: &str) -> Vec<PathBuf> {
    let segments: Vec<&str> = pattern.split('/').collect();
    let mut matches = Vec::new();
    walk_glob(workspace, workspace, &segments, &mut matches);
    matches.sort();
    matches
}

fn walk_glob(workspace: &Path, current: &Path, segments: &[&str], out: &mut Vec<PathBuf>) {
    let (segment, rest) = match segments.split_first() {
        Some(parts) => parts,
        None => return,
    };

    if *segment == "**" {
        walk_glob(workspace, current, rest, out);
        if let Ok(entries) = std::fs::read_dir(current) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk_glob(workspace, &path, segments, out);
                }
            }
        }
        return;
    }

    let entries = match std::fs::read_dir(current) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !glob_match_segment(segment, &name) {
            continue;
        }
        if rest.is_empty() {
            if path.is_file() {
                if let Ok(relative) = path.strip_prefix(workspace) {
                    out.push(relative.to_path_buf());
                }
            }
        } else if path.is_dir() {
            walk_glob(workspace, &path, rest, out);
        }
    }
}

/// Match one path segment against a pattern using `*` (any run of
/// characters) and `?` (exactly one character).
fn glob_match_segment(pattern: &str, name: &str) -> bool {
    fn helper(pattern: &[u8], name: &[u8]) -> bool {
        match (pattern.first(), name.first()) {
            (None, None) => true,
            (Some(b'*'), _) => helper(&pattern[1..], name) || (!name.is_empty() && helper(pattern, &name[1..])),
            (Some(b'?'), Some(_)) => helper(&pattern[1..], &name[1..]),
            (Some(p), Some(n)) if p == n => helper(&pattern[1..], &name[1..]),
            _ => false,
        }
    }
    helper(pattern.as_bytes(), name.as_bytes())
}
