//! systemd-timesyncd adapter
//!
//! Reads and rewrites the `NTP=` / `FallbackNTP=` declarations of
//! `timesyncd.conf` and parses `timedatectl` output.
//!
//! File format rules:
//! - a line prefixed with `#` is a declaration that is administratively disabled
//! - if a key is declared more than once, the last line wins
//! - a value may list several servers separated by whitespace or commas, the
//!   first one is the effective server

use crate::types::{NtpConfig, TimesyncDiagnostics};
use anyhow::{Context, Result, bail};
use log::info;
use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

const PRIMARY_KEY: &str = "NTP=";
const FALLBACK_KEY: &str = "FallbackNTP=";
const TIME_SECTION: &str = "[Time]";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NtpDeclaration {
    pub server: String,
    pub commented: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerDeclarations {
    pub primary: Option<NtpDeclaration>,
    pub fallback: Option<NtpDeclaration>,
}

enum DeclarationKey {
    Primary,
    Fallback,
}

/// Classify a line as a (possibly commented) server declaration.
fn declaration(line: &str) -> Option<(DeclarationKey, bool, &str)> {
    let trimmed = line.trim_start();
    let uncommented = trimmed.trim_start_matches('#').trim_start();
    let commented = uncommented.len() != trimmed.len();

    if let Some(value) = uncommented.strip_prefix(PRIMARY_KEY) {
        Some((DeclarationKey::Primary, commented, value))
    } else if let Some(value) = uncommented.strip_prefix(FALLBACK_KEY) {
        Some((DeclarationKey::Fallback, commented, value))
    } else {
        None
    }
}

fn first_server(value: &str) -> Option<String> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

pub fn parse_declarations(content: &str) -> ServerDeclarations {
    let mut declarations = ServerDeclarations::default();

    for line in content.lines() {
        let Some((key, commented, value)) = declaration(line) else {
            continue;
        };
        let parsed = first_server(value).map(|server| NtpDeclaration { server, commented });
        match key {
            DeclarationKey::Primary => declarations.primary = parsed,
            DeclarationKey::Fallback => declarations.fallback = parsed,
        }
    }

    declarations
}

fn declaration_line(key: &str, server: &str, commented: bool) -> Option<String> {
    let server = server.trim();
    if server.is_empty() {
        return None;
    }
    let prefix = if commented { "#" } else { "" };
    Some(format!("{prefix}{key}{server}"))
}

/// Replace every primary/fallback declaration by the requested ones.
///
/// All other lines are kept verbatim. The new lines are placed at the end of the
/// `[Time]` section, which is created if missing.
pub fn rewrite_declarations(content: &str, config: &NtpConfig) -> String {
    let mut lines: Vec<String> = content
        .lines()
        .filter(|line| declaration(line).is_none())
        .map(str::to_string)
        .collect();

    let new_lines: Vec<String> = [
        declaration_line(
            PRIMARY_KEY,
            &config.primary_server,
            config.primary_commented,
        ),
        declaration_line(
            FALLBACK_KEY,
            &config.fallback_server,
            config.fallback_commented,
        ),
    ]
    .into_iter()
    .flatten()
    .collect();

    let section_start = lines.iter().position(|line| line.trim() == TIME_SECTION);

    let insert_at = match section_start {
        Some(start) => {
            let section_end = lines[start + 1..]
                .iter()
                .position(|line| line.trim_start().starts_with('['))
                .map_or(lines.len(), |offset| start + 1 + offset);
            // keep blank separator lines after the declarations
            let mut insert_at = section_end;
            while insert_at > start + 1 && lines[insert_at - 1].trim().is_empty() {
                insert_at -= 1;
            }
            insert_at
        }
        None => {
            if lines.last().is_some_and(|line| !line.trim().is_empty()) {
                lines.push(String::new());
            }
            lines.push(TIME_SECTION.to_string());
            lines.len()
        }
    };

    lines.splice(insert_at..insert_at, new_lines);

    let mut rewritten = lines.join("\n");
    rewritten.push('\n');
    rewritten
}

/// Upper bound on the uniqueness suffix appended to a clashing backup name.
const MAX_BACKUP_SUFFIX: u32 = 100;

/// Copy `path` to a timestamped `.bak` file in `dir`, or next to `path`.
///
/// An existing backup is never overwritten. Returns the backup path, or `None`
/// if there was nothing to back up.
pub fn backup(path: &Path, dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let mut source = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context(format!("failed to open {path:?}")),
    };

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("failed to get system time")?
        .as_nanos();
    let file_name = path
        .file_name()
        .context(format!("{path:?} has no file name"))?;
    let dir = dir.or_else(|| path.parent()).unwrap_or(Path::new("."));

    for suffix in 0..MAX_BACKUP_SUFFIX {
        let mut name = file_name.to_owned();
        match suffix {
            0 => name.push(format!(".{timestamp}.bak")),
            n => name.push(format!(".{timestamp}.{n}.bak")),
        }
        let backup = dir.join(name);

        let mut target = match OpenOptions::new().write(true).create_new(true).open(&backup) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e).context(format!("failed to create {backup:?}")),
        };

        io::copy(&mut source, &mut target)
            .context(format!("failed to copy {path:?} to {backup:?}"))?;
        info!("backed up {path:?} to {backup:?}");
        return Ok(Some(backup));
    }

    bail!("no free backup name for {path:?} in {dir:?}")
}

/// Read the config file, an absent file has no declarations.
pub fn read_config(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).context(format!("failed to read {path:?}")),
    }
}

pub fn write_config(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).context(format!("failed to write {path:?}"))
}

/// `KEY=value` lines printed by `timedatectl show`.
pub fn parse_properties(stdout: &str) -> HashMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// `Key: value` lines printed by `timedatectl timesync-status`.
///
/// Only the fields needed for the diagnostic are extracted. `last_sync` is not
/// part of this output and stays `None`.
pub fn parse_timesync_status(stdout: &str) -> TimesyncDiagnostics {
    let mut diagnostics = TimesyncDiagnostics::default();

    for line in stdout.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "Server" => {
                // "192.0.2.10 (time.example.org)"
                let server = match value.split_once('(') {
                    Some((_, name)) => name.trim_end_matches(')').trim(),
                    None => value,
                };
                diagnostics.server = Some(server.to_string());
            }
            "Stratum" => diagnostics.stratum = value.parse().ok(),
            "Offset" => diagnostics.offset = Some(value.to_string()),
            "Poll interval" => {
                let interval = value.split_once(" (").map_or(value, |(interval, _)| interval);
                diagnostics.poll_interval = Some(interval.trim().to_string());
            }
            _ => {}
        }
    }

    diagnostics
}

pub fn is_yes(value: Option<&String>) -> bool {
    value.is_some_and(|value| value == "yes")
}
