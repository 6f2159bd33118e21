// ─── Launch Arguments ───
// Placeholder substitution and merging of game/JVM argument lists.

use std::path::Path;

use crate::core::platform::Platform;
use crate::core::version::ResolvedVersion;

use super::classpath::{get_classpath_separator, safe_path_str};

pub const LAUNCHER_NAME: &str = "morpheus-launcher";
pub const LAUNCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The player the game is launched for.
#[derive(Debug, Clone)]
pub struct Identity {
    pub username: String,
    pub uuid: String,
    pub session_token: String,
    pub xuid: String,
    pub client_id: Option<String>,
}

impl Identity {
    pub fn new(
        username: impl Into<String>,
        uuid: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            uuid: uuid.into(),
            session_token: session_token.into(),
            xuid: "0".to_string(),
            client_id: None,
        }
    }
}

/// Values available to `${...}` placeholders.
#[derive(Debug, Clone)]
pub struct ArgumentContext<'a> {
    pub identity: &'a Identity,
    pub version_name: &'a str,
    pub version_type: &'a str,
    pub game_directory: &'a Path,
    pub assets_root: &'a Path,
    pub game_assets: &'a Path,
    pub assets_index_name: &'a str,
    pub natives_directory: &'a Path,
    pub library_directory: &'a Path,
}

impl ArgumentContext<'_> {
    /// Placeholder table for game arguments. `None` values stay unresolved.
    fn game_values(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("${auth_player_name}", Some(self.identity.username.clone())),
            ("${auth_session}", Some(self.identity.session_token.clone())),
            ("${version_name}", Some(self.version_name.to_string())),
            ("${game_directory}", Some(safe_path_str(self.game_directory))),
            ("${game_assets}", Some(safe_path_str(self.game_assets))),
            ("${assets_root}", Some(safe_path_str(self.assets_root))),
            ("${assets_index_name}", Some(self.assets_index_name.to_string())),
            ("${auth_uuid}", Some(self.identity.uuid.clone())),
            ("${auth_access_token}", Some(self.identity.session_token.clone())),
            ("${user_type}", Some("msa".to_string())),
            ("${version_type}", Some(self.version_type.to_string())),
            ("${user_properties}", Some("{}".to_string())),
            ("${auth_xuid}", Some(self.identity.xuid.clone())),
            (
                "${clientid}",
                self.identity.client_id.clone().filter(|c| !c.is_empty()),
            ),
        ]
    }

    fn jvm_values(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            (
                "${natives_directory}",
                Some(safe_path_str(self.natives_directory)),
            ),
            (
                "${library_directory}",
                Some(safe_path_str(self.library_directory)),
            ),
            (
                "${classpath_separator}",
                Some(get_classpath_separator().to_string()),
            ),
            ("${launcher_name}", Some(LAUNCHER_NAME.to_string())),
            ("${launcher_version}", Some(LAUNCHER_VERSION.to_string())),
            ("${version_name}", Some(self.version_name.to_string())),
        ]
    }
}

fn substitute(raw: &str, values: &[(&'static str, Option<String>)]) -> String {
    values
        .iter()
        .fold(raw.to_string(), |acc, (key, value)| match value {
            Some(value) => acc.replace(key, value),
            None => acc,
        })
}

fn drop_dangling_option(args: &mut Vec<String>) {
    if args.last().is_some_and(|last| last.starts_with('-')) {
        let _ = args.pop();
    }
}

/// An option that takes the following token as its value.
fn takes_value(arg: &str) -> bool {
    arg.starts_with('-') && !arg.contains('=') && !arg.starts_with("-D") && !arg.starts_with("-X")
}

/// Substitute every token, dropping the ones that stay unresolved.
fn resolve_tokens(raw: &[String], values: &[(&'static str, Option<String>)]) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::with_capacity(raw.len());
    for arg in raw {
        let value = substitute(arg, values);
        if value.contains("${") {
            // A self-contained option goes alone; a bare value takes its option with it.
            let bare_value = !value.starts_with('-');
            if bare_value && resolved.last().is_some_and(|last| takes_value(last)) {
                drop_dangling_option(&mut resolved);
            }
            continue;
        }
        resolved.push(value);
    }
    resolved
}

/// The first manifest of the chain is taken as-is; later ones only add new tokens.
fn merge_chain(parts: impl Iterator<Item = Vec<String>>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for (position, part) in parts.enumerate() {
        if position == 0 {
            merged.extend(part);
            continue;
        }
        for arg in part {
            if !merged.contains(&arg) {
                merged.push(arg);
            }
        }
    }
    merged
}

/// Game arguments of the chain: parent first, loader arguments appended.
pub fn game_arguments(
    resolved: &ResolvedVersion,
    platform: &Platform,
    ctx: &ArgumentContext<'_>,
) -> Vec<String> {
    let values = ctx.game_values();
    merge_chain(
        resolved
            .chain()
            .map(|manifest| resolve_tokens(&manifest.game_arguments(platform), &values)),
    )
}

/// Structured JVM arguments of the chain, without any manifest-provided classpath.
/// Repeatable options such as `--add-opens` are merged as option/value pairs.
pub fn jvm_arguments(
    resolved: &ResolvedVersion,
    platform: &Platform,
    ctx: &ArgumentContext<'_>,
) -> Vec<String> {
    let values = ctx.jvm_values();
    let mut merged: Vec<Vec<String>> = Vec::new();
    for (position, manifest) in resolved.chain().enumerate() {
        let units = option_units(resolve_tokens(
            &strip_classpath(manifest.jvm_arguments(platform)),
            &values,
        ));
        if position == 0 {
            merged.extend(units);
            continue;
        }
        for unit in units {
            if !merged.contains(&unit) {
                merged.push(unit);
            }
        }
    }
    merged.into_iter().flatten().collect()
}

/// Group a flat list into options, each with its value when it takes one.
fn option_units(args: Vec<String>) -> Vec<Vec<String>> {
    let mut units = Vec::with_capacity(args.len());
    let mut iter = args.into_iter().peekable();
    while let Some(arg) = iter.next() {
        let mut unit = vec![arg];
        if takes_value(&unit[0]) {
            if let Some(value) = iter.next_if(|next| !next.starts_with('-')) {
                unit.push(value);
            }
        }
        units.push(unit);
    }
    units
}

fn strip_classpath(raw: Vec<String>) -> Vec<String> {
    let mut kept = Vec::with_capacity(raw.len());
    let mut iter = raw.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "-cp" || arg == "-classpath" || arg == "--class-path" {
            let _ = iter.next();
            continue;
        }
        kept.push(arg);
    }
    kept
}
