// ─── Launch Task ───
// Runs the assembled launch plan, either through an in-process host or as a
// child JVM.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};

use super::classpath::{join_classpath, safe_path_str};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Load the classpath into a host-provided class loader.
    Classloader,
    /// Spawn `java -cp ...` as a child process.
    Subprocess,
}

/// Everything needed to start the game.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub classpath: Vec<PathBuf>,
    pub natives_dir: PathBuf,
    /// Game arguments, passed after the main class.
    pub argv: Vec<String>,
    pub jvm_args: Vec<String>,
    pub main_class: String,
    pub mode: LaunchMode,
    pub game_directory: PathBuf,
    pub start_on_first_thread: bool,
}

/// A runtime able to load a classpath and invoke the entry point itself.
#[async_trait]
pub trait InProcessHost: Send + Sync {
    async fn run(&self, plan: &LaunchPlan) -> LauncherResult<()>;
}

/// Full argument list for the child JVM, excluding the java binary.
pub fn subprocess_args(plan: &LaunchPlan) -> LauncherResult<Vec<String>> {
    let mut args = vec![format!(
        "-Djava.library.path={}",
        safe_path_str(&plan.natives_dir)
    )];
    if plan.start_on_first_thread {
        args.push("-XstartOnFirstThread".to_string());
    }
    args.extend(
        plan.jvm_args
            .iter()
            .filter(|a| !(plan.start_on_first_thread && *a == "-XstartOnFirstThread"))
            .filter(|a| !a.starts_with("-Djava.library.path="))
            .cloned(),
    );

    args.push("-cp".to_string());
    args.push(join_classpath(&plan.classpath)?);
    args.push(plan.main_class.clone());
    args.extend(plan.argv.iter().cloned());
    Ok(args)
}

/// Dispatch the plan. Classloader plans without a host run as a subprocess.
pub async fn launch(
    plan: &LaunchPlan,
    java_bin: &Path,
    host: Option<&dyn InProcessHost>,
) -> LauncherResult<()> {
    match (plan.mode, host) {
        (LaunchMode::Classloader, Some(host)) => {
            info!("Handing {} to the in-process host", plan.main_class);
            host.run(plan).await
        }
        (LaunchMode::Classloader, None) => {
            info!("No in-process host available, launching as a subprocess");
            run_subprocess(plan, java_bin).await
        }
        (LaunchMode::Subprocess, _) => run_subprocess(plan, java_bin).await,
    }
}

async fn run_subprocess(plan: &LaunchPlan, java_bin: &Path) -> LauncherResult<()> {
    let args = subprocess_args(plan)?;

    if let Err(e) = tokio::fs::create_dir_all(&plan.game_directory).await {
        return Err(LauncherError::io(&plan.game_directory, e));
    }

    let mut cmd = Command::new(java_bin);
    cmd.args(&args)
        .current_dir(&plan.game_directory)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    configure_native_library_env(&mut cmd, &plan.natives_dir);

    info!("Launching {} with Java: {:?}", plan.main_class, java_bin);
    debug!(
        "Command (copy/paste): {}",
        format_command_for_logs(&java_bin.to_string_lossy(), &args)
    );

    let mut child = cmd
        .spawn()
        .map_err(|e| LauncherError::JavaExecution(e.to_string()))?;

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => info!(target: "game", "{}", line),
                Ok(None) => break,
                Err(e) => {
                    warn!("Stopped reading game output: {}", e);
                    break;
                }
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| LauncherError::JavaExecution(e.to_string()))?;
    if status.success() {
        info!("Game exited with {}", status);
    } else {
        warn!("Game exited with {}", status);
    }
    Ok(())
}

fn configure_native_library_env(cmd: &mut Command, natives_dir: &Path) {
    let native_path = safe_path_str(natives_dir);

    if cfg!(target_os = "windows") {
        cmd.env("PATH", append_env_path("PATH", &native_path));
    } else if cfg!(target_os = "linux") {
        cmd.env("LD_LIBRARY_PATH", append_env_path("LD_LIBRARY_PATH", &native_path));
    } else if cfg!(target_os = "macos") {
        cmd.env(
            "DYLD_LIBRARY_PATH",
            append_env_path("DYLD_LIBRARY_PATH", &native_path),
        );
    }
}

fn append_env_path(var_name: &str, value: &str) -> String {
    let separator = if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    };
    match std::env::var(var_name) {
        Ok(existing) if !existing.trim().is_empty() => {
            format!("{}{}{}", value, separator, existing)
        }
        _ => value.to_string(),
    }
}

fn format_command_for_logs(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(shell_escape)
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn plan(mode: LaunchMode) -> LaunchPlan {
        LaunchPlan {
            classpath: vec![
                PathBuf::from("/nonexistent/lib.jar"),
                PathBuf::from("/nonexistent/client.jar"),
            ],
            natives_dir: PathBuf::from("/nonexistent/natives"),
            argv: vec!["--username".into(), "Alex".into()],
            jvm_args: vec![
                "-Djava.library.path=/elsewhere".into(),
                "-Dlog4j2.formatMsgNoLookups=true".into(),
            ],
            main_class: "net.minecraft.client.main.Main".into(),
            mode,
            game_directory: PathBuf::from("/nonexistent/game"),
            start_on_first_thread: true,
        }
    }

    #[test]
    fn subprocess_argv_order() {
        let args = subprocess_args(&plan(LaunchMode::Subprocess)).unwrap();
        let sep = super::super::classpath::get_classpath_separator();
        assert_eq!(
            args,
            vec![
                "-Djava.library.path=/nonexistent/natives".to_string(),
                "-XstartOnFirstThread".to_string(),
                "-Dlog4j2.formatMsgNoLookups=true".to_string(),
                "-cp".to_string(),
                format!("/nonexistent/lib.jar{sep}/nonexistent/client.jar"),
                "net.minecraft.client.main.Main".to_string(),
                "--username".to_string(),
                "Alex".to_string(),
            ]
        );
    }

    #[test]
    fn empty_classpath_fails_before_spawn() {
        let mut plan = plan(LaunchMode::Subprocess);
        plan.classpath.clear();
        assert!(subprocess_args(&plan).is_err());
    }

    struct CountingHost(AtomicUsize);

    #[async_trait]
    impl InProcessHost for CountingHost {
        async fn run(&self, plan: &LaunchPlan) -> LauncherResult<()> {
            assert_eq!(plan.classpath.len(), 2);
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn classloader_plan_goes_to_host() {
        let host = CountingHost(AtomicUsize::new(0));
        launch(
            &plan(LaunchMode::Classloader),
            Path::new("/nonexistent/java"),
            Some(&host),
        )
        .await
        .unwrap();
        assert_eq!(host.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_java_is_an_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = plan(LaunchMode::Classloader);
        plan.game_directory = dir.path().join("game");
        let err = launch(&plan, Path::new("/nonexistent/java"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::JavaExecution(_)));
    }

    #[test]
    fn shell_escape_quotes_spaces() {
        assert_eq!(shell_escape("a b"), "\"a b\"");
        assert_eq!(shell_escape("-Xmx2G"), "-Xmx2G");
    }
}
