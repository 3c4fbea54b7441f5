//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{Settings, TELEGRAM_TOKEN_ENV, YOUTUBE_API_KEY_ENV};
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Shazbot Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    let ytdlp = check_tool(&settings.extractor.binary, "--version", install_hint_ytdlp());
    let ffmpeg = match check_tool("ffmpeg", "-version", install_hint_ffmpeg()) {
        // Only needed when converting to MP3
        missing if missing.status == CheckStatus::Error && !settings.extractor.convert_to_mp3 => {
            CheckResult::warning("ffmpeg", "not found (not needed)", install_hint_ffmpeg())
        }
        found => found,
    };
    for check in [ytdlp, ffmpeg] {
        check.print();
        checks.push(check);
    }

    println!();

    println!("{}", style("Secrets").bold());
    let secrets = [
        check_secret(YOUTUBE_API_KEY_ENV, settings.youtube_api_key()),
        check_secret(TELEGRAM_TOKEN_ENV, settings.telegram_token()),
    ];
    for check in secrets {
        check.print();
        checks.push(check);
    }

    println!();

    println!("{}", style("Directories").bold());
    let dir_check = check_download_dir(&settings.download_dir());
    dir_check.print();
    checks.push(dir_check);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path);
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before running the bot.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Shazbot is ready to run.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, version_arg: &str, hint: &str) -> CheckResult {
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            // Truncate long version strings
            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else {
                version
            };

            CheckResult::ok(name, &version_display)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check a resolved secret, showing only its edges.
fn check_secret(name: &str, value: crate::Result<String>) -> CheckResult {
    match value {
        Ok(secret) => CheckResult::ok(name, &format!("configured ({})", mask(&secret))),
        Err(_) => CheckResult::error(
            name,
            "not set",
            &format!("Set with: export {}='...' (or in the config file)", name),
        ),
    }
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check the download directory and report leftover audio.
fn check_download_dir(dir: &Path) -> CheckResult {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return CheckResult::warning(
            "Download directory",
            &format!("{} (will be created)", dir.display()),
            "Directory will be created when the bot starts",
        );
    };

    let (count, bytes) = entries
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "mp3"))
        .filter_map(|e| e.metadata().ok())
        .fold((0usize, 0u64), |(n, total), meta| (n + 1, total + meta.len()));

    CheckResult::ok(
        "Download directory",
        &format!("{} ({} pending files, {})", dir.display(), count, format_size(bytes)),
    )
}

/// Check if the config file in use exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            &format!("Create {} to override defaults", config_path.display()),
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}
