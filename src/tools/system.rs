//! System capabilities: clock, shell commands, applications, host info

use std::time::{Duration, Instant};

use chrono::Local;

/// Hard deadline for `run_command`
const COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

/// Character cap for command output
const COMMAND_CHAR_LIMIT: usize = 2_000;

/// Substrings that disqualify a shell command outright
const BLOCKED_COMMANDS: &[&str] = &["rm -rf /", "mkfs", "dd if=", ":(){", "> /dev/sda"];

type ToolOutput = Result<String, String>;

/// Current wall-clock time
pub fn current_time() -> ToolOutput {
    Ok(Local::now()
        .format("Current time: %I:%M %p on %A, %B %d, %Y")
        .to_string())
}

/// Current date
pub fn current_date() -> ToolOutput {
    Ok(Local::now().format("Today is %A, %B %d, %Y").to_string())
}

/// Run a shell command with a hard timeout.
///
/// The subprocess is polled and killed past the deadline rather than
/// orphaned, mirroring how the TTS subprocess is supervised.
pub fn run_command(command: &str) -> ToolOutput {
    let lowered = command.to_lowercase();
    if BLOCKED_COMMANDS.iter().any(|b| lowered.contains(b)) {
        return Err("blocked: potentially destructive command".to_string());
    }

    let mut child = std::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| format!("cannot run command: {e}"))?;

    let deadline = Instant::now() + COMMAND_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if Instant::now() > deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!(
                        "command timed out after {}s",
                        COMMAND_TIMEOUT.as_secs()
                    ));
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(format!("command failed: {e}")),
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("command failed: {e}"))?;

    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };

    if text.trim().is_empty() {
        return Ok("Command executed (no output)".to_string());
    }

    let mut text = text;
    if let Some((cut, _)) = text.char_indices().nth(COMMAND_CHAR_LIMIT) {
        text.truncate(cut);
        text.push_str("\n... (truncated)");
    }
    Ok(format!("Command output:\n{text}"))
}

/// Launch an application by name, resolved on `PATH`
pub fn open_app(app_name: &str) -> ToolOutput {
    let binary = which::which(app_name)
        .map_err(|_| format!("application not found on PATH: {app_name}"))?;

    std::process::Command::new(&binary)
        .spawn()
        .map_err(|e| format!("cannot launch {app_name}: {e}"))?;

    Ok(format!("Launched {app_name} ({})", binary.display()))
}

/// Basic host information
pub fn system_info() -> ToolOutput {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    let cpus = std::thread::available_parallelism().map_or(0, std::num::NonZero::get);
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    Ok(format!(
        "System: {} {}\nHost: {host}\nCPU cores: {cpus}\nWorking directory: {cwd}\nTime: {}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        Local::now().format("%I:%M %p on %A, %B %d, %Y"),
    ))
}
