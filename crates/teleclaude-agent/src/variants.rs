//! Command construction for the three agent CLI variants.
//!
//! The daemon does not call these binaries as a piped one-shot process —
//! each session's terminal pane already runs an interactive shell (Terminal
//! Bridge), and starting or resuming an agent means sending a single command
//! line into that pane via `TerminalManager::send_text`. This module builds
//! that line; it never spawns a process itself.

use shell_escape::escape;
use std::borrow::Cow;

use teleclaude_core::types::{AgentVariant, ThinkingMode};

/// A resume handle for an agent CLI's own continuation mechanism.
/// Corresponds to `Session.native_session_id`.
#[derive(Debug, Clone)]
pub struct ResumeHandle(pub String);

/// Parameters shared by every variant's invocation.
#[derive(Debug, Clone)]
pub struct SpawnParams {
    pub project_dir: String,
    pub thinking_mode: ThinkingMode,
    pub resume: Option<ResumeHandle>,
}

/// Builds the shell command line for one agent CLI variant.
pub trait AgentCli {
    fn variant(&self) -> AgentVariant;

    /// The command line to type into a freshly-spawned shell pane to start
    /// or resume an agent session there.
    fn command_line(&self, params: &SpawnParams) -> String;
}

fn sh_quote(s: &str) -> Cow<'_, str> {
    escape(Cow::Borrowed(s))
}

pub struct ClaudeCli;
pub struct GeminiCli;
pub struct CodexCli;

impl AgentCli for ClaudeCli {
    fn variant(&self) -> AgentVariant {
        AgentVariant::Claude
    }

    fn command_line(&self, params: &SpawnParams) -> String {
        let mut parts = vec!["claude".to_string()];
        parts.push("--model".to_string());
        parts.push(claude_model_flag(params.thinking_mode).to_string());
        if let Some(handle) = &params.resume {
            parts.push("--resume".to_string());
            parts.push(sh_quote(&handle.0).into_owned());
        }
        parts.join(" ")
    }
}

impl AgentCli for GeminiCli {
    fn variant(&self) -> AgentVariant {
        AgentVariant::Gemini
    }

    fn command_line(&self, params: &SpawnParams) -> String {
        let mut parts = vec!["gemini".to_string()];
        parts.push("--approval-mode".to_string());
        parts.push("default".to_string());
        if let Some(handle) = &params.resume {
            parts.push("--resume".to_string());
            parts.push(sh_quote(&handle.0).into_owned());
        }
        parts.join(" ")
    }
}

impl AgentCli for CodexCli {
    fn variant(&self) -> AgentVariant {
        AgentVariant::Codex
    }

    fn command_line(&self, params: &SpawnParams) -> String {
        let mut parts = vec!["codex".to_string()];
        if codex_full_auto(params.thinking_mode) {
            parts.push("--full-auto".to_string());
        }
        if let Some(handle) = &params.resume {
            parts.push("resume".to_string());
            parts.push(sh_quote(&handle.0).into_owned());
        }
        parts.join(" ")
    }
}

/// Maps the dial to the Claude CLI's `--model` flag. `fast`/`slow` pick the
/// smaller/larger model alias; `medium`/`deep` both use the default model,
/// `deep` additionally requests extended thinking via the prompt prefix
/// (see [`thinking_prefix`]), not a separate model.
fn claude_model_flag(mode: ThinkingMode) -> &'static str {
    match mode {
        ThinkingMode::Fast => "haiku",
        ThinkingMode::Medium | ThinkingMode::Deep => "sonnet",
        ThinkingMode::Slow => "opus",
    }
}

fn codex_full_auto(mode: ThinkingMode) -> bool {
    matches!(mode, ThinkingMode::Fast)
}

/// Looks up the `AgentCli` implementation for a given variant.
pub fn cli_for(variant: AgentVariant) -> Box<dyn AgentCli + Send + Sync> {
    match variant {
        AgentVariant::Claude => Box::new(ClaudeCli),
        AgentVariant::Gemini => Box::new(GeminiCli),
        AgentVariant::Codex => Box::new(CodexCli),
    }
}

/// Builds the command line to start or resume `variant` with `params`.
pub fn command_line(variant: AgentVariant, params: &SpawnParams) -> String {
    cli_for(variant).command_line(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(resume: Option<&str>) -> SpawnParams {
        SpawnParams {
            project_dir: "/home/user/proj".to_string(),
            thinking_mode: ThinkingMode::Medium,
            resume: resume.map(|s| ResumeHandle(s.to_string())),
        }
    }

    #[test]
    fn claude_fresh_start_has_no_resume_flag() {
        let line = command_line(AgentVariant::Claude, &params(None));
        assert!(line.starts_with("claude --model sonnet"));
        assert!(!line.contains("--resume"));
    }

    #[test]
    fn claude_resume_quotes_native_handle() {
        let line = command_line(AgentVariant::Claude, &params(Some("abc-123")));
        assert!(line.contains("--resume abc-123"));
    }

    #[test]
    fn resume_handle_with_shell_metacharacters_is_quoted() {
        let line = command_line(AgentVariant::Gemini, &params(Some("a; rm -rf /")));
        assert!(!line.contains("; rm -rf /"), "unquoted: {line}");
    }

    #[test]
    fn codex_full_auto_only_for_fast_thinking() {
        let mut p = params(None);
        p.thinking_mode = ThinkingMode::Fast;
        assert!(command_line(AgentVariant::Codex, &p).contains("--full-auto"));

        p.thinking_mode = ThinkingMode::Slow;
        assert!(!command_line(AgentVariant::Codex, &p).contains("--full-auto"));
    }
}
