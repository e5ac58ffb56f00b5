//! Agent CLI variant support.
//!
//! TeleClaude runs three interactive agent CLIs as child processes inside
//! terminal pane shells (Claude Code, Gemini CLI, Codex CLI) — it never
//! embeds a model or talks to one over HTTP. This crate knows how to build
//! the command line that starts or resumes each variant and how to probe
//! whether a variant's binary is installed.

pub mod availability;
pub mod variants;

pub use availability::{availability_report, is_available, ALL_VARIANTS};
pub use variants::{command_line, AgentCli, ClaudeCli, CodexCli, GeminiCli, ResumeHandle, SpawnParams};
