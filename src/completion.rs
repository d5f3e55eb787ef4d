//! # Shell Completion
//!
//! Completion scripts come from `clap_complete`. For bash and fish a short
//! hook is appended that completes user ids for `profile` and `--user-id` by
//! calling the hidden `complete-users` command, which reads them from the
//! database. Other shells get the static script only.
//!
//! ```bash
//! moodtune completion bash > ~/.local/share/bash-completion/completions/moodtune
//! moodtune completion zsh > ~/.config/zsh/completions/_moodtune
//! ```

use crate::db::SqliteStore;
use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Shell as CompletionShell};
use std::io::{self, Write};
use std::path::Path;

const BASH_USER_HOOK: &str = r#"
_moodtune_with_users() {
    local cur="${COMP_WORDS[COMP_CWORD]}"
    local prev="${COMP_WORDS[COMP_CWORD-1]}"
    if [[ "$prev" == "--user-id" || "$prev" == "profile" ]]; then
        local IFS=$'\n'
        COMPREPLY=( $(compgen -W "$(moodtune complete-users 2>/dev/null)" -- "$cur") )
        return 0
    fi
    _moodtune "$@"
}
complete -F _moodtune_with_users -o bashdefault -o default moodtune
"#;

const FISH_USER_HOOK: &str = r#"
complete -c moodtune -f -n '__fish_seen_subcommand_from profile' -a '(moodtune complete-users 2>/dev/null)' -d 'User id'
complete -c moodtune -f -n '__fish_seen_subcommand_from recommend survey' -l user-id -r -a '(moodtune complete-users 2>/dev/null)' -d 'User id'
"#;

/// Extra script that completes user ids, for shells that have one.
pub fn user_completion_hook(shell: CompletionShell) -> Option<&'static str> {
    match shell {
        CompletionShell::Bash => Some(BASH_USER_HOOK),
        CompletionShell::Fish => Some(FISH_USER_HOOK),
        _ => None,
    }
}

/// Write the completion script for `shell`, including the user id hook.
pub fn write_completion_script(
    shell: CompletionShell,
    cmd: &mut Command,
    out: &mut impl Write,
) -> Result<()> {
    let name = cmd.get_name().to_string();
    generate(shell, cmd, name, &mut *out);
    if let Some(hook) = user_completion_hook(shell) {
        out.write_all(hook.as_bytes())?;
    }
    Ok(())
}

/// Print shell completions for the given shell
pub fn generate_completions(shell: CompletionShell, cmd: &mut Command) -> Result<()> {
    let stdout = io::stdout();
    write_completion_script(shell, cmd, &mut stdout.lock())
}

/// Convert our Shell enum to clap_complete's Shell enum
pub fn shell_to_completion_shell(shell: &crate::cli::Shell) -> CompletionShell {
    match shell {
        crate::cli::Shell::Bash => CompletionShell::Bash,
        crate::cli::Shell::Zsh => CompletionShell::Zsh,
        crate::cli::Shell::Fish => CompletionShell::Fish,
        crate::cli::Shell::PowerShell => CompletionShell::PowerShell,
        crate::cli::Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Known user ids, or nothing when the database is missing or unreadable.
pub fn get_user_completions(db_path: &Path) -> Vec<String> {
    if !db_path.exists() {
        return Vec::new();
    }
    SqliteStore::open(db_path)
        .and_then(|store| store.list_user_ids())
        .unwrap_or_default()
}

/// Write one completion per line, quoting entries that contain whitespace.
pub fn write_completions(out: &mut impl Write, completions: &[String]) -> Result<()> {
    for completion in completions {
        if completion.chars().any(char::is_whitespace) {
            writeln!(out, "\"{}\"", completion.replace('"', "\\\""))?;
        } else {
            writeln!(out, "{completion}")?;
        }
    }
    Ok(())
}

/// Print known user ids for shell completion scripts.
pub fn print_user_completions(db_path: &Path) -> Result<()> {
    let stdout = io::stdout();
    write_completions(&mut stdout.lock(), &get_user_completions(db_path))
}
