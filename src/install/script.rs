use std::path::Path;
use std::time::Duration;

use super::HelperJob;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Flavor {
    Batch,
    Shell,
}

impl Flavor {
    pub fn native() -> Self {
        if cfg!(windows) { Flavor::Batch } else { Flavor::Shell }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Flavor::Batch => ".bat",
            Flavor::Shell => ".sh",
        }
    }
}

/// Renders the helper script. Every path and value is baked in literally:
/// the script waits, runs the staged helper binary with `apply-update`,
/// removes that binary and finally removes itself (and, for sh, the
/// `.log` file its output went to).
pub fn render(flavor: Flavor, helper: &Path, job: &HelperJob, grace: Duration) -> String {
    let mut line = vec![quote(flavor, &helper.to_string_lossy())];
    line.extend(
        job.to_args()
            .iter()
            .map(|a| quote(flavor, &a.to_string_lossy())),
    );
    let command = line.join(" ");
    let helper = quote(flavor, &helper.to_string_lossy());
    let secs = grace.as_millis().div_ceil(1000);

    match flavor {
        Flavor::Batch => render_batch(&command, &helper, secs),
        Flavor::Shell => render_shell(&command, &helper, secs),
    }
}

fn render_batch(command: &str, helper: &str, secs: u128) -> String {
    let lines = [
        "@echo off".to_string(),
        "chcp 65001 > nul".to_string(),
        "echo Aplicando atualizacao...".to_string(),
        format!("timeout /t {secs} /nobreak > nul"),
        command.to_string(),
        "set RESULT=%ERRORLEVEL%".to_string(),
        format!("del /f /q {helper} > nul 2>&1"),
        "if not \"%RESULT%\"==\"0\" (".to_string(),
        "    echo Falha ao aplicar atualizacao, codigo %RESULT%".to_string(),
        "    pause".to_string(),
        ")".to_string(),
        "(goto) 2>nul & del \"%~f0\"".to_string(),
    ];
    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

fn render_shell(command: &str, helper: &str, secs: u128) -> String {
    format!(
        "#!/bin/sh\n\
         echo 'Aplicando atualizacao...'\n\
         sleep {secs}\n\
         {command}\n\
         status=$?\n\
         rm -f -- {helper}\n\
         if [ \"$status\" -ne 0 ]; then\n\
         \x20   echo \"Falha ao aplicar atualizacao, codigo $status\" >&2\n\
         fi\n\
         rm -f -- \"${{0%.sh}}.log\" \"$0\"\n\
         exit \"$status\"\n"
    )
}

fn is_plain(arg: &str) -> bool {
    !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '\\'))
}

pub fn quote(flavor: Flavor, arg: &str) -> String {
    match flavor {
        // `"` cannot appear in a Windows path; `%` would expand inside cmd
        Flavor::Batch => format!("\"{}\"", arg.replace('%', "%%")),
        Flavor::Shell if is_plain(arg) => arg.to_string(),
        Flavor::Shell => format!("'{}'", arg.replace('\'', "'\\''")),
    }
}
