//! External-process execution: handing the terminal to a child and
//! getting it back intact.
//!
//! The hard part of running an interactive child (editor, pager, shell)
//! from inside a TUI is ordering: the child must see cooked input on the
//! main screen, and the user must never see the main screen in raw mode.
//! So teardown relinquishes raw mode *before* leaving the alternate
//! screen, and restore re-enters the alternate screen *before* raw mode.
//! The restore path is best-effort: every step runs even if an earlier
//! one failed, and failures are reported alongside the child's own error
//! as a compound error rather than replacing it.
//!
//! The input reader is stopped by the program before any of this starts
//! (the child must inherit an undisturbed stdin) and restarted after; see
//! the program's exec handling.
//!
//! # Foreground transfer
//!
//! With [`ExecOptions::transfer_foreground`] on POSIX, the child is put in
//! its own process group and made the terminal's foreground group for the
//! duration of its run, so keyboard signals (Ctrl-Z, Ctrl-C) target the
//! child and not this process. `SIGTTOU` is ignored around the transfer —
//! a background process touching the foreground group would otherwise be
//! stopped — and whatever disposition the caller had installed for it is
//! restored afterwards. Where the terminal refuses the transfer (not a
//! real TTY), execution degrades to the plain handoff.

use std::process::{Command as StdCommand, Stdio};

use crate::terminal::TerminalController;
use crate::Error;

/// Platform handoff options for external-process execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Make the child the terminal's foreground process group while it
    /// runs (POSIX; implies a separate process group). Ignored elsewhere.
    pub transfer_foreground: bool,
    /// Run the child in its own process group: `setpgid` on POSIX,
    /// `CREATE_NEW_PROCESS_GROUP` on Windows.
    pub create_process_group: bool,
}

impl ExecOptions {
    /// Options for a fully interactive child: its own process group, made
    /// the foreground group where the platform supports it.
    pub fn interactive() -> Self {
        Self {
            transfer_foreground: true,
            create_process_group: true,
        }
    }
}

/// Reject commands with an empty program name before any terminal state
/// is touched.
pub(crate) fn validate(command: &StdCommand) -> Result<(), Error> {
    if command.get_program().is_empty() {
        return Err(Error::EmptyExecCommand);
    }
    Ok(())
}

/// Tear down TUI terminal state, run `command` with the process's own
/// stdio, and rebuild the state that was engaged on entry.
///
/// The caller has already stopped the input reader and restarts it after
/// this returns, whatever the outcome. Returns the child's error when the
/// terminal came back intact, and a compound error when restore failed
/// too.
pub(crate) async fn run_with_terminal(
    terminal: &mut (dyn TerminalController + '_),
    command: StdCommand,
    options: ExecOptions,
) -> Result<(), Error> {
    let was_raw = terminal.is_in_raw_mode();
    let was_alt = terminal.is_in_alt_screen();

    // Raw mode goes first: the child expects cooked input on the main
    // screen.
    if was_raw {
        terminal.exit_raw_mode().await?;
    }
    if was_alt {
        if let Err(err) = terminal.exit_alt_screen().await {
            // Half-torn-down: put raw mode back so the caller sees the
            // state it started from.
            if was_raw {
                let _ = terminal.enter_raw_mode().await;
            }
            return Err(err);
        }
    }
    // Cursor visibility is cosmetic; failures here never stop the run.
    let _ = terminal.show_cursor().await;

    let child_result = spawn_and_wait(command, options).await;

    let _ = terminal.hide_cursor().await;

    // Alt screen before raw mode, and every step attempted even after a
    // failure: as much TUI state as possible comes back.
    let mut restore_err: Option<Error> = None;
    if was_alt {
        if let Err(err) = terminal.enter_alt_screen().await {
            restore_err.get_or_insert(err);
        }
    }
    if was_raw {
        if let Err(err) = terminal.enter_raw_mode().await {
            restore_err.get_or_insert(err);
        }
    }

    match (child_result, restore_err) {
        (child, Some(restore)) => Err(Error::compound(child.err(), restore)),
        (Err(child), None) => Err(child),
        (Ok(()), None) => Ok(()),
    }
}

/// Spawn `command` wired to the process's own stdio and wait for it.
///
/// Succeeds only on a zero exit status; a spawn failure or unsuccessful
/// exit is the child's error.
async fn spawn_and_wait(mut command: StdCommand, options: ExecOptions) -> Result<(), Error> {
    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    #[cfg(unix)]
    if options.create_process_group || options.transfer_foreground {
        use std::os::unix::process::CommandExt;
        // pgid 0: the child leads a group of its own.
        command.process_group(0);
    }
    #[cfg(windows)]
    if options.create_process_group {
        use std::os::windows::process::CommandExt;
        command.creation_flags(winapi::um::winbase::CREATE_NEW_PROCESS_GROUP);
    }

    let mut child = tokio::process::Command::from(command).spawn()?;

    #[cfg(unix)]
    let foreground = if options.transfer_foreground {
        ForegroundGuard::transfer(&child)
    } else {
        None
    };

    let status = child.wait().await;

    // Reclaim the foreground group before reporting anything.
    #[cfg(unix)]
    drop(foreground);

    let status = status?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::ChildFailed(status))
    }
}

/// Stop this process group for shell job control.
///
/// Used by the suspend path after the terminal has been released;
/// execution continues here once the shell delivers `SIGCONT`.
#[cfg(unix)]
pub(crate) fn stop_for_job_control() {
    unsafe {
        libc::kill(0, libc::SIGTSTP);
    }
}

#[cfg(not(unix))]
pub(crate) fn stop_for_job_control() {}

/// Foreground-process-group handoff for the controlling terminal.
///
/// Construction ignores `SIGTTOU`, records the current foreground group,
/// and points the terminal at the child's group; `Drop` reclaims the
/// group and reinstates the caller's `SIGTTOU` disposition. Any refusal
/// along the way yields `None` and the plain handoff proceeds.
#[cfg(unix)]
struct ForegroundGuard {
    tty_fd: std::os::unix::io::RawFd,
    original_pgid: libc::pid_t,
    saved_sigttou: libc::sigaction,
}

#[cfg(unix)]
impl ForegroundGuard {
    fn transfer(child: &tokio::process::Child) -> Option<Self> {
        use std::mem;

        let tty_fd = libc::STDIN_FILENO;
        if !crate::terminal::unix::is_tty(tty_fd) {
            return None;
        }
        let child_pid = child.id()? as libc::pid_t;

        unsafe {
            let mut ignore: libc::sigaction = mem::zeroed();
            ignore.sa_sigaction = libc::SIG_IGN;
            let mut saved: libc::sigaction = mem::zeroed();
            if libc::sigaction(libc::SIGTTOU, &ignore, &mut saved) != 0 {
                return None;
            }

            let original_pgid = libc::tcgetpgrp(tty_fd);
            // The child was started with setpgid(0, 0), so its pid names
            // its group.
            if original_pgid < 0 || libc::tcsetpgrp(tty_fd, child_pid) != 0 {
                libc::sigaction(libc::SIGTTOU, &saved, std::ptr::null_mut());
                return None;
            }

            Some(Self {
                tty_fd,
                original_pgid,
                saved_sigttou: saved,
            })
        }
    }
}

#[cfg(unix)]
impl Drop for ForegroundGuard {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetpgrp(self.tty_fd, self.original_pgid);
            libc::sigaction(libc::SIGTTOU, &self.saved_sigttou, std::ptr::null_mut());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_name_is_rejected() {
        let command = StdCommand::new("");
        assert!(matches!(validate(&command), Err(Error::EmptyExecCommand)));

        let command = StdCommand::new("echo");
        assert!(validate(&command).is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_child_reports_ok() {
        let result = spawn_and_wait(StdCommand::new("true"), ExecOptions::default()).await;
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_child_reports_exit_status() {
        let result = spawn_and_wait(StdCommand::new("false"), ExecOptions::default()).await;
        match result {
            Err(Error::ChildFailed(status)) => assert_eq!(status.code(), Some(1)),
            other => panic!("expected ChildFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_reports_spawn_error() {
        let result = spawn_and_wait(
            StdCommand::new("definitely-not-a-real-binary-name"),
            ExecOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_group_option_still_runs() {
        let options = ExecOptions {
            create_process_group: true,
            transfer_foreground: false,
        };
        assert!(spawn_and_wait(StdCommand::new("true"), options).await.is_ok());
    }
}
