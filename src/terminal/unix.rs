//! Thin termios syscall wrapper for the ANSI backend on POSIX systems.
//!
//! Raw mode here means: no echo, no canonical line buffering, no signal
//! generation, with reads returning as soon as one byte is available
//! (`VMIN = 1`, `VTIME = 0`). The attributes in force before the switch
//! are saved and handed back to the caller for restoration.

use std::io;
use std::mem;
use std::os::unix::io::RawFd;

/// The saved terminal attributes from before a raw-mode switch.
pub(crate) type SavedTermios = libc::termios;

fn check(rc: libc::c_int) -> io::Result<()> {
    if rc == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// True when `fd` refers to a terminal device.
pub(crate) fn is_tty(fd: RawFd) -> bool {
    unsafe { libc::isatty(fd) == 1 }
}

/// Switch `fd` into raw input mode, returning the prior attributes.
pub(crate) fn enter_raw_mode(fd: RawFd) -> io::Result<SavedTermios> {
    unsafe {
        let mut attrs: libc::termios = mem::zeroed();
        check(libc::tcgetattr(fd, &mut attrs))?;
        let saved = attrs;

        attrs.c_lflag &= !(libc::ECHO | libc::ICANON | libc::ISIG);
        attrs.c_cc[libc::VMIN] = 1;
        attrs.c_cc[libc::VTIME] = 0;

        check(libc::tcsetattr(fd, libc::TCSANOW, &attrs))?;
        Ok(saved)
    }
}

/// Restore attributes previously returned by [`enter_raw_mode`].
pub(crate) fn restore_mode(fd: RawFd, saved: &SavedTermios) -> io::Result<()> {
    unsafe { check(libc::tcsetattr(fd, libc::TCSANOW, saved)) }
}

/// Query the window size of the terminal behind `fd`.
///
/// Returns (columns, rows). Errors when the ioctl fails or the kernel
/// reports a zero-sized window (some muxers do).
pub(crate) fn window_size(fd: RawFd) -> io::Result<(u16, u16)> {
    unsafe {
        let mut winsize: libc::winsize = mem::zeroed();
        if libc::ioctl(fd, libc::TIOCGWINSZ, &mut winsize) == -1 {
            return Err(io::Error::last_os_error());
        }
        if winsize.ws_col == 0 || winsize.ws_row == 0 {
            return Err(io::Error::other("zero-sized window"));
        }
        Ok((winsize.ws_col, winsize.ws_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_mode_on_non_tty_fails() {
        // A pipe is not a terminal; the tcgetattr must report ENOTTY
        // rather than succeed or abort.
        let mut fds = [0 as libc::c_int; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        assert!(!is_tty(fds[0]));
        assert!(enter_raw_mode(fds[0]).is_err());
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }
}
