use std::os::unix::io::RawFd;

use log::error;
use nix::fcntl::{fcntl, open, FcntlArg, FdFlag, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup, dup2};

use crate::value::{RedirAction, RedirectionValue};

/// Descriptors owned by a scope; whatever is still held when the scope ends
/// is closed.
#[derive(Debug, Default)]
pub struct FileDescriptionCollector {
    fds: Vec<RawFd>,
}

impl FileDescriptionCollector {
    pub fn new() -> Self {
        FileDescriptionCollector::default()
    }

    pub fn add(&mut self, fd: RawFd) {
        self.fds.push(fd);
    }

    /// Closes every held descriptor now instead of at scope exit.
    pub fn collect(&mut self) {
        for fd in self.fds.drain(..) {
            let _ = close(fd);
        }
    }

    /// Forgets the held descriptors without closing them; used once their
    /// ownership has moved elsewhere (e.g. after a dup2).
    pub fn clear(&mut self) {
        self.fds.clear();
    }
}

impl Drop for FileDescriptionCollector {
    fn drop(&mut self) {
        self.collect();
    }
}

#[derive(Debug)]
struct SavedFileDescription {
    original: RawFd,
    saved: RawFd,
}

/// Duplicates descriptors to spare close-on-exec slots so they can be put
/// back when the scope ends.
#[derive(Debug, Default)]
pub struct SavedFileDescriptions {
    saves: Vec<SavedFileDescription>,
    fds: FileDescriptionCollector,
}

impl SavedFileDescriptions {
    pub fn new() -> Self {
        SavedFileDescriptions::default()
    }

    /// Saves the current binding of `fd`. The duplicate is close-on-exec so
    /// it never leaks into a child's exec image.
    pub fn add(&mut self, fd: RawFd) -> nix::Result<()> {
        let saved = dup(fd)?;
        let flags = fcntl(saved, FcntlArg::F_GETFD)?;
        let flags = FdFlag::from_bits_truncate(flags) | FdFlag::FD_CLOEXEC;
        fcntl(saved, FcntlArg::F_SETFD(flags))?;

        self.saves.push(SavedFileDescription { original: fd, saved });
        self.fds.add(saved);
        Ok(())
    }

    /// Puts every saved descriptor back, newest first, then closes the
    /// duplicates.
    pub fn restore(&mut self) {
        for save in self.saves.drain(..).rev() {
            if let Err(err) = dup2(save.saved, save.original) {
                error!("dup2 restoring fd {}: {}", save.original, err);
            }
        }
        self.fds.collect();
    }
}

impl Drop for SavedFileDescriptions {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Applies a command's redirection list to the calling process.
///
/// Every target descriptor is saved into `saved_fds` first, and descriptors
/// opened here are owned by `fds`. The dup2 rebinds all happen in a second
/// pass, so a list like `>a >b` saves the original descriptor intact and
/// leaves it bound to `b`.
pub fn apply_redirections(
    redirections: &[RedirectionValue],
    fds: &mut FileDescriptionCollector,
    saved_fds: &mut SavedFileDescriptions,
) -> bool {
    let mut dups: Vec<(RawFd, RawFd)> = Vec::new();
    let mut fds_to_close = FileDescriptionCollector::new();

    for redirection in redirections {
        let fd = redirection.io_number;

        if let Err(err) = saved_fds.add(fd) {
            error!("dup({}): {}", fd, err);
            return false;
        }

        match &redirection.action {
            RedirAction::Open(data) => {
                let path_fd = match open(
                    data.path.as_str(),
                    data.flags,
                    Mode::from_bits_truncate(0o666),
                ) {
                    Ok(path_fd) => path_fd,
                    Err(err) => {
                        error!("open({}): {}", data.path, err);
                        return false;
                    }
                };
                fds.add(path_fd);
                dups.push((path_fd, fd));
            }
            RedirAction::Close => fds_to_close.add(fd),
            RedirAction::InputDup { source } | RedirAction::OutputDup { source } => {
                let flags = match fcntl(*source, FcntlArg::F_GETFL) {
                    Ok(flags) => flags,
                    Err(err) => {
                        error!("fcntl({}): {}", source, err);
                        return false;
                    }
                };
                let access = OFlag::from_bits_truncate(flags) & OFlag::O_ACCMODE;
                let wants_output = matches!(redirection.action, RedirAction::OutputDup { .. });

                if wants_output && access == OFlag::O_RDONLY {
                    error!("fd {} is not open for output", source);
                    return false;
                }
                if !wants_output && access == OFlag::O_WRONLY {
                    error!("fd {} is not open for input", source);
                    return false;
                }

                dups.push((*source, fd));
            }
        }
    }

    for (from, to) in dups {
        if let Err(err) = dup2(from, to) {
            error!("dup2({}, {}): {}", from, to, err);
            return false;
        }
    }

    fds_to_close.collect();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::PathData;
    use nix::unistd::write;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ratsh_redirect_{}_{}", name, std::process::id()))
    }

    fn open_scratch() -> RawFd {
        open("/dev/null", OFlag::O_RDWR, Mode::empty()).expect("open /dev/null")
    }

    fn open_redirection(io_number: RawFd, path: &PathBuf) -> RedirectionValue {
        RedirectionValue {
            io_number,
            action: RedirAction::Open(PathData {
                path: path.display().to_string(),
                flags: OFlag::O_CREAT | OFlag::O_WRONLY | OFlag::O_TRUNC,
            }),
        }
    }

    #[test]
    fn collector_closes_on_drop() {
        let fd = open_scratch();
        {
            let mut collector = FileDescriptionCollector::new();
            collector.add(fd);
        }
        assert!(write(fd, b"x").is_err());
    }

    #[test]
    fn collector_clear_forgets_without_closing() {
        let fd = open_scratch();
        {
            let mut collector = FileDescriptionCollector::new();
            collector.add(fd);
            collector.clear();
        }
        assert!(write(fd, b"x").is_ok());
        let _ = close(fd);
    }

    #[test]
    fn open_redirection_rebinds_and_restores() {
        let path = temp_path("open");
        let scratch = open_scratch();

        {
            let mut fds = FileDescriptionCollector::new();
            let mut saved_fds = SavedFileDescriptions::new();
            let redirections = vec![open_redirection(scratch, &path)];

            assert!(apply_redirections(&redirections, &mut fds, &mut saved_fds));
            write(scratch, b"redirected\n").expect("write through redirection");
        }

        // Restored to /dev/null: this write must not land in the file.
        write(scratch, b"afterwards\n").expect("write after restore");
        let _ = close(scratch);

        assert_eq!(fs::read_to_string(&path).unwrap(), "redirected\n");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn later_redirection_of_same_fd_wins() {
        let path_a = temp_path("first");
        let path_b = temp_path("second");
        let scratch = open_scratch();

        {
            let mut fds = FileDescriptionCollector::new();
            let mut saved_fds = SavedFileDescriptions::new();
            let redirections = vec![
                open_redirection(scratch, &path_a),
                open_redirection(scratch, &path_b),
            ];

            assert!(apply_redirections(&redirections, &mut fds, &mut saved_fds));
            write(scratch, b"payload\n").expect("write through redirection");
        }
        let _ = close(scratch);

        assert_eq!(fs::read_to_string(&path_a).unwrap(), "");
        assert_eq!(fs::read_to_string(&path_b).unwrap(), "payload\n");
        let _ = fs::remove_file(&path_a);
        let _ = fs::remove_file(&path_b);
    }

    #[test]
    fn close_action_closes_until_restore() {
        let scratch = open_scratch();

        {
            let mut fds = FileDescriptionCollector::new();
            let mut saved_fds = SavedFileDescriptions::new();
            let redirections = vec![RedirectionValue {
                io_number: scratch,
                action: RedirAction::Close,
            }];

            assert!(apply_redirections(&redirections, &mut fds, &mut saved_fds));
            assert!(write(scratch, b"x").is_err());
        }

        assert!(write(scratch, b"x").is_ok());
        let _ = close(scratch);
    }

    #[test]
    fn output_dup_of_read_only_fd_is_rejected() {
        let path = temp_path("readonly");
        fs::write(&path, "data").unwrap();
        let read_only = open(
            path.display().to_string().as_str(),
            OFlag::O_RDONLY,
            Mode::empty(),
        )
        .expect("open read-only");
        let scratch = open_scratch();

        let mut fds = FileDescriptionCollector::new();
        let mut saved_fds = SavedFileDescriptions::new();
        let redirections = vec![RedirectionValue {
            io_number: scratch,
            action: RedirAction::OutputDup { source: read_only },
        }];

        assert!(!apply_redirections(&redirections, &mut fds, &mut saved_fds));

        drop(saved_fds);
        let _ = close(read_only);
        let _ = close(scratch);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn input_dup_of_write_only_fd_is_rejected() {
        let path = temp_path("writeonly");
        let write_only = open(
            path.display().to_string().as_str(),
            OFlag::O_CREAT | OFlag::O_WRONLY,
            Mode::from_bits_truncate(0o666),
        )
        .expect("open write-only");
        let scratch = open_scratch();

        let mut fds = FileDescriptionCollector::new();
        let mut saved_fds = SavedFileDescriptions::new();
        let redirections = vec![RedirectionValue {
            io_number: scratch,
            action: RedirAction::InputDup { source: write_only },
        }];

        assert!(!apply_redirections(&redirections, &mut fds, &mut saved_fds));

        drop(saved_fds);
        let _ = close(write_only);
        let _ = close(scratch);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn input_dup_rebinds_to_source() {
        let path = temp_path("dupsource");
        fs::write(&path, "from the source\n").unwrap();
        let source = open(
            path.display().to_string().as_str(),
            OFlag::O_RDONLY,
            Mode::empty(),
        )
        .expect("open source");
        let scratch = open_scratch();

        {
            let mut fds = FileDescriptionCollector::new();
            let mut saved_fds = SavedFileDescriptions::new();
            let redirections = vec![RedirectionValue {
                io_number: scratch,
                action: RedirAction::InputDup { source },
            }];

            assert!(apply_redirections(&redirections, &mut fds, &mut saved_fds));

            let mut buf = [0u8; 16];
            let n = nix::unistd::read(scratch, &mut buf).expect("read through dup");
            assert_eq!(&buf[..n], b"from the source\n");
        }

        let _ = close(source);
        let _ = close(scratch);
        let _ = fs::remove_file(&path);
    }
}
