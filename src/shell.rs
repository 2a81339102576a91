use std::os::unix::io::RawFd;

use log::debug;
use nix::fcntl::OFlag;
use nix::libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, fork, pipe2, ForkResult};

use crate::ast::Node;
use crate::builtins::BuiltinManager;
use crate::error::ErrorKind;
use crate::executor::{
    apply_redirections, execute_process, FileDescriptionCollector, SavedFileDescriptions,
};
use crate::parser::Parser;
use crate::value::{CommandValue, RedirectionValue, Value, WithOp};

pub struct Shell {
    builtins: BuiltinManager,
}

impl Shell {
    pub fn new() -> Self {
        Shell {
            builtins: BuiltinManager::new(),
        }
    }

    /// Parses, evaluates and runs one line of input. The caller keeps the
    /// trailing newline so the line lexes completely.
    pub fn run_single_line(&mut self, input: &str) -> i32 {
        if input.is_empty() {
            return 0;
        }

        let node = Parser::new(input).parse();

        if let Node::SyntaxError { message } = &node {
            self.print_error(message, ErrorKind::SyntaxError);
            return 1;
        }

        debug!("parsed: {:?}", node);

        let Some(value) = node.eval() else {
            return 0;
        };

        match value {
            Value::Command(command) => self.run_command(&command),
            Value::AndOrList(list) => self.run_commands(&list.commands),
            Value::Redirection(_) => {
                self.print_error("redirection without a command", ErrorKind::General);
                1
            }
        }
    }

    pub fn print_error(&self, message: &str, kind: ErrorKind) {
        eprintln!("{}: {}", kind, message);
    }

    /// Runs one command, following its pipeline chain if it has one.
    fn run_command(&mut self, command: &CommandValue) -> i32 {
        if command.next_in_pipeline.is_none() {
            return self.run_simple_command(&command.argv, &command.redirections);
        }
        self.run_pipeline(command)
    }

    fn run_simple_command(&mut self, argv: &[String], redirections: &[RedirectionValue]) -> i32 {
        let mut fds = FileDescriptionCollector::new();
        let mut saved_fds = SavedFileDescriptions::new();

        if !apply_redirections(redirections, &mut fds, &mut saved_fds) {
            return 1;
        }

        if argv.is_empty() {
            return 0;
        }

        // Built-ins run in the shell process, with the redirections in
        // place and restored on return.
        if let Some(code) = self.builtins.run(argv) {
            return code;
        }

        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                // The opened descriptors are already bound to their targets;
                // the originals must not leak into the exec image.
                fds.collect();
                execute_process(argv)
            }
            Ok(ForkResult::Parent { child }) => match waitpid(child, None) {
                Ok(WaitStatus::Exited(_, code)) => code,
                Ok(WaitStatus::Signaled(_, signal, _)) => 128 + signal as i32,
                Ok(_) => 0,
                Err(err) => {
                    self.print_error(&format!("waitpid: {}", err), ErrorKind::General);
                    1
                }
            },
            Err(err) => {
                self.print_error(&format!("fork: {}", err), ErrorKind::General);
                1
            }
        }
    }

    /// Runs an N-stage pipeline by rebinding the shell's own stdin/stdout
    /// around each stage. Stages run left to right, one fork-wait at a time;
    /// the shell's copy of each write end is gone before the next stage
    /// starts, so the downstream read sees EOF once the upstream exits. The
    /// pipeline's status is the status of the last stage.
    fn run_pipeline(&mut self, first: &CommandValue) -> i32 {
        let (mut prev_read, write_end) = match pipe2(OFlag::O_CLOEXEC) {
            Ok(ends) => ends,
            Err(err) => {
                self.print_error(&format!("pipe2: {}", err), ErrorKind::General);
                return 1;
            }
        };

        let mut last_status;
        {
            let mut saved_fds = SavedFileDescriptions::new();
            if !rebind_fd(write_end, STDOUT_FILENO, &mut saved_fds) {
                self.print_error("failed to stage pipeline output", ErrorKind::General);
                let _ = close(prev_read);
                return 1;
            }
            last_status = self.run_simple_command(&first.argv, &first.redirections);
        }

        let mut cursor = first.next_in_pipeline.as_deref();
        while let Some(command) = cursor {
            let mut saved_fds = SavedFileDescriptions::new();
            let mut next_read = None;

            if command.next_in_pipeline.is_some() {
                match pipe2(OFlag::O_CLOEXEC) {
                    Ok((read_end, write_end)) => {
                        if !rebind_fd(write_end, STDOUT_FILENO, &mut saved_fds) {
                            self.print_error("failed to stage pipeline output", ErrorKind::General);
                            let _ = close(read_end);
                            let _ = close(prev_read);
                            return 1;
                        }
                        next_read = Some(read_end);
                    }
                    Err(err) => {
                        self.print_error(&format!("pipe2: {}", err), ErrorKind::General);
                        let _ = close(prev_read);
                        return 1;
                    }
                }
            }

            if !rebind_fd(prev_read, STDIN_FILENO, &mut saved_fds) {
                self.print_error("failed to stage pipeline input", ErrorKind::General);
                if let Some(read_end) = next_read {
                    let _ = close(read_end);
                }
                return 1;
            }

            last_status = self.run_simple_command(&command.argv, &command.redirections);

            // saved_fds drops here, restoring this stage's bindings in
            // reverse order of saving.
            cursor = command.next_in_pipeline.as_deref();
            if let Some(read_end) = next_read {
                prev_read = read_end;
            }
        }

        last_status
    }

    /// Reduces an AND/OR list left to right with short-circuit semantics,
    /// returning the status of the last command that actually ran.
    fn run_commands(&mut self, commands: &[CommandValue]) -> i32 {
        let mut last_status = 0;
        let mut should_run = true;
        let mut suppressing_op = WithOp::None;

        for command in commands {
            if !should_run {
                // The first command joined by a different operator than the
                // one that suppressed execution re-enables it.
                should_run = suppressing_op != command.with_op;
                continue;
            }

            last_status = self.run_command(command);
            should_run = !(command.with_op == WithOp::AndIf && last_status != 0
                || command.with_op == WithOp::OrIf && last_status == 0);
            suppressing_op = command.with_op;
        }

        last_status
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new()
    }
}

/// Saves `target`, rebinds it to `fd` and closes `fd`. The descriptor is
/// consumed whether or not the rebind succeeds.
fn rebind_fd(fd: RawFd, target: RawFd, saved_fds: &mut SavedFileDescriptions) -> bool {
    if saved_fds.add(target).is_err() {
        let _ = close(fd);
        return false;
    }
    let ok = dup2(fd, target).is_ok();
    let _ = close(fd);
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ratsh_shell_{}_{}", name, std::process::id()))
    }

    fn run(line: &str) -> i32 {
        Shell::new().run_single_line(line)
    }

    #[test]
    fn empty_input_is_success() {
        assert_eq!(run(""), 0);
        assert_eq!(run("\n"), 0);
        assert_eq!(run("   \t \n"), 0);
    }

    #[test]
    fn syntax_errors_return_one() {
        assert_eq!(run("echo >\n"), 1);
        assert_eq!(run("< in.txt cat\n"), 1);
        assert_eq!(run("cat <& nope\n"), 1);
    }

    #[test]
    fn exit_statuses_are_reported() {
        assert_eq!(run("/bin/true\n"), 0);
        assert_eq!(run("/bin/false\n"), 1);
    }

    #[test]
    fn missing_command_is_127() {
        assert_eq!(run("/ratsh/definitely/not/a/command\n"), 127);
    }

    #[test]
    fn non_executable_file_is_126() {
        let path = temp_path("plain");
        fs::write(&path, "not a program").unwrap();
        assert_eq!(run(&format!("{}\n", path.display())), 126);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn redirection_writes_file() {
        let path = temp_path("redir");
        assert_eq!(run(&format!("/bin/echo hello > {}\n", path.display())), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn append_redirection_appends() {
        let path = temp_path("append");
        let _ = fs::remove_file(&path);
        assert_eq!(run(&format!("/bin/echo one > {}\n", path.display())), 0);
        assert_eq!(run(&format!("/bin/echo two >> {}\n", path.display())), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn last_redirection_of_stdout_wins() {
        let src = temp_path("ordering_src");
        let path_a = temp_path("ordering_a");
        let path_b = temp_path("ordering_b");
        fs::write(&src, "payload\n").unwrap();

        assert_eq!(
            run(&format!(
                "/bin/cat {} > {} > {}\n",
                src.display(),
                path_a.display(),
                path_b.display()
            )),
            0
        );
        assert_eq!(fs::read_to_string(&path_a).unwrap(), "");
        assert_eq!(fs::read_to_string(&path_b).unwrap(), "payload\n");

        let _ = fs::remove_file(&src);
        let _ = fs::remove_file(&path_a);
        let _ = fs::remove_file(&path_b);
    }

    #[test]
    fn input_redirection_feeds_stdin() {
        let src = temp_path("stdin_src");
        let out = temp_path("stdin_out");
        fs::write(&src, "fed\n").unwrap();

        assert_eq!(
            run(&format!(
                "/bin/cat < {} > {}\n",
                src.display(),
                out.display()
            )),
            0
        );
        assert_eq!(fs::read_to_string(&out).unwrap(), "fed\n");

        let _ = fs::remove_file(&src);
        let _ = fs::remove_file(&out);
    }

    #[test]
    fn stderr_dup_follows_stdout() {
        let out = temp_path("dup_out");

        let status = run(&format!(
            "/bin/cat /ratsh/missing/input > {} 2>&1\n",
            out.display()
        ));
        assert_ne!(status, 0);
        assert!(!fs::read_to_string(&out).unwrap().is_empty());

        let _ = fs::remove_file(&out);
    }

    #[test]
    fn pipeline_runs_and_reaps() {
        let out = temp_path("pipe");
        assert_eq!(
            run(&format!("/bin/printf foo | /bin/cat > {}\n", out.display())),
            0
        );
        assert_eq!(fs::read_to_string(&out).unwrap(), "foo");
        let _ = fs::remove_file(&out);
    }

    #[test]
    fn three_stage_pipeline() {
        let out = temp_path("pipe3");
        assert_eq!(
            run(&format!(
                "/bin/printf abc | /bin/cat | /bin/cat > {}\n",
                out.display()
            )),
            0
        );
        assert_eq!(fs::read_to_string(&out).unwrap(), "abc");
        let _ = fs::remove_file(&out);
    }

    #[test]
    fn pipeline_status_is_the_last_stage() {
        assert_eq!(run("/bin/false | /bin/true\n"), 0);
        assert_eq!(run("/bin/true | /bin/false\n"), 1);
    }

    #[test]
    fn and_or_short_circuits() {
        let skipped = temp_path("andor_skipped");
        let ran = temp_path("andor_ran");
        let _ = fs::remove_file(&skipped);

        assert_eq!(
            run(&format!(
                "/bin/false && /bin/echo skipped > {} || /bin/echo ran > {}\n",
                skipped.display(),
                ran.display()
            )),
            0
        );
        assert!(!skipped.exists());
        assert_eq!(fs::read_to_string(&ran).unwrap(), "ran\n");

        let _ = fs::remove_file(&ran);
    }

    #[test]
    fn and_runs_on_success() {
        let out = temp_path("and_yes");
        assert_eq!(
            run(&format!("/bin/true && /bin/echo yes > {}\n", out.display())),
            0
        );
        assert_eq!(fs::read_to_string(&out).unwrap(), "yes\n");
        let _ = fs::remove_file(&out);
    }

    #[test]
    fn or_skip_re_enables_following_and() {
        let skipped = temp_path("or_and_skipped");
        let ran = temp_path("or_and_ran");
        let _ = fs::remove_file(&skipped);

        // (true || a) && b: a is skipped, b runs.
        assert_eq!(
            run(&format!(
                "/bin/true || /bin/echo skipped > {} && /bin/echo ran > {}\n",
                skipped.display(),
                ran.display()
            )),
            0
        );
        assert!(!skipped.exists());
        assert_eq!(fs::read_to_string(&ran).unwrap(), "ran\n");

        let _ = fs::remove_file(&ran);
    }

    #[test]
    fn list_status_is_the_last_executed_command() {
        // The echo is suppressed, so the list keeps false's status.
        assert_eq!(run("/bin/false && /bin/true\n"), 1);
        assert_eq!(run("/bin/true || /bin/false\n"), 0);
    }
}
