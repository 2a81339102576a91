use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Shell surface of a built-in utility: it receives the full argument vector
/// (name included) and returns an exit code. Built-ins run in the shell
/// process, after redirections are applied and without forking.
pub trait BuiltinCommand {
    fn name(&self) -> &'static str;
    fn run(&self, argv: &[String]) -> i32;
}

pub struct BuiltinManager {
    commands: HashMap<String, Box<dyn BuiltinCommand>>,
}

impl BuiltinManager {
    pub fn new() -> Self {
        let mut manager = BuiltinManager {
            commands: HashMap::new(),
        };
        manager.register(Box::new(CdCommand));
        manager.register(Box::new(PwdCommand));
        manager
    }

    pub fn register(&mut self, command: Box<dyn BuiltinCommand>) {
        self.commands.insert(command.name().to_string(), command);
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Runs the built-in named by `argv[0]`, or returns `None` when the name
    /// is not a built-in.
    pub fn run(&self, argv: &[String]) -> Option<i32> {
        let name = argv.first()?;
        let command = self.commands.get(name.as_str())?;
        Some(command.run(argv))
    }
}

impl Default for BuiltinManager {
    fn default() -> Self {
        BuiltinManager::new()
    }
}

pub struct CdCommand;

impl BuiltinCommand for CdCommand {
    fn name(&self) -> &'static str {
        "cd"
    }

    // https://pubs.opengroup.org/onlinepubs/9699919799/utilities/cd.html#tag_20_14
    fn run(&self, argv: &[String]) -> i32 {
        if argv.is_empty() || argv.len() > 2 {
            return 1;
        }

        let mut path = match argv.get(1) {
            Some(operand) => operand.clone(),
            None => match env::var("HOME") {
                Ok(home) => home,
                Err(_) => {
                    eprintln!("cd: failed to get $HOME");
                    return 1;
                }
            },
        };

        let pwd = match env::var("PWD") {
            Ok(pwd) => pwd,
            Err(_) => {
                eprintln!("cd: failed to get $PWD");
                return 1;
            }
        };

        let mut using_old_pwd = false;
        if path == "-" {
            match env::var("OLDPWD") {
                Ok(old_pwd) => {
                    path = old_pwd;
                    using_old_pwd = true;
                }
                Err(_) => {
                    eprintln!("cd: $OLDPWD is not set");
                    return 1;
                }
            }
        }

        let new_pwd: PathBuf = match fs::canonicalize(&path) {
            Ok(canonical) => canonical,
            Err(err) => {
                eprintln!("cd: {}: {}", path, err);
                return 1;
            }
        };

        if let Err(err) = env::set_current_dir(&new_pwd) {
            eprintln!("cd: {}: {}", new_pwd.display(), err);
            return 1;
        }

        if using_old_pwd {
            println!("{}", new_pwd.display());
        }

        env::set_var("PWD", &new_pwd);
        env::set_var("OLDPWD", &pwd);

        0
    }
}

pub struct PwdCommand;

impl BuiltinCommand for PwdCommand {
    fn name(&self) -> &'static str {
        "pwd"
    }

    // https://pubs.opengroup.org/onlinepubs/9699919799/utilities/pwd.html
    fn run(&self, _argv: &[String]) -> i32 {
        let pwd = match env::var("PWD") {
            Ok(pwd) => pwd,
            Err(_) => {
                eprintln!("pwd: failed to get $PWD");
                return 1;
            }
        };

        match fs::canonicalize(&pwd) {
            Ok(path) => {
                println!("{}", path.display());
                0
            }
            Err(err) => {
                eprintln!("pwd: {}: {}", pwd, err);
                1
            }
        }
    }
}
