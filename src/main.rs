use log::debug;

use ratsh::config::{Config, ConfigLoader};
use ratsh::prompt::Prompt;
use ratsh::shell::Shell;

fn main() {
    env_logger::init();

    let config = load_config();
    let prompt = Prompt::new(&config.prompt);
    let mut shell = Shell::new();

    loop {
        let line = match prompt.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                eprintln!("ratsh: error reading input: {}", err);
                break;
            }
        };

        if line == "exit" {
            break;
        }

        // Lines are lexed with their terminating newline.
        let mut input = line;
        input.push('\n');

        let code = shell.run_single_line(&input);
        debug!("exit status: {}", code);
    }
}

fn load_config() -> Config {
    let Ok(home) = std::env::var("HOME") else {
        return Config::default();
    };

    let path = std::path::Path::new(&home).join(".ratshrc");
    if !path.exists() {
        return Config::default();
    }

    match ConfigLoader::load_from_file(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ratsh: {}: {}", path.display(), err);
            Config::default()
        }
    }
}
