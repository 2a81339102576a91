use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prompt: "$ ".to_string(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `~/.ratshrc`-style `key=value` lines. A missing file means the
    /// defaults apply; malformed content is an error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let file = File::open(path).map_err(ConfigError::Io)?;
        let mut src = String::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(ConfigError::Io)?;
            src.push_str(&line);
            src.push('\n');
        }
        Self::load_from_str(&src)
    }

    pub fn load_from_str(src: &str) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        for (lineno, line) in src.lines().enumerate() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Parse(format!(
                    "line {}: no '=' found: {}",
                    lineno + 1,
                    line
                )));
            };
            match key.trim() {
                "prompt" => config.prompt = value.to_string(),
                key => {
                    return Err(ConfigError::Parse(format!(
                        "line {}: unknown key: {}",
                        lineno + 1,
                        key
                    )))
                }
            }
        }

        Ok(config)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}
