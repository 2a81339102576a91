use std::io::{self, Write};

/// Reads interactive input one line at a time. `Ok(None)` means the input
/// is exhausted (e.g. Ctrl-D).
pub struct Prompt {
    prompt: String,
}

impl Prompt {
    pub fn new(prompt: &str) -> Self {
        Prompt {
            prompt: prompt.to_string(),
        }
    }

    pub fn read_line(&self) -> io::Result<Option<String>> {
        print!("{}", self.prompt);
        io::stdout().flush()?;

        let mut buf = String::new();
        if io::stdin().read_line(&mut buf)? == 0 {
            println!();
            return Ok(None);
        }
        Ok(Some(buf.trim_end().to_string()))
    }
}
