use std::io::Write;

use crate::error::Result;

pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [s/N] ");
    std::io::stdout().flush()?;

    let mut s = String::new();
    std::io::stdin().read_line(&mut s)?;
    Ok(parse_yes(&s))
}

fn parse_yes(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "s" | "sim" | "y" | "yes")
}
