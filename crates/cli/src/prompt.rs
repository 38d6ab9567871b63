use anyhow::{Context, Result};
use std::io::Write;
use zeroize::Zeroizing;

/// Read a line from stdin after printing `prompt`.
pub fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .context("failed to read input")?;
    Ok(input.trim().to_string())
}

/// Read a password without echoing it.
pub fn read_password(prompt: &str) -> Result<Zeroizing<String>> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let password = rpassword::read_password().context("failed to read password")?;
    Ok(Zeroizing::new(password.trim().to_string()))
}
