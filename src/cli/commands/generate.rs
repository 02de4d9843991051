//! `lockbox generate` — print a random password.

use crate::cli::check_length;
use crate::errors::Result;
use crate::vault::generate_password;

/// Execute the `generate` command.
pub fn execute(length: usize) -> Result<()> {
    check_length(length)?;
    let password = generate_password(length);
    println!("{}", password.as_str());
    Ok(())
}
