//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::vault::{strength, Note, Vault};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print every credential as (Service, #, Username, Strength, Metadata).
/// Passwords are never shown here.
pub fn print_credentials_table(vault: &Vault) {
    if vault.credential_count() == 0 {
        info("No credentials in this vault yet.");
        tip("Run `lockbox add <service> <username>` to add one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Service", "#", "Username", "Strength", "Metadata"]);

    for service in vault.services() {
        let Ok(credentials) = vault.credentials(service) else {
            continue;
        };
        for (i, c) in credentials.iter().enumerate() {
            table.add_row(vec![
                service.to_string(),
                (i + 1).to_string(),
                c.username.clone(),
                strength::classify(&c.password).to_string(),
                c.metadata.clone().unwrap_or_default(),
            ]);
        }
    }

    println!("{table}");
}

/// Print note titles with their size.
pub fn print_notes_table(notes: &[Note]) {
    if notes.is_empty() {
        info("No notes in this vault yet.");
        tip("Run `lockbox note add <title>` to add one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Title", "Characters"]);

    for n in notes {
        table.add_row(vec![n.title.clone(), n.content.chars().count().to_string()]);
    }

    println!("{table}");
}

/// Print a two-column key/value table (used by `status`).
pub fn print_status_table(rows: &[(&str, String)]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    for (key, value) in rows {
        table.add_row(vec![key.to_string(), value.clone()]);
    }
    println!("{table}");
}
