//! Rough password strength rating shown next to stored credentials.
//!
//! One point each for lowercase, uppercase, digits and symbols, plus one
//! per length step (8, 12, 16, 20).  Anything under 8 characters is weak
//! regardless of its character mix.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    Weak,
    Average,
    Strong,
    Excellent,
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strength::Weak => "Weak",
            Strength::Average => "Average",
            Strength::Strong => "Strong",
            Strength::Excellent => "Excellent",
        })
    }
}

/// Rate `password`.
pub fn classify(password: &str) -> Strength {
    let len = password.chars().count();
    if len < 8 {
        return Strength::Weak;
    }

    let classes = [
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace()),
    ];
    let score = classes.iter().filter(|&&present| present).count()
        + [8, 12, 16, 20].iter().filter(|&&step| len >= step).count();

    match score {
        0..=3 => Strength::Weak,
        4..=5 => Strength::Average,
        6..=7 => Strength::Strong,
        _ => Strength::Excellent,
    }
}
