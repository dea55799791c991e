//! Resume ingestion boundary: file-kind allow-list and profile guessing from extracted text.
//!
//! Text extraction happens client-side; the server only sees the file name and the text.

use lazy_static::lazy_static;
use regex::Regex;

use crate::domain::{CandidateProfile, ProfileField};

/// Accepted resume extensions (lowercase, without the dot).
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["pdf", "docx"];

lazy_static! {
  static ref EMAIL_PATTERN: Regex =
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("email pattern");

  /// Loose phone run; digit count is checked separately.
  static ref PHONE_PATTERN: Regex =
    Regex::new(r"\+?\(?[0-9][0-9()\-. \t]{8,}[0-9]").expect("phone pattern");
}

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;
const NAME_SCAN_LINES: usize = 5;

pub fn is_supported_resume(file_name: &str) -> bool {
  let Some((stem, ext)) = file_name.trim().rsplit_once('.') else {
    return false;
  };
  !stem.is_empty() && ACCEPTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

fn guess_email(text: &str) -> Option<String> {
  EMAIL_PATTERN
    .find(text)
    .map(|m| m.as_str().trim_end_matches('.').to_string())
}

fn guess_phone(text: &str) -> Option<String> {
  PHONE_PATTERN.find_iter(text).find_map(|m| {
    let candidate = m.as_str().trim();
    let digits = candidate.chars().filter(char::is_ascii_digit).count();
    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS)
      .contains(&digits)
      .then(|| candidate.to_string())
  })
}

fn looks_like_name(line: &str) -> bool {
  let words: Vec<&str> = line.split_whitespace().collect();
  if !(2..=4).contains(&words.len()) {
    return false;
  }
  let lower = line.to_lowercase();
  if ["resume", "résumé", "curriculum", "cv"].iter().any(|w| lower.split_whitespace().any(|t| t == *w)) {
    return false;
  }
  words
    .iter()
    .all(|w| w.chars().all(|c| c.is_alphabetic() || matches!(c, '.' | '-' | '\'')) && w.chars().any(char::is_alphabetic))
}

fn guess_name(text: &str) -> Option<String> {
  text
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .take(NAME_SCAN_LINES)
    .find(|l| looks_like_name(l))
    .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Heuristic profile from resume text. Fields the client already supplied win.
pub fn guess_profile(text: &str, explicit: Option<&CandidateProfile>) -> CandidateProfile {
  let mut profile = CandidateProfile {
    name: guess_name(text),
    email: guess_email(text),
    phone: guess_phone(text),
  };
  if let Some(explicit) = explicit {
    for field in ProfileField::ALL {
      if let Some(v) = explicit.get(field) {
        profile.set(field, v.to_string());
      }
    }
  }
  profile
}
