//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// First `max` characters of `s` (char boundary safe).
pub fn truncate_chars(s: &str, max: usize) -> String {
  s.chars().take(max).collect()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    format!("{}… ({} bytes total)", truncate_chars(s, max), s.len())
  }
}

/// Whitespace-trimmed, `None` when empty.
pub fn non_blank(s: &str) -> Option<&str> {
  let t = s.trim();
  if t.is_empty() { None } else { Some(t) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_every_occurrence() {
    assert_eq!(fill_template("{a}-{b}-{a}", &[("a", "1"), ("b", "2")]), "1-2-1");
    assert_eq!(fill_template("{missing}", &[]), "{missing}");
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    assert_eq!(truncate_chars("héllo", 2), "hé");
    assert_eq!(trunc_for_log("short", 10), "short");
    assert!(trunc_for_log("ééééé", 2).starts_with("éé…"));
  }

  #[test]
  fn non_blank_trims() {
    assert_eq!(non_blank("  a "), Some("a"));
    assert_eq!(non_blank(" \n"), None);
  }
}
