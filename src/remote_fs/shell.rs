//! Shell quoting for every command execfs builds
//!
//! Remote commands are parsed by the user's login shell, so every path,
//! name and payload interpolated into one goes through [`quote`].

/// Wrap `s` in single quotes so the shell passes it through as one literal
/// word. Embedded single quotes become `'\''`.
///
/// ```
/// use execfs::remote_fs::shell::quote;
/// assert_eq!(quote("a b"), "'a b'");
/// assert_eq!(quote("it's"), r"'it'\''s'");
/// ```
pub fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for c in s.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}
