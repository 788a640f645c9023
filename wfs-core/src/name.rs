//! Filename validation for `mknod`/`mkdir`.

use crate::dentry::MAX_FILE_NAME_LEN;
use crate::error::Result;
use crate::error::WfsError;

/// Validates a filename per §4.4's rule: at most 31 bytes (room for a NUL
/// terminator in the 32-byte dentry field), and if the name contains a `.`,
/// the substring after the *last* `.` must be alphanumeric-or-underscore.
///
/// A name with no `.` at all is valid outright: "no dot" trivially passes
/// the suffix check, and "empty suffix" (a trailing dot, or leading dots
/// with nothing after the last one) is vacuously alphanumeric-or-underscore.
/// `..foo_` is valid: the suffix after its last `.` is `foo_`. `foo.!` is
/// invalid: `!` fails the check.
pub fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= MAX_FILE_NAME_LEN {
        return Err(WfsError::InvalidName);
    }
    if let Some(dot) = name.rfind('.') {
        let suffix = &name[dot + 1..];
        if !suffix.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(WfsError::InvalidName);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_is_valid() {
        assert!(validate_filename("hello").is_ok());
    }

    #[test]
    fn leading_dots_with_trailing_word_is_valid() {
        assert!(validate_filename("..foo_").is_ok());
    }

    #[test]
    fn punctuation_after_dot_is_invalid() {
        assert!(validate_filename("foo.!").is_err());
    }

    #[test]
    fn underscore_and_alphanumeric_suffix_is_valid() {
        assert!(validate_filename("archive.tar_1").is_ok());
    }

    #[test]
    fn empty_name_is_invalid() {
        assert!(validate_filename("").is_err());
    }

    #[test]
    fn name_at_the_length_limit_is_invalid() {
        let name = "a".repeat(MAX_FILE_NAME_LEN);
        assert!(validate_filename(&name).is_err());
        let name = "a".repeat(MAX_FILE_NAME_LEN - 1);
        assert!(validate_filename(&name).is_ok());
    }
}
