//! Secret references in `config.toml`.
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and keeps the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is used as written

/// Expands a value that may be a secret reference.
pub fn resolve(value: &str) -> Result<String, String> {
    if let Some(path) = value.strip_prefix("pass::") {
        from_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        std::env::var(var).map_err(|_| format!("environment variable `{var}` is not set"))
    } else {
        Ok(value.to_string())
    }
}

/// Like [`resolve`], for optional settings.
pub fn resolve_opt(value: Option<&str>) -> Result<Option<String>, String> {
    value.map(resolve).transpose()
}

/// True if `value` is a reference rather than an inline secret.
pub fn is_reference(value: &str) -> bool {
    value.starts_with("pass::") || value.starts_with("env::")
}

fn from_pass(path: &str) -> Result<String, String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| format!("failed to run `pass show {path}`: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "`pass show {path}` failed ({}): {}",
            output.status,
            stderr.trim()
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| format!("`pass show {path}` produced no output"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(resolve("ya29.token").unwrap(), "ya29.token");
        assert_eq!(resolve("").unwrap(), "");
        assert!(!is_reference("ya29.token"));
    }

    #[test]
    fn env_reference() {
        unsafe {
            std::env::set_var("_UNICAL_TEST_SECRET", "s3cret");
        }
        assert_eq!(resolve("env::_UNICAL_TEST_SECRET").unwrap(), "s3cret");
        assert_eq!(
            resolve_opt(Some("env::_UNICAL_TEST_SECRET")).unwrap(),
            Some("s3cret".to_string())
        );
        unsafe {
            std::env::remove_var("_UNICAL_TEST_SECRET");
        }
        assert!(is_reference("env::_UNICAL_TEST_SECRET"));
    }

    #[test]
    fn missing_env_var_errors() {
        let err = resolve("env::_UNICAL_DOES_NOT_EXIST_4242").unwrap_err();
        assert!(err.contains("not set"));
        assert_eq!(resolve_opt(None).unwrap(), None);
    }

    #[test]
    fn bad_pass_entry_errors() {
        assert!(resolve("pass::unical/does/not/exist/4242").is_err());
    }
}
