/// Get environment variable with TOLLGATE_ prefix, falling back to unprefixed version
///
/// The unprefixed fallback keeps `.env` files written for the earlier bot
/// (`TOKEN`, `GUILD_ID`, `ROLE_1T_ID`, ...) working unchanged.
///
/// # Examples
///
/// ```rust
/// use tollgate::utils::get_env_with_prefix;
///
/// // Checks TOLLGATE_GUILD_ID first, then GUILD_ID
/// let guild = get_env_with_prefix("GUILD_ID");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("TOLLGATE_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("TOLLGATE_ENV_TEST_VAR", "prefixed_value");
            std::env::set_var("ENV_TEST_VAR", "unprefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("ENV_TEST_VAR"),
            Some("prefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("TOLLGATE_ENV_TEST_VAR");
        }
        assert_eq!(
            get_env_with_prefix("ENV_TEST_VAR"),
            Some("unprefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("ENV_TEST_VAR");
        }

        assert_eq!(get_env_with_prefix("ENV_TEST_MISSING_VAR"), None);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        unsafe {
            std::env::set_var("TOLLGATE_ENV_TEST_BLANK", "   ");
        }
        assert_eq!(get_env_with_prefix("ENV_TEST_BLANK"), None);
        unsafe {
            std::env::remove_var("TOLLGATE_ENV_TEST_BLANK");
        }
    }
}
