/// Read an environment variable with the `FRONTBRIDGE_` prefix, falling back to the bare name
///
/// `get_env_with_prefix("WEBHOOK_SECRET")` checks `FRONTBRIDGE_WEBHOOK_SECRET`
/// first, then `WEBHOOK_SECRET`, so deployments that already export the
/// unprefixed names keep working.
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("FRONTBRIDGE_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse an environment variable into `T`, ignoring values that fail to parse
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = get_env_with_prefix(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment variable");
            None
        }
    }
}
