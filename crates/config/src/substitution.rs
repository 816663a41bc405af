use anyhow::Result;
use regex::Regex;
use std::env;
use tracing::{debug, warn};

/// Substitute environment variables in the format ${VAR_NAME}
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)\}")?;
    let mut result = content.to_string();
    let mut missing_vars = Vec::new();

    for caps in re.captures_iter(content) {
        let (Some(placeholder), Some(var)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let var_name = var.as_str();
        match env::var(var_name) {
            Ok(value) => {
                debug!("Substituting environment variable: {}", var_name);
                result = result.replace(placeholder.as_str(), &value);
            }
            Err(_) => {
                warn!("Environment variable '{}' not set", var_name);
                missing_vars.push(var_name.to_string());
                // keep the placeholder; validation will catch it later
            }
        }
    }

    if !missing_vars.is_empty() {
        debug!(
            "Environment variables not set (may fail validation): {:?}",
            missing_vars
        );
    }

    Ok(result)
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    Regex::new(r"\$\{(\w+)\}")
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitution() {
        env::set_var("OPENTERM_TEST_SYMBOL", "USDC");
        let result = substitute_env_vars("symbol: ${OPENTERM_TEST_SYMBOL}").unwrap();
        assert_eq!(result, "symbol: USDC");
    }

    #[test]
    fn test_missing_var_keeps_placeholder() {
        let result = substitute_env_vars("symbol: ${OPENTERM_TEST_UNSET_VAR}").unwrap();
        assert!(has_unresolved_env_vars(&result));
    }
}
