//! System prompt for the planner
//!
//! The prompt carries the platform knowledge the planner needs to turn a
//! plain-language request into Table API operations: which system tables
//! hold which configuration, how encoded queries are written, and the
//! working rules the agent follows (read before write, `u_` field prefix,
//! report sys_ids).

pub mod servicenow_prompt;

/// Builds the system prompt for a session against `instance`
///
/// # Arguments
///
/// * `instance` - Instance name or host shown to the planner
///
/// # Examples
///
/// ```
/// use snow_agent::prompts::build_system_prompt;
///
/// let prompt = build_system_prompt("dev12345");
/// assert!(prompt.contains("dev12345"));
/// assert!(prompt.contains("u_"));
/// ```
pub fn build_system_prompt(instance: &str) -> String {
    let instance = if instance.trim().is_empty() {
        "the configured instance"
    } else {
        instance.trim()
    };

    format!(
        "{}\n\nYou are connected to the ServiceNow instance: {}\n\n{}\n\n{}",
        servicenow_prompt::ROLE,
        instance,
        servicenow_prompt::PLATFORM_REFERENCE,
        servicenow_prompt::WORKING_RULES
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_instance() {
        let prompt = build_system_prompt("acme");
        assert!(prompt.contains("instance: acme"));
    }

    #[test]
    fn test_prompt_blank_instance() {
        let prompt = build_system_prompt("  ");
        assert!(prompt.contains("the configured instance"));
    }

    #[test]
    fn test_prompt_mentions_every_operation() {
        let prompt = build_system_prompt("acme");
        for operation in crate::operations::Operation::ALL {
            assert!(
                prompt.contains(operation.name()),
                "prompt does not mention {}",
                operation.name()
            );
        }
    }

    #[test]
    fn test_prompt_working_rules() {
        let prompt = build_system_prompt("acme");
        assert!(prompt.contains("u_"));
        assert!(prompt.contains("sys_dictionary"));
        assert!(prompt.contains("ORDERBY"));
        assert!(prompt.to_lowercase().contains("deactivate"));
    }
}
