//! Loop Item Discovery and Substitution
//!
//! A loop step's command prints one item per line. Each item is
//! substituted for the `{{variable}}` token in the step's title and body.

/// Placeholder form of a loop variable.
///
/// # Example
/// ```
/// use workflat::workflow::loops::variable_token;
///
/// assert_eq!(variable_token("file"), "{{file}}");
/// ```
pub fn variable_token(variable: &str) -> String {
    format!("{{{{{}}}}}", variable)
}

/// Splits command output into items: one per line, trimmed, blanks dropped.
///
/// # Example
/// ```
/// use workflat::workflow::loops::split_items;
///
/// let items = split_items("alpha\n\n  beta  \r\n");
/// assert_eq!(items, vec!["alpha", "beta"]);
/// ```
pub fn split_items(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Replaces every occurrence of the variable's token with `item`.
pub fn substitute(text: &str, variable: &str, item: &str) -> String {
    text.replace(&variable_token(variable), item)
}

/// Checks whether `text` references the variable.
pub fn uses_variable(text: &str, variable: &str) -> bool {
    text.contains(&variable_token(variable))
}
