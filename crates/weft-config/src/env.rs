use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Expand `${VAR}` and `${VAR:-default}` placeholders in raw config text
///
/// An unset (or empty) variable falls back to its default when one is given
/// and is an error otherwise. Lines whose first non-blank character is `#`
/// are copied through untouched.
pub fn expand_env(input: &str) -> Result<String, String> {
    fn re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("must be valid regex"))
    }

    let mut expanded = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            expanded.push(line.to_owned());
            continue;
        }

        let mut missing = None;
        let replaced = re().replace_all(line, |caps: &Captures<'_>| {
            let name = &caps[1];
            match std::env::var(name).ok().filter(|v| !v.is_empty()) {
                Some(value) => value,
                None => match caps.get(2) {
                    Some(default) => default.as_str().to_owned(),
                    None => {
                        missing.get_or_insert_with(|| name.to_owned());
                        String::new()
                    }
                },
            }
        });

        if let Some(name) = missing {
            return Err(format!("environment variable not set: `{name}`"));
        }

        expanded.push(replaced.into_owned());
    }

    let mut output = expanded.join("\n");
    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}
