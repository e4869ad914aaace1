//! Credentials that never appear in serialized form

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// An API credential, given directly or read from the environment
#[derive(Debug, Clone)]
pub enum Secret {
    /// Explicit token value; serializes to a redacted marker only
    Token(SecretString),
    /// First set variable among `env_vars`
    EnvVar {
        env_vars: Vec<String>,
        /// Fail resolution when none of the variables is set
        strict: bool,
    },
}

impl Secret {
    pub fn from_token(token: impl Into<String>) -> Self {
        Self::Token(SecretString::from(token.into()))
    }

    pub fn from_env_vars<I, S>(env_vars: I, strict: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::EnvVar {
            env_vars: env_vars.into_iter().map(Into::into).collect(),
            strict,
        }
    }

    /// Resolve the credential value
    ///
    /// Returns `None` for a non-strict env-var secret whose variables are all unset.
    pub fn resolve_value(&self) -> Result<Option<SecretString>, CoreError> {
        match self {
            Self::Token(token) => Ok(Some(token.clone())),
            Self::EnvVar { env_vars, strict } => {
                let found = env_vars
                    .iter()
                    .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()));

                match found {
                    Some(value) => Ok(Some(SecretString::from(value))),
                    None if *strict => Err(CoreError::config(format!(
                        "none of the following authentication environment variables are set: {env_vars:?}"
                    ))),
                    None => Ok(None),
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SerializedSecret {
    Token,
    EnvVar { env_vars: Vec<String>, strict: bool },
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            Self::Token(_) => SerializedSecret::Token,
            Self::EnvVar { env_vars, strict } => SerializedSecret::EnvVar {
                env_vars: env_vars.clone(),
                strict: *strict,
            },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match SerializedSecret::deserialize(deserializer)? {
            SerializedSecret::Token => Err(serde::de::Error::custom(
                "token secrets are redacted when serialized and cannot be restored; use an environment variable",
            )),
            SerializedSecret::EnvVar { env_vars, strict } => Ok(Self::EnvVar { env_vars, strict }),
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;
    use serde_json::json;

    use super::*;

    #[test]
    fn token_serializes_without_plaintext() {
        let secret = Secret::from_token("hf_supersecret");
        let value = serde_json::to_value(&secret).unwrap();

        assert_eq!(value, json!({"type": "token"}));
        assert!(!value.to_string().contains("hf_supersecret"));
        assert!(!format!("{secret:?}").contains("hf_supersecret"));
    }

    #[test]
    fn token_marker_cannot_be_restored() {
        let result = serde_json::from_value::<Secret>(json!({"type": "token"}));
        assert!(result.is_err());
    }

    #[test]
    fn env_var_round_trips() {
        let secret = Secret::from_env_vars(["A_TOKEN", "B_TOKEN"], false);
        let value = serde_json::to_value(&secret).unwrap();
        assert_eq!(value, json!({"type": "env_var", "env_vars": ["A_TOKEN", "B_TOKEN"], "strict": false}));

        let restored: Secret = serde_json::from_value(value).unwrap();
        assert!(matches!(restored, Secret::EnvVar { strict: false, ref env_vars } if env_vars.len() == 2));
    }

    #[test]
    fn env_var_resolves_first_set_variable() {
        temp_env::with_vars([("WEFT_T1", None), ("WEFT_T2", Some("second"))], || {
            let secret = Secret::from_env_vars(["WEFT_T1", "WEFT_T2"], true);
            let value = secret.resolve_value().unwrap().unwrap();
            assert_eq!(value.expose_secret(), "second");
        });
    }

    #[test]
    fn strictness_controls_missing_variables() {
        temp_env::with_var_unset("WEFT_MISSING", || {
            assert!(Secret::from_env_vars(["WEFT_MISSING"], false).resolve_value().unwrap().is_none());
            assert!(matches!(
                Secret::from_env_vars(["WEFT_MISSING"], true).resolve_value(),
                Err(CoreError::InvalidConfig(_))
            ));
        });
    }
}
