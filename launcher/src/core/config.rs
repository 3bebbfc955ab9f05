//! Deployment configuration resolved once from the process environment.
//!
//! The environment is captured into an [`EnvSnapshot`] at startup and every
//! component reads from that snapshot or from the [`DeploymentConfig`]
//! derived from it. Nothing below `main` consults the live environment.

use std::collections::BTreeMap;

use crate::core::platform::detect_platform;
use crate::core::types::Platform;
use crate::error::LaunchError;

/// Identity values the artifact cannot run without.
pub const REQUIRED_VARS: [&str; 2] = ["SESSION_ID", "OWNER_NUMBER"];

/// Runtime tunables forwarded to the artifact only when set.
pub const OPTIONAL_VARS: [&str; 6] = [
    "PREFIX",
    "BOT_NAME",
    "MODE",
    "AUTO_READ",
    "ANTI_DELETE",
    "MONGO_URI",
];

pub const DEFAULT_BRANCH: &str = "master";

/// Immutable copy of the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Non-empty value of `name`. An empty string counts as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// True if `name` is defined at all, even as an empty string.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

/// Validated deployment settings. Constructed once; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub session_id: String,
    pub owner_number: String,
    /// Optional tunables that were set, keyed by variable name.
    pub optional: BTreeMap<&'static str, String>,
    /// `DOCKER_IMAGE` override for the image reference.
    pub image_override: Option<String>,
    /// `USE_DOCKER`: `Some(true)` forces the container path, `Some(false)`
    /// forbids it, `None` leaves the choice to host detection.
    pub use_container: Option<bool>,
    /// `GITLAB_TOKEN` for the authenticated clone.
    pub access_token: Option<String>,
    pub branch: String,
    pub platform: Option<Platform>,
}

impl DeploymentConfig {
    /// Resolve configuration, reporting every missing mandatory variable at once.
    pub fn resolve(env: &EnvSnapshot) -> Result<Self, LaunchError> {
        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|name| env.get(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(LaunchError::MissingRequiredConfig { names: missing });
        }

        let optional = OPTIONAL_VARS
            .iter()
            .filter_map(|name| env.get(name).map(|value| (*name, value.to_string())))
            .collect();

        Ok(Self {
            session_id: required(env, "SESSION_ID"),
            owner_number: required(env, "OWNER_NUMBER"),
            optional,
            image_override: env.get("DOCKER_IMAGE").map(str::to_string),
            use_container: env.get("USE_DOCKER").and_then(parse_flag),
            access_token: env.get("GITLAB_TOKEN").map(str::to_string),
            branch: env
                .get("BRANCH")
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .unwrap_or(DEFAULT_BRANCH)
                .to_string(),
            platform: detect_platform(env),
        })
    }

    /// Variables injected into the artifact's environment: mandatory first,
    /// then each optional one that was set, in declaration order.
    pub fn forwarded_env(&self) -> Vec<(&'static str, &str)> {
        let mut vars = vec![
            ("SESSION_ID", self.session_id.as_str()),
            ("OWNER_NUMBER", self.owner_number.as_str()),
        ];
        for name in OPTIONAL_VARS {
            if let Some(value) = self.optional.get(name) {
                vars.push((name, value.as_str()));
            }
        }
        vars
    }

    /// Image reference to pull: the override if set, else `default`.
    pub fn image<'a>(&'a self, default: &'a str) -> &'a str {
        self.image_override.as_deref().unwrap_or(default)
    }
}

fn required(env: &EnvSnapshot, name: &str) -> String {
    env.get(name).unwrap_or_default().to_string()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![("SESSION_ID", "abc"), ("OWNER_NUMBER", "123")]
    }

    #[test]
    fn reports_every_missing_required_var() {
        let cases: [(&[(&str, &str)], &[&str]); 4] = [
            (&[], &["SESSION_ID", "OWNER_NUMBER"]),
            (&[("SESSION_ID", "abc")], &["OWNER_NUMBER"]),
            (&[("OWNER_NUMBER", "123")], &["SESSION_ID"]),
            (
                &[("SESSION_ID", ""), ("OWNER_NUMBER", "")],
                &["SESSION_ID", "OWNER_NUMBER"],
            ),
        ];
        for (pairs, expected) in cases {
            let env = EnvSnapshot::from_pairs(pairs.iter().copied());
            match DeploymentConfig::resolve(&env) {
                Err(LaunchError::MissingRequiredConfig { names }) => {
                    assert_eq!(names, expected, "pairs: {pairs:?}");
                }
                other => panic!("expected missing config for {pairs:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn optional_vars_forwarded_only_when_set() {
        let mut pairs = base();
        pairs.push(("PREFIX", "."));
        pairs.push(("MODE", ""));
        pairs.push(("MONGO_URI", "mongodb://db"));
        let cfg = DeploymentConfig::resolve(&EnvSnapshot::from_pairs(pairs)).expect("resolve");

        assert_eq!(
            cfg.forwarded_env(),
            vec![
                ("SESSION_ID", "abc"),
                ("OWNER_NUMBER", "123"),
                ("PREFIX", "."),
                ("MONGO_URI", "mongodb://db"),
            ]
        );
    }

    #[test]
    fn branch_defaults_to_master() {
        let cfg = DeploymentConfig::resolve(&EnvSnapshot::from_pairs(base())).expect("resolve");
        assert_eq!(cfg.branch, "master");

        let mut pairs = base();
        pairs.push(("BRANCH", "beta"));
        let cfg = DeploymentConfig::resolve(&EnvSnapshot::from_pairs(pairs)).expect("resolve");
        assert_eq!(cfg.branch, "beta");
    }

    #[test]
    fn use_docker_parses_explicit_values_only() {
        for (raw, expected) in [
            ("true", Some(true)),
            (" TRUE ", Some(true)),
            ("false", Some(false)),
            ("yes", None),
        ] {
            let mut pairs = base();
            pairs.push(("USE_DOCKER", raw));
            let cfg = DeploymentConfig::resolve(&EnvSnapshot::from_pairs(pairs)).expect("resolve");
            assert_eq!(cfg.use_container, expected, "raw: {raw:?}");
        }
    }

    #[test]
    fn image_override_wins_over_default() {
        let cfg = DeploymentConfig::resolve(&EnvSnapshot::from_pairs(base())).expect("resolve");
        assert_eq!(cfg.image("registry/app:1"), "registry/app:1");

        let mut pairs = base();
        pairs.push(("DOCKER_IMAGE", "registry/app:2"));
        let cfg = DeploymentConfig::resolve(&EnvSnapshot::from_pairs(pairs)).expect("resolve");
        assert_eq!(cfg.image("registry/app:1"), "registry/app:2");
    }
}
