use crate::admin::IdentifierFormat;
use crate::core::PeerId;

use super::{Config, ConfigLayer};

/// Defaults, then the user layer, then the cluster-local layer.
pub fn merge_layers(user: Option<ConfigLayer>, local: Option<ConfigLayer>) -> Config {
    let mut config = Config::default();
    if let Some(layer) = user {
        layer.apply_to(&mut config);
    }
    if let Some(layer) = local {
        layer.apply_to(&mut config);
    }
    config
}

pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |name| std::env::var(name).ok());
}

/// Apply `CMETA_*` overrides read through `lookup`. Blank values are
/// skipped; invalid ones are logged and skipped.
pub fn apply_overrides_from<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| {
        lookup(name)
            .map(|raw| raw.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(raw) = read("CMETA_IDENTIFIER_FORMAT") {
        match raw.parse::<IdentifierFormat>() {
            Ok(format) => config.admin.identifier_format = format,
            Err(err) => {
                tracing::warn!("invalid CMETA_IDENTIFIER_FORMAT, ignoring: {err}");
            }
        }
    }

    if let Some(raw) = read("CMETA_MAX_METADATA_BYTES") {
        match raw.parse::<usize>() {
            Ok(value) => config.limits.max_metadata_bytes = value,
            Err(err) => {
                tracing::warn!("invalid CMETA_MAX_METADATA_BYTES, ignoring: {err}");
            }
        }
    }

    if let Some(raw) = read("CMETA_PEER_ID") {
        match PeerId::parse_str(&raw) {
            Ok(peer) => config.node.peer_id = Some(peer),
            Err(err) => {
                tracing::warn!("invalid CMETA_PEER_ID, ignoring: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use crate::config::LogFormat;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn merge_layers_respects_precedence() {
        let mut user = ConfigLayer::default();
        user.admin.identifier_format = Some(IdentifierFormat::Uuid);
        user.logging.stdout_format = Some(LogFormat::Json);

        let mut local = ConfigLayer::default();
        local.admin.identifier_format = Some(IdentifierFormat::Name);

        let config = merge_layers(Some(user), Some(local));
        assert_eq!(config.admin.identifier_format, IdentifierFormat::Name);
        assert_eq!(config.logging.stdout_format, LogFormat::Json);
    }

    #[test]
    fn env_overrides_apply() {
        let peer = "5f1c3b1e-8a3e-4a52-9d6a-0c1d2e3f4a5b";
        let mut config = Config::default();
        apply_overrides_from(
            &mut config,
            env(&[
                ("CMETA_IDENTIFIER_FORMAT", "uuid"),
                ("CMETA_MAX_METADATA_BYTES", " 4096 "),
                ("CMETA_PEER_ID", peer),
            ]),
        );

        assert_eq!(config.admin.identifier_format, IdentifierFormat::Uuid);
        assert_eq!(config.limits.max_metadata_bytes, 4096);
        assert_eq!(config.node.peer_id, Some(PeerId::parse_str(peer).unwrap()));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut config = Config::default();
        apply_overrides_from(
            &mut config,
            env(&[
                ("CMETA_IDENTIFIER_FORMAT", "hex"),
                ("CMETA_MAX_METADATA_BYTES", "lots"),
                ("CMETA_PEER_ID", "not-a-uuid"),
            ]),
        );

        assert_eq!(config.admin.identifier_format, IdentifierFormat::Name);
        assert_eq!(
            config.limits.max_metadata_bytes,
            crate::core::Limits::default().max_metadata_bytes
        );
        assert_eq!(config.node.peer_id, None);
    }

    #[test]
    fn blank_values_are_skipped() {
        let mut config = Config::default();
        apply_overrides_from(&mut config, env(&[("CMETA_IDENTIFIER_FORMAT", "  ")]));
        assert_eq!(config.admin.identifier_format, IdentifierFormat::Name);
    }
}
