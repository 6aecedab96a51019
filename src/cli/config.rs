//! Connection configuration for CLI commands.

use crate::Result;
use crate::config::{ClientConfig, ConfigFile};
use std::path::Path;
use tracing::debug;

/// Resolves the client configuration for a CLI invocation.
///
/// The optional TOML file supplies the connection; `url` (from `--url` or
/// `POLYSTORE_URL`) replaces the file's URL when given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if no
/// connection is configured at all.
pub fn load_client_config(path: Option<&Path>, url: Option<&str>) -> Result<ClientConfig> {
    let file = match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading config file");
            ConfigFile::load(path)?
        },
        None => ConfigFile::default(),
    };
    file.into_client_config(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::config::BackendType;
    use std::io::Write;

    #[test]
    fn test_url_without_file() {
        let config = load_client_config(None, Some("redis://cache/4")).unwrap();
        assert_eq!(config.backend_type, Some(BackendType::Redis));
        assert_eq!(config.database, "4");
    }

    #[test]
    fn test_nothing_configured() {
        assert!(matches!(
            load_client_config(None, None),
            Err(Error::Configuration(msg)) if msg == "connection string required"
        ));
    }

    #[test]
    fn test_url_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[connection]\nurl = \"mysql://app@db/tasks\"\n\n[[flag_aliases]]\ncanonical = \"done\"\nlegacy = \"is_done\""
        )
        .unwrap();

        let config = load_client_config(Some(file.path()), None).unwrap();
        assert_eq!(config.backend_type, Some(BackendType::MySql));
        assert_eq!(config.flag_aliases.len(), 1);

        let config =
            load_client_config(Some(file.path()), Some("mongodb://other/inventory")).unwrap();
        assert_eq!(config.backend_type, Some(BackendType::MongoDb));
        assert_eq!(config.database, "inventory");
        assert_eq!(config.flag_aliases.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let err = load_client_config(Some(Path::new("/nonexistent/polystore.toml")), None);
        assert!(matches!(err, Err(Error::OperationFailed { .. })));
    }
}
