use std::fs;
use std::path::Path;

use serde::Deserialize;
use wispwire_conn::ConnectionConfig;
use wispwire_transport::LinkSpec;

use crate::exit::{conn_error, io_error, CliError, CliResult};
use crate::logging::{LogFormat, LogLevel};

/// Settings read from `--config <file.json>`.
///
/// Every key is optional. Command-line flags win over the file.
///
/// ```json
/// {
///   "link": { "kind": "tcp", "addr": "10.0.0.7:5000" },
///   "connection": { "inbound_capacity": 1, "inbound_policy": "drop_oldest" },
///   "log_level": "debug"
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub link: Option<LinkSpec>,
    pub connection: ConnectionConfig,
    pub log_format: Option<LogFormat>,
    pub log_level: Option<LogLevel>,
}

impl FileConfig {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        Self::parse(&text)
            .map_err(|err| CliError::new(err.code, format!("{}: {}", path.display(), err.message)))
    }

    fn parse(text: &str) -> CliResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| CliError::usage(format!("invalid config file: {err}")))?;
        config
            .connection
            .validate()
            .map_err(|err| conn_error("invalid config file", err))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wispwire_conn::OverflowPolicy;
    use wispwire_frame::WireFormat;

    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn empty_object_is_all_defaults() {
        let config = FileConfig::parse("{}").unwrap();
        assert!(config.link.is_none());
        assert_eq!(config.connection, ConnectionConfig::default());
        assert!(config.log_level.is_none());
    }

    #[test]
    fn parses_link_and_connection() {
        let config = FileConfig::parse(
            r#"{
                "link": {"kind": "serial", "path": "/dev/ttyUSB0", "baud": 115200},
                "connection": {
                    "wire": {"kind": "fixed", "payload_len": 40},
                    "inbound_capacity": 1,
                    "inbound_policy": "drop_oldest",
                    "poll_interval_ms": 25,
                    "write_timeout_ms": null
                },
                "log_format": "json"
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.link,
            Some(LinkSpec::Serial {
                path: "/dev/ttyUSB0".into(),
                baud: 115200
            })
        );
        assert_eq!(config.connection.wire, WireFormat::Fixed { payload_len: 40 });
        assert_eq!(config.connection.inbound_capacity, 1);
        assert_eq!(config.connection.inbound_policy, OverflowPolicy::DropOldest);
        assert_eq!(config.connection.poll_interval, Duration::from_millis(25));
        assert_eq!(config.connection.write_timeout, None);
        assert_eq!(config.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let err = FileConfig::parse(r#"{"linkk": null}"#).unwrap_err();
        assert_eq!(err.code, USAGE);

        let err = FileConfig::parse(r#"{"connection": {"outbound_capacity": 0}}"#).unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/wispwire.json")).unwrap_err();
        assert!(err.message.contains("/nonexistent/wispwire.json"));
    }
}
