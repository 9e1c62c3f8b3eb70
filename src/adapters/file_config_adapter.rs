//! INI file configuration adapter.

use std::collections::BTreeMap;
use std::path::Path;

use configparser::ini::Ini;

use crate::domain::error::StratTestError;
use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StratTestError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| StratTestError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, StratTestError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| StratTestError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn section(&self, section: &str) -> BTreeMap<String, String> {
        self.config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[engine]
mode = backtest
strategy = ma-crossover-lo

[data]
path = data/btc.csv
frequency = 30min
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("engine", "strategy"),
            Some("ma-crossover-lo".to_string())
        );
        assert_eq!(
            adapter.get_string("data", "frequency"),
            Some("30min".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[engine]\nmode = live\n").unwrap();
        assert_eq!(adapter.get_string("engine", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn values_keep_their_case() {
        let adapter =
            FileConfigAdapter::from_string("[Data]\nPath = /Data/Ticks.csv\n").unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/Data/Ticks.csv".to_string())
        );
    }

    #[test]
    fn malformed_ini_is_parse_error() {
        let result = FileConfigAdapter::from_string("[engine\nmode = live\n");
        assert!(matches!(result, Err(StratTestError::ConfigParse { .. })));
    }

    #[test]
    fn section_lists_entries() {
        let adapter =
            FileConfigAdapter::from_string("[params]\nfast = 12\nSlow = 26\n").unwrap();
        let params = adapter.section("params");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("fast").map(String::as_str), Some("12"));
        assert_eq!(params.get("slow").map(String::as_str), Some("26"));
        assert!(adapter.section("absent").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\npath = /data/ticks.csv\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/data/ticks.csv".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(StratTestError::ConfigParse { .. })));
    }
}
