//! Configuration validation.
//!
//! Reads and checks every config field before any data is loaded, producing
//! a ready-to-run [`EngineConfig`].

use std::path::PathBuf;

use crate::domain::engine::{EngineMode, RunConfig};
use crate::domain::error::StratTestError;
use crate::domain::execution::ExecutionTiming;
use crate::domain::resample::{AggRule, Frequency, ResampleSpec};
use crate::domain::strategy::Strategy;
use crate::ports::config_port::ConfigPort;

const ENGINE: &str = "engine";
const DATA: &str = "data";
const PARAMS: &str = "params";

/// A validated engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub mode: EngineMode,
    pub data_path: PathBuf,
    /// Present in backtest mode only.
    pub resample: Option<ResampleSpec>,
    pub run: RunConfig,
}

pub fn load_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, StratTestError> {
    let mode = parse_mode(config)?;
    let data_path = PathBuf::from(required(config, DATA, "path")?);
    let resample = match mode {
        EngineMode::Backtest => Some(parse_resample(config)?),
        EngineMode::Live => None,
    };
    let run = build_run_config(config)?;

    Ok(EngineConfig {
        mode,
        data_path,
        resample,
        run,
    })
}

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), StratTestError> {
    load_engine_config(config).map(|_| ())
}

/// Strategy, timing, cost and stop-loss settings.
pub fn build_run_config(config: &dyn ConfigPort) -> Result<RunConfig, StratTestError> {
    let name = required(config, ENGINE, "strategy")?;
    let strategy = Strategy::from_params(&name, &config.section(PARAMS))?;
    let timing = match config.get_string(ENGINE, "timing") {
        Some(t) if !t.trim().is_empty() => t.parse::<ExecutionTiming>()?,
        _ => ExecutionTiming::default(),
    };

    Ok(RunConfig {
        strategy,
        timing,
        cost_bps: non_negative(config, ENGINE, "cost_bps")?,
        stop_loss_bps: non_negative(config, ENGINE, "stop_loss_bps")?,
    })
}

fn parse_mode(config: &dyn ConfigPort) -> Result<EngineMode, StratTestError> {
    match config.get_string(ENGINE, "mode") {
        None => Ok(EngineMode::default()),
        Some(s) => s.parse(),
    }
}

fn parse_resample(config: &dyn ConfigPort) -> Result<ResampleSpec, StratTestError> {
    let frequency: Frequency = required(config, DATA, "frequency")?.parse()?;
    let mut spec = ResampleSpec::new(frequency);
    if let Some(rules) = config.get_string(DATA, "aux_rules") {
        for (column, rule) in parse_aux_rules(&rules)? {
            spec = spec.with_rule(&column, rule);
        }
    }
    Ok(spec)
}

/// Parses `column:rule` pairs separated by commas.
pub fn parse_aux_rules(value: &str) -> Result<Vec<(String, AggRule)>, StratTestError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (column, rule) = entry.split_once(':').ok_or_else(|| {
                invalid(
                    DATA,
                    "aux_rules",
                    format!("expected column:rule, got '{entry}'"),
                )
            })?;
            let column = column.trim().to_lowercase();
            if column.is_empty() {
                return Err(invalid(DATA, "aux_rules", format!("empty column in '{entry}'")));
            }
            let rule: AggRule = rule.parse()?;
            Ok((column, rule))
        })
        .collect()
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, StratTestError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(StratTestError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, StratTestError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(0.0);
    };
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, format!("'{raw}' is not a number")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(section, key, format!("{key} must be non-negative")));
    }
    Ok(value)
}

fn invalid(section: &str, key: &str, reason: String) -> StratTestError {
    StratTestError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const BACKTEST: &str = r#"
[engine]
mode = backtest
strategy = ma-crossover-lo
timing = current-bar-close
cost_bps = 10
stop_loss_bps = 200

[data]
path = data/btc.csv
frequency = 30min
aux_rules = bid_size:mean, ask_size:last

[params]
fast = 12
slow = 26
"#;

    #[test]
    fn valid_backtest_config_passes() {
        let cfg = load_engine_config(&make_config(BACKTEST)).unwrap();
        assert_eq!(cfg.mode, EngineMode::Backtest);
        assert_eq!(cfg.data_path, PathBuf::from("data/btc.csv"));
        assert_eq!(cfg.run.timing, ExecutionTiming::CurrentBarClose);
        assert_eq!(cfg.run.cost_bps, 10.0);
        assert_eq!(cfg.run.stop_loss_bps, 200.0);
        assert_eq!(cfg.run.strategy.name(), "ma-crossover-lo");

        let spec = cfg.resample.unwrap();
        assert_eq!(spec.frequency.seconds(), 1800);
        assert_eq!(spec.rules.get("ask_size"), Some(&AggRule::Last));
    }

    #[test]
    fn live_mode_needs_no_frequency() {
        let cfg = load_engine_config(&make_config(
            "[engine]\nmode = live\nstrategy = buy-and-hold\n[data]\npath = bars.csv\n",
        ))
        .unwrap();
        assert_eq!(cfg.mode, EngineMode::Live);
        assert!(cfg.resample.is_none());
        assert_eq!(cfg.run.timing, ExecutionTiming::NextBarOpen);
        assert_eq!(cfg.run.cost_bps, 0.0);
    }

    #[test]
    fn backtest_requires_frequency() {
        let err = validate_engine_config(&make_config(
            "[engine]\nstrategy = buy-and-hold\n[data]\npath = ticks.csv\n",
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            StratTestError::ConfigMissing { ref key, .. } if key == "frequency"
        ));
    }

    #[test]
    fn invalid_frequency_fails() {
        let err = validate_engine_config(&make_config(
            "[engine]\nstrategy = buy-and-hold\n[data]\npath = t.csv\nfrequency = fortnightly\n",
        ))
        .unwrap_err();
        assert!(matches!(err, StratTestError::InvalidFrequency { .. }));
    }

    #[test]
    fn missing_strategy_fails() {
        let err = validate_engine_config(&make_config("[engine]\nmode = live\n[data]\npath = b.csv\n"))
            .unwrap_err();
        assert!(matches!(err, StratTestError::ConfigMissing { ref key, .. } if key == "strategy"));
    }

    #[test]
    fn missing_data_path_fails() {
        let err = validate_engine_config(&make_config("[engine]\nstrategy = buy-and-hold\n"))
            .unwrap_err();
        assert!(matches!(err, StratTestError::ConfigMissing { ref key, .. } if key == "path"));
    }

    #[test]
    fn unknown_mode_fails() {
        let err = validate_engine_config(&make_config(
            "[engine]\nmode = paper\nstrategy = buy-and-hold\n[data]\npath = b.csv\n",
        ))
        .unwrap_err();
        assert!(matches!(err, StratTestError::ConfigInvalid { ref key, .. } if key == "mode"));
    }

    #[test]
    fn negative_cost_fails() {
        let err = validate_engine_config(&make_config(
            "[engine]\nmode = live\nstrategy = buy-and-hold\ncost_bps = -5\n[data]\npath = b.csv\n",
        ))
        .unwrap_err();
        assert!(matches!(err, StratTestError::ConfigInvalid { ref key, .. } if key == "cost_bps"));
    }

    #[test]
    fn non_numeric_stop_loss_fails() {
        let err = validate_engine_config(&make_config(
            "[engine]\nmode = live\nstrategy = buy-and-hold\nstop_loss_bps = wide\n[data]\npath = b.csv\n",
        ))
        .unwrap_err();
        assert!(matches!(err, StratTestError::ConfigInvalid { .. }));
    }

    #[test]
    fn unknown_timing_fails() {
        let err = validate_engine_config(&make_config(
            "[engine]\nmode = live\nstrategy = buy-and-hold\ntiming = vwap\n[data]\npath = b.csv\n",
        ))
        .unwrap_err();
        assert!(matches!(err, StratTestError::UnsupportedTiming { .. }));
    }

    #[test]
    fn missing_strategy_parameter_fails() {
        let err = validate_engine_config(&make_config(
            "[engine]\nmode = live\nstrategy = ma-crossover-ls\n[data]\npath = b.csv\n[params]\nfast = 5\n",
        ))
        .unwrap_err();
        assert!(matches!(err, StratTestError::MissingParameter { ref key, .. } if key == "slow"));
    }

    #[test]
    fn aux_rules_parsing() {
        let rules = parse_aux_rules("bid_size:mean, Volume_B:sum,").unwrap();
        assert_eq!(
            rules,
            vec![
                ("bid_size".to_string(), AggRule::Mean),
                ("volume_b".to_string(), AggRule::Sum)
            ]
        );
        assert!(parse_aux_rules("bid_size").is_err());
        assert!(parse_aux_rules("bid_size:median").is_err());
        assert!(parse_aux_rules(":mean").is_err());
    }
}
