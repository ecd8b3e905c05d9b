//! JSON configuration loading, grounded in
//! `huginn-proxy-lib/src/config/{root,loader,security}.rs`'s
//! `#[derive(Deserialize)]`-tree + free-function-defaults pattern, with
//! `toml` swapped for `serde_json` per `spec.md` §6's explicit JSON mandate.

use crate::error::{ConfigError, LfdError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub exp_name: String,
    pub run_config: RunConfig,
    pub traffic_config: TrafficConfig,
    #[serde(default)]
    pub eardet_config: Option<EardetUserConfig>,
    #[serde(default, rename = "RLFD_config")]
    pub rlfd_config: Option<RlfdUserConfig>,
    #[serde(default, rename = "CLEF_config")]
    pub clef_config: Option<ClefUserConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    pub detectors_to_evaluate: Vec<DetectorKind>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum DetectorKind {
    Baseline,
    #[serde(rename = "EARDet")]
    Eardet,
    Rlfd,
    Clef,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrafficConfig {
    /// Bytes/second.
    pub link_capacity: u64,
    pub max_pkt_size: u32,
    #[serde(default)]
    pub max_pkt_num: Option<usize>,
    /// Bytes/second.
    pub flow_spec_gamma: u64,
    /// Bytes.
    pub flow_spec_beta: u32,
    #[serde(default)]
    pub pcap_file: Option<String>,
    #[serde(default)]
    pub time_file: Option<String>,
    #[serde(default)]
    pub txt_trace_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EardetUserConfig {
    pub gamma_low: u64,
    pub gamma_high: u64,
    pub beta_low: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RlfdUserConfig {
    pub gamma: u64,
    pub beta: u32,
    pub t_l_factor: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClefUserConfig {
    pub attacker_flow_factor: f64,
    pub max_watchlist_size: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub metrics_enabled: bool,
}

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let p = p.as_ref();
    let txt = fs::read_to_string(p)
        .map_err(|e| LfdError::Config(ConfigError::Read(e)))?;
    let cfg: Config =
        serde_json::from_str(&txt).map_err(|e| LfdError::Config(ConfigError::Parse(e)))?;

    validate_config(&cfg)?;
    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.traffic_config.link_capacity == 0 {
        return Err(LfdError::Config(ConfigError::Invalid(
            "traffic_config.link_capacity must be positive".into(),
        )));
    }
    if cfg.run_config.detectors_to_evaluate.is_empty() {
        return Err(LfdError::Config(ConfigError::Invalid(
            "run_config.detectors_to_evaluate must name at least one detector".into(),
        )));
    }
    let uses_pcap = cfg.traffic_config.pcap_file.is_some();
    let uses_text = cfg.traffic_config.txt_trace_file.is_some();
    if !uses_pcap && !uses_text {
        return Err(LfdError::Config(ConfigError::Invalid(
            "traffic_config must set either pcap_file+time_file or txt_trace_file".into(),
        )));
    }
    if uses_pcap && cfg.traffic_config.time_file.is_none() {
        return Err(LfdError::Config(ConfigError::Invalid(
            "traffic_config.pcap_file requires a time_file sidecar".into(),
        )));
    }
    if cfg.run_config.detectors_to_evaluate.contains(&DetectorKind::Eardet)
        && cfg.eardet_config.is_none()
    {
        return Err(LfdError::Config(ConfigError::Invalid(
            "EARDet requested but eardet_config is missing".into(),
        )));
    }
    if cfg.run_config.detectors_to_evaluate.contains(&DetectorKind::Rlfd)
        && cfg.rlfd_config.is_none()
    {
        return Err(LfdError::Config(ConfigError::Invalid(
            "RLFD requested but RLFD_config is missing".into(),
        )));
    }
    if cfg.run_config.detectors_to_evaluate.contains(&DetectorKind::Clef)
        && (cfg.eardet_config.is_none() || cfg.rlfd_config.is_none() || cfg.clef_config.is_none())
    {
        return Err(LfdError::Config(ConfigError::Invalid(
            "CLEF requested but eardet_config/RLFD_config/CLEF_config are not all present".into(),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("create temp file");
        f.write_all(contents.as_bytes()).expect("write temp config");
        f
    }

    const VALID: &str = r#"{
        "exp_name": "test",
        "run_config": { "detectors_to_evaluate": ["BASELINE"] },
        "traffic_config": {
            "link_capacity": 10000000000,
            "max_pkt_size": 1500,
            "flow_spec_gamma": 1000000,
            "flow_spec_beta": 10000,
            "txt_trace_file": "trace.txt"
        }
    }"#;

    #[test]
    fn loads_a_minimal_valid_config() {
        let f = write_temp_config(VALID);
        let cfg = load_from_path(f.path()).expect("should load");
        assert_eq!(cfg.exp_name, "test");
        assert_eq!(cfg.run_config.detectors_to_evaluate, vec![DetectorKind::Baseline]);
    }

    #[test]
    fn rejects_zero_link_capacity() {
        let f = write_temp_config(
            r#"{
            "exp_name": "x",
            "run_config": { "detectors_to_evaluate": ["BASELINE"] },
            "traffic_config": {
                "link_capacity": 0,
                "max_pkt_size": 1500,
                "flow_spec_gamma": 1,
                "flow_spec_beta": 1,
                "txt_trace_file": "trace.txt"
            }
        }"#,
        );
        assert!(load_from_path(f.path()).is_err());
    }

    #[test]
    fn rejects_empty_detector_list() {
        let f = write_temp_config(
            r#"{
            "exp_name": "x",
            "run_config": { "detectors_to_evaluate": [] },
            "traffic_config": {
                "link_capacity": 1000,
                "max_pkt_size": 1500,
                "flow_spec_gamma": 1,
                "flow_spec_beta": 1,
                "txt_trace_file": "trace.txt"
            }
        }"#,
        );
        assert!(load_from_path(f.path()).is_err());
    }

    #[test]
    fn rejects_clef_without_sub_configs() {
        let f = write_temp_config(
            r#"{
            "exp_name": "x",
            "run_config": { "detectors_to_evaluate": ["CLEF"] },
            "traffic_config": {
                "link_capacity": 1000,
                "max_pkt_size": 1500,
                "flow_spec_gamma": 1,
                "flow_spec_beta": 1,
                "txt_trace_file": "trace.txt"
            }
        }"#,
        );
        assert!(load_from_path(f.path()).is_err());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let f = write_temp_config("not json");
        assert!(load_from_path(f.path()).is_err());
    }
}
