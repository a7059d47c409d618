use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

use crate::config::Config;

const USAGE: &str = "usage: bouncer [--config <path>] [--scenario <1|2|3>] [--runs <n>]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub scenario: Option<u8>,
    pub runs: Option<u64>,
}

impl CliArgs {
    /// Command-line values win over the config file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(scenario) = self.scenario {
            config.session.scenario = scenario;
        }
        if let Some(runs) = self.runs {
            config.batch.runs = runs;
        }
    }
}

pub fn args_from_env() -> Result<CliArgs> {
    parse_args(env::args().skip(1))
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut scenario = None;
    let mut runs = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --config"))?;
                config_path = Some(PathBuf::from(value));
            }
            "--scenario" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --scenario"))?;
                let parsed: u8 = value
                    .parse()
                    .map_err(|_| anyhow!("invalid --scenario '{value}'. {USAGE}"))?;
                if !(1..=3).contains(&parsed) {
                    return Err(anyhow!("--scenario must be 1, 2, or 3. {USAGE}"));
                }
                scenario = Some(parsed);
            }
            "--runs" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --runs"))?;
                let parsed: u64 = value
                    .parse()
                    .map_err(|_| anyhow!("invalid --runs '{value}'. {USAGE}"))?;
                if parsed == 0 {
                    return Err(anyhow!("--runs must be at least 1. {USAGE}"));
                }
                runs = Some(parsed);
            }
            other => {
                return Err(anyhow!("unknown argument: {other}. {USAGE}"));
            }
        }
    }

    Ok(CliArgs {
        config_path: config_path.unwrap_or_else(|| PathBuf::from("./bouncer.jsonc")),
        scenario,
        runs,
    })
}
