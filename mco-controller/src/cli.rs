use clap::Parser;
use mco_utils::config;
use std::{path::PathBuf, str::FromStr, time::Duration};

#[derive(Parser, Debug)]
#[command(name = "mco-controller", about = "Reconciles MultiClusterObservability resources")]
pub(crate) struct Args {
    /// Namespace holding the hub observability stack
    #[arg(long, env = "MCO_NAMESPACE", default_value = config::DEFAULT_NAMESPACE)]
    pub(crate) namespace: String,
    /// Directory with rendered manifests (`*.yaml`, `*.yml`). Every object
    /// found there gets the global overrides and is applied on each reconcile.
    #[arg(long, env = "MCO_MANIFESTS_DIR")]
    pub(crate) manifests_dir: Option<PathBuf>,
    /// Field manager used for server-side apply
    #[arg(long, env = "MCO_FIELD_MANAGER", default_value = "mco-controller")]
    pub(crate) field_manager: String,
    /// Default log filter. `RUST_LOG` takes precedence.
    #[arg(long, env = "MCO_LOG_FILTER", default_value = "info")]
    pub(crate) log_filter: String,
    /// Do not add the observatorium remote-write target to the hub monitoring config
    #[arg(long, env = "MCO_SKIP_HUB_MONITORING_CONFIG")]
    pub(crate) skip_hub_monitoring_config: bool,
    /// Resync period, e.g. `300s` or `5m`
    #[arg(long, env = "MCO_RESYNC", default_value = "5m")]
    pub(crate) resync: Period,
}

/// Duration written as `<n>s`, `<n>m` or `<n>h`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Period(pub(crate) Duration);

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let unit_start = s.char_indices().last().map_or(0, |(i, _)| i);
        let (value, unit) = s.split_at(unit_start);
        let multiplier = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            other => anyhow::bail!(
                "Unknown unit '{}', expected one of: 's', 'm', 'h'",
                other
            ),
        };
        let value: u64 = value
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid period '{}': {}", s, e))?;
        let secs = match value.checked_mul(multiplier) {
            Some(secs) => secs,
            None => anyhow::bail!("period '{}' is too large", s),
        };
        Ok(Period(Duration::from_secs(secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["mco-controller"]).unwrap();
        assert_eq!(args.namespace, config::DEFAULT_NAMESPACE);
        assert_eq!(args.field_manager, "mco-controller");
        assert_eq!(args.resync, Period(Duration::from_secs(300)));
        assert!(args.manifests_dir.is_none());
    }

    #[test]
    fn flags() {
        let args = Args::try_parse_from([
            "mco-controller",
            "--namespace",
            "obs",
            "--manifests-dir",
            "/manifests",
            "--skip-hub-monitoring-config",
            "--resync",
            "30s",
        ])
        .unwrap();
        assert_eq!(args.namespace, "obs");
        assert_eq!(args.manifests_dir, Some(PathBuf::from("/manifests")));
        assert!(args.skip_hub_monitoring_config);
        assert_eq!(args.resync.0, Duration::from_secs(30));
    }

    #[test]
    fn periods() {
        assert_eq!("2h".parse::<Period>().unwrap().0, Duration::from_secs(7200));
        assert!("10d".parse::<Period>().is_err());
        assert!("m".parse::<Period>().is_err());
        assert!("99999999999999999h".parse::<Period>().is_err());
    }
}
