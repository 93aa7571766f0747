//! Built-in battery probe reading Linux power supply information.
//!
//! Exports `battery_percent` (capacity as a 0-1 ratio) and
//! `battery_status`, both computed fresh on every gather.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Registry};

use crate::error::{MetricError, Result};

/// Default location of power supply entries
pub const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Charging state reported by the battery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryStatus {
    Unknown = 0,
    Charging = 1,
    Discharging = 2,
    NotCharging = 3,
}

impl BatteryStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "charging" => BatteryStatus::Charging,
            "discharging" => BatteryStatus::Discharging,
            "not charging" => BatteryStatus::NotCharging,
            _ => BatteryStatus::Unknown,
        }
    }

    pub fn code(self) -> f64 {
        self as i32 as f64
    }
}

/// Snapshot of one battery
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryInfo {
    /// Charge level, 0-100
    pub level: f64,
    pub status: BatteryStatus,
}

/// Read the first battery found under `root`
pub fn read_battery(root: &Path) -> Result<BatteryInfo> {
    let mut batteries: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_battery(path))
        .collect();
    batteries.sort();

    let battery = match batteries.as_slice() {
        [] => return Err(MetricError::Other("no battery detected".to_string())),
        [only] => only,
        [first, ..] => {
            warn!("Multiple batteries present, using {}", first.display());
            first
        }
    };

    let capacity = fs::read_to_string(battery.join("capacity"))?;
    let level = capacity.trim().parse::<f64>().map_err(|e| {
        MetricError::Other(format!("invalid capacity {:?}: {}", capacity.trim(), e))
    })?;
    let status = fs::read_to_string(battery.join("status"))
        .map(|raw| BatteryStatus::parse(&raw))
        .unwrap_or(BatteryStatus::Unknown);

    Ok(BatteryInfo { level, status })
}

fn is_battery(path: &Path) -> bool {
    match fs::read_to_string(path.join("type")) {
        Ok(kind) => kind.trim() == "Battery",
        Err(_) => path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with("BAT")),
    }
}

/// Collector refreshing the battery gauges on every gather
pub struct BatteryCollector {
    root: PathBuf,
    percent: Gauge,
    status: Gauge,
}

impl BatteryCollector {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            percent: Gauge::new("battery_percent", "Battery % value, range 0-1")?,
            status: Gauge::new(
                "battery_status",
                "Battery status, 0 -> Unknown, 1 -> Charging, 2 -> Discharging, 3 -> Not Charging (Connected and charged)",
            )?,
        })
    }

    /// Register a probe of the system batteries
    pub fn register(registry: &Registry) -> Result<()> {
        registry.register(Box::new(Self::new(POWER_SUPPLY_ROOT)?))?;
        Ok(())
    }
}

impl Collector for BatteryCollector {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.percent.desc();
        descs.extend(self.status.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        match read_battery(&self.root) {
            Ok(info) => {
                self.percent.set(info.level / 100.0);
                self.status.set(info.status.code());
            }
            Err(e) => {
                warn!("Cannot retrieve battery: {}", e);
                self.percent.set(f64::NAN);
                self.status.set(f64::NAN);
            }
        }

        let mut families = self.percent.collect();
        families.extend(self.status.collect());
        families
    }
}
