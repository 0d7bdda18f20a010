//! cpufreq `scaling_min_freq` backend.
//!
//! Every CPU frequency policy found under the sysfs root gets the same floor. The value
//! each policy had when the handle was acquired is what "default" restores. A floor is
//! applied to all policies or to none: if one write fails, the policies already written
//! are put back to the floor that was in effect before.

use std::{
    fs,
    path::{Path, PathBuf},
};

use super::FloorBackend;
use crate::error::{Error, Result};

/// Default sysfs directory holding `cpufreq/policy*` and `cpu*/cpufreq`
pub const DEFAULT_CPU_SYSFS_ROOT: &str = "/sys/devices/system/cpu";

const SCALING_MIN_FREQ: &str = "scaling_min_freq";
const CPUINFO_MAX_FREQ: &str = "cpuinfo_max_freq";

#[derive(Debug, Clone)]
struct Policy {
    dir: PathBuf,
    default_min: u64,
    max_freq: Option<u64>,
}

impl Policy {
    fn min_path(&self) -> PathBuf {
        self.dir.join(SCALING_MIN_FREQ)
    }

    fn clamp(&self, value: u64) -> u64 {
        self.max_freq.map_or(value, |max| value.min(max))
    }
}

/// Resource floor backed by cpufreq sysfs attributes
#[derive(Debug, Clone)]
pub struct SysfsCpuFreq {
    root: PathBuf,
    policies: Vec<Policy>,
    floor: Option<u64>,
}

impl Default for SysfsCpuFreq {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsCpuFreq {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_CPU_SYSFS_ROOT)
    }

    /// Uses an alternative sysfs root, laid out like `/sys/devices/system/cpu`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), policies: Vec::new(), floor: None }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Policy directories discovered at acquire time
    pub fn policy_dirs(&self) -> Vec<PathBuf> {
        self.policies.iter().map(|p| p.dir.clone()).collect()
    }

    fn discover(&self) -> Result<Vec<PathBuf>> {
        let shared = policy_dirs_in(&self.root.join("cpufreq"), |name| name.starts_with("policy"))?;
        if !shared.is_empty() {
            return Ok(shared);
        }

        let per_cpu = policy_dirs_in(&self.root, is_cpu_dir_name)?;
        Ok(per_cpu.into_iter().map(|dir| dir.join("cpufreq")).filter(|dir| dir.join(SCALING_MIN_FREQ).is_file()).collect())
    }

    /// Puts the first `written` policies back to the floor in effect before the last write
    fn roll_back(&self, written: usize) {
        for policy in &self.policies[..written] {
            let previous = self.floor.map_or(policy.default_min, |floor| policy.clamp(floor));
            if let Err(e) = write_khz(&policy.min_path(), previous) {
                tracing::warn!(policy = %policy.dir.display(), "failed to roll back scaling_min_freq: {}", e);
            }
        }
    }
}

fn is_cpu_dir_name(name: &str) -> bool {
    name.strip_prefix("cpu")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

fn policy_dirs_in<F>(dir: &Path, accept: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&str) -> bool,
{
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !accept(name) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn read_khz(path: &Path) -> Result<u64> {
    let raw = fs::read_to_string(path)?;
    raw.trim()
        .parse()
        .map_err(|e| Error::system(format!("unparseable frequency in {}: {e}", path.display())))
}

fn write_khz(path: &Path, value: u64) -> Result<()> {
    fs::write(path, format!("{value}\n"))?;
    Ok(())
}

impl FloorBackend for SysfsCpuFreq {
    fn acquire(&mut self) -> Result<()> {
        let dirs = self.discover()?;
        if dirs.is_empty() {
            return Err(Error::system(format!("no cpufreq policies under {}", self.root.display())));
        }

        let mut policies = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let min_path = dir.join(SCALING_MIN_FREQ);
            let default_min = read_khz(&min_path)?;
            fs::OpenOptions::new().write(true).open(&min_path)?;
            let max_freq = read_khz(&dir.join(CPUINFO_MAX_FREQ)).ok();
            policies.push(Policy { dir, default_min, max_freq });
        }

        tracing::debug!(policies = policies.len(), root = %self.root.display(), "cpufreq policies acquired");
        self.policies = policies;
        Ok(())
    }

    fn set_floor(&mut self, value: u64) -> Result<()> {
        for (written, policy) in self.policies.iter().enumerate() {
            if let Err(e) = write_khz(&policy.min_path(), policy.clamp(value)) {
                self.roll_back(written);
                return Err(e);
            }
        }
        self.floor = Some(value);
        Ok(())
    }

    fn clear_floor(&mut self) -> Result<()> {
        let mut first_err = None;
        for policy in &self.policies {
            if let Err(e) = write_khz(&policy.min_path(), policy.default_min) {
                tracing::warn!(policy = %policy.dir.display(), "failed to restore scaling_min_freq: {}", e);
                first_err.get_or_insert(e);
            }
        }
        self.floor = None;
        first_err.map_or(Ok(()), Err)
    }

    /// Forgets the policies; restoring defaults is done through `clear_floor`
    fn release(&mut self) -> Result<()> {
        self.policies.clear();
        self.floor = None;
        Ok(())
    }
}
