use super::*;
use mockall::predicate::eq;
use std::path::PathBuf;

fn ready_backend() -> MockFloorBackend {
    let mut backend = MockFloorBackend::new();
    backend.expect_acquire().times(1).returning(|| Ok(()));
    backend
}

#[test]
fn test_raise_before_init_is_unavailable() {
    let controller = ConstraintController::new(MockFloorBackend::new());
    assert!(matches!(controller.raise(1_000), Err(Error::ConstraintUnavailable)));
    assert!(matches!(controller.restore_default(), Err(Error::ConstraintUnavailable)));
    assert_eq!(controller.current(), FloorValue::Default);
}

#[test]
fn test_init_is_idempotent() {
    let controller = ConstraintController::new(ready_backend());
    controller.init().unwrap();
    controller.init().unwrap();
    assert!(controller.is_initialized());
}

#[test]
fn test_init_failure_maps_to_initialization_error() {
    let mut backend = MockFloorBackend::new();
    backend.expect_acquire().returning(|| Err(Error::system("no cpufreq")));
    let controller = ConstraintController::new(backend);

    assert!(matches!(controller.init(), Err(Error::InitializationFailure(_))));
    assert!(!controller.is_initialized());
}

#[test]
fn test_raise_and_restore() {
    let mut backend = ready_backend();
    backend.expect_set_floor().with(eq(1_026_000)).times(1).returning(|_| Ok(()));
    backend.expect_clear_floor().times(1).returning(|| Ok(()));
    let controller = ConstraintController::new(backend);
    controller.init().unwrap();

    controller.raise(1_026_000).unwrap();
    assert_eq!(controller.current(), FloorValue::Value(1_026_000));

    controller.restore_default().unwrap();
    assert_eq!(controller.current(), FloorValue::Default);
}

#[test]
fn test_raise_same_value_skips_backend() {
    let mut backend = ready_backend();
    backend.expect_set_floor().times(1).returning(|_| Ok(()));
    let controller = ConstraintController::new(backend);
    controller.init().unwrap();

    controller.raise(500).unwrap();
    controller.raise(500).unwrap();
}

#[test]
fn test_restore_when_default_is_noop() {
    let mut backend = ready_backend();
    backend.expect_clear_floor().never();
    let controller = ConstraintController::new(backend);
    controller.init().unwrap();

    controller.restore_default().unwrap();
    controller.restore_default().unwrap();
}

#[test]
fn test_failed_raise_keeps_default() {
    let mut backend = ready_backend();
    backend.expect_set_floor().returning(|_| Err(Error::system("EBUSY")));
    let controller = ConstraintController::new(backend);
    controller.init().unwrap();

    assert!(controller.raise(1_000).is_err());
    assert_eq!(controller.current(), FloorValue::Default);
}

#[test]
fn test_shutdown_forces_restore_and_release() {
    let mut backend = ready_backend();
    backend.expect_set_floor().returning(|_| Ok(()));
    backend.expect_clear_floor().times(1).returning(|| Ok(()));
    backend.expect_release().times(1).returning(|| Ok(()));
    let controller = ConstraintController::new(backend);
    controller.init().unwrap();
    controller.raise(2_000).unwrap();

    controller.shutdown().unwrap();
    assert_eq!(controller.current(), FloorValue::Default);
    assert!(!controller.is_initialized());
    assert!(matches!(controller.raise(2_000), Err(Error::ConstraintUnavailable)));

    // second shutdown is a no-op
    controller.shutdown().unwrap();
}

#[test]
fn test_shutdown_without_init_is_noop() {
    let mut backend = MockFloorBackend::new();
    backend.expect_release().never();
    let controller = ConstraintController::new(backend);
    controller.shutdown().unwrap();
}

#[test]
fn test_shutdown_reports_release_error_but_tears_down() {
    let mut backend = ready_backend();
    backend.expect_release().returning(|| Err(Error::system("gone")));
    let controller = ConstraintController::new(backend);
    controller.init().unwrap();

    assert!(controller.shutdown().is_err());
    assert!(!controller.is_initialized());
}

#[test]
fn test_floor_value_display() {
    assert_eq!(FloorValue::Default.to_string(), "default");
    assert_eq!(FloorValue::Value(42).to_string(), "42");
}

struct FakeSysfs {
    root: PathBuf,
}

impl FakeSysfs {
    fn new(tag: &str) -> Self {
        let root = std::env::temp_dir().join(format!("input-boost-sysfs-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        Self { root }
    }

    fn add_policy(&self, rel: &str, min: u64, max: u64) -> PathBuf {
        let dir = self.root.join(rel);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("scaling_min_freq"), format!("{min}\n")).unwrap();
        std::fs::write(dir.join("cpuinfo_max_freq"), format!("{max}\n")).unwrap();
        dir
    }

    fn min_of(dir: &std::path::Path) -> u64 {
        std::fs::read_to_string(dir.join("scaling_min_freq")).unwrap().trim().parse().unwrap()
    }
}

impl Drop for FakeSysfs {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

#[test]
fn test_sysfs_policies_raise_and_restore() {
    let sysfs = FakeSysfs::new("policies");
    let p0 = sysfs.add_policy("cpufreq/policy0", 300_000, 1_800_000);
    let p4 = sysfs.add_policy("cpufreq/policy4", 400_000, 900_000);

    let mut backend = SysfsCpuFreq::with_root(&sysfs.root);
    backend.acquire().unwrap();
    assert_eq!(backend.policy_dirs(), vec![p0.clone(), p4.clone()]);

    backend.set_floor(1_026_000).unwrap();
    assert_eq!(FakeSysfs::min_of(&p0), 1_026_000);
    // clamped to the policy maximum
    assert_eq!(FakeSysfs::min_of(&p4), 900_000);

    backend.clear_floor().unwrap();
    assert_eq!(FakeSysfs::min_of(&p0), 300_000);
    assert_eq!(FakeSysfs::min_of(&p4), 400_000);

    backend.release().unwrap();
    assert!(backend.policy_dirs().is_empty());
}

#[test]
fn test_sysfs_per_cpu_fallback() {
    let sysfs = FakeSysfs::new("percpu");
    let cpu0 = sysfs.add_policy("cpu0/cpufreq", 200_000, 2_000_000);
    std::fs::create_dir_all(sysfs.root.join("cpuidle")).unwrap();

    let mut backend = SysfsCpuFreq::with_root(&sysfs.root);
    backend.acquire().unwrap();
    assert_eq!(backend.policy_dirs(), vec![cpu0]);
}

#[test]
fn test_sysfs_acquire_without_policies_fails() {
    let sysfs = FakeSysfs::new("empty");
    let mut backend = SysfsCpuFreq::with_root(&sysfs.root);
    assert!(matches!(backend.acquire(), Err(Error::System(_))));
}

#[test]
fn test_sysfs_controller_shutdown_restores() {
    let sysfs = FakeSysfs::new("controller");
    let p0 = sysfs.add_policy("cpufreq/policy0", 300_000, 2_000_000);

    let controller = ConstraintController::new(SysfsCpuFreq::with_root(&sysfs.root));
    controller.init().unwrap();
    controller.raise(1_026_000).unwrap();
    assert_eq!(FakeSysfs::min_of(&p0), 1_026_000);

    controller.shutdown().unwrap();
    assert_eq!(FakeSysfs::min_of(&p0), 300_000);
}

fn break_policy(dir: &std::path::Path) {
    let min_path = dir.join("scaling_min_freq");
    std::fs::remove_file(&min_path).unwrap();
    std::fs::create_dir(&min_path).unwrap();
}

#[test]
fn test_sysfs_failed_write_rolls_back_to_default() {
    let sysfs = FakeSysfs::new("rollback-default");
    let p0 = sysfs.add_policy("cpufreq/policy0", 300_000, 1_800_000);
    let p4 = sysfs.add_policy("cpufreq/policy4", 400_000, 1_800_000);

    let mut backend = SysfsCpuFreq::with_root(&sysfs.root);
    backend.acquire().unwrap();
    break_policy(&p4);

    assert!(backend.set_floor(1_026_000).is_err());
    assert_eq!(FakeSysfs::min_of(&p0), 300_000);
}

#[test]
fn test_sysfs_failed_write_rolls_back_to_previous_floor() {
    let sysfs = FakeSysfs::new("rollback-previous");
    let p0 = sysfs.add_policy("cpufreq/policy0", 300_000, 1_800_000);
    let p4 = sysfs.add_policy("cpufreq/policy4", 400_000, 1_800_000);

    let mut backend = SysfsCpuFreq::with_root(&sysfs.root);
    backend.acquire().unwrap();
    backend.set_floor(800_000).unwrap();
    break_policy(&p4);

    assert!(backend.set_floor(1_026_000).is_err());
    assert_eq!(FakeSysfs::min_of(&p0), 800_000);
}

#[tokio::test(start_paused = true)]
async fn test_failed_boost_leaves_no_policy_raised() {
    use crate::config::SharedConfig;
    use crate::debouncer::Debouncer;
    use std::sync::Arc;
    use std::time::Duration;

    let sysfs = FakeSysfs::new("failed-boost");
    let p0 = sysfs.add_policy("cpufreq/policy0", 300_000, 1_800_000);
    let p4 = sysfs.add_policy("cpufreq/policy4", 400_000, 1_800_000);

    let controller = Arc::new(ConstraintController::new(SysfsCpuFreq::with_root(&sysfs.root)));
    controller.init().unwrap();
    break_policy(&p4);

    let debouncer = Debouncer::spawn(controller.clone(), SharedConfig::default());
    debouncer.sink().on_activity();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(debouncer.stats().failed_raises, 1);
    assert_eq!(controller.current(), FloorValue::Default);
    assert_eq!(FakeSysfs::min_of(&p0), 300_000);
}

#[test]
fn test_sysfs_release_only_forgets_policies() {
    let sysfs = FakeSysfs::new("release");
    let p0 = sysfs.add_policy("cpufreq/policy0", 300_000, 1_800_000);

    let mut backend = SysfsCpuFreq::with_root(&sysfs.root);
    backend.acquire().unwrap();
    backend.set_floor(1_000_000).unwrap();
    backend.release().unwrap();

    // restoring is the controller's clear_floor, release writes nothing
    assert_eq!(FakeSysfs::min_of(&p0), 1_000_000);
    assert!(backend.policy_dirs().is_empty());
}

#[test]
fn test_sysfs_default_root() {
    assert_eq!(SysfsCpuFreq::new().root(), std::path::Path::new(sysfs::DEFAULT_CPU_SYSFS_ROOT));
    assert_eq!(sysfs::DEFAULT_CPU_SYSFS_ROOT, "/sys/devices/system/cpu");
}
