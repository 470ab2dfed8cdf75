//! Resource usage polling (spec §9.E): CPU% and RSS per session, sampled on
//! an interval and fed into session metadata. Sampling a dead or vanished
//! pid is not an error here; it degrades to `None` per spec §7 ("external
//! subprocess/poll failure swallowed with warn, feature degrades").

use std::time::Duration;

/// A single resource sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResourceSample {
    /// CPU usage, percent of one core, averaged since the process started.
    pub cpu_percent: f64,
    /// Resident set size, in kilobytes.
    pub mem_rss_kb: u64,
}

/// Abstracts over where resource samples come from, so the polling loop and
/// its tests don't depend on `/proc` actually existing.
pub trait ResourceSampler: Send + Sync {
    /// Sample `pid`'s current resource usage. `None` if the process is gone
    /// or the platform doesn't expose the data.
    fn sample(&self, pid: u32) -> Option<ResourceSample>;
}

/// Reads `/proc/<pid>/stat` and `/proc/<pid>/status` directly. Linux-only;
/// `sample` returns `None` on any other platform or on any parse failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinuxProcSampler;

impl ResourceSampler for LinuxProcSampler {
    fn sample(&self, pid: u32) -> Option<ResourceSample> {
        let cpu_percent = read_cpu_percent(pid)?;
        let mem_rss_kb = read_rss_kb(pid)?;
        Some(ResourceSample { cpu_percent, mem_rss_kb })
    }
}

fn read_cpu_percent(pid: u32) -> Option<f64> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // Fields after the `(comm)` parenthesized group aren't reliably
    // space-delimited if the command name itself contains spaces or
    // parens, so split on the closing paren first.
    let after_comm = stat.rsplit(')').next()?;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    // utime is field 14 and stime is field 15 overall; fields[0] here is
    // state (field 3), so utime/stime are indices 11 and 12.
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    let starttime: u64 = fields.get(19)?.parse().ok()?;

    let ticks_per_sec = clock_ticks_per_second();
    let uptime_seconds = system_uptime_seconds()?;
    let process_seconds = starttime as f64 / ticks_per_sec;
    let elapsed = (uptime_seconds - process_seconds).max(0.001);
    let total_ticks = (utime + stime) as f64;
    Some((total_ticks / ticks_per_sec / elapsed) * 100.0)
}

fn read_rss_kb(pid: u32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let digits: String = rest.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            return digits.parse().ok();
        }
    }
    None
}

fn system_uptime_seconds() -> Option<f64> {
    let uptime = std::fs::read_to_string("/proc/uptime").ok()?;
    uptime.split_whitespace().next()?.parse().ok()
}

fn clock_ticks_per_second() -> f64 {
    // `sysconf(_SC_CLK_TCK)` is 100 on effectively every Linux target tame
    // runs on; avoiding the libc FFI call here keeps this module dependency-free.
    100.0
}

/// How often to poll resource usage per session (spec §6: configurable,
/// default five seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    struct StubSampler(Option<ResourceSample>);

    impl ResourceSampler for StubSampler {
        fn sample(&self, _pid: u32) -> Option<ResourceSample> {
            self.0
        }
    }

    #[test]
    fn stub_sampler_reports_configured_sample() {
        let sampler = StubSampler(Some(ResourceSample { cpu_percent: 12.5, mem_rss_kb: 2048 }));
        let sample = sampler.sample(1).expect("sample");
        assert_eq!(sample.mem_rss_kb, 2048);
    }

    #[test]
    fn missing_pid_degrades_to_none() {
        // A pid this large is never valid, so /proc/<pid>/stat won't exist.
        assert!(LinuxProcSampler.sample(u32::MAX).is_none());
    }

    #[test]
    fn current_process_reports_some_sample_on_linux() {
        if cfg!(target_os = "linux") {
            let pid = std::process::id();
            assert!(LinuxProcSampler.sample(pid).is_some());
        }
    }
}
