pub mod constants;
pub mod env;
pub mod logging;
pub mod progress_config;

/// Resident memory of this process in MB, or 0 when it cannot be read.
pub fn get_memory_usage() -> u64 {
    use sysinfo::{get_current_pid, System};
    let Ok(pid) = get_current_pid() else {
        return 0;
    };
    let mut sys = System::new();
    sys.refresh_process(pid);
    sys.process(pid)
        .map(|process| process.memory() / (1024 * 1024)) // Convert to MB
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_usage_is_per_process() {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        let system_used_mb = sys.used_memory() / (1024 * 1024);

        let process_mb = get_memory_usage();
        assert!(process_mb > 0);
        assert!(process_mb <= system_used_mb);
    }
}
