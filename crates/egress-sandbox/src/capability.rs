//! The Capability Probe (spec §4.H): classifies the host's isolation
//! strength as `full`/`partial`/`minimal` without requiring any of the
//! optional layers. L1 (proxy env vars) is always present, so it is not
//! itself probed — it's the baseline every level includes.

use crate::filter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationLevel {
    Full,
    Partial,
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub l2: bool,
    pub l3: bool,
    pub l4: bool,
    pub level: IsolationLevel,
}

fn classify(l2: bool, l3: bool, l4: bool) -> IsolationLevel {
    if l2 && l3 && l4 {
        IsolationLevel::Full
    } else if l2 || l3 || l4 {
        IsolationLevel::Partial
    } else {
        IsolationLevel::Minimal
    }
}

/// L2: an OS network namespace w/ firewall. We can't safely create one
/// just to probe, so this checks for the tooling a real deployment would
/// use to set one up: the `unshare(1)` binary and a `net` namespace handle
/// for the current process.
fn probe_l2() -> bool {
    Path::new("/proc/self/ns/net").exists() && which_unshare().is_some()
}

fn which_unshare() -> Option<std::path::PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join("unshare"))
        .find(|candidate| candidate.is_file())
}

/// L3: a configured dynamic-loader interception shim. The probe only
/// checks that the configured path points at a readable shared object; it
/// never attempts to build or load one (spec §4.H: "that is OS-kernel
/// work, explicitly out of scope").
fn probe_l3(loader_shim_path: Option<&str>) -> bool {
    match loader_shim_path {
        Some(path) => Path::new(path).is_file(),
        None => false,
    }
}

/// L4: whether this host can even express the syscall filter (see
/// [`filter::probe_available`]); never installs it.
fn probe_l4() -> bool {
    filter::probe_available()
}

static CACHED: OnceLock<CapabilityReport> = OnceLock::new();

/// Runs the probe once per process and caches the result — capabilities
/// don't change mid-run (spec §4.H).
pub fn probe(loader_shim_path: Option<&str>) -> CapabilityReport {
    *CACHED.get_or_init(|| {
        let l2 = probe_l2();
        let l3 = probe_l3(loader_shim_path);
        let l4 = probe_l4();
        CapabilityReport {
            l2,
            l3,
            l4,
            level: classify(l2, l3, l4),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_spec_table() {
        assert_eq!(classify(true, true, true), IsolationLevel::Full);
        assert_eq!(classify(true, false, false), IsolationLevel::Partial);
        assert_eq!(classify(false, false, false), IsolationLevel::Minimal);
    }

    #[test]
    fn l3_probe_rejects_missing_shim_path() {
        assert!(!probe_l3(Some("/nonexistent/path/to/shim.so")));
        assert!(!probe_l3(None));
    }
}
