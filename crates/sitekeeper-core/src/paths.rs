use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Bench layout constants
// ---------------------------------------------------------------------------

pub const APPS_DIR: &str = "apps";
pub const SITES_DIR: &str = "sites";
pub const COMMON_SITE_CONFIG: &str = "sites/common_site_config.json";
pub const SITE_CONFIG_FILE: &str = "site_config.json";
pub const PRIVATE_FILES_DIR: &str = "private/files";
pub const PUBLIC_FILES_DIR: &str = "public/files";

pub const SITEKEEPER_DIR: &str = ".sitekeeper";
pub const RECORD_FILE: &str = "state.yaml";
pub const BACKUP_SCRIPT: &str = "backup-files.sh";
pub const BACKUP_LOG: &str = "backup-files.log";

/// The table every initialized site schema contains.
pub const MARKER_TABLE: &str = "tabDocType";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn apps_dir(bench: &Path) -> PathBuf {
    bench.join(APPS_DIR)
}

pub fn app_dir(bench: &Path, app: &str) -> PathBuf {
    apps_dir(bench).join(app)
}

pub fn sites_dir(bench: &Path) -> PathBuf {
    bench.join(SITES_DIR)
}

pub fn common_site_config(bench: &Path) -> PathBuf {
    bench.join(COMMON_SITE_CONFIG)
}

pub fn site_dir(bench: &Path, site: &str) -> PathBuf {
    sites_dir(bench).join(site)
}

pub fn site_config(bench: &Path, site: &str) -> PathBuf {
    site_dir(bench, site).join(SITE_CONFIG_FILE)
}

pub fn private_files(bench: &Path, site: &str) -> PathBuf {
    site_dir(bench, site).join(PRIVATE_FILES_DIR)
}

pub fn public_files(bench: &Path, site: &str) -> PathBuf {
    site_dir(bench, site).join(PUBLIC_FILES_DIR)
}

/// Where sitekeeper keeps its own files, beside the bench's.
pub fn sitekeeper_dir(bench: &Path) -> PathBuf {
    bench.join(SITEKEEPER_DIR)
}

pub fn record_path(bench: &Path) -> PathBuf {
    sitekeeper_dir(bench).join(RECORD_FILE)
}

pub fn backup_script(bench: &Path) -> PathBuf {
    sitekeeper_dir(bench).join(BACKUP_SCRIPT)
}

pub fn backup_log(bench: &Path) -> PathBuf {
    sitekeeper_dir(bench).join(BACKUP_LOG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_paths_nest_under_sites() {
        let bench = Path::new("/home/frappe/frappe-bench");
        assert_eq!(
            site_config(bench, "hr.example.com"),
            PathBuf::from("/home/frappe/frappe-bench/sites/hr.example.com/site_config.json")
        );
        assert_eq!(
            private_files(bench, "hr.example.com"),
            PathBuf::from("/home/frappe/frappe-bench/sites/hr.example.com/private/files")
        );
    }

    #[test]
    fn own_files_live_under_sitekeeper_dir() {
        let bench = Path::new("/home/frappe/frappe-bench");
        assert_eq!(
            record_path(bench),
            PathBuf::from("/home/frappe/frappe-bench/.sitekeeper/state.yaml")
        );
        assert!(backup_script(bench).starts_with(sitekeeper_dir(bench)));
        assert!(backup_log(bench).starts_with(sitekeeper_dir(bench)));
    }
}
