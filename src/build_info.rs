// file: src/build_info.rs
// description: build metadata reported by the version command
// reference: compile-time environment captured with option_env

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Information {
    pub version: String,
    pub revision: String,
    pub branch: String,
    pub build_user: String,
    pub build_date: String,
    pub rustc: String,
}

pub fn info() -> Information {
    Information {
        version: env!("CARGO_PKG_VERSION").to_string(),
        revision: option_env!("CONVEYOR_BELT_GIT_SHA").unwrap_or_default().to_string(),
        branch: option_env!("CONVEYOR_BELT_GIT_BRANCH").unwrap_or_default().to_string(),
        build_user: option_env!("CONVEYOR_BELT_BUILD_USER").unwrap_or_default().to_string(),
        build_date: option_env!("CONVEYOR_BELT_BUILD_DATE").unwrap_or_default().to_string(),
        rustc: option_env!("CONVEYOR_BELT_RUSTC").unwrap_or("unknown").to_string(),
    }
}

impl Information {
    pub fn values(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("version", self.version.clone()),
            ("revision", self.revision.clone()),
            ("branch", self.branch.clone()),
            ("build_user", self.build_user.clone()),
            ("build_date", self.build_date.clone()),
            ("rustc", self.rustc.clone()),
        ])
    }
}

impl fmt::Display for Information {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Version: {}, Revision: {}, Branch: {}, BuildUser: {}, BuildDate: {}, Rustc: {}",
            self.version, self.revision, self.branch, self.build_user, self.build_date, self.rustc
        )
    }
}
