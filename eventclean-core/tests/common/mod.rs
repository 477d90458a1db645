//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::path::Path;

use eventclean_core::config::PipelineConfig;
use tempfile::TempDir;

pub const ALICE: &str = "00000000-0000-4000-8000-00000000000a";
pub const BOB: &str = "00000000-0000-4000-8000-00000000000b";
pub const CAROL: &str = "00000000-0000-4000-8000-00000000000c";

/// Three clean users.
pub fn users_csv() -> String {
    format!("userid,subscriber,category\n{ALICE},1,A\n{BOB},0,B\n{CAROL},1,C\n")
}

/// Five events: one clean, one unparseable date, one userid with a trailing
/// space, one quoted points value and one points value with a question mark.
pub fn events_csv() -> String {
    format!(
        "userid,event_date,hour,points\n\
         {ALICE},1/24/19,17,50\n\
         {BOB},19/24/2019,9,12\n\
         {CAROL} ,3/5/2020,23,8\n\
         {ALICE},2/2/21,0,\"\"\"732\"\n\
         {BOB},12/31/22,12,45?\n"
    )
}

/// Writes the raw files under `data/` of a fresh working directory.
pub fn working_dir(users: &str, events: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path(), users, events);
    dir
}

/// Overwrites the raw files in an existing working directory.
pub fn write_sources(root: &Path, users: &str, events: &str) {
    let data = root.join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("users.csv"), users).unwrap();
    std::fs::write(data.join("event_performance.csv"), events).unwrap();
}

pub fn config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig::new(dir.path())
}
