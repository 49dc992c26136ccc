//! Command implementations

pub mod plan;
pub mod toolchains;

use anyhow::Result;

use cinder::core::{BuildSettings, Solution};
use cinder::util::config::load_for_project;

/// A solution for `project_root` with detected toolchains.
pub fn detected_solution(project_root: &std::path::Path, arch: Option<&str>) -> Result<Solution> {
    let config = load_for_project(project_root);
    let settings = match arch {
        Some(arch) => BuildSettings::for_target(arch),
        None => BuildSettings::default(),
    };
    let solution = Solution::new(settings, config);
    solution.detect_compilers()?;
    Ok(solution)
}
