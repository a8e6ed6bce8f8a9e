//! Utility functions shared across the crate.

pub mod file_system;

/// Converts a vector of string slices to a vector of owned strings.
pub fn to_owned(vec: Vec<impl AsRef<str>>) -> Vec<String> {
    vec.into_iter().map(|s| s.as_ref().to_owned()).collect()
}

/// Returns the platform-specific name of an executable.
pub fn find_executable(name: impl AsRef<str>) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", name.as_ref())
    } else {
        name.as_ref().to_string()
    }
}
