//! Per scheduled item identity.

use std::path::Path;

/// Identity of one scheduled payload.
///
/// `index` is 1-based and increases across the whole run, so sequence values
/// derived from it do not depend on how the work is split between workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadContext {
    pub index: u64,
    pub template_file_path: String,
    pub template_file_name: String,
    pub template_directory: String,
    pub template_file_stem: String,
}

impl PayloadContext {
    /// Create the context for the item at `index` rendered from `template_path`.
    pub fn new(index: u64, template_path: &Path) -> Self {
        let lossy = |s: Option<&std::ffi::OsStr>| {
            s.map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        Self {
            index,
            template_file_path: template_path.to_string_lossy().into_owned(),
            template_file_name: lossy(template_path.file_name()),
            template_directory: template_path
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            template_file_stem: lossy(template_path.file_stem()),
        }
    }
}
