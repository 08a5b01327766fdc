//! Fetch job descriptor

use std::path::{Path, PathBuf};

/// One fetch-and-persist unit of work
///
/// Built once by the dispatcher and never mutated afterwards. The source URL
/// is the prefix with the identifier appended verbatim; the destination is
/// the trimmed identifier plus the extension inside the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    identifier: String,
    source_url: String,
    destination_path: PathBuf,
}

impl FetchJob {
    /// Creates a job for `identifier`
    ///
    /// No validation is performed on the identifier: a malformed one simply
    /// yields a URL that fails to fetch.
    ///
    /// # Example
    ///
    /// ```
    /// use handbook_harvest::crawler::FetchJob;
    /// use std::path::Path;
    ///
    /// let job = FetchJob::new("https://example.test/view/", "AAAA10001", Path::new("out"), "html");
    /// assert_eq!(job.source_url(), "https://example.test/view/AAAA10001");
    /// assert_eq!(job.destination_path(), Path::new("out/AAAA10001.html"));
    /// ```
    pub fn new(prefix: &str, identifier: &str, output_directory: &Path, extension: &str) -> Self {
        let file_name = format!("{}.{}", identifier.trim(), extension);

        Self {
            identifier: identifier.to_string(),
            source_url: format!("{}{}", prefix, identifier),
            destination_path: output_directory.join(file_name),
        }
    }

    /// The identifier exactly as it appeared in the input list
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }
}
