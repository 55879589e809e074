use serde::Serialize;
use std::path::PathBuf;

/// A local file handle produced by the picker shim.
///
/// `relative_path` is the '/'-separated folder-qualified name a folder scan
/// preserves alongside the bare name; single-file opens have none.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CandidateFile {
    pub name: String,
    pub relative_path: Option<String>,
    pub path: PathBuf,
    /// Media type declared by the picker, mapped from the extension.
    pub media_type: String,
}

impl CandidateFile {
    /// Name the file is uploaded under: the folder-qualified form when the
    /// selection came from a folder, else the bare name.
    pub fn upload_name(&self) -> &str {
        self.relative_path.as_deref().unwrap_or(&self.name)
    }
}

/// An owned inline `data:image/png;base64,...` reference to a displayable
/// thumbnail. Dropping it is the release point: replacing or clearing a
/// session must drop the previous image rather than keep it reachable.
#[derive(Debug, Clone)]
pub struct PreviewImage {
    data_uri: String,
}

impl PreviewImage {
    pub fn new(data_uri: String) -> Self {
        Self { data_uri }
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }
}
