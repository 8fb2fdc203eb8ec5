use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tempfile::NamedTempFile;

use crate::error::Result;

static DIFF_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^```(?:diff)?\n(.*?)\n```$").expect("DIFF_FENCE_RE regex should compile")
});

/// Unwrap a patch from a ```` ```diff ```` (or untagged) fence. Unfenced
/// input comes back trimmed.
pub fn strip_fences(input: &str) -> &str {
    let trimmed = input.trim();
    DIFF_FENCE_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str())
}

/// A patch staged on disk for `git apply`. The file is removed when the
/// value is dropped, whichever way the attempt ends.
pub struct PatchFile {
    file: NamedTempFile,
}

impl PatchFile {
    pub fn write(patch: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(".ai-generated")
            .suffix(".patch")
            .tempfile()?;

        file.write_all(patch.as_bytes())?;
        if !patch.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.flush()?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
