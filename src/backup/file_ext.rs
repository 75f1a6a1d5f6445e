use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub trait FileExtProvider {
    fn file_ext(&self) -> &'static str;

    /// `input` with this provider's extension appended (`dump` -> `dump.xz`),
    /// never replacing an existing one.
    fn output_path(&self, input: &Path) -> PathBuf {
        append_ext(input, self.file_ext())
    }
}

pub fn append_ext<P: AsRef<Path>>(path: P, ext: &str) -> PathBuf {
    let mut s = OsString::from(path.as_ref());
    s.push(".");
    s.push(ext);
    s.into()
}
