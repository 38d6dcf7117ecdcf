use std::{fs, io::Write, path::Path};

/// Replace `path` with `bytes` via a synced temp file and a rename, so a power
/// cut leaves either the old or the new contents, never a torn file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}
