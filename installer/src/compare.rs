//! Freshness checks deciding whether an artefact needs copying.
//!
//! The check is separate from the copy so that the policy can be exercised
//! without touching the deployment logic.

use camino::Utf8Path;
use log::trace;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read};

/// How an existing destination is judged against its source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ComparePolicy {
    /// Compare sizes, then SHA-256 digests of the contents.
    #[default]
    Content,
    /// Compare sizes, then treat a source newer than the destination as changed.
    Mtime,
}

/// Return `true` when `destination` is absent or differs from `source`.
///
/// # Errors
///
/// Returns an I/O error if either file cannot be inspected. A missing
/// destination is not an error.
pub fn needs_copy(
    source: &Utf8Path,
    destination: &Utf8Path,
    policy: ComparePolicy,
) -> io::Result<bool> {
    let dest_meta = match fs::metadata(destination) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            trace!("{destination} absent");
            return Ok(true);
        }
        Err(err) => return Err(err),
    };
    if !dest_meta.is_file() {
        trace!("{destination} is not a regular file");
        return Ok(true);
    }

    let source_meta = fs::metadata(source)?;
    if source_meta.len() != dest_meta.len() {
        trace!("{destination} size differs from {source}");
        return Ok(true);
    }

    let changed = match policy {
        ComparePolicy::Content => file_digest(source)? != file_digest(destination)?,
        ComparePolicy::Mtime => source_meta.modified()? > dest_meta.modified()?,
    };
    trace!("{destination} compared by {policy:?}: changed={changed}");
    Ok(changed)
}

/// SHA-256 digest of a file, streamed in fixed-size chunks.
fn file_digest(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(hasher.finalize().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Pair {
        _dir: TempDir,
        source: Utf8PathBuf,
        destination: Utf8PathBuf,
    }

    #[fixture]
    fn pair() -> Pair {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("temp dir not UTF-8");
        let source = root.join("source");
        let destination = root.join("destination");
        fs::write(&source, b"syscallbuf").expect("failed to write source");
        Pair {
            _dir: dir,
            source,
            destination,
        }
    }

    fn set_mtime(path: &Utf8Path, time: SystemTime) {
        let file = fs::File::options()
            .write(true)
            .open(path)
            .expect("failed to open for mtime");
        file.set_modified(time).expect("failed to set mtime");
    }

    #[rstest]
    #[case::content(ComparePolicy::Content)]
    #[case::mtime(ComparePolicy::Mtime)]
    fn missing_destination_needs_copy(pair: Pair, #[case] policy: ComparePolicy) {
        assert!(needs_copy(&pair.source, &pair.destination, policy).expect("compare failed"));
    }

    #[rstest]
    #[case::content(ComparePolicy::Content)]
    #[case::mtime(ComparePolicy::Mtime)]
    fn size_change_needs_copy(pair: Pair, #[case] policy: ComparePolicy) {
        fs::write(&pair.destination, b"syscallbuf-old").expect("failed to write destination");
        assert!(needs_copy(&pair.source, &pair.destination, policy).expect("compare failed"));
    }

    #[rstest]
    fn identical_content_is_fresh(pair: Pair) {
        fs::copy(&pair.source, &pair.destination).expect("failed to copy");
        assert!(
            !needs_copy(&pair.source, &pair.destination, ComparePolicy::Content)
                .expect("compare failed")
        );
    }

    #[rstest]
    fn same_size_different_bytes_needs_copy_by_content(pair: Pair) {
        fs::write(&pair.destination, b"SYSCALLBUF").expect("failed to write destination");
        assert!(
            needs_copy(&pair.source, &pair.destination, ComparePolicy::Content)
                .expect("compare failed")
        );
    }

    #[rstest]
    fn mtime_policy_ignores_bytes_when_destination_is_newer(pair: Pair) {
        fs::write(&pair.destination, b"SYSCALLBUF").expect("failed to write destination");
        let now = SystemTime::now();
        set_mtime(&pair.source, now - Duration::from_secs(60));
        set_mtime(&pair.destination, now);
        assert!(
            !needs_copy(&pair.source, &pair.destination, ComparePolicy::Mtime)
                .expect("compare failed")
        );
    }

    #[rstest]
    fn mtime_policy_copies_newer_source(pair: Pair) {
        fs::copy(&pair.source, &pair.destination).expect("failed to copy");
        let now = SystemTime::now();
        set_mtime(&pair.destination, now - Duration::from_secs(60));
        set_mtime(&pair.source, now);
        assert!(
            needs_copy(&pair.source, &pair.destination, ComparePolicy::Mtime)
                .expect("compare failed")
        );
    }

    #[rstest]
    fn directory_in_place_of_destination_needs_copy(pair: Pair) {
        fs::create_dir(&pair.destination).expect("failed to create dir");
        assert!(
            needs_copy(&pair.source, &pair.destination, ComparePolicy::Content)
                .expect("compare failed")
        );
    }

    #[rstest]
    fn missing_source_is_an_error(pair: Pair) {
        fs::copy(&pair.source, &pair.destination).expect("failed to copy");
        fs::remove_file(&pair.source).expect("failed to remove source");
        assert!(needs_copy(&pair.source, &pair.destination, ComparePolicy::Content).is_err());
    }
}
