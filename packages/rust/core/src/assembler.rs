//! Artifact persistence: writes extraction output to disk atomically and
//! reads it back.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use pharmai_shared::{Collection, PharmaiError, Result};

/// Indentation used for every JSON artifact.
const JSON_INDENT: &[u8] = b"    ";

/// Metadata for a written artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMeta {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Serialize `data` as 4-space indented JSON with non-ASCII kept verbatim.
pub fn to_json_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(JSON_INDENT);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Write `data` to `target` as JSON, atomically.
///
/// The parent directory is created if needed. Content goes to a hidden
/// `.{name}.tmp` sibling, is flushed and synced, then renamed over `target`.
/// The temp file is removed if any step fails.
#[instrument(skip_all, fields(path = %target.display()))]
pub fn write_json_atomic<T: Serialize>(target: &Path, data: &T) -> Result<ArtifactMeta> {
    let bytes = to_json_bytes(data)?;

    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| PharmaiError::io(&parent, e))?;

    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PharmaiError::invalid_input(format!("bad output path: {}", target.display())))?;
    let temp = parent.join(format!(".{filename}.tmp"));

    if let Err(e) = write_and_sync(&temp, &bytes) {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&temp, target) {
        let _ = std::fs::remove_file(&temp);
        return Err(PharmaiError::io(target, e));
    }

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let hash = format!("{:x}", hasher.finalize());

    debug!(size = bytes.len(), "wrote artifact");

    Ok(ArtifactMeta {
        path: target.to_path_buf(),
        sha256: hash,
        size_bytes: bytes.len(),
    })
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path).map_err(|e| PharmaiError::io(path, e))?;
    file.write_all(bytes).map_err(|e| PharmaiError::io(path, e))?;
    file.flush().map_err(|e| PharmaiError::io(path, e))?;
    file.sync_all().map_err(|e| PharmaiError::io(path, e))?;
    Ok(())
}

/// Output path of a single-document run: `<output_dir>/<stem>.json`.
pub fn single_output_path(output_dir: &Path, input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PharmaiError::invalid_input(format!("no file name: {}", input.display())))?;
    Ok(output_dir.join(format!("{stem}.json")))
}

/// Read a persisted collection (single record or keyed batch).
pub fn load_collection(path: &Path) -> Result<Collection> {
    let content = std::fs::read_to_string(path).map_err(|e| PharmaiError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| PharmaiError::validation(format!("invalid collection {}: {e}", path.display())))
}
