//! BLAKE3 hashing utilities for payload integrity

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use blake3::Hasher;
use walkdir::WalkDir;

/// Hash prefix for BLAKE3 hashes
pub const HASH_PREFIX: &str = "blake3:";

fn update_from_reader(hasher: &mut Hasher, reader: impl Read) -> io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(())
}

/// Calculate BLAKE3 hash of a file
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut hasher = Hasher::new();
    update_from_reader(&mut hasher, File::open(path)?)?;
    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}

/// Calculate BLAKE3 hash of a payload tree
///
/// Every regular file and symbolic link is hashed in path order, together
/// with its path relative to `path`, so renames and moves change the digest.
/// Links contribute their target, never what they point at. Directories and
/// permissions do not take part.
pub fn hash_directory(path: &Path) -> io::Result<String> {
    if !path.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", path.display()),
        ));
    }

    let mut hasher = Hasher::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        let file_type = entry.file_type();
        let tag: &[u8] = if file_type.is_file() {
            b"file\0"
        } else if file_type.is_symlink() {
            b"link\0"
        } else {
            continue;
        };

        hasher.update(tag);
        hasher.update(relative_name(path, entry.path()).as_bytes());
        hasher.update(b"\0");

        if file_type.is_symlink() {
            let link_target = std::fs::read_link(entry.path())?;
            hasher.update(link_target.to_string_lossy().as_bytes());
        } else {
            update_from_reader(&mut hasher, File::open(entry.path())?)?;
        }

        hasher.update(b"\0");
    }

    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}

/// `/`-separated path of `entry` below `root`
fn relative_name(root: &Path, entry: &Path) -> String {
    // Forward slashes keep digests identical across platforms
    entry
        .strip_prefix(root)
        .unwrap_or(entry)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Verify a hash matches the expected value
pub fn verify_hash(expected: &str, actual: &str) -> bool {
    let normalize = |h: &str| {
        let h = h.trim().to_ascii_lowercase();
        if h.starts_with(HASH_PREFIX) {
            h
        } else {
            format!("{HASH_PREFIX}{h}")
        }
    };

    normalize(expected) == normalize(actual)
}
