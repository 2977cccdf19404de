//! File I/O: uploads, downloads with stability verification, and
//! file-chooser handling.

mod core;
mod types;

pub use core::FileIOManager;
pub use types::{DownloadResult, UploadResult};

#[cfg(test)]
mod tests {
    use sha2::{Digest, Sha256};

    #[test]
    fn sha256_of_known_bytes_matches_reference_digest() {
        let digest = Sha256::digest(b"hello");
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(hex, "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
    }
}
