//! Attachment persistence.
//!
//! Extracted attachments are written under a single root directory. File
//! names are sanitized so a declared name can never point outside that
//! root, and an existing file is never overwritten: a clash gets a numeric
//! suffix (`invoice.pdf`, `invoice_1.pdf`, ...).

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::Attachment;

/// Name used when a part declares no filename.
pub const PLACEHOLDER_FILENAME: &str = "unnamed_attachment";

/// Names tried before giving up on a free one.
pub const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Writes attachment bytes below a fixed root directory.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    /// Creates a store rooted at `root`. The directory is created on the
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the platform data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no data directory.
    pub fn in_data_dir() -> crate::Result<Self> {
        Ok(Self::new(crate::config::attachments_dir()?))
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persists `data` under a sanitized form of `filename`.
    ///
    /// Returns the path that was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written, or if
    /// no free name is found within [`MAX_NAME_ATTEMPTS`].
    pub fn save(&self, filename: &str, data: &[u8]) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.root)?;
        let name = sanitize_filename(filename);
        let (file, path) = create_unique(&self.root, &name, |stem, n, ext| {
            format!("{stem}_{n}{ext}")
        })?;
        write_or_discard(file, &path, |mut file| file.write_all(data))?;
        Ok(path)
    }

    /// Persists one attachment part and describes it.
    ///
    /// Failures are logged and yield `None` so the caller can carry on with
    /// the rest of the message.
    #[must_use]
    pub fn extract(
        &self,
        filename: Option<&str>,
        content_type: &str,
        data: &[u8],
    ) -> Option<Attachment> {
        let filename = filename
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(PLACEHOLDER_FILENAME);

        match self.save(filename, data) {
            Ok(path) => {
                debug!(path = %path.display(), size = data.len(), "saved attachment");
                Some(Attachment {
                    filename: filename.to_string(),
                    content_type: content_type.to_string(),
                    size: data.len() as u64,
                    file_path: Some(path),
                })
            }
            Err(e) => {
                warn!(filename, error = %e, "skipping attachment");
                None
            }
        }
    }
}

/// Copies a persisted attachment into `folder`.
///
/// The folder is created when missing. A clash becomes `name (1).ext`,
/// `name (2).ext`, ...; the stored original is left untouched.
///
/// # Errors
///
/// Returns [`StoreError::NotPersisted`] if the attachment has no file, or
/// an I/O error from reading or writing.
pub fn download_to_folder(attachment: &Attachment, folder: &Path) -> Result<PathBuf, StoreError> {
    let source = attachment
        .file_path
        .as_deref()
        .ok_or_else(|| StoreError::NotPersisted(attachment.filename.clone()))?;
    let mut input = File::open(source)?;

    fs::create_dir_all(folder)?;
    let name = sanitize_filename(&attachment.filename);
    let (output, path) = create_unique(folder, &name, |stem, n, ext| {
        format!("{stem} ({n}){ext}")
    })?;
    write_or_discard(output, &path, |mut output| {
        io::copy(&mut input, &mut output).map(drop)
    })?;
    debug!(path = %path.display(), "downloaded attachment");
    Ok(path)
}

/// Opens a persisted attachment with the platform's default application.
///
/// # Errors
///
/// Returns [`StoreError::NotPersisted`] if there is no file to open.
pub fn open_attachment(attachment: &Attachment) -> Result<(), StoreError> {
    let path = attachment
        .file_path
        .as_deref()
        .filter(|p| p.is_file())
        .ok_or_else(|| StoreError::NotPersisted(attachment.filename.clone()))?;
    opener::open(path)?;
    Ok(())
}

/// Makes a declared filename safe to join onto a directory.
///
/// Path separators and `..` sequences become `_`; a name that ends up
/// empty or `.` is replaced by [`PLACEHOLDER_FILENAME`].
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let safe = filename
        .replace(['/', '\\', '\0'], "_")
        .replace("..", "_");
    if safe.is_empty() || safe == "." {
        PLACEHOLDER_FILENAME.to_string()
    } else {
        safe
    }
}

/// Splits `name` into stem and extension (with its dot). A leading dot
/// does not start an extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    }
}

/// Creates `dir/name`, or the first free alternative produced by `rename`.
fn create_unique(
    dir: &Path,
    name: &str,
    rename: impl Fn(&str, u32, &str) -> String,
) -> Result<(File, PathBuf), StoreError> {
    let (stem, ext) = split_extension(name);
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = if attempt == 0 {
            dir.join(name)
        } else {
            dir.join(rename(stem, attempt, ext))
        };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }
    }
    Err(StoreError::CollisionLimit {
        path: dir.join(name),
        attempts: MAX_NAME_ATTEMPTS,
    })
}

/// Runs `write` on a freshly created file. On failure the file is closed
/// and removed so its name is free again.
fn write_or_discard<W>(
    out: W,
    path: &Path,
    write: impl FnOnce(W) -> io::Result<()>,
) -> io::Result<()> {
    let Err(e) = write(out) else {
        return Ok(());
    };
    if let Err(remove) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %remove, "failed to remove partial file");
    }
    Err(e)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::Component;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "____etc_passwd");
        assert_eq!(sanitize_filename("a\\b"), "a_b");
        assert_eq!(sanitize_filename(""), PLACEHOLDER_FILENAME);
        assert_eq!(sanitize_filename("."), PLACEHOLDER_FILENAME);
        assert_eq!(sanitize_filename(".."), "_");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("invoice.pdf"), ("invoice", ".pdf"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
    }

    #[test]
    fn test_collisions_get_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().join("attachments"));

        let first = store.save("invoice.pdf", b"one").unwrap();
        let second = store.save("invoice.pdf", b"two").unwrap();
        let third = store.save("invoice.pdf", b"three").unwrap();

        assert_eq!(first.file_name().unwrap(), "invoice.pdf");
        assert_eq!(second.file_name().unwrap(), "invoice_1.pdf");
        assert_eq!(third.file_name().unwrap(), "invoice_2.pdf");
        assert_eq!(fs::read(&first).unwrap(), b"one");
        assert_eq!(fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn test_traversal_stays_in_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path());

        let path = store.save("../../etc/passwd", b"x").unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        assert_eq!(path.file_name().unwrap(), "____etc_passwd");
    }

    #[test]
    fn test_extract_keeps_display_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path());

        let attachment = store
            .extract(Some("../secret.txt"), "text/plain", b"data")
            .unwrap();
        assert_eq!(attachment.filename, "../secret.txt");
        assert_eq!(attachment.content_type, "text/plain");
        assert_eq!(attachment.size, 4);
        let path = attachment.file_path.unwrap();
        assert_eq!(path.file_name().unwrap(), "__secret.txt");
        assert_eq!(fs::metadata(&path).unwrap().len(), 4);
    }

    #[test]
    fn test_extract_without_name_uses_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path());

        let attachment = store.extract(None, "application/pdf", b"%PDF").unwrap();
        assert_eq!(attachment.filename, PLACEHOLDER_FILENAME);

        let attachment = store.extract(Some("  "), "application/pdf", b"%PDF").unwrap();
        assert_eq!(
            attachment.file_path.unwrap().file_name().unwrap(),
            "unnamed_attachment_1"
        );
    }

    #[test]
    fn test_extract_write_failure_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();
        // The root is a regular file, so no directory can be created.
        let store = AttachmentStore::new(&blocker);
        assert!(store.extract(Some("a.txt"), "text/plain", b"x").is_none());
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_frees_the_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path());

        let (file, path) = create_unique(dir.path(), "invoice.pdf", |stem, n, ext| {
            format!("{stem}_{n}{ext}")
        })
        .unwrap();
        drop(file);
        assert!(path.is_file());

        let err =
            write_or_discard(FullDisk, &path, |mut out| out.write_all(b"%PDF")).unwrap_err();
        assert_eq!(err.to_string(), "no space left on device");
        assert!(!path.exists());

        let saved = store.save("invoice.pdf", b"%PDF").unwrap();
        assert_eq!(saved.file_name().unwrap(), "invoice.pdf");
        assert_eq!(fs::read(&saved).unwrap(), b"%PDF");
    }

    #[test]
    fn test_successful_write_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let file = File::create(&path).unwrap();

        write_or_discard(file, &path, |mut out| out.write_all(b"abc")).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn test_download_to_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().join("store"));
        let attachment = store.extract(Some("photo.png"), "image/png", b"png").unwrap();

        let downloads = dir.path().join("Downloads");
        let first = download_to_folder(&attachment, &downloads).unwrap();
        let second = download_to_folder(&attachment, &downloads).unwrap();

        assert_eq!(first, downloads.join("photo.png"));
        assert_eq!(second, downloads.join("photo (1).png"));
        assert_eq!(fs::read(&second).unwrap(), b"png");
        assert!(attachment.file_path.unwrap().is_file());
    }

    #[test]
    fn test_download_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let attachment = Attachment {
            filename: "x.txt".to_string(),
            ..Attachment::default()
        };
        assert!(matches!(
            download_to_folder(&attachment, dir.path()),
            Err(StoreError::NotPersisted(_))
        ));
        assert!(matches!(
            open_attachment(&attachment),
            Err(StoreError::NotPersisted(_))
        ));
    }

    proptest! {
        #[test]
        fn sanitized_names_never_escape_root(name in "\\PC{0,40}") {
            let root = Path::new("/data/attachments");
            let sanitized = sanitize_filename(&name);
            let joined = root.join(&sanitized);

            prop_assert!(!sanitized.contains('/'));
            prop_assert!(!sanitized.contains(".."));
            prop_assert_eq!(joined.parent(), Some(root));
            let components: Vec<_> = Path::new(&sanitized).components().collect();
            prop_assert_eq!(components.len(), 1);
            prop_assert!(matches!(components[0], Component::Normal(_)));
        }
    }
}
