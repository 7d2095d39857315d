//! Subcommand implementations.

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, bail};
use tinmail_core::{
    Account, Attachment, AttachmentStore, BodyExtraction, Config, Draft, Error, ImapTls,
    MailRetriever, MailboxFilter, MessageComposer, MimeParser, download_to_folder,
    open_attachment, sanitize_filename,
};
use tracing::info;

use crate::render;

/// Loaded configuration and the selected account.
pub struct Context {
    config: Config,
    account: Account,
}

impl Context {
    /// Loads the config file and picks the account.
    pub fn load(path: Option<&Path>, account: Option<&str>) -> anyhow::Result<Self> {
        let config = Config::load(path)?;
        let account = config.account(account)?.clone();
        info!(account = %account.email, "using account");
        Ok(Self { config, account })
    }

    fn retriever(&self, store: AttachmentStore) -> MailRetriever<ImapTls> {
        MailRetriever::from_config(&self.account.imap, MimeParser::new(store))
    }

    /// Retriever that stores the attachments of message `uid` in a directory
    /// of their own.
    fn message_retriever(&self, uid: u32) -> anyhow::Result<MailRetriever<ImapTls>> {
        let base = AttachmentStore::in_data_dir()?;
        let store = message_store(base.root(), &self.account.email, uid)?;
        Ok(self.retriever(store))
    }
}

/// Empty attachment store for one message. Whatever an earlier fetch of the
/// same message left behind is removed, so fetching it again yields the
/// same file names instead of `_1`, `_2` copies.
fn message_store(base: &Path, account: &str, uid: u32) -> anyhow::Result<AttachmentStore> {
    let root = base.join(sanitize_filename(account)).join(uid.to_string());
    match std::fs::remove_dir_all(&root) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            return Err(e).with_context(|| format!("clearing {}", root.display()));
        }
        _ => {}
    }
    Ok(AttachmentStore::new(root))
}

pub async fn list(
    ctx: &Context,
    filter: Option<MailboxFilter>,
    json: bool,
    watch: bool,
) -> anyhow::Result<()> {
    let filter = filter.unwrap_or(ctx.config.inbox_view);
    let retriever = ctx.retriever(AttachmentStore::in_data_dir()?);

    if watch && ctx.config.auto_refresh == 0 {
        bail!("--watch needs auto_refresh to be set in the config");
    }

    loop {
        let messages = retriever.list_messages(filter).await?;
        if json {
            let entries: Vec<_> = messages
                .iter()
                .map(|message| render::ListEntry {
                    uid: message.uid,
                    message,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else if messages.is_empty() {
            println!("No {filter} messages.");
        } else {
            print!("{}", render::message_table(&messages));
        }

        if !watch {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(ctx.config.auto_refresh)).await;
        println!();
    }
}

pub async fn read(ctx: &Context, uid: u32, json: bool) -> anyhow::Result<()> {
    let body = match ctx.message_retriever(uid)?.fetch_body(uid).await {
        Ok(body) => body,
        Err(e) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&error_json(&e))?);
                return Err(e.into());
            }
            // Attachments saved before the failure are still usable.
            let attachments = e.attachments();
            if !attachments.is_empty() {
                println!("Attachments:");
                print!("{}", render::attachment_list(attachments));
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&body_json(&body))?);
        return Ok(());
    }

    println!("{}", render::body_text(&body));
    if !body.attachments.is_empty() {
        println!();
        println!("Attachments:");
        print!("{}", render::attachment_list(&body.attachments));
    }
    Ok(())
}

fn body_json(body: &BodyExtraction) -> serde_json::Value {
    serde_json::json!({
        "body": body.text,
        "format": body.format,
        "attachments": body.attachments,
    })
}

fn error_json(error: &Error) -> serde_json::Value {
    serde_json::json!({
        "error": error.to_string(),
        "kind": format!("{:?}", error.kind()),
        "attachments": error.attachments(),
    })
}

/// Where the body of an outgoing message comes from.
pub enum BodySource {
    Text(String),
    File(PathBuf),
    Editor,
    Stdin,
}

impl BodySource {
    pub fn from_args(body: Option<String>, body_file: Option<PathBuf>, edit: bool) -> Self {
        match (body, body_file) {
            (Some(text), _) => Self::Text(text),
            (None, Some(path)) => Self::File(path),
            (None, None) if edit => Self::Editor,
            (None, None) => Self::Stdin,
        }
    }

    fn read(self, editor: Option<&str>) -> anyhow::Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::File(path) => std::fs::read_to_string(&path)
                .with_context(|| format!("reading body from {}", path.display())),
            Self::Editor => edit_body(editor),
            Self::Stdin => {
                let mut body = String::new();
                std::io::stdin()
                    .read_to_string(&mut body)
                    .context("reading body from stdin")?;
                Ok(body)
            }
        }
    }
}

fn edit_body(editor: Option<&str>) -> anyhow::Result<String> {
    let editor = editor
        .map(str::to_string)
        .or_else(|| std::env::var("EDITOR").ok())
        .filter(|e| !e.trim().is_empty())
        .context("no editor configured; set `editor` in the config or $EDITOR")?;
    run_editor(&editor)
}

/// Opens a fresh draft file in `editor` and returns what was saved. The
/// draft is removed afterwards whether or not the editor succeeded.
fn run_editor(editor: &str) -> anyhow::Result<String> {
    let draft = tempfile::Builder::new()
        .prefix("tinmail-draft-")
        .suffix(".txt")
        .tempfile()
        .context("creating draft file")?
        .into_temp_path();

    let mut words = editor.split_whitespace();
    let program = words.next().context("empty editor command")?;
    let status = std::process::Command::new(program)
        .args(words)
        .arg(draft.as_os_str())
        .status()
        .with_context(|| format!("starting editor `{editor}`"))?;
    if !status.success() {
        bail!("editor exited with {status}");
    }
    std::fs::read_to_string(&draft).context("reading draft")
}

pub async fn send(
    ctx: &Context,
    to: String,
    cc: String,
    subject: String,
    body: BodySource,
    attach: &[PathBuf],
) -> anyhow::Result<()> {
    let attachments = attach
        .iter()
        .map(|path| {
            Attachment::from_path(path)
                .with_context(|| format!("cannot attach {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let draft = Draft {
        to,
        cc,
        subject,
        body: body.read(ctx.config.editor.as_deref())?,
        attachments,
    };

    MessageComposer::from_config(&ctx.account.smtp)
        .send(&ctx.account.email, &draft)
        .await?;
    println!("Message sent to {}", draft.recipients().join(", "));
    Ok(())
}

/// Fetches a message and returns its attachments, even when no body text
/// could be extracted.
async fn fetch_attachments(ctx: &Context, uid: u32) -> anyhow::Result<Vec<Attachment>> {
    match ctx.message_retriever(uid)?.fetch_body(uid).await {
        Ok(body) => Ok(body.attachments),
        Err(Error::Body { attachments, .. }) => Ok(attachments),
        Err(e) => Err(e.into()),
    }
}

fn pick(attachments: &[Attachment], index: usize) -> anyhow::Result<&Attachment> {
    index
        .checked_sub(1)
        .and_then(|i| attachments.get(i))
        .with_context(|| {
            format!(
                "no attachment {index}; the message has {}",
                attachments.len()
            )
        })
}

pub async fn download(ctx: &Context, uid: u32, index: Option<usize>) -> anyhow::Result<()> {
    let attachments = fetch_attachments(ctx, uid).await?;
    if attachments.is_empty() {
        bail!("message {uid} has no attachments");
    }

    let selected = match index {
        Some(index) => vec![pick(&attachments, index)?],
        None => attachments.iter().collect(),
    };
    for attachment in selected {
        let path = download_to_folder(attachment, &ctx.config.download_folder)
            .with_context(|| format!("downloading {}", attachment.filename))?;
        println!("{}", path.display());
    }
    Ok(())
}

pub async fn open(ctx: &Context, uid: u32, index: usize) -> anyhow::Result<()> {
    let attachments = fetch_attachments(ctx, uid).await?;
    let attachment = pick(&attachments, index)?;
    open_attachment(attachment).with_context(|| format!("opening {}", attachment.filename))?;
    Ok(())
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

    fn attachments() -> Vec<Attachment> {
        ["a.txt", "b.pdf"]
            .iter()
            .map(|name| Attachment {
                filename: (*name).to_string(),
                ..Attachment::default()
            })
            .collect()
    }

    #[test]
    fn test_pick_is_one_based() {
        let list = attachments();
        assert_eq!(pick(&list, 1).unwrap().filename, "a.txt");
        assert_eq!(pick(&list, 2).unwrap().filename, "b.pdf");
        assert!(pick(&list, 0).is_err());
        let err = pick(&list, 3).unwrap_err();
        assert_eq!(err.to_string(), "no attachment 3; the message has 2");
    }

    #[test]
    fn test_body_source_precedence() {
        assert!(matches!(
            BodySource::from_args(Some("x".into()), None, false),
            BodySource::Text(_)
        ));
        assert!(matches!(
            BodySource::from_args(None, Some(PathBuf::from("b.txt")), false),
            BodySource::File(_)
        ));
        assert!(matches!(
            BodySource::from_args(None, None, true),
            BodySource::Editor
        ));
        assert!(matches!(
            BodySource::from_args(None, None, false),
            BodySource::Stdin
        ));
    }

    #[test]
    fn test_body_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.txt");
        std::fs::write(&path, "Dear Bob,\n").unwrap();
        let body = BodySource::File(path).read(None).unwrap();
        assert_eq!(body, "Dear Bob,\n");
    }

    /// Editor command that records the draft path, then runs `body`.
    #[cfg(unix)]
    fn fake_editor(dir: &Path, body: &str) -> (String, PathBuf) {
        let seen = dir.join("draft-path");
        let script = dir.join("editor.sh");
        std::fs::write(
            &script,
            format!("printf '%s' \"$1\" > '{}'\n{body}\n", seen.display()),
        )
        .unwrap();
        (format!("sh {}", script.display()), seen)
    }

    #[cfg(unix)]
    #[test]
    fn test_editor_draft_is_read_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (editor, seen) = fake_editor(dir.path(), "printf 'Dear Bob' > \"$1\"");

        let body = run_editor(&editor).unwrap();
        assert_eq!(body, "Dear Bob");

        let draft = PathBuf::from(std::fs::read_to_string(&seen).unwrap());
        let name = draft.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("tinmail-draft-"));
        assert!(name.ends_with(".txt"));
        assert!(!draft.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_editor_still_removes_draft() {
        let dir = tempfile::tempdir().unwrap();
        let (editor, seen) = fake_editor(dir.path(), "exit 3");

        let err = run_editor(&editor).unwrap_err();
        assert!(err.to_string().starts_with("editor exited with"));

        let draft = PathBuf::from(std::fs::read_to_string(&seen).unwrap());
        assert!(!draft.exists());
    }

    #[test]
    fn test_refetching_a_message_reuses_names() {
        let dir = tempfile::tempdir().unwrap();

        let store = message_store(dir.path(), "me@example.com", 42).unwrap();
        let first = store.save("invoice.pdf", b"one").unwrap();
        let store = message_store(dir.path(), "me@example.com", 42).unwrap();
        let second = store.save("invoice.pdf", b"two").unwrap();

        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("me@example.com/42/invoice.pdf"));
        assert_eq!(std::fs::read(&second).unwrap(), b"two");

        let other = message_store(dir.path(), "me@example.com", 7).unwrap();
        other.save("invoice.pdf", b"three").unwrap();
        assert!(second.is_file());
    }

    #[test]
    fn test_error_json() {
        let err = Error::Body {
            error: tinmail_core::BodyError::NoTextContent,
            attachments: attachments(),
        };
        let json = error_json(&err);
        assert!(json["error"].as_str().unwrap().starts_with("Failed to parse email body"));
        assert_eq!(json["attachments"][1]["filename"], "b.pdf");

        let json = error_json(&Error::NotFound(9));
        assert_eq!(json["error"], "email not found (UID 9)");
        assert_eq!(json["kind"], "Protocol");
        assert!(json["attachments"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_body_json() {
        let body = BodyExtraction {
            text: "Hello".to_string(),
            format: tinmail_core::TextFormat::Html,
            attachments: Vec::new(),
        };
        let json = body_json(&body);
        assert_eq!(json["body"], "Hello");
        assert_eq!(json["format"], "html");
        assert!(json["attachments"].as_array().unwrap().is_empty());
    }
}
