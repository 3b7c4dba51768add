//! Turning an uploaded image and a question into an answer.
//!
//! This is the surface-independent core of the presentation layer. The web
//! UI and the CLI both hand an [`ImageUpload`] and the question text to
//! [`QuestionHandler::handle`], which:
//!
//! 1. skips empty questions without touching the filesystem,
//! 2. stages the bytes in a fresh temp file carrying the upload's extension,
//! 3. asks the [`Session`] once with the question and the staged path,
//! 4. removes the temp file when it goes out of scope, whatever happened.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::agent::RunResult;
use crate::error::{Error, Result};
use crate::session::Session;

/// Extensions the upload surfaces accept.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Prefix of staged file names.
const TEMP_PREFIX: &str = "imago-";

/// An image as received from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// Original file name; only its extension is used.
    pub filename: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Creates an upload.
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads an upload from a file on disk.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, bytes })
    }

    /// Extension of the original file name, as written.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
    }

    /// Temp file suffix: the extension with its leading dot, or empty.
    #[must_use]
    pub fn suffix(&self) -> String {
        self.extension().map(|ext| format!(".{ext}")).unwrap_or_default()
    }

    /// MIME type guessed from the file name.
    #[must_use]
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_owned()
    }

    /// The image as a `data:` URL, for inline previews.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.bytes))
    }

    /// Whether the extension is one of [`ALLOWED_EXTENSIONS`].
    #[must_use]
    pub fn is_allowed_type(&self) -> bool {
        self.extension().is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
    }

    /// Rejects uploads outside the accepted file types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upload`] for empty uploads and disallowed types.
    pub fn validate(&self) -> Result<()> {
        if self.bytes.is_empty() {
            return Err(Error::upload("the uploaded file is empty"));
        }
        if !self.is_allowed_type() {
            return Err(Error::upload(format!(
                "unsupported file type '{}' (expected one of: {})",
                self.filename,
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }
        Ok(())
    }
}

/// An upload written to a uniquely named temp file.
///
/// The file is deleted when this value is dropped.
#[derive(Debug)]
pub struct StagedImage {
    file: NamedTempFile,
}

impl StagedImage {
    /// Writes `upload` to a new temp file in `dir` (system temp dir when
    /// `None`). The name ends with the upload's suffix.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be created or written.
    pub fn stage(upload: &ImageUpload, dir: Option<&Path>) -> Result<Self> {
        let suffix = upload.suffix();
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(&suffix);

        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }?;
        file.write_all(&upload.bytes)?;
        file.flush()?;

        debug!(path = %file.path().display(), size = upload.bytes.len(), "Staged upload");
        Ok(Self { file })
    }

    /// Where the image lives while staged.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Deletes the file now, reporting failures instead of ignoring them.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be removed.
    pub fn remove(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }
}

/// The request string the agent receives.
#[must_use]
pub fn build_request(question: &str, image_path: &Path) -> String {
    format!("{question}, this is the image path: {}", image_path.display())
}

/// An answered question.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The question as asked.
    pub question: String,
    /// The answer text.
    pub text: String,
    /// Details of the agent run.
    pub run: RunResult,
}

/// Handles one question about one upload at a time.
#[derive(Debug, Clone)]
pub struct QuestionHandler {
    session: Arc<Session>,
    temp_dir: Option<PathBuf>,
}

impl QuestionHandler {
    /// Creates a handler over a shared session.
    #[must_use]
    pub const fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            temp_dir: None,
        }
    }

    /// Stages uploads in `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// The session questions go to.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Answers `question` about `upload`.
    ///
    /// Returns `Ok(None)` for an empty question; nothing is staged and the
    /// agent is not called. Any other text, whitespace included, is passed
    /// on as typed.
    ///
    /// # Errors
    ///
    /// Returns staging failures and agent errors. The temp file is removed
    /// in every case.
    pub async fn handle(&self, upload: &ImageUpload, question: &str) -> Result<Option<Answer>> {
        if question.is_empty() {
            debug!("Empty question, nothing to do");
            return Ok(None);
        }

        let staged = StagedImage::stage(upload, self.temp_dir.as_deref())?;
        let request = build_request(question, staged.path());
        info!(filename = %upload.filename, path = %staged.path().display(), "Answering question");

        let outcome = self.session.ask(&request).await;

        let path = staged.path().to_path_buf();
        if let Err(e) = staged.remove() {
            warn!(path = %path.display(), error = %e, "Failed to remove staged image");
        }

        let run = outcome?;
        Ok(Some(Answer {
            question: question.to_owned(),
            text: run.output.clone(),
            run,
        }))
    }
}
