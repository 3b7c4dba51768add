//! Browser UI: one page with an upload form, a preview and the answer.
//!
//! Routes:
//! - `GET /` renders the form.
//! - `POST /ask` takes a multipart form with `image` and `question`.
//! - `GET /health` returns `OK`.

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use imago::config::ServerConfig;
use imago::upload::{ALLOWED_EXTENSIONS, Answer, ImageUpload, QuestionHandler};
use tracing::{debug, info};

use crate::error::{Result, ServerError};

const TITLE: &str = "Ask a Question About an Image";
const SUBTITLE: &str = "Upload an image and ask natural language questions powered by Vision + LLMs";
const FOOTER: &str = "© 2026 Adnan Faisal. All rights reserved.";

/// Shared state of the web handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    handler: QuestionHandler,
}

impl AppState {
    /// Wraps a question handler.
    #[must_use]
    pub const fn new(handler: QuestionHandler) -> Self {
        Self { handler }
    }
}

/// Builds the router. Request bodies above `max_upload_bytes` are refused.
#[must_use]
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ask", post(ask))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Serves the UI on `config.bind` until Ctrl+C.
///
/// # Errors
///
/// Fails when the address cannot be bound or the server stops abnormally.
pub async fn serve(handler: QuestionHandler, config: &ServerConfig) -> Result<()> {
    let app = router(AppState::new(handler), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(addr = %listener.local_addr()?, "Web UI listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Web UI stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn health() -> &'static str {
    "OK"
}

async fn index() -> Html<String> {
    Html(render_page("", ""))
}

/// The fields of a submitted form.
#[derive(Debug, Default)]
struct AskForm {
    upload: Option<ImageUpload>,
    question: String,
}

impl AskForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("image") => {
                    let filename = field.file_name().unwrap_or_default().to_owned();
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was chosen.
                    if !filename.is_empty() && !bytes.is_empty() {
                        form.upload = Some(ImageUpload::new(filename, bytes.to_vec()));
                    }
                }
                Some("question") => form.question = field.text().await?,
                other => debug!(field = ?other, "Ignoring form field"),
            }
        }

        Ok(form)
    }
}

async fn ask(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let form = AskForm::read(multipart).await?;

    let Some(upload) = form.upload else {
        return Ok(Html(render_page(&form.question, "")).into_response());
    };
    upload.validate()?;

    let question = form.question.as_str();
    let preview = preview_block(&upload);
    let response = match state.handler.handle(&upload, question).await {
        Ok(Some(answer)) => {
            Html(render_page(question, &(preview + &answer_block(&answer)))).into_response()
        }
        Ok(None) => Html(render_page(question, &preview)).into_response(),
        Err(e) => {
            let err = ServerError::from(e);
            tracing::error!(error = %err, "Failed to answer question");
            let body = render_page(question, &(preview + &error_block(&err.to_string())));
            (err.status(), Html(body)).into_response()
        }
    };

    Ok(response)
}

/// Renders the full page with `content` between the form and the footer.
/// The question field is pre-filled with `question`.
pub(crate) fn render_page(question: &str, content: &str) -> String {
    let question = escape_html(question);
    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{TITLE}</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
.preview img {{ max-width: 100%; }}
.answer {{ background: #eef6ee; padding: 1rem; border-radius: 4px; }}
.error {{ background: #fbeaea; padding: 1rem; border-radius: 4px; }}
footer {{ margin-top: 3rem; color: #666; font-size: 0.9rem; }}
</style>
</head>
<body>
<h1>{TITLE}</h1>
<p>{SUBTITLE}</p>
<form action="/ask" method="post" enctype="multipart/form-data">
<p><label>Upload an image <input type="file" name="image" accept="{accept}"></label></p>
<p><label>Ask a question about the image <input type="text" name="question" size="60" value="{question}"></label></p>
<p><button type="submit">Ask</button></p>
</form>
{content}
<footer>{FOOTER}</footer>
</body>
</html>
"#
    )
}

fn preview_block(upload: &ImageUpload) -> String {
    format!(
        r#"<div class="preview"><img src="{}" alt="{}"></div>
"#,
        upload.data_url(),
        escape_html(&upload.filename)
    )
}

fn answer_block(answer: &Answer) -> String {
    format!(
        r#"<div class="answer"><p><em>{}</em></p><h3>Answer:</h3><p>{}</p></div>
"#,
        escape_html(&answer.question),
        escape_html(&answer.text)
    )
}

/// An error message block.
pub(crate) fn error_block(message: &str) -> String {
    format!(
        r#"<div class="error"><h3>Error</h3><p>{}</p></div>
"#,
        escape_html(message)
    )
}

/// Escapes text for use in HTML element content and attribute values.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
