use crate::{
    client::ThumbnailClient,
    config::Config,
    error::ThumbnailError,
    models::{FanOut, Responses, ThumbnailRequest},
};
use actix_multipart::Multipart;
use actix_web::{
    get,
    guard::{self, GuardContext},
    http::{header, StatusCode},
    post, web, App, HttpResponse, HttpServer, ResponseError,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PORT: u16 = 5000;

// Base images arrive inline, as base64 JSON or a form file part.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// JSON body, or the `payload` part of a multipart form (where `image` is a file part).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateThumbnailsBody {
    #[serde(default)]
    pub user_responses: Responses,
    pub placement: Option<String>,
    pub image: Option<String>,
    pub variations: Option<usize>,
    pub fan_out: Option<FanOut>,
}

impl GenerateThumbnailsBody {
    fn into_request(self) -> ThumbnailRequest {
        let mut request = ThumbnailRequest::new(self.user_responses);
        request.placement = self.placement;
        request.base_image = self.image;
        if let Some(variations) = self.variations {
            request.variations = variations;
        }
        if let Some(fan_out) = self.fan_out {
            request.fan_out = fan_out;
        }
        request
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewritePromptBody {
    #[serde(default)]
    pub user_responses: Responses,
    pub placement: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewritePromptReply {
    pub rewritten_prompt: String,
}

impl ResponseError for ThumbnailError {
    fn status_code(&self) -> StatusCode {
        if self.is_caller_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string(),
            "code": self.code(),
        }))
    }
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn respond_with_batch(
    client: &ThumbnailClient,
    body: GenerateThumbnailsBody,
) -> Result<HttpResponse, ThumbnailError> {
    let request = body.into_request();

    // Dropping the handler (client disconnect) cancels outstanding slots.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let batch = client.generate_thumbnails(&request, &cancel).await?;
    Ok(HttpResponse::Ok().json(batch))
}

async fn generate_from_json(
    client: web::Data<ThumbnailClient>,
    body: web::Json<GenerateThumbnailsBody>,
) -> Result<HttpResponse, ThumbnailError> {
    respond_with_batch(&client, body.into_inner()).await
}

async fn generate_from_form(
    client: web::Data<ThumbnailClient>,
    form: Multipart,
) -> Result<HttpResponse, ThumbnailError> {
    let body = read_form(form).await?;
    respond_with_batch(&client, body).await
}

fn is_multipart(ctx: &GuardContext<'_>) -> bool {
    ctx.head()
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.starts_with("multipart/form-data"))
}

fn invalid_form(e: impl std::fmt::Display) -> ThumbnailError {
    ThumbnailError::InvalidRequest(format!("malformed multipart body: {}", e))
}

/// Collect the `payload` JSON part and the `image` file part. Unknown parts are skipped.
async fn read_form(mut form: Multipart) -> Result<GenerateThumbnailsBody, ThumbnailError> {
    let mut body: Option<GenerateThumbnailsBody> = None;
    let mut image: Option<String> = None;
    let mut total = 0;

    while let Some(field) = form.next().await {
        let mut field = field.map_err(invalid_form)?;
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();
        let mime = field.content_type().map(|m| m.essence_str().to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(invalid_form)?;
            total += chunk.len();
            if total > MAX_BODY_BYTES {
                return Err(ThumbnailError::InvalidRequest(format!(
                    "upload exceeds {} bytes",
                    MAX_BODY_BYTES
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "payload" => {
                body = Some(serde_json::from_slice(&bytes).map_err(|e| {
                    ThumbnailError::InvalidRequest(format!("invalid payload field: {}", e))
                })?);
            }
            "image" if !bytes.is_empty() => {
                let encoded = STANDARD.encode(&bytes);
                image = Some(match mime {
                    Some(mime) if mime.starts_with("image/") => {
                        format!("data:{};base64,{}", mime, encoded)
                    }
                    _ => encoded,
                });
            }
            other => log::debug!("Ignoring form field {:?}", other),
        }
    }

    let mut body = body.unwrap_or_default();
    body.image = image;
    Ok(body)
}

#[post("/api/rewrite-prompt")]
async fn rewrite_prompt(
    client: web::Data<ThumbnailClient>,
    body: web::Json<RewritePromptBody>,
) -> HttpResponse {
    let body = body.into_inner();
    let mut request = ThumbnailRequest::new(body.user_responses);
    request.placement = body.placement;

    let rewritten_prompt = client.rewrite_prompt(&request).await;
    HttpResponse::Ok().json(RewritePromptReply { rewritten_prompt })
}

fn json_error(err: actix_web::error::JsonPayloadError) -> actix_web::Error {
    let message = err.to_string();
    actix_web::error::InternalError::from_response(
        err,
        HttpResponse::BadRequest().json(json!({ "message": message, "code": "INVALID_REQUEST" })),
    )
    .into()
}

/// Register routes and the JSON limits. The caller supplies the client as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(MAX_BODY_BYTES)
            .error_handler(|err, _req| json_error(err)),
    )
    .service(health)
    .service(
        web::resource("/api/generatethumbnails")
            .route(
                web::post()
                    .guard(guard::fn_guard(is_multipart))
                    .to(generate_from_form),
            )
            .route(web::post().to(generate_from_json)),
    )
    .service(rewrite_prompt);
}

pub async fn run(config: Config) -> io::Result<()> {
    let client = ThumbnailClient::new(&config)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let data = web::Data::new(client);

    log::info!("🚀 Server listening on http://0.0.0.0:{}", port);

    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
