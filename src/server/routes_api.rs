use crate::jobs::NewJob;
use crate::server::error::ApiError;
use crate::server::AppContext;
use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Json, Router,
};
use clipshrink_av::CompressionOptions;
use clipshrink_common::paths::{is_video_file, sanitize_filename, VIDEO_EXTENSIONS};
use clipshrink_common::{JobId, JobStatus};
use futures::{Stream, TryStreamExt};
use serde_json::json;
use std::io;
use std::path::{Path as FsPath, PathBuf};
use tokio::{fs::File, io::AsyncWriteExt, io::BufWriter};
use tokio_util::io::{ReaderStream, StreamReader};

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/compress", post(compress))
        .route("/status/:id", get(job_status))
        .route("/cancel/:id", post(cancel_job))
        .route("/download/:id", get(download))
        .route("/jobs", get(list_jobs))
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("Job not found: {}", raw)))
}

/// An upload being assembled from multipart fields.
struct UploadForm {
    /// Sanitised client filename and where the bytes were stored.
    upload: Option<(String, PathBuf)>,
    options: CompressionOptions,
}

async fn compress(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = JobId::new();
    let mut form = UploadForm {
        upload: None,
        options: ctx.config.defaults.clone(),
    };

    if let Err(e) = read_form(&ctx, id, &mut multipart, &mut form).await {
        if let Some((_, path)) = &form.upload {
            discard_upload(path).await;
        }
        return Err(e);
    }

    let (filename, input_path) = form
        .upload
        .ok_or_else(|| ApiError::bad_request("No file part in the request"))?;

    let name = FsPath::new(&filename);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let output_path = ctx
        .config
        .storage
        .output_dir
        .join(format!("{}_compressed_{}{}", id, stem, extension));

    let job = NewJob::new(&input_path, output_path, form.options)
        .with_id(id)
        .with_filename(filename);
    if let Err(e) = ctx.jobs.submit(job) {
        discard_upload(&input_path).await;
        return Err(e.into());
    }

    Ok(Json(json!({
        "success": true,
        "job_id": id,
        "message": "Video compression started",
    })))
}

async fn read_form(
    ctx: &AppContext,
    id: JobId,
    multipart: &mut Multipart,
    form: &mut UploadForm,
) -> Result<(), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            if form.upload.is_some() {
                return Err(ApiError::bad_request("Only one file may be uploaded per job"));
            }
            let raw = field.file_name().unwrap_or_default().to_string();
            if raw.trim().is_empty() {
                return Err(ApiError::bad_request("No file selected"));
            }
            let filename = sanitize_filename(&raw)
                .filter(|safe| is_video_file(FsPath::new(safe)))
                .ok_or_else(|| {
                    ApiError::bad_request(format!(
                        "File type not allowed. Allowed types: {}",
                        VIDEO_EXTENSIONS.join(", ")
                    ))
                })?;

            let upload_dir = &ctx.config.storage.upload_dir;
            tokio::fs::create_dir_all(upload_dir).await?;
            let path = upload_dir.join(format!("{}_{}", id, filename));
            tracing::debug!("Saving upload for job {} to {:?}", id, path);
            // Record the path first so a failed copy is cleaned up.
            form.upload = Some((filename, path.clone()));
            stream_to_file(&path, field).await?;
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid form field {}: {}", name, e)))?;
        apply_option(&mut form.options, &name, value.trim())?;
    }
    Ok(())
}

/// Apply one compression form field; unknown fields are ignored.
fn apply_option(
    options: &mut CompressionOptions,
    name: &str,
    value: &str,
) -> Result<(), ApiError> {
    fn number(name: &str, value: &str) -> Result<u32, ApiError> {
        value
            .parse()
            .map_err(|_| ApiError::bad_request(format!("{} must be a whole number", name)))
    }

    match name {
        "target_size_mb" if !value.is_empty() => options.target_size_mb = number(name, value)?,
        "crf" if !value.is_empty() => options.crf = number(name, value)?,
        "codec" if !value.is_empty() => options.codec = value.to_string(),
        "preset" if !value.is_empty() => options.preset = value.to_string(),
        "audio_bitrate" if !value.is_empty() => options.audio_bitrate = value.to_string(),
        // Non-numeric widths mean "no scaling".
        "max_width" => options.max_width = value.parse().ok().filter(|w| *w > 0),
        _ => tracing::debug!("Ignoring form field {}", name),
    }
    Ok(())
}

// Save a `Stream` to a file
async fn stream_to_file<S, E>(path: &PathBuf, stream: S) -> Result<(), ApiError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    async {
        let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(path).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;
        file.flush().await?;

        Ok::<_, io::Error>(())
    }
    .await
    .map_err(|err| ApiError::bad_request(format!("Upload failed: {}", err)))
}

async fn discard_upload(path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove upload {:?}: {}", path, e);
        }
    }
}

async fn job_status(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job = ctx.jobs.status(parse_job_id(&id)?)?;
    Ok(Json(json!({ "success": true, "job": job })))
}

async fn cancel_job(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.jobs.cancel(parse_job_id(&id)?)?;
    Ok(Json(json!({
        "success": true,
        "message": "Job cancelled successfully",
    })))
}

async fn download(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_job_id(&id)?;
    let job = ctx.jobs.status(id)?;
    let result = match (&job.status, &job.result_metadata) {
        (JobStatus::Completed, Some(result)) => result,
        _ => return Err(ApiError::not_found("Job not found or not completed")),
    };

    let file = File::open(&job.output_path)
        .await
        .map_err(|_| ApiError::not_found("Output file not found"))?;
    let length = file.metadata().await.map(|m| m.len()).ok();

    // Stored outputs carry the job id prefix; clients get the plain name.
    let prefix = format!("{}_", id);
    let download_name = result
        .output_filename
        .strip_prefix(&prefix)
        .unwrap_or(&result.output_filename)
        .replace('"', "");

    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", download_name),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response();

    if let Some(length) = length {
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, length.into());
    }
    Ok(response)
}

async fn list_jobs(State(ctx): State<AppContext>) -> impl IntoResponse {
    let jobs = ctx.jobs.list_jobs();
    Json(json!({ "success": true, "jobs": jobs }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_apply_option_fields() {
        let mut options = CompressionOptions::default();
        apply_option(&mut options, "codec", "libx264").unwrap();
        apply_option(&mut options, "crf", "23").unwrap();
        apply_option(&mut options, "max_width", "1280").unwrap();
        apply_option(&mut options, "unknown", "x").unwrap();
        assert_eq!(options.codec, "libx264");
        assert_eq!(options.crf, 23);
        assert_eq!(options.max_width, Some(1280));

        apply_option(&mut options, "max_width", "wide").unwrap();
        assert_eq!(options.max_width, None);

        // Empty values keep the default.
        apply_option(&mut options, "preset", "").unwrap();
        assert_eq!(options.preset, "medium");
    }

    #[test]
    fn test_apply_option_rejects_bad_numbers() {
        let mut options = CompressionOptions::default();
        let err = apply_option(&mut options, "crf", "high").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(options.crf, 28);
    }

    #[test]
    fn test_parse_job_id() {
        let id = JobId::new();
        assert_eq!(parse_job_id(&id.to_string()).unwrap(), id);
        assert_eq!(
            parse_job_id("nope").unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_stream_to_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("upload.mp4");

        let chunks = vec![
            Ok::<Bytes, io::Error>(Bytes::from("Hello, ")),
            Ok(Bytes::from("world!")),
        ];
        stream_to_file(&file_path, stream::iter(chunks)).await.unwrap();

        assert_eq!(std::fs::read_to_string(file_path).unwrap(), "Hello, world!");
    }

    #[tokio::test]
    async fn test_stream_to_file_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("upload.mp4");

        let chunks = stream::iter(vec![Err::<Bytes, _>("Test error")]);
        let result = stream_to_file(&file_path, chunks).await;
        assert_eq!(result.unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}
