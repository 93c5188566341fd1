// src/handlers.rs
use crate::services::image_processor::download_filename;
use crate::services::Orchestrator;
use crate::services::orchestrator::FALLBACK_ERROR_MESSAGE;
use crate::{AppState, errors::ThumbError, models::*};
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{Error, HttpResponse, ResponseError, web};
use futures_util::TryStreamExt;
use log::{error, info};
use uuid::Uuid;

pub async fn create_session(data: web::Data<AppState>) -> HttpResponse {
    let session = data.sessions.create().await;
    info!("Created session {}", session.id);
    HttpResponse::Created().json(&session)
}

pub async fn list_sessions(data: web::Data<AppState>) -> HttpResponse {
    let sessions = data.sessions.list().await;
    HttpResponse::Ok().json(serde_json::json!({
        "sessions": sessions,
        "count": sessions.len()
    }))
}

pub async fn get_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ThumbError> {
    let session = data.sessions.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn update_config(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<ConfigEvent>,
) -> Result<HttpResponse, ThumbError> {
    // Inline images go through the same checks as multipart uploads.
    let event = match body.into_inner() {
        ConfigEvent::SetImage { slot, image } => {
            let bytes = image.decode()?;
            let image = data.image_processor.prepare_upload(&bytes, &image.mime_type)?;
            ConfigEvent::SetImage { slot, image }
        }
        event => event,
    };
    let config = data
        .sessions
        .update_config(&path.into_inner(), event)
        .await?;
    Ok(HttpResponse::Ok().json(&config))
}

pub async fn upload_image(
    path: web::Path<(Uuid, ImageSlot)>,
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (session_id, slot) = path.into_inner();
    data.sessions.get(&session_id).await?;

    // Only the first file field counts; the form has one input per slot.
    let mut field = payload
        .try_next()
        .await?
        .ok_or_else(|| ThumbError::Validation("No file provided".to_string()))?;

    let content_type = field
        .content_type()
        .map(|ct| ct.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut image_data = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        data.image_processor.check_upload_size(image_data.len() + chunk.len())?;
        image_data.extend_from_slice(&chunk);
    }

    let image = data.image_processor.prepare_upload(&image_data, &content_type)?;
    let config = data
        .sessions
        .update_config(&session_id, ConfigEvent::SetImage { slot, image })
        .await?;

    info!("Stored {:?} image for session {}", slot, session_id);
    Ok(HttpResponse::Ok().json(&config))
}

pub async fn clear_image(
    path: web::Path<(Uuid, ImageSlot)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ThumbError> {
    let (session_id, slot) = path.into_inner();
    let config = data
        .sessions
        .update_config(&session_id, ConfigEvent::ClearImage { slot })
        .await?;
    Ok(HttpResponse::Ok().json(&config))
}

/// Runs one attempt to completion. The body is always the session's
/// generation state; the status code tells success from failure.
///
/// The attempt runs as its own task so a client that disconnects mid-call
/// does not cancel it half way.
pub async fn generate(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ThumbError> {
    let session_id = path.into_inner();
    let orchestrator = Orchestrator::new(data.sessions.clone(), data.model.clone());

    let outcome = actix_web::rt::spawn(async move { orchestrator.run(&session_id).await })
        .await
        .map_err(|e| {
            error!("Generation task for session {} failed: {}", session_id, e);
            ThumbError::Remote(FALLBACK_ERROR_MESSAGE.to_string())
        })?;

    match outcome {
        Ok(state) => Ok(HttpResponse::Ok().json(&state)),
        Err(err @ (ThumbError::Busy | ThumbError::NotFound(_))) => Err(err),
        Err(err) => {
            let state = data.sessions.get(&session_id).await?.state;
            Ok(HttpResponse::build(err.status_code()).json(&state))
        }
    }
}

pub async fn download(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ThumbError> {
    let session = data.sessions.get(&path.into_inner()).await?;
    let image = session
        .state
        .result_image
        .as_ref()
        .ok_or_else(|| ThumbError::NotFound("no generated image yet".to_string()))?;

    let format = session.config.export_format;
    let bytes = data.image_processor.export(image, format)?;
    let filename = download_filename(
        session.config.platform,
        format,
        chrono::Utc::now().timestamp_millis(),
    );

    Ok(HttpResponse::Ok()
        .content_type(format.mime_type())
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(bytes))
}

pub async fn options() -> HttpResponse {
    let platforms: Vec<_> = Platform::ALL
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p,
                "name": p.display_name(),
                "ratio": p.aspect_ratio(),
            })
        })
        .collect();

    HttpResponse::Ok().json(serde_json::json!({
        "platforms": platforms,
        "styles": StylePreset::ALL,
        "facePositions": FacePosition::ALL,
        "textSizes": TextSize::ALL,
        "fontFamilies": FontFamily::ALL,
        "colorMoods": ColorMood::ALL,
        "glowIntensities": GlowIntensity::ALL,
        "backgroundStyles": BackgroundStyle::ALL,
        "exportFormats": [ExportFormat::Png, ExportFormat::Jpg],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes;
    use crate::services::orchestrator::tests::{ScriptedModel, sample_advice};
    use crate::services::orchestrator::{MISSING_TITLE_MESSAGE, MISSING_SUBJECT_MESSAGE};
    use crate::services::{CreativeModel, ImageProcessor, SessionStore};
    use actix_web::{App, http::StatusCode, test};
    use image::{DynamicImage, ImageFormat as ImgFormat, Rgba, RgbaImage};
    use std::sync::Arc;

    fn state_with(model: Arc<dyn CreativeModel>) -> AppState {
        AppState {
            sessions: Arc::new(SessionStore::new()),
            model,
            image_processor: Arc::new(ImageProcessor::new(2048)),
        }
    }

    fn transparent_png() -> ImageData {
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), ImgFormat::Png)
            .unwrap();
        ImageData::from_bytes(&out, "image/png")
    }

    fn multipart_upload(id: Uuid, slot: &str, bytes: &[u8]) -> test::TestRequest {
        let mut body = Vec::new();
        body.extend_from_slice(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"face.png\"\r\nContent-Type: image/png\r\n\r\n",
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n--XYZ--\r\n");

        test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/images/{}", id, slot))
            .insert_header((
                actix_web::http::header::CONTENT_TYPE,
                "multipart/form-data; boundary=XYZ",
            ))
            .set_payload(body)
    }

    fn patch(id: Uuid, event: serde_json::Value) -> test::TestRequest {
        test::TestRequest::patch()
            .uri(&format!("/api/v1/sessions/{}/config", id))
            .set_json(event)
    }

    #[actix_web::test]
    async fn generate_without_title_reports_precondition() {
        let model = Arc::new(ScriptedModel::succeeding());
        let state = state_with(model.clone());
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let session: Session = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/generate", session.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: GenerationState = test::read_body_json(resp).await;
        assert_eq!(body.error.as_deref(), Some(MISSING_TITLE_MESSAGE));

        let req = patch(session.id, serde_json::json!({"type": "setTitle", "value": "Cave week"}));
        assert_eq!(test::call_service(&app, req.to_request()).await.status(), StatusCode::OK);
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/generate", session.id))
            .to_request();
        let body: GenerationState = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body.error.as_deref(), Some(MISSING_SUBJECT_MESSAGE));
        assert_eq!(model.calls(), (0, 0));
    }

    #[actix_web::test]
    async fn full_flow_generates_and_downloads_jpeg() {
        let model = Arc::new(ScriptedModel::new(Ok(sample_advice()), Ok(transparent_png())));
        let state = state_with(model.clone());
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let session: Session = test::call_and_read_body_json(&app, req).await;
        let id = session.id;

        for event in [
            serde_json::json!({"type": "setTitle", "value": "I lived in a cave"}),
            serde_json::json!({"type": "setImage", "value": {"slot": "face", "image": transparent_png().to_data_url()}}),
            serde_json::json!({"type": "setPlatform", "value": "Shorts/Reels"}),
            serde_json::json!({"type": "setExportFormat", "value": "jpg"}),
        ] {
            let resp = test::call_service(&app, patch(id, event).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}", id))
            .to_request();
        let session: Session = test::call_and_read_body_json(&app, req).await;
        assert_eq!(session.config.aspect_ratio, AspectRatio::Vertical);
        assert_eq!(session.config.text_size, TextSize::Large);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/generate", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let state: GenerationState = test::read_body_json(resp).await;
        assert!(state.result_image.is_some());
        assert!(state.error.is_none());
        assert_eq!(model.calls(), (1, 1));

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}/download", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "image/jpeg");
        let disposition = resp
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("thumbnail-shorts-reels-"));
        assert!(disposition.contains(".jpg"));

        let bytes = test::read_body(resp).await;
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert!(decoded.get_pixel(0, 0).0.iter().all(|&c| c > 240));
    }

    #[actix_web::test]
    async fn remote_failure_is_service_unavailable_with_state() {
        let model = Arc::new(ScriptedModel::new(
            Ok(sample_advice()),
            Err(ThumbError::Remote("No image was generated by the model.".into())),
        ));
        let state = state_with(model);
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let session: Session = test::call_and_read_body_json(&app, req).await;
        for event in [
            serde_json::json!({"type": "setTitle", "value": "t"}),
            serde_json::json!({"type": "setImage", "value": {"slot": "face", "image": transparent_png().to_data_url()}}),
        ] {
            test::call_service(&app, patch(session.id, event).to_request()).await;
        }

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/generate", session.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let state: GenerationState = test::read_body_json(resp).await;
        assert_eq!(state.error.as_deref(), Some("No image was generated by the model."));
        assert!(state.result_image.is_none());

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}/download", session.id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn unknown_session_is_not_found() {
        let state = state_with(Arc::new(ScriptedModel::succeeding()));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}", Uuid::new_v4()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn options_lists_platform_ratios() {
        let state = state_with(Arc::new(ScriptedModel::succeeding()));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::get().uri("/api/v1/options").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["platforms"][1]["id"], "Shorts/Reels");
        assert_eq!(body["platforms"][1]["ratio"], "9:16");
        assert_eq!(body["backgroundStyles"].as_array().unwrap().len(), 9);
    }

    #[actix_web::test]
    async fn inline_image_that_is_not_an_image_is_rejected() {
        let state = state_with(Arc::new(ScriptedModel::succeeding()));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let session: Session = test::call_and_read_body_json(&app, req).await;

        // "hello" labelled as PNG
        let event = serde_json::json!({
            "type": "setImage",
            "value": {"slot": "face", "image": "data:image/png;base64,aGVsbG8="}
        });
        let resp = test::call_service(&app, patch(session.id, event).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}", session.id))
            .to_request();
        let session: Session = test::call_and_read_body_json(&app, req).await;
        assert!(session.config.face_image.is_none());
    }

    #[actix_web::test]
    async fn multipart_upload_respects_byte_limit() {
        let png = transparent_png().decode().unwrap();
        let state = AppState {
            image_processor: Arc::new(ImageProcessor::new(2048).with_max_upload_bytes(png.len() - 1)),
            ..state_with(Arc::new(ScriptedModel::succeeding()))
        };
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let session: Session = test::call_and_read_body_json(&app, req).await;

        let resp = test::call_service(&app, multipart_upload(session.id, "face", &png).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}", session.id))
            .to_request();
        let session: Session = test::call_and_read_body_json(&app, req).await;
        assert!(session.config.face_image.is_none());
    }

    #[actix_web::test]
    async fn multipart_upload_stores_image() {
        let state = state_with(Arc::new(ScriptedModel::succeeding()));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let session: Session = test::call_and_read_body_json(&app, req).await;

        let png = transparent_png().decode().unwrap();
        let req = multipart_upload(session.id, "face", &png).to_request();
        let config: GenerationConfig = test::call_and_read_body_json(&app, req).await;
        assert_eq!(config.face_image.map(|i| i.mime_type).as_deref(), Some("image/png"));
    }
}
