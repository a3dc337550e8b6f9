//! Routes over the session orchestrator. Uploads and ε changes answer with a
//! state snapshot; predict and attack answer with the formatted result

use super::protocol;
use super::WebError;
use crate::canonical::B64Image;
use crate::config::MAX_UPLOAD_BYTES;
use crate::session::Orchestrator;
use crate::Error;
use actix_web::http::header::ContentType;
use actix_web::{get, post, put, web, HttpResponse, Responder};
use tracing::debug;

type Result<T> = std::result::Result<T, WebError>;

/// Register every route on an app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
        .app_data(web::JsonConfig::default().limit(MAX_UPLOAD_BYTES))
        .service(upload)
        .service(upload_b64)
        .service(set_epsilon)
        .service(predict)
        .service(attack)
        .service(session_state)
        .service(canonical_png)
        .service(perturbed_png)
        .service(perturbed_data_url);
}

/// Upload raw image bytes. Decoding and resizing run on the blocking pool
#[post("/image")]
pub async fn upload(body: web::Bytes, state: web::Data<Orchestrator>) -> Result<impl Responder> {
    debug!("got {} byte upload", body.len());
    let orchestrator = state.clone();
    web::block(move || orchestrator.upload(&body)).await??;
    Ok(web::Json(state.snapshot()))
}

/// Upload a base 64 image
#[post("/image/b64")]
pub async fn upload_b64(
    req: web::Json<protocol::B64Upload>,
    state: web::Data<Orchestrator>,
) -> Result<impl Responder> {
    let image = B64Image::from(req.into_inner().image);
    let orchestrator = state.clone();
    web::block(move || orchestrator.upload(&image.decode()?)).await??;
    Ok(web::Json(state.snapshot()))
}

#[put("/epsilon")]
pub async fn set_epsilon(
    req: web::Json<protocol::EpsilonRequest>,
    state: web::Data<Orchestrator>,
) -> Result<impl Responder> {
    state.set_epsilon(req.eps)?;
    Ok(web::Json(state.snapshot()))
}

#[post("/predict")]
pub async fn predict(state: web::Data<Orchestrator>) -> Result<impl Responder> {
    let completion = state.predict_clean().await?;
    Ok(web::Json(protocol::RunResponse::from(completion)))
}

/// Attack with the session's ε, or with `eps` from the body when given
#[post("/attack")]
pub async fn attack(
    req: Option<web::Json<protocol::EpsilonRequest>>,
    state: web::Data<Orchestrator>,
) -> Result<impl Responder> {
    let completion = match req {
        Some(req) => state.run_attack_with(req.eps).await?,
        None => state.run_attack().await?,
    };
    Ok(web::Json(protocol::RunResponse::from(completion)))
}

#[get("/state")]
pub async fn session_state(state: web::Data<Orchestrator>) -> impl Responder {
    web::Json(state.snapshot())
}

#[get("/image/canonical.png")]
pub async fn canonical_png(state: web::Data<Orchestrator>) -> Result<HttpResponse> {
    let image = state.canonical_image().ok_or(Error::Missing("canonical"))?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::png())
        .body(image.to_png()?))
}

#[get("/image/perturbed.png")]
pub async fn perturbed_png(state: web::Data<Orchestrator>) -> Result<HttpResponse> {
    let image = state.perturbed_image().ok_or(Error::Missing("perturbed"))?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::png())
        .body(image.to_png()?))
}

#[get("/image/perturbed")]
pub async fn perturbed_data_url(state: web::Data<Orchestrator>) -> Result<impl Responder> {
    let image = state.perturbed_image().ok_or(Error::Missing("perturbed"))?;
    Ok(web::Json(protocol::DataUrlResponse {
        data_url: image.data_url()?,
    }))
}
