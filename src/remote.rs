//! HTTP client for the remote classifier/attack service

use crate::perturb::Epsilon;
use crate::tensor::Tensor;
use crate::{Error, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
struct PredictRequest<'a> {
    x: &'a Tensor,
}

#[derive(Serialize)]
struct AttackRequest<'a> {
    x: &'a Tensor,
    eps: f64,
}

/// Talks to `<base>/predict` and `<base>/attack`
#[derive(Debug, Clone)]
pub struct RemoteClient {
    base_url: String,
    client: Client,
}

impl RemoteClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(RemoteClient {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask for a prediction on a clean image
    pub async fn predict(&self, x: &Tensor) -> Result<Value> {
        self.post("predict", &PredictRequest { x }).await
    }

    /// Ask for an attack with budget `eps`
    pub async fn attack(&self, x: &Tensor, eps: Epsilon) -> Result<Value> {
        let eps = eps.value();
        self.post("attack", &AttackRequest { x, eps }).await
    }

    async fn post<B: Serialize>(&self, route: &str, body: &B) -> Result<Value> {
        let url = format!("{}/{route}", self.base_url);
        debug!("posting to {url}");

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("{url} answered {status}: {message}");
            return Err(Error::Server {
                status: status.as_u16(),
                message,
            });
        }

        // a body that is not JSON is treated as a plain string result
        let text = response.text().await?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::CanonicalImage;
    use crate::config::PIXELS;
    use crate::util::test;
    use actix_web::{web, HttpResponse};
    use serde_json::json;

    fn tensor() -> Tensor {
        Tensor::from(&CanonicalImage::from_gray(&[255; PIXELS]).unwrap())
    }

    fn routes(cfg: &mut web::ServiceConfig) {
        cfg.route(
            "/predict",
            web::post().to(|body: web::Json<Value>| async move {
                let len = body["x"]["data"].as_array().map_or(0, Vec::len);
                HttpResponse::Ok().json(json!({ "len": len, "shape": body["x"]["shape"] }))
            }),
        )
        .route(
            "/attack",
            web::post().to(|body: web::Json<Value>| async move {
                HttpResponse::Ok().json(json!({ "eps": body["eps"] }))
            }),
        );
    }

    #[actix_web::test]
    async fn test_predict_request_shape() {
        let (base, server) = test::serve(routes);
        let client = RemoteClient::new(&format!("{base}/"), Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), base);

        let value = client.predict(&tensor()).await.unwrap();
        assert_eq!(value, json!({ "len": PIXELS, "shape": [1, 1, 28, 28] }));
        server.stop(false).await;
    }

    #[actix_web::test]
    async fn test_attack_forwards_eps() {
        let (base, server) = test::serve(routes);
        let client = RemoteClient::new(&base, Duration::from_secs(5)).unwrap();

        let eps = Epsilon::new(0.15).unwrap();
        let value = client.attack(&tensor(), eps).await.unwrap();
        assert_eq!(value, json!({ "eps": 0.15 }));
        server.stop(false).await;
    }

    #[actix_web::test]
    async fn test_non_success_status() {
        let (base, server) = test::serve(|cfg: &mut web::ServiceConfig| {
            cfg.route(
                "/predict",
                web::post().to(|| async { HttpResponse::ServiceUnavailable().body("model is loading") }),
            );
        });
        let client = RemoteClient::new(&base, Duration::from_secs(5)).unwrap();

        match client.predict(&tensor()).await {
            Err(Error::Server { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "model is loading");
            }
            other => panic!("unexpected {other:?}"),
        }
        server.stop(false).await;
    }

    #[actix_web::test]
    async fn test_plain_text_body() {
        let (base, server) = test::serve(|cfg: &mut web::ServiceConfig| {
            cfg.route("/predict", web::post().to(|| async { "seven" }));
        });
        let client = RemoteClient::new(&base, Duration::from_secs(5)).unwrap();

        let value = client.predict(&tensor()).await.unwrap();
        assert_eq!(value, Value::String("seven".into()));
        server.stop(false).await;
    }

    #[actix_web::test]
    async fn test_unreachable() {
        // nothing listens on port 9 of localhost
        let client = RemoteClient::new("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
        assert!(matches!(client.predict(&tensor()).await, Err(Error::Transport(_))));
    }
}
