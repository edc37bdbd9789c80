//! HTTP host scorer.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use tracing::debug;

use fleetplace_core::{Resource, Score, ServerAddress};
use fleetplace_placement::{HostCallError, HostScorer};

use crate::wire::{PLACE_PATH, PlaceRequest, decode_reply};

/// Scores a resource by POSTing it to `http://{address}/v1/place`.
#[derive(Debug, Clone)]
pub struct HttpHostScorer {
    request_timeout: Duration,
}

impl HttpHostScorer {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    async fn call(&self, address: &ServerAddress, body: Bytes) -> Result<Score, HostCallError> {
        let authority = address.to_string();
        let uri = format!("http://{authority}{PLACE_PATH}");

        let stream = tokio::net::TcpStream::connect((address.host.as_str(), address.port))
            .await
            .map_err(|e| HostCallError::Unreachable(format!("{authority}: {e}")))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| HostCallError::Unreachable(format!("{authority}: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("POST")
            .uri(&uri)
            .header("host", authority.as_str())
            .header("content-type", "application/json")
            .header("user-agent", "fleetplace-hostclient/0.1")
            .body(Full::new(body))
            .map_err(|e| HostCallError::Protocol(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| HostCallError::Unreachable(format!("{authority}: {e}")))?;
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| HostCallError::Protocol(e.to_string()))?
            .to_bytes();

        debug!(%uri, %status, len = bytes.len(), "host replied");
        decode_reply(status, &bytes)
    }
}

#[async_trait]
impl HostScorer for HttpHostScorer {
    async fn score(
        &self,
        address: &ServerAddress,
        resource: &Resource,
    ) -> Result<Score, HostCallError> {
        let body = serde_json::to_vec(&PlaceRequest {
            resource: resource.clone(),
        })
        .map_err(|e| HostCallError::Protocol(e.to_string()))?;

        match tokio::time::timeout(self.request_timeout, self.call(address, Bytes::from(body))).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%address, "host call timed out");
                Err(HostCallError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, routing::post};
    use fleetplace_core::ResultCode;

    use super::*;
    use crate::wire::PlaceResponse;

    async fn serve(router: Router) -> ServerAddress {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        ServerAddress::new("127.0.0.1", port)
    }

    #[tokio::test]
    async fn scores_against_live_agent() {
        let router = Router::new().route(
            PLACE_PATH,
            post(|Json(req): Json<PlaceRequest>| async move {
                let utilization = if req.resource.vm.is_some() { 10 } else { 1 };
                Json(PlaceResponse::ok(Score::new(utilization, 9)))
            }),
        );
        let address = serve(router).await;

        let scorer = HttpHostScorer::new(Duration::from_secs(2));
        let resource = Resource::vm(Default::default());
        let score = scorer.score(&address, &resource).await.unwrap();
        assert_eq!(score, Score::new(10, 9));
    }

    #[tokio::test]
    async fn agent_rejection_is_reported() {
        let router = Router::new().route(
            PLACE_PATH,
            post(|| async {
                Json(PlaceResponse::rejected(
                    ResultCode::NotEnoughCpuResource,
                    "no cpu",
                ))
            }),
        );
        let address = serve(router).await;

        let err = HttpHostScorer::new(Duration::from_secs(2))
            .score(&address, &Resource::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HostCallError::Rejected { code: ResultCode::NotEnoughCpuResource, .. }
        ));
    }

    #[tokio::test]
    async fn slow_agent_times_out() {
        let router = Router::new().route(
            PLACE_PATH,
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Json(PlaceResponse::ok(Score::default()))
            }),
        );
        let address = serve(router).await;

        let err = HttpHostScorer::new(Duration::from_millis(100))
            .score(&address, &Resource::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HostCallError::Timeout));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = HttpHostScorer::new(Duration::from_secs(2))
            .score(&ServerAddress::new("127.0.0.1", port), &Resource::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HostCallError::Unreachable(_)));
    }
}
