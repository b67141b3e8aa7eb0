use axum::routing::get;
use axum::Router;

async fn liveness() -> &'static str {
    "OK"
}

/// Adds `GET /` next to the webhook route so the host can probe the
/// process.
pub fn with_liveness_route(router: Router) -> Router {
    router.route("/", get(liveness))
}

#[cfg(test)]
mod tests {
    use axum::routing::post;

    use super::*;

    #[tokio::test]
    async fn root_answers_ok_and_webhook_route_survives() {
        let webhook = Router::new().route("/telegram/secret", post(|| async { "update" }));
        let app = with_liveness_route(webhook);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let root = client.get(format!("http://{address}/")).send().await.unwrap();
        assert!(root.status().is_success());
        assert_eq!(root.text().await.unwrap(), "OK");

        let hook = client
            .post(format!("http://{address}/telegram/secret"))
            .send()
            .await
            .unwrap();
        assert_eq!(hook.text().await.unwrap(), "update");
    }
}
