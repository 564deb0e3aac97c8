//! Landing page.

use axum::{
    extract::State,
    response::{IntoResponse as _, Redirect, Response},
};

use crate::app::AppState;

/// Redirects to the login of the only cluster, or lists all clusters.
#[axum::debug_handler]
#[tracing::instrument(skip_all)]
pub(crate) async fn handle_index(State(state): State<AppState>) -> Response {
    let config = &state.config;
    if let [ref only] = *config.clusters.as_slice() {
        return Redirect::to(&config.login_path(only)).into_response();
    }
    state
        .renderer
        .render_index(config)
        .unwrap_or_else(|e| state.renderer.error_response(&e, config, None))
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{self, Body},
        http::{Request, StatusCode, header},
        routing::get,
    };
    use tower::ServiceExt as _;

    use super::*;
    use crate::app::state_from_toml;

    fn cluster(name: &str) -> String {
        format!(
            r#"
            [[clusters]]
            name = "{name}"
            issuer = "https://dex.example.com"
            client_id = "{name}-client"
            redirect_uri = "http://127.0.0.1:5555/callback/{name}"
            k8s_master_uri = "https://{name}.example.com:6443"
            "#
        )
    }

    async fn index(toml_str: &str) -> Response {
        Router::new()
            .route("/", get(handle_index))
            .with_state(state_from_toml(toml_str))
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn single_cluster_redirects_to_login() {
        let response = index(&cluster("test-cluster")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login/test-cluster"
        );
    }

    #[tokio::test]
    async fn multiple_clusters_render_index() {
        let response = index(&format!("{}{}", cluster("cluster1"), cluster("cluster2"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            !response.headers().contains_key(header::LOCATION),
            "index must not redirect"
        );
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("cluster1"), "cluster1 missing");
        assert!(body.contains("cluster2"), "cluster2 missing");
    }

    #[tokio::test]
    async fn redirect_honors_prefix() {
        let response = index(&format!(
            "web_path_prefix = \"/kube/\"\n{}",
            cluster("test-cluster")
        ))
        .await;
        assert_eq!(
            response.headers()[header::LOCATION],
            "/kube/login/test-cluster"
        );
    }
}
