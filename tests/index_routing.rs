//! Landing page and routing of a running broker.

mod common;

use reqwest::{StatusCode, header};

use common::{client, dev_cluster, get_free_port, spawn_broker_with_config, wait_for_listening};

#[tokio::test]
async fn multiple_clusters_are_listed() {
    let port = get_free_port();
    let config = format!(
        "listen = \"127.0.0.1:{port}\"\n{}{}",
        dev_cluster("alpha", port),
        dev_cluster("beta", port)
    );
    let _guard = spawn_broker_with_config(port, &config);
    wait_for_listening(port, 10).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("/login/alpha"), "alpha link missing");
    assert!(body.contains("/login/beta"), "beta link missing");
}

#[tokio::test]
async fn single_cluster_redirects_under_prefix() {
    let port = get_free_port();
    let config = format!(
        "listen = \"127.0.0.1:{port}\"\nweb_path_prefix = \"/kube\"\n{}",
        dev_cluster("alpha", port)
    );
    let _guard = spawn_broker_with_config(port, &config);
    wait_for_listening(port, 10).await;
    let client = client();

    let resp = client
        .get(format!("http://127.0.0.1:{port}/kube/"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()[header::LOCATION], "/kube/login/alpha");

    let health = client
        .get(format!("http://127.0.0.1:{port}/kube/healthz"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let unknown = client
        .get(format!("http://127.0.0.1:{port}/kube/login/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}
