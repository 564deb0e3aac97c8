//! End-to-end login against a dev mode cluster.

mod common;

use reqwest::{StatusCode, header};

use common::{client, dev_cluster, get_free_port, spawn_broker_with_config, wait_for_listening};

#[tokio::test]
async fn dev_login_renders_kubeconfig() {
    let port = get_free_port();
    let config = format!(
        "listen = \"127.0.0.1:{port}\"\nstate_secret = \"integration-secret\"\n{}",
        dev_cluster("sandbox", port)
    );
    let _guard = spawn_broker_with_config(port, &config);
    wait_for_listening(port, 10).await;
    let client = client();

    let login = client
        .get(format!("http://127.0.0.1:{port}/login/sandbox"))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::SEE_OTHER);
    let location = login.headers()[header::LOCATION].to_str().unwrap().to_owned();
    assert!(
        location.starts_with("/callback/sandbox?code=mock-dev-code&state="),
        "unexpected redirect target: {location}"
    );

    let callback = client
        .get(format!("http://127.0.0.1:{port}{location}"))
        .send()
        .await
        .unwrap();
    assert_eq!(callback.status(), StatusCode::OK);
    assert_eq!(
        callback.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(callback.headers()["x-content-type-options"], "nosniff");
    let body = callback.text().await.unwrap();
    assert!(body.contains("dev-user-sandbox"), "context missing: {body}");
    assert!(
        body.contains("https://sandbox.k8s.example.com:6443"),
        "server missing"
    );
    assert!(body.contains("sandbox-ca-pem"), "CA missing");
}

#[tokio::test]
async fn forged_state_is_rejected() {
    let port = get_free_port();
    let config = format!(
        "listen = \"127.0.0.1:{port}\"\n{}",
        dev_cluster("sandbox", port)
    );
    let _guard = spawn_broker_with_config(port, &config);
    wait_for_listening(port, 10).await;

    let resp = client()
        .get(format!(
            "http://127.0.0.1:{port}/callback/sandbox?code=mock-dev-code&state=Zm9yZ2Vk"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
}
