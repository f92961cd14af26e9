use super::*;
use distio_wire::{WireErrorPayload, WireResponse};
use tokio::net::TcpListener;

async fn fake_proxy_echo() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = tokio::io::split(stream);

        let _init: RemoteEnvelope = distio_wire::read_frame(&mut reader).await.unwrap();
        distio_wire::write_frame(&mut writer, &RemoteEnvelope::Ready { worker_id: WorkerId(9) })
            .await
            .unwrap();

        loop {
            let envelope: Result<RemoteEnvelope, _> = distio_wire::read_frame(&mut reader).await;
            let Ok(RemoteEnvelope::Message { frame, .. }) = envelope else { return };
            let request: WireRequest = serde_json::from_value(frame).unwrap();
            let response = WireResponse::ok(
                1,
                request.echo_without_secrets(),
                request.data.clone(),
                request.secret_id.clone(),
                request.secret_number,
            );
            let reply = RemoteEnvelope::Message {
                worker_id: WorkerId(9),
                frame: serde_json::to_value(&response).unwrap(),
            };
            if distio_wire::write_frame(&mut writer, &reply).await.is_err() {
                return;
            }
        }
    });
    (addr, task)
}

async fn fake_proxy_rejecting() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = tokio::io::split(stream);
        let _init: RemoteEnvelope = distio_wire::read_frame(&mut reader).await.unwrap();
        let rejection = RemoteEnvelope::Error(distio_wire::RemoteSlaveError {
            worker_id: None,
            error: WireErrorPayload::new("Unauthorized", "bad credentials"),
        });
        distio_wire::write_frame(&mut writer, &rejection).await.unwrap();
    });
    (addr, task)
}

#[tokio::test]
async fn connect_and_exec_round_trips_through_fake_proxy() {
    let (addr, _server) = fake_proxy_echo().await;
    let dispatcher = Dispatcher::new(None, false);
    let registry = Arc::new(Registry::new());
    let config = RemoteWorkerConfig {
        proxy_addr: addr.to_string(),
        script: "echo.sh".to_string(),
        alias: "remote-1".to_string(),
        ..Default::default()
    };

    let handle = RemoteWorkerHandle::connect(WorkerId(1), config, dispatcher, &registry).await.unwrap();
    let response = handle
        .exec(Command::user("echo"), serde_json::json!("hi"), RequestMeta::default())
        .await
        .unwrap();
    assert_eq!(response.data, serde_json::json!("hi"));
}

#[tokio::test]
async fn connect_rejects_with_unauthorized() {
    let (addr, _server) = fake_proxy_rejecting().await;
    let dispatcher = Dispatcher::new(None, false);
    let registry = Arc::new(Registry::new());
    let config = RemoteWorkerConfig {
        proxy_addr: addr.to_string(),
        script: "echo.sh".to_string(),
        alias: "remote-2".to_string(),
        ..Default::default()
    };

    let err = RemoteWorkerHandle::connect(WorkerId(1), config, dispatcher, &registry).await.unwrap_err();
    assert_eq!(err, DioError::Unauthorized);
}
