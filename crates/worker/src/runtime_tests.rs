// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use distio_core::{Command, Rid, RequestMeta};
use distio_wire::{read_frame, write_frame, WireRequest};
use tokio::io::split;

fn sample_request(rid: u64, command: Command, data: serde_json::Value) -> WireRequest {
    WireRequest::new(
        Rid(rid),
        WorkerId(1),
        command,
        data,
        RequestMeta::default(),
        1,
        2,
        "secret".to_string(),
        99,
    )
}

fn echo_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register("echo", |input: TaskInput| async move { Ok(input.data) }).unwrap();
    registry
        .register("boom", |_input: TaskInput| async move {
            #[allow(clippy::panic)]
            panic!("task exploded")
        })
        .unwrap();
    registry
}

#[tokio::test]
async fn echo_task_returns_input_data() {
    let (client, server) = tokio::io::duplex(8192);
    let (server_read, server_write) = split(server);
    let runtime = Runtime::new(WorkerId(1), echo_registry());

    let driver = tokio::spawn(async move {
        let mut client = client;
        write_frame(&mut client, &sample_request(1, Command::user("echo"), serde_json::json!("hi")))
            .await
            .unwrap();
        let resp: distio_wire::WireResponse = read_frame(&mut client).await.unwrap();
        drop(client);
        resp
    });

    runtime.run(server_read, server_write).await.unwrap();
    let resp = driver.await.unwrap();
    assert_eq!(resp.data, serde_json::json!("hi"));
    assert!(resp.error.is_none());
    assert_eq!(resp.secret_id, "secret");
    assert_eq!(resp.secret_number, 99);
}

#[tokio::test]
async fn unknown_command_yields_reference_error() {
    let (client, server) = tokio::io::duplex(8192);
    let (server_read, server_write) = split(server);
    let runtime = Runtime::new(WorkerId(7), TaskRegistry::new());

    let driver = tokio::spawn(async move {
        let mut client = client;
        write_frame(&mut client, &sample_request(1, Command::user("nope"), serde_json::json!(null)))
            .await
            .unwrap();
        let resp: distio_wire::WireResponse = read_frame(&mut client).await.unwrap();
        drop(client);
        resp
    });

    runtime.run(server_read, server_write).await.unwrap();
    let resp = driver.await.unwrap();
    let error = resp.error.unwrap();
    assert_eq!(error.name, "ReferenceError");
    assert_eq!(error.message, "Slave #7 does not listen to task \"nope\"");
}

#[tokio::test]
async fn exit_acks_then_detaches_and_closes_loop() {
    let (client, server) = tokio::io::duplex(8192);
    let (server_read, server_write) = split(server);
    let runtime = Runtime::new(WorkerId(1), TaskRegistry::new());

    let driver = tokio::spawn(async move {
        let mut client = client;
        write_frame(&mut client, &sample_request(1, Command::Exit, serde_json::Value::Null))
            .await
            .unwrap();
        let resp: distio_wire::WireResponse = read_frame(&mut client).await.unwrap();
        drop(client);
        resp
    });

    runtime.run(server_read, server_write).await.unwrap();
    let resp = driver.await.unwrap();
    assert!(resp.error.is_none());
    assert_eq!(runtime.state(), RuntimeState::Detaching);
}

#[tokio::test]
async fn paused_runtime_rejects_with_not_accepting_messages() {
    let (client, server) = tokio::io::duplex(8192);
    let (server_read, server_write) = split(server);
    let runtime = Runtime::new(WorkerId(1), echo_registry());
    runtime.pause();

    let driver = tokio::spawn(async move {
        let mut client = client;
        write_frame(&mut client, &sample_request(1, Command::user("echo"), serde_json::json!("hi")))
            .await
            .unwrap();
        let resp: distio_wire::WireResponse = read_frame(&mut client).await.unwrap();
        drop(client);
        resp
    });

    // Only one request then disconnect so `run` returns.
    runtime.run(server_read, server_write).await.unwrap();
    let resp = driver.await.unwrap();
    assert_eq!(resp.error.unwrap().message, "NotAcceptingMessages");
}

#[tokio::test]
async fn panicking_task_emits_out_of_band_exception_not_a_response() {
    let (client, server) = tokio::io::duplex(8192);
    let (server_read, server_write) = split(server);
    let runtime = Runtime::new(WorkerId(3), echo_registry());

    let driver = tokio::spawn(async move {
        let mut client = client;
        write_frame(&mut client, &sample_request(1, Command::user("boom"), serde_json::Value::Null))
            .await
            .unwrap();
        let exc: distio_wire::WireException = read_frame(&mut client).await.unwrap();
        drop(client);
        exc
    });

    runtime.run(server_read, server_write).await.unwrap();
    let exc = driver.await.unwrap();
    assert_eq!(exc.from, WorkerId(3));
    assert!(exc.has_worker_magic());
}

#[tokio::test]
async fn pause_then_resume_returns_to_running() {
    let runtime = Runtime::new(WorkerId(1), TaskRegistry::new());
    assert_eq!(runtime.state(), RuntimeState::Running);
    runtime.pause();
    assert_eq!(runtime.state(), RuntimeState::Paused);
    runtime.resume();
    assert_eq!(runtime.state(), RuntimeState::Running);
}
