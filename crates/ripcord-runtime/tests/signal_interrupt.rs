//! Signal-driven shutdown
//!
//! Signals are process-wide, so these tests hold a shared lock and only
//! raise a signal while a server owns the handlers.

#![cfg(unix)]

mod common;

use bytes::Bytes;
use common::{config, eventually, finish, get, spawn, try_get};
use http::{Request, StatusCode};
use ripcord_core::{app_fn, responses, Application};
use ripcord_runtime::{ExitCause, LifecyclePhase, Server, Signal};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::low_level::raise;
use std::time::Duration;
use tokio::sync::Mutex;

static SIGNALS: Mutex<()> = Mutex::const_new(());

fn app() -> impl Application {
    app_fn(|request: Request<Bytes>| async move {
        match request.uri().path() {
            "/slow" => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                responses::ok().text("late")
            }
            "/interrupt" => {
                raise(SIGINT).expect("raise SIGINT");
                tokio::time::sleep(Duration::from_millis(200)).await;
                responses::ok().text("interrupted")
            }
            _ => responses::ok().text("hello"),
        }
    })
}

fn server(builder: ripcord_config::ConfigBuilder) -> Server {
    Server::builder()
        .app(app())
        .config(builder.install_signals(true).build().unwrap())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_interrupt_stops_server() {
    let _lock = SIGNALS.lock().await;
    let (handle, addr, task) = spawn(server(config())).await;

    assert_eq!(get(addr, "/").await.0, StatusCode::OK);
    raise(SIGINT).unwrap();

    let outcome = finish(task).await;
    assert_eq!(outcome.cause, ExitCause::Signal(Signal::Interrupt));
    assert!(outcome.interrupted());
    assert!(outcome.signals_installed);
    assert_eq!(outcome.exit_code(), 130);
    assert!(!outcome.forced);
    assert!(handle.should_exit());
    assert!(handle.started());
    assert_eq!(handle.phase(), LifecyclePhase::Stopped);
}

#[tokio::test]
async fn test_terminate_maps_to_its_own_exit_code() {
    let _lock = SIGNALS.lock().await;
    let (_handle, _addr, task) = spawn(server(config())).await;

    raise(SIGTERM).unwrap();

    let outcome = finish(task).await;
    assert_eq!(outcome.cause, ExitCause::Signal(Signal::Terminate));
    assert_eq!(outcome.exit_code(), 143);
}

#[tokio::test]
async fn test_second_interrupt_forces_exit() {
    let _lock = SIGNALS.lock().await;
    let (handle, addr, task) = spawn(server(config().graceful_shutdown(None::<Duration>))).await;

    let client = tokio::spawn(async move { try_get(addr, "/slow").await });
    eventually(|| handle.total_requests() == 1).await;

    raise(SIGINT).unwrap();
    eventually(|| handle.phase() == LifecyclePhase::ShuttingDown).await;
    assert!(!handle.force_exit());

    raise(SIGINT).unwrap();
    let outcome = finish(task).await;

    assert!(outcome.forced);
    assert_eq!(outcome.abandoned, 1);
    assert_eq!(outcome.cause, ExitCause::Signal(Signal::Interrupt));
    assert!(client.await.unwrap().is_err());
}

#[tokio::test]
async fn test_interrupt_during_limit_request_stops_once() {
    let _lock = SIGNALS.lock().await;
    let (handle, addr, task) = spawn(server(config().max_requests(Some(1)))).await;

    // the limit request completes even though a signal arrives mid-flight
    assert_eq!(
        get(addr, "/interrupt").await,
        (StatusCode::OK, "interrupted".to_string())
    );
    let outcome = finish(task).await;

    // the limit was reached when the request was admitted, before the signal
    assert_eq!(outcome.cause, ExitCause::RequestLimit);
    assert!(!outcome.forced);
    assert_eq!(outcome.abandoned, 0);
    assert!(!handle.force_exit());
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.requests, 1);
    assert_eq!(handle.phase(), LifecyclePhase::Stopped);
    assert_eq!(handle.total_requests(), 1);
}

#[tokio::test]
async fn test_sequential_servers_reacquire_handlers() {
    let _lock = SIGNALS.lock().await;

    for _ in 0..2 {
        let (_handle, _addr, task) = spawn(server(config())).await;
        raise(SIGINT).unwrap();
        let outcome = finish(task).await;
        assert_eq!(outcome.cause, ExitCause::Signal(Signal::Interrupt));
    }
}
