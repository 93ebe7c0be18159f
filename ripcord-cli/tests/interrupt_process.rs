//! Process-level exit status tests

#![cfg(unix)]

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const READY: &str = "Press CTRL+C to quit";

/// Spawn a binary and block until it prints the readiness line
fn spawn_ready(bin: &str, args: &[&str]) -> Child {
    let mut child = Command::new(bin)
        .args(args)
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn server binary");

    let stdout = child.stdout.take().expect("piped stdout");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if line.contains(READY) {
                let _ = tx.send(());
            }
        }
    });

    if rx.recv_timeout(Duration::from_secs(30)).is_err() {
        let _ = child.kill();
        panic!("server never printed the readiness line");
    }
    child
}

fn wait_bounded(child: &mut Child, limit: Duration) -> ExitStatus {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().expect("poll child") {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("server did not exit within {:?}", limit);
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn interrupt(child: &Child, signal: Signal) {
    kill(Pid::from_raw(child.id() as i32), signal).expect("deliver signal");
}

#[test]
fn test_embedded_interrupt_exits_non_zero() {
    let mut child = spawn_ready(env!("CARGO_BIN_EXE_ripcord-embedded"), &[]);

    interrupt(&child, Signal::SIGINT);
    let status = wait_bounded(&mut child, Duration::from_secs(10));

    assert!(!status.success());
    assert_eq!(status.code(), Some(130));
}

#[test]
fn test_cli_terminate_exits_non_zero() {
    let mut child = spawn_ready(
        env!("CARGO_BIN_EXE_ripcord"),
        &["serve", "--listen", "127.0.0.1:0", "--loop", "current-thread"],
    );

    interrupt(&child, Signal::SIGTERM);
    let status = wait_bounded(&mut child, Duration::from_secs(10));

    assert_eq!(status.code(), Some(143));
}

#[test]
fn test_cli_zero_request_limit_exits_cleanly() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ripcord"))
        .args(["serve", "--listen", "127.0.0.1:0", "--limit-max-requests", "0"])
        .stdout(Stdio::null())
        .spawn()
        .expect("spawn server binary");

    let status = wait_bounded(&mut child, Duration::from_secs(10));
    assert!(status.success());
}

#[test]
fn test_cli_validate_rejects_bad_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ripcord.yaml");
    std::fs::write(&path, "timeouts:\n  tick_interval: 0s\n").unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_ripcord"))
        .args(["validate", "--config"])
        .arg(&path)
        .stdout(Stdio::null())
        .status()
        .expect("run validate");
    assert!(!status.success());
}
