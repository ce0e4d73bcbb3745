//! Drives this crate against the Autobahn WebSocket testsuite's
//! fuzzingserver (spec §8), case by case, echoing every incoming message
//! straight back so the suite's own comparisons do the verifying. Point it
//! at a running `wstest -m fuzzingserver` with `AUTOBAHN_HOST`/`AUTOBAHN_PORT`
//! (defaults: 127.0.0.1:9001).

use std::cell::Cell;
use std::rc::Rc;

use wsclient::{ClientConfig, ClientHandle, Event};

const AGENT: &str = "wsclient";

fn main() {
    tokio_uring::start(async {
        env_logger::init();

        let host = std::env::var("AUTOBAHN_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("AUTOBAHN_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(9001);

        let case_count = match get_case_count(&host, port).await {
            Ok(n) => n,
            Err(e) => {
                eprintln!("could not fetch case count: {e}");
                return;
            }
        };
        println!("running {case_count} cases against {host}:{port}");

        for case in 1..=case_count {
            if let Err(e) = run_case(&host, port, case).await {
                eprintln!("case {case}: {e}");
            }
        }

        if let Err(e) = update_reports(&host, port).await {
            eprintln!("updateReports failed: {e}");
        }

        println!("=== done ===");
    });
}

/// Yield once and let the executor make progress elsewhere. The background
/// receive loop runs as a spawned task on the same thread, so waiting for a
/// client's result just means giving that task turns, not racing it.
async fn yield_now() {
    struct YieldNow(bool);
    impl std::future::Future for YieldNow {
        type Output = ();
        fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<()> {
            if self.0 {
                std::task::Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                std::task::Poll::Pending
            }
        }
    }
    YieldNow(false).await
}

async fn wait_for_close(client: &ClientHandle) {
    while client.result().is_none() {
        yield_now().await;
    }
}

async fn get_case_count(host: &str, port: u16) -> Result<u32, Box<dyn std::error::Error>> {
    let count: Rc<Cell<Option<u32>>> = Rc::new(Cell::new(None));
    let count_slot = Rc::clone(&count);

    let config = ClientConfig::new(host, port, "/getCaseCount");
    let client = wsclient::open(config, move |event, _conn| {
        if let Event::Text(text) = event {
            if let Ok(n) = text.parse::<u32>() {
                count_slot.set(Some(n));
            }
        }
    })
    .await?;

    wait_for_close(&client).await;
    count.get().ok_or_else(|| "server closed without reporting a case count".into())
}

async fn run_case(host: &str, port: u16, case: u32) -> Result<(), Box<dyn std::error::Error>> {
    let path = format!("/runCase?case={case}&agent={AGENT}");
    let config = ClientConfig::new(host, port, path);

    let client = wsclient::open(config, |event, conn| match event {
        Event::Text(text) => {
            tokio_uring::spawn(async move {
                if let Err(e) = conn.send_text(&text).await {
                    eprintln!("echo (text) failed: {e}");
                }
            });
        }
        Event::Binary(data) => {
            tokio_uring::spawn(async move {
                if let Err(e) = conn.send_binary(data).await {
                    eprintln!("echo (binary) failed: {e}");
                }
            });
        }
        _ => {}
    })
    .await?;

    wait_for_close(&client).await;
    Ok(())
}

async fn update_reports(host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let path = format!("/updateReports?agent={AGENT}");
    let config = ClientConfig::new(host, port, path);
    let client = wsclient::open(config, |_event, _conn| {}).await?;
    wait_for_close(&client).await;
    Ok(())
}
