use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use eframe::egui;
use tracing::{debug, error, trace};

use turtledown_core::{FetchError, FetchRequest, TileSpec};
use turtledown_render::SpriteSheet;

const USER_AGENT: &str = concat!("Turtledown/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Finished fetch sent from a worker back to the UI thread, already decoded.
pub(crate) enum FetchResponse {
    Image {
        path: Arc<str>,
        result: Result<SpriteSheet, FetchError>,
    },
    Spec {
        id: Arc<str>,
        result: Result<TileSpec, FetchError>,
    },
}

/// Spawn `count` fetch worker threads sharing one request queue.
///
/// Returns the send-side for requests and the receive-side for responses.
/// Every response wakes the UI through `ctx`. The threads run until the
/// request sender is dropped.
pub(crate) fn spawn_fetch_workers(
    count: usize,
    ctx: egui::Context,
) -> (mpsc::Sender<FetchRequest>, mpsc::Receiver<FetchResponse>) {
    let (req_tx, req_rx) = mpsc::channel::<FetchRequest>();
    let (resp_tx, resp_rx) = mpsc::channel::<FetchResponse>();
    let req_rx = Arc::new(Mutex::new(req_rx));

    for index in 0..count.max(1) {
        let req_rx = Arc::clone(&req_rx);
        let resp_tx = resp_tx.clone();
        let ctx = ctx.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("fetch-worker-{index}"))
            .spawn(move || run_worker(index, &req_rx, &resp_tx, &ctx));
        if let Err(e) = spawned {
            error!("Failed to spawn fetch worker {index}: {e}");
        }
    }

    (req_tx, resp_rx)
}

fn run_worker(
    index: usize,
    requests: &Mutex<mpsc::Receiver<FetchRequest>>,
    responses: &mpsc::Sender<FetchResponse>,
    ctx: &egui::Context,
) {
    let client = match reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            error!("Fetch worker {index}: failed to build HTTP client: {e}");
            return;
        }
    };
    debug!("Fetch worker {index} started");

    loop {
        let request = match requests.lock() {
            Ok(queue) => queue.recv(),
            Err(_) => break,
        };
        let Ok(request) = request else { break };
        let response = match request {
            FetchRequest::Image { path } => {
                let result = fetch_bytes(&client, &path).and_then(|bytes| {
                    SpriteSheet::decode(&bytes).map_err(|e| FetchError::new(e.to_string()))
                });
                FetchResponse::Image { path, result }
            }
            FetchRequest::Spec { id, url } => {
                let result = fetch_bytes(&client, &url).and_then(|bytes| {
                    TileSpec::from_json(&id, &bytes).map_err(|e| FetchError::new(e.to_string()))
                });
                FetchResponse::Spec { id, result }
            }
        };
        if responses.send(response).is_err() {
            break;
        }
        ctx.request_repaint();
    }
    debug!("Fetch worker {index} exiting");
}

fn fetch_bytes(client: &reqwest::blocking::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    trace!(url, "fetching");
    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| FetchError::new(format!("{url}: {e}")))?;
    let bytes = response
        .bytes()
        .map_err(|e| FetchError::new(format!("{url}: {e}")))?;
    Ok(bytes.to_vec())
}
