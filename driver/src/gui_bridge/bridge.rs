use crate::gui_bridge::model::VisualizationModel;
use anyhow::{Context, Result};
use fmcwcore::config::RadarParameters;
use fmcwcore::pipeline::{PipelineContext, StopSignal, WorkerHandle};
use fmcwcore::processing::CfarParams;
use log::{debug, error, info};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, PoisonError, RwLock},
    thread,
    time::Duration,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

pub type SharedModel = Arc<RwLock<VisualizationModel>>;

/// Consumes the three result queues and keeps the display model current.
pub struct DisplayPump {
    worker: WorkerHandle,
}

impl DisplayPump {
    pub fn start(context: Arc<PipelineContext>, model: SharedModel, cfar: CfarParams) -> Result<Self> {
        let worker = WorkerHandle::spawn("display-pump", move |stop| {
            pump_loop(&context, &model, &cfar, &stop)
        })
        .context("starting display pump")?;
        Ok(Self { worker })
    }

    pub fn request_stop(&self) {
        self.worker.request_stop();
    }

    pub fn join(&mut self, deadline: Duration) -> bool {
        self.worker.join(deadline)
    }
}

fn pump_loop(context: &PipelineContext, model: &SharedModel, cfar: &CfarParams, stop: &StopSignal) {
    let range_resolution = context.config().range_resolution_m();
    let timeout = context.settings().queue_get_timeout;

    while !stop.is_requested() {
        let doppler = context.range_doppler.drain() as u64;
        let angle = context.range_angle.drain() as u64;
        let profile = context.range_profiles.take(timeout);
        if profile.is_none() && doppler == 0 && angle == 0 {
            continue;
        }

        let mut next = model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        next.range_doppler_frames += doppler;
        next.range_angle_frames += angle;
        if let Some(frame) = profile {
            if let Err(err) = next.update_profile(&frame, range_resolution, cfar) {
                debug!("frame {}: detection skipped: {}", frame.sequence, err);
            }
        }
        *model.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

/// Everything the HTTP routes read from or act on.
#[derive(Clone)]
pub struct BridgeState {
    pub context: Arc<PipelineContext>,
    pub model: SharedModel,
    pub parameters: Arc<RadarParameters>,
}

fn with_state(
    state: BridgeState,
) -> impl Filter<Extract = (BridgeState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// `GET /parameters`, `GET /metrics`, `GET /range-profile`, `POST /channel/{id}`.
pub fn routes(
    state: BridgeState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let parameters_route = warp::path("parameters")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: BridgeState| warp::reply::json(&*state.parameters));

    let metrics_route = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: BridgeState| warp::reply::json(&state.context.metrics().snapshot()));

    let profile_route = warp::path("range-profile")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: BridgeState| {
            let model = state
                .model
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            warp::reply::json(&model)
        });

    let channel_route = warp::path!("channel" / usize)
        .and(warp::post())
        .and(with_state(state))
        .map(|channel: usize, state: BridgeState| {
            if state.context.set_channel(channel) {
                warp::reply::with_status(
                    warp::reply::json(&json!({"status": "ok", "channel": channel})),
                    StatusCode::OK,
                )
            } else {
                warp::reply::with_status(
                    warp::reply::json(&json!({
                        "status": "rejected",
                        "channel": channel,
                        "receivers": state.context.config().num_rx_channels()
                    })),
                    StatusCode::BAD_REQUEST,
                )
            }
        });

    parameters_route
        .or(metrics_route)
        .or(profile_route)
        .or(channel_route)
}

/// Hosts the display routes on their own thread and runtime.
pub struct GuiBridge;

impl GuiBridge {
    pub fn serve(state: BridgeState, addr: SocketAddr) -> Result<thread::JoinHandle<()>> {
        let routes = routes(state);
        thread::Builder::new()
            .name("http-bridge".to_string())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!("failed to build HTTP bridge runtime: {}", err);
                        return;
                    }
                };
                runtime.block_on(async move {
                    match warp::serve(routes).try_bind_ephemeral(addr) {
                        Ok((bound, server)) => {
                            info!("HTTP bridge listening on {}", bound);
                            server.await;
                        }
                        Err(err) => error!("HTTP bridge could not bind {}: {}", addr, err),
                    }
                });
            })
            .context("spawning HTTP bridge thread")
    }
}
