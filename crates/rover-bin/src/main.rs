mod camera;
mod cli;
mod encode;
mod logging;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use rover_config::VisionConfig;
use rover_net::{FrameStreamer, MotorSink, RouteSource};
use rover_pilot::{Coordinator, Emission};
use rover_vision::annotate::annotate_frame;

use camera::{Camera, SyntheticCamera};
use cli::Cli;

const WAITING_FOR_ROUTE_SLEEP: Duration = Duration::from_millis(50);

fn main() {
    let args = Cli::parse();
    let _logging_guard = logging::init(args.verbose);

    if let Err(e) = run(&args) {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] rover_config::Error),
    #[error(transparent)]
    Camera(#[from] camera::CameraError),
    #[error(transparent)]
    Net(#[from] rover_net::Error),
}

fn run(args: &Cli) -> Result<(), StartupError> {
    let cfg = VisionConfig::load_or_default(&args.config)?;

    let mut camera = SyntheticCamera::open(&args.camera_device, cfg.geometry.frame_w, cfg.geometry.frame_h)?;
    let motor = MotorSink::connect(&cfg.net.motor_socket_path)?;
    let route_source = RouteSource::bind(&cfg.net.route_socket_path)?;

    let mut streamer = if args.no_stream {
        None
    } else {
        Some(FrameStreamer::start(cfg.net.stream_port)?)
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            tracing::info!("received shutdown signal");
            shutdown.store(true, Ordering::SeqCst);
        })
        .expect("failed to install SIGINT handler");
    }

    let mut coordinator = Coordinator::new(cfg.coordinator.buffer_length);

    tracing::info!("entering capture loop");
    while !shutdown.load(Ordering::SeqCst) {
        match route_source.try_recv() {
            Ok(Some(actions)) => coordinator.set_route(&actions),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "dropping malformed route datagram"),
        }

        let frame = match camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "camera capture failed, skipping tick");
                continue;
            }
        };

        let output = coordinator.step(&frame, &cfg);
        if let Err(e) = motor.send_byte(output.emission.byte()) {
            tracing::warn!(error = %e, "motor datagram send failed");
        }

        if let Some(streamer) = &streamer {
            let visualized = match &output.frame_result {
                Some(result) => annotate_frame(&frame, result, &cfg.debug),
                None => frame,
            };
            streamer.push(encode::encode_jpeg(&visualized, cfg.net.jpeg_quality));
        }

        if output.waiting_for_route {
            thread::sleep(WAITING_FOR_ROUTE_SLEEP);
        }
    }

    tracing::info!("shutting down: emitting final stop pulse");
    if let Err(e) = motor.send_byte(Emission::StopFinal.byte()) {
        tracing::warn!(error = %e, "final stop pulse failed to send");
    }
    if let Some(streamer) = streamer.as_mut() {
        streamer.stop();
    }

    Ok(())
}
