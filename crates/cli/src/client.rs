use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::Parser;
use mjstream::{AnalyticsSummary, Client, VideoSink};

#[derive(Parser)]
#[command(
    name = "mjstream-client",
    about = "MJPEG-over-RTSP streaming client (headless)"
)]
struct Args {
    /// Server host name or address
    server_host: String,

    /// Server control port
    server_port: u16,

    /// Local UDP port to receive media on
    media_port: u16,

    /// Media file to request from the server
    filename: String,

    /// Request the 1080p HD stream
    #[arg(long)]
    hd: bool,
}

/// Headless sink: counts displayed frames and prints the stats line the
/// receive loop publishes once per second.
#[derive(Default)]
struct ConsoleSink {
    frames: AtomicU64,
}

impl VideoSink for ConsoleSink {
    fn on_frame(&self, _frame: &[u8]) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn on_stats(&self, summary: &AnalyticsSummary) {
        println!(
            "frames: {} | frame loss: {:.2}% | packet loss: {:.2}% | bitrate: {:.2} Mbps | latency: {:.2} ms | jitter: {:.2} ms",
            self.frames.load(Ordering::Relaxed),
            summary.frame_loss_rate,
            summary.packet_loss_rate,
            summary.current_bitrate_mbps,
            summary.average_latency_ms,
            summary.jitter_ms,
        );
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let sink = Arc::new(ConsoleSink::default());

    let mut client = match Client::connect(
        &args.server_host,
        args.server_port,
        args.media_port,
        &args.filename,
        args.hd,
        sink,
    ) {
        Ok(client) => client,
        Err(e) => {
            eprintln!(
                "connection failed: {}:{}: {}",
                args.server_host, args.server_port, e
            );
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = client.setup() {
        eprintln!("setup failed: {}", e);
        return ExitCode::FAILURE;
    }
    println!("session {} established", client.session_id());

    if let Err(e) = client.play() {
        eprintln!("play failed: {}", e);
        return ExitCode::FAILURE;
    }
    println!("playing — commands: pause, play, quit");

    for line in io::stdin().lock().lines() {
        let command = match line {
            Ok(line) => line.trim().to_lowercase(),
            Err(_) => break,
        };
        let result = match command.as_str() {
            "pause" => client.pause(),
            "play" => client.play(),
            "quit" | "teardown" | "" => break,
            other => {
                println!("unknown command: {}", other);
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("command failed: {}", e);
            break;
        }
    }

    if let Err(e) = client.teardown() {
        eprintln!("teardown failed: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
