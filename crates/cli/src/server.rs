use std::io;
use std::process::ExitCode;

use clap::Parser;
use mjstream::Server;

#[derive(Parser)]
#[command(
    name = "mjstream-server",
    about = "Standalone MJPEG-over-RTSP streaming server"
)]
struct Args {
    /// TCP control port to listen on
    #[arg(long, short, default_value_t = 8554)]
    port: u16,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut server = Server::new(&format!("0.0.0.0:{}", args.port));
    if let Err(e) = server.start() {
        eprintln!("Failed to start server: {}", e);
        return ExitCode::FAILURE;
    }

    println!("mjstream server on port {} — press Enter to stop", args.port);
    let mut input = String::new();
    let _ = io::stdin().read_line(&mut input);

    server.stop();
    ExitCode::SUCCESS
}
