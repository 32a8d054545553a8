use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wfd_sink::{RtpReceiver, Sink, SinkConfig, Source, TcpControlTransport, TransportMode};

#[derive(Parser)]
#[command(name = "wfd-sink", about = "Wi-Fi Display sink (RTSP control plane)")]
struct Args {
    /// Full control locator, e.g. rtsp://192.168.49.1:7236/wfd1.0
    #[arg(long, conflicts_with_all = ["host", "port"])]
    uri: Option<String>,

    /// Source host when no locator is given
    #[arg(long, default_value = "192.168.49.1")]
    host: String,

    /// Source RTSP port when no locator is given
    #[arg(long, short, default_value_t = 7236)]
    port: u16,

    /// Carry media interleaved on the control connection instead of UDP
    #[arg(long)]
    interleaved: bool,

    /// Local RTP port to bind and advertise (0 binds an ephemeral port)
    #[arg(long, default_value_t = wfd_sink::capability::DEFAULT_CLIENT_RTP_PORT)]
    rtp_port: u16,

    /// Give up on a request after this many seconds (0 waits forever)
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = SinkConfig {
        transport_mode: if args.interleaved {
            TransportMode::Interleaved
        } else {
            TransportMode::Udp
        },
        client_rtp_port: args.rtp_port,
        request_timeout: (args.request_timeout_secs > 0)
            .then(|| Duration::from_secs(args.request_timeout_secs)),
        ..SinkConfig::default()
    };

    let source = match args.uri {
        Some(uri) => Source::Uri(uri),
        None => Source::HostPort {
            host: args.host,
            port: args.port,
        },
    };

    let (tx, rx) = mpsc::channel();
    let media = RtpReceiver::new(config.client_rtp_port);
    let mut sink = Sink::new(config, TcpControlTransport::new(tx), media);

    if let Err(e) = sink.start(source) {
        tracing::error!(error = %e, "failed to start sink");
        std::process::exit(2);
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        thread::spawn(move || {
            let mut input = String::new();
            let _ = std::io::stdin().read_line(&mut input);
            running.store(false, Ordering::SeqCst);
        });
    }

    println!("Wi-Fi Display sink running, press Enter to stop");
    let result = sink.run(&rx, &running);

    let rx_stats = sink.media().stats();
    tracing::info!(
        rtp_packets = rx_stats.rtp_packets,
        rtp_bytes = rx_stats.rtp_bytes,
        lost = rx_stats.lost,
        "sink stopped"
    );

    if let Err(e) = result {
        tracing::error!(error = %e, "session ended with error");
        std::process::exit(1);
    }
}
