//! Configuration utilities (ports, paths, tunables via env vars).

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{
    env,
    net::{Ipv4Addr, SocketAddr},
};

/// Socket address to bind the server to.
///
/// Reads the `PORT` env var or defaults to 3000, binds to 0.0.0.0.
pub fn server_addr() -> SocketAddr {
    let port = env::var("PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(3000);
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

/// Connection string for the room store.
pub fn database_url() -> String {
    env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:rooms.db".to_string())
}

/// Resolve the directory of client assets served next to the API.
/// Order:
/// 1) STATIC_DIR env var
/// 2) ./client/build (container runtime layout)
/// 3) ../client/build (local dev from the server dir)
pub fn static_dir() -> PathBuf {
    if let Ok(p) = env::var("STATIC_DIR") {
        return PathBuf::from(p);
    }
    let p1 = Path::new("./client/build");
    if p1.exists() {
        return p1.to_path_buf();
    }
    PathBuf::from("../client/build")
}

/// Grid side length for new rooms. Anything below 2 is ignored.
pub fn board_size() -> usize {
    env::var("BOARD_SIZE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n >= 2)
        .unwrap_or(3)
}

/// How long a room may sit untouched before eviction.
pub fn room_ttl() -> Duration {
    let secs = env::var("ROOM_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(24 * 60 * 60);
    Duration::from_secs(secs)
}

/// How often the idle sweep runs.
pub fn sweep_period() -> Duration {
    let secs = env::var("SWEEP_PERIOD_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60 * 60);
    Duration::from_secs(secs)
}

/// Upper bound on any single store call.
pub fn store_timeout() -> Duration {
    let millis = env::var("STORE_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5_000);
    Duration::from_millis(millis)
}
