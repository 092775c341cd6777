use clap::Parser;
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_LOG_DIR: &str = "~/.dice-room/logs";

/// Fixed poll cadence for `/dice/updates`.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1500);
/// Upper bound on any single request; a stalled fetch becomes a failure.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// One display refresh.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);
pub const FRAMES_PER_ROLL: usize = 20;
/// How long a notice stays on the board.
pub const NOTICE_TTL: Duration = Duration::from_secs(4);

/// Acknowledgement the server sends when an update carries nothing to report.
pub const UPDATES_ACK: &str = "Обновления успешно получены.";
/// Acknowledgement the server sends after a successful roll.
pub const ROLL_ACK: &str = "Вы бросили кубики.";

#[derive(Parser, Debug)]
#[command(version, about = "Terminal client for a two-player dice room", long_about = None)]
pub struct Args {
    /// Base URL of the game API
    #[arg(long, env = "DICE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Room to join
    #[arg(long, env = "DICE_ROOM_ID")]
    pub room_id: String,

    /// Player identity issued by the launcher
    #[arg(long, env = "DICE_PLAYER_ID")]
    pub player_id: i64,

    /// Raw launch payload forwarded with every roll
    #[arg(long, env = "DICE_INIT_DATA", default_value = "")]
    pub init_data: String,

    #[arg(long, env = "DICE_LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: String,
}

/// Who is playing in which room. Sent with every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTarget {
    pub room_id: String,
    pub player_id: i64,
    pub init_data: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_url: String,
    pub target: SessionTarget,
    pub log_dir: PathBuf,
}

impl TryFrom<Args> for AppConfig {
    type Error = color_eyre::Report;

    fn try_from(args: Args) -> Result<Self> {
        let room_id = args.room_id.trim().to_string();
        if room_id.is_empty() {
            return Err(eyre!("--room-id must not be empty"));
        }
        let api_url = args.api_url.trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(eyre!("--api-url must not be empty"));
        }
        let log_dir = PathBuf::from(shellexpand::tilde(&args.log_dir).into_owned());
        Ok(AppConfig {
            api_url,
            target: SessionTarget {
                room_id,
                player_id: args.player_id,
                init_data: args.init_data,
            },
            log_dir,
        })
    }
}
