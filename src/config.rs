use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_PLAYERS: usize = 10;
const DEFAULT_ROUND_SECS: u64 = 60;
const DEFAULT_PREPARE_SECS: u64 = 5;
const DEFAULT_ROOM_ID_LENGTH: usize = 6;
/// Shorter ids leave too few codes for live rooms
pub const MIN_ROOM_ID_LENGTH: usize = 4;

/// Pause between the last vote and the results reveal
pub const REVEAL_DELAY: Duration = Duration::from_secs(1);
/// How long an empty room survives waiting for a reconnect
pub const EMPTY_ROOM_GRACE: Duration = Duration::from_secs(5);
/// Delay before the creator is told to navigate to the new room
pub const ROOM_CREATED_DELAY: Duration = Duration::from_millis(100);

/// Process-wide game configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub port: u16,
    /// Directory scanned for sound cues
    pub sounds_dir: PathBuf,
    /// Directory served as static files (room.html lives here)
    pub public_dir: PathBuf,
    pub max_players: usize,
    pub round_duration: Duration,
    /// Countdown between everyone readying up and the round starting.
    /// Ticked in whole seconds.
    pub prepare_duration: Duration,
    pub room_id_length: usize,
    pub reveal_delay: Duration,
    pub empty_room_grace: Duration,
    pub room_created_delay: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            sounds_dir: PathBuf::from("public/sounds"),
            public_dir: PathBuf::from("public"),
            max_players: DEFAULT_MAX_PLAYERS,
            round_duration: Duration::from_secs(DEFAULT_ROUND_SECS),
            prepare_duration: Duration::from_secs(DEFAULT_PREPARE_SECS),
            room_id_length: DEFAULT_ROOM_ID_LENGTH,
            reveal_delay: REVEAL_DELAY,
            empty_room_grace: EMPTY_ROOM_GRACE,
            room_created_delay: ROOM_CREATED_DELAY,
        }
    }
}

/// Read a trimmed, non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Read an environment variable and parse it, ignoring zero and garbage
fn env_positive<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let value: T = env_string(key)?.parse().ok()?;
    if value > T::default() {
        Some(value)
    } else {
        tracing::warn!("Ignoring non-positive value for {}", key);
        None
    }
}

impl GameConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: env_positive("PORT").unwrap_or(defaults.port),
            sounds_dir: env_string("SOUNDS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.sounds_dir),
            public_dir: env_string("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            max_players: env_positive("MAX_PLAYERS").unwrap_or(defaults.max_players),
            round_duration: env_positive("ROUND_DURATION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.round_duration),
            prepare_duration: env_positive("PREPARE_DURATION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.prepare_duration),
            room_id_length: env_positive::<usize>("ROOM_ID_LENGTH")
                .filter(|len| {
                    let ok = *len >= MIN_ROOM_ID_LENGTH;
                    if !ok {
                        tracing::warn!(
                            "ROOM_ID_LENGTH below {}, using default",
                            MIN_ROOM_ID_LENGTH
                        );
                    }
                    ok
                })
                .unwrap_or(defaults.room_id_length),
            ..defaults
        }
    }

    /// Whole countdown seconds shown to players while preparing
    pub fn prepare_countdown(&self) -> u64 {
        self.prepare_duration.as_secs()
    }
}
