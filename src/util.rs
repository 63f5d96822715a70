use std::path::PathBuf;

const RADIO_SERVER_CONFIG: &str = "RADIO_SERVER_CONFIG";

/// Config file named by the environment (or a `.env` file), if any.
pub fn get_config_path() -> Option<PathBuf> {
    let _ = dotenv::dotenv();
    std::env::var_os(RADIO_SERVER_CONFIG).map(PathBuf::from)
}
