// Default value functions

pub fn default_true() -> bool {
    true
}

pub fn default_data_path() -> String {
    "./data/tessdb.db".to_string()
}

pub fn default_executor_await_timeout_ms() -> u64 {
    5000
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_format() -> String {
    "compact".to_string()
}
