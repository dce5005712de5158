//! Default value functions for configuration fields.
//!
//! Functions are organized by category and mirror the numbers fixed in §4.5
//! and §4.3 of the specification; every one is overridable via config file
//! or environment variable (§6 "tunable").

use super::logging::LogFormat;

pub const fn default_port() -> u16 {
    8080
}

// =============================================================================
// Room defaults
// =============================================================================

pub const fn default_min_capacity() -> u8 {
    3
}

pub const fn default_max_capacity() -> u8 {
    8
}

pub const fn default_room_cleanup_interval_secs() -> u64 {
    60
}

pub const fn default_join_code_retry_budget() -> u32 {
    10
}

// =============================================================================
// Round schedule defaults (§4.5)
// =============================================================================

pub const fn default_selection_schedule() -> [u32; 7] {
    [50, 45, 40, 35, 30, 30, 30]
}

pub const fn default_voting_timeout_secs() -> u32 {
    180
}

pub const fn default_results_display_secs() -> u32 {
    5
}

pub const fn default_min_voting_participants() -> usize {
    3
}

pub const fn default_min_players_to_start() -> usize {
    3
}

pub const fn default_early_advance_minimum() -> usize {
    2
}

// =============================================================================
// Presence defaults (§4.3)
// =============================================================================

pub const fn default_inactivity_timeout_secs() -> u64 {
    30
}

pub const fn default_max_disconnects() -> u32 {
    3
}

pub const fn default_max_missed_actions() -> u32 {
    2
}

pub const fn default_presence_scan_interval_secs() -> u64 {
    10
}

// =============================================================================
// Protocol / join-code defaults
// =============================================================================

pub const fn default_join_code_length() -> usize {
    6
}

pub fn default_join_code_alphabet() -> String {
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string()
}

pub const fn default_max_message_bytes() -> usize {
    64 * 1024
}

// =============================================================================
// Security defaults
// =============================================================================

pub const fn default_require_auth() -> bool {
    true
}

pub const fn default_max_connections_per_user() -> usize {
    1
}

pub fn default_cors_origins() -> String {
    "*".to_string()
}

// =============================================================================
// Logging defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

// =============================================================================
// Coordination / dedup defaults
// =============================================================================

pub const fn default_dedup_cache_capacity() -> usize {
    50_000
}

pub const fn default_dedup_cache_ttl_secs() -> u64 {
    120
}

pub const fn default_dedup_cache_cleanup_interval_secs() -> u64 {
    30
}

// =============================================================================
// Metrics defaults
// =============================================================================

pub const fn default_metrics_enabled() -> bool {
    true
}

// =============================================================================
// WebSocket defaults
// =============================================================================

pub const fn default_auth_timeout_secs() -> u64 {
    10
}

pub const fn default_send_queue_capacity() -> usize {
    64
}

pub const fn default_socket_send_timeout_ms() -> u64 {
    2_000
}

// =============================================================================
// External collaborator defaults
// =============================================================================

pub const fn default_situation_generation_budget_secs() -> u64 {
    20
}

pub fn default_language() -> String {
    "en".to_string()
}

pub fn default_fallback_situations() -> Vec<String> {
    vec![
        "Everyone at the office meeting realizes the call has been on mute the whole time."
            .to_string(),
        "The cat knocked the last slice of pizza onto the floor in slow motion.".to_string(),
        "Monday morning, the coffee machine is broken, and the printer is on fire.".to_string(),
        "The group chat goes silent right after someone sends an extremely bold take."
            .to_string(),
        "Everyone pretends they understood the instructions on the first try.".to_string(),
    ]
}
