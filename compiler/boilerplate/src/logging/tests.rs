use pretty_assertions::assert_eq;
use tracing_subscriber::filter::LevelFilter;

use super::*;

#[test]
fn no_directives_means_no_filter() {
    assert!(env_filter(None, None).is_none());
}

#[test]
fn configured_directives_are_used_without_rust_log() {
    let filter = env_filter(None, Some("bp_dispatch=debug")).unwrap();
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
}

#[test]
fn rust_log_takes_precedence() {
    let filter = env_filter(Some("trace".to_owned()), Some("warn")).unwrap();
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
}

#[test]
fn unparsable_directives_fall_back_to_warn() {
    let filter = env_filter(None, Some("bp_dispatch=loud")).unwrap();
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
}
