//! Reading the process-wide status must leave the registrar configurable.
//!
//! Runs in its own test binary because the global is installed at most once.

use powersync_native::{
    configure_core, core_report, core_state, DependencyPlan, Registrar, RegistrationState,
};
use tempfile::TempDir;

#[test]
fn test_status_reads_do_not_install_registrar() {
    assert_eq!(core_state(), RegistrationState::Unloaded);

    let report = core_report();
    assert_eq!(report.state, RegistrationState::Unloaded);
    assert_eq!(report.response_code, None);
    assert_eq!(
        report.planned,
        DependencyPlan::default()
            .names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
    assert!(report.completed_at.is_none());

    let lib_dir = TempDir::new().unwrap();
    configure_core(
        Registrar::builder()
            .search_dir(lib_dir.path())
            .search_dirs_from_env(false)
            .system_fallback(false),
    )
    .unwrap();

    assert_eq!(core_state(), RegistrationState::Unloaded);
}
