mod stackless_tests;

use crate::CoroState;

#[test]
fn states_render_by_name() {
    // destroy-time logs print slot state through Display
    assert_eq!(CoroState::Init.to_string(), "Init");
    assert_eq!(CoroState::Running.to_string(), "Running");
    assert_eq!(CoroState::Suspended.to_string(), "Suspended");
    assert_eq!(CoroState::Finished.to_string(), "Finished");
}
