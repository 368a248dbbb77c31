pub(crate) mod test_helpers;

mod submission_scenario_tests;
