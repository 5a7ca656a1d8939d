//! Scenario-based tests for deployer

mod config_pipelines;
mod continue_on_failure;
mod failure_handling;
mod process_execution;
mod success_chain;
