mod executor_tests;
mod scenarios;
