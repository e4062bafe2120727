mod state_tests;
mod tools;
