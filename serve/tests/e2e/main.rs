//! End-to-end tests: a real server on 127.0.0.1:0 driven with reqwest.

mod common;

mod actions;
mod assist;
mod health;
mod invalid_request;
mod tools;
