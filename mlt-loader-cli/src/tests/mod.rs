//! Shared test harness modules for the loader CLI.

use super::*;

mod helpers;
mod load_steps;
