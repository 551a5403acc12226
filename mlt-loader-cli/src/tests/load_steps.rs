//! Behaviour-driven step definitions driving the load CLI scenarios.

use super::helpers::{Workspace, parse_report};
use super::*;
use crate::load::run_load_with;
use mlt_loader_core::LoadError;
use mlt_loader_data::{FilesError, JsonTileDecoder};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;
use std::cell::RefCell;

struct LoadWorld {
    workspace: Workspace,
    paths: RefCell<Vec<String>>,
    cli_args: RefCell<Vec<String>>,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl LoadWorld {
    fn new() -> Self {
        Self {
            workspace: Workspace::new(),
            paths: RefCell::new(Vec::new()),
            cli_args: RefCell::new(Vec::new()),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn build_command_line(&self) -> Vec<String> {
        let mut argv = vec!["mlt-loader".to_owned(), "load".to_owned()];
        argv.extend(self.paths.borrow().iter().cloned());
        argv.extend(self.cli_args.borrow().iter().cloned());
        argv
    }

    fn report(&self) -> Value {
        let borrowed = self.result.borrow();
        borrowed
            .as_ref()
            .expect("result recorded")
            .as_ref()
            .expect("expected success");
        parse_report(&self.stdout.borrow())
    }

    fn error(&self) -> std::cell::Ref<'_, CliError> {
        std::cell::Ref::map(self.result.borrow(), |slot| {
            slot.as_ref()
                .expect("result recorded")
                .as_ref()
                .expect_err("expected error")
        })
    }
}

#[fixture]
fn world() -> LoadWorld {
    LoadWorld::new()
}

fn unquote(text: &str) -> &str {
    text.trim().trim_matches('"')
}

#[given("a buildings tile named {name}")]
fn buildings_tile(#[from(world)] world: &LoadWorld, name: String) {
    let path = world.workspace.write_buildings(unquote(&name));
    world.paths.borrow_mut().push(path.into_string());
}

#[given("a roads tile named {name}")]
fn roads_tile(#[from(world)] world: &LoadWorld, name: String) {
    let path = world.workspace.write_roads(unquote(&name));
    world.paths.borrow_mut().push(path.into_string());
}

#[given("I pass {flag}")]
fn pass_flag(#[from(world)] world: &LoadWorld, flag: String) {
    world.cli_args.borrow_mut().push(unquote(&flag).to_owned());
}

#[when("I run the load command")]
fn run_load_command(#[from(world)] world: &LoadWorld) {
    let invocation = world.build_command_line();
    let parsed = Cli::try_parse_from(invocation).map_err(CliError::from);
    let outcome = parsed.and_then(|cli| match cli.command {
        Command::Load(args) => {
            let config = args.into_config()?;
            let mut buffer = world.stdout.borrow_mut();
            run_load_with(&config, &JsonTileDecoder, &mut *buffer)
        }
    });
    world.result.replace(Some(outcome));
}

#[then("the command succeeds with {count} collections")]
fn succeeds_with_collections(#[from(world)] world: &LoadWorld, count: usize) {
    let report = world.report();
    let collections = report["collections"]
        .as_array()
        .expect("collections array");
    assert_eq!(collections.len(), count);
}

#[then("the report summary is {summary}")]
fn report_summary(#[from(world)] world: &LoadWorld, summary: String) {
    let report = world.report();
    assert_eq!(report["summary"], unquote(&summary));
}

#[then("the command fails because references are mixed")]
fn fails_mixed(#[from(world)] world: &LoadWorld) {
    match &*world.error() {
        CliError::Load(FilesError::Load(LoadError::MixedReferences {
            placed,
            unplaced,
            ..
        })) => {
            assert_eq!((*placed, *unplaced), (1, 1));
        }
        other => panic!("expected MixedReferences, found {other:?}"),
    }
}

#[then("the command fails because paths are missing")]
fn fails_missing_paths(#[from(world)] world: &LoadWorld) {
    match &*world.error() {
        CliError::MissingArgument { field, .. } => assert_eq!(*field, ARG_PATHS),
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

macro_rules! register_load_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/load_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: LoadWorld) {
            let _ = world;
        }
    };
}

register_load_scenario!(load_single_tile, "loading a single addressed tile");
register_load_scenario!(merge_two_tiles, "merging roads from two tiles");
register_load_scenario!(separate_tiles, "keeping tiles separate");
register_load_scenario!(raw_coordinates, "loading raw tile coordinates");
register_load_scenario!(reject_mixed, "rejecting mixed references");
register_load_scenario!(missing_paths, "rejecting a missing path list");
