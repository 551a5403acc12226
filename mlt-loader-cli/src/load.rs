//! Load command implementation for the loader CLI.

use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use mlt_loader_core::{
    Crs, GeometryKind, LoadOptions, LoadReport, MixedReferences, Schema, TileAddress,
    TileDecoder, TileScheme,
};
use mlt_loader_data::{
    DetectionSummary, JsonTileDecoder, LoadMode, TileFile, detect_addresses, load_files,
};
use mlt_loader_fs::create_output_file;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::{
    ARG_MIXED, ARG_OUTPUT, ARG_PATHS, ARG_RAW, ARG_SCHEME, ARG_SEPARATE, ARG_TILE, CliError,
    ENV_PATHS,
};

/// CLI arguments for the `load` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Load tile dumps into one collection per layer and geometry \
                 kind. Tile addresses are read from file names such as \
                 14_8297_10749.mlt or from z/x/y directories unless --raw is \
                 given. The report is printed as JSON.",
    about = "Load tiles and report the resulting collections"
)]
#[ortho_config(prefix = "MLT_LOADER")]
pub(crate) struct LoadArgs {
    /// Tile files to load.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) paths: Vec<Utf8PathBuf>,
    /// Row convention of the tiles: `tms` (default) or `xyz`.
    #[arg(long = ARG_SCHEME, value_name = "scheme")]
    #[serde(default)]
    pub(crate) scheme: Option<String>,
    /// Keep each file's layers apart instead of merging them.
    #[arg(long = ARG_SEPARATE, value_name = "bool", num_args = 0..=1, default_missing_value = "true")]
    #[serde(default)]
    pub(crate) separate: Option<bool>,
    /// Skip address detection and keep tile-local coordinates.
    #[arg(long = ARG_RAW, value_name = "bool", num_args = 0..=1, default_missing_value = "true")]
    #[serde(default)]
    pub(crate) raw: Option<bool>,
    /// Address of a single input file, as `z/x/y`.
    #[arg(long = ARG_TILE, value_name = "z/x/y")]
    #[serde(default)]
    pub(crate) tile: Option<String>,
    /// Policy for merging addressed with unaddressed tiles: `permit` or `reject`.
    #[arg(long = ARG_MIXED, value_name = "policy")]
    #[serde(default)]
    pub(crate) mixed: Option<String>,
    /// Write the report here instead of stdout.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
}

impl LoadArgs {
    pub(crate) fn into_config(self) -> Result<LoadConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        LoadConfig::try_from(merged)
    }
}

/// Resolved `load` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadConfig {
    /// Tile files in command-line order.
    pub(crate) paths: Vec<Utf8PathBuf>,
    /// Merged or separate loading for several files.
    pub(crate) mode: LoadMode,
    /// Options handed to the core.
    pub(crate) options: LoadOptions,
    /// Whether addresses are detected from paths.
    pub(crate) detect: bool,
    /// Explicit address of the single input file.
    pub(crate) tile: Option<TileAddress>,
    /// Report destination; stdout when absent.
    pub(crate) output: Option<Utf8PathBuf>,
}

impl LoadConfig {
    /// Pair every path with the address it will be loaded at.
    pub(crate) fn tile_files(&self) -> Vec<TileFile> {
        match (self.tile, self.detect) {
            (Some(address), _) => self
                .paths
                .iter()
                .map(|path| TileFile::new(path.clone(), Some(address)))
                .collect(),
            (None, true) => detect_addresses(&self.paths, self.options.scheme),
            (None, false) => self
                .paths
                .iter()
                .map(|path| TileFile::new(path.clone(), None))
                .collect(),
        }
    }
}

impl TryFrom<LoadArgs> for LoadConfig {
    type Error = CliError;

    fn try_from(args: LoadArgs) -> Result<Self, Self::Error> {
        if args.paths.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_PATHS,
                env: ENV_PATHS,
            });
        }

        let scheme = parse_option::<TileScheme>(args.scheme.as_deref(), ARG_SCHEME)?;
        let mixed_references = parse_option::<MixedReferences>(args.mixed.as_deref(), ARG_MIXED)?;
        let tile = args
            .tile
            .map(|value| {
                value
                    .parse::<TileAddress>()
                    .map_err(|source| CliError::InvalidTile { value, source })
            })
            .transpose()?;
        if tile.is_some() && args.paths.len() > 1 {
            return Err(CliError::TileNeedsSinglePath {
                count: args.paths.len(),
            });
        }

        let mode = if args.separate.unwrap_or(false) {
            LoadMode::Separate
        } else {
            LoadMode::Merged
        };

        Ok(Self {
            paths: args.paths,
            mode,
            options: LoadOptions {
                scheme,
                mixed_references,
            },
            detect: !args.raw.unwrap_or(false),
            tile,
            output: args.output,
        })
    }
}

fn parse_option<T>(value: Option<&str>, field: &'static str) -> Result<T, CliError>
where
    T: std::str::FromStr<Err = String> + Default,
{
    value.map_or_else(
        || Ok(T::default()),
        |text| {
            text.parse()
                .map_err(|reason| CliError::InvalidOption { field, reason })
        },
    )
}

pub(super) fn run_load(args: LoadArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    match &config.output {
        Some(path) => {
            let mut file = create_output_file(path).map_err(|source| CliError::CreateOutput {
                path: path.clone(),
                source,
            })?;
            run_load_with(&config, &JsonTileDecoder, &mut file)
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            run_load_with(&config, &JsonTileDecoder, &mut stdout)
        }
    }
}

pub(super) fn run_load_with(
    config: &LoadConfig,
    decoder: &dyn TileDecoder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let files = config.tile_files();
    let detection = config.detect.then(|| DetectionSummary::of(&files));
    if let Some(summary) = &detection {
        info!("{summary}");
    }
    let report = load_files(decoder, &files, config.mode, &config.options)?;
    info!("{}", report.summary());
    write_report(writer, &ReportView::new(&report, detection))
}

/// JSON shape of a load report.
#[derive(Debug, Serialize)]
struct ReportView<'a> {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detection: Option<String>,
    tiles_loaded: usize,
    tiles_failed: usize,
    collections: Vec<CollectionView<'a>>,
    issues: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CollectionView<'a> {
    name: &'a str,
    kind: GeometryKind,
    crs: Option<Crs>,
    features: usize,
    fields: &'a Schema,
    /// `[min_x, min_y, max_x, max_y]`.
    extent: Option<[f64; 4]>,
}

impl<'a> ReportView<'a> {
    fn new(report: &'a LoadReport, detection: Option<DetectionSummary>) -> Self {
        let collections = report
            .collections
            .iter()
            .map(|collection| CollectionView {
                name: &collection.name,
                kind: collection.kind,
                crs: collection.crs,
                features: collection.len(),
                fields: &collection.schema,
                extent: collection.extent.map(|rect| {
                    let (min, max) = (rect.min(), rect.max());
                    [min.x, min.y, max.x, max.y]
                }),
            })
            .collect();
        Self {
            summary: report.summary().to_string(),
            detection: detection.map(|summary| summary.to_string()),
            tiles_loaded: report.tiles_loaded,
            tiles_failed: report.tiles_failed,
            collections,
            issues: report.issues.iter().map(ToString::to_string).collect(),
        }
    }
}

fn write_report(writer: &mut dyn Write, report: &ReportView<'_>) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(report).map_err(CliError::SerializeReport)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteReport)?;
    writer.write_all(b"\n").map_err(CliError::WriteReport)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<LoadConfig, CliError> {
    let merged = LoadArgs::merge_from_layers(layers).map_err(CliError::from)?;
    LoadConfig::try_from(merged)
}
