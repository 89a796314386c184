use std::path::PathBuf;

use atty::Stream;
use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::Result;
use serde_json::{json, Map, Value};

use gsx_core::{
    add_link, add_radargram_to_default_group, add_timeslice_to_default_group, apply_quick_fixes,
    assign_radargrams_to_group, assign_timeslices_to_group, catalog_path, create_raster_group,
    delete_raster_group, ensure_project_structure, export_project_package,
    import_project_package, link_surfer_grid_into_project, load_catalog, register_model_3d,
    register_radargram, register_timeslices_batch, register_vector_layer,
    remove_radargrams_from_group, remove_timeslices_from_group, to_json_response,
    update_raster_group, validate_catalog, CatalogError, CommandStatus, ExecutionOutcome,
    LinkRecord, Model3dRecord, QuickFixFlags, RadargramRecord, TimesliceRecord,
    VectorLayerRecord,
};

mod style;

use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = GsxCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let outcome = match run_command(&cli) {
        Ok(outcome) => outcome,
        Err(err) => outcome_from_error(&err),
    };
    let code = emit_output(&cli, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("gsx={level},gsx_core={level},gsx_domain={level},gsx_cli={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn outcome_from_error(err: &anyhow::Error) -> ExecutionOutcome {
    if let Some(user) = err.downcast_ref::<CatalogError>() {
        let status = match user {
            CatalogError::Corrupt { .. } | CatalogError::Shape { .. } => CommandStatus::Failure,
            _ => CommandStatus::UserError,
        };
        return ExecutionOutcome {
            status,
            message: user.to_string(),
            details: json!({}),
        };
    }
    ExecutionOutcome::failure(format!("{err:#}"), json!({}))
}

fn emit_output(cli: &GsxCli, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.status.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = to_json_response(&command_name(&cli.command), outcome, code);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if cli.quiet {
        if outcome.status != CommandStatus::Ok {
            eprintln!("{}", style.status(outcome.status, &outcome.message));
        }
    } else {
        println!("{}", style.status(outcome.status, &outcome.message));
        for line in detail_lines(&outcome.details) {
            println!("{line}");
        }
        for issue in string_list(&outcome.details, "errors") {
            println!("{}", style.error_line(&format!("  error: {issue}")));
        }
        for issue in string_list(&outcome.details, "warnings") {
            println!("{}", style.warning_line(&format!("  warning: {issue}")));
        }
    }

    Ok(code)
}

fn detail_lines(details: &Value) -> Vec<String> {
    details
        .get("lines")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(Value::as_str)
                .map(|line| format!("  {line}"))
                .collect()
        })
        .unwrap_or_default()
}

fn string_list(details: &Value, key: &str) -> Vec<String> {
    details
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn command_name(command: &Command) -> String {
    match command {
        Command::Init => "init".to_string(),
        Command::Status => "status".to_string(),
        Command::Validate => "validate".to_string(),
        Command::Fix(_) => "fix".to_string(),
        Command::Group(sub) => format!("group {}", group_name(sub)),
        Command::Register(sub) => format!("register {}", register_name(sub)),
        Command::Link(sub) => format!("link {}", link_name(sub)),
        Command::Package(sub) => format!("package {}", package_name(sub)),
    }
}

fn group_name(command: &GroupCommand) -> &'static str {
    match command {
        GroupCommand::Create(_) => "create",
        GroupCommand::List => "list",
        GroupCommand::Assign(_) => "assign",
        GroupCommand::Remove(_) => "remove",
        GroupCommand::Update(_) => "update",
        GroupCommand::Delete(_) => "delete",
    }
}

fn register_name(command: &RegisterCommand) -> &'static str {
    match command {
        RegisterCommand::Model3d(_) => "model3d",
        RegisterCommand::Radargram(_) => "radargram",
        RegisterCommand::Timeslice(_) => "timeslice",
        RegisterCommand::Vector(_) => "vector",
    }
}

fn link_name(command: &LinkCommand) -> &'static str {
    match command {
        LinkCommand::Add(_) => "add",
        LinkCommand::SurferGrid(_) => "surfer-grid",
    }
}

fn package_name(command: &PackageCommand) -> &'static str {
    match command {
        PackageCommand::Export(_) => "export",
        PackageCommand::Import(_) => "import",
    }
}

fn run_command(cli: &GsxCli) -> anyhow::Result<ExecutionOutcome> {
    let root = cli.project.clone();
    match &cli.command {
        Command::Init => {
            let paths = ensure_project_structure(&root)?;
            let mut doc = load_catalog(&root)?;
            gsx_core::save_catalog(&root, &mut doc)?;
            Ok(ExecutionOutcome::success(
                format!("initialized project at {}", root.display()),
                json!({
                    "catalog": catalog_path(&root),
                    "folders": paths.keys().collect::<Vec<_>>(),
                }),
            ))
        }
        Command::Status => {
            let doc = load_catalog(&root)?;
            let lines = vec![
                format!("catalog version: {}", doc.catalog_version),
                format!("3D models:      {}", doc.models_3d.len()),
                format!("radargrams:     {}", doc.radargrams.len()),
                format!("timeslices:     {}", doc.timeslices.len()),
                format!("vector layers:  {}", doc.vector_layers.len()),
                format!("links:          {}", doc.links.len()),
                format!("raster groups:  {}", doc.raster_groups.len()),
                format!("updated:        {}", doc.updated_at),
            ];
            Ok(ExecutionOutcome::success(
                format!("catalog for {}", root.display()),
                json!({
                    "catalog_version": doc.catalog_version,
                    "models_3d": doc.models_3d.len(),
                    "radargrams": doc.radargrams.len(),
                    "timeslices": doc.timeslices.len(),
                    "vector_layers": doc.vector_layers.len(),
                    "links": doc.links.len(),
                    "raster_groups": doc.raster_groups.len(),
                    "updated_at": doc.updated_at,
                    "lines": lines,
                }),
            ))
        }
        Command::Validate => {
            let (_, report) = validate_catalog(&root, None)?;
            let message = format!(
                "{} error(s), {} warning(s)",
                report.errors.len(),
                report.warnings.len()
            );
            let details = json!({
                "errors": report.errors,
                "warnings": report.warnings,
            });
            if report.has_errors() {
                Ok(ExecutionOutcome::user_error(message, details))
            } else {
                Ok(ExecutionOutcome::success(message, details))
            }
        }
        Command::Fix(args) => {
            let flags = QuickFixFlags {
                remove_missing_files: !args.keep_missing_files,
                clear_missing_zgrid: !args.keep_zgrid,
                clean_references: !args.keep_references,
                remove_empty_groups: !args.keep_empty_groups,
                assign_crs: args.assign_crs.clone(),
            };
            let summary = apply_quick_fixes(&root, &flags)?;
            Ok(ExecutionOutcome::success(
                format!("applied {} fix(es)", summary.total()),
                serde_json::to_value(summary)?,
            ))
        }
        Command::Group(sub) => run_group(&root, sub),
        Command::Register(sub) => run_register(&root, sub),
        Command::Link(sub) => run_link(&root, sub),
        Command::Package(sub) => run_package(&root, sub),
    }
}

fn run_group(root: &std::path::Path, command: &GroupCommand) -> anyhow::Result<ExecutionOutcome> {
    match command {
        GroupCommand::Create(args) => {
            let (group, created) = create_raster_group(root, &args.name)?;
            let message = if created {
                format!("created group {}", group.id)
            } else {
                format!("group {} already exists", group.id)
            };
            Ok(ExecutionOutcome::success(
                message,
                json!({ "group": group, "created": created }),
            ))
        }
        GroupCommand::List => {
            let doc = load_catalog(root)?;
            let lines: Vec<String> = doc
                .raster_groups
                .iter()
                .map(|g| {
                    format!(
                        "{}  {} ({} radargrams, {} timeslices)",
                        g.id,
                        g.name,
                        g.radargram_ids.len(),
                        g.timeslice_ids.len()
                    )
                })
                .collect();
            Ok(ExecutionOutcome::success(
                format!("{} group(s)", doc.raster_groups.len()),
                json!({ "groups": doc.raster_groups, "lines": lines }),
            ))
        }
        GroupCommand::Assign(args) => {
            if args.timeslices.is_empty() && args.radargrams.is_empty() {
                return Ok(ExecutionOutcome::user_error(
                    "nothing to assign: pass --timeslices or --radargrams",
                    json!({}),
                ));
            }
            let mut group = None;
            if !args.timeslices.is_empty() {
                group = Some(assign_timeslices_to_group(
                    root,
                    &args.group_id,
                    &args.timeslices,
                )?);
            }
            if !args.radargrams.is_empty() {
                group = Some(assign_radargrams_to_group(
                    root,
                    &args.group_id,
                    &args.radargrams,
                )?);
            }
            let group = group.ok_or_else(|| CatalogError::UnknownGroup(args.group_id.clone()))?;
            Ok(ExecutionOutcome::success(
                format!("updated group {}", group.id),
                json!({ "group": group }),
            ))
        }
        GroupCommand::Remove(args) => {
            if args.timeslices.is_empty() && args.radargrams.is_empty() {
                return Ok(ExecutionOutcome::user_error(
                    "nothing to remove: pass --timeslices or --radargrams",
                    json!({}),
                ));
            }
            let mut group = None;
            if !args.timeslices.is_empty() {
                group = Some(remove_timeslices_from_group(
                    root,
                    &args.group_id,
                    &args.timeslices,
                )?);
            }
            if !args.radargrams.is_empty() {
                group = Some(remove_radargrams_from_group(
                    root,
                    &args.group_id,
                    &args.radargrams,
                )?);
            }
            let group = group.ok_or_else(|| CatalogError::UnknownGroup(args.group_id.clone()))?;
            Ok(ExecutionOutcome::success(
                format!("updated group {}", group.id),
                json!({ "group": group }),
            ))
        }
        GroupCommand::Update(args) => {
            let mut updates = Map::new();
            for pair in &args.set {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("expected KEY=VALUE, got: {pair}"))?;
                let value = serde_json::from_str(value)
                    .unwrap_or_else(|_| Value::String(value.to_string()));
                updates.insert(key.to_string(), value);
            }
            let group = update_raster_group(root, &args.group_id, &updates)?;
            Ok(ExecutionOutcome::success(
                format!("updated group {}", group.id),
                json!({ "group": group }),
            ))
        }
        GroupCommand::Delete(args) => {
            let removed = delete_raster_group(root, &args.group_id)?;
            Ok(ExecutionOutcome::success(
                format!("deleted group {}", removed.id),
                json!({ "group": removed }),
            ))
        }
    }
}

fn run_register(
    root: &std::path::Path,
    command: &RegisterCommand,
) -> anyhow::Result<ExecutionOutcome> {
    match command {
        RegisterCommand::Model3d(args) => {
            let record = register_model_3d(
                root,
                Model3dRecord {
                    project_path: args.path.clone(),
                    source_path: args.source.clone().unwrap_or_default(),
                    crs: args.crs.clone().unwrap_or_default(),
                    ..Model3dRecord::default()
                },
            )?;
            Ok(ExecutionOutcome::success(
                format!("registered 3D model {}", record.id),
                json!({ "record": record }),
            ))
        }
        RegisterCommand::Radargram(args) => {
            let record = register_radargram(
                root,
                RadargramRecord {
                    project_path: args.path.clone(),
                    source_path: args.source.clone().unwrap_or_default(),
                    crs: args.crs.clone().unwrap_or_default(),
                    ..RadargramRecord::default()
                },
            )?;
            if args.default_group {
                add_radargram_to_default_group(root, &record.id)?;
            }
            Ok(ExecutionOutcome::success(
                format!("registered radargram {}", record.id),
                json!({ "record": record }),
            ))
        }
        RegisterCommand::Timeslice(args) => {
            let records: Vec<TimesliceRecord> = args
                .paths
                .iter()
                .map(|path| TimesliceRecord {
                    project_path: path.clone(),
                    crs: args.crs.clone().unwrap_or_default(),
                    depth_from: args.depth_from,
                    depth_to: args.depth_to,
                    unit: args.unit.clone().unwrap_or_default(),
                    ..TimesliceRecord::default()
                })
                .collect();
            let registered = register_timeslices_batch(root, records)?;
            if args.default_group {
                for record in &registered {
                    add_timeslice_to_default_group(root, &record.id)?;
                }
            }
            Ok(ExecutionOutcome::success(
                format!("registered {} timeslice(s)", registered.len()),
                json!({ "records": registered }),
            ))
        }
        RegisterCommand::Vector(args) => {
            let record = register_vector_layer(
                root,
                VectorLayerRecord {
                    layer_name: args.layer_name.clone(),
                    project_path: args.path.clone().unwrap_or_default(),
                    geometry_type: args.geometry.parse().unwrap_or_default(),
                    is_3d: args.is_3d,
                    crs: args.crs.clone().unwrap_or_default(),
                    source_kind: args.source_kind.clone().unwrap_or_default(),
                    ..VectorLayerRecord::default()
                },
            )?;
            Ok(ExecutionOutcome::success(
                format!("registered vector layer {}", record.id),
                json!({ "record": record }),
            ))
        }
    }
}

fn run_link(root: &std::path::Path, command: &LinkCommand) -> anyhow::Result<ExecutionOutcome> {
    match command {
        LinkCommand::Add(args) => {
            let record = add_link(
                root,
                LinkRecord {
                    radargram_id: args.radargram.clone(),
                    line_id: args.line.clone().unwrap_or_default(),
                    timeslice_id: args.timeslice.clone().unwrap_or_default(),
                    trace_from: args.trace_from,
                    trace_to: args.trace_to,
                    confidence: args.confidence.unwrap_or(1.0),
                    ..LinkRecord::default()
                },
            )?;
            Ok(ExecutionOutcome::success(
                format!("added link {}", record.id),
                json!({ "record": record }),
            ))
        }
        LinkCommand::SurferGrid(args) => {
            let link =
                link_surfer_grid_into_project(root, &args.reference, &args.source, args.band)?;
            Ok(ExecutionOutcome::success(
                format!("linked z-grid {}", link.z_grid_project_path),
                json!({ "link": link }),
            ))
        }
    }
}

fn run_package(
    root: &std::path::Path,
    command: &PackageCommand,
) -> anyhow::Result<ExecutionOutcome> {
    match command {
        PackageCommand::Export(args) => {
            let archive = export_project_package(root, args.out.as_deref())?;
            Ok(ExecutionOutcome::success(
                format!("exported package to {}", archive.display()),
                json!({ "archive": archive }),
            ))
        }
        PackageCommand::Import(args) => {
            let target = import_project_package(&args.archive, &args.target)?;
            Ok(ExecutionOutcome::success(
                format!("imported package into {}", target.display()),
                json!({ "root": target }),
            ))
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Survey project catalog tooling for 2D/3D geophysics workflows",
    long_about = "Manage the per-project catalog of 3D models, radargrams, time-slices, \
vector layers, and raster groups.",
    after_help = "Examples:\n  gsx init\n  gsx group create \"Area A\"\n  gsx --json validate\n  gsx fix --assign-crs EPSG:32633"
)]
struct GsxCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)"
    )]
    quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q")]
    trace: bool,
    #[arg(long, help = "Emit {status,message,details} JSON envelopes")]
    json: bool,
    #[arg(long, help = "Disable colored human output")]
    no_color: bool,
    #[arg(
        short = 'C',
        long,
        default_value = ".",
        value_name = "DIR",
        help = "Project root (defaults to the current directory)"
    )]
    project: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Create the standard project folders and an empty catalog")]
    Init,
    #[command(about = "Show catalog version and per-collection record counts")]
    Status,
    #[command(subcommand, about = "Manage raster groups")]
    Group(GroupCommand),
    #[command(subcommand, about = "Register imported assets in the catalog")]
    Register(RegisterCommand),
    #[command(subcommand, about = "Link radargrams, lines, and z-grids")]
    Link(LinkCommand),
    #[command(
        about = "Report catalog errors and warnings (exit 1 when errors exist)",
        after_help = "Examples:\n  gsx validate\n  gsx --json validate\n"
    )]
    Validate,
    #[command(
        about = "Apply quick fixes for missing files and stale references",
        after_help = "Examples:\n  gsx fix\n  gsx fix --keep-empty-groups --assign-crs EPSG:32633\n"
    )]
    Fix(FixArgs),
    #[command(subcommand, about = "Export or import a zipped project package")]
    Package(PackageCommand),
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    #[command(about = "Create a group, or return the existing one with the same name")]
    Create(GroupCreateArgs),
    #[command(about = "List groups with member counts")]
    List,
    #[command(about = "Merge time-slice/radargram ids into a group's membership")]
    Assign(GroupMemberArgs),
    #[command(about = "Remove time-slice/radargram ids from a group's membership")]
    Remove(GroupMemberArgs),
    #[command(about = "Shallow-merge KEY=VALUE pairs into a group record")]
    Update(GroupUpdateArgs),
    #[command(about = "Delete a group; orphaned members fall back to Imported")]
    Delete(GroupDeleteArgs),
}

#[derive(Args, Debug)]
struct GroupCreateArgs {
    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(Args, Debug)]
struct GroupMemberArgs {
    #[arg(value_name = "GROUP_ID")]
    group_id: String,
    #[arg(long, value_name = "ID", num_args = 1..)]
    timeslices: Vec<String>,
    #[arg(long, value_name = "ID", num_args = 1..)]
    radargrams: Vec<String>,
}

#[derive(Args, Debug)]
struct GroupUpdateArgs {
    #[arg(value_name = "GROUP_ID")]
    group_id: String,
    #[arg(long, value_name = "KEY=VALUE", num_args = 1.., required = true)]
    set: Vec<String>,
}

#[derive(Args, Debug)]
struct GroupDeleteArgs {
    #[arg(value_name = "GROUP_ID")]
    group_id: String,
}

#[derive(Subcommand, Debug)]
enum RegisterCommand {
    #[command(name = "model3d", about = "Register an imported 3D model")]
    Model3d(AssetArgs),
    #[command(about = "Register an imported radargram")]
    Radargram(AssetArgs),
    #[command(about = "Register one or more time-slices in a single save")]
    Timeslice(TimesliceArgs),
    #[command(about = "Register or update a vector layer (upsert by name and path)")]
    Vector(VectorArgs),
}

#[derive(Args, Debug)]
struct AssetArgs {
    #[arg(long, value_name = "PATH", help = "Canonical file inside the project")]
    path: String,
    #[arg(long, value_name = "PATH", help = "Original import path")]
    source: Option<String>,
    #[arg(long, value_name = "AUTHID", help = "CRS authority id, e.g. EPSG:32633")]
    crs: Option<String>,
    #[arg(long, help = "Also add the record to the default Imported group")]
    default_group: bool,
}

#[derive(Args, Debug)]
struct TimesliceArgs {
    #[arg(long = "path", value_name = "PATH", num_args = 1.., required = true)]
    paths: Vec<String>,
    #[arg(long, value_name = "AUTHID")]
    crs: Option<String>,
    #[arg(long, value_name = "DEPTH")]
    depth_from: Option<f64>,
    #[arg(long, value_name = "DEPTH")]
    depth_to: Option<f64>,
    #[arg(long, value_name = "UNIT")]
    unit: Option<String>,
    #[arg(long, help = "Also add the records to the default Imported group")]
    default_group: bool,
}

#[derive(Args, Debug)]
struct VectorArgs {
    #[arg(long, value_name = "NAME")]
    layer_name: String,
    #[arg(long, value_name = "PATH", help = "Omit for in-memory layers")]
    path: Option<String>,
    #[arg(
        long,
        value_name = "TYPE",
        default_value = "unknown",
        help = "point, line, polygon, or unknown"
    )]
    geometry: String,
    #[arg(long, value_name = "AUTHID")]
    crs: Option<String>,
    #[arg(long = "is-3d")]
    is_3d: bool,
    #[arg(long, value_name = "KIND", help = "Free-form tag, e.g. trace2d or grid_cells")]
    source_kind: Option<String>,
}

#[derive(Subcommand, Debug)]
enum LinkCommand {
    #[command(about = "Record a radargram-to-line/time-slice link")]
    Add(LinkAddArgs),
    #[command(
        name = "surfer-grid",
        about = "Copy a Surfer .grd next to a raster and link it as the z source"
    )]
    SurferGrid(SurferGridArgs),
}

#[derive(Args, Debug)]
struct LinkAddArgs {
    #[arg(long, value_name = "ID")]
    radargram: String,
    #[arg(long, value_name = "ID")]
    line: Option<String>,
    #[arg(long, value_name = "ID")]
    timeslice: Option<String>,
    #[arg(long, value_name = "N")]
    trace_from: Option<i64>,
    #[arg(long, value_name = "N")]
    trace_to: Option<i64>,
    #[arg(long, value_name = "FLOAT", help = "0.0..=1.0, defaults to 1.0")]
    confidence: Option<f64>,
}

#[derive(Args, Debug)]
struct SurferGridArgs {
    #[arg(long, value_name = "PATH")]
    reference: PathBuf,
    #[arg(long, value_name = "PATH", help = "The .grd itself or a sibling raster")]
    source: PathBuf,
    #[arg(long, value_name = "BAND")]
    band: Option<i64>,
}

#[derive(Args, Debug)]
struct FixArgs {
    #[arg(long, help = "Keep records whose project file is missing")]
    keep_missing_files: bool,
    #[arg(long, help = "Keep z-grid linkage even when the grid file is gone")]
    keep_zgrid: bool,
    #[arg(long, help = "Keep group members and links that reference unknown records")]
    keep_references: bool,
    #[arg(long, help = "Keep groups that have no members")]
    keep_empty_groups: bool,
    #[arg(
        long,
        value_name = "AUTHID",
        help = "Fill this CRS into time-slices that have none"
    )]
    assign_crs: Option<String>,
}

#[derive(Subcommand, Debug)]
enum PackageCommand {
    #[command(about = "Zip the project tree (minus exports/) into a package")]
    Export(PackageExportArgs),
    #[command(about = "Unpack a package into a fresh project root")]
    Import(PackageImportArgs),
}

#[derive(Args, Debug)]
struct PackageExportArgs {
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PackageImportArgs {
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,
    #[arg(value_name = "TARGET")]
    target: PathBuf,
}
