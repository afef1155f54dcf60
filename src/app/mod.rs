use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

use aql::config::{FiltersConfig, RuntimeConfig};
use aql::filter::{FieldAccess, Filter, Mismatch};
use aql::records::{InputFormat, load_records};
use aql::sinks::{OutputFormat, RecordSink, create_sink};

#[derive(Parser)]
#[command(name = "aql", author, version, about, long_about = None)]
pub struct Cli {
    /// Input file (.json, .jsonl, .geojson), or - for stdin
    #[arg(short, long)]
    pub input: PathBuf,

    /// Input format (auto-detected if omitted)
    #[arg(long, value_enum)]
    pub input_format: Option<InputFormat>,

    /// Output file (.jsonl, .json, .geojson), or - for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Output format (auto-detected if omitted)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// SQL WHERE clause to filter by
    #[arg(short, long = "where")]
    pub where_clause: Option<String>,

    /// Named filter configuration file (YAML)
    #[arg(short, long, env = "AQL_FILTERS")]
    pub filters: Option<PathBuf>,

    /// Filter to use from the configuration file
    #[arg(short, long)]
    pub name: Option<String>,

    /// Where records keep their fields
    #[arg(long, value_enum, env = "AQL_FIELD_ACCESS")]
    pub field_access: Option<FieldAccess>,

    /// Write every record with a visibility flag instead of filtering
    #[arg(long)]
    pub mark: bool,

    /// Name of the flag written in mark mode
    #[arg(long, default_value = "visible")]
    pub mark_field: String,

    /// Fail if any record cannot be evaluated
    #[arg(long)]
    pub strict: bool,

    /// Number of threads (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// The filter chosen for a run and whether mismatches are fatal.
#[derive(Debug)]
pub struct Selection {
    pub filter: Filter,
    pub strict: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub read: usize,
    pub written: usize,
    pub mismatches: usize,
}

pub fn input_format(cli: &Cli) -> Result<InputFormat> {
    if let Some(format) = cli.input_format {
        return Ok(format);
    }
    if cli.input == Path::new("-") {
        return Ok(InputFormat::Jsonl);
    }
    InputFormat::from_path(&cli.input)
        .context("CLI: Could not detect input format from extension; use --input-format")
}

pub fn output_format(cli: &Cli) -> Result<OutputFormat> {
    if let Some(format) = cli.format {
        return Ok(format);
    }
    if cli.output == Path::new("-") {
        return Ok(OutputFormat::Jsonl);
    }
    OutputFormat::from_path(&cli.output)
        .context("CLI: Could not detect output format from extension; use --format")
}

/// Pick the clause to run and the field access it reads through.
///
/// An inline `--where` wins over `--filters`. Field access comes from the
/// flag, then the config entry or its default, then the input format.
pub fn resolve_filter(cli: &Cli, input: InputFormat) -> Result<Selection> {
    if let Some(clause) = &cli.where_clause {
        let access = cli.field_access.unwrap_or_else(|| input.default_access());
        let filter = Filter::compile(clause, access)
            .with_context(|| format!("CLI: Error compiling --where clause '{}'", clause))?;
        return Ok(Selection {
            filter,
            strict: cli.strict,
        });
    }

    let Some(path) = &cli.filters else {
        bail!("CLI: Provide a --where clause or --filters with --name");
    };
    let Some(name) = &cli.name else {
        bail!("CLI: --filters needs --name to choose a filter");
    };

    let compiled = FiltersConfig::load(path)?.compile()?;
    tracing::info!("Config: {} filters loaded from {:?}", compiled.len(), path);

    let filter = compiled.get(name).with_context(|| {
        format!(
            "Config: No filter named '{}' (available: {})",
            name,
            compiled.names().join(", ")
        )
    })?;
    let access = match cli.field_access {
        Some(access) => access,
        None if compiled.has_explicit_access(name) => filter.access(),
        None => input.default_access(),
    };

    Ok(Selection {
        filter: filter.with_access(access),
        strict: cli.strict || compiled.strict,
    })
}

pub fn init_sink(format: OutputFormat, output: &Path) -> Result<Box<dyn RecordSink>> {
    if output == Path::new("-") {
        tracing::info!("Sink: {} -> stdout", format.label());
    } else {
        tracing::info!("Sink: {} -> {:?}", format.label(), output);
    }
    create_sink(output, format)
}

/// Write the visibility flag next to the fields the filter reads.
fn set_flag(record: &mut JsonValue, access: FieldAccess, field: &str, visible: bool) {
    let target = match access.container() {
        Some(container) => record.get_mut(container),
        None => Some(record),
    };
    match target.and_then(JsonValue::as_object_mut) {
        Some(fields) => {
            fields.insert(field.to_string(), JsonValue::Bool(visible));
        }
        None => tracing::debug!("Mark: record has no field object, flag not written"),
    }
}

fn ensure_lenient(strict: bool, total: usize, mismatches: &[Mismatch]) -> Result<()> {
    if let (true, Some(first)) = (strict, mismatches.first()) {
        bail!(
            "Filter: {} of {} records could not be evaluated (first at record {}: {})",
            mismatches.len(),
            total,
            first.index,
            first.error
        );
    }
    Ok(())
}

pub fn run(cli: &Cli) -> Result<RunSummary> {
    let input = input_format(cli)?;
    let output = output_format(cli)?;
    let Selection { filter, strict } = resolve_filter(cli, input)?;

    let runtime = RuntimeConfig {
        field_access: filter.access(),
        strict,
        mark_field: cli.mark.then(|| cli.mark_field.clone()),
        parallel: cli.threads != Some(1),
    };
    tracing::info!(
        "Filter: {} (fields: {:?}, strict: {})",
        filter.expression(),
        runtime.field_access,
        runtime.strict
    );

    let mut records = load_records(&cli.input, input)?;
    tracing::info!(
        "Input: {} records from {:?} ({})",
        records.len(),
        cli.input,
        input.label()
    );

    let mut summary = RunSummary {
        read: records.len(),
        ..RunSummary::default()
    };

    // The sink is only opened once the run is known to succeed
    match &runtime.mark_field {
        Some(field) => {
            let access = runtime.field_access;
            let mismatches = if runtime.parallel {
                let marked = filter.par_mark(&records);
                for (record, visible) in records.iter_mut().zip(marked.flags) {
                    set_flag(record, access, field, visible);
                }
                marked.mismatches
            } else {
                filter.mark_mut(&mut records, |record, visible| {
                    set_flag(record, access, field, visible)
                })
            };
            ensure_lenient(runtime.strict, records.len(), &mismatches)?;

            summary.written = write_records(output, &cli.output, &records)?;
            summary.mismatches = mismatches.len();
        }
        None => {
            let filtered = if runtime.parallel {
                filter.par_apply(&records)
            } else {
                filter.apply(&records)
            };
            ensure_lenient(runtime.strict, records.len(), &filtered.mismatches)?;

            summary.written = write_records(output, &cli.output, filtered.records)?;
            summary.mismatches = filtered.mismatches.len();
        }
    }

    Ok(summary)
}

fn write_records<'r, I>(format: OutputFormat, path: &Path, records: I) -> Result<usize>
where
    I: IntoIterator<Item = &'r JsonValue>,
{
    let mut sink = init_sink(format, path)?;
    let mut written = 0;
    for record in records {
        sink.add_record(record)?;
        written += 1;
    }
    sink.finish().context("Output: Failed to finalize sink")?;
    Ok(written)
}
